//! Top-level Replicant engine crate: the client-side mirror
//! (`ClientReplicant`) plus re-exports of every other crate's public
//! surface, so an embedder can depend on `replicant` alone.

mod client;

pub use client::{ClientChangeEvent, ClientReplicant};

pub use replicant_base::{Error, ErrorKind, Result};
pub use replicant_observe::{MutationSink, SuspendGuard};
pub use replicant_schema::Schema;
pub use replicant_server::{ChangeEvent, DeclareOptions, DeclareOutcome, FlushOutcome, Replicator, ServerReplicant, Snapshot};
pub use replicant_transport::{
    DeclareReply, DeclareRequest, LoopbackTransport, OperationsBroadcast, PeerId, ProposeOperationsReply,
    ProposeOperationsRequest, ReadRequest, ReplicantOpts, Transport, WireMessage,
};
pub use replicant_value::{apply, navigate, OpKind, Operation, Path, Value};
