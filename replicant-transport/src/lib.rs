//! Wire envelope, peer/room model, and the `Transport` trait.

mod loopback;
mod transport;
mod wire;

pub use loopback::LoopbackTransport;
pub use transport::{Handler, PeerId, Transport};
pub use wire::{
    DeclareReply, DeclareRequest, OperationsBroadcast, ProposeOperationsReply,
    ProposeOperationsRequest, ReadRequest, ReplicantOpts, WireMessage,
};
