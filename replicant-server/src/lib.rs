//! The server half of the Replicant engine: per-replicant state
//! (`ServerReplicant`) and the registry/broadcast hub that dispatches the
//! wire protocol against it (`Replicator`).

mod replicant;
mod replicator;

pub use replicant::{ChangeEvent, FlushOutcome, ServerReplicant, Snapshot};
pub use replicator::{DeclareOptions, DeclareOutcome, Replicator};
