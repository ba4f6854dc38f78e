//! The value tree, paths into it, and the operation model that describes
//! mutations to it.
//!
//! The effective value a Replicant holds is an arbitrary JSON-compatible
//! tree, so we represent it directly as `serde_json::Value` rather than
//! inventing a typed value language.

mod op;
mod path;

pub use op::{apply, navigate, OpKind, Operation};
pub use path::Path;

/// Re-exported so downstream crates depend on one spelling of "the value type."
pub use serde_json::Value;
