// We want a few things here:
// 1. A way to create a new error with a backtrace
// 2. A way to centralize setting a breakpoint to trap any error in the system fairly soon
//    after it's created (or at least when it's propagated from a library we use back to us)
// 3. Same but for logging / emitting error messages into the tracing/logging system
// 4. A closed set of error *kinds* callers can match on: schema-mismatch and
//    revision-mismatch are routine reconciliation signals, not failures, and callers
//    need to tell those apart from value-invalid/persistence-failed/etc. without string-matching.

use std::borrow::Cow;
use backtrace_error::DynBacktraceError;
use tracing::error;

#[cfg(test)]
use test_log::test;

/// The closed set of error kinds a Replicant can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A value (or a proposed operation's resulting value) failed schema validation.
    ValueInvalid,
    /// A schema file could not be loaded or resolved; the replicant runs unvalidated.
    SchemaLoadFailed,
    /// A wire `schemaSum` didn't match ours. Routine reconciliation, not a failure.
    SchemaMismatch,
    /// A wire `revision` didn't match ours. Routine reconciliation, not a failure.
    RevisionMismatch,
    /// A snapshot write failed.
    PersistenceFailed,
    /// An operation named a `method` we don't recognize.
    UnknownOperation,
    /// An inbound operation targeted a replicant that hasn't been declared on this side.
    NotDeclared,
    /// Anything else.
    Other,
}

#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    inner: DynBacktraceError,
}
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.inner)
    }
}

// Deliberately not `impl std::error::Error for Error`: the blanket
// `impl<E: std::error::Error + Send + Sync + 'static> From<E> for Error`
// below needs `Error` itself to *not* satisfy that bound, or it collides
// with the standard library's reflexive `impl<T> From<T> for T`.

struct SimpleErr(Cow<'static, str>);
impl std::fmt::Debug for SimpleErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
impl std::fmt::Display for SimpleErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
impl std::error::Error for SimpleErr {
    fn description(&self) -> &str {
        &self.0
    }
}

impl<E: std::error::Error + Send + Sync + 'static> From<E> for Error {
    fn from(err: E) -> Error {
        Error::new(ErrorKind::Other, err)
    }
}

impl Error {
    pub fn new<E: std::error::Error + Send + Sync + 'static>(kind: ErrorKind, err: E) -> Error {
        match kind {
            // Reconciliation signals are routine; don't spam error-level logs for them.
            ErrorKind::SchemaMismatch | ErrorKind::RevisionMismatch => {
                tracing::debug!(target: "replicant", kind = ?kind, "{:?}", err)
            }
            _ => error!(target: "replicant", kind = ?kind, "{:?}", err),
        }
        let dbe = DynBacktraceError::from(err);
        Error { kind, inner: dbe }
    }
}

/// Build an `Other`-kind error from a message.
pub fn err(msg: impl Into<Cow<'static, str>>) -> Error {
    kind_err(ErrorKind::Other, msg)
}

/// Build a kinded error from a message.
pub fn kind_err(kind: ErrorKind, msg: impl Into<Cow<'static, str>>) -> Error {
    let simple = SimpleErr(msg.into());
    Error::new(kind, simple)
}

#[test]
fn test_error() {
    let e = err("test error");
    assert_eq!(e.kind(), ErrorKind::Other);
}

#[test]
fn test_kind_roundtrip() {
    let e = kind_err(ErrorKind::ValueInvalid, "bad value");
    assert_eq!(e.kind(), ErrorKind::ValueInvalid);
    assert!(format!("{e}").contains("ValueInvalid"));
}
