mod error;

pub use error::{err, kind_err, Error, ErrorKind, Result};
