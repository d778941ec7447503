//! The error type returned by every fallible operation in this crate.

use std::fmt;
use std::io;

/// Errors produced by [`crate::Database`] and [`crate::Table`] operations.
#[derive(Debug)]
pub enum DbError {
    /// A syscall (`open`, `ftruncate`, `mmap`, `msync`, `munmap`, `close`) failed.
    Io(io::Error),
    /// The on-disk header violates an invariant of the format (§4.2): the
    /// decode cursor did not land on `header_size_bytes`, `n_fields` was 0,
    /// a field name was not NUL-terminated within the header region, or a
    /// field's declared size was 0.
    Format(String),
    /// A caller passed an argument that violates an API contract: an
    /// out-of-range row, an accessor whose range exceeds the row, an
    /// undersized buffer, an integer accessor wider than 64 bits, a
    /// malformed or duplicate field name, a table name containing a path
    /// separator, or a `destroy` issued while tables are still referenced.
    InvalidArgument(String),
    /// `get_accessor` was given a name the schema does not declare.
    NotFound(String),
}

impl fmt::Display for DbError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DbError::Io(e) => write!(f, "i/o error: {e}"),
            DbError::Format(msg) => write!(f, "malformed table header: {msg}"),
            DbError::InvalidArgument(msg) => write!(f, "invalid argument: {msg}"),
            DbError::NotFound(name) => write!(f, "no such field: {name}"),
        }
    }
}

impl std::error::Error for DbError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DbError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for DbError {
    fn from(e: io::Error) -> Self {
        DbError::Io(e)
    }
}
