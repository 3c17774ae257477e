use std::fmt;
use std::fmt::Display;
use std::io;

/// Error kinds raised anywhere in the differ, from segment construction
/// through adapter I/O. Flat by design so callers can match on a single
/// type regardless of which crate raised it.
#[derive(Debug)]
pub enum ReError {
    /// Adapter could not establish or re-establish a connection.
    ConnectError(String),

    /// SQL execution failed at the database. Carries a redacted SQL
    /// fragment and, where known, the segment's key range.
    QueryError(String),

    /// Invalid segment bounds, unsupported key type, or malformed table
    /// path.
    ValueError(String),

    /// Schema mismatch between the two segments, or an unknown column
    /// type participating in a checksum.
    TypeError(String),

    /// A capability the adapter does not implement was requested, e.g.
    /// `OFFSET > 0` against an engine without pagination support.
    NotImplementedError(String),

    /// Wrapped I/O error from a driver or config file read.
    IoError(io::Error),
}

pub type CResult<T> = Result<T, ReError>;

impl Display for ReError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReError::ConnectError(s) => write!(f, "connect error: {s}"),
            ReError::QueryError(s) => write!(f, "query error: {s}"),
            ReError::ValueError(s) => write!(f, "value error: {s}"),
            ReError::TypeError(s) => write!(f, "type error: {s}"),
            ReError::NotImplementedError(s) => write!(f, "not implemented: {s}"),
            ReError::IoError(e) => write!(f, "io error: {e}"),
        }
    }
}

impl std::error::Error for ReError {}

impl From<io::Error> for ReError {
    fn from(e: io::Error) -> Self {
        ReError::IoError(e)
    }
}

/// Truncates an interpolated SQL literal above this length before it is
/// attached to an error message, per the "redacted of literals above a
/// length threshold" requirement.
pub const SQL_REDACTION_THRESHOLD: usize = 120;

pub fn redact_sql(sql: &str) -> String {
    if sql.len() <= SQL_REDACTION_THRESHOLD {
        sql.to_string()
    } else {
        format!("{}… ({} bytes truncated)", &sql[..SQL_REDACTION_THRESHOLD], sql.len() - SQL_REDACTION_THRESHOLD)
    }
}
