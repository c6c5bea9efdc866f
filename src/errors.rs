use std::error::Error;
use std::fmt;

use dav_server::fs::FsError;
use http::StatusCode;

/// Errors from the property store and the server bootstrap.
#[derive(Debug)]
pub enum PropError {
    /// The durable store failed (connection, statement, constraint).
    Db(rusqlite::Error),
    /// A table prefix with characters other than `[A-Za-z0-9_]`.
    InvalidTablePrefix(String),
    /// A required part of the configuration was not set.
    Config(&'static str),
    /// A blocking store call panicked or was cancelled.
    Blocking(String),
}

pub type PropResult<T> = Result<T, PropError>;

impl Error for PropError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            PropError::Db(e) => Some(e),
            _ => None,
        }
    }
}

impl fmt::Display for PropError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PropError::Db(e) => write!(f, "property store failure: {}", e),
            PropError::InvalidTablePrefix(p) => write!(f, "invalid table prefix {:?}", p),
            PropError::Config(what) => write!(f, "incomplete configuration: {} not set", what),
            PropError::Blocking(e) => write!(f, "blocking task failed: {}", e),
        }
    }
}

impl From<rusqlite::Error> for PropError {
    fn from(e: rusqlite::Error) -> Self {
        PropError::Db(e)
    }
}

impl From<tokio::task::JoinError> for PropError {
    fn from(e: tokio::task::JoinError) -> Self {
        PropError::Blocking(e.to_string())
    }
}

// The engine only knows FsError, and turns GeneralFailure into a 500.
impl From<PropError> for FsError {
    fn from(e: PropError) -> Self {
        warn!("{}", e);
        FsError::GeneralFailure
    }
}

impl PropError {
    pub fn statuscode(&self) -> StatusCode {
        match self {
            PropError::Db(_)
            | PropError::InvalidTablePrefix(_)
            | PropError::Config(_)
            | PropError::Blocking(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_db_error_is_server_error() {
        let err = PropError::from(rusqlite::Error::QueryReturnedNoRows);
        assert_eq!(err.statuscode(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.source().is_some());
        assert!(matches!(FsError::from(err), FsError::GeneralFailure));
    }

    #[test]
    fn test_display() {
        let err = PropError::Config("store");
        assert_eq!(err.to_string(), "incomplete configuration: store not set");
    }
}
