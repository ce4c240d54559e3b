// src/error.rs
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RecordStoreError {
    /// A caller-supplied argument is missing or is not a mapping.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The document collection reported a failure while serving `operation`.
    #[error("{operation} failed: {source}")]
    StoreOperationFailed {
        operation: &'static str,
        #[source]
        source: Box<RecordStoreError>,
    },

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Duplicate key: {0}")]
    DuplicateKey(String),

    #[error("Operation not supported by this collection: {0}")]
    Unsupported(&'static str),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RecordStoreError {
    pub(crate) fn store_failure(operation: &'static str, source: RecordStoreError) -> Self {
        RecordStoreError::StoreOperationFailed {
            operation,
            source: Box::new(source),
        }
    }

    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, RecordStoreError::InvalidArgument(_))
    }

    pub fn is_store_failure(&self) -> bool {
        matches!(self, RecordStoreError::StoreOperationFailed { .. })
    }
}

pub type Result<T> = std::result::Result<T, RecordStoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_failure_wraps_source() {
        let err = RecordStoreError::store_failure(
            "read",
            RecordStoreError::Unavailable("connection refused".into()),
        );

        assert!(err.is_store_failure());
        assert!(!err.is_invalid_argument());
        assert_eq!(
            err.to_string(),
            "read failed: Store unavailable: connection refused"
        );

        let source = std::error::Error::source(&err).unwrap();
        assert_eq!(source.to_string(), "Store unavailable: connection refused");
    }

    #[test]
    fn test_invalid_argument_message() {
        let err = RecordStoreError::InvalidArgument("query cannot be empty".into());
        assert!(err.is_invalid_argument());
        assert_eq!(err.to_string(), "Invalid argument: query cannot be empty");
    }
}
