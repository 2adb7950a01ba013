//! Query error types
//!
//! Every layer of a query (fan-out, fetch, decode, merge, dedup) reports
//! failures as a [`QueryError`]. Store RPC failures keep their original
//! [`StoreError`] as the error source.

use crate::error::CompressionError;
use crate::store::{StoreError, StoreErrorCode};
use std::fmt;

/// Query error with context
#[derive(Debug)]
pub struct QueryError {
    /// Error kind for programmatic handling
    pub kind: QueryErrorKind,
    /// Human-readable message
    pub message: String,
    /// Optional source error
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl QueryError {
    /// Create a new query error
    pub fn new(kind: QueryErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    /// Add source error for error chaining
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Create a store error
    pub fn store(message: impl Into<String>) -> Self {
        Self::new(QueryErrorKind::Store, message)
    }

    /// Create a chunk decode error
    pub fn decode(message: impl Into<String>) -> Self {
        Self::new(QueryErrorKind::Decode, message)
    }

    /// Create a cancellation error
    pub fn cancelled(message: impl Into<String>) -> Self {
        Self::new(QueryErrorKind::Cancelled, message)
    }

    /// Create a timeout error
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(QueryErrorKind::Timeout, message)
    }

    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(QueryErrorKind::Validation, message)
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(QueryErrorKind::Internal, message)
    }

    /// Check whether the query was cancelled or ran out of time
    pub fn is_cancelled(&self) -> bool {
        matches!(
            self.kind,
            QueryErrorKind::Cancelled | QueryErrorKind::Timeout
        )
    }

    /// Prefix the message with the failing store
    pub fn in_store(mut self, store: &str) -> Self {
        self.message = format!("store {}: {}", store, self.message);
        self
    }
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for QueryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

impl From<StoreError> for QueryError {
    fn from(err: StoreError) -> Self {
        let kind = match err.code {
            StoreErrorCode::Cancelled => QueryErrorKind::Cancelled,
            StoreErrorCode::DeadlineExceeded => QueryErrorKind::Timeout,
            _ => QueryErrorKind::Store,
        };
        let message = err.to_string();
        QueryError::new(kind, message).with_source(err)
    }
}

impl From<CompressionError> for QueryError {
    fn from(err: CompressionError) -> Self {
        let message = err.to_string();
        QueryError::decode(message).with_source(err)
    }
}

/// Categories of query errors for programmatic handling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryErrorKind {
    /// A store RPC or stream failed
    Store,
    /// A chunk could not be decoded
    Decode,
    /// Query was cancelled by the caller or closed
    Cancelled,
    /// Query exceeded its deadline
    Timeout,
    /// Invalid query input (bad regex, empty range)
    Validation,
    /// Internal error (task panic, unexpected state)
    Internal,
}

impl fmt::Display for QueryErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryErrorKind::Store => write!(f, "StoreError"),
            QueryErrorKind::Decode => write!(f, "DecodeError"),
            QueryErrorKind::Cancelled => write!(f, "Cancelled"),
            QueryErrorKind::Timeout => write!(f, "Timeout"),
            QueryErrorKind::Validation => write!(f, "ValidationError"),
            QueryErrorKind::Internal => write!(f, "Internal"),
        }
    }
}

/// Result type alias for query operations
pub type QueryResult<T> = std::result::Result<T, QueryError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_error_display() {
        let err = QueryError::validation("invalid regex '('");
        let display = format!("{}", err);
        assert!(display.contains("ValidationError"));
        assert!(display.contains("("));
    }

    #[test]
    fn test_from_store_error_maps_codes() {
        let err: QueryError = StoreError::unavailable("down").into();
        assert_eq!(err.kind, QueryErrorKind::Store);
        assert!(err.source().is_some());

        let err: QueryError = StoreError::new(StoreErrorCode::Cancelled, "ctx").into();
        assert_eq!(err.kind, QueryErrorKind::Cancelled);
        assert!(err.is_cancelled());

        let err: QueryError = StoreError::new(StoreErrorCode::DeadlineExceeded, "slow").into();
        assert_eq!(err.kind, QueryErrorKind::Timeout);
        assert!(err.is_cancelled());
    }

    #[test]
    fn test_from_compression_error() {
        let err: QueryError = CompressionError::CorruptedData("truncated".into()).into();
        assert_eq!(err.kind, QueryErrorKind::Decode);
        assert!(err.message.contains("truncated"));
    }

    #[test]
    fn test_in_store_prefix() {
        let err = QueryError::store("connection reset").in_store("eu-1");
        assert_eq!(err.message, "store eu-1: connection reset");
    }
}
