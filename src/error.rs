//! Error types for the querier

use crate::query::QueryError;
use crate::store::StoreError;
use thiserror::Error;

/// Main error type for the querier
#[derive(Error, Debug)]
pub enum Error {
    /// Query error
    #[error("Query error: {0}")]
    Query(#[from] QueryError),

    /// Store RPC error
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Compression error
    #[error("Compression error: {0}")]
    Compression(#[from] CompressionError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Compression errors
#[derive(Error, Debug)]
pub enum CompressionError {
    /// Data is corrupted
    #[error("Corrupted data: {0}")]
    CorruptedData(String),

    /// Invalid input data
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Encoder exceeded its size limit
    #[error("Resource limit: {0}")]
    ResourceLimit(String),
}

/// Validation errors
///
/// Raised while validating configuration.
#[derive(Error, Debug)]
pub enum ValidationError {
    /// Value is out of allowed range
    #[error("{field} value {value} is out of range [{min}, {max}]")]
    OutOfRange {
        /// Field name being validated
        field: String,
        /// The invalid value
        value: String,
        /// Minimum allowed value
        min: String,
        /// Maximum allowed value
        max: String,
    },

    /// Invalid format
    #[error("Invalid format for {field}: {message}")]
    InvalidFormat {
        /// Field name being validated
        field: String,
        /// Description of the format error
        message: String,
    },
}

impl From<ValidationError> for Error {
    fn from(e: ValidationError) -> Self {
        Error::Configuration(e.to_string())
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
