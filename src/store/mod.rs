//! Store API: the client-side view of one queryable store node
//!
//! A store node owns a subset of series and is tagged with external labels
//! that identify its shard or replica role. This module defines:
//! - The wire types exchanged with a store ([`Series`], [`Chunk`], requests)
//! - The [`StoreClient`] capability set (Info, Series, LabelNames, LabelValues)
//! - The [`SeriesStream`] receive loop with an explicit end-of-stream sentinel
//! - [`StoreInfo`], the long-lived, read-only description of one node
//!
//! Transports implement [`StoreClient`]; [`memory::InMemoryStore`] is the
//! in-process implementation.

pub mod memory;

pub use memory::InMemoryStore;

use crate::compression::XorChunk;
use crate::error::CompressionError;
use crate::query::Matcher;
use crate::types::{Labels, Sample};
use async_trait::async_trait;
use bytes::Bytes;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

// =============================================================================
// Errors
// =============================================================================

/// Status code attached to a store RPC failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreErrorCode {
    /// Store could not be reached
    Unavailable,
    /// Store does not implement the RPC
    Unimplemented,
    /// Call was cancelled by the caller
    Cancelled,
    /// Call ran past its deadline
    DeadlineExceeded,
    /// Request was rejected by the store
    InvalidArgument,
    /// Store-side failure
    Internal,
}

impl fmt::Display for StoreErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StoreErrorCode::Unavailable => "Unavailable",
            StoreErrorCode::Unimplemented => "Unimplemented",
            StoreErrorCode::Cancelled => "Cancelled",
            StoreErrorCode::DeadlineExceeded => "DeadlineExceeded",
            StoreErrorCode::InvalidArgument => "InvalidArgument",
            StoreErrorCode::Internal => "Internal",
        };
        f.write_str(name)
    }
}

/// Failure of a single store RPC
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{code}: {message}")]
pub struct StoreError {
    /// Status code
    pub code: StoreErrorCode,
    /// Human-readable message
    pub message: String,
}

impl StoreError {
    /// Create a store error
    pub fn new(code: StoreErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Store could not be reached
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(StoreErrorCode::Unavailable, message)
    }

    /// RPC is not implemented by this store
    pub fn unimplemented(rpc: &str) -> Self {
        Self::new(StoreErrorCode::Unimplemented, format!("{} not implemented", rpc))
    }

    /// Store-side failure
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StoreErrorCode::Internal, message)
    }
}

// =============================================================================
// Wire types
// =============================================================================

/// Encoding of a chunk payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkEncoding {
    /// Gorilla XOR encoding, see [`crate::compression::xor`]
    Xor,
}

/// Opaque, time-bounded run of encoded samples
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    /// Payload encoding
    pub encoding: ChunkEncoding,
    /// Declared first timestamp
    pub min_time: i64,
    /// Declared last timestamp
    pub max_time: i64,
    /// Encoded samples
    pub data: Bytes,
}

impl Chunk {
    /// Encode `samples` into a single XOR chunk
    ///
    /// # Errors
    /// Fails if timestamps are not strictly increasing.
    pub fn encode_xor(samples: &[Sample]) -> Result<Self, CompressionError> {
        let mut chunk = XorChunk::new();
        for s in samples {
            chunk.append(s.timestamp, s.value)?;
        }
        Ok(Self {
            encoding: ChunkEncoding::Xor,
            min_time: samples.first().map_or(0, |s| s.timestamp),
            max_time: samples.last().map_or(0, |s| s.timestamp),
            data: chunk.bytes(),
        })
    }
}

/// One series as sent by a store
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Series {
    /// Full label set, external labels included
    pub labels: Labels,
    /// Chunks, expected time-ordered and non-overlapping
    pub chunks: Vec<Chunk>,
}

impl Series {
    /// Create a series without chunks
    pub fn new(labels: Labels) -> Self {
        Self {
            labels,
            chunks: Vec::new(),
        }
    }

    /// Create a series whose samples are split into chunks of at most
    /// `chunk_size` samples
    pub fn from_samples(
        labels: Labels,
        samples: &[Sample],
        chunk_size: usize,
    ) -> Result<Self, CompressionError> {
        let chunks = samples
            .chunks(chunk_size.max(1))
            .map(Chunk::encode_xor)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { labels, chunks })
    }
}

/// Series selection request
#[derive(Debug, Clone, Default)]
pub struct SeriesRequest {
    /// Requested window start (inclusive)
    pub min_time: i64,
    /// Requested window end (inclusive)
    pub max_time: i64,
    /// Label matchers every returned series must satisfy
    pub matchers: Vec<Matcher>,
}

/// Label values request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelValuesRequest {
    /// Label name to look up
    pub label: String,
}

/// Label names request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelNamesRequest;

/// Store self-description
#[derive(Debug, Clone, PartialEq)]
pub struct InfoResponse {
    /// External labels of the store
    pub labels: Labels,
    /// Oldest timestamp the store can serve
    pub min_time: i64,
    /// Newest timestamp the store can serve
    pub max_time: i64,
}

// =============================================================================
// Client traits
// =============================================================================

/// Streamed series response
///
/// `recv` blocks until the next series arrives and returns `Ok(None)` once the
/// stream is exhausted; end of stream is never reported as an error.
#[async_trait]
pub trait SeriesStream: Send {
    /// Receive the next series
    async fn recv(&mut self) -> Result<Option<Series>, StoreError>;

    /// Release the stream; safe to call more than once
    fn close(&mut self) {}
}

/// Capability set of one store node
///
/// `info` and `label_names` default to `Unimplemented` so that minimal
/// clients only implement what the querier needs for a given call.
#[async_trait]
pub trait StoreClient: Send + Sync + 'static {
    /// Describe the store
    async fn info(&self) -> Result<InfoResponse, StoreError> {
        Err(StoreError::unimplemented("Info"))
    }

    /// Open a streaming series selection
    ///
    /// Stores SHOULD send series sorted by full label set and MAY send samples
    /// outside the requested window.
    async fn series(&self, req: SeriesRequest) -> Result<Box<dyn SeriesStream>, StoreError>;

    /// List label names
    async fn label_names(&self, _req: LabelNamesRequest) -> Result<Vec<String>, StoreError> {
        Err(StoreError::unimplemented("LabelNames"))
    }

    /// List values of one label; SHOULD be sorted, but the querier does not rely on it
    async fn label_values(&self, req: LabelValuesRequest) -> Result<Vec<String>, StoreError>;
}

/// Long-lived description of one queryable store node
pub trait StoreInfo: Send + Sync {
    /// External labels, constant across every series of the store
    fn labels(&self) -> &Labels;

    /// RPC client
    fn client(&self) -> Arc<dyn StoreClient>;

    /// Name used in logs and metrics
    fn name(&self) -> String {
        self.labels().to_string()
    }
}

/// Plain [`StoreInfo`] holding its labels and client
#[derive(Clone)]
pub struct StaticStoreInfo {
    name: String,
    labels: Labels,
    client: Arc<dyn StoreClient>,
}

impl StaticStoreInfo {
    /// Create a store description
    pub fn new(name: impl Into<String>, labels: Labels, client: Arc<dyn StoreClient>) -> Self {
        Self {
            name: name.into(),
            labels,
            client,
        }
    }
}

impl fmt::Debug for StaticStoreInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticStoreInfo")
            .field("name", &self.name)
            .field("labels", &self.labels)
            .finish()
    }
}

impl StoreInfo for StaticStoreInfo {
    fn labels(&self) -> &Labels {
        &self.labels
    }

    fn client(&self) -> Arc<dyn StoreClient> {
        Arc::clone(&self.client)
    }

    fn name(&self) -> String {
        self.name.clone()
    }
}
