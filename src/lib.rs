//! Kuba Querier - federated fan-out over replicated time-series stores
//!
//! This library presents a single, time-ordered, deduplicated view over series
//! that are partitioned and replicated across many independent store nodes:
//! - Store pruning by external labels
//! - Concurrent per-store RPC fan-out with cancellation and deadlines
//! - K-way merge of per-store series streams
//! - Inclusive time-range clamping
//! - Replica-aware deduplication

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod compression;
pub mod error;
pub mod store;
pub mod types;

/// Configuration management with TOML support
pub mod config;

/// Prometheus metrics for fan-out queries
pub mod metrics;

/// Tracing subscriber setup
pub mod telemetry;

/// Fan-out query engine: store pruning, per-store fetch, merge, clamp and dedup
pub mod query;

// Re-export main types
pub use config::QuerierConfig;
pub use error::{Error, Result};
pub use query::{Matcher, MatchType, Querier, QueryEngine, QueryError, QueryErrorKind};
pub use store::{StaticStoreInfo, StoreClient, StoreInfo};
pub use types::{Label, Labels, Sample};
