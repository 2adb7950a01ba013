//! Fan-out query engine over store nodes
//!
//! # Architecture
//!
//! ```text
//!                Querier::select(matchers)
//!                          │
//!                          ▼
//!                ┌───────────────────┐
//!                │  store_matches    │  prune by external labels
//!                └───────────────────┘
//!                          │
//!          ┌───────────────┼───────────────┐
//!          ▼               ▼               ▼
//!   ┌─────────────┐ ┌─────────────┐ ┌─────────────┐
//!   │select_single│ │select_single│ │select_single│  buffer + re-sort
//!   └─────────────┘ └─────────────┘ └─────────────┘
//!          └───────────────┼───────────────┘
//!                          ▼
//!                ┌───────────────────┐
//!                │  MergedSeriesSet  │  k-way merge
//!                └───────────────────┘
//!                          ▼
//!                ┌───────────────────┐
//!                │ ClampedSeriesSet  │  [mint, maxt]
//!                └───────────────────┘
//!                          ▼
//!                ┌───────────────────┐
//!                │  DedupSeriesSet   │  only with a replica label
//!                └───────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust
//! use kuba_querier::query::Querier;
//! use kuba_querier::store::{InMemoryStore, Series, StaticStoreInfo, StoreInfo};
//! use kuba_querier::types::{Labels, Sample};
//! use std::sync::Arc;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let samples = vec![Sample::new(1, 1.0), Sample::new(2, 2.0)];
//! let series = Series::from_samples(Labels::from_pairs(&[("job", "api")]), &samples, 120).unwrap();
//! let store: Arc<dyn StoreInfo> = Arc::new(StaticStoreInfo::new(
//!     "local",
//!     Labels::empty(),
//!     Arc::new(InMemoryStore::new().with_series(series)),
//! ));
//!
//! let mut querier = Querier::new(vec![store], 0, 10, None);
//! let result = querier.select(&[]).await.collect_series().unwrap();
//! assert_eq!(result[0].1, samples);
//! querier.close();
//! # }
//! ```

pub mod chunk_iter;
pub mod clamp;
pub mod context;
pub mod dedup;
pub mod error;
pub mod fetch;
pub mod matcher;
pub mod merge;
pub mod querier;
pub mod series_set;

pub use context::QueryContext;
pub use error::{QueryError, QueryErrorKind, QueryResult};
pub use matcher::{store_matches, MatchType, Matcher};
pub use querier::{Querier, QueryEngine, SelectSeriesSet};
pub use series_set::{
    collect_samples, collect_series, SampleIterator, SeriesEntry, SeriesSet,
};
