//! Per-store series fetch
//!
//! Stores sort their response by the full label set, but deduplication needs
//! replicas of one logical series next to each other. [`select_single`]
//! therefore drains a store's stream into memory and re-sorts it by dedup-key
//! (the label set minus the replica label), moving the replica label to the
//! end of every emitted label set:
//!
//! ```text
//! store order                     emitted order
//! {a=1, b=r1, c=3}                {a=1, c=3, b=r1}
//! {a=1, b=r1, c=3, d=4}    ==>    {a=1, c=3, b=r2}
//! {a=1, b=r1, c=4}                {a=1, c=3, d=4, b=r1}
//! {a=1, b=r2, c=3}                {a=1, c=4, b=r1}
//! ```

use super::chunk_iter::ChunkSeriesIterator;
use super::context::QueryContext;
use super::error::QueryError;
use super::series_set::{SeriesEntry, SeriesSet};
use crate::store::{Series, SeriesRequest, SeriesStream, StoreClient};
use crate::types::Labels;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, warn};

/// Buffered, re-sorted series of one store
///
/// Series received before a stream failure are yielded first; the failure is
/// returned by the pull after the last of them.
#[derive(Debug, Default)]
pub struct StoreSeriesSet {
    series: VecDeque<Series>,
    pending_err: Option<QueryError>,
}

impl StoreSeriesSet {
    /// Re-sort `series` for the given replica label
    ///
    /// Without a replica label the input order is kept.
    pub fn new(series: Vec<Series>, replica_label: Option<&str>) -> Self {
        let series = match replica_label {
            Some(replica) => sort_for_dedup(series, replica),
            None => series,
        };
        Self {
            series: series.into(),
            pending_err: None,
        }
    }

    /// Fail with `err` once the buffered series are exhausted
    pub fn with_error(mut self, err: QueryError) -> Self {
        self.pending_err = Some(err);
        self
    }

    /// Number of buffered series not yet yielded
    pub fn len(&self) -> usize {
        self.series.len()
    }

    /// Check whether no buffered series remain
    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}

impl SeriesSet for StoreSeriesSet {
    fn next_series(&mut self) -> Result<Option<SeriesEntry>, QueryError> {
        match self.series.pop_front() {
            Some(series) => Ok(Some(SeriesEntry::new(
                series.labels,
                Box::new(ChunkSeriesIterator::new(series.chunks)),
            ))),
            None => match self.pending_err.take() {
                Some(err) => Err(err),
                None => Ok(None),
            },
        }
    }
}

/// Stable sort by (dedup-key, full label set), replica label moved last
fn sort_for_dedup(series: Vec<Series>, replica: &str) -> Vec<Series> {
    let mut keyed: Vec<(Labels, Series)> = series
        .into_iter()
        .map(|s| (s.labels.without(replica), s))
        .collect();
    keyed.sort_by(|(ka, a), (kb, b)| ka.cmp(kb).then_with(|| a.labels.cmp(&b.labels)));

    keyed
        .into_iter()
        .map(|(key, mut s)| {
            s.labels = match s.labels.iter().find(|l| l.name == replica) {
                Some(label) => key.with_trailing(label.clone()),
                None => key,
            };
            s
        })
        .collect()
}

/// Result of fetching one store
pub struct StoreFetch {
    /// Buffered series, possibly ending in an error
    pub series_set: StoreSeriesSet,
    /// Stream handle, kept open until the querier closes
    pub stream: Box<dyn SeriesStream>,
}

/// Open a Series stream on one store and buffer the re-sorted response
///
/// # Errors
/// Returns the error if the stream cannot be opened. Failures while draining
/// are deferred into the returned set.
pub async fn select_single(
    ctx: &QueryContext,
    client: Arc<dyn StoreClient>,
    req: SeriesRequest,
    replica_label: Option<&str>,
) -> Result<StoreFetch, QueryError> {
    let mut stream = ctx.run(client.series(req)).await??;

    let mut series = Vec::new();
    let mut pending_err = None;
    loop {
        match ctx.run(stream.recv()).await {
            Ok(Ok(Some(s))) => series.push(s),
            Ok(Ok(None)) => break,
            Ok(Err(e)) => {
                warn!(error = %e, received = series.len(), "Series stream failed");
                pending_err = Some(QueryError::from(e));
                break;
            }
            Err(e) => {
                pending_err = Some(e);
                break;
            }
        }
    }
    debug!(series = series.len(), "Drained store series stream");

    let mut series_set = StoreSeriesSet::new(series, replica_label);
    if let Some(err) = pending_err {
        series_set = series_set.with_error(err);
    }
    Ok(StoreFetch { series_set, stream })
}
