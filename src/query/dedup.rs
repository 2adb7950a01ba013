//! Replica deduplication
//!
//! Series that differ only in the replica label are the same logical series
//! scraped by different replicas. Upstream layers keep them adjacent, so the
//! dedup layer groups consecutive series with equal dedup-keys and emits one
//! series per key, without the replica label, whose samples are the union of
//! the replicas' samples.

use super::error::QueryError;
use super::merge::MergedSampleIterator;
use super::series_set::{SampleIterator, SeriesEntry, SeriesSet};
use tracing::trace;

/// Series set with replicas collapsed into one series per dedup-key
pub struct DedupSeriesSet<S> {
    inner: S,
    replica_label: String,
    peeked: Option<SeriesEntry>,
    pending_err: Option<QueryError>,
}

impl<S: SeriesSet> DedupSeriesSet<S> {
    /// Deduplicate `inner` by `replica_label`
    pub fn new(inner: S, replica_label: impl Into<String>) -> Self {
        Self {
            inner,
            replica_label: replica_label.into(),
            peeked: None,
            pending_err: None,
        }
    }
}

impl<S: SeriesSet> SeriesSet for DedupSeriesSet<S> {
    fn next_series(&mut self) -> Result<Option<SeriesEntry>, QueryError> {
        let first = match self.peeked.take() {
            Some(entry) => entry,
            None => {
                if let Some(err) = self.pending_err.take() {
                    return Err(err);
                }
                match self.inner.next_series()? {
                    Some(entry) => entry,
                    None => return Ok(None),
                }
            }
        };

        let key = first.labels.without(&self.replica_label);
        let mut replicas = vec![first.samples];
        loop {
            match self.inner.next_series() {
                Ok(Some(entry)) if entry.labels.without(&self.replica_label) == key => {
                    replicas.push(entry.samples);
                }
                Ok(Some(entry)) => {
                    self.peeked = Some(entry);
                    break;
                }
                Ok(None) => break,
                Err(err) => {
                    // Surfaced on the next pull, after this group
                    self.pending_err = Some(err);
                    break;
                }
            }
        }

        trace!(series = %key, replicas = replicas.len(), "Deduplicated series");
        let samples: Box<dyn SampleIterator> = if replicas.len() == 1 {
            replicas.remove(0)
        } else {
            Box::new(MergedSampleIterator::new(replicas, "dedup"))
        };
        Ok(Some(SeriesEntry::new(key, samples)))
    }
}
