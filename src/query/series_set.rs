//! Pull-based series and sample iteration
//!
//! Every query layer is a [`SeriesSet`] yielding [`SeriesEntry`] values in
//! ascending label order, each carrying its own [`SampleIterator`]. Layers
//! wrap one another (fetch → merge → clamp → dedup) and pull lazily, the same
//! way operators pull batches from their children.
//!
//! Errors surface through the `Result` of the pull call. After an error a
//! layer makes no promise about further items.

use super::error::QueryError;
use crate::types::{Labels, Sample};
use std::collections::VecDeque;
use std::fmt;

/// Time-ordered samples of one series
pub trait SampleIterator: Send {
    /// Next sample, `Ok(None)` when exhausted
    fn next_sample(&mut self) -> Result<Option<Sample>, QueryError>;

    /// Advance to and return the first sample with `timestamp >= t`
    ///
    /// Samples already returned are never revisited: seeking backwards
    /// returns the next unread sample.
    fn seek(&mut self, t: i64) -> Result<Option<Sample>, QueryError> {
        while let Some(sample) = self.next_sample()? {
            if sample.timestamp >= t {
                return Ok(Some(sample));
            }
        }
        Ok(None)
    }
}

impl SampleIterator for Box<dyn SampleIterator> {
    fn next_sample(&mut self) -> Result<Option<Sample>, QueryError> {
        (**self).next_sample()
    }

    fn seek(&mut self, t: i64) -> Result<Option<Sample>, QueryError> {
        (**self).seek(t)
    }
}

/// One series: its label set and a sample iterator
pub struct SeriesEntry {
    /// Label set as emitted by the producing layer
    pub labels: Labels,
    /// Samples, time-ordered
    pub samples: Box<dyn SampleIterator>,
}

impl SeriesEntry {
    /// Create an entry
    pub fn new(labels: Labels, samples: Box<dyn SampleIterator>) -> Self {
        Self { labels, samples }
    }
}

impl fmt::Debug for SeriesEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SeriesEntry")
            .field("labels", &self.labels)
            .finish_non_exhaustive()
    }
}

/// Ordered sequence of series
pub trait SeriesSet: Send {
    /// Next series, `Ok(None)` when exhausted
    fn next_series(&mut self) -> Result<Option<SeriesEntry>, QueryError>;
}

impl SeriesSet for Box<dyn SeriesSet> {
    fn next_series(&mut self) -> Result<Option<SeriesEntry>, QueryError> {
        (**self).next_series()
    }
}

/// Sample iterator over an in-memory list
#[derive(Debug, Clone, Default)]
pub struct VecSampleIterator {
    samples: VecDeque<Sample>,
}

impl VecSampleIterator {
    /// Iterate `samples` in the given order
    pub fn new(samples: Vec<Sample>) -> Self {
        Self {
            samples: samples.into(),
        }
    }
}

impl SampleIterator for VecSampleIterator {
    fn next_sample(&mut self) -> Result<Option<Sample>, QueryError> {
        Ok(self.samples.pop_front())
    }
}

/// Series set over an in-memory list of entries
#[derive(Debug, Default)]
pub struct VecSeriesSet {
    entries: VecDeque<SeriesEntry>,
}

impl VecSeriesSet {
    /// Yield `entries` in the given order
    pub fn new(entries: Vec<SeriesEntry>) -> Self {
        Self {
            entries: entries.into(),
        }
    }

    /// Build from label sets and sample lists
    pub fn from_samples(series: Vec<(Labels, Vec<Sample>)>) -> Self {
        Self::new(
            series
                .into_iter()
                .map(|(labels, samples)| {
                    SeriesEntry::new(labels, Box::new(VecSampleIterator::new(samples)))
                })
                .collect(),
        )
    }
}

impl SeriesSet for VecSeriesSet {
    fn next_series(&mut self) -> Result<Option<SeriesEntry>, QueryError> {
        Ok(self.entries.pop_front())
    }
}

/// Series set that fails on its first pull
#[derive(Debug)]
pub struct ErrorSeriesSet {
    err: Option<QueryError>,
}

impl ErrorSeriesSet {
    /// Fail with `err`, then report exhaustion
    pub fn new(err: QueryError) -> Self {
        Self { err: Some(err) }
    }
}

impl SeriesSet for ErrorSeriesSet {
    fn next_series(&mut self) -> Result<Option<SeriesEntry>, QueryError> {
        match self.err.take() {
            Some(err) => Err(err),
            None => Ok(None),
        }
    }
}

/// Drain a sample iterator
pub fn collect_samples(iter: &mut dyn SampleIterator) -> Result<Vec<Sample>, QueryError> {
    let mut out = Vec::new();
    while let Some(sample) = iter.next_sample()? {
        out.push(sample);
    }
    Ok(out)
}

/// Drain a series set, materializing every series' samples
pub fn collect_series(set: &mut dyn SeriesSet) -> Result<Vec<(Labels, Vec<Sample>)>, QueryError> {
    let mut out = Vec::new();
    while let Some(mut entry) = set.next_series()? {
        let samples = collect_samples(entry.samples.as_mut())?;
        out.push((entry.labels, samples));
    }
    Ok(out)
}

#[cfg(test)]
pub(crate) mod test_util {
    use super::*;

    /// Samples from (timestamp, value) pairs
    pub fn samples(pairs: &[(i64, f64)]) -> Vec<Sample> {
        pairs.iter().map(|&p| Sample::from(p)).collect()
    }

    /// Boxed list-backed sample iterator
    pub fn sample_iter(pairs: &[(i64, f64)]) -> Box<dyn SampleIterator> {
        Box::new(VecSampleIterator::new(samples(pairs)))
    }

    /// Sample iterator that fails after yielding its samples
    pub struct FailingSampleIterator {
        pub inner: VecSampleIterator,
        pub failed: bool,
    }

    impl SampleIterator for FailingSampleIterator {
        fn next_sample(&mut self) -> Result<Option<Sample>, QueryError> {
            match self.inner.next_sample()? {
                Some(sample) => Ok(Some(sample)),
                None if !self.failed => {
                    self.failed = true;
                    Err(QueryError::decode("corrupted chunk"))
                }
                None => Ok(None),
            }
        }
    }
}
