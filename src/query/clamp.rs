//! Inclusive time-range clamping
//!
//! Stores may answer with more data than requested. The clamp layer hides
//! every sample outside `[mint, maxt]` without touching label sets or series
//! order; a series left without samples is still emitted.

use super::error::QueryError;
use super::series_set::{SampleIterator, SeriesEntry, SeriesSet};
use crate::types::Sample;

/// Series set whose sample iterators are clamped to `[mint, maxt]`
pub struct ClampedSeriesSet<S> {
    inner: S,
    mint: i64,
    maxt: i64,
}

impl<S: SeriesSet> ClampedSeriesSet<S> {
    /// Clamp every series of `inner`
    pub fn new(inner: S, mint: i64, maxt: i64) -> Self {
        Self { inner, mint, maxt }
    }
}

impl<S: SeriesSet> SeriesSet for ClampedSeriesSet<S> {
    fn next_series(&mut self) -> Result<Option<SeriesEntry>, QueryError> {
        Ok(self.inner.next_series()?.map(|entry| {
            SeriesEntry::new(
                entry.labels,
                Box::new(ClampedSampleIterator::new(entry.samples, self.mint, self.maxt)),
            )
        }))
    }
}

/// Sample iterator restricted to `[mint, maxt]`
pub struct ClampedSampleIterator<I> {
    inner: I,
    mint: i64,
    maxt: i64,
    started: bool,
    done: bool,
}

impl<I: SampleIterator> ClampedSampleIterator<I> {
    /// Clamp `inner`
    pub fn new(inner: I, mint: i64, maxt: i64) -> Self {
        Self {
            inner,
            mint,
            maxt,
            started: false,
            done: false,
        }
    }

    fn admit(&mut self, sample: Option<Sample>) -> Option<Sample> {
        match sample {
            Some(s) if s.timestamp <= self.maxt => Some(s),
            _ => {
                self.done = true;
                None
            }
        }
    }
}

impl<I: SampleIterator> SampleIterator for ClampedSampleIterator<I> {
    fn next_sample(&mut self) -> Result<Option<Sample>, QueryError> {
        if self.done {
            return Ok(None);
        }
        let sample = if self.started {
            self.inner.next_sample()?
        } else {
            self.started = true;
            self.inner.seek(self.mint)?
        };
        Ok(self.admit(sample))
    }

    fn seek(&mut self, t: i64) -> Result<Option<Sample>, QueryError> {
        if self.done {
            return Ok(None);
        }
        self.started = true;
        let sample = self.inner.seek(t.max(self.mint))?;
        Ok(self.admit(sample))
    }
}
