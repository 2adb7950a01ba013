//! Sample iteration over a store series' chunks
//!
//! Chunks are decoded lazily, one at a time, in the order the store sent
//! them. Seeking skips whole chunks by their declared time bounds without
//! decoding them.

use super::error::QueryError;
use super::series_set::SampleIterator;
use crate::compression::XorIterator;
use crate::store::{Chunk, ChunkEncoding};
use crate::types::Sample;
use std::collections::VecDeque;

/// Sample iterator over the chunks of one series
///
/// Timestamps are exposed strictly increasing; a sample at or before the
/// previously returned timestamp (overlapping chunks) is skipped. A decode
/// error ends the series: later pulls return `Ok(None)`.
#[derive(Debug)]
pub struct ChunkSeriesIterator {
    pending: VecDeque<Chunk>,
    current: Option<XorIterator>,
    last_timestamp: Option<i64>,
    failed: bool,
}

impl ChunkSeriesIterator {
    /// Iterate the samples of `chunks`
    pub fn new(chunks: Vec<Chunk>) -> Self {
        Self {
            pending: chunks.into(),
            current: None,
            last_timestamp: None,
            failed: false,
        }
    }

    fn open(chunk: Chunk) -> Result<XorIterator, QueryError> {
        match chunk.encoding {
            ChunkEncoding::Xor => Ok(XorIterator::new(chunk.data)?),
        }
    }

    /// Next sample at or after `min_t`, opening chunks as needed
    fn advance(&mut self, min_t: i64) -> Result<Option<Sample>, QueryError> {
        if self.failed {
            return Ok(None);
        }
        let next = self.decode_from(min_t);
        if next.is_err() {
            self.failed = true;
            self.current = None;
            self.pending.clear();
        }
        next
    }

    fn decode_from(&mut self, min_t: i64) -> Result<Option<Sample>, QueryError> {
        loop {
            if let Some(iter) = self.current.as_mut() {
                match iter.next_sample()? {
                    Some(sample) => {
                        if self.last_timestamp.is_some_and(|t| sample.timestamp <= t) {
                            continue;
                        }
                        self.last_timestamp = Some(sample.timestamp);
                        if sample.timestamp >= min_t {
                            return Ok(Some(sample));
                        }
                        continue;
                    }
                    None => self.current = None,
                }
            }

            let chunk = loop {
                match self.pending.pop_front() {
                    None => return Ok(None),
                    Some(chunk) if chunk.max_time < min_t => continue,
                    Some(chunk) => break chunk,
                }
            };
            self.current = Some(Self::open(chunk)?);
        }
    }
}

impl SampleIterator for ChunkSeriesIterator {
    fn next_sample(&mut self) -> Result<Option<Sample>, QueryError> {
        self.advance(i64::MIN)
    }

    fn seek(&mut self, t: i64) -> Result<Option<Sample>, QueryError> {
        self.advance(t)
    }
}
