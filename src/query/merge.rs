//! K-way merge of sorted series sets
//!
//! [`MergedSeriesSet`] merges any number of inputs, each already sorted in
//! series order, into one sorted stream. Inputs that yield the same series
//! are combined: their samples are interleaved by [`MergedSampleIterator`],
//! keeping one sample per timestamp.
//!
//! # Series order
//!
//! Without a replica label the order is the plain label comparator. With a
//! replica label, inputs carry that label last (see [`super::fetch`]) and the
//! order is (labels minus replica, canonical full labels). The plain
//! comparator over replica-last label sets would let a series lacking the
//! replica label land between two replicas of the same key, which breaks the
//! grouping the dedup layer relies on.

use super::error::QueryError;
use super::series_set::{SampleIterator, SeriesEntry, SeriesSet};
use crate::metrics;
use crate::types::{Labels, Sample};
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

/// Position of a series in series order
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) struct SeriesKey {
    key: Labels,
    full: Labels,
}

impl SeriesKey {
    pub(crate) fn new(labels: &Labels, replica_label: Option<&str>) -> Self {
        match replica_label {
            Some(replica) => Self {
                key: labels.without(replica),
                full: Labels::new(labels.to_vec()),
            },
            None => Self {
                key: labels.clone(),
                full: Labels::empty(),
            },
        }
    }
}

struct Head {
    order: SeriesKey,
    input: usize,
    entry: SeriesEntry,
}

impl PartialEq for Head {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Head {}

impl PartialOrd for Head {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Head {
    fn cmp(&self, other: &Self) -> Ordering {
        self.order
            .cmp(&other.order)
            .then_with(|| self.input.cmp(&other.input))
    }
}

/// Sorted union of several sorted series sets
pub struct MergedSeriesSet {
    inputs: Vec<Box<dyn SeriesSet>>,
    heap: BinaryHeap<Reverse<Head>>,
    replica_label: Option<String>,
    started: bool,
    pending_err: Option<QueryError>,
}

impl MergedSeriesSet {
    /// Merge `inputs`; their index breaks ties between colliding samples
    pub fn new(inputs: Vec<Box<dyn SeriesSet>>, replica_label: Option<String>) -> Self {
        Self {
            heap: BinaryHeap::with_capacity(inputs.len()),
            inputs,
            replica_label,
            started: false,
            pending_err: None,
        }
    }

    /// Pull the next series of one input onto the heap
    fn refill(&mut self, input: usize) -> Result<(), QueryError> {
        if let Some(entry) = self.inputs[input].next_series()? {
            let order = SeriesKey::new(&entry.labels, self.replica_label.as_deref());
            self.heap.push(Reverse(Head {
                order,
                input,
                entry,
            }));
        }
        Ok(())
    }
}

impl SeriesSet for MergedSeriesSet {
    fn next_series(&mut self) -> Result<Option<SeriesEntry>, QueryError> {
        if let Some(err) = self.pending_err.take() {
            return Err(err);
        }
        if !self.started {
            self.started = true;
            for input in 0..self.inputs.len() {
                self.refill(input)?;
            }
        }

        let Some(Reverse(first)) = self.heap.pop() else {
            return Ok(None);
        };
        let mut group = vec![first];
        while self
            .heap
            .peek()
            .is_some_and(|Reverse(h)| h.order == group[0].order)
        {
            if let Some(Reverse(head)) = self.heap.pop() {
                group.push(head);
            }
        }

        let inputs: Vec<usize> = group.iter().map(|h| h.input).collect();
        let labels = group[0].entry.labels.clone();
        let entry = if group.len() == 1 {
            group.pop().map(|h| h.entry)
        } else {
            let iters = group.into_iter().map(|h| h.entry.samples).collect();
            Some(SeriesEntry::new(
                labels,
                Box::new(MergedSampleIterator::new(iters, "merge")),
            ))
        };

        // A failing refill must not lose the series already popped
        for input in inputs {
            if let Err(err) = self.refill(input) {
                self.pending_err = Some(err);
                break;
            }
        }
        Ok(entry)
    }
}

/// Timestamp-ordered union of several sample iterators
///
/// At a timestamp present in more than one input, the sample of the earliest
/// input wins and the others are dropped. Inputs are few (one per store or
/// replica), so the minimum is found by a linear scan.
pub struct MergedSampleIterator {
    iters: Vec<Box<dyn SampleIterator>>,
    heads: Vec<Option<Sample>>,
    started: bool,
    layer: &'static str,
}

impl MergedSampleIterator {
    /// Merge `iters`; `layer` labels the dropped-samples metric
    pub fn new(iters: Vec<Box<dyn SampleIterator>>, layer: &'static str) -> Self {
        let heads = vec![None; iters.len()];
        Self {
            iters,
            heads,
            started: false,
            layer,
        }
    }

    fn pop_min(&mut self) -> Result<Option<Sample>, QueryError> {
        let mut winner: Option<(usize, Sample)> = None;
        for (i, head) in self.heads.iter().enumerate() {
            if let Some(s) = head {
                if winner.map_or(true, |(_, w)| s.timestamp < w.timestamp) {
                    winner = Some((i, *s));
                }
            }
        }
        let Some((_, sample)) = winner else {
            return Ok(None);
        };

        let mut dropped = 0u64;
        for i in 0..self.heads.len() {
            if self.heads[i].is_some_and(|s| s.timestamp == sample.timestamp) {
                self.heads[i] = self.iters[i].next_sample()?;
                dropped += 1;
            }
        }
        metrics::record_dropped_samples(self.layer, dropped.saturating_sub(1));
        Ok(Some(sample))
    }
}

impl SampleIterator for MergedSampleIterator {
    fn next_sample(&mut self) -> Result<Option<Sample>, QueryError> {
        if !self.started {
            self.started = true;
            for i in 0..self.iters.len() {
                self.heads[i] = self.iters[i].next_sample()?;
            }
        }
        self.pop_min()
    }

    fn seek(&mut self, t: i64) -> Result<Option<Sample>, QueryError> {
        if !self.started {
            self.started = true;
            for i in 0..self.iters.len() {
                self.heads[i] = self.iters[i].seek(t)?;
            }
        } else {
            for i in 0..self.iters.len() {
                if self.heads[i].is_some_and(|s| s.timestamp < t) {
                    self.heads[i] = self.iters[i].seek(t)?;
                }
            }
        }
        self.pop_min()
    }
}
