//! Core data types shared by every query layer
//!
//! # Key Types
//!
//! - **`Sample`**: A single measurement (timestamp + value)
//! - **`Label`**: One name/value pair
//! - **`Labels`**: An ordered label set with a total order (see [`compare_labels`])
//! - **`TimeRange`**: Inclusive query window
//!
//! # Example
//!
//! ```rust
//! use kuba_querier::types::{Labels, TimeRange};
//!
//! let a = Labels::from_pairs(&[("job", "api"), ("instance", "a")]);
//! assert_eq!(a.get("instance"), Some("a"));
//!
//! let range = TimeRange::new(1, 300).unwrap();
//! assert!(range.contains(300));
//! ```

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::ops::Deref;

/// A single time-series sample
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Timestamp (milliseconds, by convention of the stores)
    pub timestamp: i64,
    /// Sample value
    pub value: f64,
}

impl Sample {
    /// Create a new sample
    pub fn new(timestamp: i64, value: f64) -> Self {
        Self { timestamp, value }
    }
}

impl From<(i64, f64)> for Sample {
    fn from((timestamp, value): (i64, f64)) -> Self {
        Self { timestamp, value }
    }
}

/// A label name/value pair
///
/// The derived ordering compares by name, then by value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Label {
    /// Label name
    pub name: String,
    /// Label value
    pub value: String,
}

impl Label {
    /// Create a new label
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={:?}", self.name, self.value)
    }
}

/// Compare two label sequences
///
/// Elements are compared pairwise by (name, value). If one sequence is a strict
/// prefix of the other, the shorter one sorts first.
pub fn compare_labels(a: &[Label], b: &[Label]) -> Ordering {
    for (la, lb) in a.iter().zip(b.iter()) {
        match la.name.cmp(&lb.name).then_with(|| la.value.cmp(&lb.value)) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    a.len().cmp(&b.len())
}

/// An ordered set of labels
///
/// Label sets built with [`Labels::from_pairs`] or [`Labels::new`] are
/// canonical: sorted by name with unique names. Sets produced by the per-store
/// fetcher carry the replica label last instead, which is why the raw
/// constructor [`Labels::from_vec_unchecked`] exists.
///
/// The derived `Ord` is the same total order as [`compare_labels`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Labels(Vec<Label>);

impl Labels {
    /// Create a canonical label set, sorting by name
    ///
    /// Later duplicates of a name are dropped.
    pub fn new(mut labels: Vec<Label>) -> Self {
        labels.sort_by(|a, b| a.name.cmp(&b.name));
        labels.dedup_by(|later, earlier| later.name == earlier.name);
        Self(labels)
    }

    /// Create a canonical label set from string pairs
    pub fn from_pairs(pairs: &[(&str, &str)]) -> Self {
        Self::new(pairs.iter().map(|(n, v)| Label::new(*n, *v)).collect())
    }

    /// Wrap labels as given, without sorting
    pub fn from_vec_unchecked(labels: Vec<Label>) -> Self {
        Self(labels)
    }

    /// Empty label set
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    /// Value of the label with the given name
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|l| l.name == name)
            .map(|l| l.value.as_str())
    }

    /// Copy of this set with the named label removed
    pub fn without(&self, name: &str) -> Labels {
        Labels(self.0.iter().filter(|l| l.name != name).cloned().collect())
    }

    /// Copy of this set with `label` appended last
    pub fn with_trailing(&self, label: Label) -> Labels {
        let mut labels = Vec::with_capacity(self.0.len() + 1);
        labels.extend(self.0.iter().cloned());
        labels.push(label);
        Labels(labels)
    }

    /// Check whether the label names are strictly ascending
    pub fn is_canonical(&self) -> bool {
        self.0.windows(2).all(|w| w[0].name < w[1].name)
    }

    /// Borrow the labels as a slice
    pub fn as_slice(&self) -> &[Label] {
        &self.0
    }

    /// Consume into the underlying vector
    pub fn into_vec(self) -> Vec<Label> {
        self.0
    }
}

impl Deref for Labels {
    type Target = [Label];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<Vec<Label>> for Labels {
    fn from(labels: Vec<Label>) -> Self {
        Labels::new(labels)
    }
}

impl fmt::Display for Labels {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, label) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", label)?;
        }
        write!(f, "}}")
    }
}

/// Inclusive time window `[start, end]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    /// Start timestamp (inclusive)
    pub start: i64,
    /// End timestamp (inclusive)
    pub end: i64,
}

impl TimeRange {
    /// Create a validated time range
    ///
    /// Returns `None` when `start > end`.
    pub fn new(start: i64, end: i64) -> Option<Self> {
        if start > end {
            None
        } else {
            Some(Self { start, end })
        }
    }

    /// Range covering every representable timestamp
    pub fn unbounded() -> Self {
        Self {
            start: i64::MIN,
            end: i64::MAX,
        }
    }

    /// Check whether a timestamp lies within the range
    pub fn contains(&self, timestamp: i64) -> bool {
        timestamp >= self.start && timestamp <= self.end
    }

    /// Check whether `[min, max]` overlaps the range
    pub fn overlaps(&self, min: i64, max: i64) -> bool {
        min <= self.end && max >= self.start
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_pairs_sorts_by_name() {
        let labels = Labels::from_pairs(&[("c", "3"), ("a", "1"), ("b", "2")]);
        let names: Vec<&str> = labels.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
        assert!(labels.is_canonical());
    }

    #[test]
    fn test_compare_labels_prefix_sorts_first() {
        let short = Labels::from_pairs(&[("a", "1")]);
        let long = Labels::from_pairs(&[("a", "1"), ("b", "1")]);
        assert_eq!(compare_labels(&short, &long), Ordering::Less);
        assert_eq!(compare_labels(&long, &short), Ordering::Greater);
        assert_eq!(compare_labels(&long, &long.clone()), Ordering::Equal);
    }

    #[test]
    fn test_compare_labels_name_before_value() {
        // ("a", "z") < ("b", "a") because names are compared first
        let a = Labels::from_pairs(&[("a", "z")]);
        let b = Labels::from_pairs(&[("b", "a")]);
        assert_eq!(compare_labels(&a, &b), Ordering::Less);
    }

    #[test]
    fn test_derived_ord_matches_comparator() {
        let sets = vec![
            Labels::from_pairs(&[("a", "1"), ("c", "3")]),
            Labels::from_pairs(&[("a", "1")]),
            Labels::from_pairs(&[("a", "0"), ("z", "9")]),
            Labels::from_pairs(&[("b", "1")]),
        ];
        for x in &sets {
            for y in &sets {
                assert_eq!(x.cmp(y), compare_labels(x, y), "{} vs {}", x, y);
            }
        }
    }

    #[test]
    fn test_without_and_with_trailing() {
        let labels = Labels::from_pairs(&[("a", "1"), ("b", "r1"), ("c", "3")]);
        let key = labels.without("b");
        assert_eq!(key, Labels::from_pairs(&[("a", "1"), ("c", "3")]));

        let emitted = key.with_trailing(Label::new("b", "r1"));
        assert_eq!(emitted.last().map(|l| l.name.as_str()), Some("b"));
        assert!(!emitted.is_canonical());
    }

    #[test]
    fn test_time_range() {
        assert!(TimeRange::new(10, 5).is_none());
        let range = TimeRange::new(1, 300).unwrap();
        assert!(range.contains(1));
        assert!(range.contains(300));
        assert!(!range.contains(0));
        assert!(!range.contains(301));
        assert!(range.overlaps(300, 400));
        assert!(!range.overlaps(301, 400));
    }
}
