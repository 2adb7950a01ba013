//! In-process store
//!
//! `InMemoryStore` serves a fixed list of series and label values. It filters
//! series by matchers but deliberately returns whole chunks, so samples
//! outside the requested window reach the querier just as they would from a
//! remote store. Failures and latency can be injected for tests.

use super::{
    InfoResponse, LabelNamesRequest, LabelValuesRequest, Series, SeriesRequest, SeriesStream,
    StoreClient, StoreError,
};
use crate::types::Labels;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Store node backed by in-memory series
#[derive(Debug, Default)]
pub struct InMemoryStore {
    external_labels: Labels,
    series: Vec<Series>,
    label_values: HashMap<String, Vec<String>>,
    /// Returned by every RPC when set
    error: Option<StoreError>,
    /// Series streams fail after sending this many series
    stream_error: Option<(usize, StoreError)>,
    delay: Option<Duration>,
    requests: Mutex<Vec<SeriesRequest>>,
    opened_streams: Arc<AtomicUsize>,
    closed_streams: Arc<AtomicUsize>,
}

impl InMemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the labels reported by `info`
    pub fn with_external_labels(mut self, labels: Labels) -> Self {
        self.external_labels = labels;
        self
    }

    /// Add a series; streams send series in insertion order
    pub fn with_series(mut self, series: Series) -> Self {
        self.series.push(series);
        self
    }

    /// Set the values returned for `label`
    pub fn with_label_values(mut self, label: &str, values: &[&str]) -> Self {
        self.label_values.insert(
            label.to_string(),
            values.iter().map(|v| v.to_string()).collect(),
        );
        self
    }

    /// Fail every RPC with `error`
    pub fn with_error(mut self, error: StoreError) -> Self {
        self.error = Some(error);
        self
    }

    /// Fail series streams with `error` after `after` series were sent
    pub fn with_stream_error(mut self, after: usize, error: StoreError) -> Self {
        self.stream_error = Some((after, error));
        self
    }

    /// Sleep before answering every RPC
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Series requests received so far
    pub fn requests(&self) -> Vec<SeriesRequest> {
        self.requests.lock().clone()
    }

    /// Number of series streams opened
    pub fn opened_streams(&self) -> usize {
        self.opened_streams.load(Ordering::SeqCst)
    }

    /// Number of series streams closed
    pub fn closed_streams(&self) -> usize {
        self.closed_streams.load(Ordering::SeqCst)
    }

    async fn prepare(&self) -> Result<(), StoreError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match &self.error {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl StoreClient for InMemoryStore {
    async fn info(&self) -> Result<InfoResponse, StoreError> {
        self.prepare().await?;
        let (min_time, max_time) = self
            .series
            .iter()
            .flat_map(|s| s.chunks.iter())
            .fold((i64::MAX, i64::MIN), |(lo, hi), c| {
                (lo.min(c.min_time), hi.max(c.max_time))
            });
        Ok(InfoResponse {
            labels: self.external_labels.clone(),
            min_time,
            max_time,
        })
    }

    async fn series(&self, req: SeriesRequest) -> Result<Box<dyn SeriesStream>, StoreError> {
        self.requests.lock().push(req.clone());
        self.prepare().await?;

        let series: VecDeque<Series> = self
            .series
            .iter()
            .filter(|s| {
                req.matchers
                    .iter()
                    .all(|m| m.matches(s.labels.get(&m.name).unwrap_or("")))
            })
            .cloned()
            .collect();

        self.opened_streams.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MemorySeriesStream {
            series,
            sent: 0,
            fail_after: self.stream_error.clone(),
            closed: false,
            closed_streams: Arc::clone(&self.closed_streams),
        }))
    }

    async fn label_names(&self, _req: LabelNamesRequest) -> Result<Vec<String>, StoreError> {
        self.prepare().await?;
        let names: BTreeSet<String> = self
            .series
            .iter()
            .flat_map(|s| s.labels.iter().map(|l| l.name.clone()))
            .chain(self.label_values.keys().cloned())
            .collect();
        Ok(names.into_iter().collect())
    }

    async fn label_values(&self, req: LabelValuesRequest) -> Result<Vec<String>, StoreError> {
        self.prepare().await?;
        Ok(self
            .label_values
            .get(&req.label)
            .cloned()
            .unwrap_or_default())
    }
}

struct MemorySeriesStream {
    series: VecDeque<Series>,
    sent: usize,
    fail_after: Option<(usize, StoreError)>,
    closed: bool,
    closed_streams: Arc<AtomicUsize>,
}

#[async_trait]
impl SeriesStream for MemorySeriesStream {
    async fn recv(&mut self) -> Result<Option<Series>, StoreError> {
        if self.closed {
            return Ok(None);
        }
        if let Some((after, err)) = &self.fail_after {
            if self.sent >= *after {
                return Err(err.clone());
            }
        }
        let next = self.series.pop_front();
        if next.is_some() {
            self.sent += 1;
        }
        Ok(next)
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.series.clear();
            self.closed_streams.fetch_add(1, Ordering::SeqCst);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{MatchType, Matcher};
    use crate::store::StoreErrorCode;
    use crate::types::Sample;

    fn store() -> InMemoryStore {
        InMemoryStore::new()
            .with_series(Series::new(Labels::from_pairs(&[("a", "1"), ("b", "1")])))
            .with_series(Series::new(Labels::from_pairs(&[("a", "2")])))
            .with_label_values("a", &["1", "2"])
    }

    async fn drain(stream: &mut Box<dyn SeriesStream>) -> Vec<Series> {
        let mut out = Vec::new();
        while let Some(series) = stream.recv().await.unwrap() {
            out.push(series);
        }
        out
    }

    #[tokio::test]
    async fn test_info_reports_external_labels_and_bounds() {
        let samples = [Sample::new(5, 1.0), Sample::new(9, 2.0), Sample::new(30, 3.0)];
        let store = InMemoryStore::new()
            .with_external_labels(Labels::from_pairs(&[("region", "eu")]))
            .with_series(
                Series::from_samples(Labels::from_pairs(&[("a", "1")]), &samples, 2).unwrap(),
            );

        let info = store.info().await.unwrap();
        assert_eq!(info.labels, Labels::from_pairs(&[("region", "eu")]));
        assert_eq!((info.min_time, info.max_time), (5, 30));
    }

    #[tokio::test]
    async fn test_series_filters_by_matchers() {
        let store = store();
        let req = SeriesRequest {
            min_time: 0,
            max_time: 10,
            matchers: vec![Matcher::new(MatchType::Equal, "b", "1").unwrap()],
        };
        let mut stream = store.series(req).await.unwrap();
        let series = drain(&mut stream).await;
        assert_eq!(series.len(), 1);
        assert_eq!(series[0].labels.get("a"), Some("1"));
        assert_eq!(store.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_stream_error_after_n_series() {
        let store = store().with_stream_error(1, StoreError::unavailable("gone"));
        let mut stream = store.series(SeriesRequest::default()).await.unwrap();
        assert!(stream.recv().await.unwrap().is_some());
        let err = stream.recv().await.unwrap_err();
        assert_eq!(err.code, StoreErrorCode::Unavailable);
    }

    #[tokio::test]
    async fn test_close_is_counted_once() {
        let store = store();
        let mut stream = store.series(SeriesRequest::default()).await.unwrap();
        stream.close();
        stream.close();
        assert_eq!(store.opened_streams(), 1);
        assert_eq!(store.closed_streams(), 1);
        assert!(stream.recv().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_label_names_and_values() {
        let store = store();
        let names = store.label_names(LabelNamesRequest).await.unwrap();
        assert_eq!(names, vec!["a".to_string(), "b".to_string()]);

        let values = store
            .label_values(LabelValuesRequest {
                label: "a".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(values, vec!["1".to_string(), "2".to_string()]);
    }

    #[tokio::test]
    async fn test_injected_error() {
        let store = store().with_error(StoreError::internal("boom"));
        assert!(store
            .label_values(LabelValuesRequest {
                label: "a".to_string()
            })
            .await
            .is_err());
        assert!(store.series(SeriesRequest::default()).await.is_err());
    }
}
