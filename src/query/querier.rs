//! Query orchestration across store nodes
//!
//! A [`Querier`] answers the queries of one request over a fixed time window.
//! Every call fans out to the relevant stores concurrently, bounded by a
//! semaphore, and shares the querier's [`QueryContext`] so that
//! [`Querier::close`] stops all outstanding work.
//!
//! ```text
//! select(matchers)
//!      │
//!      ▼
//!  prune stores ──► select_single × N (JoinSet) ──► merge ──► clamp ──► dedup
//! ```

use super::clamp::ClampedSeriesSet;
use super::context::QueryContext;
use super::dedup::DedupSeriesSet;
use super::error::QueryError;
use super::fetch::select_single;
use super::matcher::{store_matches, Matcher};
use super::merge::MergedSeriesSet;
use super::series_set::{collect_samples, ErrorSeriesSet, SeriesEntry, SeriesSet, VecSeriesSet};
use crate::config::QuerierConfig;
use crate::error::{Error, Result};
use crate::metrics;
use crate::store::{
    LabelNamesRequest, LabelValuesRequest, SeriesRequest, SeriesStream, StoreClient, StoreError,
    StoreInfo,
};
use crate::types::{Labels, Sample};
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

/// Long-lived factory of per-request queriers
///
/// Holds the store registry and configuration shared by every request.
pub struct QueryEngine {
    stores: Vec<Arc<dyn StoreInfo>>,
    config: QuerierConfig,
}

impl QueryEngine {
    /// Create an engine over `stores`
    ///
    /// # Errors
    /// Returns a configuration error if `config` does not validate.
    pub fn new(stores: Vec<Arc<dyn StoreInfo>>, config: QuerierConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { stores, config })
    }

    /// Registered stores
    pub fn stores(&self) -> &[Arc<dyn StoreInfo>] {
        &self.stores
    }

    /// Engine configuration
    pub fn config(&self) -> &QuerierConfig {
        &self.config
    }

    /// Create a querier over the inclusive window `[mint, maxt]`
    ///
    /// # Errors
    /// Returns a validation error if `mint > maxt`.
    pub fn querier(&self, mint: i64, maxt: i64) -> Result<Querier> {
        if mint > maxt {
            return Err(Error::Query(QueryError::validation(format!(
                "invalid time range: mint {} is after maxt {}",
                mint, maxt
            ))));
        }
        let ctx = match self.config.query_timeout() {
            Some(timeout) => QueryContext::with_timeout(timeout),
            None => QueryContext::new(),
        };
        Ok(
            Querier::new(self.stores.clone(), mint, maxt, self.config.replica_label.clone())
                .with_context(ctx)
                .with_max_concurrent_stores(self.config.max_concurrent_stores),
        )
    }
}

/// Per-request querier over a fixed time window
pub struct Querier {
    ctx: QueryContext,
    stores: Vec<Arc<dyn StoreInfo>>,
    mint: i64,
    maxt: i64,
    replica_label: Option<String>,
    limiter: Arc<Semaphore>,
    streams: Vec<Box<dyn SeriesStream>>,
    closed: bool,
}

impl Querier {
    /// Create a querier over `[mint, maxt]`
    ///
    /// With a replica label set, `select` deduplicates replicas.
    pub fn new(
        stores: Vec<Arc<dyn StoreInfo>>,
        mint: i64,
        maxt: i64,
        replica_label: Option<String>,
    ) -> Self {
        Self {
            ctx: QueryContext::new(),
            stores,
            mint,
            maxt,
            replica_label,
            limiter: Arc::new(Semaphore::new(QuerierConfig::default().max_concurrent_stores)),
            streams: Vec::new(),
            closed: false,
        }
    }

    /// Use `ctx` for cancellation and deadline
    pub fn with_context(mut self, ctx: QueryContext) -> Self {
        self.ctx = ctx;
        self
    }

    /// Bound the store RPCs in flight
    pub fn with_max_concurrent_stores(mut self, max: usize) -> Self {
        self.limiter = Arc::new(Semaphore::new(max.max(1)));
        self
    }

    /// Query context shared by every call
    pub fn context(&self) -> &QueryContext {
        &self.ctx
    }

    /// Check whether `close` was called
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Sorted, deduplicated union of a label's values across all stores
    ///
    /// # Errors
    /// Fails with the first store error; no partial result is returned.
    pub async fn label_values(&self, name: &str) -> std::result::Result<Vec<String>, QueryError> {
        let label = name.to_string();
        let per_store = self
            .fan_out("label_values", move |client| {
                let req = LabelValuesRequest {
                    label: label.clone(),
                };
                async move { client.label_values(req).await }
            })
            .await?;
        Ok(union_sorted(per_store))
    }

    /// Sorted, deduplicated union of label names across all stores
    ///
    /// # Errors
    /// Fails with the first store error; no partial result is returned.
    pub async fn label_names(&self) -> std::result::Result<Vec<String>, QueryError> {
        let per_store = self
            .fan_out("label_names", |client| async move {
                client.label_names(LabelNamesRequest).await
            })
            .await?;
        Ok(union_sorted(per_store))
    }

    /// Run `call` against every store concurrently
    async fn fan_out<F, Fut>(
        &self,
        operation: &'static str,
        call: F,
    ) -> std::result::Result<Vec<Vec<String>>, QueryError>
    where
        F: Fn(Arc<dyn StoreClient>) -> Fut,
        Fut: Future<Output = std::result::Result<Vec<String>, StoreError>> + Send + 'static,
    {
        if self.closed {
            return Err(QueryError::cancelled("querier closed"));
        }
        let start = Instant::now();
        let ctx = self.ctx.child();
        let mut tasks = JoinSet::new();

        for store in &self.stores {
            let rpc = call(store.client());
            let ctx = ctx.clone();
            let limiter = Arc::clone(&self.limiter);
            let name = store.name();
            tasks.spawn(async move {
                let _permit = ctx
                    .run(limiter.acquire_owned())
                    .await?
                    .map_err(|_| QueryError::internal("store limiter closed"))?;
                let result = ctx.run(rpc).await?;
                metrics::record_store_request(operation, result.is_ok());
                result.map_err(|e| QueryError::from(e).in_store(&name))
            });
        }

        let mut results = Vec::with_capacity(self.stores.len());
        while let Some(joined) = tasks.join_next().await {
            let outcome = match joined {
                Ok(outcome) => outcome,
                Err(e) => Err(QueryError::internal(format!("store task failed: {}", e))),
            };
            match outcome {
                Ok(values) => results.push(values),
                Err(err) => {
                    warn!(operation, error = %err, "Store fan-out failed");
                    ctx.cancel();
                    tasks.abort_all();
                    return Err(err);
                }
            }
        }

        metrics::record_query(operation, start.elapsed().as_secs_f64());
        debug!(operation, stores = results.len(), "Store fan-out complete");
        Ok(results)
    }

    /// Select series matching `matchers` from every eligible store
    ///
    /// Store failures do not fail the call; they surface through
    /// [`SelectSeriesSet::err`] once iteration reaches them.
    pub async fn select(&mut self, matchers: &[Matcher]) -> SelectSeriesSet {
        if self.closed {
            return SelectSeriesSet::failed(QueryError::cancelled("querier closed"), self.ctx.clone());
        }
        let start = Instant::now();

        let (kept, pruned): (Vec<_>, Vec<_>) = self
            .stores
            .iter()
            .cloned()
            .partition(|store| store_matches(store.as_ref(), matchers));
        metrics::record_pruned_stores(pruned.len());
        debug!(
            kept = kept.len(),
            pruned = pruned.len(),
            matchers = ?matchers.iter().map(|m| m.to_string()).collect::<Vec<_>>(),
            "Pruned stores by external labels"
        );

        let req = SeriesRequest {
            min_time: self.mint,
            max_time: self.maxt,
            matchers: matchers.to_vec(),
        };
        let mut tasks = JoinSet::new();
        for (index, store) in kept.iter().enumerate() {
            let ctx = self.ctx.clone();
            let limiter = Arc::clone(&self.limiter);
            let req = req.clone();
            let replica_label = self.replica_label.clone();
            let name = store.name();
            let client = store.client();
            tasks.spawn(async move {
                let fetched = async {
                    let _permit = ctx
                        .run(limiter.acquire_owned())
                        .await?
                        .map_err(|_| QueryError::internal("store limiter closed"))?;
                    select_single(&ctx, client, req, replica_label.as_deref()).await
                }
                .await;
                metrics::record_store_request("series", fetched.is_ok());
                (index, fetched.map_err(|e| e.in_store(&name)))
            });
        }

        let mut slots: Vec<Option<Box<dyn SeriesSet>>> = (0..kept.len()).map(|_| None).collect();
        let mut failed: Vec<Box<dyn SeriesSet>> = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, Ok(fetch))) => {
                    self.streams.push(fetch.stream);
                    slots[index] = Some(Box::new(fetch.series_set));
                }
                Ok((index, Err(err))) => {
                    warn!(error = %err, "Failed to open series stream");
                    slots[index] = Some(Box::new(ErrorSeriesSet::new(err)));
                }
                Err(e) => {
                    let err = QueryError::internal(format!("store task failed: {}", e));
                    failed.push(Box::new(ErrorSeriesSet::new(err)));
                }
            }
        }
        let inputs: Vec<Box<dyn SeriesSet>> = slots.into_iter().flatten().chain(failed).collect();
        metrics::record_query("select", start.elapsed().as_secs_f64());

        let merged = MergedSeriesSet::new(inputs, self.replica_label.clone());
        let clamped = ClampedSeriesSet::new(merged, self.mint, self.maxt);
        let set: Box<dyn SeriesSet> = match &self.replica_label {
            Some(replica) => Box::new(DedupSeriesSet::new(clamped, replica.clone())),
            None => Box::new(clamped),
        };
        SelectSeriesSet::new(set, self.ctx.clone())
    }

    /// Cancel outstanding work and release every open stream
    ///
    /// Safe to call more than once.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.ctx.cancel();
        let streams = self.streams.len();
        for mut stream in self.streams.drain(..) {
            stream.close();
        }
        debug!(streams, "Querier closed");
    }
}

impl Drop for Querier {
    fn drop(&mut self) {
        self.close();
    }
}

fn union_sorted(per_store: Vec<Vec<String>>) -> Vec<String> {
    let mut all: Vec<String> = per_store.into_iter().flatten().collect();
    all.sort();
    all.dedup();
    all
}

/// Result of [`Querier::select`]
///
/// Iteration stops at the first error, which stays available from
/// [`SelectSeriesSet::err`]. Series returned before the error remain valid.
pub struct SelectSeriesSet {
    inner: Box<dyn SeriesSet>,
    ctx: QueryContext,
    err: Option<QueryError>,
    done: bool,
}

impl SelectSeriesSet {
    fn new(inner: Box<dyn SeriesSet>, ctx: QueryContext) -> Self {
        Self {
            inner,
            ctx,
            err: None,
            done: false,
        }
    }

    fn failed(err: QueryError, ctx: QueryContext) -> Self {
        Self {
            inner: Box::new(VecSeriesSet::default()),
            ctx,
            err: Some(err),
            done: true,
        }
    }

    /// Next series, `None` at the end or after an error
    pub fn next_series(&mut self) -> Option<SeriesEntry> {
        if self.done {
            return None;
        }
        let next = self.ctx.check().and_then(|_| self.inner.next_series());
        match next {
            Ok(Some(entry)) => Some(entry),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(err) => {
                self.done = true;
                self.err = Some(err);
                None
            }
        }
    }

    /// Error that stopped iteration, if any
    pub fn err(&self) -> Option<&QueryError> {
        self.err.as_ref()
    }

    /// Take the error that stopped iteration
    pub fn take_err(&mut self) -> Option<QueryError> {
        self.err.take()
    }

    /// Drain every series and its samples
    ///
    /// # Errors
    /// The first error from the series stream or any sample iterator.
    pub fn collect_series(mut self) -> std::result::Result<Vec<(Labels, Vec<Sample>)>, QueryError> {
        let mut out = Vec::new();
        while let Some(mut entry) = self.next_series() {
            let samples = collect_samples(entry.samples.as_mut())?;
            out.push((entry.labels, samples));
        }
        match self.take_err() {
            Some(err) => Err(err),
            None => Ok(out),
        }
    }
}

impl Iterator for SelectSeriesSet {
    type Item = SeriesEntry;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_series()
    }
}
