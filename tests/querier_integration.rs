//! End-to-end tests of the federated querier
//!
//! # Test Coverage
//!
//! 1. **Engine wiring** - Config, store registry, per-request queriers
//! 2. **Replicated stores** - Dedup across replica stores and replica-less stores
//! 3. **Sharded stores** - Pruning by external labels
//! 4. **Failure handling** - Store errors, cancellation, deadlines
//! 5. **Randomized invariants** - Ordering, uniqueness and clamping over random data

use kuba_querier::query::{MatchType, Matcher, QueryContext, QueryErrorKind};
use kuba_querier::store::{InMemoryStore, Series, StaticStoreInfo, StoreError, StoreInfo};
use kuba_querier::types::{Label, Labels, Sample};
use kuba_querier::{Querier, QuerierConfig, QueryEngine};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

// =============================================================================
// Test Helpers
// =============================================================================

fn store(name: &str, external: &[(&str, &str)], inner: InMemoryStore) -> Arc<dyn StoreInfo> {
    Arc::new(StaticStoreInfo::new(
        name,
        Labels::from_pairs(external),
        Arc::new(inner),
    ))
}

fn samples(pairs: &[(i64, f64)]) -> Vec<Sample> {
    pairs.iter().map(|&p| Sample::from(p)).collect()
}

fn series(labels: &[(&str, &str)], pairs: &[(i64, f64)]) -> Series {
    Series::from_samples(Labels::from_pairs(labels), &samples(pairs), 2).expect("valid samples")
}

fn engine(stores: Vec<Arc<dyn StoreInfo>>, replica_label: Option<&str>) -> QueryEngine {
    let config = QuerierConfig {
        replica_label: replica_label.map(str::to_string),
        ..Default::default()
    };
    QueryEngine::new(stores, config).expect("valid config")
}

// =============================================================================
// Replicated and Sharded Stores
// =============================================================================

#[tokio::test]
async fn test_replicated_stores_are_deduplicated() {
    let replica_1 = InMemoryStore::new()
        .with_series(series(
            &[("job", "api"), ("replica", "1")],
            &[(10, 1.0), (20, 2.0), (40, 4.0)],
        ))
        .with_series(series(&[("job", "db"), ("replica", "1")], &[(10, 1.0)]));
    let replica_2 = InMemoryStore::new().with_series(series(
        &[("job", "api"), ("replica", "2")],
        &[(20, 20.0), (30, 3.0), (50, 5.0)],
    ));

    let engine = engine(
        vec![
            store("r1", &[("replica", "1")], replica_1),
            store("r2", &[("replica", "2")], replica_2),
        ],
        Some("replica"),
    );
    let mut querier = engine.querier(0, 45).unwrap();
    let result = querier.select(&[]).await.collect_series().unwrap();

    assert_eq!(
        result,
        vec![
            (
                Labels::from_pairs(&[("job", "api")]),
                samples(&[(10, 1.0), (20, 2.0), (30, 3.0), (40, 4.0)])
            ),
            (Labels::from_pairs(&[("job", "db")]), samples(&[(10, 1.0)])),
        ]
    );
    querier.close();
}

#[tokio::test]
async fn test_series_without_replica_label_joins_its_group() {
    let replicated = InMemoryStore::new()
        .with_series(series(&[("a", "1"), ("r", "x")], &[(1, 1.0)]))
        .with_series(series(&[("a", "1"), ("b", "2"), ("r", "x")], &[(1, 1.0)]));
    let plain = InMemoryStore::new().with_series(series(&[("a", "1")], &[(2, 2.0)]));

    let engine = engine(
        vec![store("replicated", &[], replicated), store("plain", &[], plain)],
        Some("r"),
    );
    let mut querier = engine.querier(0, 10).unwrap();
    let result = querier.select(&[]).await.collect_series().unwrap();

    assert_eq!(
        result,
        vec![
            (Labels::from_pairs(&[("a", "1")]), samples(&[(1, 1.0), (2, 2.0)])),
            (Labels::from_pairs(&[("a", "1"), ("b", "2")]), samples(&[(1, 1.0)])),
        ]
    );
}

#[tokio::test]
async fn test_sharded_stores_are_pruned() {
    let eu = Arc::new(
        InMemoryStore::new().with_series(series(&[("job", "api"), ("region", "eu")], &[(1, 1.0)])),
    );
    let us = Arc::new(
        InMemoryStore::new().with_series(series(&[("job", "api"), ("region", "us")], &[(1, 1.0)])),
    );
    let stores: Vec<Arc<dyn StoreInfo>> = vec![
        Arc::new(StaticStoreInfo::new("eu", Labels::from_pairs(&[("region", "eu")]), eu.clone())),
        Arc::new(StaticStoreInfo::new("us", Labels::from_pairs(&[("region", "us")]), us.clone())),
    ];
    let engine = engine(stores, None);
    let mut querier = engine.querier(0, 10).unwrap();

    let matchers = vec![
        Matcher::new(MatchType::Regexp, "region", "e.*").unwrap(),
        Matcher::new(MatchType::Equal, "job", "api").unwrap(),
    ];
    let result = querier.select(&matchers).await.collect_series().unwrap();

    assert_eq!(result.len(), 1);
    assert_eq!(result[0].0.get("region"), Some("eu"));
    assert_eq!(eu.requests().len(), 1);
    assert_eq!(eu.requests()[0].min_time, 0);
    assert_eq!(eu.requests()[0].max_time, 10);
    assert!(us.requests().is_empty());
}

#[tokio::test]
async fn test_label_values_across_engine() {
    let engine = engine(
        vec![
            store("a", &[], InMemoryStore::new().with_label_values("job", &["db", "api"])),
            store("b", &[], InMemoryStore::new().with_label_values("job", &["api", "web"])),
        ],
        None,
    );
    let querier = engine.querier(0, 10).unwrap();
    assert_eq!(querier.label_values("job").await.unwrap(), vec!["api", "db", "web"]);
    assert!(querier.label_values("missing").await.unwrap().is_empty());
}

// =============================================================================
// Failure Handling
// =============================================================================

#[tokio::test]
async fn test_unreachable_store_fails_select_lazily() {
    let engine = engine(
        vec![
            store("up", &[], InMemoryStore::new().with_series(series(&[("a", "1")], &[(1, 1.0)]))),
            store(
                "down",
                &[],
                InMemoryStore::new().with_error(StoreError::unavailable("connection refused")),
            ),
        ],
        None,
    );
    let mut querier = engine.querier(0, 10).unwrap();
    let mut set = querier.select(&[]).await;

    assert!(set.next_series().is_none());
    let err = set.err().expect("store failure is reported");
    assert_eq!(err.kind, QueryErrorKind::Store);
    assert!(err.message.contains("down"));
}

#[tokio::test]
async fn test_cancel_stops_in_flight_label_values() {
    let slow = InMemoryStore::new()
        .with_label_values("a", &["1"])
        .with_delay(Duration::from_secs(30));
    let querier = Querier::new(vec![store("slow", &[], slow)], 0, 10, None);

    let ctx = querier.context().clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        ctx.cancel();
    });

    let err = querier.label_values("a").await.unwrap_err();
    assert_eq!(err.kind, QueryErrorKind::Cancelled);
}

#[tokio::test(start_paused = true)]
async fn test_engine_deadline() {
    let slow = InMemoryStore::new()
        .with_series(series(&[("a", "1")], &[(1, 1.0)]))
        .with_delay(Duration::from_secs(300));
    let config = QuerierConfig {
        query_timeout_ms: 1_000,
        ..Default::default()
    };
    let engine = QueryEngine::new(vec![store("slow", &[], slow)], config).unwrap();
    let mut querier = engine.querier(0, 10).unwrap();

    let err = querier.select(&[]).await.collect_series().unwrap_err();
    assert_eq!(err.kind, QueryErrorKind::Timeout);
}

#[tokio::test]
async fn test_explicit_context_is_shared() {
    let ctx = QueryContext::new();
    let querier = Querier::new(Vec::new(), 0, 10, None).with_context(ctx.clone());
    ctx.cancel();
    assert!(querier.context().is_cancelled());
}

// =============================================================================
// Randomized Invariants
// =============================================================================

/// Deterministic value per timestamp so replicas agree on values
fn value_at(t: i64) -> f64 {
    t as f64 * 0.5
}

#[tokio::test]
async fn test_randomized_replicas_merge_consistently() {
    let mut rng = StdRng::seed_from_u64(0x5eed);
    let keys: Vec<Labels> = (0..12)
        .map(|i| {
            let job = format!("job-{}", i % 4);
            let instance = format!("i{}", i / 4);
            if i % 5 == 0 {
                Labels::from_pairs(&[("job", job.as_str())])
            } else {
                Labels::from_pairs(&[("instance", instance.as_str()), ("job", job.as_str())])
            }
        })
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    for round in 0..8 {
        let (mint, maxt) = (100, 900);
        let mut expected: BTreeMap<Labels, BTreeSet<i64>> = BTreeMap::new();
        let mut stores = Vec::new();

        for replica in 0..4 {
            let mut store_series = Vec::new();
            for key in &keys {
                if !rng.random_bool(0.7) {
                    continue;
                }
                let mut t = rng.random_range(0..50);
                let mut points = Vec::new();
                while t < 1_000 {
                    points.push(Sample::new(t, value_at(t)));
                    t += rng.random_range(1..40);
                }
                let labels = if replica == 3 {
                    // A store outside the replica set
                    key.clone()
                } else {
                    let mut all = key.to_vec();
                    all.push(Label::new("replica", format!("r{}", replica)));
                    Labels::new(all)
                };
                let chunk_size = rng.random_range(1..50);
                store_series.push(Series::from_samples(labels, &points, chunk_size).unwrap());

                let entry = expected.entry(key.clone()).or_default();
                entry.extend(points.iter().map(|s| s.timestamp).filter(|t| (mint..=maxt).contains(t)));
            }
            store_series.shuffle(&mut rng);

            let inner = store_series
                .into_iter()
                .fold(InMemoryStore::new(), |s, series| s.with_series(series));
            stores.push(store(&format!("store-{}", replica), &[], inner));
        }

        let engine = engine(stores, Some("replica"));
        let mut querier = engine.querier(mint, maxt).unwrap();
        let result = querier.select(&[]).await.collect_series().unwrap();

        let got_keys: Vec<&Labels> = result.iter().map(|(l, _)| l).collect();
        let want_keys: Vec<&Labels> = expected.keys().collect();
        assert_eq!(got_keys, want_keys, "round {}: series keys", round);

        for (labels, points) in &result {
            assert!(labels.get("replica").is_none());
            assert!(points.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
            assert!(points.iter().all(|s| s.value == value_at(s.timestamp)));

            let got: BTreeSet<i64> = points.iter().map(|s| s.timestamp).collect();
            assert_eq!(&got, &expected[labels], "round {}: samples of {}", round, labels);
        }
    }
}
