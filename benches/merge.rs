use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use kuba_querier::query::Querier;
use kuba_querier::store::{InMemoryStore, Series, StaticStoreInfo, StoreInfo};
use kuba_querier::types::{Label, Labels, Sample};
use std::sync::Arc;

const SERIES_PER_STORE: usize = 100;
const SAMPLES_PER_SERIES: i64 = 240;

fn create_store(replica: usize, offset: i64) -> Arc<dyn StoreInfo> {
    let samples: Vec<Sample> = (0..SAMPLES_PER_SERIES)
        .map(|i| Sample::new(i * 15_000 + offset, 100.0 + i as f64 * 0.5))
        .collect();

    let store = (0..SERIES_PER_STORE).fold(InMemoryStore::new(), |store, i| {
        let labels = Labels::new(vec![
            Label::new("instance", format!("host-{:03}", i)),
            Label::new("job", "bench"),
            Label::new("replica", format!("r{}", replica)),
        ]);
        store.with_series(Series::from_samples(labels, &samples, 120).unwrap())
    });

    let replica_value = format!("r{}", replica);
    Arc::new(StaticStoreInfo::new(
        format!("replica-{}", replica),
        Labels::from_pairs(&[("replica", replica_value.as_str())]),
        Arc::new(store),
    ))
}

fn bench_select(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    let mut group = c.benchmark_group("select");

    for replicas in [1usize, 2, 4].iter() {
        let stores: Vec<Arc<dyn StoreInfo>> = (0..*replicas)
            .map(|r| create_store(r, r as i64 * 1_000))
            .collect();

        group.bench_with_input(BenchmarkId::new("dedup", replicas), replicas, |b, _| {
            b.iter(|| {
                rt.block_on(async {
                    let mut querier =
                        Querier::new(stores.clone(), 0, i64::MAX, Some("replica".to_string()));
                    let result = querier.select(&[]).await.collect_series().unwrap();
                    black_box(result.len())
                })
            });
        });

        group.bench_with_input(BenchmarkId::new("merge", replicas), replicas, |b, _| {
            b.iter(|| {
                rt.block_on(async {
                    let mut querier = Querier::new(stores.clone(), 0, i64::MAX, None);
                    let result = querier.select(&[]).await.collect_series().unwrap();
                    black_box(result.len())
                })
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_select);
criterion_main!(benches);
