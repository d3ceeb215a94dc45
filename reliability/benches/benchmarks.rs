use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use reliability::{
    aggregate, clopper_pearson, BinConfig, Epoch, Pipeline, RawCapture, RawEntry,
};

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

const HOME_LAT: f64 = 44.27;
const HOME_LON: f64 = -71.30;

/// `epochs` snapshots of `aircraft` aircraft spread over roughly 250
/// nmi, with aircraft further out dropping out of more snapshots.
/// Deterministic so runs are comparable.
fn captures(epochs: i64, aircraft: u32) -> Vec<RawCapture> {
    (0..epochs)
        .map(|epoch| {
            let entries = (0..aircraft)
                .filter_map(|id| {
                    let ring = f64::from(id % 50);
                    let bearing = f64::from(id).to_radians() * 7.0;
                    let seen = (i64::from(id) * 31 + epoch * 17) % 100 > i64::from(id % 50) * 2;
                    seen.then(|| RawEntry {
                        aircraft_id: format!("{id:06x}"),
                        latitude: Some(HOME_LAT + ring * 0.08 * bearing.cos()),
                        longitude: Some(HOME_LON + ring * 0.11 * bearing.sin()),
                    })
                })
                .collect();
            RawCapture {
                epoch: Epoch(1_700_000_000_000 + epoch * 1_000),
                entries,
            }
        })
        .collect()
}

fn pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("Pipeline");
    let pipeline = Pipeline::builder()
        .home(HOME_LAT, HOME_LON)
        .build()
        .unwrap();

    for epochs in [60, 600] {
        let input = captures(epochs, 400);
        group.bench_with_input(BenchmarkId::new("run", epochs), &input, |b, input| {
            b.iter(|| pipeline.run(input).unwrap())
        });
    }

    let input = captures(600, 400);
    let (_, records) = pipeline.presence(&input);
    group.bench_with_input("aggregate", &records, |b, records| {
        b.iter(|| aggregate(records, &BinConfig::default()).unwrap())
    });
}

fn interval(c: &mut Criterion) {
    let mut group = c.benchmark_group("Clopper-Pearson");
    for trials in [40_u64, 10_000] {
        group.bench_with_input(BenchmarkId::from_parameter(trials), &trials, |b, &n| {
            b.iter(|| clopper_pearson(n * 9 / 10, n, 0.95))
        });
    }
}

criterion_group!(benches, pipeline, interval);
criterion_main!(benches);
