use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};
use sorter_core::{HeightBuffer, HeightCfg, MatchMode, match_object};
use sorter_traits::{DetectedObject, Shape, TargetSpec, TargetStatus};

// Synthetic catalog of `n` boxes and cylinders with spread-out dimensions.
fn synth_catalog(n: usize, seed: u32) -> Vec<TargetSpec> {
    // tiny PRNG
    let mut state = seed.max(1);
    let mut next_f32 = || {
        let mut x = state;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        state = x;
        (x as f32) / (u32::MAX as f32 + 1.0)
    };
    (0..n)
        .map(|i| TargetSpec {
            common_id: format!("T{i:05}"),
            length_mm: 50.0 + next_f32() * 700.0,
            width_mm: 50.0 + next_f32() * 500.0,
            height_mm: 10.0 + next_f32() * 90.0,
            shape: if i % 3 == 0 { Shape::Cylinder } else { Shape::Box },
            status: if i % 7 == 0 {
                TargetStatus::Processed
            } else {
                TargetStatus::Pending
            },
        })
        .collect()
}

fn sample_size(g: &mut criterion::BenchmarkGroup<'_, criterion::measurement::WallTime>) {
    // Quick tweaking without CLI flags:
    //   BENCH_SAMPLE_SIZE=10 cargo bench -p sorter_core --bench matcher
    match std::env::var("BENCH_SAMPLE_SIZE").ok().and_then(|s| s.parse::<usize>().ok()) {
        Some(n) => g.sample_size(n.max(10)),
        None => g.sample_size(50),
    };
}

pub fn bench_match(c: &mut Criterion) {
    let mut g = c.benchmark_group("match_object");
    sample_size(&mut g);

    let measured = DetectedObject {
        length_mm: 402.0,
        width_mm: 251.0,
        height_mm: 48.0,
        shape: Shape::Box,
        ..Default::default()
    };
    for n in [100usize, 1_000, 10_000] {
        let catalog = synth_catalog(n, 0x5eed);
        for mode in [MatchMode::Footprint, MatchMode::SortedDimensions] {
            g.bench_function(format!("{mode:?}/{n}"), |b| {
                b.iter(|| match_object(black_box(&measured), black_box(&catalog), 0.10, mode));
            });
        }
    }
    g.finish();
}

pub fn bench_height(c: &mut Criterion) {
    let mut g = c.benchmark_group("height_buffer");
    sample_size(&mut g);
    let raws: Vec<i32> = (0..1_000).map(|i| 250 + (i % 40)).collect();
    g.bench_function("update_1000", |b| {
        b.iter_batched(
            || HeightBuffer::new(HeightCfg::default()),
            |mut hb| {
                for &r in &raws {
                    black_box(hb.update(r));
                }
                hb
            },
            BatchSize::SmallInput,
        );
    });
    g.finish();
}

criterion_group!(benches, bench_match, bench_height);
criterion_main!(benches);
