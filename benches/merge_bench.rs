use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use geo_dissolve::Merger;
use geo_types::{Geometry, LineString, Polygon};
use rand::seq::SliceRandom;
use rand::SeedableRng;

fn square(x: f64, y: f64) -> Geometry<f64> {
    Polygon::new(
        LineString::from(vec![
            (x, y),
            (x + 1.0, y),
            (x + 1.0, y + 1.0),
            (x, y + 1.0),
            (x, y),
        ]),
        vec![],
    )
    .into()
}

// n*n touching unit squares, shuffled so insertion order doesn't follow the
// grid.
fn generate_grid(n: usize) -> Vec<Geometry<f64>> {
    let mut squares = Vec::with_capacity(n * n);
    for row in 0..n {
        for col in 0..n {
            squares.push(square(col as f64, row as f64));
        }
    }
    let mut rng = rand::rngs::StdRng::seed_from_u64(42);
    squares.shuffle(&mut rng);
    squares
}

fn bench_merge(c: &mut Criterion) {
    let mut group = c.benchmark_group("merge");
    group.sample_size(10); // Reduce sample size for speed

    for size in [5, 10, 20].iter() {
        group.bench_with_input(BenchmarkId::new("grid", size), size, |b, &size| {
            let squares = generate_grid(size);
            b.iter(|| {
                let mut merger = Merger::new();
                merger.add_geometries(squares.iter().cloned());
                merger.merge().unwrap()
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_merge);
criterion_main!(benches);
