use criterion::{BatchSize, BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use std::time::Duration;
use steller::{
    Descent, GraphNode, Projection, ProjectionOptions, Rectangle, generate_x_constraints,
    remove_overlaps,
};

/// Jittered grid of boxes, each overlapping its neighbours.
fn overlapping_boxes(count: usize) -> Vec<Rectangle> {
    let side = (count as f64).sqrt().ceil() as usize;
    (0..count)
        .map(|i| {
            let (row, col) = (i / side, i % side);
            let jitter = ((i * 7919) % 13) as f64 / 13.0;
            Rectangle::from_center(col as f64 * 8.0 + jitter, row as f64 * 6.0, 10.0, 8.0)
        })
        .collect()
}

/// Shortest-path distances of a `side x side` grid graph with unit edges.
fn grid_distances(side: usize) -> nalgebra::DMatrix<f64> {
    let n = side * side;
    Descent::create_square_matrix(n, |u, v| {
        let (ur, uc) = (u / side, u % side);
        let (vr, vc) = (v / side, v % side);
        (ur.abs_diff(vr) + uc.abs_diff(vc)) as f64 * 30.0
    })
}

fn initial_positions(n: usize) -> Vec<Vec<f64>> {
    vec![
        (0..n).map(|i| ((i * 37) % 101) as f64).collect(),
        (0..n).map(|i| ((i * 53) % 97) as f64).collect(),
    ]
}

fn bench_scanline(c: &mut Criterion) {
    let mut group = c.benchmark_group("scanline");
    group.measurement_time(Duration::from_secs(5));

    for count in [100usize, 400, 1600] {
        let rs = overlapping_boxes(count);
        let ids: Vec<usize> = (0..count).collect();
        group.bench_with_input(
            BenchmarkId::new("generate_x_constraints", count),
            &rs,
            |b, rs| b.iter(|| black_box(generate_x_constraints(black_box(rs), &ids).len())),
        );
        group.bench_with_input(BenchmarkId::new("remove_overlaps", count), &rs, |b, rs| {
            b.iter_batched(
                || rs.clone(),
                |mut rs| {
                    remove_overlaps(black_box(&mut rs)).unwrap();
                    black_box(rs);
                },
                BatchSize::LargeInput,
            )
        });
    }

    group.finish();
}

fn bench_descent(c: &mut Criterion) {
    let mut group = c.benchmark_group("descent");
    group.measurement_time(Duration::from_secs(10));

    for side in [5usize, 10, 15] {
        let n = side * side;
        let d = grid_distances(side);
        group.bench_with_input(BenchmarkId::new("runge_kutta", n), &d, |b, d| {
            b.iter_batched(
                || Descent::new(initial_positions(n), d.clone()).unwrap(),
                |mut descent| black_box(descent.runge_kutta()),
                BatchSize::LargeInput,
            )
        });
        group.bench_with_input(BenchmarkId::new("projected_runge_kutta", n), &d, |b, d| {
            b.iter_batched(
                || {
                    let x = initial_positions(n);
                    let nodes = (0..n)
                        .map(|i| GraphNode::new(x[0][i], x[1][i], 20.0, 20.0))
                        .collect();
                    let projection = Projection::new(
                        nodes,
                        Vec::new(),
                        None,
                        &[],
                        ProjectionOptions {
                            avoid_overlaps: true,
                            ..Default::default()
                        },
                    )
                    .unwrap();
                    Descent::with_projection(x, d.clone(), projection).unwrap()
                },
                |mut descent| black_box(descent.runge_kutta()),
                BatchSize::LargeInput,
            )
        });
    }

    group.finish();
}

criterion_group!(benches, bench_scanline, bench_descent);
criterion_main!(benches);
