use nalgebra::DMatrix;
use steller::{Axis, Descent, DescentOptions, Error, GraphNode, LayoutConstraint, Projection};

fn uniform(n: usize, distance: f64) -> DMatrix<f64> {
    Descent::create_square_matrix(n, |i, j| if i == j { 0.0 } else { distance })
}

fn distance(descent: &Descent<impl steller::Projector>, u: usize, v: usize) -> f64 {
    descent
        .positions()
        .iter()
        .map(|row| (row[u] - row[v]).powi(2))
        .sum::<f64>()
        .sqrt()
}

#[test]
fn descent_pulls_two_nodes_to_their_ideal_distance() {
    let mut descent = Descent::new(vec![vec![0.0, 10.0], vec![0.0, 0.0]], uniform(2, 20.0)).unwrap();
    descent.run(10);
    let d = distance(&descent, 0, 1);
    assert!((d - 20.0).abs() < 0.01, "distance {d}");
}

#[test]
fn descent_makes_a_unit_triangle_equilateral() {
    let mut descent = Descent::new(
        vec![vec![0.0, 1.0, 0.0], vec![0.0, 0.0, 1.0]],
        uniform(3, 1.0),
    )
    .unwrap();
    descent.run(100);
    let ds = [
        distance(&descent, 0, 1),
        distance(&descent, 1, 2),
        distance(&descent, 0, 2),
    ];
    let max = ds.iter().copied().fold(f64::MIN, f64::max);
    let min = ds.iter().copied().fold(f64::MAX, f64::min);
    assert!(max / min < 1.01, "distances {ds:?}");
}

#[test]
fn stress_never_rises_between_runge_kutta_steps() {
    // Path a - b - c, started stretched out along x.
    let d = Descent::create_square_matrix(3, |i, j| i.abs_diff(j) as f64);
    let mut descent = Descent::new(vec![vec![0.0, 3.0, 6.0], vec![0.0; 3]], d).unwrap();
    let mut last = descent.compute_stress();
    for _ in 0..20 {
        descent.runge_kutta();
        let stress = descent.compute_stress();
        assert!(stress <= last + 1e-12, "stress rose from {last} to {stress}");
        last = stress;
    }
    assert!(last < 1e-6, "final stress {last}");
}

#[test]
fn reduce_stress_returns_the_new_stress() {
    let mut descent = Descent::new(vec![vec![0.0, 10.0], vec![0.0, 0.0]], uniform(2, 20.0)).unwrap();
    let before = descent.compute_stress();
    let after = descent.reduce_stress();
    assert!(after < before);
    assert_eq!(after, descent.compute_stress());
}

#[test]
fn weights_above_one_let_distant_pairs_relax() {
    let g = Descent::create_square_matrix(2, |_, _| 2.0);
    let mut descent = Descent::new(vec![vec![0.0, 30.0], vec![0.0, 0.0]], uniform(2, 20.0))
        .unwrap()
        .with_weights(g)
        .unwrap();
    descent.run(5);
    assert_eq!(descent.positions()[0][0], 0.0);
    assert_eq!(descent.positions()[0][1], 30.0);
}

#[test]
fn pairs_without_an_ideal_distance_are_ignored() {
    let d = DMatrix::from_row_slice(3, 3, &[
        0.0, 10.0, f64::INFINITY,
        10.0, 0.0, 0.0,
        f64::INFINITY, 0.0, 0.0,
    ]);
    let mut descent =
        Descent::new(vec![vec![0.0, 5.0, 100.0], vec![0.0, 0.0, 0.0]], d).unwrap();
    descent.run(20);
    assert!((distance(&descent, 0, 1) - 10.0).abs() < 0.01);
    assert_eq!(descent.positions()[0][2], 100.0);
    assert!(descent.compute_stress().is_finite());
}

#[test]
fn same_seed_gives_the_same_layout() {
    let layout = |seed| {
        let mut descent = Descent::new(vec![vec![0.0; 4], vec![0.0; 4]], uniform(4, 10.0))
            .unwrap()
            .with_options(DescentOptions {
                random_seed: seed,
                ..DescentOptions::default()
            });
        descent.run(30);
        descent.positions().to_vec()
    };
    assert_eq!(layout(3), layout(3));
}

#[test]
fn projected_descent_keeps_separation_constraints() {
    let nodes = vec![
        GraphNode::new(0.0, 0.0, 10.0, 10.0),
        GraphNode::new(60.0, 0.0, 10.0, 10.0),
    ];
    let projection = Projection::new(
        nodes,
        Vec::new(),
        None,
        &[LayoutConstraint::separation(Axis::X, 0, 1, 50.0)],
        Default::default(),
    )
    .unwrap();
    let mut descent = Descent::with_projection(
        vec![vec![0.0, 60.0], vec![0.0, 0.0]],
        uniform(2, 20.0),
        projection,
    )
    .unwrap();
    descent.run(20);
    let x = &descent.positions()[0];
    assert!(x[1] - x[0] >= 50.0 - 1e-6, "separation {}", x[1] - x[0]);
    assert!(x[1] - x[0] < 51.0);
}

#[test]
fn descent_rejects_malformed_input() {
    assert!(matches!(
        Descent::new(Vec::new(), DMatrix::zeros(0, 0)),
        Err(Error::EmptyPositions)
    ));
    assert!(matches!(
        Descent::new(vec![vec![0.0, 1.0], vec![0.0]], uniform(2, 1.0)),
        Err(Error::DimensionMismatch { expected: 2, got: 1, .. })
    ));
    assert!(matches!(
        Descent::new(vec![vec![0.0, 1.0]], uniform(3, 1.0)),
        Err(Error::DimensionMismatch { expected: 2, got: 3, .. })
    ));

    let projection = Projection::new(
        vec![GraphNode::new(0.0, 0.0, 1.0, 1.0)],
        Vec::new(),
        None,
        &[],
        Default::default(),
    )
    .unwrap();
    assert!(matches!(
        Descent::with_projection(vec![vec![0.0, 1.0], vec![0.0, 0.0]], uniform(2, 1.0), projection),
        Err(Error::DimensionMismatch { expected: 2, got: 1, .. })
    ));
}
