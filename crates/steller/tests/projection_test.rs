use steller::{
    Axis, Error, GraphNode, Group, LayoutConstraint, Projection, ProjectionOptions, Projector,
};

fn avoiding_overlaps() -> ProjectionOptions {
    ProjectionOptions {
        avoid_overlaps: true,
        ..Default::default()
    }
}

fn rows(nodes: &[GraphNode]) -> (Vec<f64>, Vec<f64>) {
    (
        nodes.iter().map(|n| n.x).collect(),
        nodes.iter().map(|n| n.y).collect(),
    )
}

#[test]
fn fixed_nodes_barely_move_while_others_make_room() {
    let nodes = vec![
        GraphNode::new(0.0, 0.0, 10.0, 10.0).fixed_at(0.0, 0.0),
        GraphNode::new(1.0, 0.0, 10.0, 10.0),
    ];
    let (x0, y0) = rows(&nodes);
    let mut p = Projection::new(nodes, Vec::new(), None, &[], avoiding_overlaps()).unwrap();
    let mut x = x0.clone();
    p.project_x(&x0, &y0, &mut x);
    assert!(x[0].abs() < 0.05, "fixed node moved to {}", x[0]);
    assert!(x[1] - x[0] >= 10.0, "separation {}", x[1] - x[0]);
    assert!((p.nodes()[1].bounds.cx() - x[1]).abs() < 1e-9);
}

#[test]
fn separation_and_equality_constraints_are_enforced_per_axis() {
    let nodes = vec![GraphNode::new(0.0, 0.0, 1.0, 1.0); 3];
    let constraints = [
        LayoutConstraint::separation(Axis::X, 0, 1, 20.0),
        LayoutConstraint::equality(Axis::Y, 1, 2, 5.0),
    ];
    let mut p = Projection::new(nodes, Vec::new(), None, &constraints, Default::default()).unwrap();

    let (x0, y0) = (vec![0.0; 3], vec![0.0; 3]);
    let mut x = vec![0.0, 0.0, 7.0];
    p.project_x(&x0, &y0, &mut x);
    assert!((x[1] - x[0] - 20.0).abs() < 1e-9);
    assert_eq!(x[2], 7.0);

    let mut y = vec![0.0, 10.0, 10.0];
    p.project_y(&x, &y0, &mut y);
    assert!((y[2] - y[1] - 5.0).abs() < 1e-9);
    assert_eq!(y[0], 0.0);
}

#[test]
fn aligned_nodes_share_a_coordinate() {
    let nodes = vec![
        GraphNode::new(0.0, 0.0, 1.0, 1.0),
        GraphNode::new(3.0, 10.0, 1.0, 1.0),
        GraphNode::new(-2.0, 20.0, 1.0, 1.0),
    ];
    let (x0, y0) = rows(&nodes);
    let mut p = Projection::new(
        nodes,
        Vec::new(),
        None,
        &[LayoutConstraint::alignment(Axis::X, &[0, 1, 2])],
        Default::default(),
    )
    .unwrap();
    let mut x = x0.clone();
    p.project_x(&x0, &y0, &mut x);
    assert!((x[0] - x[1]).abs() < 1e-9);
    assert!((x[1] - x[2]).abs() < 1e-9);
    assert!((x[0] - 1.0 / 3.0).abs() < 1e-9);
}

#[test]
fn nodes_outside_a_group_are_pushed_clear_of_its_box() {
    let nodes = vec![
        GraphNode::new(0.0, 0.0, 10.0, 10.0),
        GraphNode::new(15.0, 0.0, 10.0, 10.0),
        GraphNode::new(22.0, 0.0, 10.0, 10.0),
    ];
    let groups = vec![Group::new(vec![0, 1], Vec::new(), 5.0)];
    let (x0, y0) = rows(&nodes);
    let mut p = Projection::new(nodes, groups, None, &[], avoiding_overlaps()).unwrap();
    assert_eq!(
        p.group_bounds(0).unwrap(),
        steller::Rectangle::new(-10.0, 25.0, -10.0, 10.0)
    );

    let mut x = x0.clone();
    p.project_x(&x0, &y0, &mut x);
    assert!(x[2] - x[1] >= 15.0 - 1e-6, "gap {}", x[2] - x[1]);
    let group = p.group_bounds(0).unwrap();
    let outsider = p.nodes()[2].bounds;
    assert!(outsider.min_x >= group.max_x - 1e-6);
    // Members stay inside their group.
    for member in &p.nodes()[..2] {
        assert!(member.bounds.min_x >= group.min_x - 1e-9);
        assert!(member.bounds.max_x <= group.max_x + 1e-9);
    }
}

#[test]
fn explicit_root_with_nested_groups_projects_both_axes() {
    let nodes: Vec<GraphNode> = (0..4)
        .map(|i| GraphNode::new(i as f64, i as f64, 4.0, 4.0))
        .collect();
    let groups = vec![
        Group::new(Vec::new(), vec![1, 2], 0.0),
        Group::new(vec![0, 1], Vec::new(), 2.0).with_stiffness(0.1),
        Group::new(vec![2, 3], Vec::new(), 2.0),
    ];
    let (x0, y0) = rows(&nodes);
    let mut p = Projection::new(nodes, groups, Some(0), &[], avoiding_overlaps()).unwrap();
    assert_eq!(p.variable_count(), 4 + 2 * 3);

    let mut x = x0.clone();
    p.project_x(&x0, &y0, &mut x);
    let mut y = y0.clone();
    p.project_y(&x, &y0, &mut y);

    let nodes = p.nodes();
    for (i, a) in nodes.iter().enumerate() {
        for b in &nodes[i + 1..] {
            assert!(
                a.bounds.overlap_x(&b.bounds) == 0.0 || a.bounds.overlap_y(&b.bounds) == 0.0,
                "{a:?} overlaps {b:?}"
            );
        }
    }
    let (g1, g2) = (p.group_bounds(1).unwrap(), p.group_bounds(2).unwrap());
    assert!(g1.overlap_x(&g2) < 1e-6 || g1.overlap_y(&g2) < 1e-6);
}

#[test]
fn projection_rejects_dangling_references() {
    let nodes = vec![GraphNode::new(0.0, 0.0, 1.0, 1.0); 2];
    assert!(matches!(
        Projection::new(
            nodes.clone(),
            Vec::new(),
            None,
            &[LayoutConstraint::separation(Axis::X, 0, 9, 1.0)],
            Default::default(),
        ),
        Err(Error::UnknownNode {
            constraint: 0,
            node: 9,
            len: 2
        })
    ));
    assert!(matches!(
        Projection::new(nodes.clone(), Vec::new(), Some(0), &[], Default::default()),
        Err(Error::UnknownRoot { root: 0 })
    ));
    assert!(matches!(
        Projection::new(
            nodes,
            vec![Group::new(vec![5], Vec::new(), 0.0)],
            None,
            &[],
            Default::default(),
        ),
        Err(Error::UnknownLeaf { leaf: 5, .. })
    ));
}
