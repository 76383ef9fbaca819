use std::collections::HashMap;
use std::f64::consts::FRAC_PI_6;
use std::ops::ControlFlow;

use spline_router::config::BundlingSettings;
use spline_router::error::ConfigError;
use spline_router::geometry::intersect::curve_curve_intersection_one;
use spline_router::geometry::polygon::{distance_to_boundary, padded_polygon};
use spline_router::geometry::{Segment, factory};
use spline_router::routing::BundleKind;
use spline_router::{
    ClusterId, Curve, EdgeId, Node, NodeId, Point, RectilinearRouter, RouteStatus, RouterConfig,
    RouteIssue, RouterError, RouterState, RoutingGraph, SplineRouter, route_edges,
};

fn square(label: &str, x: f64, y: f64) -> Node {
    Node::new(label, factory::rectangle(20.0, 20.0, Point::new(x, y)))
}

fn scenario_config() -> RouterConfig {
    RouterConfig::with_paddings(2.0, 4.0, FRAC_PI_6)
}

fn curve_of(graph: &RoutingGraph, edge: EdgeId) -> &Curve {
    graph
        .edge(edge)
        .and_then(|e| e.geometry.curve.as_ref())
        .expect("edge has a curve")
}

fn on_boundary(point: Point, node: &Node, tolerance: f64) -> bool {
    distance_to_boundary(point, &node.boundary.flatten(0.01)) < tolerance
}

fn keep_out_curves(graph: &RoutingGraph, tight_padding: f64) -> Vec<Curve> {
    graph
        .nodes()
        .iter()
        .map(|node| {
            let padded = padded_polygon(&node.boundary.flatten(0.01), tight_padding / 2.0);
            Curve::closed_polyline(&padded).expect("padded polygon has sides")
        })
        .collect()
}

/// The curve of `edge` keeps clear of the half-padded boundary of each node
/// it does not touch.
fn assert_edge_clear(graph: &RoutingGraph, keep_out: &[Curve], edge: EdgeId) {
    let ends = graph.edge(edge).map(|e| (e.source, e.target)).expect("edge exists");
    let curve = curve_of(graph, edge);
    let curve_box = curve.bounding_box();
    for (n, polygon) in keep_out.iter().enumerate() {
        let node = NodeId(n);
        if node == ends.0 || node == ends.1 {
            continue;
        }
        if !curve_box.intersects(&polygon.bounding_box()) {
            continue;
        }
        assert_eq!(
            curve_curve_intersection_one(curve, polygon),
            None,
            "edge {} crosses node {n}",
            edge.0
        );
    }
}

/// Every routed curve that is not one of several edges between the same
/// nodes must keep clear of the nodes it does not touch.
fn assert_no_overlaps(graph: &RoutingGraph, tight_padding: f64) {
    let mut pair_count: HashMap<(NodeId, NodeId), usize> = HashMap::new();
    for edge in graph.edges() {
        *pair_count.entry(edge.unordered_key()).or_default() += 1;
    }
    let keep_out = keep_out_curves(graph, tight_padding);
    for (i, edge) in graph.edges().iter().enumerate() {
        if edge.is_self_loop() || pair_count[&edge.unordered_key()] > 1 {
            continue;
        }
        assert_edge_clear(graph, &keep_out, EdgeId(i));
    }
}

#[test]
fn double_edge_scenario_gives_one_curve_between_the_boundaries() {
    let mut graph = RoutingGraph::new();
    let top = graph.add_node(Node::new(
        "a",
        factory::rounded_rectangle(20.0, 20.0, 3.0, 3.0, Point::new(0.0, 0.0)),
    ));
    let bottom = graph.add_node(Node::new(
        "b",
        factory::rounded_rectangle(20.0, 20.0, 3.0, 3.0, Point::new(0.0, 200.0)),
    ));
    let edge = graph.add_edge(top, bottom).unwrap();

    let report = route_edges(&mut graph, scenario_config()).unwrap();
    assert_eq!(report.routed, 1);
    assert!(report.issues.is_empty());
    assert_eq!(graph.edge(edge).unwrap().geometry.status, RouteStatus::Routed);

    let curve = curve_of(&graph, edge);
    assert!(on_boundary(curve.start(), &graph.nodes()[0], 1e-3));
    assert!(on_boundary(curve.end(), &graph.nodes()[1], 1e-3));
    assert!(curve.start().close_to(Point::new(0.0, 10.0), 1e-6));
    assert!(curve.end().close_to(Point::new(0.0, 190.0), 1e-6));
}

#[test]
fn collinear_nodes_route_around_the_middle_one() {
    let mut graph = RoutingGraph::new();
    let first = graph.add_node(square("first", 0.0, 0.0));
    graph.add_node(square("middle", 100.0, 0.0));
    let third = graph.add_node(square("third", 200.0, 0.0));
    let edge = graph.add_edge(first, third).unwrap();

    let config = scenario_config();
    let tight = config.tight_padding;
    route_edges(&mut graph, config).unwrap();
    assert_eq!(graph.edge(edge).unwrap().geometry.status, RouteStatus::Routed);

    let curve = curve_of(&graph, edge);
    let points = curve.flatten(0.01);
    let clearance = |p: &Point| {
        let dx = (90.0 - p.x).max(0.0).max(p.x - 110.0);
        let dy = (-10.0 - p.y).max(0.0).max(p.y - 10.0);
        dx.hypot(dy)
    };
    for p in &points {
        assert!(clearance(p) >= tight - 1e-3, "{p:?} is too close to the middle node");
    }
    assert!(points.iter().any(|p| p.y.abs() >= 10.0 + tight - 1e-3));
    assert_no_overlaps(&graph, tight);
}

#[test]
fn progress_is_monotonic_and_ends_at_one() {
    let mut graph = RoutingGraph::new();
    let ids: Vec<NodeId> = (0..4)
        .map(|i| graph.add_node(square(&format!("n{i}"), i as f64 * 60.0, (i % 2) as f64 * 40.0)))
        .collect();
    for w in ids.windows(2) {
        graph.add_edge(w[0], w[1]).unwrap();
    }
    graph.add_edge(ids[0], ids[3]).unwrap();

    let mut seen = Vec::new();
    let mut router = SplineRouter::new(RouterConfig::default()).unwrap();
    router
        .run(&mut graph, |fraction| {
            seen.push(fraction);
            ControlFlow::Continue(())
        })
        .unwrap();
    assert!(!seen.is_empty());
    assert!(seen.windows(2).all(|w| w[0] <= w[1]), "{seen:?}");
    assert_eq!(seen.last().copied(), Some(1.0));
}

#[test]
fn self_loop_leaves_and_returns_to_its_node() {
    let mut graph = RoutingGraph::new();
    let a = graph.add_node(square("a", 0.0, 0.0));
    let b = graph.add_node(square("b", 80.0, 0.0));
    let looped = graph.add_edge(a, a).unwrap();
    graph.add_edge(a, b).unwrap();

    let report = route_edges(&mut graph, RouterConfig::default()).unwrap();
    assert_eq!(report.self_loops, 1);
    assert_eq!(graph.edge(looped).unwrap().geometry.status, RouteStatus::SelfLoop);

    let curve = curve_of(&graph, looped);
    let node = &graph.nodes()[a.0];
    assert!(on_boundary(curve.start(), node, 1e-3));
    assert!(on_boundary(curve.end(), node, 1e-3));
    assert!(curve.start().distance(curve.end()) > 1.0);
    assert!(curve.length() > 20.0);
}

#[test]
fn duplicate_edges_get_distinct_curves() {
    let mut graph = RoutingGraph::new();
    let a = graph.add_node(square("a", 0.0, 0.0));
    let b = graph.add_node(square("b", 100.0, 30.0));
    let first = graph.add_edge(a, b).unwrap();
    let second = graph.add_edge(a, b).unwrap();
    let reverse = graph.add_edge(b, a).unwrap();

    let report = route_edges(&mut graph, RouterConfig::default()).unwrap();
    let curves = [first, second, reverse].map(|e| curve_of(&graph, e).clone());
    assert_ne!(curves[0], curves[1]);
    assert_ne!(curves[0], curves[2]);
    assert_ne!(curves[1], curves[2]);
    assert_eq!(report.bundles.len(), 1);
    assert_eq!(report.bundles[0].kind, BundleKind::MultiEdge);
    assert_eq!(report.bundles[0].members, vec![first, second, reverse]);
}

fn grid_scene() -> RoutingGraph {
    let mut graph = RoutingGraph::new();
    let mut ids = Vec::new();
    for row in 0..3 {
        for col in 0..3 {
            let center = Point::new(col as f64 * 80.0, row as f64 * 80.0);
            let boundary = if (row + col) % 2 == 0 {
                factory::rectangle(20.0, 20.0, center)
            } else {
                factory::circle(10.0, center)
            };
            ids.push(graph.add_node(Node::new(format!("n{row}{col}"), boundary)));
        }
    }
    for row in 0..3 {
        for col in 0..3 {
            let here = ids[row * 3 + col];
            if col < 2 {
                graph.add_edge(here, ids[row * 3 + col + 1]).unwrap();
            }
            if row < 2 {
                graph.add_edge(here, ids[(row + 1) * 3 + col]).unwrap();
            }
        }
    }
    graph.add_edge(ids[0], ids[8]).unwrap();
    graph.add_edge(ids[2], ids[6]).unwrap();
    graph.add_edge(ids[1], ids[7]).unwrap();
    graph
}

#[test]
fn grid_routes_keep_clear_of_other_nodes() {
    let mut graph = grid_scene();
    let config = RouterConfig::default();
    let tight = config.tight_padding;
    let report = route_edges(&mut graph, config).unwrap();
    assert_eq!(report.fallbacks, 0);
    assert!(graph.edges().iter().all(|e| e.geometry.curve.is_some()));
    assert_no_overlaps(&graph, tight);
}

#[test]
fn fresh_runs_are_identical() {
    let mut first = grid_scene();
    let mut second = grid_scene();
    route_edges(&mut first, RouterConfig::default()).unwrap();
    route_edges(&mut second, RouterConfig::default()).unwrap();
    for (a, b) in first.edges().iter().zip(second.edges()) {
        assert_eq!(a.geometry.curve, b.geometry.curve);
        assert_eq!(a.geometry.status, b.geometry.status);
    }
}

/// Node `inner` sits in a cluster between `left` and `right`; `outer` is
/// below it, outside the cluster.
fn cluster_scene() -> (RoutingGraph, ClusterId) {
    let mut graph = RoutingGraph::new();
    let left = graph.add_node(square("left", -100.0, 0.0));
    let inner = graph.add_node(square("inner", 0.0, 0.0));
    let right = graph.add_node(square("right", 100.0, 0.0));
    let outer = graph.add_node(square("outer", 30.0, 120.0));
    let cluster = graph.add_cluster(ClusterId::ROOT, "group", None).unwrap();
    graph.move_node(inner, cluster).unwrap();
    graph.fit_cluster_boundaries(6.0);
    graph.add_edge(left, right).unwrap();
    graph.add_edge(inner, outer).unwrap();
    (graph, cluster)
}

#[test]
fn routes_respect_cluster_boundaries() {
    let (mut graph, cluster) = cluster_scene();
    let report = route_edges(&mut graph, RouterConfig::default()).unwrap();
    assert_eq!(report.fallbacks, 0);

    let boundary = graph
        .cluster(cluster)
        .and_then(|c| c.boundary.clone())
        .expect("fitted boundary");
    let passing = curve_of(&graph, EdgeId(0));
    assert_eq!(curve_curve_intersection_one(passing, &boundary), None);

    let leaving = curve_of(&graph, EdgeId(1));
    assert!(on_boundary(leaving.start(), &graph.nodes()[1], 1e-3));
    assert!(on_boundary(leaving.end(), &graph.nodes()[3], 1e-3));
}

#[test]
fn rectilinear_routes_in_a_cluster_are_axis_aligned() {
    let mut graph = RoutingGraph::new();
    let source = graph.add_node(square("source", 0.0, 0.0));
    let target = graph.add_node(square("target", 120.0, 40.0));
    let cluster = graph.add_cluster(ClusterId::ROOT, "group", None).unwrap();
    graph.move_node(source, cluster).unwrap();
    graph.fit_cluster_boundaries(6.0);
    let edge = graph.add_edge(source, target).unwrap();

    let config = RouterConfig::default();
    let tight = config.tight_padding;
    let mut router = RectilinearRouter::new(config).unwrap();
    let report = router.run(&mut graph, |_| ControlFlow::Continue(())).unwrap();
    assert_eq!(router.state(), RouterState::Done);
    assert_eq!(report.routed, 1);

    let curve = curve_of(&graph, edge);
    let source_box = graph.nodes()[source.0].bounding_box().padded(tight);
    let target_box = graph.nodes()[target.0].bounding_box().padded(tight);
    assert!(source_box.contains(curve.start()));
    assert!(target_box.contains(curve.end()));
    for segment in curve.segments() {
        match segment {
            Segment::Line(line) => {
                let d = line.end - line.start;
                assert!(d.x.abs() < 1e-9 || d.y.abs() < 1e-9, "diagonal segment {line:?}");
            }
            Segment::Arc(arc) => {
                assert!((arc.sweep.abs() - std::f64::consts::FRAC_PI_2).abs() < 1e-9);
            }
            Segment::Cubic(_) => panic!("rectilinear route contains a cubic"),
        }
    }
}

#[test]
fn routers_are_single_use() {
    let mut graph = grid_scene();
    let mut router = RectilinearRouter::new(RouterConfig::default()).unwrap();
    router.run(&mut graph, |_| ControlFlow::Continue(())).unwrap();
    assert!(matches!(
        router.run(&mut graph, |_| ControlFlow::Continue(())),
        Err(RouterError::AlreadyRun)
    ));
}

#[test]
fn bad_settings_are_rejected_before_routing() {
    let wide_cone = RouterConfig::with_paddings(2.0, 4.0, 2.0);
    assert!(matches!(
        SplineRouter::new(wide_cone),
        Err(RouterError::InvalidConfiguration(ConfigError::ConeAngle(_)))
    ));

    let inverted = RouterConfig::with_paddings(4.0, 2.0, FRAC_PI_6);
    assert!(matches!(
        RectilinearRouter::new(inverted),
        Err(RouterError::InvalidConfiguration(ConfigError::LoosePadding { .. }))
    ));
}

#[test]
fn unknown_edge_selection_is_an_invalid_graph() {
    let mut graph = grid_scene();
    let mut router = SplineRouter::new(RouterConfig::default())
        .unwrap()
        .with_edges(vec![EdgeId(99)]);
    assert!(matches!(
        router.run(&mut graph, |_| ControlFlow::Continue(())),
        Err(RouterError::InvalidGraph(_))
    ));
    assert!(graph.edges().iter().all(|e| e.geometry.curve.is_none()));
}

/// Two edges from `a` to `b` with a pair of blockers above and below the
/// straight line between them, `gap` apart.
fn blocked_pair(gap: f64) -> (RoutingGraph, [EdgeId; 2]) {
    let mut graph = RoutingGraph::new();
    let a = graph.add_node(square("a", 0.0, 0.0));
    let b = graph.add_node(square("b", 100.0, 0.0));
    let offset = 5.0 + gap / 2.0;
    for (label, y) in [("above", offset), ("below", -offset)] {
        graph.add_node(Node::new(label, factory::rectangle(10.0, 10.0, Point::new(50.0, y))));
    }
    let first = graph.add_edge(a, b).unwrap();
    let second = graph.add_edge(a, b).unwrap();
    (graph, [first, second])
}

#[test]
fn blocked_duplicates_still_get_distinct_curves() {
    let (mut graph, edges) = blocked_pair(4.2);
    let config = RouterConfig::default();
    let tight = config.tight_padding;
    let report = route_edges(&mut graph, config).unwrap();

    let [c0, c1] = edges.map(|e| curve_of(&graph, e).clone());
    assert_ne!(c0, c1);
    assert!(report.bundles.is_empty());
    assert_eq!(report.overflow, 2);
    for edge in edges {
        let geometry = &graph.edge(edge).unwrap().geometry;
        assert_eq!(geometry.status, RouteStatus::BundleOverflow);
        assert!(geometry.status.is_degraded());
        assert!(report.issues.contains(&RouteIssue::BundleOverflow { edge }));
    }
    let keep_out = keep_out_curves(&graph, tight);
    for edge in edges {
        assert_edge_clear(&graph, &keep_out, edge);
    }
}

#[test]
fn bundle_spacing_stays_at_the_clearance() {
    let (mut graph, edges) = blocked_pair(5.256);
    let config = RouterConfig::default();
    let tight = config.tight_padding;
    let report = route_edges(&mut graph, config).unwrap();
    assert!(report.bundles.iter().all(|b| b.spacing >= tight), "{:?}", report.bundles);
    let [c0, c1] = edges.map(|e| curve_of(&graph, e).clone());
    assert_ne!(c0, c1);

    let mut open = RoutingGraph::new();
    let a = open.add_node(square("a", 0.0, 0.0));
    let b = open.add_node(square("b", 100.0, 0.0));
    let first = open.add_edge(a, b).unwrap();
    let second = open.add_edge(a, b).unwrap();
    let report = route_edges(&mut open, RouterConfig::default()).unwrap();
    assert_eq!(report.bundled, 2);
    assert!(report.bundles[0].spacing >= tight);
    let gap = curve_of(&open, first).start().distance(curve_of(&open, second).start());
    assert!(gap >= tight - 1e-9, "strands start {gap} apart");
    assert_eq!(open.edge(first).unwrap().geometry.status, RouteStatus::Routed);
}

#[test]
fn enclosed_node_falls_back_to_a_straight_segment() {
    let mut graph = RoutingGraph::new();
    let inside = graph.add_node(square("inside", 0.0, 0.0));
    for x in [-30.0, 0.0, 30.0] {
        for y in [-30.0, 0.0, 30.0] {
            if x != 0.0 || y != 0.0 {
                graph.add_node(Node::new("wall", factory::rectangle(30.0, 30.0, Point::new(x, y))));
            }
        }
    }
    let outside = graph.add_node(square("outside", 200.0, 0.0));
    let edge = graph.add_edge(outside, inside).unwrap();

    let report = route_edges(&mut graph, RouterConfig::default()).unwrap();
    assert_eq!(report.fallbacks, 1);
    assert!(report.issues.contains(&RouteIssue::NoPathFound { edge }));
    let geometry = &graph.edge(edge).unwrap().geometry;
    assert_eq!(geometry.status, RouteStatus::Fallback);
    let curve = geometry.curve.as_ref().expect("fallback curve");
    assert!(curve.start().close_to(Point::new(190.0, 0.0), 1e-6));
    assert!(curve.end().close_to(Point::new(10.0, 0.0), 1e-6));
}

#[test]
fn bundled_grid_routes_keep_clear_of_other_nodes() {
    let mut graph = grid_scene();
    let config = RouterConfig {
        bundling: Some(BundlingSettings::default()),
        ..RouterConfig::default()
    };
    let tight = config.tight_padding;
    let report = route_edges(&mut graph, config).unwrap();
    assert_eq!(report.fallbacks, 0);
    assert!(graph.edges().iter().all(|e| e.geometry.curve.is_some()));
    assert_no_overlaps(&graph, tight);
}

