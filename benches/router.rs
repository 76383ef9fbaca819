use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use spline_router::config::BundlingSettings;
use spline_router::geometry::factory;
use spline_router::routing::{build_obstacles, build_visibility_graph};
use spline_router::{Node, NodeId, Point, RectilinearRouter, RouterConfig, RoutingGraph, SplineRouter};
use std::hint::black_box;
use std::ops::ControlFlow;

/// `side` x `side` grid of boxes and ellipses, each wired to its right and
/// lower neighbour plus `extra_edges` long diagonals across the grid.
fn grid_scene(side: usize, extra_edges: usize) -> RoutingGraph {
    let mut graph = RoutingGraph::new();
    let spacing = 60.0;
    let mut ids = Vec::with_capacity(side * side);
    for row in 0..side {
        for col in 0..side {
            let center = Point::new(col as f64 * spacing, row as f64 * spacing);
            let boundary = if (row + col) % 2 == 0 {
                factory::rounded_rectangle(24.0, 16.0, 3.0, 3.0, center)
            } else {
                factory::ellipse(12.0, 8.0, center)
            };
            ids.push(graph.add_node(Node::new(format!("n{row}_{col}"), boundary)));
        }
    }
    let at = |row: usize, col: usize| -> NodeId { ids[row * side + col] };
    for row in 0..side {
        for col in 0..side {
            if col + 1 < side {
                let _ = graph.add_edge(at(row, col), at(row, col + 1));
            }
            if row + 1 < side {
                let _ = graph.add_edge(at(row, col), at(row + 1, col));
            }
        }
    }
    let mut count = 0usize;
    'outer: for row in 0..side {
        for col in 0..side {
            if count >= extra_edges {
                break 'outer;
            }
            let target = at(side - 1 - row, side - 1 - col);
            if target != at(row, col) {
                let _ = graph.add_edge(at(row, col), target);
                count += 1;
            }
        }
    }
    graph
}

fn bench_visibility(c: &mut Criterion) {
    let mut group = c.benchmark_group("visibility_graph");
    let config = RouterConfig::default();
    for side in [4usize, 8, 12] {
        let graph = grid_scene(side, 0);
        group.bench_with_input(BenchmarkId::from_parameter(side), &graph, |b, graph| {
            b.iter(|| {
                let obstacles = build_obstacles(black_box(graph), config.tight_padding, config.loose_padding);
                let vis = build_visibility_graph(&obstacles, config.cone_half_angle);
                black_box(vis.edge_count());
            });
        });
    }
    group.finish();
}

fn bench_spline_routing(c: &mut Criterion) {
    let mut group = c.benchmark_group("spline_routing");
    let plain = RouterConfig::default();
    let bundled = RouterConfig {
        bundling: Some(BundlingSettings::default()),
        ..RouterConfig::default()
    };
    for (side, extra_edges) in [(4usize, 4usize), (6, 12), (8, 24)] {
        let name = format!("grid_{side}_{extra_edges}");
        let graph = grid_scene(side, extra_edges);
        group.bench_with_input(BenchmarkId::new("plain", &name), &graph, |b, graph| {
            b.iter(|| {
                let mut graph = graph.clone();
                let mut router = SplineRouter::new(plain.clone()).expect("valid config");
                let report = router
                    .run(black_box(&mut graph), |_| ControlFlow::Continue(()))
                    .expect("routing failed");
                black_box(report.routed);
            });
        });
        group.bench_with_input(BenchmarkId::new("bundled", &name), &graph, |b, graph| {
            b.iter(|| {
                let mut graph = graph.clone();
                let mut router = SplineRouter::new(bundled.clone()).expect("valid config");
                let report = router
                    .run(black_box(&mut graph), |_| ControlFlow::Continue(()))
                    .expect("routing failed");
                black_box(report.bundled);
            });
        });
    }
    group.finish();
}

fn bench_rectilinear_routing(c: &mut Criterion) {
    let mut group = c.benchmark_group("rectilinear_routing");
    let config = RouterConfig::default();
    for (side, extra_edges) in [(4usize, 4usize), (6, 12), (8, 24)] {
        let name = format!("grid_{side}_{extra_edges}");
        let graph = grid_scene(side, extra_edges);
        group.bench_with_input(BenchmarkId::from_parameter(name), &graph, |b, graph| {
            b.iter(|| {
                let mut graph = graph.clone();
                let mut router = RectilinearRouter::new(config.clone()).expect("valid config");
                let report = router
                    .run(black_box(&mut graph), |_| ControlFlow::Continue(()))
                    .expect("routing failed");
                black_box(report.routed);
            });
        });
    }
    group.finish();
}

criterion_group!(
    name = benches;
    config = Criterion::default().sample_size(20);
    targets = bench_visibility, bench_spline_routing, bench_rectilinear_routing
);
criterion_main!(benches);
