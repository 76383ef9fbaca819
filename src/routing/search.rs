//! Shortest paths between two ports over the visibility graph.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::geometry::polygon::compress_path;
use crate::geometry::{POINT_EPSILON, Point, turn_angle};

use super::ports::{Port, PortLink};
use super::spatial::EdgeContext;
use super::visibility::VisibilityGraph;

/// Turns below this angle do not count as bends.
const BEND_ANGLE: f64 = 1e-3;

#[derive(Clone, Copy, Debug)]
struct SearchEntry {
    est: f64,
    bends: u32,
    seq: u64,
    vertex: usize,
    cost: f64,
}

impl Ord for SearchEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .est
            .total_cmp(&self.est)
            .then_with(|| other.bends.cmp(&self.bends))
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for SearchEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for SearchEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for SearchEntry {}

/// Ports of one edge together with their links into the visibility graph.
pub(crate) struct PathQuery<'q> {
    pub(crate) source: Port,
    pub(crate) target: Port,
    pub(crate) source_links: &'q [PortLink],
    pub(crate) target_links: &'q [PortLink],
    /// The straight port-to-port segment is obstacle free.
    pub(crate) direct: bool,
    /// Segments already taken by another route, in either direction.
    pub(crate) avoid: &'q [(Point, Point)],
}

fn avoided(avoid: &[(Point, Point)], a: Point, b: Point) -> bool {
    avoid.iter().any(|&(p, q)| {
        (p.close_to(a, POINT_EPSILON) && q.close_to(b, POINT_EPSILON))
            || (p.close_to(b, POINT_EPSILON) && q.close_to(a, POINT_EPSILON))
    })
}

/// Best-first search from the source port to the target port over `vis`,
/// returning the polyline of graph points between the ports, or `None` when
/// the two ports are not connected.
pub(crate) fn route_path(
    vis: &VisibilityGraph,
    ctx: &EdgeContext<'_, '_>,
    query: &PathQuery<'_>,
    bend_penalty: f64,
) -> Option<Vec<Point>> {
    let start = query.source.point;
    let goal = query.target.point;
    if (query.direct && !avoided(query.avoid, start, goal)) || start.close_to(goal, POINT_EPSILON) {
        return Some(vec![start, goal]);
    }

    let n = vis.vertex_count();
    let source = n;
    let target = n + 1;
    let position = |v: usize| match v {
        v if v == source => start,
        v if v == target => goal,
        v => vis.point(v),
    };
    let mut goal_links: Vec<Option<f64>> = vec![None; n];
    for link in query.target_links {
        goal_links[link.vertex] = Some(link.length);
    }

    let mut best_cost = vec![f64::INFINITY; n + 2];
    let mut bends = vec![0u32; n + 2];
    let mut prev: Vec<Option<usize>> = vec![None; n + 2];
    let mut heap = BinaryHeap::new();
    let mut seq = 0u64;
    best_cost[source] = 0.0;
    heap.push(SearchEntry {
        est: start.distance(goal),
        bends: 0,
        seq,
        vertex: source,
        cost: 0.0,
    });

    let mut reached = false;
    let mut successors: Vec<(usize, f64)> = Vec::new();
    while let Some(entry) = heap.pop() {
        let SearchEntry { vertex, cost, .. } = entry;
        if cost > best_cost[vertex] {
            continue;
        }
        if vertex == target {
            reached = true;
            break;
        }

        successors.clear();
        if vertex == source {
            successors.extend(query.source_links.iter().map(|l| (l.vertex, l.length)));
        } else {
            successors.extend(
                vis.neighbors(vertex)
                    .iter()
                    .filter(|e| ctx.allows_clusters(&e.clusters))
                    .map(|e| (e.to, e.length)),
            );
            if let Some(length) = goal_links[vertex] {
                successors.push((target, length));
            }
        }

        let here = position(vertex);
        for &(next, length) in &successors {
            let there = position(next);
            if avoided(query.avoid, here, there) {
                continue;
            }
            let mut next_cost = cost + length;
            let mut next_bends = bends[vertex];
            if let Some(from) = prev[vertex] {
                let turn = turn_angle(position(from), here, there);
                if turn > BEND_ANGLE {
                    next_bends += 1;
                    next_cost += bend_penalty * turn;
                }
            }
            let better = next_cost < best_cost[next]
                || (next_cost == best_cost[next] && next_bends < bends[next]);
            if !better {
                continue;
            }
            best_cost[next] = next_cost;
            bends[next] = next_bends;
            prev[next] = Some(vertex);
            seq += 1;
            heap.push(SearchEntry {
                est: next_cost + there.distance(goal),
                bends: next_bends,
                seq,
                vertex: next,
                cost: next_cost,
            });
        }
    }

    if !reached {
        return None;
    }
    let mut points = Vec::new();
    let mut cur = Some(target);
    while let Some(v) = cur {
        points.push(position(v));
        cur = prev[v];
    }
    points.reverse();
    Some(points)
}

/// Drops interior points whose neighbours see each other directly, then
/// removes straight continuations. The ends never move and no shortcut
/// lands on a segment in `avoid`.
pub(crate) fn shortcut_path(points: &[Point], ctx: &EdgeContext<'_, '_>, avoid: &[(Point, Point)]) -> Vec<Point> {
    if points.len() <= 2 {
        return points.to_vec();
    }
    let mut out = vec![points[0]];
    let mut i = 0;
    while i < points.len() - 1 {
        let mut j = points.len() - 1;
        while j > i + 1 && (!ctx.segment_clear(points[i], points[j]) || avoided(avoid, points[i], points[j])) {
            j -= 1;
        }
        out.push(points[j]);
        i = j;
    }
    compress_path(&out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::factory;
    use crate::graph::{Node, NodeId, RoutingGraph};
    use crate::routing::obstacles::build_obstacles;
    use crate::routing::ports::{link_port, port_on_boundary};
    use crate::routing::spatial::ObstacleIndex;
    use crate::routing::visibility::build_with_index;
    use std::f64::consts::FRAC_PI_6;

    fn entry(est: f64, bends: u32, seq: u64) -> SearchEntry {
        SearchEntry {
            est,
            bends,
            seq,
            vertex: 0,
            cost: 0.0,
        }
    }

    #[test]
    fn heap_prefers_estimate_then_bends_then_age() {
        let mut heap = BinaryHeap::new();
        heap.push(entry(5.0, 0, 0));
        heap.push(entry(3.0, 2, 1));
        heap.push(entry(3.0, 1, 3));
        heap.push(entry(3.0, 1, 2));
        let order: Vec<u64> = std::iter::from_fn(|| heap.pop()).map(|e| e.seq).collect();
        assert_eq!(order, vec![2, 3, 1, 0]);
    }

    fn collinear() -> RoutingGraph {
        let mut graph = RoutingGraph::new();
        for (i, x) in [0.0, 50.0, 100.0].into_iter().enumerate() {
            graph.add_node(Node::new(
                format!("n{i}"),
                factory::rectangle(20.0, 20.0, Point::new(x, 0.0)),
            ));
        }
        graph
    }

    #[test]
    fn path_bends_around_the_middle_node() {
        let graph = collinear();
        let obstacles = build_obstacles(&graph, 2.0, 4.0);
        let index = ObstacleIndex::new(&obstacles);
        let vis = build_with_index(&index, FRAC_PI_6);
        let ctx = EdgeContext::new(&index, &graph, NodeId(0), NodeId(2));
        let source = port_on_boundary(&graph.nodes()[0].boundary, Point::new(0.0, 0.0), Point::new(100.0, 0.0));
        let target = port_on_boundary(&graph.nodes()[2].boundary, Point::new(100.0, 0.0), Point::new(0.0, 0.0));
        let source_links = link_port(&vis, &ctx, &source);
        let target_links = link_port(&vis, &ctx, &target);
        assert!(!source_links.is_empty());
        let query = PathQuery {
            source,
            target,
            source_links: &source_links,
            target_links: &target_links,
            direct: ctx.segment_clear(source.point, target.point),
            avoid: &[],
        };
        assert!(!query.direct);
        let path = route_path(&vis, &ctx, &query, 0.0).expect("path");
        assert!(path.first().unwrap().close_to(source.point, 1e-9));
        assert!(path.last().unwrap().close_to(target.point, 1e-9));
        assert!(ctx.polyline_clear(&path));
        assert!(path.iter().any(|p| p.y.abs() >= 12.0));

        let smoothed = shortcut_path(&path, &ctx, &[]);
        assert!(smoothed.len() <= path.len());
        assert!(ctx.polyline_clear(&smoothed));
    }

    #[test]
    fn disconnected_ports_find_nothing() {
        let graph = collinear();
        let obstacles = build_obstacles(&graph, 2.0, 4.0);
        let index = ObstacleIndex::new(&obstacles);
        let vis = build_with_index(&index, FRAC_PI_6);
        let ctx = EdgeContext::new(&index, &graph, NodeId(0), NodeId(2));
        let source = port_on_boundary(&graph.nodes()[0].boundary, Point::new(0.0, 0.0), Point::new(100.0, 0.0));
        let target = port_on_boundary(&graph.nodes()[2].boundary, Point::new(100.0, 0.0), Point::new(0.0, 0.0));
        let query = PathQuery {
            source,
            target,
            source_links: &[],
            target_links: &[],
            direct: false,
            avoid: &[],
        };
        assert!(route_path(&vis, &ctx, &query, 0.0).is_none());
    }

    #[test]
    fn avoided_segment_forces_another_route() {
        let mut graph = RoutingGraph::new();
        graph.add_node(Node::new("a", factory::rectangle(20.0, 20.0, Point::new(0.0, 0.0))));
        graph.add_node(Node::new("b", factory::rectangle(20.0, 20.0, Point::new(100.0, 0.0))));
        graph.add_node(Node::new("c", factory::rectangle(10.0, 10.0, Point::new(50.0, 30.0))));
        let obstacles = build_obstacles(&graph, 2.0, 4.0);
        let index = ObstacleIndex::new(&obstacles);
        let vis = build_with_index(&index, FRAC_PI_6);
        let ctx = EdgeContext::new(&index, &graph, NodeId(0), NodeId(1));
        let source = port_on_boundary(&graph.nodes()[0].boundary, Point::new(0.0, 0.0), Point::new(100.0, 0.0));
        let target = port_on_boundary(&graph.nodes()[1].boundary, Point::new(100.0, 0.0), Point::new(0.0, 0.0));
        let source_links = link_port(&vis, &ctx, &source);
        let target_links = link_port(&vis, &ctx, &target);
        let straight = [(target.point, source.point)];
        let query = PathQuery {
            source,
            target,
            source_links: &source_links,
            target_links: &target_links,
            direct: ctx.segment_clear(source.point, target.point),
            avoid: &straight,
        };
        assert!(query.direct);
        let path = route_path(&vis, &ctx, &query, 0.0).expect("path");
        assert!(path.len() > 2);
        assert!(ctx.polyline_clear(&path));

        let smoothed = shortcut_path(&path, &ctx, &straight);
        assert!(smoothed.len() > 2);
        assert_eq!(smoothed[0], source.point);
        assert_eq!(*smoothed.last().unwrap(), target.point);
    }
}
