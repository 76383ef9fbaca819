//! Self-loops drawn as one cubic leaving and re-entering the node.

use std::f64::consts::FRAC_PI_4;

use crate::geometry::{Cubic, Curve, Point, Segment};

use super::ports::port_on_boundary;
use super::spatial::EdgeContext;

/// Angle between the loop axis and each of its two ports, seen from the
/// node center.
const PORT_SPREAD: f64 = 0.35;
/// Angle between the loop axis and the tangent of the curve at each port.
const HANDLE_SPREAD: f64 = 0.6;
/// Share of the smaller node side added to the loop size.
const NODE_SHARE: f64 = 0.25;

fn loop_curve(boundary: &Curve, center: Point, axis: Point, size: f64) -> Curve {
    let out_port = port_on_boundary(boundary, center, center + axis.rotate(-PORT_SPREAD));
    let in_port = port_on_boundary(boundary, center, center + axis.rotate(PORT_SPREAD));
    let handle = size * 4.0 / 3.0;
    let cubic = Cubic {
        p0: out_port.point,
        p1: out_port.point + axis.rotate(-HANDLE_SPREAD) * handle,
        p2: in_port.point + axis.rotate(HANDLE_SPREAD) * handle,
        p3: in_port.point,
    };
    Curve::new(Segment::Cubic(cubic))
}

/// Teardrop loop for the `ordinal`-th self-loop on a node. Each further loop
/// on the same node is `spacing` larger. The four diagonals are tried in turn
/// and the first loop clear of other obstacles wins.
pub(crate) fn route_self_loop(
    boundary: &Curve,
    ctx: &EdgeContext<'_, '_>,
    ordinal: usize,
    padding: f64,
    spacing: f64,
) -> Curve {
    let bbox = boundary.bounding_box();
    let center = bbox.center();
    let size = 2.0 * padding + ordinal as f64 * spacing + NODE_SHARE * bbox.width().min(bbox.height());
    let tolerance = (size * 0.01).max(1e-3);
    let mut candidates: Vec<Curve> = (0..4)
        .map(|k| {
            let axis = Point::from_angle(FRAC_PI_4 + k as f64 * 2.0 * FRAC_PI_4);
            loop_curve(boundary, center, axis, size)
        })
        .collect();
    match candidates
        .iter()
        .position(|curve| ctx.polyline_clear(&curve.flatten(tolerance)))
    {
        Some(i) => candidates.swap_remove(i),
        None => {
            tracing::debug!(node = ?ctx.source, "no clear side for self-loop; using the first diagonal");
            candidates.swap_remove(0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::factory;
    use crate::geometry::polygon::{distance_to_boundary, point_in_polygon};
    use crate::graph::{Node, NodeId, RoutingGraph};
    use crate::routing::obstacles::build_obstacles;
    use crate::routing::spatial::ObstacleIndex;

    #[test]
    fn loop_leaves_and_returns_to_the_boundary() {
        let mut graph = RoutingGraph::new();
        graph.add_node(Node::new("a", factory::rectangle(20.0, 10.0, Point::ORIGIN)));
        let obstacles = build_obstacles(&graph, 2.0, 4.0);
        let index = ObstacleIndex::new(&obstacles);
        let ctx = EdgeContext::new(&index, &graph, NodeId(0), NodeId(0));
        let boundary = &graph.nodes()[0].boundary;
        let curve = route_self_loop(boundary, &ctx, 0, 2.0, 2.0);

        let outline = boundary.flatten(0.01);
        assert!(distance_to_boundary(curve.start(), &outline) < 1e-6);
        assert!(distance_to_boundary(curve.end(), &outline) < 1e-6);
        assert!(curve.start().distance(curve.end()) > 1.0);
        let mid = curve.point_at(0.5);
        assert!(!point_in_polygon(mid, &outline));
        assert!(distance_to_boundary(mid, &outline) > 2.0);
    }

    #[test]
    fn repeated_loops_grow() {
        let mut graph = RoutingGraph::new();
        graph.add_node(Node::new("a", factory::circle(8.0, Point::ORIGIN)));
        let obstacles = build_obstacles(&graph, 1.0, 2.0);
        let index = ObstacleIndex::new(&obstacles);
        let ctx = EdgeContext::new(&index, &graph, NodeId(0), NodeId(0));
        let boundary = &graph.nodes()[0].boundary;
        let first = route_self_loop(boundary, &ctx, 0, 1.0, 3.0);
        let second = route_self_loop(boundary, &ctx, 1, 1.0, 3.0);
        assert!(second.length() > first.length());
        assert!(second.point_at(0.5).length() > first.point_at(0.5).length());
    }

    #[test]
    fn blocked_diagonal_is_skipped() {
        let mut graph = RoutingGraph::new();
        graph.add_node(Node::new("a", factory::rectangle(10.0, 10.0, Point::ORIGIN)));
        graph.add_node(Node::new("b", factory::rectangle(10.0, 10.0, Point::new(11.0, 11.0))));
        let obstacles = build_obstacles(&graph, 1.0, 2.0);
        let index = ObstacleIndex::new(&obstacles);
        let ctx = EdgeContext::new(&index, &graph, NodeId(0), NodeId(0));
        let curve = route_self_loop(&graph.nodes()[0].boundary, &ctx, 0, 1.0, 1.0);
        let mid = curve.point_at(0.5);
        assert!(!(mid.x > 0.0 && mid.y > 0.0), "{mid:?}");
    }
}
