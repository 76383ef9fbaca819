//! Edge ends on node boundaries and their links into the visibility graph.

use crate::geometry::polygon::polyline_around_closed_curve;
use crate::geometry::{Curve, Point, Rect};

use super::spatial::EdgeContext;
use super::visibility::{VisibilityGraph, port_frame};

/// An edge end on a node boundary, with the boundary direction there
/// (counter-clockwise, so the node interior lies to its left).
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Port {
    pub(crate) point: Point,
    pub(crate) tangent: Point,
}

/// Link from a port into the visibility graph.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct PortLink {
    pub(crate) vertex: usize,
    pub(crate) length: f64,
}

fn fine_tolerance(extent: &Rect) -> f64 {
    (extent.diagonal() * 1e-4).clamp(1e-4, 0.01)
}

/// Where the ray from `center` towards `toward` leaves `boundary`. When the
/// two points coincide the ray points along +x.
pub(crate) fn port_on_boundary(boundary: &Curve, center: Point, toward: Point) -> Port {
    let polygon = polyline_around_closed_curve(boundary, fine_tolerance(&boundary.bounding_box()));
    let dir = (toward - center).normalize().unwrap_or(Point::new(1.0, 0.0));
    let n = polygon.len();
    if n < 2 {
        return Port {
            point: boundary.start(),
            tangent: dir.perp(),
        };
    }

    let mut best: Option<(f64, usize)> = None;
    for i in 0..n {
        let p1 = polygon[i];
        let side = polygon[(i + 1) % n] - p1;
        let denom = dir.cross(side);
        if denom.abs() < 1e-12 {
            continue;
        }
        let q = p1 - center;
        let t = q.cross(side) / denom;
        let u = q.cross(dir) / denom;
        if t >= 0.0 && (-1e-9..=1.0 + 1e-9).contains(&u) && best.is_none_or(|(bt, _)| t < bt) {
            best = Some((t, i));
        }
    }
    let (point, side) = match best {
        Some((t, i)) => (center + dir * t, i),
        None => {
            // The center sits outside a concave boundary; take the closest
            // vertex to the other end instead.
            let (i, _) = polygon
                .iter()
                .enumerate()
                .map(|(i, p)| (i, p.distance(toward)))
                .fold((0, f64::INFINITY), |acc, cur| if cur.1 < acc.1 { cur } else { acc });
            (polygon[i], i)
        }
    };
    let tangent = (polygon[(side + 1) % n] - polygon[side])
        .normalize()
        .unwrap_or(dir.perp());
    Port { point, tangent }
}

/// Nearest visible graph vertex in every cone around the port, seen from the
/// edge described by `ctx`.
pub(crate) fn link_port(vis: &VisibilityGraph, ctx: &EdgeContext<'_, '_>, port: &Port) -> Vec<PortLink> {
    let origin = port.point;
    vis.nearest_in_cones(origin, port_frame(port.tangent), None, |w| {
        ctx.segment_clear(origin, vis.point(w))
    })
    .into_iter()
    .map(|vertex| PortLink {
        vertex,
        length: origin.distance(vis.point(vertex)),
    })
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::factory;

    #[test]
    fn port_follows_center_ray() {
        let square = factory::rectangle(20.0, 20.0, Point::ORIGIN);
        let port = port_on_boundary(&square, Point::ORIGIN, Point::new(100.0, 0.0));
        assert!(port.point.close_to(Point::new(10.0, 0.0), 1e-9), "{port:?}");
        // Counter-clockwise boundary runs upwards on the right side.
        assert!(port.tangent.close_to(Point::new(0.0, 1.0), 1e-9));

        let port = port_on_boundary(&square, Point::ORIGIN, Point::new(0.0, -50.0));
        assert!(port.point.close_to(Point::new(0.0, -10.0), 1e-9));
    }

    #[test]
    fn port_on_circle_is_on_the_curve() {
        let circle = factory::circle(5.0, Point::new(1.0, 1.0));
        let port = port_on_boundary(&circle, Point::new(1.0, 1.0), Point::new(10.0, 10.0));
        assert!((port.point.distance(Point::new(1.0, 1.0)) - 5.0).abs() < 1e-3);
    }

    #[test]
    fn coincident_ends_pick_a_direction() {
        let square = factory::rectangle(4.0, 4.0, Point::ORIGIN);
        let port = port_on_boundary(&square, Point::ORIGIN, Point::ORIGIN);
        assert!(port.point.close_to(Point::new(2.0, 0.0), 1e-9));
    }
}
