//! Closed boundary curves for common node shapes. All curves run
//! counter-clockwise and end where they start.

use std::f64::consts::TAU;

use super::curve::{Arc, Cubic, Curve, Segment};
use super::point::Point;

/// Control-point distance for a quarter ellipse approximated by one cubic.
const KAPPA: f64 = 0.552_284_749_830_793_4;

pub fn rectangle(width: f64, height: f64, center: Point) -> Curve {
    let hw = width.abs() / 2.0;
    let hh = height.abs() / 2.0;
    let corners = [
        center + Point::new(-hw, -hh),
        center + Point::new(hw, -hh),
        center + Point::new(hw, hh),
        center + Point::new(-hw, hh),
    ];
    let mut curve = Curve::line(corners[0], corners[1]);
    curve.push(Segment::line(corners[1], corners[2]));
    curve.push(Segment::line(corners[2], corners[3]));
    curve.push(Segment::line(corners[3], corners[0]));
    curve
}

fn quarter_ellipse(center: Point, from: Point, to: Point, rx: f64, ry: f64) -> Segment {
    let scale = |v: Point| Point::new(v.x * rx, v.y * ry);
    if (rx - ry).abs() <= f64::EPSILON {
        let start_angle = from.angle();
        let sweep = if from.cross(to) >= 0.0 { TAU / 4.0 } else { -TAU / 4.0 };
        return Segment::Arc(Arc {
            center,
            radius: rx,
            start_angle,
            sweep,
        });
    }
    let p0 = center + scale(from);
    let p3 = center + scale(to);
    Segment::Cubic(Cubic {
        p0,
        p1: p0 + scale(to) * KAPPA,
        p2: p3 + scale(from) * KAPPA,
        p3,
    })
}

/// Rectangle with elliptic corners. Radii are clamped to half the sides; a
/// zero radius gives a plain rectangle.
pub fn rounded_rectangle(width: f64, height: f64, rx: f64, ry: f64, center: Point) -> Curve {
    let hw = width.abs() / 2.0;
    let hh = height.abs() / 2.0;
    let rx = rx.clamp(0.0, hw);
    let ry = ry.clamp(0.0, hh);
    if rx <= f64::EPSILON || ry <= f64::EPSILON {
        return rectangle(width, height, center);
    }
    let left = center.x - hw;
    let right = center.x + hw;
    let bottom = center.y - hh;
    let top = center.y + hh;
    let east = Point::new(1.0, 0.0);
    let north = Point::new(0.0, 1.0);

    let mut out = Vec::with_capacity(8);
    push_side(&mut out, Point::new(left + rx, bottom), Point::new(right - rx, bottom));
    out.push(quarter_ellipse(Point::new(right - rx, bottom + ry), -north, east, rx, ry));
    push_side(&mut out, Point::new(right, bottom + ry), Point::new(right, top - ry));
    out.push(quarter_ellipse(Point::new(right - rx, top - ry), east, north, rx, ry));
    push_side(&mut out, Point::new(right - rx, top), Point::new(left + rx, top));
    out.push(quarter_ellipse(Point::new(left + rx, top - ry), north, -east, rx, ry));
    push_side(&mut out, Point::new(left, top - ry), Point::new(left, bottom + ry));
    out.push(quarter_ellipse(Point::new(left + rx, bottom + ry), -east, -north, rx, ry));
    Curve::from_segments(out).unwrap_or_else(|| rectangle(width, height, center))
}

fn push_side(out: &mut Vec<Segment>, a: Point, b: Point) {
    if !a.close_to(b, 1e-9) {
        out.push(Segment::line(a, b));
    }
}

pub fn circle(radius: f64, center: Point) -> Curve {
    Curve::new(Segment::Arc(Arc {
        center,
        radius: radius.abs(),
        start_angle: 0.0,
        sweep: TAU,
    }))
}

pub fn ellipse(rx: f64, ry: f64, center: Point) -> Curve {
    let rx = rx.abs();
    let ry = ry.abs();
    if (rx - ry).abs() <= f64::EPSILON {
        return circle(rx, center);
    }
    let east = Point::new(1.0, 0.0);
    let north = Point::new(0.0, 1.0);
    let mut curve = Curve::new(quarter_ellipse(center, east, north, rx, ry));
    curve.push(quarter_ellipse(center, north, -east, rx, ry));
    curve.push(quarter_ellipse(center, -east, -north, rx, ry));
    curve.push(quarter_ellipse(center, -north, east, rx, ry));
    curve
}

/// Closed polygon through `points`; `None` for fewer than two distinct points.
pub fn polygon(points: &[Point]) -> Option<Curve> {
    Curve::closed_polyline(points)
}
