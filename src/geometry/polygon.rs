//! Polygon helpers used by the obstacle model: hulls, containment, padding.
//!
//! Polygons are plain vertex slices without a repeated closing vertex.
//! Functions that produce polygons return them counter-clockwise.

use std::f64::consts::{FRAC_PI_4, FRAC_PI_8, PI};

use super::curve::Curve;
use super::intersect::{point_segment_distance, segments_intersect};
use super::point::{POINT_EPSILON, Point, normalize_angle};

/// Largest angular step of a padded corner before another vertex is added.
const PAD_CORNER_STEP: f64 = FRAC_PI_4;

pub fn signed_area(points: &[Point]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let mut twice = 0.0;
    for i in 0..points.len() {
        let a = points[i];
        let b = points[(i + 1) % points.len()];
        twice += a.cross(b);
    }
    twice / 2.0
}

pub fn ensure_ccw(mut points: Vec<Point>) -> Vec<Point> {
    if signed_area(&points) < 0.0 {
        points.reverse();
    }
    points
}

/// Monotone-chain convex hull, counter-clockwise, collinear points dropped.
/// Inputs with fewer than three non-collinear points return the distinct
/// extreme points.
pub fn convex_hull(points: &[Point]) -> Vec<Point> {
    let mut sorted: Vec<Point> = points.iter().copied().filter(|p| p.is_finite()).collect();
    sorted.sort_by(|a, b| a.x.total_cmp(&b.x).then(a.y.total_cmp(&b.y)));
    sorted.dedup_by(|a, b| a.close_to(*b, POINT_EPSILON));
    if sorted.len() < 3 {
        return sorted;
    }

    let mut hull: Vec<Point> = Vec::with_capacity(sorted.len() * 2);
    for &p in &sorted {
        while hull.len() >= 2 && turn(hull[hull.len() - 2], hull[hull.len() - 1], p) <= 0.0 {
            hull.pop();
        }
        hull.push(p);
    }
    let lower_len = hull.len() + 1;
    for &p in sorted.iter().rev().skip(1) {
        while hull.len() >= lower_len && turn(hull[hull.len() - 2], hull[hull.len() - 1], p) <= 0.0 {
            hull.pop();
        }
        hull.push(p);
    }
    hull.pop();
    if hull.len() < 3 {
        let first = sorted[0];
        let last = sorted[sorted.len() - 1];
        return vec![first, last];
    }
    hull
}

fn turn(a: Point, b: Point, c: Point) -> f64 {
    let ab = b - a;
    let ac = c - a;
    let cross = ab.cross(ac);
    // Treat nearly collinear triples as collinear relative to their extent.
    if cross.abs() <= 1e-12 * ab.length().max(ac.length()).max(1.0) {
        0.0
    } else {
        cross
    }
}

/// Even-odd containment. Points exactly on the boundary may go either way;
/// pair with `distance_to_boundary` when that matters.
pub fn point_in_polygon(point: Point, polygon: &[Point]) -> bool {
    let mut inside = false;
    let n = polygon.len();
    if n < 3 {
        return false;
    }
    let mut j = n - 1;
    for i in 0..n {
        let pi = polygon[i];
        let pj = polygon[j];
        if (pi.y > point.y) != (pj.y > point.y) {
            let x = pj.x + (point.y - pj.y) * (pi.x - pj.x) / (pi.y - pj.y);
            if point.x < x {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

pub fn distance_to_boundary(point: Point, polygon: &[Point]) -> f64 {
    match polygon.len() {
        0 => f64::INFINITY,
        1 => point.distance(polygon[0]),
        n => (0..n)
            .map(|i| point_segment_distance(point, polygon[i], polygon[(i + 1) % n]))
            .fold(f64::INFINITY, f64::min),
    }
}

/// Inside and farther than `margin` from every side.
pub fn point_strictly_inside(point: Point, polygon: &[Point], margin: f64) -> bool {
    point_in_polygon(point, polygon) && distance_to_boundary(point, polygon) > margin
}

/// Closed overlap test between two simple polygons.
pub fn polygons_overlap(a: &[Point], b: &[Point]) -> bool {
    if a.is_empty() || b.is_empty() {
        return false;
    }
    for i in 0..a.len() {
        let a1 = a[i];
        let a2 = a[(i + 1) % a.len()];
        for j in 0..b.len() {
            if segments_intersect(a1, a2, b[j], b[(j + 1) % b.len()]) {
                return true;
            }
        }
    }
    point_in_polygon(a[0], b) || point_in_polygon(b[0], a)
}

/// Drops convex-hull vertices that sit within `tolerance` of the chord that
/// would replace them. The result stays convex and every dropped point is
/// within `tolerance` of it.
pub fn simplify_convex(hull: &[Point], tolerance: f64) -> Vec<Point> {
    let n = hull.len();
    if n <= 4 || tolerance <= 0.0 {
        return hull.to_vec();
    }
    let at = |k: usize| hull[k % n];
    let mut kept = vec![hull[0]];
    let mut i = 0;
    while i < n {
        let mut j = i + 1;
        while j < n
            && (i + 1..=j).all(|k| point_segment_distance(at(k), at(i), at(j + 1)) <= tolerance)
        {
            j += 1;
        }
        if j < n {
            kept.push(at(j));
        }
        i = j;
    }
    if kept.len() < 3 { hull.to_vec() } else { kept }
}

/// Outward offset of a convex counter-clockwise polygon by `distance`. Each
/// corner is replaced by vertices on a circumscribed arc, so the result
/// contains every point within `distance` of the input.
pub fn pad_convex_polygon(hull: &[Point], distance: f64) -> Vec<Point> {
    if distance <= 0.0 {
        return hull.to_vec();
    }
    if hull.len() < 3 {
        return pad_points(hull, distance);
    }
    let n = hull.len();
    let mut out = Vec::with_capacity(n * 3);
    for i in 0..n {
        let prev = hull[(i + n - 1) % n];
        let v = hull[i];
        let next = hull[(i + 1) % n];
        let (Some(e1), Some(e2)) = ((v - prev).normalize(), (next - v).normalize()) else {
            continue;
        };
        let n1 = Point::new(e1.y, -e1.x);
        let n2 = Point::new(e2.y, -e2.x);
        let start = n1.angle();
        let sweep = normalize_angle(n2.angle() - start);
        if sweep < 1e-9 || sweep >= PI {
            out.push(v + n1 * distance);
            if sweep >= PI {
                out.push(v + n2 * distance);
            }
            continue;
        }
        let steps = (sweep / PAD_CORNER_STEP - 1e-9).ceil().max(1.0);
        let step = sweep / steps;
        let radius = distance / (step / 2.0).cos();
        for k in 0..steps as usize {
            let angle = start + (k as f64 + 0.5) * step;
            out.push(v + Point::from_angle(angle) * radius);
        }
    }
    out
}

/// Padding of a point or segment: the hull of circumscribed octagons.
fn pad_points(points: &[Point], distance: f64) -> Vec<Point> {
    let radius = distance / FRAC_PI_8.cos();
    let mut samples = Vec::with_capacity(points.len() * 8);
    for &p in points {
        for k in 0..8 {
            let angle = FRAC_PI_8 + k as f64 * FRAC_PI_4;
            samples.push(p + Point::from_angle(angle) * radius);
        }
    }
    convex_hull(&samples)
}

/// Convex padded polygon around arbitrary boundary samples. Concave notches
/// are filled by the hull; near-collinear hull vertices are merged and the
/// padding grows by the merge tolerance to keep containment.
pub fn padded_polygon(points: &[Point], distance: f64) -> Vec<Point> {
    let hull = convex_hull(points);
    if distance <= 0.0 {
        return hull;
    }
    let tolerance = (distance * 0.1).max(1e-3);
    let simplified = simplify_convex(&hull, tolerance);
    if simplified.len() < hull.len() {
        pad_convex_polygon(&simplified, distance + tolerance)
    } else {
        pad_convex_polygon(&hull, distance)
    }
}

/// Flattened closed boundary as a counter-clockwise vertex list without the
/// closing repeat.
pub fn polyline_around_closed_curve(curve: &Curve, tolerance: f64) -> Vec<Point> {
    let mut points = curve.flatten(tolerance);
    if points.len() > 1 && points[0].close_to(points[points.len() - 1], POINT_EPSILON) {
        points.pop();
    }
    ensure_ccw(points)
}

pub fn path_length(points: &[Point]) -> f64 {
    points.windows(2).map(|w| w[0].distance(w[1])).sum()
}

pub fn path_bend_count(points: &[Point]) -> usize {
    if points.len() < 3 {
        return 0;
    }
    let mut bends = 0usize;
    for w in points.windows(3) {
        let d1 = w[1] - w[0];
        let d2 = w[2] - w[1];
        if d1.length() <= POINT_EPSILON || d2.length() <= POINT_EPSILON {
            continue;
        }
        if d1.cross(d2).abs() > 1e-6 * d1.length() * d2.length() || d1.dot(d2) < 0.0 {
            bends += 1;
        }
    }
    bends
}

/// Removes repeated points and interior vertices that continue straight on.
pub fn compress_path(points: &[Point]) -> Vec<Point> {
    let mut out: Vec<Point> = Vec::with_capacity(points.len());
    for &p in points {
        if out.last().is_some_and(|last| last.close_to(p, POINT_EPSILON)) {
            continue;
        }
        while out.len() >= 2 {
            let a = out[out.len() - 2];
            let b = out[out.len() - 1];
            let d1 = b - a;
            let d2 = p - b;
            let straight = d1.cross(d2).abs() <= 1e-9 * d1.length().max(1.0) * d2.length().max(1.0)
                && d1.dot(d2) > 0.0;
            if straight {
                out.pop();
            } else {
                break;
            }
        }
        out.push(p);
    }
    out
}
