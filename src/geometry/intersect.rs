use super::curve::Curve;
use super::point::{POINT_EPSILON, Point};
use super::polygon::{distance_to_boundary, point_in_polygon};
use super::rect::Rect;

fn orient(a: Point, b: Point, c: Point) -> f64 {
    (b - a).cross(c - a)
}

fn on_segment(a: Point, b: Point, c: Point) -> bool {
    c.x >= a.x.min(b.x) - POINT_EPSILON
        && c.x <= a.x.max(b.x) + POINT_EPSILON
        && c.y >= a.y.min(b.y) - POINT_EPSILON
        && c.y <= a.y.max(b.y) + POINT_EPSILON
}

/// Closed segment test: touching endpoints and collinear overlaps count.
pub fn segments_intersect(a: Point, b: Point, c: Point, d: Point) -> bool {
    let o1 = orient(a, b, c);
    let o2 = orient(a, b, d);
    let o3 = orient(c, d, a);
    let o4 = orient(c, d, b);
    if (o1 > 0.0 && o2 < 0.0 || o1 < 0.0 && o2 > 0.0)
        && (o3 > 0.0 && o4 < 0.0 || o3 < 0.0 && o4 > 0.0)
    {
        return true;
    }
    (o1.abs() <= POINT_EPSILON && on_segment(a, b, c))
        || (o2.abs() <= POINT_EPSILON && on_segment(a, b, d))
        || (o3.abs() <= POINT_EPSILON && on_segment(c, d, a))
        || (o4.abs() <= POINT_EPSILON && on_segment(c, d, b))
}

/// Parameters along `a -> b` where it meets `c -> d`. Collinear overlaps
/// report both ends of the shared stretch.
fn segment_hit_parameters(a: Point, b: Point, c: Point, d: Point, out: &mut Vec<f64>) {
    let r = b - a;
    let s = d - c;
    let denom = r.cross(s);
    let qp = c - a;
    let len_sq = r.length_squared();
    if len_sq <= f64::EPSILON {
        return;
    }
    if denom.abs() <= 1e-12 * len_sq.max(s.length_squared()) {
        if qp.cross(r).abs() > POINT_EPSILON * r.length() {
            return;
        }
        for t in [qp.dot(r) / len_sq, (d - a).dot(r) / len_sq] {
            if (-1e-9..=1.0 + 1e-9).contains(&t) {
                out.push(t.clamp(0.0, 1.0));
            }
        }
        return;
    }
    let t = qp.cross(s) / denom;
    let u = qp.cross(r) / denom;
    if (-1e-9..=1.0 + 1e-9).contains(&t) && (-1e-9..=1.0 + 1e-9).contains(&u) {
        out.push(t.clamp(0.0, 1.0));
    }
}

/// Intersection point of two closed segments, if any.
pub fn segment_intersection(a: Point, b: Point, c: Point, d: Point) -> Option<Point> {
    let mut params = Vec::with_capacity(2);
    segment_hit_parameters(a, b, c, d, &mut params);
    params
        .into_iter()
        .min_by(|x, y| x.total_cmp(y))
        .map(|t| a.lerp(b, t))
}

pub fn point_segment_distance(p: Point, a: Point, b: Point) -> f64 {
    let ab = b - a;
    let len_sq = ab.length_squared();
    if len_sq <= f64::EPSILON {
        return p.distance(a);
    }
    let t = ((p - a).dot(ab) / len_sq).clamp(0.0, 1.0);
    p.distance(a + ab * t)
}

/// How a segment sits relative to a polygon: whether any open stretch of it
/// lies strictly inside, strictly outside, or only on the boundary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SegmentRelation {
    pub inside: bool,
    pub outside: bool,
}

impl SegmentRelation {
    pub fn crosses_boundary(&self) -> bool {
        self.inside && self.outside
    }
}

/// Splits `a -> b` at every boundary hit and classifies the midpoint of each
/// piece. Points within `margin` of the boundary count as on it.
pub fn classify_segment(a: Point, b: Point, polygon: &[Point], margin: f64) -> SegmentRelation {
    let mut relation = SegmentRelation::default();
    if polygon.len() < 3 {
        relation.outside = true;
        return relation;
    }
    let mut params = vec![0.0, 1.0];
    for i in 0..polygon.len() {
        let c = polygon[i];
        let d = polygon[(i + 1) % polygon.len()];
        segment_hit_parameters(a, b, c, d, &mut params);
    }
    params.sort_by(|x, y| x.total_cmp(y));
    params.dedup_by(|x, y| (*x - *y).abs() <= 1e-9);
    for pair in params.windows(2) {
        let mid = a.lerp(b, (pair[0] + pair[1]) / 2.0);
        if distance_to_boundary(mid, polygon) <= margin {
            continue;
        }
        if point_in_polygon(mid, polygon) {
            relation.inside = true;
        } else {
            relation.outside = true;
        }
        if relation.inside && relation.outside {
            break;
        }
    }
    relation
}

/// True when some stretch of the segment passes through the polygon's
/// interior. Grazing the boundary is allowed.
pub fn segment_enters_polygon(a: Point, b: Point, polygon: &[Point], bbox: &Rect, margin: f64) -> bool {
    if !Rect::from_points(a, b).intersects(bbox) {
        return false;
    }
    classify_segment(a, b, polygon, margin).inside
}

/// True when the segment has stretches both inside and outside the polygon.
pub fn segment_crosses_polygon_boundary(
    a: Point,
    b: Point,
    polygon: &[Point],
    bbox: &Rect,
    margin: f64,
) -> bool {
    if !Rect::from_points(a, b).intersects(bbox) {
        return false;
    }
    classify_segment(a, b, polygon, margin).crosses_boundary()
}

pub fn segment_intersects_rect(a: Point, b: Point, rect: &Rect) -> bool {
    if !Rect::from_points(a, b).intersects(rect) {
        return false;
    }
    if rect.contains(a) || rect.contains(b) {
        return true;
    }
    let corners = rect.corners();
    (0..4).any(|i| segments_intersect(a, b, corners[i], corners[(i + 1) % 4]))
}

/// True when the segment passes through the open interior of `rect` shrunk
/// by `margin` (Liang-Barsky clip).
pub fn segment_enters_rect(a: Point, b: Point, rect: &Rect, margin: f64) -> bool {
    let min = Point::new(rect.min.x + margin, rect.min.y + margin);
    let max = Point::new(rect.max.x - margin, rect.max.y - margin);
    if min.x >= max.x || min.y >= max.y {
        return false;
    }
    let d = b - a;
    let mut t0: f64 = 0.0;
    let mut t1: f64 = 1.0;
    for (p, q) in [
        (-d.x, a.x - min.x),
        (d.x, max.x - a.x),
        (-d.y, a.y - min.y),
        (d.y, max.y - a.y),
    ] {
        if p.abs() <= f64::EPSILON {
            if q <= 0.0 {
                return false;
            }
            continue;
        }
        let r = q / p;
        if p < 0.0 {
            t0 = t0.max(r);
        } else {
            t1 = t1.min(r);
        }
        if t0 >= t1 {
            return false;
        }
    }
    (t1 - t0) * d.length() > POINT_EPSILON
}

/// Nearest hit of the ray `origin + t * dir` (t >= 0) with the polygon sides.
pub fn ray_polygon_intersection(origin: Point, dir: Point, polygon: &[Point]) -> Option<Point> {
    if polygon.len() < 2 {
        return None;
    }
    let mut best_t: Option<f64> = None;
    for i in 0..polygon.len() {
        let p1 = polygon[i];
        let p2 = polygon[(i + 1) % polygon.len()];
        let side = p2 - p1;
        let q = p1 - origin;
        let denom = dir.cross(side);
        if denom.abs() < 1e-12 {
            continue;
        }
        let t = q.cross(side) / denom;
        let u = q.cross(dir) / denom;
        if t >= 0.0 && (-1e-9..=1.0 + 1e-9).contains(&u) {
            match best_t {
                Some(best) if t >= best => {}
                _ => best_t = Some(t),
            }
        }
    }
    best_t.map(|t| origin + dir * t)
}

pub fn ray_ellipse_intersection(
    origin: Point,
    dir: Point,
    center: Point,
    rx: f64,
    ry: f64,
) -> Option<Point> {
    let o = origin - center;
    let a = (dir.x * dir.x) / (rx * rx) + (dir.y * dir.y) / (ry * ry);
    let b = 2.0 * ((o.x * dir.x) / (rx * rx) + (o.y * dir.y) / (ry * ry));
    let c = (o.x * o.x) / (rx * rx) + (o.y * o.y) / (ry * ry) - 1.0;
    let disc = b * b - 4.0 * a * c;
    if disc < 0.0 || a.abs() < 1e-12 {
        return None;
    }
    let sqrt_disc = disc.sqrt();
    let t1 = (-b - sqrt_disc) / (2.0 * a);
    let t2 = (-b + sqrt_disc) / (2.0 * a);
    let t = if t1 >= 0.0 {
        t1
    } else if t2 >= 0.0 {
        t2
    } else {
        return None;
    };
    Some(origin + dir * t)
}

/// First intersection found between two curves, using flattened chords fine
/// enough for the curves' extent.
pub fn curve_curve_intersection_one(a: &Curve, b: &Curve) -> Option<Point> {
    let box_a = a.bounding_box();
    let box_b = b.bounding_box();
    if !box_a.intersects(&box_b) {
        return None;
    }
    let scale = box_a.diagonal().max(box_b.diagonal()).max(1.0);
    let tolerance = scale * 1e-4;
    let pa = a.flatten(tolerance);
    let pb = b.flatten(tolerance);
    for sa in pa.windows(2) {
        let ra = Rect::from_points(sa[0], sa[1]);
        if !ra.intersects(&box_b) {
            continue;
        }
        for sb in pb.windows(2) {
            if !ra.intersects(&Rect::from_points(sb[0], sb[1])) {
                continue;
            }
            if let Some(hit) = segment_intersection(sa[0], sa[1], sb[0], sb[1]) {
                return Some(hit);
            }
        }
    }
    None
}

/// Length of the stretch where two collinear segments run on top of each
/// other.
pub fn collinear_overlap_length(a: Point, b: Point, c: Point, d: Point) -> f64 {
    let ab = b - a;
    let len_sq = ab.length_squared();
    if len_sq < POINT_EPSILON {
        return 0.0;
    }
    let len = len_sq.sqrt();
    if ab.cross(c - a).abs() / len > 1e-3 || ab.cross(d - a).abs() / len > 1e-3 {
        return 0.0;
    }
    let t1 = (c - a).dot(ab) / len_sq;
    let t2 = (d - a).dot(ab) / len_sq;
    let overlap = (t1.max(t2).min(1.0) - t1.min(t2).max(0.0)).max(0.0);
    overlap * len
}
