use serde::{Deserialize, Serialize};
use std::f64::consts::FRAC_PI_2;

use super::point::{POINT_EPSILON, Point};
use super::rect::Rect;

/// Recursion cap for adaptive Bézier flattening.
const MAX_FLATTEN_DEPTH: u32 = 16;
/// Upper bound on chords emitted for a single arc.
const MAX_ARC_CHORDS: usize = 512;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LineSeg {
    pub start: Point,
    pub end: Point,
}

/// Circular arc swept from `start_angle` by `sweep` radians (positive sweeps
/// run counter-clockwise).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Arc {
    pub center: Point,
    pub radius: f64,
    pub start_angle: f64,
    pub sweep: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Cubic {
    pub p0: Point,
    pub p1: Point,
    pub p2: Point,
    pub p3: Point,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Segment {
    Line(LineSeg),
    Arc(Arc),
    Cubic(Cubic),
}

impl Arc {
    pub fn point_at_angle(&self, angle: f64) -> Point {
        self.center + Point::from_angle(angle) * self.radius
    }

    pub fn end_angle(&self) -> f64 {
        self.start_angle + self.sweep
    }

    fn contains_angle(&self, angle: f64) -> bool {
        let (lo, hi) = if self.sweep >= 0.0 {
            (self.start_angle, self.end_angle())
        } else {
            (self.end_angle(), self.start_angle)
        };
        let offset = (angle - lo).rem_euclid(std::f64::consts::TAU);
        offset <= hi - lo
    }

    fn chord_count(&self, tolerance: f64) -> usize {
        if self.radius <= tolerance {
            return 1;
        }
        let step = 2.0 * (1.0 - tolerance / self.radius).clamp(-1.0, 1.0).acos();
        let step = step.clamp(1e-3, FRAC_PI_2);
        ((self.sweep.abs() / step).ceil() as usize).clamp(1, MAX_ARC_CHORDS)
    }
}

impl Cubic {
    pub fn point_at(&self, t: f64) -> Point {
        let mt = 1.0 - t;
        self.p0 * (mt * mt * mt)
            + self.p1 * (3.0 * mt * mt * t)
            + self.p2 * (3.0 * mt * t * t)
            + self.p3 * (t * t * t)
    }

    pub fn derivative_at(&self, t: f64) -> Point {
        let mt = 1.0 - t;
        (self.p1 - self.p0) * (3.0 * mt * mt)
            + (self.p2 - self.p1) * (6.0 * mt * t)
            + (self.p3 - self.p2) * (3.0 * t * t)
    }

    /// de Casteljau split at `t`.
    pub fn split(&self, t: f64) -> (Cubic, Cubic) {
        let p01 = self.p0.lerp(self.p1, t);
        let p12 = self.p1.lerp(self.p2, t);
        let p23 = self.p2.lerp(self.p3, t);
        let p012 = p01.lerp(p12, t);
        let p123 = p12.lerp(p23, t);
        let mid = p012.lerp(p123, t);
        (
            Cubic {
                p0: self.p0,
                p1: p01,
                p2: p012,
                p3: mid,
            },
            Cubic {
                p0: mid,
                p1: p123,
                p2: p23,
                p3: self.p3,
            },
        )
    }

    fn flatness(&self) -> f64 {
        let chord = self.p3 - self.p0;
        let len = chord.length();
        if len <= POINT_EPSILON {
            return self.p0.distance(self.p1).max(self.p0.distance(self.p2));
        }
        let d1 = chord.cross(self.p1 - self.p0).abs() / len;
        let d2 = chord.cross(self.p2 - self.p0).abs() / len;
        d1.max(d2)
    }

    fn flatten_into(&self, tolerance: f64, depth: u32, out: &mut Vec<Point>) {
        if depth >= MAX_FLATTEN_DEPTH || self.flatness() <= tolerance {
            out.push(self.p3);
            return;
        }
        let (left, right) = self.split(0.5);
        left.flatten_into(tolerance, depth + 1, out);
        right.flatten_into(tolerance, depth + 1, out);
    }

    fn axis_extrema(a: f64, b: f64, c: f64, d: f64, out: &mut Vec<f64>) {
        // Roots of the derivative of one coordinate polynomial.
        let qa = -a + 3.0 * b - 3.0 * c + d;
        let qb = 2.0 * (a - 2.0 * b + c);
        let qc = b - a;
        if qa.abs() < 1e-12 {
            if qb.abs() > 1e-12 {
                out.push(-qc / qb);
            }
            return;
        }
        let disc = qb * qb - 4.0 * qa * qc;
        if disc < 0.0 {
            return;
        }
        let sqrt = disc.sqrt();
        out.push((-qb + sqrt) / (2.0 * qa));
        out.push((-qb - sqrt) / (2.0 * qa));
    }

    pub fn bounding_box(&self) -> Rect {
        let mut rect = Rect::bounding([self.p0, self.p3]);
        let mut roots = Vec::new();
        Self::axis_extrema(self.p0.x, self.p1.x, self.p2.x, self.p3.x, &mut roots);
        Self::axis_extrema(self.p0.y, self.p1.y, self.p2.y, self.p3.y, &mut roots);
        for t in roots {
            if t > 0.0 && t < 1.0 {
                rect.add_point(self.point_at(t));
            }
        }
        rect
    }
}

impl Segment {
    pub fn line(start: Point, end: Point) -> Self {
        Segment::Line(LineSeg { start, end })
    }

    pub fn start(&self) -> Point {
        match self {
            Segment::Line(line) => line.start,
            Segment::Arc(arc) => arc.point_at_angle(arc.start_angle),
            Segment::Cubic(cubic) => cubic.p0,
        }
    }

    pub fn end(&self) -> Point {
        match self {
            Segment::Line(line) => line.end,
            Segment::Arc(arc) => arc.point_at_angle(arc.end_angle()),
            Segment::Cubic(cubic) => cubic.p3,
        }
    }

    /// Point at parameter `t` in `[0, 1]`.
    pub fn point_at(&self, t: f64) -> Point {
        let t = t.clamp(0.0, 1.0);
        match self {
            Segment::Line(line) => line.start.lerp(line.end, t),
            Segment::Arc(arc) => arc.point_at_angle(arc.start_angle + arc.sweep * t),
            Segment::Cubic(cubic) => cubic.point_at(t),
        }
    }

    pub fn length(&self) -> f64 {
        match self {
            Segment::Line(line) => line.start.distance(line.end),
            Segment::Arc(arc) => arc.radius * arc.sweep.abs(),
            Segment::Cubic(_) => {
                let mut points = vec![self.start()];
                self.flatten_into(1e-3, &mut points);
                points.windows(2).map(|w| w[0].distance(w[1])).sum()
            }
        }
    }

    pub fn bounding_box(&self) -> Rect {
        match self {
            Segment::Line(line) => Rect::from_points(line.start, line.end),
            Segment::Arc(arc) => {
                let mut rect = Rect::bounding([self.start(), self.end()]);
                for quadrant in 0..4 {
                    let angle = quadrant as f64 * FRAC_PI_2;
                    if arc.contains_angle(angle) {
                        rect.add_point(arc.point_at_angle(angle));
                    }
                }
                rect
            }
            Segment::Cubic(cubic) => cubic.bounding_box(),
        }
    }

    /// Appends flattened points after the segment start (the start itself is
    /// not pushed).
    pub fn flatten_into(&self, tolerance: f64, out: &mut Vec<Point>) {
        match self {
            Segment::Line(line) => out.push(line.end),
            Segment::Arc(arc) => {
                let chords = arc.chord_count(tolerance);
                for i in 1..=chords {
                    let t = i as f64 / chords as f64;
                    out.push(arc.point_at_angle(arc.start_angle + arc.sweep * t));
                }
            }
            Segment::Cubic(cubic) => cubic.flatten_into(tolerance, 0, out),
        }
    }

    pub fn reversed(&self) -> Segment {
        match *self {
            Segment::Line(line) => Segment::line(line.end, line.start),
            Segment::Arc(arc) => Segment::Arc(Arc {
                start_angle: arc.end_angle(),
                sweep: -arc.sweep,
                ..arc
            }),
            Segment::Cubic(c) => Segment::Cubic(Cubic {
                p0: c.p3,
                p1: c.p2,
                p2: c.p1,
                p3: c.p0,
            }),
        }
    }

    pub fn translated(&self, delta: Point) -> Segment {
        match *self {
            Segment::Line(line) => Segment::line(line.start + delta, line.end + delta),
            Segment::Arc(arc) => Segment::Arc(Arc {
                center: arc.center + delta,
                ..arc
            }),
            Segment::Cubic(c) => Segment::Cubic(Cubic {
                p0: c.p0 + delta,
                p1: c.p1 + delta,
                p2: c.p2 + delta,
                p3: c.p3 + delta,
            }),
        }
    }
}

/// A connected sequence of segments. Never empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Segment>", into = "Vec<Segment>")]
pub struct Curve {
    segments: Vec<Segment>,
}

impl TryFrom<Vec<Segment>> for Curve {
    type Error = &'static str;

    fn try_from(segments: Vec<Segment>) -> Result<Self, Self::Error> {
        Curve::from_segments(segments).ok_or("a curve needs at least one segment")
    }
}

impl From<Curve> for Vec<Segment> {
    fn from(curve: Curve) -> Self {
        curve.segments
    }
}

impl Curve {
    pub fn new(first: Segment) -> Self {
        Self {
            segments: vec![first],
        }
    }

    pub fn from_segments(segments: Vec<Segment>) -> Option<Self> {
        if segments.is_empty() {
            None
        } else {
            Some(Self { segments })
        }
    }

    pub fn line(start: Point, end: Point) -> Self {
        Self::new(Segment::line(start, end))
    }

    /// Open polyline through `points`; repeated points are skipped. `None`
    /// when fewer than two distinct points remain.
    pub fn polyline(points: &[Point]) -> Option<Self> {
        let mut segments = Vec::with_capacity(points.len());
        let mut current: Option<Point> = None;
        for &point in points {
            match current {
                None => current = Some(point),
                Some(prev) if prev.close_to(point, POINT_EPSILON) => {}
                Some(prev) => {
                    segments.push(Segment::line(prev, point));
                    current = Some(point);
                }
            }
        }
        Self::from_segments(segments)
    }

    /// Closed polyline through `points` (the closing side is added).
    pub fn closed_polyline(points: &[Point]) -> Option<Self> {
        let mut closed = points.to_vec();
        closed.push(*points.first()?);
        Self::polyline(&closed)
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn push(&mut self, segment: Segment) {
        self.segments.push(segment);
    }

    pub fn start(&self) -> Point {
        self.segments[0].start()
    }

    pub fn end(&self) -> Point {
        self.segments[self.segments.len() - 1].end()
    }

    pub fn is_closed(&self, tolerance: f64) -> bool {
        self.start().close_to(self.end(), tolerance)
    }

    pub fn length(&self) -> f64 {
        self.segments.iter().map(Segment::length).sum()
    }

    pub fn bounding_box(&self) -> Rect {
        self.segments
            .iter()
            .fold(Rect::empty(), |acc, seg| acc.union(&seg.bounding_box()))
    }

    /// Point at parameter `t` in `[0, segment_count]`; the integer part picks
    /// the segment.
    pub fn point_at(&self, t: f64) -> Point {
        let count = self.segments.len();
        let t = t.clamp(0.0, count as f64);
        let index = (t.floor() as usize).min(count - 1);
        self.segments[index].point_at(t - index as f64)
    }

    /// Polyline approximation whose chords stay within `tolerance` of the
    /// curve. The first point is the curve start.
    pub fn flatten(&self, tolerance: f64) -> Vec<Point> {
        let tolerance = tolerance.max(1e-6);
        let mut points = vec![self.start()];
        for segment in &self.segments {
            segment.flatten_into(tolerance, &mut points);
        }
        points.dedup_by(|a, b| a.close_to(*b, POINT_EPSILON));
        points
    }

    pub fn translated(&self, delta: Point) -> Curve {
        Curve {
            segments: self.segments.iter().map(|s| s.translated(delta)).collect(),
        }
    }

    pub fn reversed(&self) -> Curve {
        Curve {
            segments: self.segments.iter().rev().map(Segment::reversed).collect(),
        }
    }
}
