use serde::{Deserialize, Serialize};

use super::point::Point;

/// Axis-aligned bounding box. An empty box has `min > max` on both axes so
/// that the first `add_point` snaps it onto that point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub min: Point,
    pub max: Point,
}

impl Default for Rect {
    fn default() -> Self {
        Self::empty()
    }
}

impl Rect {
    pub fn empty() -> Self {
        Self {
            min: Point::new(f64::INFINITY, f64::INFINITY),
            max: Point::new(f64::NEG_INFINITY, f64::NEG_INFINITY),
        }
    }

    pub fn from_points(a: Point, b: Point) -> Self {
        Self {
            min: Point::new(a.x.min(b.x), a.y.min(b.y)),
            max: Point::new(a.x.max(b.x), a.y.max(b.y)),
        }
    }

    pub fn from_center_size(center: Point, width: f64, height: f64) -> Self {
        let half = Point::new(width.abs() / 2.0, height.abs() / 2.0);
        Self {
            min: center - half,
            max: center + half,
        }
    }

    pub fn bounding(points: impl IntoIterator<Item = Point>) -> Self {
        let mut rect = Self::empty();
        for point in points {
            rect.add_point(point);
        }
        rect
    }

    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y
    }

    pub fn add_point(&mut self, point: Point) {
        self.min.x = self.min.x.min(point.x);
        self.min.y = self.min.y.min(point.y);
        self.max.x = self.max.x.max(point.x);
        self.max.y = self.max.y.max(point.y);
    }

    pub fn union(&self, other: &Rect) -> Rect {
        Rect {
            min: Point::new(self.min.x.min(other.min.x), self.min.y.min(other.min.y)),
            max: Point::new(self.max.x.max(other.max.x), self.max.y.max(other.max.y)),
        }
    }

    pub fn padded(&self, amount: f64) -> Rect {
        if self.is_empty() {
            return *self;
        }
        let pad = Point::new(amount, amount);
        Rect {
            min: self.min - pad,
            max: self.max + pad,
        }
    }

    pub fn width(&self) -> f64 {
        (self.max.x - self.min.x).max(0.0)
    }

    pub fn height(&self) -> f64 {
        (self.max.y - self.min.y).max(0.0)
    }

    pub fn diagonal(&self) -> f64 {
        self.width().hypot(self.height())
    }

    pub fn center(&self) -> Point {
        self.min.midpoint(self.max)
    }

    /// Closed containment test.
    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.min.x && point.x <= self.max.x && point.y >= self.min.y && point.y <= self.max.y
    }

    /// True when `point` lies inside the box shrunk by `margin` on every side.
    pub fn contains_strictly(&self, point: Point, margin: f64) -> bool {
        point.x > self.min.x + margin
            && point.x < self.max.x - margin
            && point.y > self.min.y + margin
            && point.y < self.max.y - margin
    }

    /// Closed overlap test; touching boxes intersect.
    pub fn intersects(&self, other: &Rect) -> bool {
        !(self.is_empty()
            || other.is_empty()
            || self.max.x < other.min.x
            || other.max.x < self.min.x
            || self.max.y < other.min.y
            || other.max.y < self.min.y)
    }

    /// Corners in counter-clockwise order starting at `min`.
    pub fn corners(&self) -> [Point; 4] {
        [
            self.min,
            Point::new(self.max.x, self.min.y),
            self.max,
            Point::new(self.min.x, self.max.y),
        ]
    }

    /// Closed perimeter polyline (first corner repeated at the end).
    pub fn perimeter(&self) -> Vec<Point> {
        let corners = self.corners();
        let mut points = corners.to_vec();
        points.push(corners[0]);
        points
    }
}
