//! Planar geometry kernel: points, boxes, curves and the polygon and
//! intersection routines the routers are built on.

mod curve;
pub mod factory;
pub mod intersect;
mod point;
pub mod polygon;
mod rect;

pub use curve::{Arc, Cubic, Curve, LineSeg, Segment};
pub use point::{POINT_EPSILON, Point, angle_between, normalize_angle, turn_angle};
pub use rect::Rect;
