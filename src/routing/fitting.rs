//! Polyline to curve conversion.
//!
//! Every interior corner of a routed polyline is replaced by a cubic Bézier
//! whose ends sit on the two legs at distance `r` from the corner. The
//! curve stays inside the triangle spanned by those ends and the corner, so
//! `r` is shrunk until that triangle holds no part of a keep-out polygon.

use crate::config::FittingConfig;
use crate::geometry::intersect::segment_enters_polygon;
use crate::geometry::polygon::point_strictly_inside;
use crate::geometry::{Cubic, Curve, POINT_EPSILON, Point, Rect, Segment, turn_angle};

use super::spatial::EdgeContext;

/// Corners turning less than this stay as they are.
const STRAIGHT_TURN: f64 = 1e-6;

#[derive(Debug, Clone, Copy)]
struct Rounding {
    enter: Point,
    corner: Point,
    exit: Point,
}

fn triangle_is_free(rounding: &Rounding, keep_out: &[(&[Point], Rect)], margin: f64) -> bool {
    let triangle = [rounding.enter, rounding.corner, rounding.exit];
    let tri_box = Rect::bounding(triangle);
    keep_out.iter().all(|(polygon, bbox)| {
        if !bbox.intersects(&tri_box) {
            return true;
        }
        let vertex_inside = polygon
            .iter()
            .any(|v| tri_box.contains(*v) && point_strictly_inside(*v, &triangle, margin));
        !vertex_inside && !segment_enters_polygon(rounding.enter, rounding.exit, polygon, bbox, margin)
    })
}

fn corner_rounding(
    prev: Point,
    corner: Point,
    next: Point,
    keep_out: &[(&[Point], Rect)],
    margin: f64,
    config: &FittingConfig,
) -> Option<Rounding> {
    if turn_angle(prev, corner, next) < STRAIGHT_TURN {
        return None;
    }
    let back = (prev - corner).normalize()?;
    let ahead = (next - corner).normalize()?;
    let mut radius = (corner.distance(prev) / 2.0)
        .min(corner.distance(next) / 2.0)
        .min(config.max_corner_radius);
    for _ in 0..=config.max_radius_halvings {
        if radius <= POINT_EPSILON {
            break;
        }
        let rounding = Rounding {
            enter: corner + back * radius,
            corner,
            exit: corner + ahead * radius,
        };
        if triangle_is_free(&rounding, keep_out, margin) {
            return Some(rounding);
        }
        radius /= 2.0;
    }
    None
}

fn push_line(segments: &mut Vec<Segment>, from: Point, to: Point) {
    if !from.close_to(to, POINT_EPSILON) {
        segments.push(Segment::line(from, to));
    }
}

/// Smooth curve along `polyline` from its first to its last point.
pub(crate) fn fit_spline(polyline: &[Point], ctx: &EdgeContext<'_, '_>, config: &FittingConfig) -> Curve {
    let (Some(&first), Some(&last)) = (polyline.first(), polyline.last()) else {
        return Curve::line(Point::ORIGIN, Point::ORIGIN);
    };
    if polyline.len() < 3 {
        return Curve::line(first, last);
    }

    let extent = Rect::bounding(polyline.iter().copied());
    let keep_out = ctx.keep_out_polygons(&extent);
    let margin = ctx.index().margin();
    let ratio = config.control_point_ratio.clamp(0.0, 1.0);

    let mut segments = Vec::with_capacity(polyline.len() * 2);
    let mut cursor = first;
    for window in polyline.windows(3) {
        let [prev, corner, next] = [window[0], window[1], window[2]];
        match corner_rounding(prev, corner, next, &keep_out, margin, config) {
            Some(rounding) => {
                push_line(&mut segments, cursor, rounding.enter);
                segments.push(Segment::Cubic(Cubic {
                    p0: rounding.enter,
                    p1: rounding.enter.lerp(corner, ratio),
                    p2: rounding.exit.lerp(corner, ratio),
                    p3: rounding.exit,
                }));
                cursor = rounding.exit;
            }
            None => {
                push_line(&mut segments, cursor, corner);
                cursor = corner;
            }
        }
    }
    push_line(&mut segments, cursor, last);
    Curve::from_segments(segments).unwrap_or_else(|| Curve::line(first, last))
}
