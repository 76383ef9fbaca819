//! Cone-restricted visibility graph over the loose obstacle regions.
//!
//! Each vertex looks around itself through overlapping cones and links to
//! the nearest visible vertex in every cone, which keeps the graph sparse
//! while still containing near-shortest paths.

use std::collections::BTreeSet;
use std::f64::consts::{PI, TAU};

use crate::geometry::{POINT_EPSILON, Point, normalize_angle};
use crate::graph::ClusterId;

use super::obstacles::ObstacleSet;
use super::spatial::{MAX_GRID_CELLS, ObstacleIndex, SpatialGrid};

/// Angular slack when deciding whether a direction points into an obstacle.
const INTERIOR_EPSILON: f64 = 1e-6;

#[derive(Debug, Clone)]
pub struct VisEdge {
    pub to: usize,
    pub length: f64,
    /// Cluster boundaries this edge crosses.
    pub clusters: Box<[ClusterId]>,
}

/// Local orientation of a vertex: the boundary tangent the cones start from
/// and the opening of the obstacle interior measured counter-clockwise from
/// it (zero when no direction is excluded).
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct VertexFrame {
    pub(crate) tangent: f64,
    pub(crate) interior: f64,
}

impl VertexFrame {
    fn points_inside(&self, relative: f64) -> bool {
        self.interior > 0.0 && relative > INTERIOR_EPSILON && relative < self.interior - INTERIOR_EPSILON
    }
}

#[derive(Debug, Clone)]
pub struct VisibilityGraph {
    points: Vec<Point>,
    frames: Vec<VertexFrame>,
    adjacency: Vec<Vec<VisEdge>>,
    grid: SpatialGrid,
    cone_half_angle: f64,
}

/// Number of cones around a vertex: axes are spaced by at most the half
/// angle, so every direction falls in two cones.
pub(crate) fn cone_count(cone_half_angle: f64) -> usize {
    ((TAU / cone_half_angle) - 1e-9).ceil().max(3.0) as usize
}

impl VisibilityGraph {
    pub fn vertex_count(&self) -> usize {
        self.points.len()
    }

    pub fn edge_count(&self) -> usize {
        self.adjacency.iter().map(Vec::len).sum::<usize>() / 2
    }

    pub fn point(&self, vertex: usize) -> Point {
        self.points[vertex]
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn neighbors(&self, vertex: usize) -> &[VisEdge] {
        &self.adjacency[vertex]
    }

    pub fn cone_half_angle(&self) -> f64 {
        self.cone_half_angle
    }

    /// Nearest vertex per cone around `origin` for which `visible` holds.
    /// Directions into the obstacle described by `frame` are skipped.
    pub(crate) fn nearest_in_cones(
        &self,
        origin: Point,
        frame: VertexFrame,
        exclude: Option<usize>,
        mut visible: impl FnMut(usize) -> bool,
    ) -> Vec<usize> {
        if self.points.is_empty() {
            return Vec::new();
        }
        let count = cone_count(self.cone_half_angle);
        let spacing = TAU / count as f64;
        let dead: Vec<bool> = (0..count)
            .map(|k| {
                let lo = (k as f64 - 1.0) * spacing;
                let hi = (k as f64 + 1.0) * spacing;
                k >= 1
                    && frame.interior > 0.0
                    && lo > INTERIOR_EPSILON
                    && hi < frame.interior - INTERIOR_EPSILON
            })
            .collect();
        let mut best: Vec<Option<(f64, usize)>> = vec![None; count];
        let (cx, cy) = self.grid.cell_for_point(origin);
        let cell = self.grid.cell_size();
        let mut ring = 0;
        let mut bucket = Vec::new();
        while self.grid.ring(cx, cy, ring, &mut bucket) {
            let mut scored: Vec<(f64, usize)> = bucket
                .iter()
                .filter(|&&w| Some(w) != exclude)
                .map(|&w| (origin.distance(self.points[w]), w))
                .filter(|(d, _)| *d > POINT_EPSILON)
                .collect();
            scored.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
            for (dist, w) in scored {
                let relative = normalize_angle((self.points[w] - origin).angle() - frame.tangent);
                if frame.points_inside(relative) {
                    continue;
                }
                let first = ((relative / spacing).floor() as usize) % count;
                let cones = [first, (first + 1) % count];
                let improves =
                    |c: usize, best: &[Option<(f64, usize)>]| !dead[c] && best[c].is_none_or(|(d, _)| dist < d);
                if !cones.iter().any(|&c| improves(c, &best)) {
                    continue;
                }
                if !visible(w) {
                    continue;
                }
                for c in cones {
                    if improves(c, &best) {
                        best[c] = Some((dist, w));
                    }
                }
            }
            let horizon = ring as f64 * cell;
            let settled = (0..count).all(|c| dead[c] || best[c].is_some_and(|(d, _)| d <= horizon));
            if settled {
                break;
            }
            ring += 1;
        }
        let mut found: Vec<usize> = best.into_iter().flatten().map(|(_, w)| w).collect();
        found.sort_unstable();
        found.dedup();
        found
    }
}

fn frame_at(prev: Point, v: Point, next: Point) -> VertexFrame {
    let out_angle = (next - v).angle();
    let back_angle = (prev - v).angle();
    VertexFrame {
        tangent: out_angle,
        interior: normalize_angle(back_angle - out_angle),
    }
}

/// Frame of a port on a convex boundary whose tangent runs counter-clockwise
/// along `tangent`: everything left of the tangent is inside.
pub(crate) fn port_frame(tangent: Point) -> VertexFrame {
    VertexFrame {
        tangent: tangent.angle(),
        interior: PI,
    }
}

pub fn build_visibility_graph(obstacles: &ObstacleSet, cone_half_angle: f64) -> VisibilityGraph {
    let index = ObstacleIndex::new(obstacles);
    build_with_index(&index, cone_half_angle)
}

pub(crate) fn build_with_index(index: &ObstacleIndex<'_>, cone_half_angle: f64) -> VisibilityGraph {
    let obstacles = index.obstacles();
    let mut points = Vec::new();
    let mut frames = Vec::new();
    let mut pairs: BTreeSet<(usize, usize)> = BTreeSet::new();

    for region in obstacles.regions() {
        let polygon = &region.polygon;
        let n = polygon.len();
        if n < 3 {
            continue;
        }
        let slots: Vec<Option<usize>> = (0..n)
            .map(|i| {
                let v = polygon[i];
                if obstacles.inside_any_tight(v) {
                    return None;
                }
                let frame = frame_at(polygon[(i + n - 1) % n], v, polygon[(i + 1) % n]);
                points.push(v);
                frames.push(frame);
                Some(points.len() - 1)
            })
            .collect();
        for i in 0..n {
            if let (Some(a), Some(b)) = (slots[i], slots[(i + 1) % n])
                && !index.segment_blocked(points[a], points[b], &[])
            {
                pairs.insert((a.min(b), a.max(b)));
            }
        }
    }

    let bounds = obstacles.bounds();
    let cell = if points.is_empty() {
        1.0
    } else {
        (bounds.width() * bounds.height() / points.len() as f64).sqrt().max(1e-3) * 2.0
    };
    let mut grid = SpatialGrid::new(bounds, cell, MAX_GRID_CELLS);
    for (i, p) in points.iter().enumerate() {
        grid.insert_point(i, *p);
    }

    let mut graph = VisibilityGraph {
        adjacency: vec![Vec::new(); points.len()],
        points,
        frames,
        grid,
        cone_half_angle,
    };

    for v in 0..graph.points.len() {
        let origin = graph.points[v];
        let neighbors = graph.nearest_in_cones(origin, graph.frames[v], Some(v), |w| {
            !index.segment_blocked(origin, graph.points[w], &[])
        });
        for w in neighbors {
            pairs.insert((v.min(w), v.max(w)));
        }
    }

    for (a, b) in pairs {
        let pa = graph.points[a];
        let pb = graph.points[b];
        let clusters: Box<[ClusterId]> = index.crossed_clusters(pa, pb).into_boxed_slice();
        let length = pa.distance(pb);
        graph.adjacency[a].push(VisEdge {
            to: b,
            length,
            clusters: clusters.clone(),
        });
        graph.adjacency[b].push(VisEdge {
            to: a,
            length,
            clusters,
        });
    }
    for list in &mut graph.adjacency {
        list.sort_by_key(|e| e.to);
    }

    tracing::debug!(
        vertices = graph.vertex_count(),
        edges = graph.edge_count(),
        cones = cone_count(cone_half_angle),
        "visibility graph built"
    );
    graph
}
