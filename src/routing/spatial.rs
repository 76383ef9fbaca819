//! Bucket grids over obstacles and the per-edge view of which of them block.

use crate::geometry::intersect::{segment_crosses_polygon_boundary, segment_enters_polygon};
use crate::geometry::{Point, Rect};
use crate::graph::{ClusterId, NodeId, RoutingGraph};

use super::obstacles::{ObstacleSet, flatten_tolerance};

/// Bucket budget for obstacle and vertex grids.
pub(crate) const MAX_GRID_CELLS: usize = 65_536;

/// Uniform bucket grid over item indices. Items are registered by bounding
/// box (obstacles) or by position (visibility vertices); queries return
/// candidates whose exact test is left to the caller.
#[derive(Debug, Clone)]
pub(crate) struct SpatialGrid {
    cell: f64,
    min_x: f64,
    min_y: f64,
    cols: i32,
    rows: i32,
    cells: Vec<Vec<usize>>,
}

impl SpatialGrid {
    /// Grid covering `bounds` with roughly `cell` sized buckets. The cell
    /// size grows when the grid would exceed `max_cells` buckets.
    pub(crate) fn new(bounds: Rect, cell: f64, max_cells: usize) -> Self {
        let bounds = if bounds.is_empty() {
            Rect::from_points(Point::ORIGIN, Point::new(1.0, 1.0))
        } else {
            bounds
        };
        let width = bounds.width().max(1e-6);
        let height = bounds.height().max(1e-6);
        let mut cell = if cell.is_finite() && cell > 0.0 {
            cell
        } else {
            width.max(height)
        };
        let max_cells = max_cells.max(1) as f64;
        if (width / cell).ceil() * (height / cell).ceil() > max_cells {
            cell = (width * height / max_cells).sqrt().max(cell);
        }
        let cols = ((width / cell).floor() as i32 + 1).max(1);
        let rows = ((height / cell).floor() as i32 + 1).max(1);
        Self {
            cell,
            min_x: bounds.min.x,
            min_y: bounds.min.y,
            cols,
            rows,
            cells: vec![Vec::new(); (cols * rows) as usize],
        }
    }

    fn index(&self, ix: i32, iy: i32) -> usize {
        (iy * self.cols + ix) as usize
    }

    pub(crate) fn cell_size(&self) -> f64 {
        self.cell
    }

    /// Cell holding `point`, clamped onto the grid.
    pub(crate) fn cell_for_point(&self, point: Point) -> (i32, i32) {
        let ix = ((point.x - self.min_x) / self.cell).floor();
        let iy = ((point.y - self.min_y) / self.cell).floor();
        let clamp = |v: f64, hi: i32| {
            if v.is_nan() {
                0
            } else {
                (v.max(0.0) as i64).min(hi as i64 - 1) as i32
            }
        };
        (clamp(ix, self.cols), clamp(iy, self.rows))
    }

    pub(crate) fn insert_point(&mut self, item: usize, point: Point) {
        let (ix, iy) = self.cell_for_point(point);
        let idx = self.index(ix, iy);
        self.cells[idx].push(item);
    }

    pub(crate) fn insert_rect(&mut self, item: usize, rect: &Rect) {
        if rect.is_empty() {
            return;
        }
        let (x0, y0) = self.cell_for_point(rect.min);
        let (x1, y1) = self.cell_for_point(rect.max);
        for iy in y0..=y1 {
            for ix in x0..=x1 {
                let idx = self.index(ix, iy);
                self.cells[idx].push(item);
            }
        }
    }

    /// Items registered in any cell touched by `rect`, sorted and unique.
    pub(crate) fn query_rect(&self, rect: &Rect, out: &mut Vec<usize>) {
        out.clear();
        if rect.is_empty() {
            return;
        }
        let (x0, y0) = self.cell_for_point(rect.min);
        let (x1, y1) = self.cell_for_point(rect.max);
        for iy in y0..=y1 {
            for ix in x0..=x1 {
                out.extend_from_slice(&self.cells[self.index(ix, iy)]);
            }
        }
        out.sort_unstable();
        out.dedup();
    }

    /// Items in the cells at Chebyshev distance exactly `ring` from
    /// `(cx, cy)`. Returns false once the ring lies entirely off the grid.
    pub(crate) fn ring(&self, cx: i32, cy: i32, ring: i32, out: &mut Vec<usize>) -> bool {
        out.clear();
        if ring == 0 {
            out.extend_from_slice(&self.cells[self.index(cx, cy)]);
            return true;
        }
        let x0 = cx - ring;
        let x1 = cx + ring;
        let y0 = cy - ring;
        let y1 = cy + ring;
        if x0 < 0 && y0 < 0 && x1 >= self.cols && y1 >= self.rows {
            return false;
        }
        for iy in y0.max(0)..=y1.min(self.rows - 1) {
            let on_edge_row = iy == y0 || iy == y1;
            for ix in x0.max(0)..=x1.min(self.cols - 1) {
                if on_edge_row || ix == x0 || ix == x1 {
                    out.extend_from_slice(&self.cells[self.index(ix, iy)]);
                }
            }
        }
        true
    }
}

/// Grid-accelerated queries against the tight polygons of an obstacle set.
#[derive(Debug, Clone)]
pub(crate) struct ObstacleIndex<'a> {
    obstacles: &'a ObstacleSet,
    node_grid: SpatialGrid,
    cluster_ids: Vec<ClusterId>,
    cluster_grid: SpatialGrid,
    margin: f64,
}

impl<'a> ObstacleIndex<'a> {
    pub(crate) fn new(obstacles: &'a ObstacleSet) -> Self {
        let bounds = obstacles.bounds();
        let nodes = obstacles.nodes();
        let average = if nodes.is_empty() {
            1.0
        } else {
            nodes
                .iter()
                .map(|o| o.tight_box.width().max(o.tight_box.height()))
                .sum::<f64>()
                / nodes.len() as f64
        };
        let cell = (average * 2.0).max(1.0);
        let mut node_grid = SpatialGrid::new(bounds, cell, MAX_GRID_CELLS);
        for (i, obstacle) in nodes.iter().enumerate() {
            node_grid.insert_rect(i, &obstacle.tight_box);
        }
        let mut cluster_ids = Vec::new();
        let mut cluster_grid = SpatialGrid::new(bounds, cell, MAX_GRID_CELLS);
        for (id, obstacle) in obstacles.clusters() {
            cluster_grid.insert_rect(cluster_ids.len(), &obstacle.tight_box);
            cluster_ids.push(id);
        }
        let margin = 1e-7 * bounds.diagonal().max(1.0);
        Self {
            obstacles,
            node_grid,
            cluster_ids,
            cluster_grid,
            margin,
        }
    }

    pub(crate) fn obstacles(&self) -> &'a ObstacleSet {
        self.obstacles
    }

    /// Boundary tolerance for interior tests.
    pub(crate) fn margin(&self) -> f64 {
        self.margin
    }

    pub(crate) fn nodes_near(&self, rect: &Rect, out: &mut Vec<usize>) {
        self.node_grid.query_rect(rect, out);
    }

    pub(crate) fn clusters_near(&self, rect: &Rect) -> Vec<ClusterId> {
        let mut slots = Vec::new();
        self.cluster_grid.query_rect(rect, &mut slots);
        slots.into_iter().map(|slot| self.cluster_ids[slot]).collect()
    }

    /// True when the segment passes through the tight polygon of a node not
    /// listed in `ignore`.
    pub(crate) fn segment_blocked(&self, a: Point, b: Point, ignore: &[NodeId]) -> bool {
        let mut candidates = Vec::new();
        self.nodes_near(&Rect::from_points(a, b), &mut candidates);
        candidates.into_iter().any(|i| {
            if ignore.contains(&NodeId(i)) {
                return false;
            }
            let obstacle = &self.obstacles.nodes()[i];
            segment_enters_polygon(a, b, &obstacle.tight, &obstacle.tight_box, self.margin)
        })
    }

    /// Clusters whose tight boundary the segment crosses, in id order.
    pub(crate) fn crossed_clusters(&self, a: Point, b: Point) -> Vec<ClusterId> {
        if self.cluster_ids.is_empty() {
            return Vec::new();
        }
        let mut crossed: Vec<ClusterId> = self
            .clusters_near(&Rect::from_points(a, b))
            .into_iter()
            .filter(|id| {
                self.obstacles.cluster(*id).is_some_and(|o| {
                    segment_crosses_polygon_boundary(a, b, &o.tight, &o.tight_box, self.margin)
                })
            })
            .collect();
        crossed.sort_unstable();
        crossed
    }
}

/// Obstacle queries from the point of view of one edge: its endpoints' tight
/// polygons are ignored, their raw boundaries still block, and only clusters
/// enclosing an endpoint may be crossed.
#[derive(Debug, Clone)]
pub(crate) struct EdgeContext<'i, 'a> {
    index: &'i ObstacleIndex<'a>,
    pub(crate) source: NodeId,
    pub(crate) target: NodeId,
    transparent: Vec<ClusterId>,
}

impl<'i, 'a> EdgeContext<'i, 'a> {
    pub(crate) fn new(index: &'i ObstacleIndex<'a>, graph: &RoutingGraph, source: NodeId, target: NodeId) -> Self {
        let mut transparent = graph.ancestors(source);
        transparent.extend(graph.ancestors(target));
        transparent.sort_unstable();
        transparent.dedup();
        Self {
            index,
            source,
            target,
            transparent,
        }
    }

    pub(crate) fn index(&self) -> &'i ObstacleIndex<'a> {
        self.index
    }

    pub(crate) fn allows_clusters(&self, crossed: &[ClusterId]) -> bool {
        crossed.iter().all(|c| self.transparent.binary_search(c).is_ok())
    }

    pub(crate) fn is_transparent(&self, cluster: ClusterId) -> bool {
        self.transparent.binary_search(&cluster).is_ok()
    }

    fn enters_endpoint(&self, a: Point, b: Point) -> bool {
        let obstacles = self.index.obstacles();
        let endpoints = if self.source == self.target {
            &[self.source][..]
        } else {
            &[self.source, self.target][..]
        };
        endpoints.iter().any(|&node| {
            let obstacle = obstacles.node(node);
            let margin = 2.0 * flatten_tolerance(&obstacle.boundary_box);
            segment_enters_polygon(a, b, &obstacle.boundary, &obstacle.boundary_box, margin)
        })
    }

    pub(crate) fn segment_clear(&self, a: Point, b: Point) -> bool {
        !self.index.segment_blocked(a, b, &[self.source, self.target])
            && !self.enters_endpoint(a, b)
            && self.allows_clusters(&self.index.crossed_clusters(a, b))
    }

    pub(crate) fn polyline_clear(&self, points: &[Point]) -> bool {
        points.windows(2).all(|w| self.segment_clear(w[0], w[1]))
    }

    /// Polygons a smoothed curve of this edge must stay out of, limited to
    /// those whose box meets `rect`.
    pub(crate) fn keep_out_polygons(&self, rect: &Rect) -> Vec<(&'a [Point], Rect)> {
        let obstacles = self.index.obstacles();
        let mut out = Vec::new();
        let mut near = Vec::new();
        self.index.nodes_near(rect, &mut near);
        for i in near {
            let node = NodeId(i);
            let obstacle = &obstacles.nodes()[i];
            if node != self.source && node != self.target && obstacle.tight_box.intersects(rect) {
                out.push((obstacle.tight.as_slice(), obstacle.tight_box));
            }
        }
        out.push((obstacles.node(self.source).boundary.as_slice(), obstacles.node(self.source).boundary_box));
        if self.target != self.source {
            let obstacle = obstacles.node(self.target);
            out.push((obstacle.boundary.as_slice(), obstacle.boundary_box));
        }
        for id in self.index.clusters_near(rect) {
            if self.is_transparent(id) {
                continue;
            }
            if let Some(obstacle) = obstacles.cluster(id) {
                out.push((obstacle.tight.as_slice(), obstacle.tight_box));
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rect_query_finds_overlapping_items() {
        let bounds = Rect::from_points(Point::new(0.0, 0.0), Point::new(100.0, 100.0));
        let mut grid = SpatialGrid::new(bounds, 10.0, 10_000);
        grid.insert_rect(0, &Rect::from_points(Point::new(5.0, 5.0), Point::new(15.0, 15.0)));
        grid.insert_rect(1, &Rect::from_points(Point::new(80.0, 80.0), Point::new(90.0, 90.0)));
        let mut out = Vec::new();
        grid.query_rect(&Rect::from_points(Point::new(12.0, 12.0), Point::new(20.0, 20.0)), &mut out);
        assert_eq!(out, vec![0]);
        grid.query_rect(&bounds, &mut out);
        assert_eq!(out, vec![0, 1]);
    }

    #[test]
    fn rings_expand_until_off_grid() {
        let bounds = Rect::from_points(Point::new(0.0, 0.0), Point::new(30.0, 30.0));
        let mut grid = SpatialGrid::new(bounds, 10.0, 10_000);
        grid.insert_point(7, Point::new(25.0, 25.0));
        let (cx, cy) = grid.cell_for_point(Point::new(1.0, 1.0));
        let mut out = Vec::new();
        let mut found_at = None;
        let mut ring = 0;
        while grid.ring(cx, cy, ring, &mut out) {
            if out.contains(&7) {
                found_at = Some(ring);
            }
            ring += 1;
        }
        assert_eq!(found_at, Some(2));
    }

    #[test]
    fn oversized_grids_grow_their_cells() {
        let bounds = Rect::from_points(Point::new(0.0, 0.0), Point::new(1000.0, 1000.0));
        let grid = SpatialGrid::new(bounds, 1.0, 100);
        assert!(grid.cell_size() >= 100.0);
    }
}
