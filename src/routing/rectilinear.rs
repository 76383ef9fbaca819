//! Orthogonal routing over padded bounding boxes.
//!
//! Each edge leaves its source through a side port, runs a short stub out to
//! the loose box and then follows the Hanan grid spanned by all box sides
//! and stub ends near the edge, widening to the whole scene when needed.
//! Grids above a fixed vertex budget are not searched. The search works on
//! (vertex, heading) states so that turns can be charged.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BinaryHeap};

use crate::config::RectilinearConfig;
use crate::error::ObstacleOwner;
use crate::geometry::intersect::{ray_polygon_intersection, segment_enters_rect};
use crate::geometry::polygon::compress_path;
use crate::geometry::{Arc, Curve, POINT_EPSILON, Point, Rect, Segment};
use crate::graph::{ClusterId, EdgeId, NodeId, RoutingGraph};

use super::obstacles::ObstacleSet;
use super::spatial::{MAX_GRID_CELLS, SpatialGrid};

/// A dominant axis wins when its center offset exceeds the other by this.
const DIRECTION_PREF_RATIO: f64 = 1.2;
/// Headings of grid moves: +x, -x, +y, -y.
const HEADINGS: [(i32, i32); 4] = [(1, 0), (-1, 0), (0, 1), (0, -1)];
/// Grid vertices one edge search may allocate; four states each.
pub(crate) const MAX_HANAN_CELLS: usize = 40_000;
/// Padding of the first search window relative to the stub span.
const WINDOW_GROWTH: f64 = 0.5;

/// Side of a node box. `Top` faces +y.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EdgeSide {
    Left,
    Right,
    Top,
    Bottom,
}

impl EdgeSide {
    fn normal(self) -> Point {
        match self {
            EdgeSide::Left => Point::new(-1.0, 0.0),
            EdgeSide::Right => Point::new(1.0, 0.0),
            EdgeSide::Top => Point::new(0.0, 1.0),
            EdgeSide::Bottom => Point::new(0.0, -1.0),
        }
    }

    /// Axis along which ports slide on this side.
    fn along(self) -> Point {
        match self {
            EdgeSide::Left | EdgeSide::Right => Point::new(0.0, 1.0),
            EdgeSide::Top | EdgeSide::Bottom => Point::new(1.0, 0.0),
        }
    }

    fn heading(self) -> u8 {
        match self {
            EdgeSide::Right => 0,
            EdgeSide::Left => 1,
            EdgeSide::Top => 2,
            EdgeSide::Bottom => 3,
        }
    }
}

fn side_is_vertical(side: EdgeSide) -> bool {
    matches!(side, EdgeSide::Left | EdgeSide::Right)
}

/// Sides an edge leaves `from` and enters `to` by.
pub(crate) fn edge_sides(from: &Rect, to: &Rect) -> (EdgeSide, EdgeSide) {
    let d = to.center() - from.center();
    let x_overlap = from.min.x < to.max.x && to.min.x < from.max.x;
    let y_overlap = from.min.y < to.max.y && to.min.y < from.max.y;
    let ratio = d.x.abs() / d.y.abs().max(1e-3);
    let horiz_pref = ratio > DIRECTION_PREF_RATIO || (y_overlap && ratio > 0.9);
    let vert_pref = ratio < 1.0 / DIRECTION_PREF_RATIO || (x_overlap && ratio < 1.1);
    let use_horizontal = if horiz_pref != vert_pref {
        horiz_pref
    } else {
        d.x.abs() >= d.y.abs()
    };
    match (use_horizontal, d.x >= 0.0, d.y >= 0.0) {
        (true, true, _) => (EdgeSide::Right, EdgeSide::Left),
        (true, false, _) => (EdgeSide::Left, EdgeSide::Right),
        (false, _, true) => (EdgeSide::Top, EdgeSide::Bottom),
        (false, _, false) => (EdgeSide::Bottom, EdgeSide::Top),
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct GridState {
    x: usize,
    y: usize,
    dir: u8,
}

#[derive(Clone, Copy, Debug)]
struct GridEntry {
    est: f64,
    cost: f64,
    state: GridState,
}

impl Ord for GridEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .est
            .total_cmp(&self.est)
            .then_with(|| other.cost.total_cmp(&self.cost))
            .then_with(|| other.state.y.cmp(&self.state.y))
            .then_with(|| other.state.x.cmp(&self.state.x))
            .then_with(|| other.state.dir.cmp(&self.state.dir))
    }
}

impl PartialOrd for GridEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for GridEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for GridEntry {}

/// Sorted, deduplicated grid line coordinates.
struct HananGrid {
    xs: Vec<f64>,
    ys: Vec<f64>,
}

impl HananGrid {
    fn new(mut xs: Vec<f64>, mut ys: Vec<f64>, max_cells: usize) -> Option<Self> {
        for axis in [&mut xs, &mut ys] {
            axis.retain(|v| v.is_finite());
            axis.sort_by(f64::total_cmp);
            axis.dedup();
        }
        if xs.len() < 2 || ys.len() < 2 {
            return None;
        }
        if xs.len().saturating_mul(ys.len()) > max_cells {
            return None;
        }
        Some(Self { xs, ys })
    }

    fn column(&self, x: f64) -> Option<usize> {
        self.xs.binary_search_by(|v| v.total_cmp(&x)).ok()
    }

    fn row(&self, y: f64) -> Option<usize> {
        self.ys.binary_search_by(|v| v.total_cmp(&y)).ok()
    }
}

/// Where an edge end leaves its node: the boundary port, the end of the stub
/// outside the loose box, and the side used.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SidePort {
    pub(crate) port: Point,
    pub(crate) stub: Point,
    pub(crate) side: EdgeSide,
}

/// Which boxes a route may pass through.
struct Passage<'p> {
    nodes: &'p [NodeId],
    clusters: &'p [ClusterId],
}

impl Passage<'_> {
    fn allows(&self, owner: ObstacleOwner) -> bool {
        match owner {
            ObstacleOwner::Node(node) => self.nodes.contains(&node),
            ObstacleOwner::Cluster(cluster) => self.clusters.binary_search(&cluster).is_ok(),
        }
    }
}

pub(crate) struct RectilinearScene<'a> {
    graph: &'a RoutingGraph,
    obstacles: &'a ObstacleSet,
    config: &'a RectilinearConfig,
    boxes: Vec<(Rect, ObstacleOwner)>,
    grid: SpatialGrid,
    frame: Rect,
    /// Least padding of a search window.
    reach: f64,
    margin: f64,
}

impl<'a> RectilinearScene<'a> {
    pub(crate) fn new(graph: &'a RoutingGraph, obstacles: &'a ObstacleSet, config: &'a RectilinearConfig) -> Self {
        let mut boxes: Vec<(Rect, ObstacleOwner)> = obstacles
            .nodes()
            .iter()
            .map(|o| (o.tight_box, o.owner))
            .collect();
        boxes.extend(obstacles.clusters().map(|(_, o)| (o.tight_box, o.owner)));
        let bounds = obstacles.bounds();
        let average = if boxes.is_empty() {
            1.0
        } else {
            boxes.iter().map(|(r, _)| r.width().max(r.height())).sum::<f64>() / boxes.len() as f64
        };
        let mut grid = SpatialGrid::new(bounds, (average * 2.0).max(1.0), MAX_GRID_CELLS);
        for (i, (rect, _)) in boxes.iter().enumerate() {
            grid.insert_rect(i, rect);
        }
        let frame = bounds.padded(obstacles.loose_padding.max(obstacles.tight_padding) * 2.0);
        Self {
            graph,
            obstacles,
            config,
            boxes,
            grid,
            frame,
            reach: (average * 2.0).max(obstacles.loose_padding * 2.0).max(1.0),
            margin: 1e-7 * bounds.diagonal().max(1.0),
        }
    }

    fn node_box(&self, node: NodeId) -> Rect {
        self.obstacles.node(node).boundary_box
    }

    fn segment_blocked(&self, a: Point, b: Point, passage: &Passage<'_>) -> bool {
        let mut near = Vec::new();
        self.grid.query_rect(&Rect::from_points(a, b), &mut near);
        near.into_iter().any(|i| {
            let (rect, owner) = &self.boxes[i];
            !passage.allows(*owner) && segment_enters_rect(a, b, rect, self.margin)
        })
    }

    /// Port of `node` on `side`, shifted along the side by `offset`.
    pub(crate) fn side_port(&self, node: NodeId, side: EdgeSide, offset: f64) -> SidePort {
        let obstacle = self.obstacles.node(node);
        let bbox = obstacle.boundary_box;
        let along = side.along();
        let half_span = (if side_is_vertical(side) { bbox.height() } else { bbox.width() }) / 2.0;
        let offset = offset.clamp(-half_span * 0.9, half_span * 0.9);
        let origin = bbox.center() + along * offset;
        let normal = side.normal();
        let port = ray_polygon_intersection(origin, normal, &obstacle.boundary).unwrap_or_else(|| {
            let reach = (if side_is_vertical(side) { bbox.width() } else { bbox.height() }) / 2.0;
            origin + normal * reach
        });
        let loose = obstacle.loose_box;
        let stub = match side {
            EdgeSide::Left => Point::new(loose.min.x, port.y),
            EdgeSide::Right => Point::new(loose.max.x, port.y),
            EdgeSide::Top => Point::new(port.x, loose.max.y),
            EdgeSide::Bottom => Point::new(port.x, loose.min.y),
        };
        SidePort { port, stub, side }
    }

    pub(crate) fn ports_for(&self, source: NodeId, target: NodeId, offset: f64) -> (SidePort, SidePort) {
        let (from_side, to_side) = edge_sides(&self.node_box(source), &self.node_box(target));
        (
            self.side_port(source, from_side, offset),
            self.side_port(target, to_side, offset),
        )
    }

    fn transparent_clusters(&self, source: NodeId, target: NodeId) -> Vec<ClusterId> {
        let mut clusters = self.graph.ancestors(source);
        clusters.extend(self.graph.ancestors(target));
        clusters.sort_unstable();
        clusters.dedup();
        clusters
    }

    /// Axis-aligned route from `start` to `end`, or `None` when the grid
    /// offers no free path or grows past [`MAX_HANAN_CELLS`].
    ///
    /// The grid is first spanned by the boxes near the two stubs only; the
    /// whole scene is tried when that window holds no route.
    pub(crate) fn route_edge(&self, source: NodeId, target: NodeId, start: &SidePort, end: &SidePort) -> Option<Vec<Point>> {
        let clusters = self.transparent_clusters(source, target);
        let passage = Passage {
            nodes: &[],
            clusters: &clusters,
        };
        let span = Rect::from_points(start.stub, end.stub);
        let window = span.padded((span.width().max(span.height()) * WINDOW_GROWTH).max(self.reach));
        for area in [window, self.frame] {
            let Some(grid) = self.hanan_grid(&area, start, end) else {
                tracing::debug!(
                    source = source.0,
                    target = target.0,
                    max_cells = MAX_HANAN_CELLS,
                    "orthogonal grid too large"
                );
                return None;
            };
            if let Some(points) = self.search_grid(&grid, &passage, start, end) {
                return Some(points);
            }
            if area.contains(self.frame.min) && area.contains(self.frame.max) {
                break;
            }
        }
        None
    }

    /// Grid lines of every box inside `area`, plus the area border and the
    /// stub ends.
    fn hanan_grid(&self, area: &Rect, start: &SidePort, end: &SidePort) -> Option<HananGrid> {
        let mut xs = vec![area.min.x, area.max.x, start.stub.x, end.stub.x];
        let mut ys = vec![area.min.y, area.max.y, start.stub.y, end.stub.y];
        let mut near = Vec::new();
        self.grid.query_rect(area, &mut near);
        for i in near {
            let (rect, _) = &self.boxes[i];
            if !rect.intersects(area) {
                continue;
            }
            xs.extend([rect.min.x, rect.max.x].into_iter().filter(|x| (area.min.x..=area.max.x).contains(x)));
            ys.extend([rect.min.y, rect.max.y].into_iter().filter(|y| (area.min.y..=area.max.y).contains(y)));
        }
        HananGrid::new(xs, ys, MAX_HANAN_CELLS)
    }

    fn search_grid(&self, grid: &HananGrid, passage: &Passage<'_>, start: &SidePort, end: &SidePort) -> Option<Vec<Point>> {
        let from = (grid.column(start.stub.x)?, grid.row(start.stub.y)?);
        let to = (grid.column(end.stub.x)?, grid.row(end.stub.y)?);
        let (cols, rows) = (grid.xs.len(), grid.ys.len());
        let point_at = |x: usize, y: usize| Point::new(grid.xs[x], grid.ys[y]);
        let turn_penalty = self.config.bend_penalty.max(0.0);
        let arrival = end.side.heading() ^ 1;
        let goal = point_at(to.0, to.1);

        let index = |s: GridState| (s.y * cols + s.x) * 4 + s.dir as usize;
        let mut best_cost = vec![f64::INFINITY; cols * rows * 4];
        let mut prev: Vec<Option<GridState>> = vec![None; cols * rows * 4];
        let mut heap = BinaryHeap::new();
        let first = GridState {
            x: from.0,
            y: from.1,
            dir: start.side.heading(),
        };
        best_cost[index(first)] = 0.0;
        heap.push(GridEntry {
            est: manhattan(start.stub, goal),
            cost: 0.0,
            state: first,
        });

        let mut end_state = None;
        while let Some(GridEntry { cost, state, .. }) = heap.pop() {
            if cost > best_cost[index(state)] {
                continue;
            }
            if (state.x, state.y) == to {
                end_state = Some(state);
                break;
            }
            let here = point_at(state.x, state.y);
            for (dir, (dx, dy)) in HEADINGS.iter().enumerate() {
                let dir = dir as u8;
                if dir == state.dir ^ 1 {
                    continue;
                }
                let nx = state.x as i64 + *dx as i64;
                let ny = state.y as i64 + *dy as i64;
                if nx < 0 || ny < 0 || nx >= cols as i64 || ny >= rows as i64 {
                    continue;
                }
                let next = GridState {
                    x: nx as usize,
                    y: ny as usize,
                    dir,
                };
                let there = point_at(next.x, next.y);
                if self.segment_blocked(here, there, passage) {
                    continue;
                }
                let mut next_cost = cost + here.distance(there);
                if dir != state.dir {
                    next_cost += turn_penalty;
                }
                if (next.x, next.y) == to && dir != arrival {
                    next_cost += turn_penalty;
                }
                if next_cost >= best_cost[index(next)] {
                    continue;
                }
                best_cost[index(next)] = next_cost;
                prev[index(next)] = Some(state);
                heap.push(GridEntry {
                    est: next_cost + manhattan(there, goal),
                    cost: next_cost,
                    state: next,
                });
            }
        }

        let mut cur = end_state?;
        let mut points = vec![end.port];
        loop {
            points.push(point_at(cur.x, cur.y));
            match prev[index(cur)] {
                Some(p) => cur = p,
                None => break,
            }
        }
        points.push(start.port);
        points.reverse();
        Some(compress_path(&points))
    }

    /// Route used when the grid search fails: stubs joined by one bend.
    pub(crate) fn fallback_path(&self, start: &SidePort, end: &SidePort) -> Vec<Point> {
        let elbow = if side_is_vertical(start.side) {
            Point::new(end.stub.x, start.stub.y)
        } else {
            Point::new(start.stub.x, end.stub.y)
        };
        compress_path(&[start.port, start.stub, elbow, end.stub, end.port])
    }

    /// Loop around one corner of the node box, growing with `ordinal`. The
    /// first candidate whose outer part is free is used.
    pub(crate) fn self_loop(&self, node: NodeId, ordinal: usize) -> Vec<Point> {
        let obstacle = self.obstacles.node(node);
        let loose = obstacle.loose_box;
        let reach = ordinal as f64 * self.config.edge_separation.max(0.0);
        let left = self.side_port(node, EdgeSide::Left, 0.0).port;
        let right = self.side_port(node, EdgeSide::Right, 0.0).port;
        let top = self.side_port(node, EdgeSide::Top, 0.0).port;
        let bottom = self.side_port(node, EdgeSide::Bottom, 0.0).port;
        let left_x = loose.min.x - reach;
        let right_x = loose.max.x + reach;
        let top_y = loose.max.y + reach;
        let bottom_y = loose.min.y - reach;

        let candidates = [
            [right, Point::new(right_x, right.y), Point::new(right_x, top_y), Point::new(top.x, top_y), top],
            [top, Point::new(top.x, top_y), Point::new(left_x, top_y), Point::new(left_x, left.y), left],
            [left, Point::new(left_x, left.y), Point::new(left_x, bottom_y), Point::new(bottom.x, bottom_y), bottom],
            [bottom, Point::new(bottom.x, bottom_y), Point::new(right_x, bottom_y), Point::new(right_x, right.y), right],
        ];
        let clusters = self.transparent_clusters(node, node);
        let own = [node];
        let passage = Passage {
            nodes: &own,
            clusters: &clusters,
        };
        let clear = |loop_points: &[Point; 5]| {
            loop_points[1..4]
                .windows(2)
                .all(|w| !self.segment_blocked(w[0], w[1], &passage))
        };
        let chosen = candidates.iter().find(|c| clear(*c)).unwrap_or(&candidates[0]);
        compress_path(chosen)
    }
}

fn manhattan(a: Point, b: Point) -> f64 {
    (a.x - b.x).abs() + (a.y - b.y).abs()
}

/// Side-port offsets separating parallel edges, indexed like `edges`.
pub(crate) fn parallel_offsets(graph: &RoutingGraph, edges: &[EdgeId], separation: f64) -> Vec<f64> {
    let mut groups: BTreeMap<(NodeId, NodeId), Vec<usize>> = BTreeMap::new();
    for (slot, id) in edges.iter().enumerate() {
        if let Some(edge) = graph.edge(*id)
            && !edge.is_self_loop()
        {
            groups.entry(edge.unordered_key()).or_default().push(slot);
        }
    }
    let mut offsets = vec![0.0; edges.len()];
    for members in groups.values() {
        let count = members.len() as f64;
        for (i, &slot) in members.iter().enumerate() {
            offsets[slot] = (i as f64 - (count - 1.0) / 2.0) * separation;
        }
    }
    offsets
}

/// Curve along an axis-aligned polyline with each corner replaced by a
/// quarter arc of at most `radius`.
pub(crate) fn round_corners(points: &[Point], radius: f64) -> Curve {
    let (Some(&first), Some(&last)) = (points.first(), points.last()) else {
        return Curve::line(Point::ORIGIN, Point::ORIGIN);
    };
    let mut segments = Vec::with_capacity(points.len() * 2);
    let mut cursor = first;
    for w in points.windows(3) {
        let [prev, corner, next] = [w[0], w[1], w[2]];
        let (Some(d1), Some(d2)) = ((corner - prev).normalize(), (next - corner).normalize()) else {
            continue;
        };
        let turn = d1.cross(d2);
        let r = radius.min(corner.distance(prev) / 2.0).min(corner.distance(next) / 2.0);
        if r <= POINT_EPSILON || turn.abs() < 1e-9 {
            if !cursor.close_to(corner, POINT_EPSILON) {
                segments.push(Segment::line(cursor, corner));
            }
            cursor = corner;
            continue;
        }
        let enter = corner - d1 * r;
        let exit = corner + d2 * r;
        if !cursor.close_to(enter, POINT_EPSILON) {
            segments.push(Segment::line(cursor, enter));
        }
        let center = enter + d2 * r;
        segments.push(Segment::Arc(Arc {
            center,
            radius: r,
            start_angle: (enter - center).angle(),
            sweep: if turn > 0.0 {
                std::f64::consts::FRAC_PI_2
            } else {
                -std::f64::consts::FRAC_PI_2
            },
        }));
        cursor = exit;
    }
    if !cursor.close_to(last, POINT_EPSILON) {
        segments.push(Segment::line(cursor, last));
    }
    Curve::from_segments(segments).unwrap_or_else(|| Curve::line(first, last))
}
