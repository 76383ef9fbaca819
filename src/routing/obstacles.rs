//! Padded obstacle polygons for nodes and clusters.
//!
//! Every boundary gets two convex offsets: the *tight* polygon is the hard
//! clearance no route may enter, the *loose* polygon supplies the corners
//! the visibility graph travels along. Loose polygons of nodes that touch
//! are merged into one region so routes never squeeze between them.

use crate::error::{ObstacleOwner, RouteIssue};
use crate::geometry::polygon::{
    convex_hull, pad_convex_polygon, point_strictly_inside, polygons_overlap,
    polyline_around_closed_curve, signed_area, simplify_convex,
};
use crate::geometry::{Curve, Point, Rect};
use crate::graph::{ClusterId, NodeId, RoutingGraph};

#[derive(Debug, Clone)]
pub struct Obstacle {
    pub owner: ObstacleOwner,
    /// Flattened boundary, counter-clockwise.
    pub boundary: Vec<Point>,
    pub tight: Vec<Point>,
    pub loose: Vec<Point>,
    pub boundary_box: Rect,
    pub tight_box: Rect,
    pub loose_box: Rect,
    pub degenerate: bool,
}

/// Union of loose polygons that overlap, as one convex polygon.
#[derive(Debug, Clone)]
pub struct LooseRegion {
    pub polygon: Vec<Point>,
    pub bbox: Rect,
    pub members: Vec<ObstacleOwner>,
}

#[derive(Debug, Clone)]
pub struct ObstacleSet {
    pub tight_padding: f64,
    pub loose_padding: f64,
    nodes: Vec<Obstacle>,
    clusters: Vec<Option<Obstacle>>,
    regions: Vec<LooseRegion>,
    issues: Vec<RouteIssue>,
}

impl ObstacleSet {
    pub fn node(&self, id: NodeId) -> &Obstacle {
        &self.nodes[id.0]
    }

    pub fn nodes(&self) -> &[Obstacle] {
        &self.nodes
    }

    pub fn cluster(&self, id: ClusterId) -> Option<&Obstacle> {
        self.clusters.get(id.0).and_then(Option::as_ref)
    }

    /// Cluster obstacles with their ids; the root never has one.
    pub fn clusters(&self) -> impl Iterator<Item = (ClusterId, &Obstacle)> {
        self.clusters
            .iter()
            .enumerate()
            .filter_map(|(i, o)| o.as_ref().map(|o| (ClusterId(i), o)))
    }

    pub fn regions(&self) -> &[LooseRegion] {
        &self.regions
    }

    pub fn issues(&self) -> &[RouteIssue] {
        &self.issues
    }

    /// Box around every loose polygon.
    pub fn bounds(&self) -> Rect {
        let nodes = self.nodes.iter().map(|o| o.loose_box);
        let clusters = self.clusters.iter().flatten().map(|o| o.loose_box);
        nodes
            .chain(clusters)
            .fold(Rect::empty(), |acc, rect| acc.union(&rect))
    }

    /// True when `point` lies strictly inside some node's tight polygon.
    pub fn inside_any_tight(&self, point: Point) -> bool {
        self.nodes
            .iter()
            .any(|o| o.tight_box.contains(point) && point_strictly_inside(point, &o.tight, 1e-9))
    }
}

/// Chord tolerance for flattening a boundary of the given extent.
pub(crate) fn flatten_tolerance(extent: &Rect) -> f64 {
    (extent.diagonal() * 0.002).clamp(0.01, 0.5)
}

fn build_obstacle(
    owner: ObstacleOwner,
    curve: &Curve,
    tight_padding: f64,
    loose_padding: f64,
    issues: &mut Vec<RouteIssue>,
) -> Obstacle {
    let extent = curve.bounding_box();
    let tolerance = flatten_tolerance(&extent);
    let mut boundary = polyline_around_closed_curve(curve, tolerance);
    let finite = boundary.iter().all(|p| p.is_finite());
    let area = signed_area(&boundary).abs();
    let degenerate = !finite || boundary.len() < 3 || area <= 1e-9 * extent.diagonal().max(1.0).powi(2);
    if degenerate {
        let center = if finite && !extent.is_empty() {
            extent.center()
        } else {
            Point::ORIGIN
        };
        let half = tight_padding / 2.0;
        boundary = Rect::from_center_size(center, 2.0 * half, 2.0 * half)
            .corners()
            .to_vec();
        tracing::warn!(owner = ?owner, "degenerate boundary replaced by a point obstacle");
        issues.push(RouteIssue::DegenerateObstacle { owner });
    }

    let hull = convex_hull(&boundary);
    let merge_tolerance = (tight_padding * 0.1).max(1e-3);
    let simplified = simplify_convex(&hull, merge_tolerance);
    let mut extra = if degenerate { 0.0 } else { tolerance };
    if simplified.len() < hull.len() {
        extra += merge_tolerance;
    }
    let tight = pad_convex_polygon(&simplified, tight_padding + extra);
    let loose = pad_convex_polygon(&simplified, loose_padding + extra);
    Obstacle {
        owner,
        boundary_box: Rect::bounding(boundary.iter().copied()),
        tight_box: Rect::bounding(tight.iter().copied()),
        loose_box: Rect::bounding(loose.iter().copied()),
        boundary,
        tight,
        loose,
        degenerate,
    }
}

struct DisjointSet {
    parent: Vec<usize>,
}

impl DisjointSet {
    fn new(len: usize) -> Self {
        Self {
            parent: (0..len).collect(),
        }
    }

    fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    fn union(&mut self, a: usize, b: usize) -> bool {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra == rb {
            return false;
        }
        let (lo, hi) = if ra < rb { (ra, rb) } else { (rb, ra) };
        self.parent[hi] = lo;
        true
    }
}

/// Regions of node loose polygons, merged until no two regions of the same
/// innermost cluster overlap. Region order follows the smallest member id.
fn merge_node_regions(graph: &RoutingGraph, nodes: &[Obstacle]) -> Vec<LooseRegion> {
    let mut sets = DisjointSet::new(nodes.len());
    let mut polygons: Vec<Vec<Point>> = nodes.iter().map(|o| o.loose.clone()).collect();
    let mut boxes: Vec<Rect> = nodes.iter().map(|o| o.loose_box).collect();

    loop {
        let mut merged_any = false;
        let roots: Vec<usize> = (0..nodes.len()).filter(|&i| sets.find(i) == i).collect();
        for (pos, &a) in roots.iter().enumerate() {
            for &b in &roots[pos + 1..] {
                if sets.find(a) != a || sets.find(b) != b {
                    continue;
                }
                if graph.cluster_of(NodeId(a)) != graph.cluster_of(NodeId(b)) {
                    continue;
                }
                if !boxes[a].intersects(&boxes[b]) || !polygons_overlap(&polygons[a], &polygons[b]) {
                    continue;
                }
                sets.union(a, b);
                let mut points = std::mem::take(&mut polygons[a]);
                points.extend(std::mem::take(&mut polygons[b]));
                polygons[a] = convex_hull(&points);
                boxes[a] = Rect::bounding(polygons[a].iter().copied());
                merged_any = true;
            }
        }
        if !merged_any {
            break;
        }
    }

    let mut members: Vec<Vec<ObstacleOwner>> = vec![Vec::new(); nodes.len()];
    for i in 0..nodes.len() {
        let root = sets.find(i);
        members[root].push(ObstacleOwner::Node(NodeId(i)));
    }
    (0..nodes.len())
        .filter(|&i| sets.find(i) == i)
        .map(|i| LooseRegion {
            bbox: boxes[i],
            polygon: std::mem::take(&mut polygons[i]),
            members: std::mem::take(&mut members[i]),
        })
        .collect()
}

pub fn build_obstacles(graph: &RoutingGraph, tight_padding: f64, loose_padding: f64) -> ObstacleSet {
    let mut issues = Vec::new();
    let nodes: Vec<Obstacle> = graph
        .nodes()
        .iter()
        .enumerate()
        .map(|(i, node)| {
            build_obstacle(
                ObstacleOwner::Node(NodeId(i)),
                &node.boundary,
                tight_padding,
                loose_padding,
                &mut issues,
            )
        })
        .collect();
    let clusters: Vec<Option<Obstacle>> = graph
        .clusters()
        .iter()
        .enumerate()
        .map(|(i, cluster)| {
            let id = ClusterId(i);
            if id == ClusterId::ROOT {
                return None;
            }
            cluster.boundary.as_ref().map(|boundary| {
                build_obstacle(
                    ObstacleOwner::Cluster(id),
                    boundary,
                    tight_padding,
                    loose_padding,
                    &mut issues,
                )
            })
        })
        .collect();

    let mut regions = merge_node_regions(graph, &nodes);
    for (i, cluster) in clusters.iter().enumerate() {
        if let Some(obstacle) = cluster {
            regions.push(LooseRegion {
                polygon: obstacle.loose.clone(),
                bbox: obstacle.loose_box,
                members: vec![ObstacleOwner::Cluster(ClusterId(i))],
            });
        }
    }

    tracing::debug!(
        nodes = nodes.len(),
        clusters = clusters.iter().flatten().count(),
        regions = regions.len(),
        degenerate = issues.len(),
        "obstacles built"
    );

    ObstacleSet {
        tight_padding,
        loose_padding,
        nodes,
        clusters,
        regions,
        issues,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::factory;
    use crate::geometry::polygon::{distance_to_boundary, point_in_polygon};
    use crate::graph::Node;

    fn graph_with(shapes: Vec<Curve>) -> RoutingGraph {
        let mut graph = RoutingGraph::new();
        for (i, shape) in shapes.into_iter().enumerate() {
            graph.add_node(Node::new(format!("n{i}"), shape));
        }
        graph
    }

    #[test]
    fn tight_polygon_clears_boundary_and_loose_contains_tight() {
        let graph = graph_with(vec![factory::rounded_rectangle(
            20.0,
            20.0,
            3.0,
            3.0,
            Point::ORIGIN,
        )]);
        let set = build_obstacles(&graph, 2.0, 4.0);
        let obstacle = set.node(NodeId(0));
        let samples = graph.nodes()[0].boundary.flatten(0.001);
        for p in samples {
            assert!(point_in_polygon(p, &obstacle.tight), "{p:?}");
            assert!(distance_to_boundary(p, &obstacle.tight) >= 2.0 - 1e-6, "{p:?}");
        }
        for p in &obstacle.tight {
            assert!(
                point_in_polygon(*p, &obstacle.loose) || distance_to_boundary(*p, &obstacle.loose) < 1e-9
            );
        }
        assert!(set.issues().is_empty());
    }

    #[test]
    fn touching_loose_polygons_merge_into_one_region() {
        let graph = graph_with(vec![
            factory::rectangle(10.0, 10.0, Point::new(0.0, 0.0)),
            factory::rectangle(10.0, 10.0, Point::new(16.0, 0.0)),
            factory::rectangle(10.0, 10.0, Point::new(100.0, 0.0)),
        ]);
        let set = build_obstacles(&graph, 1.0, 4.0);
        assert_eq!(set.regions().len(), 2);
        assert_eq!(set.regions()[0].members.len(), 2);
        assert!(point_in_polygon(Point::new(8.0, 0.0), &set.regions()[0].polygon));
    }

    #[test]
    fn zero_area_boundary_becomes_point_obstacle() {
        let flat = Curve::polyline(&[Point::new(0.0, 0.0), Point::new(10.0, 0.0)]).unwrap();
        let graph = graph_with(vec![flat]);
        let set = build_obstacles(&graph, 2.0, 3.0);
        let obstacle = set.node(NodeId(0));
        assert!(obstacle.degenerate);
        assert_eq!(
            set.issues(),
            &[RouteIssue::DegenerateObstacle {
                owner: ObstacleOwner::Node(NodeId(0))
            }]
        );
        assert!(point_in_polygon(Point::new(5.0, 0.0), &obstacle.tight));
    }

    #[test]
    fn clusters_get_obstacles_but_root_does_not() {
        let mut graph = graph_with(vec![factory::rectangle(10.0, 10.0, Point::ORIGIN)]);
        let cluster = graph
            .add_cluster(
                ClusterId::ROOT,
                "c",
                Some(factory::rectangle(30.0, 30.0, Point::ORIGIN)),
            )
            .unwrap();
        graph.move_node(NodeId(0), cluster).unwrap();
        let set = build_obstacles(&graph, 1.0, 2.0);
        assert!(set.cluster(ClusterId::ROOT).is_none());
        assert!(set.cluster(cluster).is_some());
        assert_eq!(set.clusters().count(), 1);
        assert_eq!(set.regions().len(), 2);
    }
}
