//! Edge routers.
//!
//! [`SplineRouter`] runs the full pipeline: padded obstacles, the
//! cone-restricted visibility graph, a shortest path per edge, separation of
//! shared routes and finally curve fitting. [`RectilinearRouter`] reuses the
//! obstacles but produces axis-aligned routes over a box grid.
//!
//! Both routers are single-use. Progress is reported through a callback after
//! each edge; returning [`ControlFlow::Break`] stops the run early.

pub mod bundling;
mod fitting;
pub mod obstacles;
mod ports;
mod rectilinear;
mod search;
mod self_loops;
mod spatial;
pub mod visibility;

use std::collections::{BTreeMap, HashMap};
use std::ops::ControlFlow;

use serde::Serialize;

use crate::config::RouterConfig;
use crate::error::{GraphError, Result, RouteIssue, RouterError};
use crate::geometry::{Curve, Point};
use crate::graph::{EdgeGeometry, EdgeId, NodeId, RouteStatus, RoutingGraph};

pub use bundling::{Bundle, BundleKind};
pub use obstacles::{LooseRegion, Obstacle, ObstacleSet, build_obstacles};
pub use visibility::{VisEdge, VisibilityGraph, build_visibility_graph};

use bundling::{RoutedPath, same_route, shifted_route};
use ports::{link_port, port_on_boundary};
use rectilinear::{RectilinearScene, parallel_offsets, round_corners};
use search::{PathQuery, route_path, shortcut_path};
use spatial::{EdgeContext, ObstacleIndex};

/// Stage a router has reached. Runs only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum RouterState {
    Idle,
    ObstaclesBuilt,
    GraphBuilt,
    EdgesRouted,
    Bundled,
    Fitted,
    Done,
    Cancelled,
}

/// Summary of one run.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutingReport {
    pub routed: usize,
    pub fallbacks: usize,
    pub self_loops: usize,
    /// Edges drawn as a strand of some bundle.
    pub bundled: usize,
    pub overflow: usize,
    pub bundles: Vec<Bundle>,
    pub issues: Vec<RouteIssue>,
    pub cancelled: bool,
}

impl RoutingReport {
    fn count(&mut self, status: RouteStatus) {
        match status {
            RouteStatus::Routed => self.routed += 1,
            RouteStatus::Fallback => self.fallbacks += 1,
            RouteStatus::BundleOverflow => self.overflow += 1,
            RouteStatus::SelfLoop => self.self_loops += 1,
            RouteStatus::Unrouted => {}
        }
    }
}

fn selected_edges(graph: &RoutingGraph, edges: Option<&[EdgeId]>) -> Result<Vec<EdgeId>> {
    match edges {
        Some(edges) => {
            if let Some(missing) = edges.iter().find(|id| graph.edge(**id).is_none()) {
                return Err(GraphError::UnknownEdge(*missing).into());
            }
            Ok(edges.to_vec())
        }
        None => Ok((0..graph.edges().len()).map(EdgeId).collect()),
    }
}

/// Reports `done / total`, or a single `1.0` for an empty run.
fn notify<F>(progress: &mut F, done: usize, total: usize) -> ControlFlow<()>
where
    F: FnMut(f64) -> ControlFlow<()>,
{
    if total == 0 {
        return progress(1.0);
    }
    progress(done as f64 / total as f64)
}

/// Ordinal of each self-loop among the loops on the same node.
fn self_loop_ordinals(graph: &RoutingGraph, edges: &[EdgeId]) -> HashMap<EdgeId, usize> {
    let mut seen: HashMap<NodeId, usize> = HashMap::new();
    let mut ordinals = HashMap::new();
    for id in edges {
        if let Some(edge) = graph.edge(*id)
            && edge.is_self_loop()
        {
            let slot = seen.entry(edge.source).or_insert(0);
            ordinals.insert(*id, *slot);
            *slot += 1;
        }
    }
    ordinals
}

fn store(graph: &mut RoutingGraph, results: Vec<(EdgeId, Curve, RouteStatus)>, report: &mut RoutingReport) {
    for (id, curve, status) in results {
        report.count(status);
        if let Some(edge) = graph.edges_mut().get_mut(id.0) {
            edge.geometry = EdgeGeometry {
                curve: Some(curve),
                status,
            };
        }
    }
}

/// Searches a route between the ray ports of `source` and `target`. The port
/// points are returned as well for a straight fallback.
fn search_edge(
    vis: &VisibilityGraph,
    ctx: &EdgeContext<'_, '_>,
    graph: &RoutingGraph,
    source: NodeId,
    target: NodeId,
    avoid: &[(Point, Point)],
    bend_penalty: f64,
) -> (Option<Vec<Point>>, [Point; 2]) {
    let source_node = &graph.nodes()[source.0];
    let target_node = &graph.nodes()[target.0];
    let (sc, tc) = (source_node.center(), target_node.center());
    let source_port = port_on_boundary(&source_node.boundary, sc, tc);
    let target_port = port_on_boundary(&target_node.boundary, tc, sc);
    let source_links = link_port(vis, ctx, &source_port);
    let target_links = link_port(vis, ctx, &target_port);
    let query = PathQuery {
        source: source_port,
        target: target_port,
        source_links: &source_links,
        target_links: &target_links,
        direct: ctx.segment_clear(source_port.point, target_port.point),
        avoid,
    };
    let found = route_path(vis, ctx, &query, bend_penalty).map(|points| shortcut_path(&points, ctx, avoid));
    (found, [source_port.point, target_port.point])
}

/// Gives every path that repeats an earlier route between the same two nodes
/// a route of its own. A search that avoids the earlier routes is tried
/// first; otherwise the route is shifted sideways by multiples of `spacing`.
fn separate_repeats(
    paths: &mut [RoutedPath],
    graph: &RoutingGraph,
    index: &ObstacleIndex<'_>,
    vis: &VisibilityGraph,
    bend_penalty: f64,
    spacing: f64,
) {
    let mut by_pair: BTreeMap<(NodeId, NodeId), Vec<usize>> = BTreeMap::new();
    for (i, path) in paths.iter().enumerate() {
        let key = (path.source.min(path.target), path.source.max(path.target));
        by_pair.entry(key).or_default().push(i);
    }
    for members in by_pair.values().filter(|m| m.len() >= 2) {
        for (pos, &i) in members.iter().enumerate() {
            let earlier = &members[..pos];
            let repeats = |points: &[Point]| earlier.iter().any(|&j| same_route(points, &paths[j].points));
            if !repeats(&paths[i].points) {
                continue;
            }
            let (source, target) = (paths[i].source, paths[i].target);
            let avoid: Vec<(Point, Point)> = earlier
                .iter()
                .flat_map(|&j| paths[j].points.windows(2).map(|w| (w[0], w[1])))
                .collect();
            let ctx = EdgeContext::new(index, graph, source, target);
            let points = match search_edge(vis, &ctx, graph, source, target, &avoid, bend_penalty) {
                (Some(points), _) if !repeats(&points) => {
                    tracing::debug!(edge = paths[i].edge.0, "repeated route replaced by a separate one");
                    points
                }
                _ => {
                    tracing::warn!(edge = paths[i].edge.0, "no separate route; shifting the repeated one");
                    let mut lane: usize = 1;
                    loop {
                        let side = if lane % 2 == 1 { 1.0 } else { -1.0 };
                        let shifted = shifted_route(&paths[i], graph, side * spacing * lane.div_ceil(2) as f64);
                        if !repeats(&shifted) || lane > 2 * members.len() {
                            break shifted;
                        }
                        lane += 1;
                    }
                }
            };
            paths[i].points = points;
        }
    }
}

/// Obstacle-avoiding spline router.
#[derive(Debug, Clone)]
pub struct SplineRouter {
    config: RouterConfig,
    edges: Option<Vec<EdgeId>>,
    state: RouterState,
}

impl SplineRouter {
    pub fn new(config: RouterConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            edges: None,
            state: RouterState::Idle,
        })
    }

    /// Routes only `edges`; other edges keep their geometry.
    pub fn with_edges(mut self, edges: Vec<EdgeId>) -> Self {
        self.edges = Some(edges);
        self
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    pub fn state(&self) -> RouterState {
        self.state
    }

    pub fn run<F>(&mut self, graph: &mut RoutingGraph, mut progress: F) -> Result<RoutingReport>
    where
        F: FnMut(f64) -> ControlFlow<()>,
    {
        if self.state != RouterState::Idle {
            return Err(RouterError::AlreadyRun);
        }
        graph.validate()?;
        let edges = selected_edges(graph, self.edges.as_deref())?;
        let config = &self.config;
        let mut report = RoutingReport::default();

        let obstacles = build_obstacles(graph, config.tight_padding, config.loose_padding);
        report.issues.extend_from_slice(obstacles.issues());
        self.state = RouterState::ObstaclesBuilt;

        let index = ObstacleIndex::new(&obstacles);
        let vis = visibility::build_with_index(&index, config.cone_half_angle);
        self.state = RouterState::GraphBuilt;

        let ordinals = self_loop_ordinals(graph, &edges);
        let loop_spacing = config.edge_separation.max(config.tight_padding);
        let mut loops: Vec<(EdgeId, Curve, RouteStatus)> = Vec::new();
        let mut paths: Vec<RoutedPath> = Vec::new();
        let mut fallbacks: Vec<EdgeId> = Vec::new();
        let mut cancelled = false;

        for (done, &id) in edges.iter().enumerate() {
            let Some(edge) = graph.edge(id) else {
                continue;
            };
            let (source, target) = (edge.source, edge.target);
            let ctx = EdgeContext::new(&index, graph, source, target);
            if source == target {
                let ordinal = ordinals.get(&id).copied().unwrap_or(0);
                let curve = self_loops::route_self_loop(
                    &graph.nodes()[source.0].boundary,
                    &ctx,
                    ordinal,
                    config.tight_padding,
                    loop_spacing,
                );
                loops.push((id, curve, RouteStatus::SelfLoop));
            } else {
                let (found, ports) = search_edge(&vis, &ctx, graph, source, target, &[], config.bend_penalty);
                let points = found.unwrap_or_else(|| {
                    tracing::warn!(edge = id.0, "no path found; using a straight segment");
                    report.issues.push(RouteIssue::NoPathFound { edge: id });
                    fallbacks.push(id);
                    ports.to_vec()
                });
                paths.push(RoutedPath {
                    edge: id,
                    source,
                    target,
                    points,
                });
            }
            if notify(&mut progress, done + 1, edges.len()).is_break() {
                tracing::debug!(edge = id.0, done = done + 1, "routing cancelled");
                cancelled = true;
                break;
            }
        }
        if edges.is_empty() {
            cancelled = notify(&mut progress, 0, 0).is_break();
        }
        self.state = RouterState::EdgesRouted;

        let mut overflow = Vec::new();
        if !cancelled {
            let outcome = bundling::bundle(
                &mut paths,
                graph,
                &index,
                config.bundling.as_ref(),
                config.edge_separation,
                config.tight_padding,
            );
            report.bundled = outcome.bundles.iter().map(|b| b.members.len()).sum();
            for edge in &outcome.overflow {
                report.issues.push(RouteIssue::BundleOverflow { edge: *edge });
            }
            overflow = outcome.overflow;
            report.bundles = outcome.bundles;
            separate_repeats(&mut paths, graph, &index, &vis, config.bend_penalty, loop_spacing);
            self.state = RouterState::Bundled;
        }

        let mut results = loops;
        for path in &paths {
            let ctx = EdgeContext::new(&index, graph, path.source, path.target);
            let curve = fitting::fit_spline(&path.points, &ctx, &config.fitting);
            let status = if fallbacks.contains(&path.edge) {
                RouteStatus::Fallback
            } else if overflow.contains(&path.edge) {
                RouteStatus::BundleOverflow
            } else {
                RouteStatus::Routed
            };
            results.push((path.edge, curve, status));
        }
        results.sort_by_key(|(id, _, _)| *id);
        self.state = RouterState::Fitted;

        store(graph, results, &mut report);
        report.cancelled = cancelled;
        self.state = if cancelled {
            RouterState::Cancelled
        } else {
            RouterState::Done
        };
        tracing::debug!(
            routed = report.routed,
            fallbacks = report.fallbacks,
            self_loops = report.self_loops,
            bundled = report.bundled,
            overflow = report.overflow,
            cancelled,
            "spline routing finished"
        );
        Ok(report)
    }
}

/// Orthogonal router producing axis-aligned routes with rounded corners.
#[derive(Debug, Clone)]
pub struct RectilinearRouter {
    config: RouterConfig,
    edges: Option<Vec<EdgeId>>,
    state: RouterState,
}

impl RectilinearRouter {
    pub fn new(config: RouterConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            edges: None,
            state: RouterState::Idle,
        })
    }

    pub fn with_edges(mut self, edges: Vec<EdgeId>) -> Self {
        self.edges = Some(edges);
        self
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    pub fn state(&self) -> RouterState {
        self.state
    }

    pub fn run<F>(&mut self, graph: &mut RoutingGraph, mut progress: F) -> Result<RoutingReport>
    where
        F: FnMut(f64) -> ControlFlow<()>,
    {
        if self.state != RouterState::Idle {
            return Err(RouterError::AlreadyRun);
        }
        graph.validate()?;
        let edges = selected_edges(graph, self.edges.as_deref())?;
        let config = &self.config;
        let mut report = RoutingReport::default();

        let obstacles = build_obstacles(graph, config.tight_padding, config.loose_padding);
        report.issues.extend_from_slice(obstacles.issues());
        self.state = RouterState::ObstaclesBuilt;

        let scene = RectilinearScene::new(graph, &obstacles, &config.rectilinear);
        self.state = RouterState::GraphBuilt;

        let offsets = parallel_offsets(graph, &edges, config.rectilinear.edge_separation);
        let ordinals = self_loop_ordinals(graph, &edges);
        let mut routes: Vec<(EdgeId, Vec<Point>, RouteStatus)> = Vec::new();
        let mut cancelled = false;
        for (done, &id) in edges.iter().enumerate() {
            let Some(edge) = graph.edge(id) else {
                continue;
            };
            let (source, target) = (edge.source, edge.target);
            if source == target {
                let ordinal = ordinals.get(&id).copied().unwrap_or(0);
                routes.push((id, scene.self_loop(source, ordinal), RouteStatus::SelfLoop));
            } else {
                let (start, end) = scene.ports_for(source, target, offsets[done]);
                match scene.route_edge(source, target, &start, &end) {
                    Some(points) => routes.push((id, points, RouteStatus::Routed)),
                    None => {
                        tracing::warn!(edge = id.0, "no orthogonal path found; using an elbow");
                        report.issues.push(RouteIssue::NoPathFound { edge: id });
                        routes.push((id, scene.fallback_path(&start, &end), RouteStatus::Fallback));
                    }
                }
            }
            if notify(&mut progress, done + 1, edges.len()).is_break() {
                cancelled = true;
                break;
            }
        }
        if edges.is_empty() {
            cancelled = notify(&mut progress, 0, 0).is_break();
        }
        self.state = RouterState::EdgesRouted;

        let radius = config.rectilinear.corner_fit_radius.max(0.0);
        let results: Vec<(EdgeId, Curve, RouteStatus)> = routes
            .into_iter()
            .map(|(id, points, status)| (id, round_corners(&points, radius), status))
            .collect();
        self.state = RouterState::Fitted;

        store(graph, results, &mut report);
        report.cancelled = cancelled;
        self.state = if cancelled {
            RouterState::Cancelled
        } else {
            RouterState::Done
        };
        tracing::debug!(
            routed = report.routed,
            fallbacks = report.fallbacks,
            self_loops = report.self_loops,
            cancelled,
            "rectilinear routing finished"
        );
        Ok(report)
    }
}

/// Routes every edge of `graph` with a fresh [`SplineRouter`].
pub fn route_edges(graph: &mut RoutingGraph, config: RouterConfig) -> Result<RoutingReport> {
    SplineRouter::new(config)?.run(graph, |_| ControlFlow::Continue(()))
}
