//! Separation of edges that share a route.
//!
//! Parallel edges between the same two nodes always form a group so that
//! duplicates stay distinguishable. With bundling enabled, edges whose paths
//! run along a common corridor are grouped as well. Members of a group get
//! parallel strands offset from a shared centerline in edge order.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::config::BundlingSettings;
use crate::geometry::intersect::{collinear_overlap_length, point_segment_distance};
use crate::geometry::polygon::path_length;
use crate::geometry::{POINT_EPSILON, Point};
use crate::graph::{EdgeId, NodeId, RoutingGraph};

use super::ports::port_on_boundary;
use super::spatial::{EdgeContext, ObstacleIndex};

/// Longest miter relative to the offset at a sharp vertex.
const MITER_LIMIT: f64 = 4.0;
/// Distance under which a vertex counts as lying on another path.
const CORRIDOR_TOLERANCE: f64 = 1e-3;

/// Polyline of one routed edge, ordered from its source to its target.
#[derive(Debug, Clone)]
pub(crate) struct RoutedPath {
    pub(crate) edge: EdgeId,
    pub(crate) source: NodeId,
    pub(crate) target: NodeId,
    pub(crate) points: Vec<Point>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum BundleKind {
    /// Edges joining the same pair of nodes.
    MultiEdge,
    /// Edges between different nodes sharing part of their route.
    Corridor,
}

/// A group of edges drawn as parallel strands.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Bundle {
    pub kind: BundleKind,
    /// Members in edge order.
    pub members: Vec<EdgeId>,
    /// Signed distance of each member's strand from the centerline.
    pub offsets: Vec<f64>,
    /// Spacing the offsets were finally computed with.
    pub spacing: f64,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct BundleOutcome {
    pub(crate) bundles: Vec<Bundle>,
    /// Members that could not keep a strand and kept their own route.
    pub(crate) overflow: Vec<EdgeId>,
}

/// Shifts `points` sideways by `offset` (positive to the left of travel).
/// Interior vertices move along the miter of their two segments.
pub(crate) fn offset_polyline(points: &[Point], offset: f64) -> Vec<Point> {
    let normals: Vec<Point> = points
        .windows(2)
        .map(|w| (w[1] - w[0]).normalize().map(Point::perp).unwrap_or(Point::ORIGIN))
        .collect();
    if normals.is_empty() {
        return points.to_vec();
    }
    points
        .iter()
        .enumerate()
        .map(|(i, &p)| p + vertex_shift(&normals, i, offset))
        .collect()
}

fn vertex_shift(normals: &[Point], vertex: usize, offset: f64) -> Point {
    let before = vertex.checked_sub(1).map(|i| normals[i]);
    let after = normals.get(vertex).copied();
    match (before, after) {
        (Some(a), Some(b)) => {
            let Some(miter) = (a + b).normalize() else {
                return a * offset;
            };
            let cos = miter.dot(a);
            let scale = if cos > 1.0 / MITER_LIMIT { 1.0 / cos } else { MITER_LIMIT };
            miter * (offset * scale)
        }
        (Some(n), None) | (None, Some(n)) => n * offset,
        (None, None) => Point::ORIGIN,
    }
}

/// Total length along which two polylines run on top of each other.
pub(crate) fn shared_length(a: &[Point], b: &[Point]) -> f64 {
    let mut total = 0.0;
    for sa in a.windows(2) {
        for sb in b.windows(2) {
            total += collinear_overlap_length(sa[0], sa[1], sb[0], sb[1]);
        }
    }
    total
}

/// Direction of travel of `path` relative to `reference` along their longest
/// shared stretch: `1.0` when they agree.
fn relative_direction(path: &[Point], reference: &[Point]) -> f64 {
    let mut best = (0.0, 1.0);
    for sa in path.windows(2) {
        for sb in reference.windows(2) {
            let overlap = collinear_overlap_length(sa[0], sa[1], sb[0], sb[1]);
            if overlap > best.0 {
                let sign = if (sa[1] - sa[0]).dot(sb[1] - sb[0]) >= 0.0 { 1.0 } else { -1.0 };
                best = (overlap, sign);
            }
        }
    }
    best.1
}

fn strand_offset(slot: usize, count: usize, spacing: f64) -> f64 {
    (slot as f64 - (count as f64 - 1.0) / 2.0) * spacing
}

struct Group {
    kind: BundleKind,
    members: Vec<usize>,
}

/// Candidate strands of one group for a given spacing.
fn group_strands(
    group: &Group,
    paths: &[RoutedPath],
    graph: &RoutingGraph,
    spacing: f64,
) -> Vec<(Vec<Point>, f64)> {
    let count = group.members.len();
    match group.kind {
        BundleKind::MultiEdge => {
            let lead = &paths[group.members[0]];
            let low = lead.source.min(lead.target);
            let centerline: Vec<Point> = if lead.source == low {
                lead.points.clone()
            } else {
                lead.points.iter().rev().copied().collect()
            };
            group
                .members
                .iter()
                .enumerate()
                .map(|(slot, &m)| {
                    let offset = strand_offset(slot, count, spacing);
                    let mut strand = offset_polyline(&centerline, offset);
                    let path = &paths[m];
                    let (first_node, last_node) = if path.source == low {
                        (path.source, path.target)
                    } else {
                        (path.target, path.source)
                    };
                    reproject_end(graph, first_node, &mut strand, true);
                    reproject_end(graph, last_node, &mut strand, false);
                    if path.source != low {
                        strand.reverse();
                    }
                    (strand, offset)
                })
                .collect()
        }
        BundleKind::Corridor => {
            let reference = &paths[group.members[0]].points;
            group
                .members
                .iter()
                .enumerate()
                .map(|(slot, &m)| {
                    let points = &paths[m].points;
                    let offset = strand_offset(slot, count, spacing);
                    let signed = offset * relative_direction(points, reference);
                    (corridor_strand(m, group, paths, signed), offset)
                })
                .collect()
        }
    }
}

/// Moves the interior vertices of path `m` that lie on another member's route.
fn corridor_strand(m: usize, group: &Group, paths: &[RoutedPath], offset: f64) -> Vec<Point> {
    let points = &paths[m].points;
    let shifted = offset_polyline(points, offset);
    let last = points.len().saturating_sub(1);
    points
        .iter()
        .enumerate()
        .map(|(i, &p)| {
            if i == 0 || i == last {
                return p;
            }
            let on_corridor = group.members.iter().filter(|&&o| o != m).any(|&o| {
                paths[o]
                    .points
                    .windows(2)
                    .any(|w| point_segment_distance(p, w[0], w[1]) < CORRIDOR_TOLERANCE)
            });
            if on_corridor { shifted[i] } else { p }
        })
        .collect()
}

/// Puts a shifted strand end back onto the node boundary.
fn reproject_end(graph: &RoutingGraph, node: NodeId, strand: &mut [Point], first: bool) {
    let Some(node) = graph.node(node) else {
        return;
    };
    let slot = if first { 0 } else { strand.len().saturating_sub(1) };
    let Some(&shifted) = strand.get(slot) else {
        return;
    };
    let center = node.center();
    if shifted.close_to(center, POINT_EPSILON) {
        return;
    }
    strand[slot] = port_on_boundary(&node.boundary, center, shifted).point;
}

/// True when two polylines visit the same points, in either direction.
pub(crate) fn same_route(a: &[Point], b: &[Point]) -> bool {
    a.len() == b.len()
        && (a.iter().zip(b).all(|(p, q)| p.close_to(*q, POINT_EPSILON))
            || a.iter().zip(b.iter().rev()).all(|(p, q)| p.close_to(*q, POINT_EPSILON)))
}

/// The route of `path` moved sideways by `offset`, ends back on the nodes.
pub(crate) fn shifted_route(path: &RoutedPath, graph: &RoutingGraph, offset: f64) -> Vec<Point> {
    let mut strand = offset_polyline(&path.points, offset);
    reproject_end(graph, path.source, &mut strand, true);
    reproject_end(graph, path.target, &mut strand, false);
    strand
}

fn multi_edge_groups(paths: &[RoutedPath], cap: usize, outcome: &mut BundleOutcome) -> Vec<Group> {
    let mut by_pair: BTreeMap<(NodeId, NodeId), Vec<usize>> = BTreeMap::new();
    for (i, path) in paths.iter().enumerate() {
        if path.source == path.target {
            continue;
        }
        let key = (path.source.min(path.target), path.source.max(path.target));
        by_pair.entry(key).or_default().push(i);
    }
    let mut groups = Vec::new();
    for (_, mut members) in by_pair {
        if members.len() < 2 {
            continue;
        }
        members.sort_by_key(|&m| paths[m].edge);
        if members.len() > cap {
            for &m in &members[cap..] {
                tracing::warn!(edge = paths[m].edge.0, cap, "bundle full; edge keeps its own route");
                outcome.overflow.push(paths[m].edge);
            }
            members.truncate(cap);
        }
        if members.len() >= 2 {
            groups.push(Group {
                kind: BundleKind::MultiEdge,
                members,
            });
        }
    }
    groups
}

fn corridor_groups(
    paths: &[RoutedPath],
    taken: &[bool],
    settings: &BundlingSettings,
    spacing: f64,
) -> Vec<Group> {
    let free: Vec<usize> = (0..paths.len())
        .filter(|&i| !taken[i] && paths[i].source != paths[i].target && paths[i].points.len() >= 3)
        .collect();
    let lengths: Vec<f64> = paths.iter().map(|p| path_length(&p.points)).collect();
    let mut pairs: Vec<(f64, usize, usize)> = Vec::new();
    for (pos, &a) in free.iter().enumerate() {
        for &b in &free[pos + 1..] {
            let shared = shared_length(&paths[a].points, &paths[b].points);
            let enough = shared >= settings.min_overlap_ratio * lengths[a].min(lengths[b]);
            // Each strand leaves and rejoins its route once.
            let detour = 2.0 * spacing;
            if shared > POINT_EPSILON && enough && shared * settings.ink_importance > detour {
                pairs.push((shared, a, b));
            }
        }
    }
    pairs.sort_by(|x, y| y.0.total_cmp(&x.0).then(x.1.cmp(&y.1)).then(x.2.cmp(&y.2)));

    let mut group_of: Vec<Option<usize>> = vec![None; paths.len()];
    let mut groups: Vec<Vec<usize>> = Vec::new();
    for (_, a, b) in pairs {
        match (group_of[a], group_of[b]) {
            (None, None) => {
                group_of[a] = Some(groups.len());
                group_of[b] = Some(groups.len());
                groups.push(vec![a, b]);
            }
            (Some(g), None) | (None, Some(g)) => {
                if groups[g].len() < settings.max_bundle_size {
                    let joining = if group_of[a].is_none() { a } else { b };
                    group_of[joining] = Some(g);
                    groups[g].push(joining);
                }
            }
            (Some(_), Some(_)) => {}
        }
    }
    groups
        .into_iter()
        .filter(|members| members.len() >= 2)
        .map(|mut members| {
            members.sort_by_key(|&m| paths[m].edge);
            Group {
                kind: BundleKind::Corridor,
                members,
            }
        })
        .collect()
}

/// Spacing may be halved up to `halvings` times while some strand is
/// blocked, but never below `min_spacing`.
#[allow(clippy::too_many_arguments)]
fn apply_group(
    group: &Group,
    paths: &mut [RoutedPath],
    graph: &RoutingGraph,
    index: &ObstacleIndex<'_>,
    spacing: f64,
    min_spacing: f64,
    halvings: u32,
    outcome: &mut BundleOutcome,
) {
    let contexts: Vec<EdgeContext<'_, '_>> = group
        .members
        .iter()
        .map(|&m| EdgeContext::new(index, graph, paths[m].source, paths[m].target))
        .collect();
    let mut current = spacing;
    let mut round = 0;
    let (attempt, valid) = loop {
        let attempt = group_strands(group, paths, graph, current);
        let valid: Vec<bool> = attempt
            .iter()
            .zip(&contexts)
            .map(|((strand, _), ctx)| ctx.polyline_clear(strand))
            .collect();
        let floor_reached = current / 2.0 < min_spacing - POINT_EPSILON;
        if round >= halvings || floor_reached || valid.iter().all(|&ok| ok) {
            break (attempt, valid);
        }
        current /= 2.0;
        round += 1;
    };

    let mut members = Vec::new();
    let mut offsets = Vec::new();
    for ((&m, (strand, offset)), ok) in group.members.iter().zip(attempt).zip(valid) {
        if ok {
            paths[m].points = strand;
            members.push(paths[m].edge);
            offsets.push(offset);
        } else {
            tracing::warn!(edge = paths[m].edge.0, spacing = current, "bundle strand blocked");
            outcome.overflow.push(paths[m].edge);
        }
    }
    if !members.is_empty() {
        outcome.bundles.push(Bundle {
            kind: group.kind,
            members,
            offsets,
            spacing: current,
        });
    }
}

/// Groups and separates the routed paths in place. Multi-edges are always
/// handled; corridor bundling only runs when `settings` is given.
pub(crate) fn bundle(
    paths: &mut [RoutedPath],
    graph: &RoutingGraph,
    index: &ObstacleIndex<'_>,
    settings: Option<&BundlingSettings>,
    multi_edge_spacing: f64,
    min_spacing: f64,
) -> BundleOutcome {
    let mut outcome = BundleOutcome::default();
    let cap = settings.map_or(usize::MAX, |s| s.max_bundle_size.max(2));
    let halvings = settings.map_or(BundlingSettings::default().max_spacing_halvings, |s| s.max_spacing_halvings);

    let multi = multi_edge_groups(paths, cap, &mut outcome);
    let mut taken = vec![false; paths.len()];
    for group in &multi {
        for &m in &group.members {
            taken[m] = true;
        }
    }
    let spacing = multi_edge_spacing.max(min_spacing);
    for group in &multi {
        apply_group(group, paths, graph, index, spacing, min_spacing, halvings, &mut outcome);
    }

    if let Some(settings) = settings {
        let spacing = settings.edge_separation.max(min_spacing);
        let corridors = corridor_groups(paths, &taken, settings, spacing);
        for group in &corridors {
            apply_group(group, paths, graph, index, spacing, min_spacing, halvings, &mut outcome);
        }
    }

    tracing::debug!(
        bundles = outcome.bundles.len(),
        overflow = outcome.overflow.len(),
        "bundling done"
    );
    outcome
}
