//! Input graph for the routers: placed nodes with boundary curves, edges and
//! an optional cluster tree.
//!
//! Clusters live in an arena indexed by [`ClusterId`]; index 0 is the root,
//! which has no boundary. Every node belongs to exactly one innermost cluster.

use serde::Serialize;

use crate::error::GraphError;
use crate::geometry::{Curve, Point, Rect, factory};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct EdgeId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ClusterId(pub usize);

impl ClusterId {
    pub const ROOT: ClusterId = ClusterId(0);
}

/// Outcome of routing one edge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum RouteStatus {
    #[default]
    Unrouted,
    Routed,
    /// No obstacle-free path existed; the curve is a straight segment.
    Fallback,
    /// The edge could not keep its bundle offset and was routed on its own.
    BundleOverflow,
    SelfLoop,
}

impl RouteStatus {
    pub fn is_degraded(self) -> bool {
        matches!(self, RouteStatus::Fallback | RouteStatus::BundleOverflow)
    }
}

#[derive(Debug, Clone)]
pub struct Node {
    pub label: String,
    pub boundary: Curve,
}

impl Node {
    pub fn new(label: impl Into<String>, boundary: Curve) -> Self {
        Self {
            label: label.into(),
            boundary,
        }
    }

    pub fn bounding_box(&self) -> Rect {
        self.boundary.bounding_box()
    }

    pub fn center(&self) -> Point {
        self.bounding_box().center()
    }
}

#[derive(Debug, Clone, Default)]
pub struct EdgeGeometry {
    pub curve: Option<Curve>,
    pub status: RouteStatus,
}

#[derive(Debug, Clone)]
pub struct Edge {
    pub source: NodeId,
    pub target: NodeId,
    pub geometry: EdgeGeometry,
}

impl Edge {
    pub fn is_self_loop(&self) -> bool {
        self.source == self.target
    }

    /// Endpoints ordered so that parallel and anti-parallel edges share a key.
    pub fn unordered_key(&self) -> (NodeId, NodeId) {
        if self.source <= self.target {
            (self.source, self.target)
        } else {
            (self.target, self.source)
        }
    }
}

#[derive(Debug, Clone)]
pub struct Cluster {
    pub label: String,
    pub boundary: Option<Curve>,
    pub rectangular: bool,
    parent: Option<ClusterId>,
    children: Vec<ClusterId>,
    nodes: Vec<NodeId>,
}

impl Cluster {
    fn new(label: String, boundary: Option<Curve>, parent: Option<ClusterId>) -> Self {
        Self {
            label,
            boundary,
            rectangular: false,
            parent,
            children: Vec::new(),
            nodes: Vec::new(),
        }
    }

    pub fn parent(&self) -> Option<ClusterId> {
        self.parent
    }

    pub fn children(&self) -> &[ClusterId] {
        &self.children
    }

    pub fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }
}

#[derive(Debug, Clone)]
pub struct RoutingGraph {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    clusters: Vec<Cluster>,
    node_cluster: Vec<ClusterId>,
}

impl Default for RoutingGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl RoutingGraph {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            edges: Vec::new(),
            clusters: vec![Cluster::new("root".to_string(), None, None)],
            node_cluster: Vec::new(),
        }
    }

    pub fn add_node(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(node);
        self.node_cluster.push(ClusterId::ROOT);
        self.clusters[ClusterId::ROOT.0].nodes.push(id);
        id
    }

    pub fn add_edge(&mut self, source: NodeId, target: NodeId) -> Result<EdgeId, GraphError> {
        let id = EdgeId(self.edges.len());
        for node in [source, target] {
            if node.0 >= self.nodes.len() {
                return Err(GraphError::DanglingEdge { edge: id, node });
            }
        }
        self.edges.push(Edge {
            source,
            target,
            geometry: EdgeGeometry::default(),
        });
        Ok(id)
    }

    pub fn add_cluster(
        &mut self,
        parent: ClusterId,
        label: impl Into<String>,
        boundary: Option<Curve>,
    ) -> Result<ClusterId, GraphError> {
        if parent.0 >= self.clusters.len() {
            return Err(GraphError::UnknownCluster(parent));
        }
        let id = ClusterId(self.clusters.len());
        self.clusters
            .push(Cluster::new(label.into(), boundary, Some(parent)));
        self.clusters[parent.0].children.push(id);
        Ok(id)
    }

    /// Moves `node` from its current innermost cluster into `cluster`.
    pub fn move_node(&mut self, node: NodeId, cluster: ClusterId) -> Result<(), GraphError> {
        if node.0 >= self.nodes.len() {
            return Err(GraphError::UnknownNode(node));
        }
        if cluster.0 >= self.clusters.len() {
            return Err(GraphError::UnknownCluster(cluster));
        }
        let old = self.node_cluster[node.0];
        self.clusters[old.0].nodes.retain(|n| *n != node);
        self.clusters[cluster.0].nodes.push(node);
        self.node_cluster[node.0] = cluster;
        Ok(())
    }

    pub fn reparent_cluster(&mut self, cluster: ClusterId, parent: ClusterId) -> Result<(), GraphError> {
        if cluster == ClusterId::ROOT {
            return Err(GraphError::RootReparent);
        }
        for id in [cluster, parent] {
            if id.0 >= self.clusters.len() {
                return Err(GraphError::UnknownCluster(id));
            }
        }
        let mut cursor = Some(parent);
        while let Some(current) = cursor {
            if current == cluster {
                return Err(GraphError::ClusterCycle(cluster));
            }
            cursor = self.clusters[current.0].parent;
        }
        if let Some(old) = self.clusters[cluster.0].parent {
            self.clusters[old.0].children.retain(|c| *c != cluster);
        }
        self.clusters[parent.0].children.push(cluster);
        self.clusters[cluster.0].parent = Some(parent);
        Ok(())
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn edges_mut(&mut self) -> &mut [Edge] {
        &mut self.edges
    }

    pub fn edge(&self, id: EdgeId) -> Option<&Edge> {
        self.edges.get(id.0)
    }

    pub fn clusters(&self) -> &[Cluster] {
        &self.clusters
    }

    pub fn cluster(&self, id: ClusterId) -> Option<&Cluster> {
        self.clusters.get(id.0)
    }

    pub fn cluster_mut(&mut self, id: ClusterId) -> Option<&mut Cluster> {
        self.clusters.get_mut(id.0)
    }

    pub fn cluster_of(&self, node: NodeId) -> ClusterId {
        self.node_cluster
            .get(node.0)
            .copied()
            .unwrap_or(ClusterId::ROOT)
    }

    /// Clusters enclosing `node`, innermost first, ending at the root.
    pub fn ancestors(&self, node: NodeId) -> Vec<ClusterId> {
        let mut out = Vec::new();
        let mut cursor = Some(self.cluster_of(node));
        while let Some(current) = cursor {
            if out.len() > self.clusters.len() {
                break;
            }
            out.push(current);
            cursor = self.clusters.get(current.0).and_then(|c| c.parent);
        }
        out
    }

    pub fn is_ancestor(&self, cluster: ClusterId, node: NodeId) -> bool {
        self.ancestors(node).contains(&cluster)
    }

    /// Gives every non-root cluster without a boundary a rectangle around its
    /// content, padded by `padding`. Inner clusters are fitted first.
    pub fn fit_cluster_boundaries(&mut self, padding: f64) {
        let mut order = Vec::with_capacity(self.clusters.len());
        let mut stack = vec![(ClusterId::ROOT, false)];
        while let Some((id, expanded)) = stack.pop() {
            if expanded {
                order.push(id);
                continue;
            }
            stack.push((id, true));
            for &child in &self.clusters[id.0].children {
                stack.push((child, false));
            }
        }
        for id in order {
            if id == ClusterId::ROOT || self.clusters[id.0].boundary.is_some() {
                continue;
            }
            let cluster = &self.clusters[id.0];
            let mut bbox = Rect::empty();
            for node in &cluster.nodes {
                bbox = bbox.union(&self.nodes[node.0].bounding_box());
            }
            for child in &cluster.children {
                if let Some(boundary) = &self.clusters[child.0].boundary {
                    bbox = bbox.union(&boundary.bounding_box());
                }
            }
            if bbox.is_empty() {
                continue;
            }
            let bbox = bbox.padded(padding);
            let cluster = &mut self.clusters[id.0];
            cluster.boundary = Some(factory::rectangle(bbox.width(), bbox.height(), bbox.center()));
            cluster.rectangular = true;
        }
    }

    pub fn validate(&self) -> Result<(), GraphError> {
        for (index, edge) in self.edges.iter().enumerate() {
            for node in [edge.source, edge.target] {
                if node.0 >= self.nodes.len() {
                    return Err(GraphError::DanglingEdge {
                        edge: EdgeId(index),
                        node,
                    });
                }
            }
        }
        for index in 0..self.clusters.len() {
            let mut cursor = self.clusters[index].parent;
            let mut steps = 0;
            while let Some(current) = cursor {
                steps += 1;
                if current.0 >= self.clusters.len() {
                    return Err(GraphError::UnknownCluster(current));
                }
                if current.0 == index || steps > self.clusters.len() {
                    return Err(GraphError::ClusterCycle(ClusterId(index)));
                }
                cursor = self.clusters[current.0].parent;
            }
        }
        let mut memberships = vec![0usize; self.nodes.len()];
        for cluster in &self.clusters {
            for node in &cluster.nodes {
                match memberships.get_mut(node.0) {
                    Some(count) => *count += 1,
                    None => return Err(GraphError::UnknownNode(*node)),
                }
            }
        }
        for (index, count) in memberships.into_iter().enumerate() {
            match count {
                1 => {}
                0 => return Err(GraphError::OrphanNode(NodeId(index))),
                count => {
                    return Err(GraphError::NodeInSeveralClusters {
                        node: NodeId(index),
                        count,
                    });
                }
            }
        }
        Ok(())
    }
}
