//! Error types shared by the routers.
//!
//! [`RouterError`] stops a run before any routing work is done.
//! [`RouteIssue`] records a problem that was repaired locally and is returned
//! in the run report.

use serde::Serialize;
use thiserror::Error;

use crate::graph::{ClusterId, EdgeId, NodeId};

/// Out-of-range router settings.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("tight padding must be positive and finite, got {0}")]
    TightPadding(f64),

    #[error("loose padding {loose} must be at least the tight padding {tight}")]
    LoosePadding { loose: f64, tight: f64 },

    #[error("cone half-angle must lie in (0, pi/2], got {0}")]
    ConeAngle(f64),

    #[error("invalid {section} setting `{field}`: {value}")]
    OutOfRange {
        section: &'static str,
        field: &'static str,
        value: f64,
    },
}

/// Structural problems in a [`crate::graph::RoutingGraph`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    #[error("edge {edge:?} references missing node {node:?}")]
    DanglingEdge { edge: EdgeId, node: NodeId },

    #[error("unknown node {0:?}")]
    UnknownNode(NodeId),

    #[error("unknown cluster {0:?}")]
    UnknownCluster(ClusterId),

    #[error("unknown edge {0:?}")]
    UnknownEdge(EdgeId),

    #[error("cluster {0:?} is its own ancestor")]
    ClusterCycle(ClusterId),

    #[error("the root cluster has no parent")]
    RootReparent,

    #[error("node {0:?} is not in any cluster")]
    OrphanNode(NodeId),

    #[error("node {node:?} is listed in {count} clusters")]
    NodeInSeveralClusters { node: NodeId, count: usize },
}

#[derive(Debug, Error)]
pub enum RouterError {
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(#[from] ConfigError),

    #[error("invalid graph: {0}")]
    InvalidGraph(#[from] GraphError),

    /// Routers are single-use; build a new one for another run.
    #[error("router has already run")]
    AlreadyRun,
}

pub type Result<T> = std::result::Result<T, RouterError>;

/// Which input a padded obstacle was built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ObstacleOwner {
    Node(NodeId),
    Cluster(ClusterId),
}

/// Recoverable problem met during a run.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum RouteIssue {
    #[error("degenerate boundary on {owner:?}; using a point obstacle")]
    DegenerateObstacle { owner: ObstacleOwner },

    #[error("no obstacle-free path for edge {edge:?}; using a straight segment")]
    NoPathFound { edge: EdgeId },

    #[error("edge {edge:?} could not keep its bundle offset; routed on its own")]
    BundleOverflow { edge: EdgeId },
}
