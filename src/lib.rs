pub mod config;
pub mod error;
pub mod geometry;
pub mod graph;
pub mod route_dump;
pub mod routing;

pub use config::{RouterConfig, load_config};
pub use error::{Result, RouteIssue, RouterError};
pub use geometry::{Curve, Point};
pub use graph::{ClusterId, EdgeId, Node, NodeId, RouteStatus, RoutingGraph};
pub use routing::{RectilinearRouter, RouterState, RoutingReport, SplineRouter, route_edges};
