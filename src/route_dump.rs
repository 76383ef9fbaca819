use crate::geometry::Curve;
use crate::graph::{ClusterId, RouteStatus, RoutingGraph};
use crate::routing::RoutingReport;
use anyhow::Context;
use serde::Serialize;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

/// Chord tolerance used for the flattened `points` of each edge.
const DUMP_TOLERANCE: f64 = 0.25;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteDump {
    pub nodes: Vec<NodeDump>,
    pub clusters: Vec<ClusterDump>,
    pub edges: Vec<EdgeDump>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<RoutingReport>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeDump {
    pub id: usize,
    pub label: String,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterDump {
    pub id: usize,
    pub label: String,
    pub parent: Option<usize>,
    pub rectangular: bool,
    pub boundary: Option<Curve>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeDump {
    pub id: usize,
    pub source: usize,
    pub target: usize,
    pub status: RouteStatus,
    pub points: Vec<[f64; 2]>,
    pub curve: Option<Curve>,
}

impl RouteDump {
    pub fn from_graph(graph: &RoutingGraph, report: Option<&RoutingReport>) -> Self {
        let nodes = graph
            .nodes()
            .iter()
            .enumerate()
            .map(|(id, node)| {
                let bbox = node.bounding_box();
                NodeDump {
                    id,
                    label: node.label.clone(),
                    x: bbox.min.x,
                    y: bbox.min.y,
                    width: bbox.width(),
                    height: bbox.height(),
                }
            })
            .collect();

        let clusters = graph
            .clusters()
            .iter()
            .enumerate()
            .filter(|(id, _)| ClusterId(*id) != ClusterId::ROOT)
            .map(|(id, cluster)| ClusterDump {
                id,
                label: cluster.label.clone(),
                parent: cluster.parent().map(|p| p.0),
                rectangular: cluster.rectangular,
                boundary: cluster.boundary.clone(),
            })
            .collect();

        let edges = graph
            .edges()
            .iter()
            .enumerate()
            .map(|(id, edge)| {
                let curve = edge.geometry.curve.clone();
                let points = curve
                    .as_ref()
                    .map(|c| c.flatten(DUMP_TOLERANCE).iter().map(|p| [p.x, p.y]).collect())
                    .unwrap_or_default();
                EdgeDump {
                    id,
                    source: edge.source.0,
                    target: edge.target.0,
                    status: edge.geometry.status,
                    points,
                    curve,
                }
            })
            .collect();

        RouteDump {
            nodes,
            clusters,
            edges,
            report: report.cloned(),
        }
    }
}

pub fn write_route_dump(path: &Path, graph: &RoutingGraph, report: Option<&RoutingReport>) -> anyhow::Result<()> {
    let file = File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    let writer = BufWriter::new(file);
    let dump = RouteDump::from_graph(graph, report);
    serde_json::to_writer_pretty(writer, &dump)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RouterConfig;
    use crate::geometry::{Point, factory};
    use crate::graph::Node;
    use crate::routing::route_edges;

    #[test]
    fn dump_carries_routed_curves() {
        let mut graph = RoutingGraph::new();
        let a = graph.add_node(Node::new("a", factory::rectangle(10.0, 10.0, Point::new(0.0, 0.0))));
        let b = graph.add_node(Node::new("b", factory::circle(5.0, Point::new(40.0, 30.0))));
        graph.add_edge(a, b).unwrap();
        let report = route_edges(&mut graph, RouterConfig::default()).unwrap();

        let dump = RouteDump::from_graph(&graph, Some(&report));
        let value = serde_json::to_value(&dump).unwrap();
        assert_eq!(value["edges"][0]["status"], "routed");
        assert!(value["edges"][0]["points"].as_array().unwrap().len() >= 2);
        assert_eq!(value["edges"][0]["curve"][0]["kind"], "line");
        assert_eq!(value["nodes"][1]["label"], "b");
        assert_eq!(value["report"]["routed"], 1);
        assert!(value["clusters"].as_array().unwrap().is_empty());
    }

    #[test]
    fn dump_is_written_as_json() {
        let mut graph = RoutingGraph::new();
        let a = graph.add_node(Node::new("a", factory::rectangle(10.0, 10.0, Point::new(0.0, 0.0))));
        let b = graph.add_node(Node::new("b", factory::rectangle(10.0, 10.0, Point::new(60.0, 0.0))));
        graph.add_edge(a, b).unwrap();
        let report = route_edges(&mut graph, RouterConfig::default()).unwrap();

        let path = std::env::temp_dir().join(format!("spline-router-dump-{}.json", std::process::id()));
        write_route_dump(&path, &graph, Some(&report)).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["edges"][0]["source"], 0);
        assert_eq!(value["edges"][0]["target"], 1);
        assert_eq!(value["report"]["routed"], 1);

        let missing = std::env::temp_dir().join("spline-router-no-such-dir").join("dump.json");
        let err = write_route_dump(&missing, &graph, None).unwrap_err();
        assert!(err.to_string().starts_with("failed to create"), "{err}");
    }
}
