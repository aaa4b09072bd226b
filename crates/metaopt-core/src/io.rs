//! Node-link JSON topology files.
//!
//! The format is the node-link layout written by common graph tooling:
//!
//! ```json
//! {
//!   "directed": true,
//!   "nodes": [{"id": 0}, {"id": 1}],
//!   "links": [{"source": 0, "target": 1, "capacity": 1000.0}]
//! }
//! ```
//!
//! Undirected files expand every link into two opposite directed links.
//! Links without a capacity receive the caller-supplied default.

use std::fs;
use std::path::Path as FsPath;

use serde::{Deserialize, Serialize};

use crate::{CoreError, CoreResult, NodeId, Topology};

#[derive(Debug, Serialize, Deserialize)]
struct NodeLinkFile {
    #[serde(default)]
    directed: bool,
    nodes: Vec<NodeEntry>,
    links: Vec<LinkEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
struct NodeEntry {
    id: usize,
}

#[derive(Debug, Serialize, Deserialize)]
struct LinkEntry {
    source: usize,
    target: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    capacity: Option<f64>,
}

impl Topology {
    /// Parse a node-link JSON document.
    pub fn from_node_link_json(
        name: impl Into<String>,
        json: &str,
        default_capacity: f64,
    ) -> CoreResult<Topology> {
        let file: NodeLinkFile = serde_json::from_str(json)?;
        let mut topology = Topology::new(name);
        for node in &file.nodes {
            topology.add_node(NodeId::new(node.id));
        }
        for link in &file.links {
            let src = NodeId::new(link.source);
            let dst = NodeId::new(link.target);
            let capacity = link.capacity.unwrap_or(default_capacity);
            if !topology.contains_node(src) || !topology.contains_node(dst) {
                return Err(CoreError::Parse(format!(
                    "link {src} -> {dst} references an undeclared node"
                )));
            }
            // Duplicates show up when an undirected file lists both orientations.
            if topology.link(src, dst).is_none() {
                topology.add_link(src, dst, capacity)?;
            }
            if !file.directed && topology.link(dst, src).is_none() {
                topology.add_link(dst, src, capacity)?;
            }
        }
        Ok(topology)
    }

    /// Load a node-link JSON file; the topology is named after the file stem.
    pub fn from_file(path: impl AsRef<FsPath>, default_capacity: f64) -> CoreResult<Topology> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)?;
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        Topology::from_node_link_json(name, &json, default_capacity)
    }

    /// Serialize as a directed node-link JSON document.
    pub fn to_node_link_json(&self) -> CoreResult<String> {
        let file = NodeLinkFile {
            directed: true,
            nodes: self
                .nodes()
                .into_iter()
                .map(|id| NodeEntry { id: id.value() })
                .collect(),
            links: self
                .links()
                .into_iter()
                .map(|(s, d, link)| LinkEntry {
                    source: s.value(),
                    target: d.value(),
                    capacity: Some(link.capacity),
                })
                .collect(),
        };
        Ok(serde_json::to_string_pretty(&file)?)
    }

    pub fn write_file(&self, path: impl AsRef<FsPath>) -> CoreResult<()> {
        fs::write(path, self.to_node_link_json()?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_undirected_file_expands_links() {
        let json = r#"{
            "directed": false,
            "multigraph": false,
            "graph": {},
            "nodes": [{"id": 0}, {"id": 1}, {"id": 2}],
            "links": [
                {"source": 0, "target": 1, "capacity": 50.0},
                {"source": 1, "target": 2}
            ]
        }"#;
        let t = Topology::from_node_link_json("tri", json, 1000.0).unwrap();
        assert_eq!(t.num_links(), 4);
        assert_eq!(t.link(NodeId::new(1), NodeId::new(0)).unwrap().capacity, 50.0);
        assert_eq!(t.link(NodeId::new(2), NodeId::new(1)).unwrap().capacity, 1000.0);
    }

    #[test]
    fn test_directed_file_keeps_orientation() {
        let json = r#"{"directed": true, "nodes": [{"id": 0}, {"id": 1}],
                       "links": [{"source": 0, "target": 1, "capacity": 3.0}]}"#;
        let t = Topology::from_node_link_json("d", json, 1.0).unwrap();
        assert_eq!(t.num_links(), 1);
        assert!(t.link(NodeId::new(1), NodeId::new(0)).is_none());
    }

    #[test]
    fn test_undeclared_node_is_rejected() {
        let json = r#"{"nodes": [{"id": 0}], "links": [{"source": 0, "target": 4}]}"#;
        assert!(matches!(
            Topology::from_node_link_json("bad", json, 1.0),
            Err(CoreError::Parse(_))
        ));
    }

    #[test]
    fn test_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ring_5.json");
        let ring = Topology::ring(5, 1000.0).unwrap();
        ring.write_file(&path).unwrap();

        let loaded = Topology::from_file(&path, 1.0).unwrap();
        assert_eq!(loaded.name(), "ring_5");
        assert_eq!(loaded.capacities(), ring.capacities());
    }
}
