//! # metaopt-core: Network Model for Traffic-Engineering Formulations
//!
//! Provides the data model every encoder reads: a capacitated directed
//! [`Topology`], the [`NodePair`] and [`Path`] index keys, and validated
//! [`DemandMap`]s.
//!
//! ## Design Philosophy
//!
//! Topologies are **directed graphs** (petgraph `DiGraph<NodeId, Link>`):
//! - **Nodes**: integer node identifiers ([`NodeId`])
//! - **Edges**: capacitated links ([`Link`])
//!
//! Encoders only ever read a topology. Transformations such as capacity
//! splitting or pinning reductions produce a new copy.
//!
//! ## Index Keys
//!
//! Node pairs and paths are plain value types with structural equality and
//! a total order, so they can key `BTreeMap`s and produce reproducible
//! constraint orderings:
//!
//! ```rust
//! use metaopt_core::{NodeId, NodePair, Path};
//!
//! let pair = NodePair::new(NodeId::new(0), NodeId::new(2));
//! let a = Path::new(vec![NodeId::new(0), NodeId::new(1), NodeId::new(2)]).unwrap();
//! let b = Path::new(vec![NodeId::new(0), NodeId::new(1), NodeId::new(2)]).unwrap();
//! assert_eq!(a, b);
//! assert_eq!(a.pair(), pair);
//! ```
//!
//! ## Modules
//!
//! - [`topology`] - Graph storage, path enumeration, capacity transforms
//! - [`demand`] - Demand maps, validation and statistics
//! - [`partition`] - Node partitioning and POP partition maps
//! - [`io`] - Node-link JSON topology files

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub mod demand;
pub mod error;
pub mod io;
pub mod partition;
pub mod topology;

pub use demand::{DemandMap, DemandStats};
pub use error::{CoreError, CoreResult};
pub use partition::{
    is_partition_contiguous, pair_partition_by_source, partition_path_stats,
    random_pair_partition, LeaderElectionUniform, NodePartition, PartitionPathStats,
    PartitioningMethod,
};
pub use topology::{CapacityMap, Link, Topology};

/// Identifier of a topology node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(usize);

impl NodeId {
    #[inline]
    pub fn new(value: usize) -> Self {
        NodeId(value)
    }
    #[inline]
    pub fn value(&self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An ordered (source, destination) pair of nodes.
///
/// Serializes as the string `"(src, dst)"`, which lets a `BTreeMap<NodePair, f64>`
/// round-trip through a JSON object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NodePair {
    pub src: NodeId,
    pub dst: NodeId,
}

impl NodePair {
    #[inline]
    pub fn new(src: NodeId, dst: NodeId) -> Self {
        NodePair { src, dst }
    }
}

impl fmt::Display for NodePair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.src, self.dst)
    }
}

impl FromStr for NodePair {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let inner = s
            .trim()
            .strip_prefix('(')
            .and_then(|rest| rest.strip_suffix(')'))
            .ok_or_else(|| CoreError::Parse(format!("node pair '{s}' is not of the form (src, dst)")))?;
        let mut parts = inner.split(',').map(str::trim);
        let (Some(src), Some(dst), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(CoreError::Parse(format!("node pair '{s}' must have two entries")));
        };
        let parse = |value: &str| {
            value
                .parse::<usize>()
                .map(NodeId::new)
                .map_err(|e| CoreError::Parse(format!("node id '{value}': {e}")))
        };
        Ok(NodePair::new(parse(src)?, parse(dst)?))
    }
}

impl TryFrom<String> for NodePair {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<NodePair> for String {
    fn from(pair: NodePair) -> Self {
        pair.to_string()
    }
}

/// An ordered node sequence from a source to a target (at least two nodes).
///
/// Paths compare structurally: two independently enumerated paths over the
/// same nodes are the same map key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<NodeId>", into = "Vec<NodeId>")]
pub struct Path(Vec<NodeId>);

impl Path {
    /// Build a path, rejecting sequences shorter than two nodes.
    pub fn new(nodes: Vec<NodeId>) -> CoreResult<Self> {
        if nodes.len() < 2 {
            return Err(CoreError::InvalidPath(format!(
                "a path needs at least 2 nodes, got {}",
                nodes.len()
            )));
        }
        Ok(Path(nodes))
    }

    pub fn nodes(&self) -> &[NodeId] {
        &self.0
    }

    pub fn source(&self) -> NodeId {
        self.0[0]
    }

    pub fn target(&self) -> NodeId {
        self.0[self.0.len() - 1]
    }

    pub fn pair(&self) -> NodePair {
        NodePair::new(self.source(), self.target())
    }

    /// Number of links traversed.
    pub fn hops(&self) -> usize {
        self.0.len() - 1
    }

    /// Consecutive (from, to) links along the path.
    pub fn links(&self) -> impl Iterator<Item = (NodeId, NodeId)> + '_ {
        self.0.windows(2).map(|w| (w[0], w[1]))
    }

    pub fn traverses(&self, src: NodeId, dst: NodeId) -> bool {
        self.links().any(|link| link == (src, dst))
    }
}

impl TryFrom<Vec<NodeId>> for Path {
    type Error = CoreError;

    fn try_from(nodes: Vec<NodeId>) -> Result<Self, Self::Error> {
        Path::new(nodes)
    }
}

impl From<Path> for Vec<NodeId> {
    fn from(path: Path) -> Self {
        path.0
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let labels: Vec<String> = self.0.iter().map(|n| n.to_string()).collect();
        write!(f, "{}", labels.join("->"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nodes(ids: &[usize]) -> Vec<NodeId> {
        ids.iter().copied().map(NodeId::new).collect()
    }

    #[test]
    fn test_node_pair_display_and_parse() {
        let pair = NodePair::new(NodeId::new(3), NodeId::new(17));
        assert_eq!(pair.to_string(), "(3, 17)");
        assert_eq!("(3, 17)".parse::<NodePair>().unwrap(), pair);
        assert_eq!(" (3,17) ".parse::<NodePair>().unwrap(), pair);
    }

    #[test]
    fn test_node_pair_parse_rejects_malformed() {
        assert!("3, 17".parse::<NodePair>().is_err());
        assert!("(3)".parse::<NodePair>().is_err());
        assert!("(3, 4, 5)".parse::<NodePair>().is_err());
        assert!("(a, 4)".parse::<NodePair>().is_err());
    }

    #[test]
    fn test_path_requires_two_nodes() {
        assert!(Path::new(nodes(&[1])).is_err());
        assert!(Path::new(Vec::new()).is_err());
        assert!(Path::new(nodes(&[1, 2])).is_ok());
    }

    #[test]
    fn test_path_links_and_pair() {
        let path = Path::new(nodes(&[0, 1, 2])).unwrap();
        let links: Vec<_> = path.links().collect();
        assert_eq!(
            links,
            vec![
                (NodeId::new(0), NodeId::new(1)),
                (NodeId::new(1), NodeId::new(2))
            ]
        );
        assert_eq!(path.hops(), 2);
        assert_eq!(path.pair(), NodePair::new(NodeId::new(0), NodeId::new(2)));
        assert!(path.traverses(NodeId::new(1), NodeId::new(2)));
        assert!(!path.traverses(NodeId::new(2), NodeId::new(1)));
        assert_eq!(path.to_string(), "0->1->2");
    }

    #[test]
    fn test_path_structural_equality_as_key() {
        let mut map = std::collections::BTreeMap::new();
        map.insert(Path::new(nodes(&[0, 1, 2])).unwrap(), 1.0);
        let lookup = Path::new(nodes(&[0, 1, 2])).unwrap();
        assert_eq!(map.get(&lookup), Some(&1.0));
    }

    #[test]
    fn test_path_deserialize_validates_length() {
        let ok: Path = serde_json::from_str("[0, 1]").unwrap();
        assert_eq!(ok.hops(), 1);
        assert!(serde_json::from_str::<Path>("[0]").is_err());
    }
}
