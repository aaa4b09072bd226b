//! Demand maps keyed by node pair.
//!
//! A demand map used for encoding must hold a finite, non-negative entry for
//! every pair that is reachable in the topology. Missing entries are a usage
//! error and are never zero-filled. Unreachable pairs may be omitted.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path as FsPath;

use serde::{Deserialize, Serialize};

use crate::{CoreError, CoreResult, NodePair, Topology};

/// Demand per node pair. JSON form: `{"(0, 1)": 12.5, ...}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DemandMap {
    entries: BTreeMap<NodePair, f64>,
}

/// Sparsity summary of a demand map.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DemandStats {
    /// Ordered pairs of distinct nodes, `n * (n - 1)`
    pub num_pairs: usize,
    /// Entries strictly above the positivity threshold
    pub num_positive: usize,
    /// `num_positive / num_pairs`
    pub density: f64,
}

impl DemandMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Same value for every ordered pair of the topology.
    pub fn uniform(topology: &Topology, value: f64) -> Self {
        topology.node_pairs().into_iter().map(|p| (p, value)).collect()
    }

    pub fn insert(&mut self, pair: NodePair, value: f64) -> Option<f64> {
        self.entries.insert(pair, value)
    }

    pub fn get(&self, pair: &NodePair) -> Option<f64> {
        self.entries.get(pair).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&NodePair, &f64)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total(&self) -> f64 {
        self.entries.values().sum()
    }

    /// Check every entry and require an entry for each reachable pair.
    pub fn validate_against(&self, topology: &Topology) -> CoreResult<()> {
        for (pair, &value) in &self.entries {
            if !value.is_finite() || value < 0.0 {
                return Err(CoreError::InvalidDemand { pair: *pair, value });
            }
            for node in [pair.src, pair.dst] {
                if !topology.contains_node(node) {
                    return Err(CoreError::UnknownNode(node));
                }
            }
        }
        for pair in topology.node_pairs() {
            if !self.entries.contains_key(&pair) && topology.has_path(pair.src, pair.dst) {
                return Err(CoreError::MissingDemand(pair));
            }
        }
        Ok(())
    }

    /// Demand of a pair; unreachable pairs without an entry resolve to 0.
    pub fn resolve(&self, topology: &Topology, pair: NodePair) -> CoreResult<f64> {
        match self.entries.get(&pair) {
            Some(&value) if !value.is_finite() || value < 0.0 => {
                Err(CoreError::InvalidDemand { pair, value })
            }
            Some(&value) => Ok(value),
            None if topology.has_path(pair.src, pair.dst) => Err(CoreError::MissingDemand(pair)),
            None => Ok(0.0),
        }
    }

    pub fn stats(&self, num_nodes: usize, positive_threshold: f64) -> DemandStats {
        let num_pairs = num_nodes * num_nodes.saturating_sub(1);
        let num_positive = self
            .entries
            .values()
            .filter(|&&v| v > positive_threshold)
            .count();
        let density = if num_pairs == 0 {
            0.0
        } else {
            num_positive as f64 / num_pairs as f64
        };
        DemandStats {
            num_pairs,
            num_positive,
            density,
        }
    }

    pub fn from_json_str(json: &str) -> CoreResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json_string(&self) -> CoreResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_file(path: impl AsRef<FsPath>) -> CoreResult<Self> {
        Self::from_json_str(&fs::read_to_string(path)?)
    }

    pub fn write_file(&self, path: impl AsRef<FsPath>) -> CoreResult<()> {
        fs::write(path, self.to_json_string()?)?;
        Ok(())
    }
}

impl FromIterator<(NodePair, f64)> for DemandMap {
    fn from_iter<I: IntoIterator<Item = (NodePair, f64)>>(iter: I) -> Self {
        DemandMap {
            entries: iter.into_iter().collect(),
        }
    }
}
