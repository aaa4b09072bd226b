//! Path enumeration modes.

use metaopt_core::{NodePair, Path, Topology};

/// How candidate paths are enumerated for each pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathMode {
    /// At most `k` shortest simple paths (by hop count).
    KShortest(usize),
    /// Every simple path.
    AllSimple,
}

impl PathMode {
    /// Candidate paths of `pair`, shortest first. Empty when the pair is
    /// disconnected.
    pub fn paths(&self, topology: &Topology, pair: NodePair) -> Vec<Path> {
        match *self {
            PathMode::KShortest(k) => topology.k_shortest_paths(k, pair.src, pair.dst),
            PathMode::AllSimple => topology.simple_paths(pair.src, pair.dst),
        }
    }

    /// Upper bound on the number of paths per pair, when one exists.
    pub fn fan_out(&self) -> Option<usize> {
        match *self {
            PathMode::KShortest(k) => Some(k),
            PathMode::AllSimple => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use metaopt_core::NodeId;

    #[test]
    fn test_modes_on_ring() {
        let ring = Topology::ring(4, 10.0).unwrap();
        let pair = NodePair::new(NodeId::new(0), NodeId::new(2));
        assert_eq!(PathMode::KShortest(1).paths(&ring, pair).len(), 1);
        assert!(PathMode::AllSimple.paths(&ring, pair).len() >= 2);
        assert_eq!(PathMode::AllSimple.fan_out(), None);
    }
}
