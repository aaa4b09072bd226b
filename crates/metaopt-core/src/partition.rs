//! Node partitioning and POP partition maps.
//!
//! Two kinds of partition live here:
//!
//! - **Node partitions** ([`NodePartition`]) split the topology's nodes into
//!   contiguous regions. [`LeaderElectionUniform`] grows regions from random
//!   seed nodes while keeping sizes close to uniform.
//! - **Pair partitions** (`BTreeMap<NodePair, usize>`) assign every demand
//!   pair to exactly one POP sub-problem. They can be derived from a node
//!   partition ([`pair_partition_by_source`]) or drawn at random
//!   ([`random_pair_partition`]).
//!
//! # Example
//!
//! ```rust
//! use metaopt_core::{LeaderElectionUniform, PartitioningMethod, Topology, is_partition_contiguous};
//!
//! let ring = Topology::ring(12, 1000.0).unwrap();
//! let method = LeaderElectionUniform::new(Some(3), 7, 0.2);
//! let partition = method.partition(&ring).unwrap();
//! assert_eq!(partition.num_partitions(), 3);
//! assert!(is_partition_contiguous(&ring, &partition));
//! ```

use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::Serialize;
use tracing::debug;

use crate::{CoreError, CoreResult, NodeId, NodePair, Topology};

/// Restarts allowed before leader election gives up.
const MAX_ELECTION_ATTEMPTS: usize = 1000;

/// Assignment of every node to a partition index in `0..num_partitions`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodePartition {
    assignment: BTreeMap<NodeId, usize>,
    num_partitions: usize,
}

impl NodePartition {
    pub fn new(assignment: BTreeMap<NodeId, usize>, num_partitions: usize) -> CoreResult<Self> {
        if num_partitions == 0 {
            return Err(CoreError::InvalidPartitionCount(num_partitions));
        }
        if let Some((node, part)) = assignment.iter().find(|&(_, &p)| p >= num_partitions) {
            return Err(CoreError::Partitioning(format!(
                "node {node} assigned to partition {part} of {num_partitions}"
            )));
        }
        Ok(Self {
            assignment,
            num_partitions,
        })
    }

    pub fn num_partitions(&self) -> usize {
        self.num_partitions
    }

    pub fn partition_of(&self, node: NodeId) -> Option<usize> {
        self.assignment.get(&node).copied()
    }

    pub fn members(&self, partition: usize) -> Vec<NodeId> {
        self.assignment
            .iter()
            .filter(|&(_, &p)| p == partition)
            .map(|(&n, _)| n)
            .collect()
    }

    pub fn sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0; self.num_partitions];
        for &p in self.assignment.values() {
            sizes[p] += 1;
        }
        sizes
    }

    /// Index of the largest partition (lowest index on ties).
    pub fn largest_partition_index(&self) -> usize {
        let sizes = self.sizes();
        let mut best = 0;
        for (i, &size) in sizes.iter().enumerate() {
            if size > sizes[best] {
                best = i;
            }
        }
        best
    }

    pub fn size_of_largest_partition(&self) -> usize {
        self.sizes().into_iter().max().unwrap_or(0)
    }
}

/// A strategy that assigns topology nodes to partitions.
pub trait PartitioningMethod {
    fn name(&self) -> &str;

    fn partition(&self, topology: &Topology) -> CoreResult<NodePartition>;
}

/// Random contiguous partitioning with a near-uniform size cap.
///
/// Seed nodes are drawn at random, one per partition. Unassigned nodes then
/// join a partition they neighbour, as long as that partition has not grown
/// past `(1 + tolerance) * (n / k + 1)` nodes. When no unassigned node can
/// join any partition the election restarts with fresh seeds.
#[derive(Debug, Clone)]
pub struct LeaderElectionUniform {
    num_partitions: Option<usize>,
    seed: u64,
    tolerance: f64,
}

impl LeaderElectionUniform {
    /// `num_partitions = None` uses `floor(sqrt(n))` partitions.
    pub fn new(num_partitions: Option<usize>, seed: u64, tolerance: f64) -> Self {
        Self {
            num_partitions,
            seed,
            tolerance,
        }
    }

    fn resolve_count(&self, num_nodes: usize) -> CoreResult<usize> {
        let k = self
            .num_partitions
            .unwrap_or_else(|| (num_nodes as f64).sqrt() as usize);
        if k == 0 || k > num_nodes {
            return Err(CoreError::InvalidPartitionCount(k));
        }
        Ok(k)
    }

    fn elect(
        &self,
        topology: &Topology,
        nodes: &[NodeId],
        k: usize,
        rng: &mut StdRng,
    ) -> Option<BTreeMap<NodeId, usize>> {
        let mut assignment: BTreeMap<NodeId, usize> = BTreeMap::new();
        let mut sizes = vec![0usize; k];
        for (part, &seed) in nodes.choose_multiple(rng, k).enumerate() {
            assignment.insert(seed, part);
            sizes[part] += 1;
        }
        let cap = (1.0 + self.tolerance) * ((nodes.len() / k) + 1) as f64;

        while assignment.len() < nodes.len() {
            let mut unassigned: Vec<NodeId> = nodes
                .iter()
                .copied()
                .filter(|n| !assignment.contains_key(n))
                .collect();
            unassigned.shuffle(rng);

            let mut choice = None;
            for node in unassigned {
                let open: BTreeSet<usize> = topology
                    .all_neighbors(node)
                    .into_iter()
                    .filter_map(|nb| assignment.get(&nb).copied())
                    .filter(|&p| sizes[p] as f64 <= cap)
                    .collect();
                if !open.is_empty() {
                    choice = Some((node, open.into_iter().collect::<Vec<_>>()));
                    break;
                }
            }

            let (node, open) = choice?;
            let part = *open.choose(rng)?;
            assignment.insert(node, part);
            sizes[part] += 1;
        }
        Some(assignment)
    }
}

impl PartitioningMethod for LeaderElectionUniform {
    fn name(&self) -> &str {
        "leader_election_uniform"
    }

    fn partition(&self, topology: &Topology) -> CoreResult<NodePartition> {
        let nodes = topology.nodes();
        let k = self.resolve_count(nodes.len())?;
        let mut rng = StdRng::seed_from_u64(self.seed);

        for attempt in 1..=MAX_ELECTION_ATTEMPTS {
            if let Some(assignment) = self.elect(topology, &nodes, k, &mut rng) {
                debug!(attempt, partitions = k, "leader election converged");
                return NodePartition::new(assignment, k);
            }
            debug!(attempt, "leader election hit a dead end; reseeding");
        }
        Err(CoreError::Partitioning(format!(
            "no contiguous assignment into {k} partitions after {MAX_ELECTION_ATTEMPTS} attempts"
        )))
    }
}

/// Whether every partition induces a connected subgraph (links taken in
/// either direction, matching how partitions are grown).
pub fn is_partition_contiguous(topology: &Topology, partition: &NodePartition) -> bool {
    (0..partition.num_partitions()).all(|p| {
        let members: HashSet<NodeId> = partition.members(p).into_iter().collect();
        let Some(&start) = members.iter().min() else {
            return true;
        };
        let mut seen = HashSet::from([start]);
        let mut queue = VecDeque::from([start]);
        while let Some(node) = queue.pop_front() {
            for nb in topology.all_neighbors(node) {
                if members.contains(&nb) && seen.insert(nb) {
                    queue.push_back(nb);
                }
            }
        }
        seen.len() == members.len()
    })
}

/// How many candidate paths between same-partition endpoints leave their partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PartitionPathStats {
    /// Paths enumerated between endpoints that share a partition
    pub total_paths: usize,
    /// Of those, paths visiting more than one partition
    pub crossing_paths: usize,
    /// Links whose endpoints lie in different partitions
    pub inter_partition_links: usize,
}

impl PartitionPathStats {
    pub fn crossing_fraction(&self) -> f64 {
        if self.total_paths == 0 {
            0.0
        } else {
            self.crossing_paths as f64 / self.total_paths as f64
        }
    }
}

pub fn partition_path_stats(
    topology: &Topology,
    partition: &NodePartition,
    num_paths: usize,
) -> PartitionPathStats {
    let mut stats = PartitionPathStats {
        total_paths: 0,
        crossing_paths: 0,
        inter_partition_links: 0,
    };
    for (src, dst, _) in topology.links() {
        if partition.partition_of(src) != partition.partition_of(dst) {
            stats.inter_partition_links += 1;
        }
    }
    for pair in topology.node_pairs() {
        let home = partition.partition_of(pair.src);
        if home.is_none() || home != partition.partition_of(pair.dst) {
            continue;
        }
        for path in topology.k_shortest_paths(num_paths, pair.src, pair.dst) {
            stats.total_paths += 1;
            if path.nodes().iter().any(|&n| partition.partition_of(n) != home) {
                stats.crossing_paths += 1;
            }
        }
    }
    stats
}

/// Assign each pair to the partition of its source node.
pub fn pair_partition_by_source(
    topology: &Topology,
    partition: &NodePartition,
) -> CoreResult<BTreeMap<NodePair, usize>> {
    topology
        .node_pairs()
        .into_iter()
        .map(|pair| {
            partition
                .partition_of(pair.src)
                .map(|p| (pair, p))
                .ok_or(CoreError::UnknownNode(pair.src))
        })
        .collect()
}

/// Shuffle the pairs and deal them round-robin into `num_partitions` groups.
pub fn random_pair_partition(
    pairs: impl IntoIterator<Item = NodePair>,
    num_partitions: usize,
    seed: u64,
) -> CoreResult<BTreeMap<NodePair, usize>> {
    if num_partitions == 0 {
        return Err(CoreError::InvalidPartitionCount(num_partitions));
    }
    let mut pairs: Vec<NodePair> = pairs.into_iter().collect();
    pairs.sort();
    let mut rng = StdRng::seed_from_u64(seed);
    pairs.shuffle(&mut rng);
    Ok(pairs
        .into_iter()
        .enumerate()
        .map(|(i, pair)| (pair, i % num_partitions))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn n(id: usize) -> NodeId {
        NodeId::new(id)
    }

    #[test]
    fn test_leader_election_covers_every_node() {
        let ring = Topology::ring(20, 100.0).unwrap();
        let method = LeaderElectionUniform::new(Some(4), 0, 0.2);
        let partition = method.partition(&ring).unwrap();
        assert_eq!(partition.sizes().iter().sum::<usize>(), 20);
        assert!(partition.sizes().iter().all(|&s| s > 0));
        assert!(is_partition_contiguous(&ring, &partition));
    }

    #[test]
    fn test_leader_election_is_deterministic_per_seed() {
        let ring = Topology::ring(15, 100.0).unwrap();
        let a = LeaderElectionUniform::new(Some(3), 42, 0.2).partition(&ring).unwrap();
        let b = LeaderElectionUniform::new(Some(3), 42, 0.2).partition(&ring).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_default_partition_count_is_sqrt() {
        let ring = Topology::ring(16, 1.0).unwrap();
        let partition = LeaderElectionUniform::new(None, 1, 0.5).partition(&ring).unwrap();
        assert_eq!(partition.num_partitions(), 4);
    }

    #[test]
    fn test_invalid_partition_counts() {
        let ring = Topology::ring(4, 1.0).unwrap();
        assert!(matches!(
            LeaderElectionUniform::new(Some(0), 0, 0.2).partition(&ring),
            Err(CoreError::InvalidPartitionCount(0))
        ));
        assert!(matches!(
            LeaderElectionUniform::new(Some(5), 0, 0.2).partition(&ring),
            Err(CoreError::InvalidPartitionCount(5))
        ));
    }

    #[test]
    fn test_contiguity_detects_split_partition() {
        let ring = Topology::ring(6, 1.0).unwrap();
        // partition 0 = {0, 3} is not connected on a 6-ring
        let assignment: BTreeMap<NodeId, usize> =
            [(0, 0), (1, 1), (2, 1), (3, 0), (4, 1), (5, 1)]
                .into_iter()
                .map(|(node, p)| (n(node), p))
                .collect();
        let partition = NodePartition::new(assignment, 2).unwrap();
        assert!(!is_partition_contiguous(&ring, &partition));
        assert_eq!(partition.largest_partition_index(), 1);
        assert_eq!(partition.size_of_largest_partition(), 4);
    }

    #[test]
    fn test_path_stats_on_split_ring() {
        let ring = Topology::ring(4, 1.0).unwrap();
        let assignment: BTreeMap<NodeId, usize> = [(0, 0), (1, 0), (2, 1), (3, 1)]
            .into_iter()
            .map(|(node, p)| (n(node), p))
            .collect();
        let partition = NodePartition::new(assignment, 2).unwrap();
        let stats = partition_path_stats(&ring, &partition, 2);
        // (0,1),(1,0),(2,3),(3,2): direct path stays, the long way round crosses
        assert_eq!(stats.total_paths, 8);
        assert_eq!(stats.crossing_paths, 4);
        assert_eq!(stats.inter_partition_links, 4);
        assert!((stats.crossing_fraction() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_random_pair_partition_is_balanced() {
        let ring = Topology::ring(5, 1.0).unwrap();
        let map = random_pair_partition(ring.node_pairs(), 4, 9).unwrap();
        assert_eq!(map.len(), 20);
        let mut counts = [0; 4];
        for &p in map.values() {
            counts[p] += 1;
        }
        assert_eq!(counts, [5, 5, 5, 5]);
        assert!(random_pair_partition(ring.node_pairs(), 0, 9).is_err());
    }

    #[test]
    fn test_pair_partition_by_source() {
        let ring = Topology::ring(4, 1.0).unwrap();
        let assignment: BTreeMap<NodeId, usize> = [(0, 0), (1, 0), (2, 1), (3, 1)]
            .into_iter()
            .map(|(node, p)| (n(node), p))
            .collect();
        let partition = NodePartition::new(assignment, 2).unwrap();
        let map = pair_partition_by_source(&ring, &partition).unwrap();
        assert_eq!(map[&NodePair::new(n(2), n(0))], 1);
        assert_eq!(map[&NodePair::new(n(1), n(3))], 0);
    }
}
