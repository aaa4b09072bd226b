//! Capacitated directed topologies and path enumeration.
//!
//! Path queries count hops (unweighted), matching how paths are enumerated
//! for the flow formulations. All enumeration results are deterministic:
//! successors are visited in ascending [`NodeId`] order and ties between
//! equal-length paths are broken lexicographically.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};

use petgraph::algo::{all_simple_paths, has_path_connecting, tarjan_scc};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use serde::{Deserialize, Serialize};

use crate::{CoreError, CoreResult, NodeId, NodePair, Path};

/// Link capacities keyed by (source, target).
pub type CapacityMap = BTreeMap<(NodeId, NodeId), f64>;

/// A directed, capacitated link.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub capacity: f64,
}

/// A directed graph of nodes and capacitated links.
#[derive(Debug, Clone, Default)]
pub struct Topology {
    name: String,
    graph: DiGraph<NodeId, Link>,
    index: HashMap<NodeId, NodeIndex>,
}

impl Topology {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Bidirectional ring over nodes `0..num_nodes` with uniform capacity.
    pub fn ring(num_nodes: usize, capacity: f64) -> CoreResult<Self> {
        let mut topology = Topology::new(format!("ring_{num_nodes}"));
        for i in 0..num_nodes {
            topology.add_node(NodeId::new(i));
        }
        if num_nodes < 2 {
            return Ok(topology);
        }
        if num_nodes == 2 {
            topology.add_bidirectional_link(NodeId::new(0), NodeId::new(1), capacity)?;
            return Ok(topology);
        }
        for i in 0..num_nodes {
            let next = (i + 1) % num_nodes;
            topology.add_bidirectional_link(NodeId::new(i), NodeId::new(next), capacity)?;
        }
        Ok(topology)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Add a node; returns false if it already existed.
    pub fn add_node(&mut self, id: NodeId) -> bool {
        if self.index.contains_key(&id) {
            return false;
        }
        let idx = self.graph.add_node(id);
        self.index.insert(id, idx);
        true
    }

    /// Add a directed link between two existing nodes.
    pub fn add_link(&mut self, src: NodeId, dst: NodeId, capacity: f64) -> CoreResult<()> {
        let invalid = |reason: &str| CoreError::InvalidLink {
            src,
            dst,
            reason: reason.to_string(),
        };
        if src == dst {
            return Err(invalid("self-loops are not allowed"));
        }
        if !capacity.is_finite() || capacity < 0.0 {
            return Err(invalid("capacity must be finite and non-negative"));
        }
        let s = self.node_index(src)?;
        let d = self.node_index(dst)?;
        if self.graph.find_edge(s, d).is_some() {
            return Err(invalid("link already exists"));
        }
        self.graph.add_edge(s, d, Link { capacity });
        Ok(())
    }

    /// Add links in both directions with the same capacity.
    pub fn add_bidirectional_link(&mut self, a: NodeId, b: NodeId, capacity: f64) -> CoreResult<()> {
        self.add_link(a, b, capacity)?;
        self.add_link(b, a, capacity)
    }

    pub fn num_nodes(&self) -> usize {
        self.graph.node_count()
    }

    pub fn num_links(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn contains_node(&self, id: NodeId) -> bool {
        self.index.contains_key(&id)
    }

    /// Node ids in ascending order.
    pub fn nodes(&self) -> Vec<NodeId> {
        let mut nodes: Vec<NodeId> = self.graph.node_weights().copied().collect();
        nodes.sort();
        nodes
    }

    /// All ordered pairs of distinct nodes, in ascending order.
    pub fn node_pairs(&self) -> Vec<NodePair> {
        let nodes = self.nodes();
        let mut pairs = Vec::with_capacity(nodes.len() * nodes.len().saturating_sub(1));
        for &src in &nodes {
            for &dst in &nodes {
                if src != dst {
                    pairs.push(NodePair::new(src, dst));
                }
            }
        }
        pairs
    }

    pub fn link(&self, src: NodeId, dst: NodeId) -> Option<&Link> {
        let s = *self.index.get(&src)?;
        let d = *self.index.get(&dst)?;
        self.graph.find_edge(s, d).map(|e| &self.graph[e])
    }

    /// All links as `(src, dst, link)`, ordered by endpoints.
    pub fn links(&self) -> Vec<(NodeId, NodeId, Link)> {
        let mut links: Vec<_> = self
            .graph
            .edge_references()
            .map(|e| (self.graph[e.source()], self.graph[e.target()], *e.weight()))
            .collect();
        links.sort_by_key(|(s, d, _)| (*s, *d));
        links
    }

    pub fn capacities(&self) -> CapacityMap {
        self.links()
            .into_iter()
            .map(|(s, d, link)| ((s, d), link.capacity))
            .collect()
    }

    pub fn total_capacity(&self) -> f64 {
        self.graph.edge_weights().map(|l| l.capacity).sum()
    }

    pub fn max_capacity(&self) -> f64 {
        self.graph
            .edge_weights()
            .map(|l| l.capacity)
            .fold(0.0, f64::max)
    }

    /// Successors of a node in ascending id order.
    pub fn successors(&self, id: NodeId) -> Vec<NodeId> {
        let Some(&idx) = self.index.get(&id) else {
            return Vec::new();
        };
        let mut out: Vec<NodeId> = self
            .graph
            .neighbors_directed(idx, Direction::Outgoing)
            .map(|n| self.graph[n])
            .collect();
        out.sort();
        out
    }

    /// Neighbours in either direction, deduplicated, in ascending id order.
    pub fn all_neighbors(&self, id: NodeId) -> Vec<NodeId> {
        let Some(&idx) = self.index.get(&id) else {
            return Vec::new();
        };
        let set: BTreeSet<NodeId> = self
            .graph
            .neighbors_undirected(idx)
            .map(|n| self.graph[n])
            .collect();
        set.into_iter().collect()
    }

    pub fn has_path(&self, src: NodeId, dst: NodeId) -> bool {
        match (self.index.get(&src), self.index.get(&dst)) {
            (Some(&s), Some(&d)) if s != d => has_path_connecting(&self.graph, s, d, None),
            _ => false,
        }
    }

    /// Fewest-hop path, if any.
    pub fn shortest_path(&self, src: NodeId, dst: NodeId) -> Option<Path> {
        if src == dst {
            return None;
        }
        let nodes = self.bfs_path(src, dst, &HashSet::new(), &HashSet::new())?;
        Path::new(nodes).ok()
    }

    /// Up to `k` loop-free paths in order of increasing hop count (Yen's algorithm).
    pub fn k_shortest_paths(&self, k: usize, src: NodeId, dst: NodeId) -> Vec<Path> {
        if k == 0 || src == dst {
            return Vec::new();
        }
        let Some(first) = self.bfs_path(src, dst, &HashSet::new(), &HashSet::new()) else {
            return Vec::new();
        };

        let mut accepted: Vec<Vec<NodeId>> = vec![first];
        let mut candidates: BTreeSet<(usize, Vec<NodeId>)> = BTreeSet::new();

        while accepted.len() < k {
            let previous = accepted[accepted.len() - 1].clone();
            for i in 0..previous.len() - 1 {
                let spur = previous[i];
                let root = &previous[..=i];

                let mut banned_links = HashSet::new();
                for path in &accepted {
                    if path.len() > i + 1 && &path[..=i] == root {
                        banned_links.insert((path[i], path[i + 1]));
                    }
                }
                let banned_nodes: HashSet<NodeId> = root[..i].iter().copied().collect();

                if let Some(spur_path) = self.bfs_path(spur, dst, &banned_nodes, &banned_links) {
                    let mut total = root[..i].to_vec();
                    total.extend(spur_path);
                    if !accepted.contains(&total) {
                        candidates.insert((total.len(), total));
                    }
                }
            }

            match candidates.pop_first() {
                Some((_, path)) => accepted.push(path),
                None => break,
            }
        }

        accepted.into_iter().filter_map(|p| Path::new(p).ok()).collect()
    }

    /// Every loop-free path from `src` to `dst`, shortest first.
    pub fn simple_paths(&self, src: NodeId, dst: NodeId) -> Vec<Path> {
        let (Some(&s), Some(&d)) = (self.index.get(&src), self.index.get(&dst)) else {
            return Vec::new();
        };
        if s == d {
            return Vec::new();
        }
        let mut paths: Vec<Vec<NodeId>> =
            all_simple_paths::<Vec<NodeIndex>, _>(&self.graph, s, d, 0, None)
                .map(|p| p.into_iter().map(|n| self.graph[n]).collect())
                .collect();
        paths.sort_by(|a, b| a.len().cmp(&b.len()).then_with(|| a.cmp(b)));
        paths.into_iter().filter_map(|p| Path::new(p).ok()).collect()
    }

    /// Copy with every capacity divided by `num_partitions`.
    pub fn split_capacity(&self, num_partitions: usize) -> CoreResult<Topology> {
        if num_partitions == 0 {
            return Err(CoreError::InvalidPartitionCount(num_partitions));
        }
        let mut split = self.scaled(1.0 / num_partitions as f64);
        split.name = format!("{}_split_{}", self.name, num_partitions);
        Ok(split)
    }

    /// Copy with every capacity multiplied by `factor`.
    pub fn scaled(&self, factor: f64) -> Topology {
        let mut copy = self.clone();
        for link in copy.graph.edge_weights_mut() {
            link.capacity *= factor;
        }
        copy
    }

    /// Copy with the given link capacities replaced.
    ///
    /// Capacities may be negative here: a reduction that overshoots a link
    /// stays visible to the encoder instead of being clamped.
    pub fn with_capacities(&self, capacities: &CapacityMap) -> CoreResult<Topology> {
        let mut copy = self.clone();
        for (&(src, dst), &capacity) in capacities {
            let s = copy.node_index(src)?;
            let d = copy.node_index(dst)?;
            let edge = copy.graph.find_edge(s, d).ok_or_else(|| CoreError::InvalidLink {
                src,
                dst,
                reason: "link does not exist".into(),
            })?;
            copy.graph[edge].capacity = capacity;
        }
        Ok(copy)
    }

    /// The largest strongly connected component as its own topology.
    pub fn largest_strongly_connected(&self) -> Topology {
        let mut best: Vec<NodeIndex> = Vec::new();
        for component in tarjan_scc(&self.graph) {
            if component.len() > best.len() {
                best = component;
            }
        }
        let keep: HashSet<NodeIndex> = best.into_iter().collect();

        let mut sub = Topology::new(self.name.clone());
        let mut kept: Vec<NodeId> = keep.iter().map(|&n| self.graph[n]).collect();
        kept.sort();
        for id in kept {
            sub.add_node(id);
        }
        for edge in self.graph.edge_references() {
            if keep.contains(&edge.source()) && keep.contains(&edge.target()) {
                let s = sub.index[&self.graph[edge.source()]];
                let d = sub.index[&self.graph[edge.target()]];
                sub.graph.add_edge(s, d, *edge.weight());
            }
        }
        sub
    }

    /// Number of all-pairs shortest paths that traverse each link.
    pub fn link_loads(&self) -> BTreeMap<(NodeId, NodeId), usize> {
        let mut loads = BTreeMap::new();
        for pair in self.node_pairs() {
            if let Some(path) = self.shortest_path(pair.src, pair.dst) {
                for link in path.links() {
                    *loads.entry(link).or_insert(0) += 1;
                }
            }
        }
        loads
    }

    fn node_index(&self, id: NodeId) -> CoreResult<NodeIndex> {
        self.index.get(&id).copied().ok_or(CoreError::UnknownNode(id))
    }

    /// Breadth-first fewest-hop search avoiding banned nodes and links.
    fn bfs_path(
        &self,
        src: NodeId,
        dst: NodeId,
        banned_nodes: &HashSet<NodeId>,
        banned_links: &HashSet<(NodeId, NodeId)>,
    ) -> Option<Vec<NodeId>> {
        if !self.contains_node(src) || !self.contains_node(dst) || banned_nodes.contains(&src) {
            return None;
        }
        let mut parent: HashMap<NodeId, NodeId> = HashMap::new();
        let mut visited: HashSet<NodeId> = HashSet::from([src]);
        let mut queue = VecDeque::from([src]);

        while let Some(node) = queue.pop_front() {
            if node == dst {
                let mut path = vec![dst];
                let mut cursor = dst;
                while let Some(&prev) = parent.get(&cursor) {
                    path.push(prev);
                    cursor = prev;
                }
                path.reverse();
                return Some(path);
            }
            for next in self.successors(node) {
                if visited.contains(&next)
                    || banned_nodes.contains(&next)
                    || banned_links.contains(&(node, next))
                {
                    continue;
                }
                visited.insert(next);
                parent.insert(next, node);
                queue.push_back(next);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn n(id: usize) -> NodeId {
        NodeId::new(id)
    }

    fn ids(path: &Path) -> Vec<usize> {
        path.nodes().iter().map(|n| n.value()).collect()
    }

    /// 0 -> 1 -> 3, 0 -> 2 -> 3, 0 -> 3, 1 -> 2
    fn diamond() -> Topology {
        let mut t = Topology::new("diamond");
        for i in 0..4 {
            t.add_node(n(i));
        }
        t.add_link(n(0), n(1), 10.0).unwrap();
        t.add_link(n(1), n(3), 10.0).unwrap();
        t.add_link(n(0), n(2), 5.0).unwrap();
        t.add_link(n(2), n(3), 5.0).unwrap();
        t.add_link(n(0), n(3), 1.0).unwrap();
        t.add_link(n(1), n(2), 2.0).unwrap();
        t
    }

    #[test]
    fn test_add_link_validation() {
        let mut t = Topology::new("t");
        t.add_node(n(0));
        t.add_node(n(1));
        assert!(t.add_link(n(0), n(0), 1.0).is_err());
        assert!(t.add_link(n(0), n(1), -1.0).is_err());
        assert!(t.add_link(n(0), n(1), f64::NAN).is_err());
        assert!(matches!(
            t.add_link(n(0), n(5), 1.0),
            Err(CoreError::UnknownNode(_))
        ));
        t.add_link(n(0), n(1), 1.0).unwrap();
        assert!(t.add_link(n(0), n(1), 2.0).is_err());
    }

    #[test]
    fn test_capacity_queries() {
        let t = diamond();
        assert_eq!(t.num_links(), 6);
        assert_eq!(t.total_capacity(), 33.0);
        assert_eq!(t.max_capacity(), 10.0);
        assert_eq!(t.link(n(0), n(2)).map(|l| l.capacity), Some(5.0));
        assert!(t.link(n(2), n(0)).is_none());
    }

    #[test]
    fn test_node_pairs_ordered() {
        let t = diamond();
        let pairs = t.node_pairs();
        assert_eq!(pairs.len(), 12);
        assert_eq!(pairs[0], NodePair::new(n(0), n(1)));
        assert_eq!(pairs[11], NodePair::new(n(3), n(2)));
    }

    #[test]
    fn test_shortest_path_hop_count() {
        let t = diamond();
        let p = t.shortest_path(n(0), n(3)).unwrap();
        assert_eq!(ids(&p), vec![0, 3]);
        assert!(t.shortest_path(n(3), n(0)).is_none());
    }

    #[test]
    fn test_k_shortest_paths_order() {
        let t = diamond();
        let paths = t.k_shortest_paths(4, n(0), n(3));
        let got: Vec<Vec<usize>> = paths.iter().map(ids).collect();
        assert_eq!(
            got,
            vec![vec![0, 3], vec![0, 1, 3], vec![0, 2, 3], vec![0, 1, 2, 3]]
        );
        assert_eq!(t.k_shortest_paths(2, n(0), n(3)).len(), 2);
        assert!(t.k_shortest_paths(3, n(3), n(0)).is_empty());
        assert!(t.k_shortest_paths(0, n(0), n(3)).is_empty());
    }

    #[test]
    fn test_k_shortest_exhausts_available_paths() {
        let t = diamond();
        assert_eq!(t.k_shortest_paths(10, n(0), n(3)).len(), 4);
    }

    #[test]
    fn test_simple_paths_match_k_shortest() {
        let t = diamond();
        let simple = t.simple_paths(n(0), n(3));
        let yen = t.k_shortest_paths(10, n(0), n(3));
        assert_eq!(simple, yen);
    }

    #[test]
    fn test_split_capacity() {
        let t = diamond();
        let split = t.split_capacity(2).unwrap();
        assert_eq!(split.link(n(0), n(1)).unwrap().capacity, 5.0);
        assert_eq!(t.link(n(0), n(1)).unwrap().capacity, 10.0);
        assert!(matches!(
            t.split_capacity(0),
            Err(CoreError::InvalidPartitionCount(0))
        ));
    }

    #[test]
    fn test_with_capacities_does_not_mutate_original() {
        let t = diamond();
        let mut caps = CapacityMap::new();
        caps.insert((n(0), n(1)), 3.0);
        let reduced = t.with_capacities(&caps).unwrap();
        assert_eq!(reduced.link(n(0), n(1)).unwrap().capacity, 3.0);
        assert_eq!(t.link(n(0), n(1)).unwrap().capacity, 10.0);

        caps.insert((n(3), n(0)), 1.0);
        assert!(t.with_capacities(&caps).is_err());
    }

    #[test]
    fn test_ring() {
        let ring = Topology::ring(4, 100.0).unwrap();
        assert_eq!(ring.num_nodes(), 4);
        assert_eq!(ring.num_links(), 8);
        assert_eq!(ring.k_shortest_paths(2, n(0), n(2)).len(), 2);
    }

    #[test]
    fn test_largest_strongly_connected() {
        let mut t = Topology::ring(3, 1.0).unwrap();
        t.add_node(n(7));
        t.add_link(n(0), n(7), 1.0).unwrap();
        let scc = t.largest_strongly_connected();
        assert_eq!(scc.num_nodes(), 3);
        assert_eq!(scc.num_links(), 6);
        assert!(!scc.contains_node(n(7)));
    }

    #[test]
    fn test_link_loads() {
        let mut t = Topology::new("line");
        for i in 0..3 {
            t.add_node(n(i));
        }
        t.add_bidirectional_link(n(0), n(1), 1.0).unwrap();
        t.add_bidirectional_link(n(1), n(2), 1.0).unwrap();
        let loads = t.link_loads();
        // (0,1) and (0,2) both use 0 -> 1
        assert_eq!(loads[&(n(0), n(1))], 2);
        assert_eq!(loads[&(n(2), n(1))], 2);
    }
}
