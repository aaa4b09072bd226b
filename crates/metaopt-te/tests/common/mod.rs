//! Shared fixtures for the formulation tests.

#![allow(dead_code)]

use metaopt_core::{DemandMap, NodeId, NodePair, Topology};
use metaopt_solver::{LpSolver, LpSolverConfig, SolverResult};

pub const TOL: f64 = 1e-4;

/// Route `RUST_LOG` output through the test harness.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn solver() -> SolverResult<LpSolver> {
    LpSolver::new(LpSolverConfig::new(1000.0))
}

pub fn n(i: usize) -> NodeId {
    NodeId::new(i)
}

pub fn pair(s: usize, d: usize) -> NodePair {
    NodePair::new(n(s), n(d))
}

pub fn topology(name: &str, num_nodes: usize, links: &[(usize, usize, f64)]) -> Topology {
    let mut t = Topology::new(name);
    for i in 0..num_nodes {
        t.add_node(n(i));
    }
    for &(s, d, c) in links {
        t.add_link(n(s), n(d), c).unwrap();
    }
    t
}

/// A→B capacity 10, B→C capacity 5.
pub fn bottleneck_line() -> Topology {
    topology("bottleneck", 3, &[(0, 1, 10.0), (1, 2, 5.0)])
}

/// Zero demand on every topology pair except the listed ones.
pub fn demands(topology: &Topology, entries: &[((usize, usize), f64)]) -> DemandMap {
    let mut map = DemandMap::uniform(topology, 0.0);
    for &((s, d), v) in entries {
        map.insert(pair(s, d), v);
    }
    map
}

pub fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < TOL,
        "expected {expected}, got {actual}"
    );
}
