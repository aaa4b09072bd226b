//! Solve status and search statistics.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// How a solve that produced an assignment ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SolveStatus {
    /// The search tree was exhausted; the assignment is optimal.
    Optimal,
    /// A monitor or limit stopped the search; the assignment is feasible
    /// but possibly suboptimal.
    Terminated(String),
}

impl SolveStatus {
    pub fn is_optimal(&self) -> bool {
        matches!(self, SolveStatus::Optimal)
    }
}

impl fmt::Display for SolveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SolveStatus::Optimal => write!(f, "optimal"),
            SolveStatus::Terminated(reason) => write!(f, "terminated ({reason})"),
        }
    }
}

/// Counters collected by the branch-and-bound search.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchStatistics {
    /// LP relaxations solved
    pub nodes_explored: u64,
    pub max_depth: u64,
    /// Nodes whose relaxation was infeasible
    pub prunings_infeasible: u64,
    /// Nodes whose relaxation bound could not beat the incumbent
    pub prunings_bound: u64,
    /// Improving integer-feasible assignments
    pub incumbents_found: u64,
    /// Relaxation bound at the root node
    pub root_bound: Option<f64>,
    pub best_objective: Option<f64>,
    pub time_total: Duration,
}

impl SearchStatistics {
    pub fn on_node_explored(&mut self, depth: u64) {
        self.nodes_explored = self.nodes_explored.saturating_add(1);
        self.max_depth = self.max_depth.max(depth);
    }

    pub fn on_pruning_infeasible(&mut self) {
        self.prunings_infeasible = self.prunings_infeasible.saturating_add(1);
    }

    pub fn on_pruning_bound(&mut self) {
        self.prunings_bound = self.prunings_bound.saturating_add(1);
    }

    pub fn on_incumbent(&mut self, objective: f64) {
        self.incumbents_found = self.incumbents_found.saturating_add(1);
        self.best_objective = Some(objective);
    }
}

impl fmt::Display for SearchStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "nodes={} depth={} pruned(infeasible={}, bound={}) incumbents={} time={:.3}s",
            self.nodes_explored,
            self.max_depth,
            self.prunings_infeasible,
            self.prunings_bound,
            self.incumbents_found,
            self.time_total.as_secs_f64()
        )
    }
}
