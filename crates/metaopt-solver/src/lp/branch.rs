//! Depth-first branch-and-bound over LP relaxations.
//!
//! Each node fixes a subset of the binary variables through their bounds.
//! A node is pruned when its relaxation is infeasible or its bound cannot
//! beat the incumbent by more than the optimality tolerance. Otherwise the
//! most fractional binary is branched on, exploring the nearer rounding
//! first. Integral nodes are polished by re-solving with every binary fixed,
//! so reported values satisfy the disjunction rows exactly. A node whose
//! rounded assignment is infeasible is never an incumbent.

use tracing::{debug, info, warn};
use web_time::Instant;

use super::relaxation::{Relaxation, RelaxationProblem};
use super::{LpSolution, LpSolverConfig};
use crate::capability::VariableKind;
use crate::monitor::{SearchCommand, SearchMonitor};
use crate::outcome::{SearchStatistics, SolveStatus};
use crate::{SolverError, SolverResult};

struct Node {
    bounds: Vec<(f64, f64)>,
    depth: u64,
}

struct Incumbent {
    values: Vec<f64>,
    objective: f64,
}

pub(crate) struct BranchAndBound<'a> {
    problem: RelaxationProblem<'a>,
    config: &'a LpSolverConfig,
    binaries: Vec<usize>,
}

impl<'a> BranchAndBound<'a> {
    pub(crate) fn new(problem: RelaxationProblem<'a>, config: &'a LpSolverConfig) -> Self {
        let binaries = problem
            .variables
            .iter()
            .enumerate()
            .filter(|(_, v)| v.kind == VariableKind::Binary)
            .map(|(i, _)| i)
            .collect();
        Self {
            problem,
            config,
            binaries,
        }
    }

    pub(crate) fn run(&self, monitor: &mut dyn SearchMonitor) -> SolverResult<LpSolution> {
        let start = Instant::now();
        let mut statistics = SearchStatistics::default();
        monitor.on_enter_search();

        let outcome = self.search(monitor, &mut statistics);

        statistics.time_total = start.elapsed();
        monitor.on_exit_search(&statistics);

        let (incumbent, termination) = outcome?;
        info!(%statistics, "branch-and-bound finished");
        match (incumbent, termination) {
            (Some(best), None) => Ok(self.solution(best, SolveStatus::Optimal, statistics)),
            (Some(best), Some(reason)) => {
                warn!(%reason, "search terminated early; returning best incumbent");
                Ok(self.solution(best, SolveStatus::Terminated(reason), statistics))
            }
            (None, Some(reason)) => Err(SolverError::NoIncumbent { reason }),
            (None, None) => Err(SolverError::InfeasibleOrUnbounded(
                "no assignment satisfies the constraints".into(),
            )),
        }
    }

    fn search(
        &self,
        monitor: &mut dyn SearchMonitor,
        statistics: &mut SearchStatistics,
    ) -> SolverResult<(Option<Incumbent>, Option<String>)> {
        let mut stack = vec![Node {
            bounds: self.problem.root_bounds(),
            depth: 0,
        }];
        let mut incumbent: Option<Incumbent> = None;

        while let Some(node) = stack.pop() {
            if let SearchCommand::Terminate(reason) = monitor.search_command(statistics) {
                return Ok((incumbent, Some(reason)));
            }
            if statistics.nodes_explored >= self.config.max_nodes {
                return Ok((
                    incumbent,
                    Some(format!("node limit of {} reached", self.config.max_nodes)),
                ));
            }

            statistics.on_node_explored(node.depth);
            let relaxation = self.problem.solve(&node.bounds)?;
            monitor.on_node(statistics);

            let (values, bound) = match relaxation {
                Relaxation::Infeasible => {
                    statistics.on_pruning_infeasible();
                    continue;
                }
                Relaxation::Solved { values, objective } => (values, objective),
            };
            if node.depth == 0 {
                statistics.root_bound = Some(bound);
            }
            if let Some(best) = &incumbent {
                if !self.improves(bound, best.objective) {
                    statistics.on_pruning_bound();
                    continue;
                }
            }

            match self.most_fractional(&values) {
                Some((position, value)) => {
                    let (near, far) = if value >= 0.5 { (1.0, 0.0) } else { (0.0, 1.0) };
                    stack.push(self.child(&node, position, far));
                    stack.push(self.child(&node, position, near));
                }
                None => {
                    let Some(candidate) = self.polish(&node, &values, bound)? else {
                        match self.least_integral_free(&node, &values) {
                            Some((position, value)) => {
                                let (near, far) =
                                    if value >= 0.5 { (1.0, 0.0) } else { (0.0, 1.0) };
                                stack.push(self.child(&node, position, far));
                                stack.push(self.child(&node, position, near));
                            }
                            None => statistics.on_pruning_infeasible(),
                        }
                        continue;
                    };
                    if incumbent
                        .as_ref()
                        .map_or(true, |best| candidate.objective > best.objective)
                    {
                        statistics.on_incumbent(candidate.objective);
                        debug!(
                            objective = candidate.objective,
                            node = statistics.nodes_explored,
                            "new incumbent"
                        );
                        monitor.on_incumbent(candidate.objective, statistics)?;
                        incumbent = Some(candidate);
                    }
                }
            }
        }
        Ok((incumbent, None))
    }

    fn improves(&self, bound: f64, best: f64) -> bool {
        bound > best + self.config.optimality_tolerance * (1.0 + best.abs())
    }

    fn child(&self, parent: &Node, position: usize, value: f64) -> Node {
        let mut bounds = parent.bounds.clone();
        bounds[position] = (value, value);
        Node {
            bounds,
            depth: parent.depth + 1,
        }
    }

    /// Binary farthest from integrality, if any exceeds the tolerance.
    fn most_fractional(&self, values: &[f64]) -> Option<(usize, f64)> {
        let mut best: Option<(usize, f64, f64)> = None;
        for &position in &self.binaries {
            let value = values[position];
            let distance = (value - value.round()).abs();
            if distance <= self.config.integrality_tolerance {
                continue;
            }
            if best.map_or(true, |(_, _, d)| distance > d) {
                best = Some((position, value, distance));
            }
        }
        best.map(|(position, value, _)| (position, value))
    }

    /// Binary not yet fixed at `node` that is farthest from integrality.
    fn least_integral_free(&self, node: &Node, values: &[f64]) -> Option<(usize, f64)> {
        self.binaries
            .iter()
            .filter(|&&position| node.bounds[position].0 < node.bounds[position].1)
            .map(|&position| {
                let value = values[position];
                (position, value, (value - value.round()).abs())
            })
            .fold(None, |best: Option<(usize, f64, f64)>, candidate| match best {
                Some(b) if b.2 >= candidate.2 => Some(b),
                _ => Some(candidate),
            })
            .map(|(position, value, _)| (position, value))
    }

    /// Fix every binary to its rounded value and re-solve the continuous part.
    ///
    /// `None` when the rounded assignment is infeasible. The caller then
    /// branches on a binary still free at `node`, or prunes.
    fn polish(&self, node: &Node, values: &[f64], bound: f64) -> SolverResult<Option<Incumbent>> {
        if self.binaries.is_empty() {
            return Ok(Some(Incumbent {
                values: values.to_vec(),
                objective: bound,
            }));
        }
        let mut bounds = node.bounds.clone();
        for &position in &self.binaries {
            let rounded = values[position].round();
            bounds[position] = (rounded, rounded);
        }
        match self.problem.solve(&bounds)? {
            Relaxation::Solved { values, objective } => Ok(Some(Incumbent { values, objective })),
            Relaxation::Infeasible => {
                debug!(depth = node.depth, "polishing LP infeasible; rounded assignment rejected");
                Ok(None)
            }
        }
    }

    fn solution(
        &self,
        incumbent: Incumbent,
        status: SolveStatus,
        statistics: SearchStatistics,
    ) -> LpSolution {
        let values = self
            .problem
            .variables
            .iter()
            .zip(incumbent.values)
            .map(|(record, value)| (record.id, value))
            .collect();
        LpSolution {
            values,
            objective: incumbent.objective,
            status,
            statistics,
        }
    }
}
