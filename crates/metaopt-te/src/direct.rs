//! Direct primal flow encoding.
//!
//! ```text
//! maximize   total_demand_met
//! subject to total_demand_met = Σ_pair f_pair
//!            0 ≤ f_pair ≤ d_pair                       pairs with paths
//!            f_pair = Σ_{p ∈ paths(pair)} f_p,  f_p ≥ 0
//!            Σ_{p ∋ link} f_p ≤ capacity(link)         links used by a path
//!            f_pair = 0 (and d_pair = 0 if symbolic)   pairs without paths
//! ```
//!
//! Pairs whose demand is the constant 0 get no variables at all.

use std::collections::BTreeMap;

use metaopt_core::{CoreError, NodeId, Path};
use metaopt_solver::{Polynomial, SolverCapability, VariableKind};
use tracing::debug;

use crate::config::TeConfig;
use crate::demand_input::DemandInput;
use crate::encoder::{CapacityAwareEncoder, FlowInstance, TrafficEngineeringEncoder};
use crate::encoding::FlowEncoding;
use crate::error::EncodingResult;
use crate::paths::PathMode;

/// Primal feasibility system of a flow instance, before it is committed to
/// a solver.
///
/// Variables are already created on the solver; constraints are not.
/// `inner_*` lists belong to the flow problem itself, `outer_equalities`
/// restrict only the demand polynomials.
#[derive(Debug, Clone)]
pub(crate) struct FlowProgram<V> {
    pub(crate) inner_variables: Vec<V>,
    pub(crate) inner_inequalities: Vec<Polynomial<V>>,
    pub(crate) inner_equalities: Vec<Polynomial<V>>,
    pub(crate) outer_equalities: Vec<Polynomial<V>>,
    pub(crate) encoding: FlowEncoding<V>,
}

impl<V: metaopt_solver::VariableHandle> FlowProgram<V> {
    pub(crate) fn build<S>(
        solver: &mut S,
        instance: &FlowInstance<'_, V>,
        path_mode: PathMode,
    ) -> EncodingResult<Self>
    where
        S: SolverCapability<Var = V>,
    {
        let topology = instance.topology;
        let pairs = topology.node_pairs();
        validate_demands(instance.demands, &pairs)?;

        let mut program = FlowProgram {
            inner_variables: Vec::new(),
            inner_inequalities: Vec::new(),
            inner_equalities: Vec::new(),
            outer_equalities: Vec::new(),
            encoding: FlowEncoding::new(Polynomial::new()),
        };
        let mut pair_flows = Vec::new();
        let mut link_users: BTreeMap<(NodeId, NodeId), Vec<V>> = BTreeMap::new();

        for pair in pairs {
            let demand = instance.demands.require(pair)?.clone();
            program.encoding.demands.insert(pair, demand.clone());

            if demand.is_constant() && demand.constant_part() == 0.0 {
                program
                    .encoding
                    .flows
                    .insert(pair, Polynomial::constant(0.0));
                continue;
            }

            let f_pair = solver.create_variable(
                &format!("flow_{}_{}", pair.src, pair.dst),
                VariableKind::Continuous,
            );
            program.inner_variables.push(f_pair);
            program
                .encoding
                .flows
                .insert(pair, Polynomial::variable(f_pair));
            pair_flows.push(f_pair);

            let paths = path_mode.paths(topology, pair);
            if paths.is_empty() {
                program.inner_equalities.push(Polynomial::variable(f_pair));
                if !demand.is_constant() {
                    program.outer_equalities.push(demand);
                }
                continue;
            }

            program
                .inner_inequalities
                .push(Polynomial::variable(f_pair).negate());
            program
                .inner_inequalities
                .push(Polynomial::variable(f_pair) - demand);

            let mut decomposition = Polynomial::variable(f_pair);
            for path in paths {
                let f_path = solver.create_variable(&path_variable_name(&path), VariableKind::Continuous);
                program.inner_variables.push(f_path);
                program
                    .inner_inequalities
                    .push(Polynomial::variable(f_path).negate());
                decomposition.add_term(metaopt_solver::Term::linear(-1.0, f_path));
                for link in path.links() {
                    link_users.entry(link).or_default().push(f_path);
                }
                program
                    .encoding
                    .path_flows
                    .insert(path, Polynomial::variable(f_path));
            }
            program.inner_equalities.push(decomposition);
        }

        for ((src, dst), users) in &link_users {
            let load = Polynomial::sum_of(users.iter().copied());
            program
                .inner_inequalities
                .push(load - instance.capacity(*src, *dst));
        }

        let total = solver.create_variable("total_demand_met", VariableKind::Continuous);
        program.inner_variables.push(total);
        program
            .inner_equalities
            .push(Polynomial::variable(total) - Polynomial::sum_of(pair_flows));
        program.encoding.objective = Polynomial::variable(total);

        debug!(
            topology = topology.name(),
            variables = program.inner_variables.len(),
            inequalities = program.inner_inequalities.len(),
            equalities = program.inner_equalities.len(),
            paths = program.encoding.path_flows.len(),
            "flow program built"
        );
        Ok(program)
    }
}

fn path_variable_name(path: &Path) -> String {
    let nodes: Vec<String> = path.nodes().iter().map(|n| n.to_string()).collect();
    format!("path_flow_{}", nodes.join("_"))
}

/// Every pair present and no negative constant demand, checked before any
/// variable is created.
fn validate_demands<V: metaopt_solver::VariableHandle>(
    demands: &DemandInput<V>,
    pairs: &[metaopt_core::NodePair],
) -> EncodingResult<()> {
    for &pair in pairs {
        let demand = demands.require(pair)?;
        if demand.is_constant() {
            let value = demand.constant_part();
            if !value.is_finite() || value < 0.0 {
                return Err(CoreError::InvalidDemand { pair, value }.into());
            }
        }
        demand.check_realizable()?;
    }
    Ok(())
}

/// Primal flow encoder: maximizes total demand met subject to path
/// decomposition and link capacities.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirectFlowEncoder {
    path_mode: PathMode,
}

impl DirectFlowEncoder {
    pub fn new(path_mode: PathMode) -> Self {
        Self { path_mode }
    }

    pub fn from_config(config: &TeConfig) -> Self {
        Self::new(config.path_mode())
    }

    pub fn path_mode(&self) -> PathMode {
        self.path_mode
    }
}

impl<S: SolverCapability> TrafficEngineeringEncoder<S> for DirectFlowEncoder {
    fn name(&self) -> &str {
        "direct"
    }

    fn encode(
        &self,
        solver: &mut S,
        topology: &metaopt_core::Topology,
        demands: &DemandInput<S::Var>,
    ) -> EncodingResult<FlowEncoding<S::Var>> {
        self.encode_instance(solver, &FlowInstance::new(topology, demands))
    }
}

impl<S: SolverCapability> CapacityAwareEncoder<S> for DirectFlowEncoder {
    fn encode_instance(
        &self,
        solver: &mut S,
        instance: &FlowInstance<'_, S::Var>,
    ) -> EncodingResult<FlowEncoding<S::Var>> {
        let program = FlowProgram::build(solver, instance, self.path_mode)?;
        for p in program.outer_equalities {
            solver.add_eq_zero(p)?;
        }
        for p in program.inner_inequalities {
            solver.add_leq_zero(p)?;
        }
        for p in program.inner_equalities {
            solver.add_eq_zero(p)?;
        }
        solver.set_objective(program.encoding.objective.clone())?;
        Ok(program.encoding)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use metaopt_core::{DemandMap, NodePair, Topology};
    use metaopt_solver::{LpSolver, LpSolverConfig};

    fn n(i: usize) -> NodeId {
        NodeId::new(i)
    }

    fn pair(s: usize, d: usize) -> NodePair {
        NodePair::new(n(s), n(d))
    }

    fn line() -> Topology {
        let mut t = Topology::new("line");
        for i in 0..3 {
            t.add_node(n(i));
        }
        t.add_link(n(0), n(1), 10.0).unwrap();
        t.add_link(n(1), n(2), 5.0).unwrap();
        t
    }

    #[test]
    fn test_program_shape() {
        let t = line();
        let demands: DemandMap = [(pair(0, 1), 0.0), (pair(1, 2), 2.0), (pair(0, 2), 8.0)]
            .into_iter()
            .collect();
        let mut solver = LpSolver::new(LpSolverConfig::new(100.0)).unwrap();
        let input = DemandInput::fixed(&demands, &t).unwrap();
        let instance = FlowInstance::new(&t, &input);
        let program = FlowProgram::build(&mut solver, &instance, PathMode::KShortest(2)).unwrap();

        // (0,1) has zero demand and every unreachable pair is a constant 0.
        assert_eq!(program.encoding.path_flows.len(), 2);
        // f_12, f_02, two path flows, total
        assert_eq!(program.inner_variables.len(), 5);
        // 2 per pair, 1 per path, 2 capacity rows
        assert_eq!(program.inner_inequalities.len(), 2 * 2 + 2 + 2);
        assert!(program.outer_equalities.is_empty());
    }

    #[test]
    fn test_negative_constant_demand_rejected_before_variables() {
        let t = line();
        let input = DemandInput::from_polynomials(
            t.node_pairs()
                .into_iter()
                .map(|p| (p, Polynomial::constant(if p == pair(0, 1) { -1.0 } else { 0.0 }), None)),
        );
        let mut solver = LpSolver::new(LpSolverConfig::new(100.0)).unwrap();
        let err = DirectFlowEncoder::new(PathMode::KShortest(1))
            .encode(&mut solver, &t, &input)
            .unwrap_err();
        assert!(matches!(
            err,
            crate::EncodingError::Core(CoreError::InvalidDemand { .. })
        ));
        assert_eq!(solver.num_variables(), 0);
        assert_eq!(solver.num_constraints(), 0);
    }
}
