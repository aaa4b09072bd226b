//! KKT reformulation of an inner linear program.
//!
//! For an inner problem `max f(x)` subject to `g_i(x) ≤ 0` and `h_j(x) = 0`,
//! where `x` are the declared inner variables and every other variable is
//! treated as a parameter, the optimal points are exactly the assignments
//! satisfying:
//!
//! ```text
//! g_i(x) ≤ 0,  h_j(x) = 0                          primal feasibility
//! 0 ≤ λ_i ≤ M,  -M ≤ ν_j ≤ M                       bounded duals
//! λ_i = 0  or  g_i(x) = 0                          complementary slackness
//! ∂f/∂x_k − Σ_i λ_i ∂g_i/∂x_k − Σ_j ν_j ∂h_j/∂x_k = 0   for every inner x_k
//! ```
//!
//! Stationarity is emitted once per inner variable; each row only sees the
//! part of a constraint restricted to the inner variables. The bound `M`
//! must dominate every true dual value, otherwise optima are cut off.

use std::collections::{BTreeMap, HashSet};

use metaopt_core::Topology;
use metaopt_solver::{Polynomial, SolverCapability, Term, VariableHandle, VariableKind};
use tracing::debug;

use crate::config::TeConfig;
use crate::demand_input::DemandInput;
use crate::direct::FlowProgram;
use crate::encoder::{CapacityAwareEncoder, FlowInstance, TrafficEngineeringEncoder};
use crate::encoding::FlowEncoding;
use crate::error::{EncodingError, EncodingResult};
use crate::paths::PathMode;

/// Counts of what [`KktSystem::finalize`] emitted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KktReport {
    /// Multipliers of inequalities, each with one complementarity disjunction
    pub inequality_duals: usize,
    pub equality_duals: usize,
    pub stationarity_rows: usize,
    /// Constraints without inner variables, added as plain rows
    pub parameter_rows: usize,
}

/// Inner feasibility system awaiting reformulation.
#[derive(Debug, Clone)]
pub struct KktSystem<V> {
    dual_bound: f64,
    inner: Vec<V>,
    inner_set: HashSet<V>,
    inequalities: Vec<Polynomial<V>>,
    equalities: Vec<Polynomial<V>>,
}

impl<V: VariableHandle> KktSystem<V> {
    pub fn new(dual_bound: f64) -> EncodingResult<Self> {
        if !dual_bound.is_finite() || dual_bound <= 0.0 {
            return Err(EncodingError::Config(format!(
                "dual bound must be positive and finite, got {dual_bound}"
            )));
        }
        Ok(Self {
            dual_bound,
            inner: Vec::new(),
            inner_set: HashSet::new(),
            inequalities: Vec::new(),
            equalities: Vec::new(),
        })
    }

    pub fn dual_bound(&self) -> f64 {
        self.dual_bound
    }

    /// Declare a variable owned by the inner problem.
    pub fn add_inner_variable(&mut self, variable: V) {
        if self.inner_set.insert(variable) {
            self.inner.push(variable);
        }
    }

    pub fn inner_variables(&self) -> &[V] {
        &self.inner
    }

    /// Inner constraint `polynomial ≤ 0`.
    pub fn add_leq_zero(&mut self, polynomial: Polynomial<V>) {
        self.inequalities.push(polynomial);
    }

    /// Inner constraint `polynomial = 0`.
    pub fn add_eq_zero(&mut self, polynomial: Polynomial<V>) {
        self.equalities.push(polynomial);
    }

    fn touches_inner(&self, polynomial: &Polynomial<V>) -> bool {
        polynomial
            .variables()
            .iter()
            .any(|v| self.inner_set.contains(v))
    }

    /// Emit primal rows, duals, complementarity and stationarity on
    /// `solver`. `objective` is the inner objective; only its inner part
    /// contributes to stationarity.
    pub fn finalize<S>(self, solver: &mut S, objective: &Polynomial<V>) -> EncodingResult<KktReport>
    where
        S: SolverCapability<Var = V>,
    {
        let mut report = KktReport::default();
        let inner_objective = objective.restrict_to(&self.inner_set);
        let mut stationarity: BTreeMap<V, Polynomial<V>> = self
            .inner
            .iter()
            .map(|&x| {
                (
                    x,
                    Polynomial::constant(inner_objective.partial_derivative(x)),
                )
            })
            .collect();

        for (i, g) in self.inequalities.iter().enumerate() {
            if !self.touches_inner(g) {
                solver.add_leq_zero(g.clone())?;
                report.parameter_rows += 1;
                continue;
            }
            let lambda = solver.create_bounded_variable(
                &format!("kkt_lambda_{i}"),
                VariableKind::Continuous,
                0.0,
                self.dual_bound,
            )?;
            solver.add_leq_zero(g.clone())?;
            solver.add_one_of_two_zero(Polynomial::variable(lambda), g.clone())?;
            accumulate(&mut stationarity, &g.restrict_to(&self.inner_set), lambda);
            report.inequality_duals += 1;
        }

        for (j, h) in self.equalities.iter().enumerate() {
            if !self.touches_inner(h) {
                solver.add_eq_zero(h.clone())?;
                report.parameter_rows += 1;
                continue;
            }
            let nu = solver.create_bounded_variable(
                &format!("kkt_nu_{j}"),
                VariableKind::Continuous,
                -self.dual_bound,
                self.dual_bound,
            )?;
            solver.add_eq_zero(h.clone())?;
            accumulate(&mut stationarity, &h.restrict_to(&self.inner_set), nu);
            report.equality_duals += 1;
        }

        for (_, row) in stationarity {
            solver.add_eq_zero(row)?;
            report.stationarity_rows += 1;
        }

        debug!(
            inequality_duals = report.inequality_duals,
            equality_duals = report.equality_duals,
            stationarity_rows = report.stationarity_rows,
            parameter_rows = report.parameter_rows,
            "KKT system emitted"
        );
        Ok(report)
    }
}

/// Subtract `multiplier · ∂constraint/∂x` from the stationarity row of every
/// inner variable the constraint references.
fn accumulate<V: VariableHandle>(
    stationarity: &mut BTreeMap<V, Polynomial<V>>,
    restricted: &Polynomial<V>,
    multiplier: V,
) {
    for x in restricted.variables() {
        let slope = restricted.partial_derivative(x);
        if slope == 0.0 {
            continue;
        }
        if let Some(row) = stationarity.get_mut(&x) {
            row.add_term(Term::linear(-slope, multiplier));
        }
    }
}

/// Flow encoder whose feasible set is the set of optimal flows.
///
/// The flow variables are inner; demands (constant or symbolic) are
/// parameters, so an outer problem may choose demands while the flows stay
/// optimal for them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KktFlowEncoder {
    path_mode: PathMode,
    dual_bound: f64,
}

impl KktFlowEncoder {
    pub fn new(path_mode: PathMode, dual_bound: f64) -> EncodingResult<Self> {
        if !dual_bound.is_finite() || dual_bound <= 0.0 {
            return Err(EncodingError::Config(format!(
                "dual bound must be positive and finite, got {dual_bound}"
            )));
        }
        Ok(Self {
            path_mode,
            dual_bound,
        })
    }

    pub fn from_config(config: &TeConfig) -> EncodingResult<Self> {
        Self::new(config.path_mode(), config.kkt.dual_bound)
    }

    pub fn dual_bound(&self) -> f64 {
        self.dual_bound
    }
}

impl<S: SolverCapability> TrafficEngineeringEncoder<S> for KktFlowEncoder {
    fn name(&self) -> &str {
        "kkt"
    }

    fn encode(
        &self,
        solver: &mut S,
        topology: &Topology,
        demands: &DemandInput<S::Var>,
    ) -> EncodingResult<FlowEncoding<S::Var>> {
        self.encode_instance(solver, &FlowInstance::new(topology, demands))
    }
}

impl<S: SolverCapability> CapacityAwareEncoder<S> for KktFlowEncoder {
    fn encode_instance(
        &self,
        solver: &mut S,
        instance: &FlowInstance<'_, S::Var>,
    ) -> EncodingResult<FlowEncoding<S::Var>> {
        let program = FlowProgram::build(solver, instance, self.path_mode)?;
        for p in program.outer_equalities {
            solver.add_eq_zero(p)?;
        }

        let mut system = KktSystem::new(self.dual_bound)?;
        for &x in &program.inner_variables {
            system.add_inner_variable(x);
        }
        for g in program.inner_inequalities {
            system.add_leq_zero(g);
        }
        for h in program.inner_equalities {
            system.add_eq_zero(h);
        }
        system.finalize(solver, &program.encoding.objective)?;

        solver.set_objective(program.encoding.objective.clone())?;
        Ok(program.encoding)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use metaopt_solver::{LpSolver, LpSolverConfig};

    #[test]
    fn test_invalid_dual_bound() {
        assert!(KktSystem::<metaopt_solver::VarId>::new(0.0).is_err());
        assert!(KktFlowEncoder::new(PathMode::KShortest(1), f64::NAN).is_err());
    }

    #[test]
    fn test_finalize_counts() {
        let mut solver = LpSolver::new(LpSolverConfig::new(100.0)).unwrap();
        let x = solver.create_variable("x", VariableKind::Continuous);
        let p = solver.create_variable("p", VariableKind::Continuous);

        let mut system = KktSystem::new(10.0).unwrap();
        system.add_inner_variable(x);
        system.add_inner_variable(x);
        // x ≤ p, x ≥ 0, p ≤ 3
        system.add_leq_zero(Polynomial::variable(x) - Polynomial::variable(p));
        system.add_leq_zero(Polynomial::variable(x).negate());
        system.add_leq_zero(Polynomial::variable(p) - 3.0);
        let report = system
            .finalize(&mut solver, &Polynomial::variable(x))
            .unwrap();

        assert_eq!(report.inequality_duals, 2);
        assert_eq!(report.parameter_rows, 1);
        assert_eq!(report.stationarity_rows, 1);
        assert_eq!(solver.num_disjunctions(), 2);
    }

    #[test]
    fn test_single_variable_inner_problem_is_forced_to_optimum() {
        // inner: max x s.t. x ≤ p, x ≥ 0; outer picks p = 3 and minimizes x
        let mut solver = LpSolver::new(LpSolverConfig::new(100.0)).unwrap();
        let x = solver.create_variable("x", VariableKind::Continuous);
        let p = solver.create_variable("p", VariableKind::Continuous);
        solver
            .add_eq_zero(Polynomial::variable(p) - 3.0)
            .unwrap();

        let mut system = KktSystem::new(10.0).unwrap();
        system.add_inner_variable(x);
        system.add_leq_zero(Polynomial::variable(x) - Polynomial::variable(p));
        system.add_leq_zero(Polynomial::variable(x).negate());
        system
            .finalize(&mut solver, &Polynomial::variable(x))
            .unwrap();

        solver
            .set_objective(Polynomial::variable(x).negate())
            .unwrap();
        let solution = solver.maximize().unwrap();
        assert!((solution.value(x).unwrap() - 3.0).abs() < 1e-4);
    }
}
