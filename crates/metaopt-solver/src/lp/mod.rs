//! good_lp-backed implementation of [`SolverCapability`].
//!
//! [`LpSolver`] records variables, constraints and the objective
//! symbolically. [`SolverCapability::maximize`] realizes them as good_lp LP
//! relaxations (clarabel by default, HiGHS with the `solver-highs` feature)
//! and runs a depth-first branch-and-bound over the binary variables.
//!
//! # Disjunctions
//!
//! `p1 = 0 ∨ p2 = 0` is lowered with an auxiliary binary `b` and the
//! configured Big-M:
//!
//! ```text
//! -M·b       ≤ p1 ≤ M·b
//! -M·(1 - b) ≤ p2 ≤ M·(1 - b)
//! ```
//!
//! `M` must bound `|p1|` and `|p2|` over every assignment of interest; a
//! smaller value silently cuts off feasible points.

mod branch;
mod relaxation;

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::capability::{SolverCapability, VariableKind};
use crate::monitor::{CompositeMonitor, SearchMonitor};
use crate::outcome::{SearchStatistics, SolveStatus};
use crate::term::Polynomial;
use crate::{SolverError, SolverResult};

use branch::BranchAndBound;
use relaxation::RelaxationProblem;

static NEXT_VARIABLE_ID: AtomicU64 = AtomicU64::new(0);

/// Process-unique variable handle.
///
/// Identifiers never repeat across solver instances, so instances can be
/// merged with [`SolverCapability::combine`] without renaming.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VarId(u64);

impl VarId {
    fn fresh() -> Self {
        VarId(NEXT_VARIABLE_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for VarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "x{}", self.0)
    }
}

/// LP engine used for relaxations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LpEngine {
    #[default]
    Clarabel,
    #[cfg(feature = "solver-highs")]
    Highs,
}

const AVAILABLE_LP_ENGINES: &[&str] = &[
    "clarabel",
    #[cfg(feature = "solver-highs")]
    "highs",
];

impl LpEngine {
    pub fn available() -> &'static [&'static str] {
        AVAILABLE_LP_ENGINES
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LpEngine::Clarabel => "clarabel",
            #[cfg(feature = "solver-highs")]
            LpEngine::Highs => "highs",
        }
    }
}

impl FromStr for LpEngine {
    type Err = SolverError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "clarabel" => Ok(LpEngine::Clarabel),
            #[cfg(feature = "solver-highs")]
            "highs" => Ok(LpEngine::Highs),
            other => Err(SolverError::Config(format!(
                "unknown lp engine '{}'; supported values: {}",
                other,
                LpEngine::available().join(", ")
            ))),
        }
    }
}

fn default_integrality_tolerance() -> f64 {
    1e-6
}

fn default_optimality_tolerance() -> f64 {
    1e-6
}

fn default_max_nodes() -> u64 {
    100_000
}

/// Backend configuration. `disjunction_big_m` has no default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LpSolverConfig {
    /// Big-M used to lower `p1 = 0 ∨ p2 = 0`
    pub disjunction_big_m: f64,
    /// A binary within this distance of 0 or 1 counts as integral
    #[serde(default = "default_integrality_tolerance")]
    pub integrality_tolerance: f64,
    /// Relative gap below which a node cannot improve the incumbent
    #[serde(default = "default_optimality_tolerance")]
    pub optimality_tolerance: f64,
    /// Node budget; the search terminates early when it is spent
    #[serde(default = "default_max_nodes")]
    pub max_nodes: u64,
    #[serde(default)]
    pub engine: LpEngine,
}

impl LpSolverConfig {
    pub fn new(disjunction_big_m: f64) -> Self {
        Self {
            disjunction_big_m,
            integrality_tolerance: default_integrality_tolerance(),
            optimality_tolerance: default_optimality_tolerance(),
            max_nodes: default_max_nodes(),
            engine: LpEngine::default(),
        }
    }

    pub fn with_engine(mut self, engine: LpEngine) -> Self {
        self.engine = engine;
        self
    }

    pub fn with_max_nodes(mut self, max_nodes: u64) -> Self {
        self.max_nodes = max_nodes;
        self
    }

    pub fn validate(&self) -> SolverResult<()> {
        if !self.disjunction_big_m.is_finite() || self.disjunction_big_m <= 0.0 {
            return Err(SolverError::Config(format!(
                "disjunction_big_m must be positive and finite, got {}",
                self.disjunction_big_m
            )));
        }
        for (name, value) in [
            ("integrality_tolerance", self.integrality_tolerance),
            ("optimality_tolerance", self.optimality_tolerance),
        ] {
            if !value.is_finite() || value < 0.0 || value >= 0.5 {
                return Err(SolverError::Config(format!(
                    "{name} must lie in [0, 0.5), got {value}"
                )));
            }
        }
        if self.max_nodes == 0 {
            return Err(SolverError::Config("max_nodes must be at least 1".into()));
        }
        Ok(())
    }

    fn describe(&self) -> String {
        format!(
            "lp/{} (big-M {})",
            self.engine.as_str(),
            self.disjunction_big_m
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Sense {
    Leq,
    Eq,
}

#[derive(Debug, Clone)]
pub(crate) struct Row {
    pub(crate) expression: Polynomial<VarId>,
    pub(crate) sense: Sense,
}

#[derive(Debug, Clone)]
pub(crate) struct VariableRecord {
    pub(crate) id: VarId,
    pub(crate) name: String,
    pub(crate) kind: VariableKind,
    pub(crate) lower: f64,
    pub(crate) upper: f64,
}

/// Assignment returned by [`LpSolver`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LpSolution {
    values: HashMap<VarId, f64>,
    objective: f64,
    status: SolveStatus,
    statistics: SearchStatistics,
}

impl LpSolution {
    pub fn value(&self, variable: VarId) -> Option<f64> {
        self.values.get(&variable).copied()
    }

    pub fn objective(&self) -> f64 {
        self.objective
    }

    pub fn status(&self) -> &SolveStatus {
        &self.status
    }

    pub fn is_optimal(&self) -> bool {
        self.status.is_optimal()
    }

    pub fn statistics(&self) -> &SearchStatistics {
        &self.statistics
    }
}

/// Symbolic MILP with a branch-and-bound solve.
#[derive(Debug)]
pub struct LpSolver {
    config: LpSolverConfig,
    variables: Vec<VariableRecord>,
    index: HashMap<VarId, usize>,
    rows: Vec<Row>,
    objective: Polynomial<VarId>,
    disjunctions: usize,
    monitor: CompositeMonitor,
}

impl LpSolver {
    pub fn new(config: LpSolverConfig) -> SolverResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            variables: Vec::new(),
            index: HashMap::new(),
            rows: Vec::new(),
            objective: Polynomial::new(),
            disjunctions: 0,
            monitor: CompositeMonitor::new(),
        })
    }

    pub fn config(&self) -> &LpSolverConfig {
        &self.config
    }

    pub fn num_variables(&self) -> usize {
        self.variables.len()
    }

    pub fn num_binary_variables(&self) -> usize {
        self.variables
            .iter()
            .filter(|v| v.kind == VariableKind::Binary)
            .count()
    }

    pub fn num_constraints(&self) -> usize {
        self.rows.len()
    }

    pub fn num_disjunctions(&self) -> usize {
        self.disjunctions
    }

    pub fn contains(&self, variable: VarId) -> bool {
        self.index.contains_key(&variable)
    }

    pub fn variable_name(&self, variable: VarId) -> Option<&str> {
        self.index
            .get(&variable)
            .map(|&i| self.variables[i].name.as_str())
    }

    pub fn variable_kind(&self, variable: VarId) -> Option<VariableKind> {
        self.index.get(&variable).map(|&i| self.variables[i].kind)
    }

    pub fn objective(&self) -> &Polynomial<VarId> {
        &self.objective
    }

    /// Attach a monitor to every subsequent solve.
    pub fn add_monitor<M>(&mut self, monitor: M)
    where
        M: SearchMonitor + 'static,
    {
        self.monitor.add_monitor(monitor);
    }

    fn push_variable(&mut self, name: &str, kind: VariableKind, lower: f64, upper: f64) -> VarId {
        let id = VarId::fresh();
        let (lower, upper) = match kind {
            VariableKind::Continuous => (lower, upper),
            VariableKind::Binary => (lower.max(0.0), upper.min(1.0)),
        };
        self.index.insert(id, self.variables.len());
        self.variables.push(VariableRecord {
            id,
            name: name.to_string(),
            kind,
            lower,
            upper,
        });
        id
    }

    fn check_owned(&self, polynomial: &Polynomial<VarId>) -> SolverResult<()> {
        polynomial.check_realizable()?;
        match polynomial.variables().into_iter().find(|v| !self.contains(*v)) {
            Some(unknown) => Err(SolverError::UnknownVariable(unknown.to_string())),
            None => Ok(()),
        }
    }

    fn push_row(&mut self, expression: Polynomial<VarId>, sense: Sense) -> SolverResult<()> {
        self.check_owned(&expression)?;
        self.rows.push(Row { expression, sense });
        Ok(())
    }
}

impl SolverCapability for LpSolver {
    type Var = VarId;
    type Solution = LpSolution;

    fn backend_name(&self) -> String {
        self.config.describe()
    }

    fn create_variable(&mut self, name: &str, kind: VariableKind) -> VarId {
        self.push_variable(name, kind, f64::NEG_INFINITY, f64::INFINITY)
    }

    fn create_bounded_variable(
        &mut self,
        name: &str,
        kind: VariableKind,
        lower: f64,
        upper: f64,
    ) -> SolverResult<VarId> {
        if lower.is_nan() || upper.is_nan() || lower > upper {
            return Err(SolverError::Config(format!(
                "invalid bounds [{lower}, {upper}] for variable '{name}'"
            )));
        }
        Ok(self.push_variable(name, kind, lower, upper))
    }

    fn add_leq_zero(&mut self, polynomial: Polynomial<VarId>) -> SolverResult<()> {
        self.push_row(polynomial, Sense::Leq)
    }

    fn add_eq_zero(&mut self, polynomial: Polynomial<VarId>) -> SolverResult<()> {
        self.push_row(polynomial, Sense::Eq)
    }

    fn add_one_of_two_zero(
        &mut self,
        first: Polynomial<VarId>,
        second: Polynomial<VarId>,
    ) -> SolverResult<()> {
        self.check_owned(&first)?;
        self.check_owned(&second)?;
        let m = self.config.disjunction_big_m;
        let name = format!("disjunction_{}", self.disjunctions);
        let b = self.push_variable(&name, VariableKind::Binary, 0.0, 1.0);
        let big_m_b = Polynomial::variable(b) * m;

        // |first| ≤ M·b
        self.push_row(first.clone() - big_m_b.clone(), Sense::Leq)?;
        self.push_row(first.negate() - big_m_b.clone(), Sense::Leq)?;
        // |second| ≤ M·(1 - b)
        self.push_row(second.clone() + big_m_b.clone() - m, Sense::Leq)?;
        self.push_row(second.negate() + big_m_b - m, Sense::Leq)?;

        self.disjunctions += 1;
        Ok(())
    }

    fn set_objective(&mut self, objective: Polynomial<VarId>) -> SolverResult<()> {
        self.check_owned(&objective)?;
        self.objective = objective;
        Ok(())
    }

    fn maximize(&mut self) -> SolverResult<LpSolution> {
        debug!(
            variables = self.variables.len(),
            binaries = self.num_binary_variables(),
            constraints = self.rows.len(),
            engine = self.config.engine.as_str(),
            "starting branch-and-bound"
        );
        let problem = RelaxationProblem {
            variables: &self.variables,
            index: &self.index,
            rows: &self.rows,
            objective: &self.objective,
            engine: self.config.engine,
        };
        BranchAndBound::new(problem, &self.config).run(&mut self.monitor)
    }

    fn get_value(&self, solution: &LpSolution, variable: VarId) -> SolverResult<f64> {
        solution
            .value(variable)
            .ok_or_else(|| SolverError::UnknownVariable(variable.to_string()))
    }

    /// Monitors attached to `other` are dropped; only this instance's
    /// monitors observe later solves.
    fn combine(&mut self, other: LpSolver) -> SolverResult<()> {
        if self.config.engine != other.config.engine
            || self.config.disjunction_big_m != other.config.disjunction_big_m
        {
            return Err(SolverError::IncompatibleSolver {
                expected: self.backend_name(),
                found: other.backend_name(),
            });
        }
        let known: HashSet<VarId> = self.index.keys().copied().collect();
        for record in other.variables {
            if !known.contains(&record.id) {
                self.index.insert(record.id, self.variables.len());
                self.variables.push(record);
            }
        }
        self.rows.extend(other.rows);
        self.disjunctions += other.disjunctions;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solver() -> LpSolver {
        LpSolver::new(LpSolverConfig::new(100.0)).unwrap()
    }

    #[test]
    fn test_config_requires_positive_big_m() {
        assert!(matches!(
            LpSolver::new(LpSolverConfig::new(0.0)),
            Err(SolverError::Config(_))
        ));
        assert!(LpSolverConfig::new(f64::INFINITY).validate().is_err());
    }

    #[test]
    fn test_config_big_m_is_required_in_toml() {
        let err = toml::from_str::<LpSolverConfig>("max_nodes = 10");
        assert!(err.is_err());
        let config: LpSolverConfig = toml::from_str("disjunction_big_m = 50.0").unwrap();
        assert_eq!(config.disjunction_big_m, 50.0);
        assert_eq!(config.engine, LpEngine::Clarabel);
        assert_eq!(config.max_nodes, 100_000);
    }

    #[test]
    fn test_engine_from_str() {
        assert_eq!("Clarabel".parse::<LpEngine>().unwrap(), LpEngine::Clarabel);
        assert!("gurobi".parse::<LpEngine>().is_err());
    }

    #[test]
    fn test_variable_ids_are_unique_across_instances() {
        let mut a = solver();
        let mut b = solver();
        let x = a.create_variable("x", VariableKind::Continuous);
        let y = b.create_variable("x", VariableKind::Continuous);
        assert_ne!(x, y);
    }

    #[test]
    fn test_foreign_variable_rejected() {
        let mut a = solver();
        let mut b = solver();
        let y = b.create_variable("y", VariableKind::Continuous);
        assert!(matches!(
            a.add_leq_zero(Polynomial::variable(y)),
            Err(SolverError::UnknownVariable(_))
        ));
    }

    #[test]
    fn test_disjunction_adds_binary_and_four_rows() {
        let mut s = solver();
        let x = s.create_variable("x", VariableKind::Continuous);
        let y = s.create_variable("y", VariableKind::Continuous);
        s.add_one_of_two_zero(Polynomial::variable(x), Polynomial::variable(y))
            .unwrap();
        assert_eq!(s.num_binary_variables(), 1);
        assert_eq!(s.num_constraints(), 4);
        assert_eq!(s.num_disjunctions(), 1);
    }

    #[test]
    fn test_combine_rejects_different_big_m() {
        let mut a = solver();
        let b = LpSolver::new(LpSolverConfig::new(5.0)).unwrap();
        assert!(matches!(
            a.combine(b),
            Err(SolverError::IncompatibleSolver { .. })
        ));
    }

    #[test]
    fn test_combine_merges_variables_and_rows() {
        let mut a = solver();
        let mut b = solver();
        let y = b.create_variable("y", VariableKind::Binary);
        b.add_leq_zero(Polynomial::variable(y) - 1.0).unwrap();
        a.combine(b).unwrap();
        assert!(a.contains(y));
        assert_eq!(a.num_constraints(), 1);
        assert_eq!(a.variable_kind(y), Some(VariableKind::Binary));
        a.add_geq_zero(Polynomial::variable(y)).unwrap();
    }

    #[test]
    fn test_bounded_variable_rejects_inverted_bounds() {
        let mut s = solver();
        assert!(s
            .create_bounded_variable("x", VariableKind::Continuous, 2.0, 1.0)
            .is_err());
    }
}
