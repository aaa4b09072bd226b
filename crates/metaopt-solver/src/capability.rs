//! Backend-agnostic constraint-building contract.
//!
//! Encoders never talk to an optimization engine directly. They create
//! variables, register `p ≤ 0`, `p = 0` and `p1 = 0 ∨ p2 = 0` constraints,
//! declare a maximization objective and read back values, all through
//! [`SolverCapability`]. Minimization is expressed by maximizing the negated
//! objective.

use serde::{Deserialize, Serialize};

use crate::term::{Polynomial, VariableHandle};
use crate::SolverResult;

/// Domain of a decision variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariableKind {
    #[default]
    Continuous,
    /// `{0, 1}`
    Binary,
}

/// The eight operations every backend provides, plus derived helpers.
pub trait SolverCapability {
    /// Opaque variable identity.
    type Var: VariableHandle;
    /// Assignment returned by [`SolverCapability::maximize`].
    type Solution;

    /// Short name of the backend kind, used in `IncompatibleSolver` errors.
    fn backend_name(&self) -> String;

    /// Fresh variable, unique within this backend.
    fn create_variable(&mut self, name: &str, kind: VariableKind) -> Self::Var;

    /// Register `polynomial ≤ 0`.
    fn add_leq_zero(&mut self, polynomial: Polynomial<Self::Var>) -> SolverResult<()>;

    /// Register `polynomial = 0`.
    fn add_eq_zero(&mut self, polynomial: Polynomial<Self::Var>) -> SolverResult<()>;

    /// Register the disjunction `first = 0 ∨ second = 0`.
    fn add_one_of_two_zero(
        &mut self,
        first: Polynomial<Self::Var>,
        second: Polynomial<Self::Var>,
    ) -> SolverResult<()>;

    /// Replace the maximization objective.
    fn set_objective(&mut self, objective: Polynomial<Self::Var>) -> SolverResult<()>;

    /// Solve. Duration depends on the backend and the instance.
    fn maximize(&mut self) -> SolverResult<Self::Solution>;

    fn get_value(&self, solution: &Self::Solution, variable: Self::Var) -> SolverResult<f64>;

    /// Merge the variables and constraints of another instance of the same
    /// backend kind. The objective and any monitors attached to `other` are
    /// discarded.
    fn combine(&mut self, other: Self) -> SolverResult<()>
    where
        Self: Sized;

    /// Variable with `lower ≤ v ≤ upper`; infinite bounds are omitted.
    fn create_bounded_variable(
        &mut self,
        name: &str,
        kind: VariableKind,
        lower: f64,
        upper: f64,
    ) -> SolverResult<Self::Var> {
        let variable = self.create_variable(name, kind);
        if lower.is_finite() {
            self.add_leq_zero(Polynomial::constant(lower) - Polynomial::variable(variable))?;
        }
        if upper.is_finite() {
            self.add_leq_zero(Polynomial::variable(variable) - upper)?;
        }
        Ok(variable)
    }

    /// Register `polynomial ≥ 0`.
    fn add_geq_zero(&mut self, polynomial: Polynomial<Self::Var>) -> SolverResult<()> {
        self.add_leq_zero(polynomial.negate())
    }

    /// Register `lhs ≤ rhs`.
    fn add_leq(
        &mut self,
        lhs: Polynomial<Self::Var>,
        rhs: Polynomial<Self::Var>,
    ) -> SolverResult<()> {
        self.add_leq_zero(lhs - rhs)
    }

    /// Register `lhs = rhs`.
    fn add_eq(&mut self, lhs: Polynomial<Self::Var>, rhs: Polynomial<Self::Var>) -> SolverResult<()> {
        self.add_eq_zero(lhs - rhs)
    }

    /// Value of a polynomial under a solution.
    fn evaluate(
        &self,
        solution: &Self::Solution,
        polynomial: &Polynomial<Self::Var>,
    ) -> SolverResult<f64> {
        polynomial.check_realizable()?;
        let mut result = 0.0;
        for term in polynomial.terms() {
            result += match term.variable() {
                Some(v) => term.coefficient() * self.get_value(solution, v)?,
                None => term.coefficient(),
            };
        }
        Ok(result)
    }
}
