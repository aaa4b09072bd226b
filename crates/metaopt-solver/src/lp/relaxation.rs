//! Realization of the symbolic program as a good_lp LP.

use std::collections::HashMap;

#[cfg(feature = "solver-highs")]
use good_lp::solvers::highs::highs;
use good_lp::solvers::clarabel::clarabel;
use good_lp::{
    constraint, variable, Expression, ProblemVariables, ResolutionError, Solution, SolverModel,
    Variable,
};

use super::{LpEngine, Row, Sense, VarId, VariableRecord};
use crate::term::Polynomial;
use crate::{SolverError, SolverResult};

/// Slack allowed on rows that reduce to a constant.
const CONSTANT_ROW_TOLERANCE: f64 = 1e-9;

pub(crate) enum Relaxation {
    Solved { values: Vec<f64>, objective: f64 },
    Infeasible,
}

/// Borrowed view of an [`super::LpSolver`]'s program.
pub(crate) struct RelaxationProblem<'a> {
    pub(crate) variables: &'a [VariableRecord],
    pub(crate) index: &'a HashMap<VarId, usize>,
    pub(crate) rows: &'a [Row],
    pub(crate) objective: &'a Polynomial<VarId>,
    pub(crate) engine: LpEngine,
}

impl RelaxationProblem<'_> {
    pub(crate) fn root_bounds(&self) -> Vec<(f64, f64)> {
        self.variables.iter().map(|v| (v.lower, v.upper)).collect()
    }

    /// Evaluate a polynomial on a dense value vector.
    pub(crate) fn evaluate(
        &self,
        polynomial: &Polynomial<VarId>,
        values: &[f64],
    ) -> SolverResult<f64> {
        let mut total = 0.0;
        for term in polynomial.terms() {
            term.check_realizable()?;
            total += match term.variable() {
                Some(v) => term.coefficient() * values[self.position(v)?],
                None => term.coefficient(),
            };
        }
        Ok(total)
    }

    /// Solve the LP over `bounds` (one `(lower, upper)` per variable).
    pub(crate) fn solve(&self, bounds: &[(f64, f64)]) -> SolverResult<Relaxation> {
        if bounds.iter().any(|&(lo, hi)| lo > hi) {
            return Ok(Relaxation::Infeasible);
        }
        if !self.constant_rows_hold() {
            return Ok(Relaxation::Infeasible);
        }
        if self.variables.is_empty() {
            return Ok(Relaxation::Solved {
                values: Vec::new(),
                objective: self.objective.constant_part(),
            });
        }

        let mut vars = ProblemVariables::new();
        let handles: Vec<Variable> = bounds
            .iter()
            .map(|&(lower, upper)| {
                let mut definition = variable();
                if lower.is_finite() {
                    definition = definition.min(lower);
                }
                if upper.is_finite() {
                    definition = definition.max(upper);
                }
                vars.add(definition)
            })
            .collect();
        let objective = self.expression(self.objective, &handles)?;

        match self.engine {
            LpEngine::Clarabel => self.run(vars.maximise(objective).using(clarabel), &handles),
            #[cfg(feature = "solver-highs")]
            LpEngine::Highs => self.run(vars.maximise(objective).using(highs), &handles),
        }
    }

    fn run<M>(&self, mut model: M, handles: &[Variable]) -> SolverResult<Relaxation>
    where
        M: SolverModel<Error = ResolutionError>,
    {
        for row in self.rows.iter().filter(|r| !r.expression.is_constant()) {
            let lhs = self.expression(&row.expression, handles)?;
            model = match row.sense {
                Sense::Leq => model.with(constraint!(lhs <= 0.0)),
                Sense::Eq => model.with(constraint!(lhs == 0.0)),
            };
        }

        match model.solve() {
            Ok(solution) => {
                let values: Vec<f64> = handles.iter().map(|h| solution.value(*h)).collect();
                let objective = self.evaluate(self.objective, &values)?;
                Ok(Relaxation::Solved { values, objective })
            }
            Err(ResolutionError::Infeasible) => Ok(Relaxation::Infeasible),
            Err(ResolutionError::Unbounded) => Err(SolverError::InfeasibleOrUnbounded(
                "LP relaxation is unbounded".into(),
            )),
            Err(e) => Err(SolverError::Backend(e.to_string())),
        }
    }

    fn expression(
        &self,
        polynomial: &Polynomial<VarId>,
        handles: &[Variable],
    ) -> SolverResult<Expression> {
        let mut expression = Expression::from(0.0);
        for term in polynomial.terms() {
            term.check_realizable()?;
            match term.variable() {
                Some(v) => expression += term.coefficient() * handles[self.position(v)?],
                None => expression += term.coefficient(),
            }
        }
        Ok(expression)
    }

    fn constant_rows_hold(&self) -> bool {
        self.rows
            .iter()
            .filter(|r| r.expression.is_constant())
            .all(|row| {
                let value = row.expression.constant_part();
                match row.sense {
                    Sense::Leq => value <= CONSTANT_ROW_TOLERANCE,
                    Sense::Eq => value.abs() <= CONSTANT_ROW_TOLERANCE,
                }
            })
    }

    fn position(&self, variable: VarId) -> SolverResult<usize> {
        self.index
            .get(&variable)
            .copied()
            .ok_or_else(|| SolverError::UnknownVariable(variable.to_string()))
    }
}
