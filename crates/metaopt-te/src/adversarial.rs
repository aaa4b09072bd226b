//! Gap objectives and adversarial input minimization.
//!
//! A gap encoding places an optimal encoder and a heuristic encoder over the
//! same demand variables on one solver; maximizing `optimal − heuristic`
//! searches for the demands on which the heuristic falls furthest behind.
//! The heuristic side must be encoded so that its flows are forced to be
//! optimal for the heuristic (KKT), otherwise the outer maximization just
//! drives them to zero.

use std::collections::BTreeMap;

use metaopt_core::{NodePair, Topology};
use metaopt_solver::{Polynomial, SolverCapability, VariableKind};
use tracing::debug;

use crate::demand_input::DemandInput;
use crate::encoding::FlowEncoding;
use crate::error::{EncodingError, EncodingResult};
use crate::paths::PathMode;

/// `optimal − heuristic` plus both encodings it is built from.
#[derive(Debug, Clone)]
pub struct GapEncoding<V> {
    pub objective: Polynomial<V>,
    pub optimal: FlowEncoding<V>,
    pub heuristic: FlowEncoding<V>,
}

/// Combine two encodings on `solver` into a gap objective and set it.
pub fn encode_gap<S>(
    solver: &mut S,
    optimal: FlowEncoding<S::Var>,
    heuristic: FlowEncoding<S::Var>,
) -> EncodingResult<GapEncoding<S::Var>>
where
    S: SolverCapability,
{
    let objective = optimal.objective.clone() - heuristic.objective.clone();
    solver.set_objective(objective.clone())?;
    Ok(GapEncoding {
        objective,
        optimal,
        heuristic,
    })
}

/// Output of [`AdversarialInputMinimizer::encode`].
#[derive(Debug, Clone)]
pub struct AdversarialEncoding<V> {
    /// Binary `x_pair` per symbolic demand; `x_pair = 0` forces the demand to 0
    pub indicators: BTreeMap<NodePair, V>,
    /// `−Σ x_pair` minus the count of fixed nonzero demands
    pub objective: Polynomial<V>,
}

impl<V: metaopt_solver::VariableHandle> AdversarialEncoding<V> {
    /// Number of nonzero demands in a solution.
    pub fn nonzero_count<S>(&self, solver: &S, solution: &S::Solution) -> EncodingResult<usize>
    where
        S: SolverCapability<Var = V>,
    {
        let value = solver.evaluate(solution, &self.objective)?;
        Ok((-value).round().max(0.0) as usize)
    }
}

/// Fewest nonzero demands that still produce a gap of at least
/// `desired_gap`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdversarialInputMinimizer {
    desired_gap: f64,
    num_paths: usize,
}

impl AdversarialInputMinimizer {
    pub fn new(desired_gap: f64, num_paths: usize) -> EncodingResult<Self> {
        if !desired_gap.is_finite() {
            return Err(EncodingError::Config(format!(
                "desired gap must be finite, got {desired_gap}"
            )));
        }
        if num_paths == 0 {
            return Err(EncodingError::Config("num_paths must be at least 1".into()));
        }
        Ok(Self {
            desired_gap,
            num_paths,
        })
    }

    /// Take the per-pair path count from the encoders' path mode.
    /// `AllSimple` has no fixed fan-out and is rejected.
    pub fn for_path_mode(desired_gap: f64, mode: PathMode) -> EncodingResult<Self> {
        let num_paths = mode.fan_out().ok_or_else(|| {
            EncodingError::Config(
                "all-simple path mode has no fan-out to bound the indicators".into(),
            )
        })?;
        Self::new(desired_gap, num_paths)
    }

    pub fn desired_gap(&self) -> f64 {
        self.desired_gap
    }

    /// Indicator bound: no pair carries more than `max capacity × K`.
    pub fn big_m(&self, topology: &Topology) -> f64 {
        topology.max_capacity() * self.num_paths as f64
    }

    /// Add `gap ≥ desired`, one indicator per symbolic demand with
    /// `d ≤ M·x`, and set the objective to `−Σ x`.
    pub fn encode<S>(
        &self,
        solver: &mut S,
        topology: &Topology,
        gap: &Polynomial<S::Var>,
        demands: &DemandInput<S::Var>,
    ) -> EncodingResult<AdversarialEncoding<S::Var>>
    where
        S: SolverCapability,
    {
        // desired − gap ≤ 0
        solver.add_leq_zero(Polynomial::constant(self.desired_gap) - gap.clone())?;

        let big_m = self.big_m(topology);
        let mut indicators = BTreeMap::new();
        let mut objective = Polynomial::new();
        for (pair, demand) in demands.iter() {
            if demand.is_constant() {
                if demand.constant_part() > 0.0 {
                    objective += -1.0;
                }
                continue;
            }
            let x = solver.create_variable(
                &format!("nonzero_{}_{}", pair.src, pair.dst),
                VariableKind::Binary,
            );
            solver.add_leq_zero(demand.clone() - Polynomial::variable(x) * big_m)?;
            objective.add(&Polynomial::variable(x).negate());
            indicators.insert(*pair, x);
        }
        solver.set_objective(objective.clone())?;

        debug!(
            desired_gap = self.desired_gap,
            big_m,
            indicators = indicators.len(),
            "adversarial input count objective set"
        );
        Ok(AdversarialEncoding {
            indicators,
            objective,
        })
    }
}
