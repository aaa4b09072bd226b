//! Demands as polynomials.
//!
//! Encoders see every demand as a [`Polynomial`]: a constant for a fixed
//! demand matrix, or a solver variable when the demand itself is a decision
//! (the adversarial outer problem). Every topology pair has an entry.

use std::collections::BTreeMap;

use metaopt_core::{DemandMap, NodePair, Topology};
use metaopt_solver::{Polynomial, SolverCapability, VariableHandle, VariableKind};

use crate::error::{EncodingError, EncodingResult};

#[derive(Debug, Clone)]
struct DemandEntry<V> {
    value: Polynomial<V>,
    /// Known upper bound of `value`
    upper: Option<f64>,
}

/// Per-pair demand polynomials.
#[derive(Debug, Clone)]
pub struct DemandInput<V> {
    entries: BTreeMap<NodePair, DemandEntry<V>>,
}

impl<V: VariableHandle> DemandInput<V> {
    /// Constant demands taken from a validated demand map.
    pub fn fixed(demands: &DemandMap, topology: &Topology) -> EncodingResult<Self> {
        demands.validate_against(topology)?;
        let mut entries = BTreeMap::new();
        for pair in topology.node_pairs() {
            let value = demands.resolve(topology, pair)?;
            entries.insert(
                pair,
                DemandEntry {
                    value: Polynomial::constant(value),
                    upper: Some(value),
                },
            );
        }
        Ok(Self { entries })
    }

    /// One fresh variable `0 ≤ d ≤ max_demand` per reachable pair; unreachable
    /// pairs get the constant 0.
    pub fn variables<S>(
        solver: &mut S,
        topology: &Topology,
        max_demand: f64,
    ) -> EncodingResult<Self>
    where
        S: SolverCapability<Var = V>,
    {
        if !max_demand.is_finite() || max_demand < 0.0 {
            return Err(EncodingError::InvalidBounds {
                lower: 0.0,
                upper: max_demand,
            });
        }
        let mut entries = BTreeMap::new();
        for pair in topology.node_pairs() {
            let entry = if topology.has_path(pair.src, pair.dst) {
                let name = format!("demand_{}_{}", pair.src, pair.dst);
                let d = solver.create_bounded_variable(
                    &name,
                    VariableKind::Continuous,
                    0.0,
                    max_demand,
                )?;
                DemandEntry {
                    value: Polynomial::variable(d),
                    upper: Some(max_demand),
                }
            } else {
                DemandEntry {
                    value: Polynomial::constant(0.0),
                    upper: Some(0.0),
                }
            };
            entries.insert(pair, entry);
        }
        Ok(Self { entries })
    }

    /// Build from explicit polynomials. `upper` bounds are optional.
    pub fn from_polynomials(
        entries: impl IntoIterator<Item = (NodePair, Polynomial<V>, Option<f64>)>,
    ) -> Self {
        Self {
            entries: entries
                .into_iter()
                .map(|(pair, value, upper)| (pair, DemandEntry { value, upper }))
                .collect(),
        }
    }

    pub fn get(&self, pair: &NodePair) -> Option<&Polynomial<V>> {
        self.entries.get(pair).map(|e| &e.value)
    }

    /// Demand of a pair, failing with `MissingDemand` when absent.
    pub fn require(&self, pair: NodePair) -> EncodingResult<&Polynomial<V>> {
        self.get(&pair)
            .ok_or(EncodingError::Core(metaopt_core::CoreError::MissingDemand(pair)))
    }

    pub fn upper_bound(&self, pair: &NodePair) -> Option<f64> {
        self.entries.get(pair).and_then(|e| e.upper)
    }

    /// The constant value of a pair's demand, if it has no variable part.
    pub fn fixed_value(&self, pair: &NodePair) -> Option<f64> {
        self.get(pair)
            .filter(|p| p.is_constant())
            .map(|p| p.constant_part())
    }

    /// The demand variable of a pair, if its demand is a single variable.
    pub fn variable(&self, pair: &NodePair) -> Option<V> {
        self.get(pair)
            .filter(|p| p.is_single_variable())
            .and_then(|p| p.variables().first().copied())
    }

    pub fn is_fixed(&self) -> bool {
        self.entries.values().all(|e| e.value.is_constant())
    }

    pub fn pairs(&self) -> impl Iterator<Item = NodePair> + '_ {
        self.entries.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&NodePair, &Polynomial<V>)> {
        self.entries.iter().map(|(k, e)| (k, &e.value))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Replace the demand of a pair.
    pub fn set(&mut self, pair: NodePair, value: Polynomial<V>, upper: Option<f64>) {
        self.entries.insert(pair, DemandEntry { value, upper });
    }

    /// Copy of this input for a sub-instance on another solver.
    ///
    /// Pairs rejected by `keep` become the constant 0. Kept constant demands
    /// are copied; kept symbolic demands get a fresh non-negative variable on
    /// `solver` with the same upper bound. The caller links the fresh
    /// variables back to the originals after merging the solvers.
    pub fn localized<S, W>(
        &self,
        solver: &mut S,
        mut keep: impl FnMut(NodePair) -> bool,
        prefix: &str,
    ) -> EncodingResult<DemandInput<W>>
    where
        S: SolverCapability<Var = W>,
        W: VariableHandle,
    {
        let mut entries = BTreeMap::new();
        for (&pair, entry) in &self.entries {
            let local = if !keep(pair) {
                DemandEntry {
                    value: Polynomial::constant(0.0),
                    upper: Some(0.0),
                }
            } else if entry.value.is_constant() {
                DemandEntry {
                    value: Polynomial::constant(entry.value.constant_part()),
                    upper: entry.upper,
                }
            } else {
                let name = format!("{prefix}demand_{}_{}", pair.src, pair.dst);
                let d = solver.create_bounded_variable(
                    &name,
                    VariableKind::Continuous,
                    0.0,
                    entry.upper.unwrap_or(f64::INFINITY),
                )?;
                DemandEntry {
                    value: Polynomial::variable(d),
                    upper: entry.upper,
                }
            };
            entries.insert(pair, local);
        }
        Ok(DemandInput { entries })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use metaopt_core::{CoreError, NodeId};
    use metaopt_solver::{LpSolver, LpSolverConfig};

    fn pair(s: usize, d: usize) -> NodePair {
        NodePair::new(NodeId::new(s), NodeId::new(d))
    }

    fn line() -> Topology {
        let mut t = Topology::new("line");
        for i in 0..3 {
            t.add_node(NodeId::new(i));
        }
        t.add_link(NodeId::new(0), NodeId::new(1), 10.0).unwrap();
        t.add_link(NodeId::new(1), NodeId::new(2), 5.0).unwrap();
        t
    }

    #[test]
    fn test_fixed_covers_every_pair() {
        let t = line();
        let demands: DemandMap = [(pair(0, 1), 1.0), (pair(1, 2), 2.0), (pair(0, 2), 8.0)]
            .into_iter()
            .collect();
        let input = DemandInput::<metaopt_solver::VarId>::fixed(&demands, &t).unwrap();
        assert_eq!(input.len(), 6);
        assert!(input.is_fixed());
        assert_eq!(input.fixed_value(&pair(0, 2)), Some(8.0));
        assert_eq!(input.fixed_value(&pair(2, 0)), Some(0.0));
    }

    #[test]
    fn test_fixed_rejects_missing_pair() {
        let t = line();
        let demands: DemandMap = [(pair(0, 1), 1.0), (pair(1, 2), 2.0)].into_iter().collect();
        let err = DemandInput::<metaopt_solver::VarId>::fixed(&demands, &t).unwrap_err();
        assert!(matches!(
            err,
            EncodingError::Core(CoreError::MissingDemand(p)) if p == pair(0, 2)
        ));
    }

    #[test]
    fn test_variables_only_for_reachable_pairs() {
        let t = line();
        let mut solver = LpSolver::new(LpSolverConfig::new(100.0)).unwrap();
        let input = DemandInput::variables(&mut solver, &t, 20.0).unwrap();
        assert_eq!(solver.num_variables(), 3);
        assert!(input.variable(&pair(0, 2)).is_some());
        assert_eq!(input.fixed_value(&pair(2, 1)), Some(0.0));
        assert_eq!(input.upper_bound(&pair(0, 1)), Some(20.0));
        assert!(!input.is_fixed());
    }

    #[test]
    fn test_localized_creates_fresh_variables() {
        let t = line();
        let mut global = LpSolver::new(LpSolverConfig::new(100.0)).unwrap();
        let input = DemandInput::variables(&mut global, &t, 20.0).unwrap();

        let mut local = LpSolver::new(LpSolverConfig::new(100.0)).unwrap();
        let localized = input
            .localized(&mut local, |p| p == pair(0, 1), "p0_")
            .unwrap();
        assert_eq!(local.num_variables(), 1);
        let v = localized.variable(&pair(0, 1)).unwrap();
        assert!(local.contains(v));
        assert!(!global.contains(v));
        assert_eq!(localized.fixed_value(&pair(0, 2)), Some(0.0));
    }
}
