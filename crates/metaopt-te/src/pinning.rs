//! Demand pinning.
//!
//! Demands at or below a threshold `τ` (inclusive) bypass the flow LP: they
//! are routed on their shortest path, that path's capacity shrinks by the
//! pinned amount, and the objective adds the pinned total back. The inner
//! encoder only sees the residual instance.
//!
//! Symbolic demands `d ∈ [0, D]` decide pinning with a binary `p`:
//!
//! ```text
//! d ≤ τ + (D − τ)(1 − p)        p = 1  ⇒  d ≤ τ
//! d ≥ (τ + ε)(1 − p)            p = 0  ⇒  d ≥ τ + ε
//! z = d·p                       (McCormick, exact for binary p)
//! ```
//!
//! and the residual demand is `d − z`.

use std::collections::BTreeMap;

use metaopt_core::{CapacityMap, DemandMap, NodeId, NodePair, Path, Topology};
use metaopt_solver::{Polynomial, SolverCapability, VariableHandle, VariableKind};
use tracing::{debug, warn};

use crate::config::TeConfig;
use crate::demand_input::DemandInput;
use crate::encoder::{CapacityAwareEncoder, FlowInstance, TrafficEngineeringEncoder};
use crate::encoding::FlowEncoding;
use crate::error::{EncodingError, EncodingResult};
use crate::mccormick::{relax_product, Bounds};

/// Result of pinning a fixed demand map.
#[derive(Debug, Clone, PartialEq)]
pub struct PinnedDemands {
    /// Demand map with pinned entries zeroed
    pub reduced: DemandMap,
    /// Link capacities after pinned traffic is taken out; may be negative
    pub capacities: CapacityMap,
    pub pinned: BTreeMap<NodePair, (Path, f64)>,
    pub pinned_total: f64,
}

/// Pin every demand `0 < d ≤ threshold` of a fixed demand map.
pub fn pin_demands(
    topology: &Topology,
    demands: &DemandMap,
    threshold: f64,
) -> EncodingResult<PinnedDemands> {
    check_threshold(threshold)?;
    demands.validate_against(topology)?;

    let mut reduced = demands.clone();
    let mut capacities = topology.capacities();
    let mut pinned = BTreeMap::new();
    let mut pinned_total = 0.0;

    for (&pair, &value) in demands.iter() {
        if value <= 0.0 || value > threshold {
            continue;
        }
        let Some(path) = topology.shortest_path(pair.src, pair.dst) else {
            continue;
        };
        for link in path.links() {
            if let Some(capacity) = capacities.get_mut(&link) {
                *capacity -= value;
            }
        }
        reduced.insert(pair, 0.0);
        pinned_total += value;
        pinned.insert(pair, (path, value));
    }

    for (&(src, dst), &capacity) in &capacities {
        if capacity < 0.0 {
            warn!(%src, %dst, capacity, "pinned demand exceeds link capacity");
        }
    }
    Ok(PinnedDemands {
        reduced,
        capacities,
        pinned,
        pinned_total,
    })
}

fn check_threshold(threshold: f64) -> EncodingResult<()> {
    if !threshold.is_finite() || threshold < 0.0 {
        return Err(EncodingError::Config(format!(
            "pinning threshold must be non-negative, got {threshold}"
        )));
    }
    Ok(())
}

/// Encoding produced by [`DemandPinning::encode_pinned`].
#[derive(Debug, Clone)]
pub struct PinnedEncoding<V> {
    /// Full encoding: residual flows plus pinned flows
    pub encoding: FlowEncoding<V>,
    /// Objective of the residual instance alone
    pub residual_objective: Polynomial<V>,
    /// Pinned amount per pair and the path carrying it
    pub pinned: BTreeMap<NodePair, (Path, Polynomial<V>)>,
}

impl<V: VariableHandle> PinnedEncoding<V> {
    pub fn pinned_total(&self) -> Polynomial<V> {
        let mut total = Polynomial::new();
        for (_, amount) in self.pinned.values() {
            total.add(amount);
        }
        total
    }
}

/// Pre-processor running `inner` on the residual instance left after
/// demand pinning.
#[derive(Debug, Clone)]
pub struct DemandPinning<E> {
    threshold: f64,
    margin: f64,
    inner: E,
}

impl<E> DemandPinning<E> {
    pub fn new(threshold: f64, inner: E) -> EncodingResult<Self> {
        Self::with_margin(threshold, 1e-4, inner)
    }

    /// `margin` is the minimum amount by which an unpinned symbolic demand
    /// exceeds the threshold.
    pub fn with_margin(threshold: f64, margin: f64, inner: E) -> EncodingResult<Self> {
        check_threshold(threshold)?;
        if !margin.is_finite() || margin <= 0.0 {
            return Err(EncodingError::Config(format!(
                "pinning margin must be positive, got {margin}"
            )));
        }
        Ok(Self {
            threshold,
            margin,
            inner,
        })
    }

    pub fn from_config(config: &TeConfig, inner: E) -> EncodingResult<Self> {
        Self::with_margin(config.pinning.threshold, config.pinning.margin, inner)
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn inner(&self) -> &E {
        &self.inner
    }

    /// Pinning decision for one pair: `(pinned amount, residual demand)`.
    fn split_demand<S>(
        &self,
        solver: &mut S,
        pair: NodePair,
        demand: &Polynomial<S::Var>,
        upper: Option<f64>,
    ) -> EncodingResult<(Polynomial<S::Var>, Polynomial<S::Var>)>
    where
        S: SolverCapability,
    {
        let tau = self.threshold;
        if demand.is_constant() {
            let value = demand.constant_part();
            return Ok(if value > 0.0 && value <= tau {
                (demand.clone(), Polynomial::constant(0.0))
            } else {
                (Polynomial::constant(0.0), demand.clone())
            });
        }

        let max = upper.ok_or(EncodingError::UnboundedDemand(pair))?;
        if max <= tau {
            return Ok((demand.clone(), Polynomial::constant(0.0)));
        }

        let p = solver.create_variable(
            &format!("pin_{}_{}", pair.src, pair.dst),
            VariableKind::Binary,
        );
        // d + (D − τ)·p − D ≤ 0
        solver.add_leq_zero(demand.clone() + Polynomial::variable(p) * (max - tau) - max)?;
        // (τ + ε) − (τ + ε)·p − d ≤ 0
        let floor = tau + self.margin;
        solver.add_leq_zero(Polynomial::constant(floor) - Polynomial::variable(p) * floor - demand.clone())?;

        let z = relax_product(
            solver,
            &format!("pinned_{}_{}", pair.src, pair.dst),
            demand.clone(),
            Bounds::new(0.0, max)?,
            p,
            Bounds::unit(),
        )?;
        Ok((Polynomial::variable(z), demand.clone() - Polynomial::variable(z)))
    }

    /// Pin, encode the residual instance with `inner`, and merge the pinned
    /// flows back into the result.
    pub fn encode_pinned<S>(
        &self,
        solver: &mut S,
        instance: &FlowInstance<'_, S::Var>,
    ) -> EncodingResult<PinnedEncoding<S::Var>>
    where
        S: SolverCapability,
        E: CapacityAwareEncoder<S>,
    {
        let topology = instance.topology;
        let mut residual = Vec::new();
        let mut pinned = BTreeMap::new();
        let mut pinned_load: BTreeMap<(NodeId, NodeId), Polynomial<S::Var>> = BTreeMap::new();

        for pair in topology.node_pairs() {
            let demand = instance.demands.require(pair)?;
            let upper = instance.demands.upper_bound(&pair);
            let path = topology.shortest_path(pair.src, pair.dst);
            let Some(path) = path.filter(|_| !is_zero(demand)) else {
                residual.push((pair, demand.clone(), upper));
                continue;
            };

            let (amount, rest) = self.split_demand(solver, pair, demand, upper)?;
            residual.push((pair, rest, upper));
            if is_zero(&amount) {
                continue;
            }
            for link in path.links() {
                pinned_load.entry(link).or_default().add(&amount);
            }
            pinned.insert(pair, (path, amount));
        }

        let mut capacities = instance.capacities.clone();
        for (link, load) in &pinned_load {
            let capacity = capacities
                .entry(*link)
                .or_insert_with(|| Polynomial::constant(0.0));
            let row = load.clone() - capacity.clone();
            if row.is_constant() && row.constant_part() > 0.0 {
                warn!(
                    src = %link.0,
                    dst = %link.1,
                    excess = row.constant_part(),
                    "pinned demand exceeds link capacity"
                );
            }
            solver.add_leq_zero(row)?;
            *capacity = capacity.clone() - load.clone();
        }

        let residual_demands = DemandInput::from_polynomials(residual);
        let residual_instance = FlowInstance::with_capacities(topology, &residual_demands, capacities);
        let inner = self.inner.encode_instance(solver, &residual_instance)?;
        let residual_objective = inner.objective.clone();

        let mut encoding = inner;
        let mut objective = residual_objective.clone();
        for (pair, (path, amount)) in &pinned {
            objective.add(amount);
            encoding
                .flows
                .entry(*pair)
                .or_insert_with(|| Polynomial::constant(0.0))
                .add(amount);
            encoding
                .path_flows
                .entry(path.clone())
                .or_insert_with(|| Polynomial::constant(0.0))
                .add(amount);
        }
        for pair in topology.node_pairs() {
            encoding
                .demands
                .insert(pair, instance.demands.require(pair)?.clone());
        }
        encoding.objective = objective;
        solver.set_objective(encoding.objective.clone())?;

        debug!(
            threshold = self.threshold,
            pinned = pinned.len(),
            loaded_links = pinned_load.len(),
            "demand pinning applied"
        );
        Ok(PinnedEncoding {
            encoding,
            residual_objective,
            pinned,
        })
    }
}

fn is_zero<V: VariableHandle>(p: &Polynomial<V>) -> bool {
    p.is_constant() && p.constant_part() == 0.0
}

impl<S, E> TrafficEngineeringEncoder<S> for DemandPinning<E>
where
    S: SolverCapability,
    E: CapacityAwareEncoder<S>,
{
    fn name(&self) -> &str {
        "demand_pinning"
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

impl<S, E> CapacityAwareEncoder<S> for DemandPinning<E>
where
    S: SolverCapability,
    E: CapacityAwareEncoder<S>,
{
    fn encode_instance(
        &self,
        solver: &mut S,
        instance: &FlowInstance<'_, S::Var>,
    ) -> EncodingResult<FlowEncoding<S::Var>> {
        Ok(self.encode_pinned(solver, instance)?.encoding)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::direct::DirectFlowEncoder;
    use crate::paths::PathMode;
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
    fn test_pin_demands_is_inclusive_and_conserves() {
        let t = line();
        let demands: DemandMap = [(pair(0, 1), 2.0), (pair(1, 2), 3.0), (pair(0, 2), 2.0)]
            .into_iter()
            .collect();
        let pinned = pin_demands(&t, &demands, 2.0).unwrap();

        assert_eq!(pinned.pinned.len(), 2);
        assert_eq!(pinned.pinned_total, 4.0);
        assert_eq!(pinned.reduced.get(&pair(0, 2)), Some(0.0));
        assert_eq!(pinned.reduced.get(&pair(1, 2)), Some(3.0));
        assert_eq!(pinned.capacities[&(n(0), n(1))], 6.0);
        assert_eq!(pinned.capacities[&(n(1), n(2))], 3.0);
        assert_eq!(pinned.reduced.total() + pinned.pinned_total, demands.total());
    }

    #[test]
    fn test_negative_threshold_rejected() {
        assert!(pin_demands(&line(), &DemandMap::new(), -1.0).is_err());
        assert!(DemandPinning::new(f64::NAN, DirectFlowEncoder::new(PathMode::KShortest(1))).is_err());
    }

    #[test]
    fn test_symbolic_demand_without_upper_bound() {
        let mut t = Topology::new("pair");
        t.add_node(n(0));
        t.add_node(n(1));
        t.add_link(n(0), n(1), 4.0).unwrap();

        let mut solver = LpSolver::new(LpSolverConfig::new(100.0)).unwrap();
        let d = solver.create_variable("d", VariableKind::Continuous);
        let input = DemandInput::from_polynomials([
            (pair(0, 1), Polynomial::variable(d), None),
            (pair(1, 0), Polynomial::constant(0.0), Some(0.0)),
        ]);
        let pinning = DemandPinning::new(1.0, DirectFlowEncoder::new(PathMode::KShortest(1))).unwrap();
        let err = pinning.encode(&mut solver, &t, &input).unwrap_err();
        assert!(matches!(err, EncodingError::UnboundedDemand(p) if p == pair(0, 1)));
    }
}
