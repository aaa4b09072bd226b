//! Encoder traits.
//!
//! Each problem shape is its own trait. Only traffic engineering exists
//! here, so requesting any other shape is a compile-time error rather than a
//! runtime capability gap.

use std::collections::BTreeMap;

use metaopt_core::{NodeId, Topology};
use metaopt_solver::{Polynomial, SolverCapability, VariableHandle};

use crate::demand_input::DemandInput;
use crate::encoding::FlowEncoding;
use crate::error::EncodingResult;

/// Builds multicommodity-flow constraints on a solver and returns the
/// quantities a caller needs to read the result back.
pub trait TrafficEngineeringEncoder<S: SolverCapability> {
    fn name(&self) -> &str;

    /// Encode against `topology` and `demands`, setting `solver`'s objective
    /// to the total demand met.
    fn encode(
        &self,
        solver: &mut S,
        topology: &Topology,
        demands: &DemandInput<S::Var>,
    ) -> EncodingResult<FlowEncoding<S::Var>>;
}

/// Encoders that accept symbolic link capacities (used by pinning, whose
/// residual capacities depend on pinned demand variables).
pub trait CapacityAwareEncoder<S: SolverCapability>: TrafficEngineeringEncoder<S> {
    fn encode_instance(
        &self,
        solver: &mut S,
        instance: &FlowInstance<'_, S::Var>,
    ) -> EncodingResult<FlowEncoding<S::Var>>;
}

/// Topology, demands and per-link capacity polynomials for one encode call.
#[derive(Debug, Clone)]
pub struct FlowInstance<'a, V> {
    pub topology: &'a Topology,
    pub demands: &'a DemandInput<V>,
    pub capacities: BTreeMap<(NodeId, NodeId), Polynomial<V>>,
}

impl<'a, V: VariableHandle> FlowInstance<'a, V> {
    /// Capacities taken from the topology as constants.
    pub fn new(topology: &'a Topology, demands: &'a DemandInput<V>) -> Self {
        let capacities = topology
            .links()
            .into_iter()
            .map(|(s, d, link)| ((s, d), Polynomial::constant(link.capacity)))
            .collect();
        Self {
            topology,
            demands,
            capacities,
        }
    }

    pub fn with_capacities(
        topology: &'a Topology,
        demands: &'a DemandInput<V>,
        capacities: BTreeMap<(NodeId, NodeId), Polynomial<V>>,
    ) -> Self {
        Self {
            topology,
            demands,
            capacities,
        }
    }

    pub fn capacity(&self, src: NodeId, dst: NodeId) -> Polynomial<V> {
        self.capacities
            .get(&(src, dst))
            .cloned()
            .unwrap_or_else(|| Polynomial::constant(0.0))
    }
}
