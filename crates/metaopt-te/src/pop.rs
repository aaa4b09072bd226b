//! POP: partitioned optimization over capacity-split topology copies.
//!
//! Every link capacity is divided by the partition count, each demand pair
//! belongs to exactly one partition, and each partition solves its own flow
//! problem on the reduced topology. Pairs outside a partition have demand 0
//! there.

use std::collections::BTreeMap;
use std::marker::PhantomData;

use metaopt_core::{random_pair_partition, DemandMap, NodePair, Topology};
use metaopt_solver::{Polynomial, SolverCapability, SolverResult, VariableHandle};
use rayon::prelude::*;
use tracing::{debug, info};

use crate::config::TeConfig;
use crate::demand_input::DemandInput;
use crate::encoder::TrafficEngineeringEncoder;
use crate::encoding::{FlowEncoding, OptimizationSolution};
use crate::error::{EncodingError, EncodingResult};

/// Combined encoding plus the per-partition encodings it was built from.
#[derive(Debug, Clone)]
pub struct PopEncoding<V> {
    pub combined: FlowEncoding<V>,
    pub partitions: Vec<FlowEncoding<V>>,
}

/// Independent per-partition solutions and their sum.
#[derive(Debug, Clone, PartialEq)]
pub struct PopSolution {
    pub partitions: Vec<OptimizationSolution>,
    pub combined: OptimizationSolution,
}

/// Runs `inner` once per partition, each on a fresh solver from `factory`.
pub struct PopDecomposer<S, E, F> {
    num_partitions: usize,
    assignment: BTreeMap<NodePair, usize>,
    inner: E,
    factory: F,
    _solver: PhantomData<fn() -> S>,
}

impl<S, E, F> std::fmt::Debug for PopDecomposer<S, E, F>
where
    E: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PopDecomposer")
            .field("num_partitions", &self.num_partitions)
            .field("assigned_pairs", &self.assignment.len())
            .field("inner", &self.inner)
            .finish()
    }
}

impl<S, E, F> PopDecomposer<S, E, F>
where
    S: SolverCapability,
    E: TrafficEngineeringEncoder<S>,
    F: Fn() -> SolverResult<S>,
{
    pub fn new(
        num_partitions: usize,
        assignment: BTreeMap<NodePair, usize>,
        inner: E,
        factory: F,
    ) -> EncodingResult<Self> {
        if num_partitions == 0 {
            return Err(EncodingError::InvalidPartitionCount(num_partitions));
        }
        if let Some((pair, &partition)) = assignment.iter().find(|&(_, &p)| p >= num_partitions) {
            return Err(EncodingError::Config(format!(
                "pair {pair} assigned to partition {partition}, only {num_partitions} exist"
            )));
        }
        Ok(Self {
            num_partitions,
            assignment,
            inner,
            factory,
            _solver: PhantomData,
        })
    }

    /// Seeded random round-robin assignment of every topology pair.
    pub fn with_random_assignment(
        topology: &Topology,
        num_partitions: usize,
        seed: u64,
        inner: E,
        factory: F,
    ) -> EncodingResult<Self> {
        if num_partitions == 0 {
            return Err(EncodingError::InvalidPartitionCount(num_partitions));
        }
        let assignment = random_pair_partition(topology.node_pairs(), num_partitions, seed)?;
        Self::new(num_partitions, assignment, inner, factory)
    }

    pub fn from_config(
        config: &TeConfig,
        topology: &Topology,
        inner: E,
        factory: F,
    ) -> EncodingResult<Self> {
        Self::with_random_assignment(
            topology,
            config.pop.num_partitions,
            config.pop.seed,
            inner,
            factory,
        )
    }

    pub fn num_partitions(&self) -> usize {
        self.num_partitions
    }

    pub fn assignment(&self) -> &BTreeMap<NodePair, usize> {
        &self.assignment
    }

    pub fn partition_of(&self, pair: &NodePair) -> Option<usize> {
        self.assignment.get(pair).copied()
    }

    /// Every pair with a demand that is not the constant 0 needs a partition.
    fn check_assigned<V: VariableHandle>(&self, demands: &DemandInput<V>) -> EncodingResult<()> {
        for (pair, demand) in demands.iter() {
            let zero = demand.is_constant() && demand.constant_part() == 0.0;
            if !zero && !self.assignment.contains_key(pair) {
                return Err(EncodingError::UnassignedPair(*pair));
            }
        }
        Ok(())
    }

    /// Encode each partition on its own solver, merge them into `solver`, and
    /// tie every symbolic global demand to the sum of its partition copies.
    pub fn encode_partitioned(
        &self,
        solver: &mut S,
        topology: &Topology,
        demands: &DemandInput<S::Var>,
    ) -> EncodingResult<PopEncoding<S::Var>> {
        self.check_assigned(demands)?;
        let split = topology.split_capacity(self.num_partitions)?;

        let mut partitions = Vec::with_capacity(self.num_partitions);
        for i in 0..self.num_partitions {
            let mut sub = (self.factory)()?;
            let local = demands.localized(
                &mut sub,
                |pair| self.assignment.get(&pair) == Some(&i),
                &format!("pop{i}_"),
            )?;
            let encoding = self.inner.encode(&mut sub, &split, &local)?;
            solver.combine(sub)?;
            debug!(partition = i, pairs = local.len(), "partition encoded");
            partitions.push(encoding);
        }

        let mut combined = FlowEncoding::new(Polynomial::new());
        for encoding in &partitions {
            combined.objective.add(&encoding.objective);
            for (pair, flow) in &encoding.flows {
                combined.flows.entry(*pair).or_default().add(flow);
            }
            for (path, flow) in &encoding.path_flows {
                combined.path_flows.entry(path.clone()).or_default().add(flow);
            }
        }

        for (pair, demand) in demands.iter() {
            if !demand.is_constant() {
                let mut local_sum = Polynomial::new();
                for encoding in &partitions {
                    if let Some(local) = encoding.demands.get(pair) {
                        local_sum.add(local);
                    }
                }
                solver.add_eq_zero(local_sum - demand.clone())?;
            }
            combined.demands.insert(*pair, demand.clone());
        }
        solver.set_objective(combined.objective.clone())?;

        info!(
            partitions = self.num_partitions,
            topology = topology.name(),
            "POP encoding combined"
        );
        Ok(PopEncoding {
            combined,
            partitions,
        })
    }

    /// Solve every partition independently in parallel and sum the results.
    pub fn solve_partitions(
        &self,
        topology: &Topology,
        demands: &DemandMap,
    ) -> EncodingResult<PopSolution>
    where
        E: Sync,
        F: Sync,
        S::Var: Send + Sync,
    {
        let full = DemandInput::<S::Var>::fixed(demands, topology)?;
        self.check_assigned(&full)?;
        let split = topology.split_capacity(self.num_partitions)?;

        let partitions = (0..self.num_partitions)
            .into_par_iter()
            .map(|i| -> EncodingResult<OptimizationSolution> {
                let mut sub = (self.factory)()?;
                let local = full.localized(
                    &mut sub,
                    |pair| self.assignment.get(&pair) == Some(&i),
                    &format!("pop{i}_"),
                )?;
                let encoding = self.inner.encode(&mut sub, &split, &local)?;
                let solution = sub.maximize()?;
                let extracted = encoding.extract(&sub, &solution)?;
                debug!(
                    partition = i,
                    total_demand_met = extracted.total_demand_met,
                    "partition solved"
                );
                Ok(extracted)
            })
            .collect::<EncodingResult<Vec<_>>>()?;

        let combined = OptimizationSolution::sum(&partitions);
        info!(
            partitions = self.num_partitions,
            total_demand_met = combined.total_demand_met,
            "POP partitions solved"
        );
        Ok(PopSolution {
            partitions,
            combined,
        })
    }
}

impl<S, E, F> TrafficEngineeringEncoder<S> for PopDecomposer<S, E, F>
where
    S: SolverCapability,
    E: TrafficEngineeringEncoder<S>,
    F: Fn() -> SolverResult<S>,
{
    fn name(&self) -> &str {
        "pop"
    }

    fn encode(
        &self,
        solver: &mut S,
        topology: &Topology,
        demands: &DemandInput<S::Var>,
    ) -> EncodingResult<FlowEncoding<S::Var>> {
        Ok(self.encode_partitioned(solver, topology, demands)?.combined)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::direct::DirectFlowEncoder;
    use crate::paths::PathMode;
    use metaopt_core::NodeId;
    use metaopt_solver::{LpSolver, LpSolverConfig};

    type Pop = PopDecomposer<LpSolver, DirectFlowEncoder, fn() -> SolverResult<LpSolver>>;

    fn factory() -> SolverResult<LpSolver> {
        LpSolver::new(LpSolverConfig::new(100.0))
    }

    #[test]
    fn test_zero_partitions_rejected() {
        let err = Pop::new(
            0,
            BTreeMap::new(),
            DirectFlowEncoder::new(PathMode::KShortest(1)),
            factory,
        )
        .unwrap_err();
        assert!(matches!(err, EncodingError::InvalidPartitionCount(0)));
    }

    #[test]
    fn test_out_of_range_assignment_rejected() {
        let pair = NodePair::new(NodeId::new(0), NodeId::new(1));
        let err = Pop::new(
            2,
            [(pair, 2)].into_iter().collect(),
            DirectFlowEncoder::new(PathMode::KShortest(1)),
            factory,
        )
        .unwrap_err();
        assert!(matches!(err, EncodingError::Config(_)));
    }

    #[test]
    fn test_random_assignment_covers_every_pair() {
        let ring = Topology::ring(4, 10.0).unwrap();
        let pop = Pop::with_random_assignment(
            &ring,
            3,
            7,
            DirectFlowEncoder::new(PathMode::KShortest(1)),
            factory,
        )
        .unwrap();
        assert_eq!(pop.assignment().len(), ring.node_pairs().len());
        assert!(pop.assignment().values().all(|&p| p < 3));
    }
}
