//! # metaopt-te: Traffic-Engineering Formulations
//!
//! Single-level encodings of multicommodity-flow allocation, written once
//! against [`SolverCapability`](metaopt_solver::SolverCapability):
//!
//! - [`direct`] - primal flow LP maximizing total demand met
//! - [`kkt`] - KKT reformulation whose feasible set is the set of optimal flows
//! - [`pinning`] - demand pinning of small demands onto shortest paths
//! - [`pop`] - POP decomposition over capacity-split topology copies
//! - [`mccormick`] - McCormick envelopes for bilinear terms
//! - [`adversarial`] - gap objectives and adversarial input minimization
//!
//! Demands reach every encoder as [`DemandInput`]: constants for a plain
//! traffic-engineering solve, or solver variables when an outer problem
//! chooses the demands.
//!
//! ## Example
//!
//! ```no_run
//! use metaopt_core::{DemandMap, Topology};
//! use metaopt_solver::{LpSolver, LpSolverConfig, SolverCapability};
//! use metaopt_te::{DemandInput, DirectFlowEncoder, PathMode, TrafficEngineeringEncoder};
//!
//! let topology = Topology::ring(4, 10.0)?;
//! let demands = DemandMap::uniform(&topology, 3.0);
//!
//! let mut solver = LpSolver::new(LpSolverConfig::new(1e4))?;
//! let input = DemandInput::fixed(&demands, &topology)?;
//! let encoding = DirectFlowEncoder::new(PathMode::KShortest(2))
//!     .encode(&mut solver, &topology, &input)?;
//!
//! let solution = solver.maximize()?;
//! println!("{}", encoding.extract(&solver, &solution)?.summary());
//! # Ok::<(), metaopt_te::EncodingError>(())
//! ```

pub mod adversarial;
pub mod config;
pub mod demand_input;
pub mod direct;
pub mod encoder;
pub mod encoding;
pub mod error;
pub mod kkt;
pub mod mccormick;
pub mod paths;
pub mod pinning;
pub mod pop;

pub use adversarial::{encode_gap, AdversarialEncoding, AdversarialInputMinimizer, GapEncoding};
pub use config::{KktConfig, PathSelection, PinningConfig, PopConfig, TeConfig};
pub use demand_input::DemandInput;
pub use direct::DirectFlowEncoder;
pub use encoder::{CapacityAwareEncoder, FlowInstance, TrafficEngineeringEncoder};
pub use encoding::{FlowEncoding, OptimizationSolution};
pub use error::{EncodingError, EncodingResult};
pub use kkt::{KktFlowEncoder, KktReport, KktSystem};
pub use mccormick::{add_mccormick_envelope, envelope_bounds, relax_product, Bounds};
pub use paths::PathMode;
pub use pinning::{pin_demands, DemandPinning, PinnedDemands, PinnedEncoding};
pub use pop::{PopDecomposer, PopEncoding, PopSolution};
