//! # metaopt-solver: Formulation Algebra and Backend
//!
//! Everything an encoder needs to talk to an optimization engine:
//!
//! - [`term`] - affine [`Term`]s and [`Polynomial`]s over opaque variable handles
//! - [`capability`] - the [`SolverCapability`] contract encoders program against
//! - [`lp`] - [`LpSolver`], a good_lp backend with branch-and-bound over binaries
//! - [`monitor`] - search monitors (progress, stall and wall-clock limits)
//! - [`progress_log`] - the `elapsed_ms, objective` progress file
//!
//! ## Example
//!
//! ```no_run
//! use metaopt_solver::{
//!     LpSolver, LpSolverConfig, Polynomial, SolverCapability, VariableKind,
//! };
//!
//! let mut solver = LpSolver::new(LpSolverConfig::new(1e4))?;
//! let x = solver.create_bounded_variable("x", VariableKind::Continuous, 0.0, 4.0)?;
//! let y = solver.create_variable("y", VariableKind::Binary);
//! solver.add_leq(Polynomial::variable(x), Polynomial::variable(y) * 3.0)?;
//! solver.set_objective(Polynomial::variable(x))?;
//!
//! let solution = solver.maximize()?;
//! assert!(solution.is_optimal());
//! println!("x = {}", solver.get_value(&solution, x)?);
//! # Ok::<(), metaopt_solver::SolverError>(())
//! ```

pub mod capability;
pub mod error;
pub mod lp;
pub mod monitor;
pub mod outcome;
pub mod progress_log;
pub mod term;

pub use capability::{SolverCapability, VariableKind};
pub use error::{SolverError, SolverResult};
pub use lp::{LpEngine, LpSolution, LpSolver, LpSolverConfig, VarId};
pub use monitor::{
    CompositeMonitor, NoImprovementMonitor, ProgressRecorder, SearchCommand, SearchMonitor,
    TimeLimitMonitor,
};
pub use outcome::{SearchStatistics, SolveStatus};
pub use progress_log::{ProgressLog, ProgressPoint};
pub use term::{Polynomial, Term, VariableHandle};
