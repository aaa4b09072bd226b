//! Error types for the formulation layer.

use metaopt_core::{CoreError, NodePair};
use metaopt_solver::SolverError;
use thiserror::Error;

/// Result type for encoder operations.
pub type EncodingResult<T> = Result<T, EncodingError>;

/// Errors raised while building or solving a formulation.
#[derive(Debug, Error)]
pub enum EncodingError {
    /// Topology or demand validation failure.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Backend failure, including infeasibility and unsupported terms.
    #[error(transparent)]
    Solver(#[from] SolverError),

    /// A POP decomposer needs at least one partition.
    #[error("invalid partition count {0}: at least one partition is required")]
    InvalidPartitionCount(usize),

    /// A node pair with no partition in the POP assignment.
    #[error("pair {0} is not assigned to any partition")]
    UnassignedPair(NodePair),

    /// Box bounds with `lower > upper` or a NaN endpoint.
    #[error("invalid bounds [{lower}, {upper}]")]
    InvalidBounds { lower: f64, upper: f64 },

    /// A symbolic demand with no known upper bound where one is required.
    #[error("demand of pair {0} has no upper bound")]
    UnboundedDemand(NodePair),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<toml::de::Error> for EncodingError {
    fn from(e: toml::de::Error) -> Self {
        EncodingError::Serialization(e.to_string())
    }
}

impl From<toml::ser::Error> for EncodingError {
    fn from(e: toml::ser::Error) -> Self {
        EncodingError::Serialization(e.to_string())
    }
}

impl From<serde_json::Error> for EncodingError {
    fn from(e: serde_json::Error) -> Self {
        EncodingError::Serialization(e.to_string())
    }
}

impl EncodingError {
    /// True when the backend proved that no assignment exists.
    pub fn is_infeasible(&self) -> bool {
        matches!(self, EncodingError::Solver(SolverError::InfeasibleOrUnbounded(_)))
    }
}
