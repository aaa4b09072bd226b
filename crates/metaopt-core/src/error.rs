//! Error types for the topology and demand model.
//!
//! Every condition here is a usage error detected locally, before any
//! constraint reaches a solver. Errors propagate unchanged to the caller.

use thiserror::Error;

use crate::{NodeId, NodePair};

/// Errors raised while building or querying topologies, paths and demand maps.
#[derive(Error, Debug)]
pub enum CoreError {
    /// I/O errors (topology and demand files)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Parsing/deserialization errors
    #[error("Parse error: {0}")]
    Parse(String),

    /// A reachable node pair has no entry in the demand map
    #[error("missing demand for reachable pair {0}")]
    MissingDemand(NodePair),

    /// A demand entry is negative or not finite
    #[error("invalid demand {value} for pair {pair}")]
    InvalidDemand { pair: NodePair, value: f64 },

    /// A node id that is not part of the topology
    #[error("unknown node {0}")]
    UnknownNode(NodeId),

    /// A link that cannot be added to the topology
    #[error("invalid link {src} -> {dst}: {reason}")]
    InvalidLink {
        src: NodeId,
        dst: NodeId,
        reason: String,
    },

    /// A node sequence that is not a usable path
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// Partition counts must be at least one
    #[error("Invalid partition count: {0}")]
    InvalidPartitionCount(usize),

    /// Node partitioning could not produce a valid assignment
    #[error("partitioning failed: {0}")]
    Partitioning(String),
}

/// Convenience type alias for Results using CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::Parse(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CoreError::MissingDemand(NodePair::new(NodeId::new(1), NodeId::new(2)));
        assert_eq!(err.to_string(), "missing demand for reachable pair (1, 2)");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: CoreError = io_err.into();
        assert!(matches!(err, CoreError::Io(_)));
    }

    #[test]
    fn test_json_error_becomes_parse() {
        let json_err = serde_json::from_str::<u32>("not json").unwrap_err();
        let err: CoreError = json_err.into();
        assert!(matches!(err, CoreError::Parse(_)));
    }
}
