//! Solver-layer error types.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while realizing formulations or running the backend solve.
#[derive(Error, Debug)]
pub enum SolverError {
    /// The algebra is strictly affine; a term with exponent > 1 cannot be realized
    #[error("unsupported exponent {exponent}: only constant and linear terms can be realized")]
    UnsupportedExponent { exponent: u32 },

    /// Two solver instances of different backend kinds cannot be merged
    #[error("incompatible solver: cannot combine {found} into {expected}")]
    IncompatibleSolver { expected: String, found: String },

    /// The backend proved the program infeasible or unbounded
    #[error("program is infeasible or unbounded: {0}")]
    InfeasibleOrUnbounded(String),

    /// The search was stopped before any feasible assignment was found
    #[error("search terminated without a feasible solution: {reason}")]
    NoIncumbent { reason: String },

    /// A variable handle that this solver instance does not own
    #[error("unknown variable {0}")]
    UnknownVariable(String),

    /// Invalid backend configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// A progress file that must already exist
    #[error("progress file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// I/O errors other than a missing progress file
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failure reported by the LP engine
    #[error("Solver error: {0}")]
    Backend(String),
}

/// Convenience type alias for Results using SolverError.
pub type SolverResult<T> = Result<T, SolverError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SolverError::UnsupportedExponent { exponent: 2 };
        assert!(err.to_string().contains("unsupported exponent 2"));

        let err = SolverError::FileNotFound(PathBuf::from("/tmp/missing.log"));
        assert!(err.to_string().contains("/tmp/missing.log"));
    }

    #[test]
    fn test_question_mark_operator() {
        fn inner() -> SolverResult<()> {
            Err(SolverError::InfeasibleOrUnbounded("infeasible".into()))
        }

        fn outer() -> SolverResult<()> {
            inner()?;
            Ok(())
        }

        assert!(matches!(outer(), Err(SolverError::InfeasibleOrUnbounded(_))));
    }
}
