//! Two-column incumbent progress file.
//!
//! One line per improved incumbent: `elapsed_milliseconds, objective_value`.
//! Creating the file is a separate step from appending to it; opening a file
//! that does not exist fails with [`SolverError::FileNotFound`].

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{SolverError, SolverResult};

/// A single `(elapsed_ms, objective)` sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProgressPoint {
    pub elapsed_ms: u128,
    pub objective: f64,
}

#[derive(Debug)]
pub struct ProgressLog {
    path: PathBuf,
    file: File,
}

impl ProgressLog {
    /// Create (or truncate) the file at `path`.
    pub fn create(path: impl AsRef<Path>) -> SolverResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path)?;
        Ok(Self { path, file })
    }

    /// Open an existing file for appending.
    pub fn open(path: impl AsRef<Path>) -> SolverResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .append(true)
            .open(&path)
            .map_err(|e| match e.kind() {
                io::ErrorKind::NotFound => SolverError::FileNotFound(path.clone()),
                _ => SolverError::Io(e),
            })?;
        Ok(Self { path, file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&mut self, point: ProgressPoint) -> SolverResult<()> {
        writeln!(self.file, "{}, {}", point.elapsed_ms, point.objective)?;
        self.file.flush()?;
        Ok(())
    }

    /// Parse a progress file written by [`ProgressLog::append`].
    pub fn read(path: impl AsRef<Path>) -> SolverResult<Vec<ProgressPoint>> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => SolverError::FileNotFound(path.to_path_buf()),
            _ => SolverError::Io(e),
        })?;
        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(parse_line)
            .collect()
    }
}

fn parse_line(line: &str) -> SolverResult<ProgressPoint> {
    let invalid = || {
        SolverError::Io(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("malformed progress line '{line}'"),
        ))
    };
    let (elapsed, objective) = line.split_once(',').ok_or_else(invalid)?;
    Ok(ProgressPoint {
        elapsed_ms: elapsed.trim().parse().map_err(|_| invalid())?,
        objective: objective.trim().parse().map_err(|_| invalid())?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("never_created.txt");
        match ProgressLog::open(&path) {
            Err(SolverError::FileNotFound(p)) => assert_eq!(p, path),
            other => panic!("expected FileNotFound, got {other:?}"),
        }
        assert!(!path.exists());
    }

    #[test]
    fn test_create_then_append() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("progress.txt");
        ProgressLog::create(&path).unwrap();

        let mut log = ProgressLog::open(&path).unwrap();
        log.append(ProgressPoint {
            elapsed_ms: 12,
            objective: 4.5,
        })
        .unwrap();
        log.append(ProgressPoint {
            elapsed_ms: 40,
            objective: 5.0,
        })
        .unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "12, 4.5\n40, 5\n");
        let points = ProgressLog::read(&path).unwrap();
        assert_eq!(points.len(), 2);
        assert_eq!(points[1].objective, 5.0);
    }

    #[test]
    fn test_malformed_line() {
        assert!(parse_line("12 4.5").is_err());
        assert!(parse_line("x, 4.5").is_err());
    }
}
