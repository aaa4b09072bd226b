use std::sync::{Arc, Mutex};

use tracing::debug;
use web_time::Instant;

use crate::monitor::search_monitor::SearchMonitor;
use crate::outcome::SearchStatistics;
use crate::progress_log::{ProgressLog, ProgressPoint};
use crate::SolverResult;

/// Records `(elapsed_ms, objective)` for every incumbent, optionally
/// appending each sample to a [`ProgressLog`].
///
/// Samples live behind a shared handle so they can be read after the
/// monitor has been moved into a solver.
#[derive(Debug)]
pub struct ProgressRecorder {
    start_time: Option<Instant>,
    points: Arc<Mutex<Vec<ProgressPoint>>>,
    log: Option<ProgressLog>,
}

impl Default for ProgressRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressRecorder {
    pub fn new() -> Self {
        Self {
            start_time: None,
            points: Arc::new(Mutex::new(Vec::new())),
            log: None,
        }
    }

    pub fn with_log(log: ProgressLog) -> Self {
        Self {
            log: Some(log),
            ..Self::new()
        }
    }

    /// Shared view of the samples of the current (or last) search.
    pub fn points_handle(&self) -> Arc<Mutex<Vec<ProgressPoint>>> {
        Arc::clone(&self.points)
    }

    pub fn points(&self) -> Vec<ProgressPoint> {
        match self.points.lock() {
            Ok(points) => points.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl SearchMonitor for ProgressRecorder {
    fn name(&self) -> &str {
        "ProgressRecorder"
    }

    fn on_enter_search(&mut self) {
        self.start_time = Some(Instant::now());
        match self.points.lock() {
            Ok(mut points) => points.clear(),
            Err(poisoned) => poisoned.into_inner().clear(),
        }
    }

    fn on_incumbent(&mut self, objective: f64, _statistics: &SearchStatistics) -> SolverResult<()> {
        let elapsed_ms = self
            .start_time
            .map(|start| start.elapsed().as_millis())
            .unwrap_or_default();
        let point = ProgressPoint {
            elapsed_ms,
            objective,
        };
        debug!(elapsed_ms, objective, "incumbent recorded");
        match self.points.lock() {
            Ok(mut points) => points.push(point),
            Err(poisoned) => poisoned.into_inner().push(point),
        }
        if let Some(log) = self.log.as_mut() {
            log.append(point)?;
        }
        Ok(())
    }
}
