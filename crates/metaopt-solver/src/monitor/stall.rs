use std::time::Duration;

use web_time::Instant;

use crate::monitor::search_monitor::{SearchCommand, SearchMonitor};
use crate::outcome::SearchStatistics;
use crate::SolverResult;

/// Terminates the search when the incumbent has not improved for `window`.
///
/// The clock starts at `on_enter_search` and restarts on every strict
/// improvement of the best objective.
#[derive(Debug, Clone)]
pub struct NoImprovementMonitor {
    window: Duration,
    last_improvement: Option<Instant>,
    best_objective: Option<f64>,
}

impl NoImprovementMonitor {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_improvement: None,
            best_objective: None,
        }
    }

    pub fn best_objective(&self) -> Option<f64> {
        self.best_objective
    }
}

impl SearchMonitor for NoImprovementMonitor {
    fn name(&self) -> &str {
        "NoImprovementMonitor"
    }

    fn on_enter_search(&mut self) {
        self.last_improvement = Some(Instant::now());
        self.best_objective = None;
    }

    fn on_incumbent(&mut self, objective: f64, _statistics: &SearchStatistics) -> SolverResult<()> {
        if self.best_objective.map_or(true, |best| objective > best) {
            self.best_objective = Some(objective);
            self.last_improvement = Some(Instant::now());
        }
        Ok(())
    }

    fn search_command(&mut self, _statistics: &SearchStatistics) -> SearchCommand {
        match self.last_improvement {
            Some(at) if at.elapsed() >= self.window => SearchCommand::Terminate(format!(
                "no improvement within {:.3}s",
                self.window.as_secs_f64()
            )),
            _ => SearchCommand::Continue,
        }
    }

    fn on_exit_search(&mut self, _statistics: &SearchStatistics) {
        self.last_improvement = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_improvement_recorded_and_reset() {
        let stats = SearchStatistics::default();
        let mut monitor = NoImprovementMonitor::new(Duration::from_secs(3600));
        monitor.on_enter_search();
        monitor.on_incumbent(3.0, &stats).unwrap();
        monitor.on_incumbent(1.0, &stats).unwrap();
        assert_eq!(monitor.best_objective(), Some(3.0));
        assert_eq!(monitor.search_command(&stats), SearchCommand::Continue);

        monitor.on_enter_search();
        assert_eq!(monitor.best_objective(), None);
    }

    #[test]
    fn test_zero_window_terminates() {
        let stats = SearchStatistics::default();
        let mut monitor = NoImprovementMonitor::new(Duration::ZERO);
        monitor.on_enter_search();
        assert!(matches!(
            monitor.search_command(&stats),
            SearchCommand::Terminate(_)
        ));
    }
}
