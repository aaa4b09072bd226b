use std::time::Duration;

use web_time::Instant;

use crate::monitor::search_monitor::{SearchCommand, SearchMonitor};
use crate::outcome::SearchStatistics;
use crate::SolverResult;

/// Terminates the search once a wall-clock duration has elapsed since
/// `on_enter_search`, regardless of progress.
#[derive(Debug, Clone)]
pub struct TimeLimitMonitor {
    time_limit: Duration,
    start_time: Option<Instant>,
}

impl TimeLimitMonitor {
    pub fn new(time_limit: Duration) -> Self {
        Self {
            time_limit,
            start_time: None,
        }
    }

    pub fn time_limit(&self) -> Duration {
        self.time_limit
    }
}

impl SearchMonitor for TimeLimitMonitor {
    fn name(&self) -> &str {
        "TimeLimitMonitor"
    }

    fn on_enter_search(&mut self) {
        self.start_time = Some(Instant::now());
    }

    fn on_incumbent(&mut self, _objective: f64, _statistics: &SearchStatistics) -> SolverResult<()> {
        Ok(())
    }

    fn search_command(&mut self, _statistics: &SearchStatistics) -> SearchCommand {
        match self.start_time {
            Some(start) if start.elapsed() >= self.time_limit => SearchCommand::Terminate(format!(
                "time limit of {:.3}s exceeded",
                self.time_limit.as_secs_f64()
            )),
            _ => SearchCommand::Continue,
        }
    }

    fn on_exit_search(&mut self, _statistics: &SearchStatistics) {
        self.start_time = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_limit_terminates_immediately() {
        let mut monitor = TimeLimitMonitor::new(Duration::ZERO);
        monitor.on_enter_search();
        assert!(matches!(
            monitor.search_command(&SearchStatistics::default()),
            SearchCommand::Terminate(_)
        ));
    }

    #[test]
    fn test_inactive_outside_search() {
        let mut monitor = TimeLimitMonitor::new(Duration::ZERO);
        assert_eq!(
            monitor.search_command(&SearchStatistics::default()),
            SearchCommand::Continue
        );
        monitor.on_enter_search();
        monitor.on_exit_search(&SearchStatistics::default());
        assert_eq!(
            monitor.search_command(&SearchStatistics::default()),
            SearchCommand::Continue
        );
    }

    #[test]
    fn test_generous_limit_continues() {
        let mut monitor = TimeLimitMonitor::new(Duration::from_secs(3600));
        monitor.on_enter_search();
        assert_eq!(
            monitor.search_command(&SearchStatistics::default()),
            SearchCommand::Continue
        );
    }
}
