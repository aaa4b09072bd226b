//! Fan-out monitor.
//!
//! Events are dispatched to child monitors in insertion order.
//! `search_command` short-circuits on the first non-`Continue` response;
//! put stricter stop conditions first.

use crate::monitor::search_monitor::{SearchCommand, SearchMonitor};
use crate::outcome::SearchStatistics;
use crate::SolverResult;

#[derive(Debug, Default)]
pub struct CompositeMonitor {
    monitors: Vec<Box<dyn SearchMonitor>>,
}

impl CompositeMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_monitor<M>(&mut self, monitor: M)
    where
        M: SearchMonitor + 'static,
    {
        self.monitors.push(Box::new(monitor));
    }

    pub fn monitors(&self) -> &[Box<dyn SearchMonitor>] {
        &self.monitors
    }

    pub fn len(&self) -> usize {
        self.monitors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.monitors.is_empty()
    }
}

impl FromIterator<Box<dyn SearchMonitor>> for CompositeMonitor {
    fn from_iter<I: IntoIterator<Item = Box<dyn SearchMonitor>>>(iter: I) -> Self {
        Self {
            monitors: iter.into_iter().collect(),
        }
    }
}

impl SearchMonitor for CompositeMonitor {
    fn name(&self) -> &str {
        "CompositeMonitor"
    }

    fn on_enter_search(&mut self) {
        for monitor in &mut self.monitors {
            monitor.on_enter_search();
        }
    }

    fn on_node(&mut self, statistics: &SearchStatistics) {
        for monitor in &mut self.monitors {
            monitor.on_node(statistics);
        }
    }

    fn on_incumbent(&mut self, objective: f64, statistics: &SearchStatistics) -> SolverResult<()> {
        for monitor in &mut self.monitors {
            monitor.on_incumbent(objective, statistics)?;
        }
        Ok(())
    }

    fn search_command(&mut self, statistics: &SearchStatistics) -> SearchCommand {
        for monitor in &mut self.monitors {
            let command = monitor.search_command(statistics);
            if !matches!(command, SearchCommand::Continue) {
                return command;
            }
        }
        SearchCommand::Continue
    }

    fn on_exit_search(&mut self, statistics: &SearchStatistics) {
        for monitor in &mut self.monitors {
            monitor.on_exit_search(statistics);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(SearchCommand, &'static str);

    impl SearchMonitor for Fixed {
        fn name(&self) -> &str {
            self.1
        }
        fn on_enter_search(&mut self) {}
        fn on_incumbent(&mut self, _: f64, _: &SearchStatistics) -> SolverResult<()> {
            Ok(())
        }
        fn search_command(&mut self, _: &SearchStatistics) -> SearchCommand {
            self.0.clone()
        }
    }

    #[test]
    fn test_first_terminate_wins() {
        let mut composite = CompositeMonitor::new();
        composite.add_monitor(Fixed(SearchCommand::Continue, "a"));
        composite.add_monitor(Fixed(SearchCommand::Terminate("b".into()), "b"));
        composite.add_monitor(Fixed(SearchCommand::Terminate("c".into()), "c"));
        assert_eq!(composite.len(), 3);
        assert_eq!(
            composite.search_command(&SearchStatistics::default()),
            SearchCommand::Terminate("b".into())
        );
    }

    #[test]
    fn test_empty_continues() {
        let mut composite = CompositeMonitor::new();
        assert!(composite.is_empty());
        assert_eq!(
            composite.search_command(&SearchStatistics::default()),
            SearchCommand::Continue
        );
    }
}
