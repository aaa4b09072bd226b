use crate::outcome::SearchStatistics;
use crate::SolverResult;

/// Command returned by a monitor to control the search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchCommand {
    /// Keep searching.
    Continue,
    /// Stop at the next node boundary, with a reason.
    Terminate(String),
}

impl std::fmt::Display for SearchCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SearchCommand::Continue => write!(f, "Continue"),
            SearchCommand::Terminate(reason) => write!(f, "Terminate({reason})"),
        }
    }
}

/// Observer of a branch-and-bound search.
///
/// Monitors see node and incumbent events only; they cannot change the
/// search other than by requesting termination through
/// [`SearchMonitor::search_command`], which is polled before every node.
pub trait SearchMonitor: Send {
    fn name(&self) -> &str;

    /// Called once before the search starts. Must discard all state from any
    /// previous search.
    fn on_enter_search(&mut self);

    /// Called after each relaxation is solved.
    fn on_node(&mut self, _statistics: &SearchStatistics) {}

    /// Called when a new best integer-feasible assignment is found.
    fn on_incumbent(&mut self, objective: f64, statistics: &SearchStatistics) -> SolverResult<()>;

    fn search_command(&mut self, _statistics: &SearchStatistics) -> SearchCommand {
        SearchCommand::Continue
    }

    /// Called once when the search ends, whatever the reason.
    fn on_exit_search(&mut self, _statistics: &SearchStatistics) {}
}

impl std::fmt::Debug for dyn SearchMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SearchMonitor({})", self.name())
    }
}
