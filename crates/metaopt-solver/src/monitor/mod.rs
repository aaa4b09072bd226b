//! Search monitors for the branch-and-bound backend.
//!
//! Monitors observe node and incumbent events and may ask the search to
//! stop. Every monitor resets in `on_enter_search`, so one instance can be
//! reused across independent solves.

pub mod composite;
pub mod progress;
pub mod search_monitor;
pub mod stall;
pub mod time_limit;

pub use composite::CompositeMonitor;
pub use progress::ProgressRecorder;
pub use search_monitor::{SearchCommand, SearchMonitor};
pub use stall::NoImprovementMonitor;
pub use time_limit::TimeLimitMonitor;
