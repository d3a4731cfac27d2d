mod event_log;
mod orchestrator;
mod runtime;
mod shutdown;
mod snapshot;
mod startup;
mod state;
mod types;

#[cfg(test)]
mod tests;

pub use orchestrator::AssistOrchestrator;
pub use snapshot::Snapshot;
pub use types::{ComponentState, ShutdownReason};

/// Component names used for lifecycle tracking
pub const EVENT_LOGGER: &str = "event_logger";
pub const GOLD_BOX: &str = "gold_box";
pub const HEALTH_BAR: &str = "health_bar";
