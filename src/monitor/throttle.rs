use std::time::{Duration, Instant};

/// Allows an action at most once per cooldown. The first attempt always passes.
#[derive(Debug, Clone, Default)]
pub struct ActivationThrottle {
    last_activation: Option<Instant>,
}

impl ActivationThrottle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_activation(&self) -> Option<Instant> {
        self.last_activation
    }

    /// Strictly more than `cooldown` has passed since the last activation
    pub fn is_ready(&self, now: Instant, cooldown: Duration) -> bool {
        self.last_activation
            .map_or(true, |last| now.saturating_duration_since(last) > cooldown)
    }

    pub fn record(&mut self, now: Instant) {
        self.last_activation = Some(now);
    }

    /// Check and record in one step
    pub fn try_activate(&mut self, now: Instant, cooldown: Duration) -> bool {
        if self.is_ready(now, cooldown) {
            self.record(now);
            true
        } else {
            false
        }
    }
}
