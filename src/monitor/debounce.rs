use std::time::{Duration, Instant};

/// Minimum time between two notifications
pub const NOTIFICATION_COOLDOWN: Duration = Duration::from_millis(2000);

/// How long the gold box must stay undetected before the notification hides
pub const CLEARANCE_DELAY: Duration = Duration::from_millis(1500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebounceEvent {
    Triggered,
    Cleared,
}

/// Turns per-poll detection booleans into show/hide transitions.
///
/// Showing requires the cooldown to have elapsed since the last trigger.
/// While visible, every detection refreshes the trigger time, so hiding
/// requires `clearance` of continuous non-detection.
#[derive(Debug, Clone)]
pub struct NotificationDebounce {
    cooldown: Duration,
    clearance: Duration,
    visible: bool,
    last_trigger: Option<Instant>,
}

impl NotificationDebounce {
    pub fn new(cooldown: Duration, clearance: Duration) -> Self {
        Self {
            cooldown,
            clearance,
            visible: false,
            last_trigger: None,
        }
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn last_trigger(&self) -> Option<Instant> {
        self.last_trigger
    }

    pub fn observe(&mut self, detected: bool, now: Instant) -> Option<DebounceEvent> {
        let elapsed = self.last_trigger.map(|t| now.saturating_duration_since(t));

        match (detected, self.visible) {
            (true, false) => {
                if elapsed.map_or(true, |e| e > self.cooldown) {
                    self.visible = true;
                    self.last_trigger = Some(now);
                    Some(DebounceEvent::Triggered)
                } else {
                    None
                }
            }
            (true, true) => {
                self.last_trigger = Some(now);
                None
            }
            (false, true) => {
                if elapsed.map_or(true, |e| e > self.clearance) {
                    self.visible = false;
                    Some(DebounceEvent::Cleared)
                } else {
                    None
                }
            }
            (false, false) => None,
        }
    }

    /// Hide immediately, e.g. when detection is switched off. The trigger
    /// time is kept so re-enabling still honors the cooldown.
    pub fn hide(&mut self) -> Option<DebounceEvent> {
        if self.visible {
            self.visible = false;
            Some(DebounceEvent::Cleared)
        } else {
            None
        }
    }
}

impl Default for NotificationDebounce {
    fn default() -> Self {
        Self::new(NOTIFICATION_COOLDOWN, CLEARANCE_DELAY)
    }
}
