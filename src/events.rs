use crate::detection::HealthBarState;
use crate::error::EventBusError;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use tokio::sync::broadcast;
use tracing::{debug, error, warn};

/// Events produced by the detection loops
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AssistEvent {
    /// The gold box notification should be shown
    GoldBoxTriggered { timestamp: SystemTime },
    /// The gold box has been gone long enough to hide the notification
    GoldBoxCleared { timestamp: SystemTime },
    /// Result of one health bar poll, found or not
    HealthUpdated {
        state: HealthBarState,
        timestamp: SystemTime,
    },
    /// The repair key was sent to the game
    RepairActivated { key: String, timestamp: SystemTime },
    /// A loop hit an error it is backing off from
    SystemError { component: String, error: String },
}

impl AssistEvent {
    pub fn timestamp(&self) -> SystemTime {
        match self {
            AssistEvent::GoldBoxTriggered { timestamp } => *timestamp,
            AssistEvent::GoldBoxCleared { timestamp } => *timestamp,
            AssistEvent::HealthUpdated { timestamp, .. } => *timestamp,
            AssistEvent::RepairActivated { timestamp, .. } => *timestamp,
            AssistEvent::SystemError { .. } => SystemTime::now(),
        }
    }

    /// Wall-clock time of the event formatted for logs
    pub fn local_time(&self) -> String {
        let time: DateTime<Local> = self.timestamp().into();
        time.format("%H:%M:%S%.3f").to_string()
    }

    /// Get a human-readable description of the event
    pub fn description(&self) -> String {
        match self {
            AssistEvent::GoldBoxTriggered { .. } => "Gold box detected".to_string(),
            AssistEvent::GoldBoxCleared { .. } => "Gold box cleared".to_string(),
            AssistEvent::HealthUpdated { state, .. } => {
                if state.is_found {
                    format!(
                        "Health {:.1}% ({} bar at {},{})",
                        state.health_percentage, state.team, state.bounds.x, state.bounds.y
                    )
                } else {
                    "Health bar not found".to_string()
                }
            }
            AssistEvent::RepairActivated { key, .. } => format!("Repair activated with {}", key),
            AssistEvent::SystemError { component, error } => {
                format!("Error in {}: {}", component, error)
            }
        }
    }

    /// Get the event type as a string for filtering
    pub fn event_type(&self) -> &'static str {
        match self {
            AssistEvent::GoldBoxTriggered { .. } => "gold_box_triggered",
            AssistEvent::GoldBoxCleared { .. } => "gold_box_cleared",
            AssistEvent::HealthUpdated { .. } => "health_updated",
            AssistEvent::RepairActivated { .. } => "repair_activated",
            AssistEvent::SystemError { .. } => "system_error",
        }
    }
}

/// Broadcast bus between the monitors and whoever presents their results
pub struct EventBus {
    sender: broadcast::Sender<AssistEvent>,
    debug_logging: bool,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            debug_logging: false,
        }
    }

    /// Also log every published event at debug level
    pub fn with_debug_logging(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            debug_logging: true,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AssistEvent> {
        self.sender.subscribe()
    }

    /// Publish an event to all subscribers. Fails only when nobody listens.
    pub async fn publish(&self, event: AssistEvent) -> Result<usize, EventBusError> {
        match &event {
            AssistEvent::SystemError { component, error } => {
                error!("System error in {}: {}", component, error);
            }
            _ => {
                if self.debug_logging {
                    debug!("Publishing event: {}", event.description());
                }
            }
        }

        self.sender
            .send(event)
            .map_err(|e| EventBusError::PublishFailed {
                details: e.to_string(),
            })
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Clone for EventBus {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
            debug_logging: self.debug_logging,
        }
    }
}

/// Event filter for selective event handling
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventFilter {
    All,
    /// Only events whose [`AssistEvent::event_type`] is listed
    EventTypes(Vec<&'static str>),
}

impl EventFilter {
    pub fn matches(&self, event: &AssistEvent) -> bool {
        match self {
            EventFilter::All => true,
            EventFilter::EventTypes(types) => types.contains(&event.event_type()),
        }
    }
}

/// Named receiver that skips events its filter rejects
pub struct EventReceiver {
    receiver: broadcast::Receiver<AssistEvent>,
    filter: EventFilter,
    name: String,
}

impl EventReceiver {
    pub fn new(
        receiver: broadcast::Receiver<AssistEvent>,
        filter: EventFilter,
        name: impl Into<String>,
    ) -> Self {
        Self {
            receiver,
            filter,
            name: name.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Receive the next event that passes the filter
    pub async fn recv(&mut self) -> Result<AssistEvent, EventBusError> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => {
                    if self.filter.matches(&event) {
                        return Ok(event);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("Receiver '{}' lagged behind by {} events", self.name, n);
                    return Err(EventBusError::Lagged { skipped: n });
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("Event bus closed for receiver '{}'", self.name);
                    return Err(EventBusError::ChannelClosed);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Rect;
    use tokio::time::{timeout, Duration};

    fn health(percentage: f64) -> AssistEvent {
        AssistEvent::HealthUpdated {
            state: HealthBarState {
                is_found: true,
                health_percentage: percentage,
                team: "Red".to_string(),
                bounds: Rect::new(100, 200, 200, 20),
            },
            timestamp: SystemTime::now(),
        }
    }

    #[tokio::test]
    async fn test_event_bus_basic_operations() {
        let event_bus = EventBus::new(10);
        let mut receiver = event_bus.subscribe();

        let subscriber_count = event_bus.publish(health(60.0)).await.unwrap();
        assert_eq!(subscriber_count, 1);

        match receiver.recv().await.unwrap() {
            AssistEvent::HealthUpdated { state, .. } => {
                assert_eq!(state.health_percentage, 60.0);
            }
            other => panic!("Unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_fails() {
        let event_bus = EventBus::new(10);
        assert_eq!(event_bus.subscriber_count(), 0);
        let result = event_bus
            .publish(AssistEvent::GoldBoxTriggered {
                timestamp: SystemTime::now(),
            })
            .await;
        assert!(matches!(result, Err(EventBusError::PublishFailed { .. })));
    }

    #[tokio::test]
    async fn test_multiple_subscribers() {
        let event_bus = EventBus::new(10);
        let mut receiver1 = event_bus.subscribe();
        let mut receiver2 = event_bus.subscribe();
        assert_eq!(event_bus.subscriber_count(), 2);

        event_bus
            .publish(AssistEvent::GoldBoxCleared {
                timestamp: SystemTime::now(),
            })
            .await
            .unwrap();

        for receiver in [&mut receiver1, &mut receiver2] {
            let event = timeout(Duration::from_millis(100), receiver.recv())
                .await
                .unwrap()
                .unwrap();
            assert_eq!(event.event_type(), "gold_box_cleared");
        }
    }

    #[test]
    fn test_event_filter() {
        let filter = EventFilter::EventTypes(vec!["gold_box_triggered", "repair_activated"]);
        assert!(filter.matches(&AssistEvent::RepairActivated {
            key: "R".to_string(),
            timestamp: SystemTime::now(),
        }));
        assert!(!filter.matches(&health(50.0)));
        assert!(EventFilter::All.matches(&health(50.0)));
    }

    #[tokio::test]
    async fn test_filtered_receiver() {
        let event_bus = EventBus::new(10);
        let mut receiver = EventReceiver::new(
            event_bus.subscribe(),
            EventFilter::EventTypes(vec!["repair_activated"]),
            "repairs",
        );

        event_bus.publish(health(10.0)).await.unwrap();
        event_bus
            .publish(AssistEvent::RepairActivated {
                key: "R".to_string(),
                timestamp: SystemTime::now(),
            })
            .await
            .unwrap();

        let event = timeout(Duration::from_millis(100), receiver.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(event, AssistEvent::RepairActivated { ref key, .. } if key == "R"));

        // The filtered-out health update is not waiting behind it
        assert!(timeout(Duration::from_millis(50), receiver.recv()).await.is_err());
    }

    #[tokio::test]
    async fn test_lagged_receiver_reports_skipped_count() {
        let event_bus = EventBus::new(2);
        let mut receiver = EventReceiver::new(event_bus.subscribe(), EventFilter::All, "slow");

        for pct in [10.0, 20.0, 30.0, 40.0] {
            event_bus.publish(health(pct)).await.unwrap();
        }

        match receiver.recv().await {
            Err(EventBusError::Lagged { skipped }) => assert_eq!(skipped, 2),
            other => panic!("expected lag, got {:?}", other.map(|e| e.event_type())),
        }
        // The receiver resumes from the oldest retained event
        match receiver.recv().await.unwrap() {
            AssistEvent::HealthUpdated { state, .. } => assert_eq!(state.health_percentage, 30.0),
            other => panic!("Unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_descriptions() {
        assert_eq!(health(42.5).description(), "Health 42.5% (Red bar at 100,200)");
        let missing = AssistEvent::HealthUpdated {
            state: HealthBarState::not_found(),
            timestamp: SystemTime::now(),
        };
        assert_eq!(missing.description(), "Health bar not found");
        assert_eq!(missing.local_time().len(), "12:00:00.000".len());
    }
}
