use crate::error::EventBusError;
use crate::events::{AssistEvent, EventFilter, EventReceiver};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Stand-in for a UI: writes every event to the log until cancelled
pub(super) async fn run_event_logger(mut receiver: EventReceiver, token: CancellationToken) {
    debug!("Event logger '{}' started", receiver.name());

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            result = receiver.recv() => match result {
                Ok(event) => log_event(&event),
                Err(EventBusError::Lagged { skipped }) => {
                    debug!("Event logger skipped {} events", skipped);
                }
                Err(e) => {
                    warn!("Event logger stopping: {}", e);
                    break;
                }
            },
        }
    }

    debug!("Event logger '{}' stopped", receiver.name());
}

/// Everything when debugging events, otherwise only the notifications a
/// player would see. Errors are logged by the bus itself.
pub(super) fn logger_filter(debug_events: bool) -> EventFilter {
    if debug_events {
        EventFilter::All
    } else {
        EventFilter::EventTypes(vec![
            "gold_box_triggered",
            "gold_box_cleared",
            "repair_activated",
        ])
    }
}

fn log_event(event: &AssistEvent) {
    match event {
        // One per poll; only interesting when debugging detection
        AssistEvent::HealthUpdated { .. } => {
            debug!("[{}] {}", event.local_time(), event.description());
        }
        // Already logged by the bus
        AssistEvent::SystemError { .. } => {}
        _ => info!("[{}] {}", event.local_time(), event.description()),
    }
}
