use super::event_log::{logger_filter, run_event_logger};
use super::{AssistOrchestrator, ComponentState, EVENT_LOGGER, GOLD_BOX, HEALTH_BAR};
use crate::error::Result;
use crate::events::EventReceiver;
use tracing::{error, info};

impl AssistOrchestrator {
    /// Register components and apply calibrated colors
    pub async fn initialize(&mut self) -> Result<()> {
        info!("Initializing assistant components");

        {
            let mut states = self.component_states.lock().await;
            for component in [EVENT_LOGGER, GOLD_BOX, HEALTH_BAR] {
                states.insert(component.to_string(), ComponentState::Stopped);
            }
        }

        if let Some((bright, dark)) = self.config.health_bar.custom_colors() {
            info!("Using calibrated health bar colors {} / {}", bright, dark);
            self.health_bar.update_colors(bright, dark);
        }

        info!("All components initialized successfully");
        Ok(())
    }

    /// Start the event logger and both monitors
    pub async fn start(&mut self) -> Result<()> {
        info!("Starting assistant");

        // Subscribe before the monitors run so no early event is missed
        self.set_component_state(EVENT_LOGGER, ComponentState::Starting)
            .await;
        let receiver = EventReceiver::new(
            self.event_bus.subscribe(),
            logger_filter(self.config.system.debug_events),
            "log",
        );
        self.event_logger = Some(tokio::spawn(run_event_logger(
            receiver,
            self.cancellation_token.child_token(),
        )));
        self.set_component_state(EVENT_LOGGER, ComponentState::Running)
            .await;

        self.set_component_state(GOLD_BOX, ComponentState::Starting)
            .await;
        if let Err(e) = self.gold_box.start().await {
            error!("Failed to start gold box monitor: {}", e);
            self.set_component_state(GOLD_BOX, ComponentState::Failed)
                .await;
            return Err(e);
        }
        self.set_component_state(GOLD_BOX, ComponentState::Running)
            .await;

        self.set_component_state(HEALTH_BAR, ComponentState::Starting)
            .await;
        if let Err(e) = self.health_bar.start().await {
            error!("Failed to start health bar monitor: {}", e);
            self.set_component_state(HEALTH_BAR, ComponentState::Failed)
                .await;
            return Err(e);
        }
        self.set_component_state(HEALTH_BAR, ComponentState::Running)
            .await;

        info!(
            "Assistant started (gold box {}, health bar {})",
            if self.gold_box.is_enabled() { "on" } else { "off" },
            if self.health_bar.settings().enabled { "on" } else { "off" }
        );
        Ok(())
    }
}
