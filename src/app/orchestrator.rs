use super::types::{ComponentState, ShutdownReason};
use crate::activation::{key_sender_from_config, KeySender};
use crate::capture;
use crate::config::AssistConfig;
use crate::detection::{
    recognizer_from_config, GoldBoxDetector, HealthBarDetector, TextRecognizer,
};
use crate::error::Result;
use crate::events::EventBus;
use crate::monitor::{
    shared_source, GoldBoxMonitor, HealthBarMonitor, HealthBarSettings, SharedFrameSource,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Wires the frame source, detectors, monitors and event consumers together
pub struct AssistOrchestrator {
    pub(super) config: AssistConfig,
    pub(super) event_bus: Arc<EventBus>,
    /// Source used for one-off snapshots; shared with the gold box loop,
    /// whose 10 Hz polling leaves it idle most of the time
    pub(super) snapshot_source: SharedFrameSource,

    // Components
    pub(super) gold_box: GoldBoxMonitor,
    pub(super) health_bar: HealthBarMonitor,
    pub(super) event_logger: Option<JoinHandle<()>>,

    // Lifecycle management
    pub(super) component_states: Arc<Mutex<HashMap<String, ComponentState>>>,
    pub(super) shutdown_sender: Option<oneshot::Sender<ShutdownReason>>,
    pub(super) shutdown_receiver: Option<oneshot::Receiver<ShutdownReason>>,
    pub(super) cancellation_token: CancellationToken,
}

impl AssistOrchestrator {
    /// Create an orchestrator with the platform frame sources, the configured
    /// OCR engine and key sender.
    ///
    /// Each monitor gets its own source so a slow capture in one loop never
    /// delays the other. When the output cannot be duplicated twice the
    /// second source falls back to screen copy.
    pub async fn new(config: AssistConfig) -> Result<Self> {
        let gold_box_source = shared_source(capture::default_source());
        let health_bar_source = shared_source(capture::default_source());
        let recognizer = recognizer_from_config(config.gold_box.ocr.as_ref());
        let key_sender = key_sender_from_config(&config.activation);
        Self::with_components(
            config,
            gold_box_source,
            health_bar_source,
            recognizer,
            key_sender,
        )
    }

    /// Create an orchestrator around explicit collaborators
    pub fn with_components(
        config: AssistConfig,
        gold_box_source: SharedFrameSource,
        health_bar_source: SharedFrameSource,
        recognizer: Arc<dyn TextRecognizer>,
        key_sender: Arc<dyn KeySender>,
    ) -> Result<Self> {
        let event_bus = Arc::new(if config.system.debug_events {
            EventBus::with_debug_logging(config.system.event_bus_capacity)
        } else {
            EventBus::new(config.system.event_bus_capacity)
        });
        let (shutdown_sender, shutdown_receiver) = oneshot::channel();

        let gold_box_detector = Arc::new(
            GoldBoxDetector::builder()
                .target(crate::color::Rgb::from_hex(&config.gold_box.target_color)?)
                .keyword(config.gold_box.keyword.clone())
                .keyword_window(config.gold_box.keyword_window)
                .recognizer(recognizer)
                .build(),
        );
        let gold_box = GoldBoxMonitor::new(
            gold_box_detector,
            Arc::clone(&gold_box_source),
            Arc::clone(&event_bus),
            config.gold_box.enabled,
        );

        let health_bar = HealthBarMonitor::new(
            Arc::new(HealthBarDetector::new()),
            health_bar_source,
            Arc::clone(&event_bus),
            key_sender,
            HealthBarSettings::from_config(&config.health_bar)?,
        );

        info!("Assistant components created");

        Ok(Self {
            config,
            event_bus,
            snapshot_source: gold_box_source,
            gold_box,
            health_bar,
            event_logger: None,
            component_states: Arc::new(Mutex::new(HashMap::new())),
            shutdown_sender: Some(shutdown_sender),
            shutdown_receiver: Some(shutdown_receiver),
            cancellation_token: CancellationToken::new(),
        })
    }

    pub fn config(&self) -> &AssistConfig {
        &self.config
    }

    pub fn event_bus(&self) -> Arc<EventBus> {
        Arc::clone(&self.event_bus)
    }

    pub fn gold_box(&self) -> &GoldBoxMonitor {
        &self.gold_box
    }

    pub fn health_bar(&self) -> &HealthBarMonitor {
        &self.health_bar
    }

    /// Token that ends [`run`](Self::run) when cancelled
    pub fn shutdown_token(&self) -> CancellationToken {
        self.cancellation_token.clone()
    }
}
