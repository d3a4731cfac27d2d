use super::{
    capture_and_detect, emit, next_delay, pause, DebounceEvent, FailureStreak,
    NotificationDebounce, SharedFrameSource, DISABLED_SLEEP, ERROR_BACKOFF,
};
use crate::color::Rgb;
use crate::detection::GoldBoxDetector;
use crate::error::{AssistError, Result};
use crate::events::{AssistEvent, EventBus};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

/// Target time between two gold box polls
pub const GOLD_BOX_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Watches for the gold box banner and emits debounced
/// [`AssistEvent::GoldBoxTriggered`] / [`AssistEvent::GoldBoxCleared`] events.
pub struct GoldBoxMonitor {
    detector: Arc<GoldBoxDetector>,
    source: SharedFrameSource,
    event_bus: Arc<EventBus>,
    enabled: Arc<AtomicBool>,
    cancellation_token: Option<CancellationToken>,
    task: Option<JoinHandle<()>>,
}

impl GoldBoxMonitor {
    pub fn new(
        detector: Arc<GoldBoxDetector>,
        source: SharedFrameSource,
        event_bus: Arc<EventBus>,
        enabled: bool,
    ) -> Self {
        Self {
            detector,
            source,
            event_bus,
            enabled: Arc::new(AtomicBool::new(enabled)),
            cancellation_token: None,
            task: None,
        }
    }

    pub fn detector(&self) -> Arc<GoldBoxDetector> {
        Arc::clone(&self.detector)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().map_or(false, |task| !task.is_finished())
    }

    /// Toggle detection and change the target color. An invalid color leaves
    /// both settings untouched.
    pub fn update_settings(&self, enabled: bool, color_hex: &str) -> Result<()> {
        let target = Rgb::from_hex(color_hex)?;
        self.detector.update_target(target);
        if self.enabled.swap(enabled, Ordering::Relaxed) != enabled {
            info!(
                "Gold box detection {}",
                if enabled { "enabled" } else { "disabled" }
            );
        }
        Ok(())
    }

    pub async fn start(&mut self) -> Result<()> {
        if self.is_running() {
            warn!("Gold box monitor is already running");
            return Ok(());
        }

        info!("Starting gold box monitor");

        let token = CancellationToken::new();
        let poll_loop = PollLoop {
            detector: Arc::clone(&self.detector),
            source: Arc::clone(&self.source),
            event_bus: Arc::clone(&self.event_bus),
            enabled: Arc::clone(&self.enabled),
            token: token.clone(),
        };

        self.task = Some(tokio::spawn(poll_loop.run()));
        self.cancellation_token = Some(token);
        Ok(())
    }

    /// Cancel the loop and wait for it to finish
    pub async fn stop(&mut self) -> Result<()> {
        let Some(task) = self.task.take() else {
            debug!("Gold box monitor is not running");
            return Ok(());
        };

        info!("Stopping gold box monitor");
        if let Some(token) = self.cancellation_token.take() {
            token.cancel();
        }

        task.await
            .map_err(|e| AssistError::component("gold_box_monitor", e.to_string()))?;

        info!("Gold box monitor stopped");
        Ok(())
    }
}

struct PollLoop {
    detector: Arc<GoldBoxDetector>,
    source: SharedFrameSource,
    event_bus: Arc<EventBus>,
    enabled: Arc<AtomicBool>,
    token: CancellationToken,
}

impl PollLoop {
    async fn run(self) {
        info!("Gold box poll loop started");

        let mut debounce = NotificationDebounce::default();
        let mut failures = FailureStreak::default();

        while !self.token.is_cancelled() {
            if !self.enabled.load(Ordering::Relaxed) {
                if debounce.hide().is_some() {
                    self.publish(DebounceEvent::Cleared).await;
                }
                if !pause(&self.token, DISABLED_SLEEP).await {
                    break;
                }
                continue;
            }

            let started = Instant::now();
            let detector = Arc::clone(&self.detector);
            let result = capture_and_detect(&self.source, move |frame| detector.detect(frame)).await;

            if self.token.is_cancelled() {
                break;
            }

            match result {
                Ok(detection) => {
                    let streak = failures.succeed();
                    if streak > 0 {
                        info!("Gold box polling recovered after {} failures", streak);
                    }
                    if let Some(error) = &detection.error {
                        debug!("Gold box detection error: {}", error);
                    }
                    trace!(
                        "Gold box poll: color={} success={}",
                        detection.color_detected,
                        detection.success
                    );

                    let now = Instant::now().into_std();
                    if let Some(event) = debounce.observe(detection.success, now) {
                        self.publish(event).await;
                    }

                    let delay = next_delay(GOLD_BOX_POLL_INTERVAL, started.elapsed());
                    if !pause(&self.token, delay).await {
                        break;
                    }
                }
                Err(e) => {
                    if failures.fail() {
                        warn!("Gold box poll failed: {}", e);
                        emit(
                            &self.event_bus,
                            AssistEvent::SystemError {
                                component: "gold_box_monitor".to_string(),
                                error: e.to_string(),
                            },
                        )
                        .await;
                    } else {
                        debug!("Gold box poll still failing: {}", e);
                    }
                    if !pause(&self.token, ERROR_BACKOFF).await {
                        break;
                    }
                }
            }
        }

        info!("Gold box poll loop ended");
    }

    async fn publish(&self, event: DebounceEvent) {
        let timestamp = SystemTime::now();
        let event = match event {
            DebounceEvent::Triggered => AssistEvent::GoldBoxTriggered { timestamp },
            DebounceEvent::Cleared => AssistEvent::GoldBoxCleared { timestamp },
        };
        emit(&self.event_bus, event).await;
    }
}
