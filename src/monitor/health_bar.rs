use super::{
    capture_and_detect, emit, next_delay, pause, press_key, ActivationThrottle, FailureStreak,
    SharedFrameSource, DISABLED_SLEEP, ERROR_BACKOFF,
};
use crate::activation::{KeySender, VirtualKey};
use crate::color::Rgb;
use crate::config::HealthBarConfig;
use crate::detection::{HealthBarDetector, HealthBarState};
use crate::error::{AssistError, Result};
use crate::events::{AssistEvent, EventBus};
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

/// Runtime-adjustable health bar behaviour
#[derive(Debug, Clone, PartialEq)]
pub struct HealthBarSettings {
    pub enabled: bool,
    /// Repair at or below this percentage
    pub threshold: f64,
    /// Minimum time between two repairs
    pub cooldown: Duration,
    pub key: VirtualKey,
    pub target_fps: u32,
}

impl HealthBarSettings {
    pub fn from_config(config: &HealthBarConfig) -> Result<Self> {
        Ok(Self {
            enabled: config.enabled,
            threshold: config.threshold,
            cooldown: Duration::from_millis(config.cooldown_ms),
            key: config.activation_key.parse()?,
            target_fps: config.target_fps,
        })
    }

    /// Target time between two polls
    pub fn frame_period(&self) -> Duration {
        Duration::from_millis(1000 / self.target_fps.max(1) as u64)
    }
}

/// Polls the health bar, publishes every reading and presses the repair key
/// when health drops to the threshold, at most once per cooldown.
pub struct HealthBarMonitor {
    detector: Arc<HealthBarDetector>,
    source: SharedFrameSource,
    event_bus: Arc<EventBus>,
    key_sender: Arc<dyn KeySender>,
    settings: Arc<RwLock<HealthBarSettings>>,
    cancellation_token: Option<CancellationToken>,
    task: Option<JoinHandle<()>>,
}

impl HealthBarMonitor {
    pub fn new(
        detector: Arc<HealthBarDetector>,
        source: SharedFrameSource,
        event_bus: Arc<EventBus>,
        key_sender: Arc<dyn KeySender>,
        settings: HealthBarSettings,
    ) -> Self {
        Self {
            detector,
            source,
            event_bus,
            key_sender,
            settings: Arc::new(RwLock::new(settings)),
            cancellation_token: None,
            task: None,
        }
    }

    pub fn detector(&self) -> Arc<HealthBarDetector> {
        Arc::clone(&self.detector)
    }

    pub fn settings(&self) -> HealthBarSettings {
        self.settings.read().clone()
    }

    /// Replace the settings; the loop picks them up on its next poll
    pub fn update_settings(&self, settings: HealthBarSettings) {
        debug!("Health bar settings updated: {:?}", settings);
        *self.settings.write() = settings;
    }

    /// Use a calibrated bright/dark pair instead of the team palettes
    pub fn update_colors(&self, bright: Rgb, dark: Rgb) {
        self.detector.update_colors(bright, dark);
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().map_or(false, |task| !task.is_finished())
    }

    pub async fn start(&mut self) -> Result<()> {
        if self.is_running() {
            warn!("Health bar monitor is already running");
            return Ok(());
        }

        info!("Starting health bar monitor");

        let token = CancellationToken::new();
        let poll_loop = PollLoop {
            detector: Arc::clone(&self.detector),
            source: Arc::clone(&self.source),
            event_bus: Arc::clone(&self.event_bus),
            key_sender: Arc::clone(&self.key_sender),
            settings: Arc::clone(&self.settings),
            token: token.clone(),
        };

        self.task = Some(tokio::spawn(poll_loop.run()));
        self.cancellation_token = Some(token);
        Ok(())
    }

    /// Cancel the loop and wait for it to finish
    pub async fn stop(&mut self) -> Result<()> {
        let Some(task) = self.task.take() else {
            debug!("Health bar monitor is not running");
            return Ok(());
        };

        info!("Stopping health bar monitor");
        if let Some(token) = self.cancellation_token.take() {
            token.cancel();
        }

        task.await
            .map_err(|e| AssistError::component("health_bar_monitor", e.to_string()))?;

        info!("Health bar monitor stopped");
        Ok(())
    }
}

struct PollLoop {
    detector: Arc<HealthBarDetector>,
    source: SharedFrameSource,
    event_bus: Arc<EventBus>,
    key_sender: Arc<dyn KeySender>,
    settings: Arc<RwLock<HealthBarSettings>>,
    token: CancellationToken,
}

impl PollLoop {
    async fn run(self) {
        info!("Health bar poll loop started");

        let mut throttle = ActivationThrottle::new();
        let mut failures = FailureStreak::default();

        while !self.token.is_cancelled() {
            let settings = self.settings.read().clone();
            if !settings.enabled {
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
                Ok(state) => {
                    let streak = failures.succeed();
                    if streak > 0 {
                        info!("Health bar polling recovered after {} failures", streak);
                    }

                    self.handle_state(state, &settings, &mut throttle).await;

                    let delay = next_delay(settings.frame_period(), started.elapsed());
                    if !pause(&self.token, delay).await {
                        break;
                    }
                }
                Err(e) => {
                    if failures.fail() {
                        warn!("Health bar poll failed: {}", e);
                        emit(
                            &self.event_bus,
                            AssistEvent::SystemError {
                                component: "health_bar_monitor".to_string(),
                                error: e.to_string(),
                            },
                        )
                        .await;
                    } else {
                        debug!("Health bar poll still failing: {}", e);
                    }
                    if !pause(&self.token, ERROR_BACKOFF).await {
                        break;
                    }
                }
            }
        }

        info!("Health bar poll loop ended");
    }

    async fn handle_state(
        &self,
        state: HealthBarState,
        settings: &HealthBarSettings,
        throttle: &mut ActivationThrottle,
    ) {
        let low = state.is_found && state.health_percentage <= settings.threshold;
        if state.is_found {
            trace!(
                "Health {:.1}% ({}) at {:?}",
                state.health_percentage,
                state.team,
                state.bounds
            );
        }

        emit(
            &self.event_bus,
            AssistEvent::HealthUpdated {
                state: state.clone(),
                timestamp: SystemTime::now(),
            },
        )
        .await;

        if !low {
            return;
        }

        let now = Instant::now().into_std();
        // The attempt uses up the cooldown whether or not the key arrives
        if !throttle.try_activate(now, settings.cooldown) {
            trace!("Repair suppressed by cooldown");
            return;
        }

        info!(
            "Health at {:.1}% (threshold {:.1}%), pressing {}",
            state.health_percentage, settings.threshold, settings.key
        );
        match press_key(&self.key_sender, settings.key).await {
            Ok(()) => {
                emit(
                    &self.event_bus,
                    AssistEvent::RepairActivated {
                        key: settings.key.to_string(),
                        timestamp: SystemTime::now(),
                    },
                )
                .await;
            }
            Err(e) => warn!(
                "Failed to send repair key {}, next attempt in {:?}: {}",
                settings.key, settings.cooldown, e
            ),
        }
    }
}
