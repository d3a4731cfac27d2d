use super::*;
use crate::activation::{LoggingKeySender, VirtualKey};
use crate::capture::FrameSource;
use crate::color::{default_palette, Rgb};
use crate::config::AssistConfig;
use crate::detection::{NoopRecognizer, TextRecognizer};
use crate::error::CaptureError;
use crate::frame::{Frame, PixelFormat, Rect};
use crate::monitor::shared_source;
use image::RgbImage;
use std::sync::Arc;
use std::time::Duration;

const GOLD: Rgb = Rgb::new(255, 215, 0);

struct StaticSource {
    frame: Option<Frame>,
}

impl FrameSource for StaticSource {
    fn name(&self) -> &'static str {
        "static"
    }

    fn capture(&mut self) -> std::result::Result<Frame, CaptureError> {
        self.frame.clone().ok_or(CaptureError::NotInitialized)
    }
}

/// Gold box banner in the upper middle and a Red bar at `fill` health
fn game_frame(fill: f64) -> Frame {
    let mut frame = Frame::filled(800, 600, PixelFormat::Bgra32, Rgb::new(0, 0, 0));
    frame.fill_rect(Rect::new(370, 80, 60, 60), GOLD);

    let red = &default_palette()[0];
    let bounds = Rect::new(100, 500, 200, 20);
    let bright = (bounds.width as f64 * fill).round() as i32;
    frame.fill_rect(Rect::new(bounds.x, bounds.y, bright, bounds.height), red.bright);
    frame.fill_rect(
        Rect::new(bounds.x + bright, bounds.y, bounds.width - bright, bounds.height),
        red.dark,
    );
    frame
}

fn gold_box_text() -> Arc<dyn TextRecognizer> {
    Arc::new(|_image: &RgbImage| Some("GOLD BOX will be dropped soon".to_string()))
}

fn create_orchestrator(
    config: AssistConfig,
    frame: Option<Frame>,
) -> (AssistOrchestrator, Arc<LoggingKeySender>) {
    create_with_sources(config, frame.clone(), frame)
}

fn create_with_sources(
    config: AssistConfig,
    gold_box_frame: Option<Frame>,
    health_bar_frame: Option<Frame>,
) -> (AssistOrchestrator, Arc<LoggingKeySender>) {
    let sender = Arc::new(LoggingKeySender::new());
    let orchestrator = AssistOrchestrator::with_components(
        config,
        shared_source(StaticSource {
            frame: gold_box_frame,
        }),
        shared_source(StaticSource {
            frame: health_bar_frame,
        }),
        gold_box_text(),
        sender.clone(),
    )
    .unwrap();
    (orchestrator, sender)
}

#[tokio::test]
async fn test_orchestrator_creation() {
    let (orchestrator, _) = create_orchestrator(AssistConfig::default(), None);

    assert!(orchestrator.config().gold_box.enabled);
    assert!(orchestrator.gold_box().is_enabled());
    assert!(!orchestrator.gold_box().is_running());
    assert!(!orchestrator.health_bar().is_running());
    assert_eq!(orchestrator.event_bus().subscriber_count(), 0);
    assert!(orchestrator.get_all_component_states().await.is_empty());
}

#[tokio::test]
async fn test_invalid_target_color_is_rejected() {
    let mut config = AssistConfig::default();
    config.gold_box.target_color = "gold".to_string();

    let result = AssistOrchestrator::with_components(
        config,
        shared_source(StaticSource { frame: None }),
        shared_source(StaticSource { frame: None }),
        Arc::new(NoopRecognizer),
        Arc::new(LoggingKeySender::new()),
    );
    assert!(result.is_err());
}

#[tokio::test]
async fn test_initialize_registers_components() {
    let (mut orchestrator, _) = create_orchestrator(AssistConfig::default(), None);
    orchestrator.initialize().await.unwrap();

    let states = orchestrator.get_all_component_states().await;
    assert_eq!(states.len(), 3);
    for component in [EVENT_LOGGER, GOLD_BOX, HEALTH_BAR] {
        assert_eq!(
            orchestrator.get_component_state(component).await,
            Some(ComponentState::Stopped)
        );
    }
    assert_eq!(orchestrator.health_bar().detector().palette(), default_palette());
}

#[tokio::test]
async fn test_initialize_applies_calibrated_colors() {
    let mut config = AssistConfig::default();
    config.health_bar.custom_bright = Some("#FAFA78".to_string());
    config.health_bar.custom_dark = Some("#6E6E28".to_string());
    let (mut orchestrator, _) = create_orchestrator(config, None);

    orchestrator.initialize().await.unwrap();

    let palette = orchestrator.health_bar().detector().palette();
    assert_eq!(palette.len(), 1);
    assert_eq!(palette[0].bright, Rgb::new(250, 250, 120));
    assert_eq!(palette[0].dark, Rgb::new(110, 110, 40));
}

#[tokio::test]
async fn test_snapshot_runs_both_detectors() {
    let (orchestrator, sender) = create_orchestrator(AssistConfig::default(), Some(game_frame(0.5)));

    let snapshot = orchestrator.snapshot().await.unwrap();
    assert_eq!((snapshot.width, snapshot.height), (800, 600));
    assert_eq!(snapshot.source, "static");
    assert!(snapshot.gold_box.success);
    assert!(snapshot.health_bar.is_found);
    assert_eq!(snapshot.health_bar.team, "Red");
    assert!((snapshot.health_bar.health_percentage - 50.0).abs() <= 1.0);

    // Snapshots never activate anything
    assert_eq!(sender.press_count(), 0);

    let json = serde_json::to_value(&snapshot).unwrap();
    assert_eq!(json["gold_box"]["success"], true);
    assert_eq!(json["health_bar"]["team"], "Red");
}

#[tokio::test]
async fn test_snapshot_reports_capture_failure() {
    let (orchestrator, _) = create_orchestrator(AssistConfig::default(), None);
    assert!(orchestrator.snapshot().await.is_err());
}

#[tokio::test]
async fn test_run_until_shutdown_token() {
    let (mut orchestrator, sender) =
        create_orchestrator(AssistConfig::default(), Some(game_frame(0.2)));
    let mut events = orchestrator.event_bus().subscribe();

    orchestrator.initialize().await.unwrap();
    orchestrator.start().await.unwrap();
    assert_eq!(
        orchestrator.get_component_state(GOLD_BOX).await,
        Some(ComponentState::Running)
    );
    assert!(orchestrator.gold_box().is_running());
    assert!(orchestrator.health_bar().is_running());

    tokio::time::sleep(Duration::from_millis(300)).await;

    let token = orchestrator.shutdown_token();
    token.cancel();
    let exit_code = orchestrator.run().await.unwrap();
    assert_eq!(exit_code, 0);

    for component in [EVENT_LOGGER, GOLD_BOX, HEALTH_BAR] {
        assert_eq!(
            orchestrator.get_component_state(component).await,
            Some(ComponentState::Stopped)
        );
    }
    assert!(!orchestrator.gold_box().is_running());
    assert!(!orchestrator.health_bar().is_running());

    // 20% health is under the default 30% threshold; the 5 s cooldown allows one
    assert_eq!(sender.press_count(), 1);
    assert_eq!(sender.last_key(), Some(VirtualKey(0x52)));

    let mut types = Vec::new();
    while let Ok(event) = events.try_recv() {
        types.push(event.event_type());
    }
    assert_eq!(
        types.iter().filter(|t| **t == "gold_box_triggered").count(),
        1
    );
    assert_eq!(
        types.iter().filter(|t| **t == "repair_activated").count(),
        1
    );
    assert!(types.contains(&"health_updated"));
}

#[tokio::test]
async fn test_run_can_only_be_called_once() {
    let (mut orchestrator, _) = create_orchestrator(AssistConfig::default(), None);
    orchestrator.initialize().await.unwrap();

    orchestrator.shutdown_token().cancel();
    assert_eq!(orchestrator.run().await.unwrap(), 0);
    assert!(orchestrator.run().await.is_err());
}

#[tokio::test]
async fn test_monitors_capture_independently() {
    // The gold box source is broken; the health loop has its own and repairs anyway
    let (mut orchestrator, sender) =
        create_with_sources(AssistConfig::default(), None, Some(game_frame(0.2)));
    let mut events = orchestrator.event_bus().subscribe();

    orchestrator.initialize().await.unwrap();
    orchestrator.start().await.unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;
    orchestrator.shutdown_token().cancel();
    assert_eq!(orchestrator.run().await.unwrap(), 0);

    assert_eq!(sender.press_count(), 1);

    let mut types = Vec::new();
    while let Ok(event) = events.try_recv() {
        types.push(event.event_type());
    }
    assert!(types.contains(&"system_error"));
    assert!(types.contains(&"health_updated"));
    assert!(!types.contains(&"gold_box_triggered"));

    // Snapshots read through the gold box source
    assert!(orchestrator.snapshot().await.is_err());
}

#[test]
fn test_event_logger_filter() {
    let quiet = super::event_log::logger_filter(false);
    let health = crate::events::AssistEvent::HealthUpdated {
        state: crate::detection::HealthBarState::not_found(),
        timestamp: std::time::SystemTime::now(),
    };
    let repair = crate::events::AssistEvent::RepairActivated {
        key: "R".to_string(),
        timestamp: std::time::SystemTime::now(),
    };
    assert!(!quiet.matches(&health));
    assert!(quiet.matches(&repair));

    let verbose = super::event_log::logger_filter(true);
    assert!(verbose.matches(&health));
    assert!(verbose.matches(&repair));
}
