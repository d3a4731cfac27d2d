use super::AssistOrchestrator;
use crate::detection::{GoldBoxDetection, HealthBarState};
use crate::error::{AssistError, Result};
use serde::Serialize;
use tracing::info;

/// Both detectors' view of a single frame
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub width: u32,
    pub height: u32,
    pub source: &'static str,
    pub gold_box: GoldBoxDetection,
    pub health_bar: HealthBarState,
}

impl AssistOrchestrator {
    /// Capture one frame and run both detectors on it, without touching the
    /// monitors' debounce or cooldown state
    pub async fn snapshot(&self) -> Result<Snapshot> {
        let source = std::sync::Arc::clone(&self.snapshot_source);
        let gold_box = self.gold_box.detector();
        let health_bar = self.health_bar.detector();

        let snapshot = tokio::task::spawn_blocking(move || -> Result<Snapshot> {
            let mut source = source.lock();
            let frame = source.capture()?;
            Ok(Snapshot {
                width: frame.width(),
                height: frame.height(),
                source: source.name(),
                gold_box: gold_box.detect(&frame),
                health_bar: health_bar.detect(&frame),
            })
        })
        .await
        .map_err(|e| AssistError::system(format!("Snapshot task failed: {}", e)))??;

        info!(
            "Snapshot of {}x{} frame from {}",
            snapshot.width, snapshot.height, snapshot.source
        );
        Ok(snapshot)
    }
}
