//! Polling loops that drive the detectors and turn their results into events.

mod debounce;
mod gold_box;
mod health_bar;
mod throttle;

pub use debounce::{DebounceEvent, NotificationDebounce, CLEARANCE_DELAY, NOTIFICATION_COOLDOWN};
pub use gold_box::{GoldBoxMonitor, GOLD_BOX_POLL_INTERVAL};
pub use health_bar::{HealthBarMonitor, HealthBarSettings};
pub use throttle::ActivationThrottle;

use crate::activation::{KeySender, VirtualKey};
use crate::capture::FrameSource;
use crate::error::{AssistError, Result};
use crate::events::{AssistEvent, EventBus};
use crate::frame::Frame;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Pause after a failed poll before trying again
pub const ERROR_BACKOFF: Duration = Duration::from_millis(1000);

/// Sleep between checks while a monitor is disabled
pub const DISABLED_SLEEP: Duration = Duration::from_millis(1000);

/// Frame source owned by one monitor; snapshots may borrow it between polls
pub type SharedFrameSource = Arc<Mutex<Box<dyn FrameSource>>>;

pub fn shared_source<S: FrameSource + 'static>(source: S) -> SharedFrameSource {
    Arc::new(Mutex::new(Box::new(source)))
}

/// Delay until the next poll: the period minus the time already spent,
/// never below 1 ms.
pub fn next_delay(period: Duration, elapsed: Duration) -> Duration {
    period
        .saturating_sub(elapsed)
        .max(Duration::from_millis(1))
}

/// Capture a frame and run `detect` on it off the async workers
async fn capture_and_detect<T, F>(source: &SharedFrameSource, detect: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce(&Frame) -> T + Send + 'static,
{
    let source = Arc::clone(source);
    tokio::task::spawn_blocking(move || -> Result<T> {
        let frame = source.lock().capture()?;
        Ok(detect(&frame))
    })
    .await
    .map_err(|e| AssistError::system(format!("Detection task failed: {}", e)))?
}

/// Press `key` off the async workers; finding the game window and posting
/// to it are blocking system calls
async fn press_key(sender: &Arc<dyn KeySender>, key: VirtualKey) -> Result<()> {
    let sender = Arc::clone(sender);
    tokio::task::spawn_blocking(move || sender.send_key(key))
        .await
        .map_err(|e| AssistError::system(format!("Key press task failed: {}", e)))?
}

/// Sleep for `delay` unless cancelled first. Returns false on cancellation.
async fn pause(token: &CancellationToken, delay: Duration) -> bool {
    tokio::select! {
        _ = token.cancelled() => false,
        _ = tokio::time::sleep(delay) => true,
    }
}

async fn emit(event_bus: &EventBus, event: AssistEvent) {
    if let Err(e) = event_bus.publish(event).await {
        debug!("Event not delivered: {}", e);
    }
}

/// Logs the first failure of a streak loudly and the rest quietly
#[derive(Debug, Default)]
struct FailureStreak {
    count: u64,
}

impl FailureStreak {
    /// Returns true for the first failure after a success
    fn fail(&mut self) -> bool {
        self.count += 1;
        self.count == 1
    }

    /// Returns the length of the streak that just ended
    fn succeed(&mut self) -> u64 {
        std::mem::take(&mut self.count)
    }
}
