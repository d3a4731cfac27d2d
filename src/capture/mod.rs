//! Screen capture backends.
//!
//! Detection loops only see [`FrameSource`]. On Windows the default source
//! prefers desktop duplication and falls back to a GDI screen copy.

#[cfg(windows)]
mod duplication;
mod fallback;
#[cfg(windows)]
mod gdi;
#[cfg(test)]
mod tests;

#[cfg(windows)]
pub use duplication::DesktopDuplication;
pub use fallback::{CaptureStats, FallbackFrameSource, UnsupportedCapture};
#[cfg(windows)]
pub use gdi::ScreenCopy;

use crate::error::CaptureError;
use crate::frame::Frame;

/// How long the primary backend waits for the next desktop frame
pub const ACQUIRE_TIMEOUT_MS: u32 = 100;

/// Produces a frame of the current screen on demand.
///
/// A single source is owned by one loop at a time; implementations keep
/// their OS handles to themselves and release them on drop.
pub trait FrameSource: Send {
    /// Short backend name for logs
    fn name(&self) -> &'static str;

    fn capture(&mut self) -> Result<Frame, CaptureError>;
}

/// Best frame source for this platform
#[cfg(windows)]
pub fn default_source() -> FallbackFrameSource {
    let primary: Option<Box<dyn FrameSource>> = match DesktopDuplication::new() {
        Ok(duplication) => Some(Box::new(duplication)),
        Err(e) => {
            tracing::warn!("Desktop duplication unavailable, using screen copy only: {}", e);
            None
        }
    };
    FallbackFrameSource::new(primary, Box::new(ScreenCopy::new()))
}

/// Best frame source for this platform
#[cfg(not(windows))]
pub fn default_source() -> FallbackFrameSource {
    tracing::warn!("No screen capture backend for this platform; every poll will be skipped");
    FallbackFrameSource::new(None, Box::new(UnsupportedCapture))
}
