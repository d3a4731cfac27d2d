use super::FrameSource;
use crate::error::CaptureError;
use crate::frame::Frame;
use tracing::{debug, info, warn};

/// Counters for which backend produced frames
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CaptureStats {
    pub primary_frames: u64,
    pub fallback_frames: u64,
    pub failures: u64,
}

/// Tries a fast primary backend and drops to an always-available secondary
/// one whenever the primary is missing or fails. The primary is never
/// retried within the same call.
pub struct FallbackFrameSource {
    primary: Option<Box<dyn FrameSource>>,
    secondary: Box<dyn FrameSource>,
    primary_failing: bool,
    stats: CaptureStats,
}

impl FallbackFrameSource {
    pub fn new(primary: Option<Box<dyn FrameSource>>, secondary: Box<dyn FrameSource>) -> Self {
        match &primary {
            Some(p) => info!("Frame source: {} with {} fallback", p.name(), secondary.name()),
            None => info!("Frame source: {} only", secondary.name()),
        }

        Self {
            primary,
            secondary,
            primary_failing: false,
            stats: CaptureStats::default(),
        }
    }

    pub fn stats(&self) -> CaptureStats {
        self.stats
    }

    fn note_primary_error(&mut self, name: &str, error: &CaptureError) {
        if error.is_timeout() {
            debug!("{} produced no frame: {}", name, error);
        } else if !self.primary_failing {
            warn!("{} failed, falling back: {}", name, error);
        } else {
            debug!("{} still failing: {}", name, error);
        }
        if !error.is_timeout() {
            self.primary_failing = true;
        }
    }
}

impl FrameSource for FallbackFrameSource {
    fn name(&self) -> &'static str {
        self.primary
            .as_ref()
            .map(|p| p.name())
            .unwrap_or_else(|| self.secondary.name())
    }

    fn capture(&mut self) -> Result<Frame, CaptureError> {
        if let Some(primary) = self.primary.as_mut() {
            let name = primary.name();
            match primary.capture() {
                Ok(frame) => {
                    if self.primary_failing {
                        info!("{} recovered", name);
                        self.primary_failing = false;
                    }
                    self.stats.primary_frames += 1;
                    return Ok(frame);
                }
                Err(e) => self.note_primary_error(name, &e),
            }
        }

        match self.secondary.capture() {
            Ok(frame) => {
                self.stats.fallback_frames += 1;
                Ok(frame)
            }
            Err(e) => {
                self.stats.failures += 1;
                Err(e)
            }
        }
    }
}

/// Placeholder for platforms without a capture backend
#[derive(Debug, Default, Clone, Copy)]
pub struct UnsupportedCapture;

impl FrameSource for UnsupportedCapture {
    fn name(&self) -> &'static str {
        "unsupported"
    }

    fn capture(&mut self) -> Result<Frame, CaptureError> {
        Err(CaptureError::Unsupported)
    }
}
