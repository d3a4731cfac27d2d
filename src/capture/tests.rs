use super::*;
use crate::color::Rgb;
use crate::frame::PixelFormat;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Backend that replays a fixed list of outcomes, then keeps failing
struct ScriptedSource {
    name: &'static str,
    script: VecDeque<Result<Frame, CaptureError>>,
    calls: Arc<AtomicUsize>,
}

impl ScriptedSource {
    fn new(
        name: &'static str,
        script: Vec<Result<Frame, CaptureError>>,
    ) -> (Box<dyn FrameSource>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let source = Self {
            name,
            script: script.into(),
            calls: calls.clone(),
        };
        (Box::new(source), calls)
    }
}

impl FrameSource for ScriptedSource {
    fn name(&self) -> &'static str {
        self.name
    }

    fn capture(&mut self) -> Result<Frame, CaptureError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.script
            .pop_front()
            .unwrap_or(Err(CaptureError::NotInitialized))
    }
}

fn frame(color: Rgb) -> Frame {
    Frame::filled(4, 4, PixelFormat::Bgra32, color)
}

#[test]
fn test_primary_frames_are_used_first() {
    let (primary, primary_calls) =
        ScriptedSource::new("primary", vec![Ok(frame(Rgb::new(1, 2, 3)))]);
    let (secondary, secondary_calls) = ScriptedSource::new("secondary", vec![]);
    let mut source = FallbackFrameSource::new(Some(primary), secondary);

    let captured = source.capture().unwrap();
    assert_eq!(captured.rgb(0, 0), (1, 2, 3));
    assert_eq!(primary_calls.load(Ordering::SeqCst), 1);
    assert_eq!(secondary_calls.load(Ordering::SeqCst), 0);
    assert_eq!(source.stats().primary_frames, 1);
    assert_eq!(source.name(), "primary");
}

#[test]
fn test_primary_failure_falls_back_once() {
    let (primary, primary_calls) =
        ScriptedSource::new("primary", vec![Err(CaptureError::AccessLost)]);
    let (secondary, secondary_calls) =
        ScriptedSource::new("secondary", vec![Ok(frame(Rgb::new(9, 9, 9)))]);
    let mut source = FallbackFrameSource::new(Some(primary), secondary);

    let captured = source.capture().unwrap();
    assert_eq!(captured.rgb(3, 3), (9, 9, 9));
    assert_eq!(primary_calls.load(Ordering::SeqCst), 1);
    assert_eq!(secondary_calls.load(Ordering::SeqCst), 1);
    assert_eq!(
        source.stats(),
        CaptureStats {
            primary_frames: 0,
            fallback_frames: 1,
            failures: 0,
        }
    );
}

#[test]
fn test_timeout_also_uses_fallback() {
    let (primary, _) = ScriptedSource::new(
        "primary",
        vec![Err(CaptureError::Timeout { timeout_ms: 100 })],
    );
    let (secondary, _) = ScriptedSource::new("secondary", vec![Ok(frame(Rgb::new(5, 5, 5)))]);
    let mut source = FallbackFrameSource::new(Some(primary), secondary);

    assert!(source.capture().is_ok());
    assert_eq!(source.stats().fallback_frames, 1);
}

#[test]
fn test_primary_recovers_after_failure() {
    let (primary, _) = ScriptedSource::new(
        "primary",
        vec![
            Err(CaptureError::AccessLost),
            Ok(frame(Rgb::new(7, 7, 7))),
        ],
    );
    let (secondary, _) = ScriptedSource::new("secondary", vec![Ok(frame(Rgb::new(1, 1, 1)))]);
    let mut source = FallbackFrameSource::new(Some(primary), secondary);

    assert_eq!(source.capture().unwrap().rgb(0, 0), (1, 1, 1));
    assert_eq!(source.capture().unwrap().rgb(0, 0), (7, 7, 7));
    assert_eq!(source.stats().primary_frames, 1);
    assert_eq!(source.stats().fallback_frames, 1);
}

#[test]
fn test_both_backends_failing_reports_secondary_error() {
    let (primary, _) = ScriptedSource::new("primary", vec![Err(CaptureError::AccessLost)]);
    let (secondary, _) = ScriptedSource::new(
        "secondary",
        vec![Err(CaptureError::Device {
            details: "BitBlt failed".to_string(),
        })],
    );
    let mut source = FallbackFrameSource::new(Some(primary), secondary);

    match source.capture() {
        Err(CaptureError::Device { details }) => assert_eq!(details, "BitBlt failed"),
        other => panic!("expected device error, got {:?}", other.map(|f| f.width())),
    }
    assert_eq!(source.stats().failures, 1);
}

#[test]
fn test_missing_primary_uses_secondary_only() {
    let (secondary, secondary_calls) = ScriptedSource::new(
        "secondary",
        vec![Ok(frame(Rgb::new(2, 2, 2))), Ok(frame(Rgb::new(3, 3, 3)))],
    );
    let mut source = FallbackFrameSource::new(None, secondary);

    assert_eq!(source.name(), "secondary");
    assert!(source.capture().is_ok());
    assert!(source.capture().is_ok());
    assert_eq!(secondary_calls.load(Ordering::SeqCst), 2);
    assert_eq!(source.stats().fallback_frames, 2);
}

#[test]
fn test_unsupported_capture_always_fails() {
    let mut source = UnsupportedCapture;
    assert!(matches!(source.capture(), Err(CaptureError::Unsupported)));
    assert!(matches!(source.capture(), Err(CaptureError::Unsupported)));
}

#[cfg(not(windows))]
#[test]
fn test_default_source_without_backend() {
    let mut source = default_source();
    assert!(matches!(source.capture(), Err(CaptureError::Unsupported)));
    assert_eq!(source.stats().failures, 1);
}
