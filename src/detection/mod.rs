mod gold_box;
mod health_bar;
pub mod ocr;

pub use gold_box::{GoldBoxDetection, GoldBoxDetector, GoldBoxDetectorBuilder};
pub use health_bar::{DetectorMemory, DetectorStats, HealthBarDetector, HealthBarState};
pub use ocr::{recognizer_from_config, NoopRecognizer, TextRecognizer};
