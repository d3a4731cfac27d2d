//! Text recognition seam used to confirm gold box notifications.
//!
//! Detection only needs "what text is in this crop"; which engine answers is
//! decided at startup. Without the `paddle-ocr` feature the [`NoopRecognizer`]
//! is used and gold box detection never confirms.

use crate::config::OcrModelConfig;
use image::RgbImage;
use std::sync::Arc;
use tracing::warn;

/// Extracts text from a cropped screen region.
///
/// Implementations return `None` on any failure. They must never panic:
/// recognition runs inside the detection loops.
pub trait TextRecognizer: Send + Sync {
    fn extract_text(&self, image: &RgbImage) -> Option<String>;
}

impl<F> TextRecognizer for F
where
    F: Fn(&RgbImage) -> Option<String> + Send + Sync,
{
    fn extract_text(&self, image: &RgbImage) -> Option<String> {
        self(image)
    }
}

/// Recognizer that never reads anything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopRecognizer;

impl TextRecognizer for NoopRecognizer {
    fn extract_text(&self, _image: &RgbImage) -> Option<String> {
        None
    }
}

/// Pick the recognizer for the configured models. Falls back to
/// [`NoopRecognizer`] when no models are configured or they fail to load.
pub fn recognizer_from_config(models: Option<&OcrModelConfig>) -> Arc<dyn TextRecognizer> {
    let Some(models) = models else {
        warn!("No OCR models configured; gold box alerts will never be confirmed");
        return Arc::new(NoopRecognizer);
    };

    #[cfg(feature = "paddle-ocr")]
    {
        match PaddleRecognizer::new(
            &models.detection_model,
            &models.recognition_model,
            &models.charset,
        ) {
            Ok(recognizer) => Arc::new(recognizer),
            Err(e) => {
                warn!("Failed to load OCR models, gold box alerts disabled: {}", e);
                Arc::new(NoopRecognizer)
            }
        }
    }

    #[cfg(not(feature = "paddle-ocr"))]
    {
        warn!(
            "OCR models configured ({}) but built without the paddle-ocr feature",
            models.detection_model
        );
        Arc::new(NoopRecognizer)
    }
}

#[cfg(feature = "paddle-ocr")]
pub use paddle::PaddleRecognizer;

#[cfg(feature = "paddle-ocr")]
mod paddle {
    use super::TextRecognizer;
    use crate::error::{AssistError, Result};
    use image::RgbImage;
    use parking_lot::Mutex;
    use std::path::Path;
    use tracing::{debug, info};

    /// PaddleOCR through `ocr-rs`
    pub struct PaddleRecognizer {
        engine: Mutex<ocr_rs::OcrEngine>,
    }

    impl PaddleRecognizer {
        /// Load the detection, recognition and charset model files
        pub fn new(
            detection: impl AsRef<Path>,
            recognition: impl AsRef<Path>,
            charset: impl AsRef<Path>,
        ) -> Result<Self> {
            let thread_count = std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1);

            let engine = ocr_rs::OcrEngine::new(
                detection,
                recognition,
                charset,
                Some(ocr_rs::OcrEngineConfig {
                    backend: ocr_rs::Backend::CPU,
                    thread_count,
                    enable_parallel: thread_count > 1,
                    min_result_confidence: 0.5,
                    ..Default::default()
                }),
            )
            .map_err(|e| AssistError::component("ocr", e.to_string()))?;

            info!("PaddleOCR engine loaded ({} threads)", thread_count);

            Ok(Self {
                engine: Mutex::new(engine),
            })
        }
    }

    impl TextRecognizer for PaddleRecognizer {
        fn extract_text(&self, image: &RgbImage) -> Option<String> {
            let input = ocr_rs::preprocess::rgb_to_image(image.as_raw(), image.width(), image.height());

            match self.engine.lock().recognize(&input) {
                Ok(results) => Some(
                    results
                        .into_iter()
                        .map(|v| v.text)
                        .collect::<Vec<_>>()
                        .join(" "),
                ),
                Err(e) => {
                    debug!("OCR failed: {}", e);
                    None
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_noop_recognizer_reads_nothing() {
        let image = RgbImage::new(4, 4);
        assert_eq!(NoopRecognizer.extract_text(&image), None);
    }

    #[test]
    fn test_unconfigured_recognizer_reads_nothing() {
        let recognizer = recognizer_from_config(None);
        assert_eq!(recognizer.extract_text(&RgbImage::new(8, 8)), None);
    }

    #[test]
    fn test_closure_recognizer() {
        let recognizer = |image: &RgbImage| Some(format!("{}x{}", image.width(), image.height()));
        assert_eq!(
            recognizer.extract_text(&RgbImage::new(3, 2)).as_deref(),
            Some("3x2")
        );
    }
}
