use super::ocr::{NoopRecognizer, TextRecognizer};
use crate::color::{self, Rgb, GOLD_BOX_TOLERANCE};
use crate::frame::{Frame, Rect};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, trace};

/// Matches needed (after 2x2 striding) before OCR is attempted
pub const MIN_PIXEL_COUNT: usize = 50;

/// Padding around the matched cluster so the OCR crop includes the banner text
pub const CROP_PADDING: i32 = 50;

const SCAN_STRIDE: usize = 2;
const SCAN_TOP_FRACTION: f64 = 0.35;
const SCAN_LEFT_FRACTION: f64 = 0.2;
const SCAN_RIGHT_FRACTION: f64 = 0.8;

/// Outcome of one gold box detection pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoldBoxDetection {
    /// Color cluster found and OCR confirmed the keyword
    pub success: bool,
    /// Enough target-colored pixels were found
    pub color_detected: bool,
    pub detected_text: Option<String>,
    pub error: Option<String>,
}

/// Finds the gold box drop banner: a cluster of the target color in the upper
/// middle of the screen whose surroundings read as the keyword.
pub struct GoldBoxDetector {
    target: RwLock<Rgb>,
    keyword: String,
    keyword_window: usize,
    recognizer: Arc<dyn TextRecognizer>,
}

impl GoldBoxDetector {
    pub fn new(target: Rgb, recognizer: Arc<dyn TextRecognizer>) -> Self {
        Self {
            target: RwLock::new(target),
            keyword: "gold".to_string(),
            keyword_window: 20,
            recognizer,
        }
    }

    pub fn builder() -> GoldBoxDetectorBuilder {
        GoldBoxDetectorBuilder::new()
    }

    pub fn target(&self) -> Rgb {
        *self.target.read()
    }

    /// Replace the target color; takes effect on the next pass
    pub fn update_target(&self, target: Rgb) {
        debug!("Gold box target color set to {}", target);
        *self.target.write() = target;
    }

    /// The region the banner can appear in
    pub fn scan_region(width: u32, height: u32) -> Rect {
        let top = 0;
        let bottom = (height as f64 * SCAN_TOP_FRACTION) as i32;
        let left = (width as f64 * SCAN_LEFT_FRACTION) as i32;
        let right = (width as f64 * SCAN_RIGHT_FRACTION) as i32;
        Rect::new(left, top, right - left, bottom - top)
    }

    pub fn detect(&self, frame: &Frame) -> GoldBoxDetection {
        let target = self.target();
        let region = Self::scan_region(frame.width(), frame.height()).intersect(&frame.bounds());
        if region.is_empty() {
            return GoldBoxDetection::default();
        }

        let mut count = 0usize;
        let (mut min_x, mut min_y) = (i32::MAX, i32::MAX);
        let (mut max_x, mut max_y) = (i32::MIN, i32::MIN);

        for y in (region.y..region.bottom()).step_by(SCAN_STRIDE) {
            for x in (region.x..region.right()).step_by(SCAN_STRIDE) {
                let (r, g, b) = frame.rgb(x as u32, y as u32);
                if color::matches(r, g, b, target, GOLD_BOX_TOLERANCE) {
                    count += 1;
                    min_x = min_x.min(x);
                    min_y = min_y.min(y);
                    max_x = max_x.max(x);
                    max_y = max_y.max(y);
                }
            }
        }

        if count <= MIN_PIXEL_COUNT {
            trace!("Gold box color: {} matches, below threshold", count);
            return GoldBoxDetection::default();
        }

        let crop = Rect::from_corners(
            min_x - CROP_PADDING,
            min_y - CROP_PADDING,
            max_x + CROP_PADDING,
            max_y + CROP_PADDING,
        )
        .intersect(&frame.bounds());

        let image = match frame.crop_rgb(crop) {
            Some(image) => image,
            None => {
                return GoldBoxDetection {
                    color_detected: true,
                    error: Some(format!("degenerate crop {:?}", crop)),
                    ..Default::default()
                }
            }
        };

        debug!(
            "Gold box color cluster: {} matches, crop {}x{} at ({}, {})",
            count, crop.width, crop.height, crop.x, crop.y
        );

        let detected_text = self.recognizer.extract_text(&image);
        let success = detected_text
            .as_deref()
            .map(|text| self.keyword_near_start(text))
            .unwrap_or(false);

        GoldBoxDetection {
            success,
            color_detected: true,
            detected_text,
            error: None,
        }
    }

    /// The keyword must start within the first `keyword_window` characters;
    /// a match deep inside unrelated text is a coincidence.
    fn keyword_near_start(&self, text: &str) -> bool {
        let lower = text.to_lowercase();
        match lower.find(&self.keyword) {
            Some(index) => lower[..index].chars().count() < self.keyword_window,
            None => false,
        }
    }
}

/// Builder for GoldBoxDetector
pub struct GoldBoxDetectorBuilder {
    target: Rgb,
    keyword: String,
    keyword_window: usize,
    recognizer: Option<Arc<dyn TextRecognizer>>,
}

impl GoldBoxDetectorBuilder {
    pub fn new() -> Self {
        Self {
            target: Rgb::new(255, 215, 0),
            keyword: "gold".to_string(),
            keyword_window: 20,
            recognizer: None,
        }
    }

    pub fn target(mut self, target: Rgb) -> Self {
        self.target = target;
        self
    }

    /// Keyword to look for, compared case-insensitively
    pub fn keyword(mut self, keyword: impl Into<String>) -> Self {
        self.keyword = keyword.into();
        self
    }

    pub fn keyword_window(mut self, chars: usize) -> Self {
        self.keyword_window = chars;
        self
    }

    pub fn recognizer(mut self, recognizer: Arc<dyn TextRecognizer>) -> Self {
        self.recognizer = Some(recognizer);
        self
    }

    pub fn build(self) -> GoldBoxDetector {
        GoldBoxDetector {
            target: RwLock::new(self.target),
            keyword: self.keyword.to_lowercase(),
            keyword_window: self.keyword_window,
            recognizer: self
                .recognizer
                .unwrap_or_else(|| Arc::new(NoopRecognizer)),
        }
    }
}

impl Default for GoldBoxDetectorBuilder {
    fn default() -> Self {
        Self::new()
    }
}
