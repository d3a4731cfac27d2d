use crate::color::{default_palette, ColorPair, Rgb};
use crate::frame::{Frame, Rect};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

/// Margin added around the last known bar before the precise local scan
pub const LOCALITY_MARGIN: i32 = 50;

/// Row/column step of the full-frame fallback scan
pub const FULL_SCAN_STRIDE: usize = 4;

const MIN_BAR_WIDTH: i32 = 30;
const MIN_BAR_HEIGHT: i32 = 3;
const MAX_BAR_HEIGHT: i32 = 40;
const MIN_ASPECT_RATIO: f64 = 4.0;

/// Share of the sampled row that must be bar-colored; lower means something
/// else is covering the bar.
const VALIDITY_RATIO: f64 = 0.7;

// Width correction for bars whose colors saturate to "full"
const FULL_HEALTH_CUTOFF: f64 = 99.0;
const SHRUNK_WIDTH_RATIO: f64 = 0.9;

/// Result of one health bar detection pass
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HealthBarState {
    pub is_found: bool,
    /// 0..=100
    pub health_percentage: f64,
    pub team: String,
    pub bounds: Rect,
}

impl HealthBarState {
    pub fn not_found() -> Self {
        Self::default()
    }
}

/// What the detector remembers between calls
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DetectorMemory {
    /// Bounds of the most recent successful detection
    pub last_known_region: Option<Rect>,
    /// Widest bar seen so far, taken as the full-health width
    pub max_observed_width: i32,
    pub max_observed_bounds: Rect,
}

/// Which scan path produced each result
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DetectorStats {
    pub locality_hits: u64,
    pub full_scans: u64,
    pub misses: u64,
}

struct DetectorState {
    palette: Vec<ColorPair>,
    memory: DetectorMemory,
    stats: DetectorStats,
}

/// A verified bar candidate
#[derive(Debug, Clone, Copy)]
struct Bar {
    bounds: Rect,
    percentage: f64,
}

/// Locates the player's health bar and estimates how full it is.
///
/// All state lives behind one mutex, so concurrent callers are serialized.
pub struct HealthBarDetector {
    state: Mutex<DetectorState>,
}

impl HealthBarDetector {
    pub fn new() -> Self {
        Self::with_palette(default_palette())
    }

    pub fn with_palette(palette: Vec<ColorPair>) -> Self {
        Self {
            state: Mutex::new(DetectorState {
                palette,
                memory: DetectorMemory::default(),
                stats: DetectorStats::default(),
            }),
        }
    }

    /// Replace the palette with a single calibrated pair
    pub fn update_colors(&self, bright: Rgb, dark: Rgb) {
        let mut state = self.state.lock();
        state.palette = vec![ColorPair::custom(bright, dark)];
        state.memory.last_known_region = None;
        debug!("Health bar colors set to bright {} / dark {}", bright, dark);
    }

    /// Go back to the built-in team palettes
    pub fn reset_palette(&self) {
        let mut state = self.state.lock();
        state.palette = default_palette();
        state.memory.last_known_region = None;
    }

    /// Forget the last region and the learned full width
    pub fn reset_memory(&self) {
        self.state.lock().memory = DetectorMemory::default();
    }

    pub fn palette(&self) -> Vec<ColorPair> {
        self.state.lock().palette.clone()
    }

    pub fn memory(&self) -> DetectorMemory {
        self.state.lock().memory
    }

    pub fn stats(&self) -> DetectorStats {
        self.state.lock().stats
    }

    pub fn detect(&self, frame: &Frame) -> HealthBarState {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        if let Some(region) = state.memory.last_known_region {
            let area = region.inflate(LOCALITY_MARGIN).intersect(&frame.bounds());
            if let Some((bar, mode)) = scan(frame, &state.palette, area, 1) {
                state.stats.locality_hits += 1;
                let team = state.palette[mode].team.clone();
                return state.accept(bar, team);
            }
            trace!("Health bar not near {:?}, falling back to full scan", region);
        }

        state.stats.full_scans += 1;
        if let Some((bar, mode)) = scan(frame, &state.palette, frame.bounds(), FULL_SCAN_STRIDE) {
            let team = state.palette[mode].team.clone();
            return state.accept(bar, team);
        }

        state.stats.misses += 1;
        state.memory.last_known_region = None;
        HealthBarState::not_found()
    }
}

impl Default for HealthBarDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl DetectorState {
    fn accept(&mut self, bar: Bar, team: String) -> HealthBarState {
        let memory = &mut self.memory;
        memory.last_known_region = Some(bar.bounds);

        if bar.bounds.width > memory.max_observed_width {
            memory.max_observed_width = bar.bounds.width;
            memory.max_observed_bounds = bar.bounds;
        }

        let mut percentage = bar.percentage;
        let max_width = memory.max_observed_width as f64;
        let width = bar.bounds.width as f64;
        if percentage > FULL_HEALTH_CUTOFF
            && width < max_width * SHRUNK_WIDTH_RATIO
            && bar.bounds.intersects(&memory.max_observed_bounds)
        {
            let corrected = width / max_width * 100.0;
            trace!(
                "Bar reads {:.1}% but is {}px of {}px, using {:.1}%",
                percentage,
                bar.bounds.width,
                memory.max_observed_width,
                corrected
            );
            percentage = corrected;
        }

        HealthBarState {
            is_found: true,
            health_percentage: percentage.clamp(0.0, 100.0),
            team,
            bounds: bar.bounds,
        }
    }
}

/// Scan `area` for a pixel of any mode that leads to a verified bar.
/// Returns the bar and the index of its mode.
///
/// Columns are sampled every `stride` pixels. Rows are sampled at most
/// [`MIN_BAR_HEIGHT`] apart so no valid bar fits between two sampled rows.
fn scan(frame: &Frame, palette: &[ColorPair], area: Rect, stride: usize) -> Option<(Bar, usize)> {
    let area = area.intersect(&frame.bounds());
    if area.is_empty() {
        return None;
    }

    let column_step = stride.max(1) as i32;
    let row_step = stride.clamp(1, MIN_BAR_HEIGHT as usize);
    for y in (area.y..area.bottom()).step_by(row_step) {
        let mut x = area.x;
        while x < area.right() {
            let (r, g, b) = frame.rgb(x as u32, y as u32);
            let mut next = x + column_step;

            for (index, mode) in palette.iter().enumerate() {
                if !mode.is_bar(r, g, b) {
                    continue;
                }
                match locate(frame, mode, x, y) {
                    Ok(bar) => return Some((bar, index)),
                    // Nothing else on this span can verify for this mode
                    Err(span_end) => next = next.max(span_end + 1),
                }
            }

            x = next;
        }
    }

    None
}

/// Follow a bar-colored sample to the bright part of its row and verify from
/// there. A nearly empty bar may have only a pixel or two of bright color,
/// which a strided sample would step over.
fn locate(frame: &Frame, mode: &ColorPair, x: i32, y: i32) -> Result<Bar, i32> {
    let is_bar = |px: i32| {
        let (r, g, b) = frame.rgb(px as u32, y as u32);
        mode.is_bar(r, g, b)
    };

    let mut left = x;
    while left > 0 && is_bar(left - 1) {
        left -= 1;
    }

    let mut px = left;
    while px < frame.width() as i32 && is_bar(px) {
        let (r, g, b) = frame.rgb(px as u32, y as u32);
        if mode.is_bright(r, g, b) {
            return verify(frame, mode, px, y);
        }
        px += 1;
    }

    // No bright pixel: an empty bar is indistinguishable from background
    Err(px - 1)
}

/// Rebuild the bar around a bright hit at `(x, y)`. On rejection returns the
/// last column of the horizontal span so the scan can skip it.
fn verify(frame: &Frame, mode: &ColorPair, x: i32, y: i32) -> Result<Bar, i32> {
    let is_bar = |px: i32, py: i32| {
        let (r, g, b) = frame.rgb(px as u32, py as u32);
        mode.is_bar(r, g, b)
    };
    let width_px = frame.width() as i32;
    let height_px = frame.height() as i32;

    let mut left = x;
    while left > 0 && is_bar(left - 1, y) {
        left -= 1;
    }
    let mut right = x;
    while right + 1 < width_px && is_bar(right + 1, y) {
        right += 1;
    }

    let width = right - left + 1;
    if width < MIN_BAR_WIDTH {
        return Err(right);
    }

    let mid_x = left + width / 2;
    let mut top = y;
    while top > 0 && is_bar(mid_x, top - 1) {
        top -= 1;
    }
    let mut bottom = y;
    while bottom + 1 < height_px && is_bar(mid_x, bottom + 1) {
        bottom += 1;
    }

    let height = bottom - top + 1;
    if !(MIN_BAR_HEIGHT..=MAX_BAR_HEIGHT).contains(&height) {
        return Err(right);
    }
    if (width as f64 / height as f64) < MIN_ASPECT_RATIO {
        return Err(right);
    }

    let sample_y = top + height / 2;
    let (mut bright, mut dark) = (0u32, 0u32);
    for px in left..=right {
        let (r, g, b) = frame.rgb(px as u32, sample_y as u32);
        if mode.is_bright(r, g, b) {
            bright += 1;
        } else if mode.is_dark(r, g, b) {
            dark += 1;
        }
    }

    let classified = bright + dark;
    if classified == 0 || (classified as f64 / width as f64) < VALIDITY_RATIO {
        return Err(right);
    }

    Ok(Bar {
        bounds: Rect::from_corners(left, top, right, bottom),
        percentage: bright as f64 / classified as f64 * 100.0,
    })
}
