use crate::error::{AssistError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Tolerance for small isolated color cues such as the gold box banner
pub const GOLD_BOX_TOLERANCE: i32 = 15;

/// Tolerance for classifying health bar body pixels
pub const HEALTH_BAR_TOLERANCE: i32 = 45;

/// An 8-bit RGB color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parse `#RRGGBB` or `RRGGBB`
    pub fn from_hex(value: &str) -> Result<Self> {
        let invalid = |reason: &str| AssistError::InvalidColor {
            value: value.to_string(),
            reason: reason.to_string(),
        };

        let hex = value.trim().trim_start_matches('#');
        if hex.len() != 6 || !hex.is_ascii() {
            return Err(invalid("expected six hex digits"));
        }

        let channel = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&hex[range], 16).map_err(|_| invalid("not a hex number"))
        };

        Ok(Self::new(channel(0..2)?, channel(2..4)?, channel(4..6)?))
    }

    pub fn to_hex(&self) -> String {
        format!("#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }

    /// Squared euclidean distance to another color
    #[inline]
    pub fn distance_sq(&self, r: u8, g: u8, b: u8) -> i32 {
        let dr = r as i32 - self.r as i32;
        let dg = g as i32 - self.g as i32;
        let db = b as i32 - self.b as i32;
        dr * dr + dg * dg + db * db
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for Rgb {
    type Err = AssistError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_hex(s)
    }
}

/// Whether `(r, g, b)` lies strictly inside the tolerance sphere around `target`.
#[inline]
pub fn matches(r: u8, g: u8, b: u8, target: Rgb, tolerance: i32) -> bool {
    target.distance_sq(r, g, b) < tolerance * tolerance
}

/// A bright/dark color pair describing one health bar palette.
///
/// The bright color is the filled part of the bar, the dark color the
/// depleted remainder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorPair {
    pub bright: Rgb,
    pub dark: Rgb,
    pub team: String,
}

impl ColorPair {
    pub fn new(bright: Rgb, dark: Rgb, team: impl Into<String>) -> Self {
        Self {
            bright,
            dark,
            team: team.into(),
        }
    }

    pub fn custom(bright: Rgb, dark: Rgb) -> Self {
        Self::new(bright, dark, "Custom")
    }

    #[inline]
    pub fn is_bright(&self, r: u8, g: u8, b: u8) -> bool {
        matches(r, g, b, self.bright, HEALTH_BAR_TOLERANCE)
    }

    #[inline]
    pub fn is_dark(&self, r: u8, g: u8, b: u8) -> bool {
        matches(r, g, b, self.dark, HEALTH_BAR_TOLERANCE)
    }

    #[inline]
    pub fn is_bar(&self, r: u8, g: u8, b: u8) -> bool {
        self.is_bright(r, g, b) || self.is_dark(r, g, b)
    }
}

/// Team palettes in search order
pub fn default_palette() -> Vec<ColorPair> {
    vec![
        ColorPair::new(Rgb::new(230, 50, 50), Rgb::new(90, 20, 20), "Red"),
        ColorPair::new(Rgb::new(60, 140, 255), Rgb::new(20, 50, 100), "Blue"),
        ColorPair::new(Rgb::new(80, 220, 60), Rgb::new(25, 80, 20), "Green"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_parsing() {
        assert_eq!(Rgb::from_hex("#FFD700").unwrap(), Rgb::new(255, 215, 0));
        assert_eq!(Rgb::from_hex("ffd700").unwrap(), Rgb::new(255, 215, 0));
        assert_eq!("  #102030 ".parse::<Rgb>().unwrap(), Rgb::new(16, 32, 48));

        assert!(Rgb::from_hex("#FFF").is_err());
        assert!(Rgb::from_hex("#GG0000").is_err());
        assert!(Rgb::from_hex("").is_err());
    }

    #[test]
    fn test_hex_formatting() {
        assert_eq!(Rgb::new(255, 215, 0).to_hex(), "#FFD700");
        assert_eq!(Rgb::new(1, 2, 3).to_string(), "#010203");
    }

    #[test]
    fn test_exact_color_matches() {
        let target = Rgb::new(200, 100, 50);
        assert!(matches(200, 100, 50, target, GOLD_BOX_TOLERANCE));
        assert!(matches(200, 100, 50, target, 1));
    }

    #[test]
    fn test_tolerance_boundary_is_exclusive() {
        let target = Rgb::new(100, 100, 100);

        // Distance exactly 15 along one axis
        assert!(!matches(115, 100, 100, target, GOLD_BOX_TOLERANCE));
        assert!(matches(114, 100, 100, target, GOLD_BOX_TOLERANCE));

        // 9² + 12² = 15²
        assert!(!matches(109, 112, 100, target, GOLD_BOX_TOLERANCE));
        assert!(matches(109, 111, 100, target, GOLD_BOX_TOLERANCE));
    }

    #[test]
    fn test_far_colors_never_match() {
        let target = Rgb::new(255, 215, 0);
        for (r, g, b) in [(0, 0, 0), (255, 255, 255), (255, 0, 0), (230, 215, 0)] {
            assert!(!matches(r, g, b, target, GOLD_BOX_TOLERANCE));
        }
    }

    #[test]
    fn test_default_palette_pairs_are_distinguishable() {
        for pair in default_palette() {
            assert!(pair.is_bright(pair.bright.r, pair.bright.g, pair.bright.b));
            assert!(!pair.is_dark(pair.bright.r, pair.bright.g, pair.bright.b));
            assert!(pair.is_dark(pair.dark.r, pair.dark.g, pair.dark.b));
            assert!(!pair.is_bright(pair.dark.r, pair.dark.g, pair.dark.b));
        }
    }
}
