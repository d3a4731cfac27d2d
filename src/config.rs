use crate::activation::VirtualKey;
use crate::color::Rgb;
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct AssistConfig {
    pub gold_box: GoldBoxConfig,
    pub health_bar: HealthBarConfig,
    pub activation: ActivationConfig,
    pub system: SystemConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct GoldBoxConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Hex color of the gold box banner, `#RRGGBB`
    #[serde(default = "default_gold_color")]
    pub target_color: String,

    /// Word OCR must find for a detection to count
    #[serde(default = "default_keyword")]
    pub keyword: String,

    /// Keyword must start within this many characters of the OCR text
    #[serde(default = "default_keyword_window")]
    pub keyword_window: usize,

    /// PaddleOCR model files; without them the gold box is never confirmed
    #[serde(default)]
    pub ocr: Option<OcrModelConfig>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct OcrModelConfig {
    pub detection_model: String,
    pub recognition_model: String,
    pub charset: String,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct HealthBarConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Repair when health is at or below this percentage
    #[serde(default = "default_threshold")]
    pub threshold: f64,

    /// Minimum milliseconds between two repairs
    #[serde(default = "default_cooldown_ms")]
    pub cooldown_ms: u64,

    /// Key name sent to the game, e.g. "R", "F4", "0x52"
    #[serde(default = "default_activation_key")]
    pub activation_key: String,

    #[serde(default = "default_target_fps")]
    pub target_fps: u32,

    /// Calibrated bar colors; both must be set to replace the team palette
    #[serde(default)]
    pub custom_bright: Option<String>,

    #[serde(default)]
    pub custom_dark: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ActivationConfig {
    /// Executable name of the game process
    #[serde(default = "default_process_name")]
    pub process_name: String,

    /// Log key presses instead of sending them
    #[serde(default)]
    pub dry_run: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct SystemConfig {
    #[serde(default = "default_event_bus_capacity")]
    pub event_bus_capacity: usize,

    /// Log every published event at debug level
    #[serde(default)]
    pub debug_events: bool,
}

impl AssistConfig {
    /// Load configuration from default sources (file + environment variables)
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_file("tankassist.toml")
    }

    /// Load configuration from a specific file path.
    ///
    /// Environment variables override the file, e.g.
    /// `TANKASSIST_HEALTH_BAR__THRESHOLD=25`.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy();
        debug!("Loading configuration from: {}", path_str);

        let settings = Config::builder()
            .set_default("gold_box.enabled", default_true())?
            .set_default("gold_box.target_color", default_gold_color())?
            .set_default("gold_box.keyword", default_keyword())?
            .set_default("gold_box.keyword_window", default_keyword_window() as i64)?
            .set_default("health_bar.enabled", default_true())?
            .set_default("health_bar.threshold", default_threshold())?
            .set_default("health_bar.cooldown_ms", default_cooldown_ms() as i64)?
            .set_default("health_bar.activation_key", default_activation_key())?
            .set_default("health_bar.target_fps", default_target_fps())?
            .set_default("activation.process_name", default_process_name())?
            .set_default("activation.dry_run", false)?
            .set_default(
                "system.event_bus_capacity",
                default_event_bus_capacity() as i64,
            )?
            .set_default("system.debug_events", false)?
            .add_source(File::with_name(&path_str).required(false))
            // Section and field names contain underscores, so nesting uses "__"
            .add_source(
                Environment::with_prefix("TANKASSIST")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        let config: AssistConfig = settings.try_deserialize()?;

        info!("Configuration loaded successfully");
        debug!("Final configuration: {:#?}", config);

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        Rgb::from_hex(&self.gold_box.target_color).map_err(|e| {
            ConfigError::Message(format!("gold_box.target_color: {}", e))
        })?;

        if self.gold_box.keyword.trim().is_empty() {
            return Err(ConfigError::Message(
                "Gold box keyword must not be empty".to_string(),
            ));
        }

        if let Some(ocr) = &self.gold_box.ocr {
            for (field, path) in [
                ("detection_model", &ocr.detection_model),
                ("recognition_model", &ocr.recognition_model),
                ("charset", &ocr.charset),
            ] {
                if path.trim().is_empty() {
                    return Err(ConfigError::Message(format!(
                        "gold_box.ocr.{} must not be empty",
                        field
                    )));
                }
            }
        }

        if !(0.0..=100.0).contains(&self.health_bar.threshold) {
            return Err(ConfigError::Message(format!(
                "Health threshold must be within 0-100, got {}",
                self.health_bar.threshold
            )));
        }

        if self.health_bar.target_fps == 0 || self.health_bar.target_fps > 1000 {
            return Err(ConfigError::Message(format!(
                "Health bar target_fps must be within 1-1000, got {}",
                self.health_bar.target_fps
            )));
        }

        self.health_bar
            .activation_key
            .parse::<VirtualKey>()
            .map_err(|e| ConfigError::Message(format!("health_bar.activation_key: {}", e)))?;

        match (&self.health_bar.custom_bright, &self.health_bar.custom_dark) {
            (Some(bright), Some(dark)) => {
                for (field, value) in [("custom_bright", bright), ("custom_dark", dark)] {
                    Rgb::from_hex(value).map_err(|e| {
                        ConfigError::Message(format!("health_bar.{}: {}", field, e))
                    })?;
                }
            }
            (None, None) => {}
            _ => {
                return Err(ConfigError::Message(
                    "health_bar.custom_bright and custom_dark must be set together".to_string(),
                ));
            }
        }

        if self.activation.process_name.trim().is_empty() {
            return Err(ConfigError::Message(
                "Activation process_name must not be empty".to_string(),
            ));
        }

        if self.system.event_bus_capacity == 0 {
            return Err(ConfigError::Message(
                "Event bus capacity must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

impl HealthBarConfig {
    /// Parsed custom palette, when both colors are configured
    pub fn custom_colors(&self) -> Option<(Rgb, Rgb)> {
        let bright = Rgb::from_hex(self.custom_bright.as_deref()?).ok()?;
        let dark = Rgb::from_hex(self.custom_dark.as_deref()?).ok()?;
        Some((bright, dark))
    }
}

impl Default for AssistConfig {
    fn default() -> Self {
        Self {
            gold_box: GoldBoxConfig {
                enabled: default_true(),
                target_color: default_gold_color(),
                keyword: default_keyword(),
                keyword_window: default_keyword_window(),
                ocr: None,
            },
            health_bar: HealthBarConfig {
                enabled: default_true(),
                threshold: default_threshold(),
                cooldown_ms: default_cooldown_ms(),
                activation_key: default_activation_key(),
                target_fps: default_target_fps(),
                custom_bright: None,
                custom_dark: None,
            },
            activation: ActivationConfig {
                process_name: default_process_name(),
                dry_run: false,
            },
            system: SystemConfig {
                event_bus_capacity: default_event_bus_capacity(),
                debug_events: false,
            },
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_gold_color() -> String {
    "#FFD700".to_string()
}
fn default_keyword() -> String {
    "gold".to_string()
}
fn default_keyword_window() -> usize {
    20
}

fn default_threshold() -> f64 {
    30.0
}
fn default_cooldown_ms() -> u64 {
    5000
}
fn default_activation_key() -> String {
    "R".to_string()
}
fn default_target_fps() -> u32 {
    30
}

fn default_process_name() -> String {
    "WorldOfTanks.exe".to_string()
}

fn default_event_bus_capacity() -> usize {
    100
}
