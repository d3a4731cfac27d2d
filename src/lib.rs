//! Screen-watching assistant for a tank game: detects the gold box drop
//! banner and the player's health bar, and presses the repair key when
//! health runs low.

pub mod activation;
pub mod app;
pub mod capture;
pub mod color;
pub mod config;
pub mod detection;
pub mod error;
pub mod events;
pub mod frame;
pub mod monitor;

pub use activation::{KeySender, VirtualKey};
pub use app::{AssistOrchestrator, ComponentState, ShutdownReason, Snapshot};
pub use capture::FrameSource;
pub use color::{ColorPair, Rgb};
pub use config::AssistConfig;
pub use detection::{GoldBoxDetection, GoldBoxDetector, HealthBarDetector, HealthBarState};
pub use error::{AssistError, Result};
pub use events::{AssistEvent, EventBus, EventFilter, EventReceiver};
pub use frame::{Frame, PixelFormat, Rect};
pub use monitor::{GoldBoxMonitor, HealthBarMonitor, HealthBarSettings};
