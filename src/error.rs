use thiserror::Error;

#[derive(Error, Debug)]
pub enum AssistError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("Capture error: {0}")]
    Capture(#[from] CaptureError),

    #[error("Event bus error: {0}")]
    EventBus(#[from] EventBusError),

    #[error("Activation error: {0}")]
    Activation(#[from] ActivationError),

    #[error("Invalid color '{value}': {reason}")]
    InvalidColor { value: String, reason: String },

    #[error("System error: {message}")]
    System { message: String },

    #[error("Component error in {component}: {message}")]
    Component { component: String, message: String },
}

impl AssistError {
    pub fn system<S: Into<String>>(message: S) -> Self {
        Self::System {
            message: message.into(),
        }
    }

    pub fn component<C: Into<String>, M: Into<String>>(component: C, message: M) -> Self {
        Self::Component {
            component: component.into(),
            message: message.into(),
        }
    }
}

/// Screen capture failures. None of these reach the detection loops as
/// anything but "skip this poll".
#[derive(Error, Debug, Clone)]
pub enum CaptureError {
    #[error("Capture backend not initialized")]
    NotInitialized,

    #[error("Timed out waiting for a new frame after {timeout_ms}ms")]
    Timeout { timeout_ms: u32 },

    #[error("Desktop duplication access lost")]
    AccessLost,

    #[error("Capture device error: {details}")]
    Device { details: String },

    #[error("Captured frame is invalid: {details}")]
    InvalidFrame { details: String },

    #[error("Screen capture is not supported on this platform")]
    Unsupported,
}

impl CaptureError {
    /// Timeouts happen whenever the desktop is idle and are not worth a warning.
    pub fn is_timeout(&self) -> bool {
        matches!(self, CaptureError::Timeout { .. })
    }
}

#[derive(Error, Debug, Clone)]
pub enum EventBusError {
    #[error("Failed to publish event: {details}")]
    PublishFailed { details: String },

    #[error("Receiver lagged behind by {skipped} events")]
    Lagged { skipped: u64 },

    #[error("Event channel closed")]
    ChannelClosed,
}

#[derive(Error, Debug, Clone)]
pub enum ActivationError {
    #[error("Process '{name}' is not running")]
    ProcessNotFound { name: String },

    #[error("No window found for process '{name}'")]
    WindowNotFound { name: String },

    #[error("Failed to post key {key}: {details}")]
    PostFailed { key: String, details: String },

    #[error("Unknown key name '{name}'")]
    UnknownKey { name: String },
}

pub type Result<T> = std::result::Result<T, AssistError>;
