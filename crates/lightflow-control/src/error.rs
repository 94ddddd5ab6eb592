//! Error types for the control side of the pipeline
use lightflow_core::CoreError;
use thiserror::Error;

/// Control system errors
#[derive(Error, Debug)]
pub enum ControlError {
    /// Rejected configuration value
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Operation attempted in the wrong lifecycle state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Channel index or parameter outside its domain
    #[error("Out of range: {0}")]
    OutOfRange(String),

    /// An effect callback failed
    #[error("Effect '{effect}' failed: {message}")]
    EffectFailure {
        /// Effect name
        effect: String,
        /// What went wrong
        message: String,
    },

    /// No factory registered under this name
    #[error("Unknown effect: {0}")]
    UnknownEffect(String),

    /// Frame sink or dispatcher failure
    #[error("Streaming error: {0}")]
    Stream(String),

    /// I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Error from the capture/analysis side
    #[error(transparent)]
    Core(#[from] CoreError),
}

impl ControlError {
    /// Shorthand for [`ControlError::EffectFailure`]
    pub fn effect(effect: impl Into<String>, message: impl Into<String>) -> Self {
        Self::EffectFailure {
            effect: effect.into(),
            message: message.into(),
        }
    }
}

/// Result type for control operations
pub type Result<T> = std::result::Result<T, ControlError>;
