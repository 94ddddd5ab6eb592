//! Error types for capture and analysis
use thiserror::Error;

/// Core pipeline errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    /// A configuration value was rejected at construction time
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Operation attempted in the wrong lifecycle state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Capture format cannot be normalized to mono f32
    #[error("Unsupported audio format: {0}")]
    UnsupportedFormat(String),

    /// Frequency or bin argument outside the valid domain
    #[error("Out of range: {0}")]
    OutOfRange(String),

    /// Audio device or host failure
    #[error("Audio device error: {0}")]
    Device(String),
}

/// Result type for core operations
pub type Result<T> = std::result::Result<T, CoreError>;
