//! Frame-paced output
//!
//! - [`channels`]: the shared per-channel table effects write into
//! - [`dispatcher`]: the fixed-rate loop that drains it
//! - [`protocol`]: HueStream v2 encoding
//! - [`sink`]: frame sinks (UDP, in-memory, log)

pub mod channels;
pub mod dispatcher;
pub mod protocol;
pub mod sink;

pub use channels::{ChannelState, ChannelTable, FrameSnapshot};
pub use dispatcher::StreamDispatcher;
pub use sink::{FrameSink, HueStreamSink, RecordingSink, TracingSink};

use crate::error::{ControlError, Result};
use serde::{Deserialize, Serialize};

/// Dispatcher settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Frames per second
    pub target_fps: f64,
    /// Channels in the entertainment area
    pub channel_count: usize,
    /// Lower brightness clamp applied per frame
    pub min_brightness: f64,
    /// Upper brightness clamp applied per frame
    pub max_brightness: f64,
    /// Frames in the achieved-rate window
    pub fps_window: usize,
    /// Consecutive send failures before a streaming error is published
    pub failure_threshold: u32,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            target_fps: 25.0,
            channel_count: 10,
            min_brightness: 0.1,
            max_brightness: 1.0,
            fps_window: 30,
            failure_threshold: 25,
        }
    }
}

impl StreamConfig {
    /// Check bounds
    pub fn validate(&self) -> Result<()> {
        if !self.target_fps.is_finite() || self.target_fps <= 0.0 || self.target_fps > 240.0 {
            return Err(ControlError::InvalidConfig(format!(
                "target_fps must be in (0, 240], got {}",
                self.target_fps
            )));
        }
        if self.channel_count == 0 || self.channel_count > u8::MAX as usize + 1 {
            return Err(ControlError::InvalidConfig(format!(
                "channel_count must be in 1..=256, got {}",
                self.channel_count
            )));
        }
        let bounded = |v: f64| v.is_finite() && (0.0..=1.0).contains(&v);
        if !bounded(self.min_brightness)
            || !bounded(self.max_brightness)
            || self.min_brightness > self.max_brightness
        {
            return Err(ControlError::InvalidConfig(format!(
                "brightness range [{}, {}] must lie within [0, 1] and be ordered",
                self.min_brightness, self.max_brightness
            )));
        }
        if self.fps_window < 2 {
            return Err(ControlError::InvalidConfig(
                "fps_window must be at least 2 frames".to_string(),
            ));
        }
        if self.failure_threshold == 0 {
            return Err(ControlError::InvalidConfig(
                "failure_threshold must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_valid() {
        assert!(StreamConfig::default().validate().is_ok());
    }

    #[test]
    fn test_invalid_configs() {
        let cases = [
            StreamConfig {
                target_fps: 0.0,
                ..Default::default()
            },
            StreamConfig {
                channel_count: 0,
                ..Default::default()
            },
            StreamConfig {
                min_brightness: 0.8,
                max_brightness: 0.5,
                ..Default::default()
            },
            StreamConfig {
                max_brightness: 1.5,
                ..Default::default()
            },
            StreamConfig {
                fps_window: 1,
                ..Default::default()
            },
        ];
        for config in cases {
            assert!(config.validate().is_err(), "{:?}", config);
        }
    }
}
