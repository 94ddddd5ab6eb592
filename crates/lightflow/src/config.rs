//! Startup configuration
//!
//! One TOML file; every section is optional.
//!
//! ```toml
//! [log]
//! level = "debug"
//!
//! [audio]
//! device = "Loopback"
//!
//! [stream]
//! target_fps = 30.0
//! channel_count = 6
//!
//! [effect]
//! name = "Chase"
//! speed = 2.0
//!
//! [sink]
//! kind = "hue_stream"
//! target = "192.168.1.20:2100"
//! area_id = "1a8d99cc-967b-44f2-9202-43f976c0fa6b"
//! ```

use anyhow::{Context, Result};
use lightflow_control::{EffectConfig, StreamConfig};
use lightflow_core::{AnalysisConfig, LogConfig, SyntheticSignal};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;

/// Everything the binary reads at startup
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub log: LogConfig,
    pub audio: AudioSettings,
    pub analysis: AnalysisConfig,
    pub stream: StreamConfig,
    pub effect: EffectSettings,
    pub sink: SinkConfig,
}

/// Capture source selection
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioSettings {
    /// Device id, or a case-insensitive substring of its name
    pub device: Option<String>,
    /// Skip hardware and generate `signal` instead
    pub synthetic: bool,
    /// Generator used in synthetic mode and as the fallback
    pub signal: SyntheticSignal,
}

/// Effect to activate at startup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EffectSettings {
    pub name: String,
    #[serde(flatten)]
    pub params: EffectConfig,
}

impl Default for EffectSettings {
    fn default() -> Self {
        Self {
            name: "Pulse".to_string(),
            params: EffectConfig::default(),
        }
    }
}

/// Where frames go
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SinkConfig {
    /// Log frames at trace level
    #[default]
    Log,
    /// HueStream v2 over UDP
    HueStream { target: SocketAddr, area_id: String },
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;
        let config: Self = toml::from_str(&text)
            .with_context(|| format!("Failed to parse config file {:?}", path))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.analysis
            .validate()
            .context("Invalid [analysis] section")?;
        self.stream.validate().context("Invalid [stream] section")?;
        self.effect
            .params
            .validated()
            .context("Invalid [effect] section")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_is_default() {
        let config: AppConfig = toml::from_str("").unwrap();
        assert_eq!(config, AppConfig::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_sections() {
        let text = r#"
            [audio]
            synthetic = true
            signal = { kind = "sine", frequency = 440.0, amplitude = 0.5 }

            [stream]
            target_fps = 30.0
            channel_count = 6

            [effect]
            name = "Chase"
            speed = 2.0
            audio_reactive = false

            [sink]
            kind = "hue_stream"
            target = "127.0.0.1:2100"
            area_id = "area"
        "#;
        let config: AppConfig = toml::from_str(text).unwrap();
        assert!(config.audio.synthetic);
        assert_eq!(
            config.audio.signal,
            SyntheticSignal::Sine {
                frequency: 440.0,
                amplitude: 0.5
            }
        );
        assert_eq!(config.stream.channel_count, 6);
        assert_eq!(config.stream.min_brightness, 0.1);
        assert_eq!(config.effect.name, "Chase");
        assert_eq!(config.effect.params.speed, 2.0);
        assert!(!config.effect.params.audio_reactive);
        assert_eq!(config.effect.params.intensity, 0.8);
        assert!(matches!(config.sink, SinkConfig::HueStream { .. }));
    }

    #[test]
    fn test_invalid_stream_rejected() {
        let config: AppConfig = toml::from_str("[stream]\ntarget_fps = 0.0\n").unwrap();
        assert!(config.validate().is_err());
    }
}
