//! Audio capture and analysis
//!
//! Data flows strictly downstream:
//! [`AudioSource`] → [`SpectrumTransform`] → [`BandEnergyAnalyzer`] → [`BeatEstimator`].
//! [`AnalysisChain`] composes the three analysis stages per captured block so the
//! capture domain only has to hand blocks off through a [`BlockQueue`].

pub mod backend;
pub mod bands;
pub mod beat;
pub mod chain;
pub mod format;
pub mod queue;
pub mod source;
pub mod spectrum;

pub use backend::synthetic::{SyntheticBackend, SyntheticSignal};
pub use backend::{AudioBackend, CaptureHandle, SampleSink};
pub use bands::{BandEnergy, BandEnergyAnalyzer, BandRanges, FrequencyRange};
pub use beat::{BeatConfig, BeatEstimator, BeatEvent};
pub use chain::{AnalysisChain, AnalysisConfig, AnalysisFrame};
pub use queue::BlockQueue;
pub use source::{AudioSource, CaptureState};
pub use spectrum::{Spectrum, SpectrumTransform};

#[cfg(feature = "audio")]
pub use backend::cpal_backend::CpalBackend;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Whether a device is captured directly or through loopback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AudioDeviceKind {
    /// Microphone / line input
    Input,
    /// Playback device captured via loopback
    Output,
}

/// A capture-capable audio endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioDevice {
    /// Backend-specific identifier, stable for the lifetime of the backend
    pub id: String,
    /// Human-readable device name
    pub name: String,
    /// Direct input or loopback output
    pub kind: AudioDeviceKind,
    /// Whether the host reports this as its default device of `kind`
    pub is_default: bool,
}

impl fmt::Display for AudioDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.kind {
            AudioDeviceKind::Input => "in",
            AudioDeviceKind::Output => "out",
        };
        write!(f, "({}) {}", tag, self.name)?;
        if self.is_default {
            write!(f, " [default]")?;
        }
        Ok(())
    }
}

/// One capture callback worth of mono samples
///
/// Samples are normalized to `[-1, 1]`. `channels` records how many device
/// channels were averaged into the mono signal.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleBlock {
    samples: Vec<f32>,
    sample_rate: u32,
    channels: u16,
    timestamp: f64,
}

impl SampleBlock {
    /// Create a block. `timestamp` is seconds since capture start.
    pub fn new(samples: Vec<f32>, sample_rate: u32, channels: u16, timestamp: f64) -> Self {
        Self {
            samples,
            sample_rate,
            channels,
            timestamp,
        }
    }

    /// Mono samples
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Sample rate in Hz
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Device channel count the block was downmixed from
    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Capture timestamp in seconds since capture start
    pub fn timestamp(&self) -> f64 {
        self.timestamp
    }

    /// Number of mono samples
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// True when the block carries no samples
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Block duration in seconds
    pub fn duration(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_duration() {
        let block = SampleBlock::new(vec![0.0; 441], 44100, 2, 1.5);
        assert!((block.duration() - 0.01).abs() < 1e-12);
        assert_eq!(block.channels(), 2);
        assert_eq!(block.timestamp(), 1.5);
    }

    #[test]
    fn test_block_duration_zero_rate() {
        let block = SampleBlock::new(vec![0.0; 10], 0, 1, 0.0);
        assert_eq!(block.duration(), 0.0);
    }

    #[test]
    fn test_device_display() {
        let device = AudioDevice {
            id: "out:Speakers".to_string(),
            name: "Speakers".to_string(),
            kind: AudioDeviceKind::Output,
            is_default: true,
        };
        assert_eq!(device.to_string(), "(out) Speakers [default]");
    }
}
