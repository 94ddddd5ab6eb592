//! Per-block composition of transform, band reduction and beat detection

use super::bands::{BandEnergy, BandEnergyAnalyzer, BandRanges};
use super::beat::{BeatConfig, BeatEstimator, BeatEvent};
use super::spectrum::{Spectrum, SpectrumTransform};
use super::SampleBlock;
use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace, warn};

/// Accumulator bound, in transform sizes
const MAX_BUFFERED_TRANSFORMS: usize = 4;

/// Analysis tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Transform size, power of two
    pub fft_size: usize,
    /// Samples between successive transforms
    pub hop_size: usize,
    /// Capture → analysis queue depth in blocks
    pub queue_capacity: usize,
    /// Band edges
    pub bands: BandRanges,
    /// Beat detector tuning
    pub beat: BeatConfig,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            fft_size: 2048,
            hop_size: 2048,
            queue_capacity: 32,
            bands: BandRanges::default(),
            beat: BeatConfig::default(),
        }
    }
}

impl AnalysisConfig {
    /// Validate everything except the transform size, which
    /// [`SpectrumTransform::new`] checks itself
    pub fn validate(&self) -> Result<()> {
        if self.hop_size == 0 {
            return Err(CoreError::InvalidConfig("hop_size must be positive".to_string()));
        }
        if self.queue_capacity == 0 {
            return Err(CoreError::InvalidConfig(
                "queue_capacity must be positive".to_string(),
            ));
        }
        self.bands.validate()?;
        self.beat.validate()
    }
}

/// Output of one transform
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisFrame {
    /// Magnitude spectrum
    pub spectrum: Spectrum,
    /// Band energies of `spectrum`
    pub bands: BandEnergy,
    /// Beat detected on this frame, if any
    pub beat: Option<BeatEvent>,
}

/// Buffers captured samples and runs the analysis stages per hop
pub struct AnalysisChain {
    config: AnalysisConfig,
    transform: SpectrumTransform,
    analyzer: BandEnergyAnalyzer,
    beat: BeatEstimator,
    buffer: Vec<f32>,
    sample_rate: Option<u32>,
    discarded: u64,
}

impl AnalysisChain {
    /// Build all stages; fails on any invalid setting
    pub fn new(config: AnalysisConfig) -> Result<Self> {
        config.validate()?;
        let transform = SpectrumTransform::new(config.fft_size)?;
        let analyzer = BandEnergyAnalyzer::new(config.bands)?;
        let beat = BeatEstimator::new(config.beat.clone())?;
        info!(
            "Analysis chain ready: fft_size={}, hop_size={}",
            config.fft_size, config.hop_size
        );
        Ok(Self {
            buffer: Vec::with_capacity(config.fft_size * MAX_BUFFERED_TRANSFORMS),
            transform,
            analyzer,
            beat,
            sample_rate: None,
            discarded: 0,
            config,
        })
    }

    /// Active configuration
    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// The transform stage, for bin/frequency conversions
    pub fn transform(&self) -> &SpectrumTransform {
        &self.transform
    }

    /// Current tempo estimate
    pub fn bpm(&self) -> f64 {
        self.beat.bpm()
    }

    /// Samples currently waiting for a transform
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Samples thrown away because the accumulator was full
    pub fn discarded(&self) -> u64 {
        self.discarded
    }

    /// Append `block` and run every transform it completes
    pub fn process_block(&mut self, block: &SampleBlock) -> Vec<AnalysisFrame> {
        if block.is_empty() || block.sample_rate() == 0 {
            warn!(
                "Skipping malformed block: {} samples @ {} Hz",
                block.len(),
                block.sample_rate()
            );
            return Vec::new();
        }

        if self.sample_rate != Some(block.sample_rate()) {
            if let Some(old) = self.sample_rate {
                info!(
                    "Sample rate changed {} -> {} Hz, resetting analysis",
                    old,
                    block.sample_rate()
                );
            }
            self.reset();
            self.sample_rate = Some(block.sample_rate());
        }

        self.buffer.extend_from_slice(block.samples());

        let limit = self.config.fft_size * MAX_BUFFERED_TRANSFORMS;
        if self.buffer.len() > limit {
            let excess = self.buffer.len() - limit;
            self.buffer.drain(..excess);
            self.discarded += excess as u64;
            debug!("Analysis backlog: discarded {} oldest samples", excess);
        }

        let rate = block.sample_rate();
        let block_end = block.timestamp() + block.duration();
        let size = self.config.fft_size;
        let mut frames = Vec::new();

        while self.buffer.len() >= size {
            // Newest sample in the window lags the block end by what stays buffered
            let trailing = (self.buffer.len() - size) as f64 / rate as f64;
            let timestamp = block_end - trailing;

            if let Some(spectrum) = self.transform.process(&self.buffer[..size], rate, timestamp)
            {
                let bands = self.analyzer.analyze(&spectrum);
                let beat = self.beat.process_bands(&bands);
                frames.push(AnalysisFrame {
                    spectrum,
                    bands,
                    beat,
                });
            }

            let step = self.config.hop_size.min(self.buffer.len());
            self.buffer.drain(..step);
        }

        trace!(
            "Block @ {:.3}s produced {} frames, {} samples buffered",
            block.timestamp(),
            frames.len(),
            self.buffer.len()
        );
        frames
    }

    /// Drop buffered samples and beat history
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.beat.reset();
        self.sample_rate = None;
    }
}
