//! Adaptive-threshold beat detection
//!
//! The estimator keeps a sliding window of recent low-band energies. A beat
//! is accepted when the newest value rises above `mean * multiplier`, the
//! window is not near-silent, and the refractory interval since the previous
//! beat has passed. Confidence is a heuristic clamp of how far the energy
//! overshoots the threshold, not a probability.

use super::bands::BandEnergy;
use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::{debug, trace, warn};

/// Beat detector tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BeatConfig {
    /// Energy history length; ~1 s at the analysis rate
    pub window_size: usize,
    /// Beat timestamps kept for BPM smoothing
    pub bpm_history: usize,
    /// Energy must exceed `mean * threshold_multiplier`
    pub threshold_multiplier: f64,
    /// Windows with a mean at or below this are treated as silence
    pub silence_floor: f64,
    /// Refractory interval between beats in milliseconds
    pub min_interval_ms: f64,
}

impl Default for BeatConfig {
    fn default() -> Self {
        Self {
            window_size: 43,
            bpm_history: 8,
            threshold_multiplier: 1.5,
            silence_floor: 0.001,
            min_interval_ms: 300.0,
        }
    }
}

impl BeatConfig {
    /// Reject configurations the detector cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.window_size == 0 {
            return Err(CoreError::InvalidConfig(
                "beat window_size must be at least 1".to_string(),
            ));
        }
        if self.bpm_history < 2 {
            return Err(CoreError::InvalidConfig(
                "beat bpm_history must be at least 2".to_string(),
            ));
        }
        if !self.threshold_multiplier.is_finite() || self.threshold_multiplier <= 0.0 {
            return Err(CoreError::InvalidConfig(format!(
                "threshold_multiplier must be positive, got {}",
                self.threshold_multiplier
            )));
        }
        if !self.silence_floor.is_finite() || self.silence_floor < 0.0 {
            return Err(CoreError::InvalidConfig(format!(
                "silence_floor must be non-negative, got {}",
                self.silence_floor
            )));
        }
        if !self.min_interval_ms.is_finite() || self.min_interval_ms < 0.0 {
            return Err(CoreError::InvalidConfig(format!(
                "min_interval_ms must be non-negative, got {}",
                self.min_interval_ms
            )));
        }
        Ok(())
    }
}

/// A detected beat
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BeatEvent {
    /// Energy value that triggered the beat
    pub energy: f64,
    /// Running tempo estimate, 0 until two beats are seen
    pub bpm: f64,
    /// Overshoot heuristic in `[0, 1]`
    pub confidence: f64,
    /// Seconds since capture start
    pub timestamp: f64,
}

/// Sliding-window onset detector with BPM smoothing
#[derive(Debug, Clone)]
pub struct BeatEstimator {
    config: BeatConfig,
    energies: VecDeque<f64>,
    beat_times: VecDeque<f64>,
    last_beat: Option<f64>,
    bpm: f64,
}

impl BeatEstimator {
    /// Create an estimator; fails with `InvalidConfig` on bad tuning
    pub fn new(config: BeatConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            energies: VecDeque::with_capacity(config.window_size),
            beat_times: VecDeque::with_capacity(config.bpm_history),
            last_beat: None,
            bpm: 0.0,
            config,
        })
    }

    /// Active tuning
    pub fn config(&self) -> &BeatConfig {
        &self.config
    }

    /// Current tempo estimate
    pub fn bpm(&self) -> f64 {
        self.bpm
    }

    /// True once the energy window is full
    pub fn is_primed(&self) -> bool {
        self.energies.len() >= self.config.window_size
    }

    /// Feed the low band of `bands`
    pub fn process_bands(&mut self, bands: &BandEnergy) -> Option<BeatEvent> {
        self.process(bands.low, bands.timestamp)
    }

    /// Feed one energy sample taken at `timestamp` seconds
    pub fn process(&mut self, energy: f64, timestamp: f64) -> Option<BeatEvent> {
        if !energy.is_finite() || energy < 0.0 || !timestamp.is_finite() {
            warn!(
                "Ignoring malformed energy sample {} at {}",
                energy, timestamp
            );
            return None;
        }

        self.energies.push_back(energy);
        while self.energies.len() > self.config.window_size {
            self.energies.pop_front();
        }
        if !self.is_primed() {
            return None;
        }

        let mean = self.energies.iter().sum::<f64>() / self.energies.len() as f64;
        let threshold = mean * self.config.threshold_multiplier;

        if energy <= threshold || mean <= self.config.silence_floor {
            return None;
        }

        if let Some(last) = self.last_beat {
            let elapsed_ms = (timestamp - last) * 1000.0;
            if elapsed_ms < self.config.min_interval_ms {
                trace!("Onset inside refractory window ({:.1} ms)", elapsed_ms);
                return None;
            }
        }

        self.last_beat = Some(timestamp);
        self.beat_times.push_back(timestamp);
        while self.beat_times.len() > self.config.bpm_history {
            self.beat_times.pop_front();
        }
        self.bpm = self.estimate_bpm();

        let confidence = (energy / threshold - 1.0).min(1.0).clamp(0.0, 1.0);
        debug!(
            "Beat: energy={:.4} threshold={:.4} bpm={:.1} confidence={:.2}",
            energy, threshold, self.bpm, confidence
        );

        Some(BeatEvent {
            energy,
            bpm: self.bpm,
            confidence,
            timestamp,
        })
    }

    /// Tempo from the mean interval across the timestamp window, which is
    /// `(last - first) / (n - 1)`
    fn estimate_bpm(&self) -> f64 {
        let (Some(first), Some(last)) = (self.beat_times.front(), self.beat_times.back()) else {
            return 0.0;
        };
        let intervals = self.beat_times.len().saturating_sub(1);
        if intervals == 0 {
            return 0.0;
        }
        let avg_ms = (last - first) * 1000.0 / intervals as f64;
        if avg_ms > 0.0 {
            60000.0 / avg_ms
        } else {
            0.0
        }
    }

    /// Clear both windows and zero the tempo
    pub fn reset(&mut self) {
        self.energies.clear();
        self.beat_times.clear();
        self.last_beat = None;
        self.bpm = 0.0;
        debug!("Beat estimator reset");
    }
}
