//! Low/mid/high band energy reduction

use super::spectrum::Spectrum;
use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};
use tracing::{trace, warn};

/// Inclusive frequency range in Hz
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrequencyRange {
    /// Lower edge in Hz
    pub min_hz: f64,
    /// Upper edge in Hz
    pub max_hz: f64,
}

impl FrequencyRange {
    /// Create a range without validating it
    pub const fn new(min_hz: f64, max_hz: f64) -> Self {
        Self { min_hz, max_hz }
    }

    fn validate(&self, name: &str) -> Result<()> {
        if !self.min_hz.is_finite() || !self.max_hz.is_finite() {
            return Err(CoreError::InvalidConfig(format!(
                "{} band edges must be finite",
                name
            )));
        }
        if self.min_hz < 0.0 || self.max_hz <= self.min_hz {
            return Err(CoreError::InvalidConfig(format!(
                "{} band {}..{} Hz is empty or negative",
                name, self.min_hz, self.max_hz
            )));
        }
        Ok(())
    }

    /// Inclusive bin span for this range, `None` when it misses the spectrum
    fn bins(&self, spectrum: &Spectrum) -> Option<(usize, usize)> {
        let width = spectrum.bin_width();
        if spectrum.is_empty() || width <= 0.0 {
            return None;
        }
        let last = spectrum.len() - 1;
        let start = (self.min_hz / width).round() as usize;
        let end = ((self.max_hz / width).round() as usize).min(last);
        if start > end {
            None
        } else {
            Some((start, end))
        }
    }
}

/// The three analysis bands
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BandRanges {
    /// Bass band, default 20–250 Hz
    pub low: FrequencyRange,
    /// Mid band, default 250–2000 Hz
    pub mid: FrequencyRange,
    /// Treble band, default 2000–20000 Hz
    pub high: FrequencyRange,
}

impl Default for BandRanges {
    fn default() -> Self {
        Self {
            low: FrequencyRange::new(20.0, 250.0),
            mid: FrequencyRange::new(250.0, 2000.0),
            high: FrequencyRange::new(2000.0, 20000.0),
        }
    }
}

impl BandRanges {
    /// Check every range is non-empty and non-negative
    pub fn validate(&self) -> Result<()> {
        self.low.validate("low")?;
        self.mid.validate("mid")?;
        self.high.validate("high")
    }
}

/// Per-band energy of one spectrum
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BandEnergy {
    /// Mean squared magnitude in the low band
    pub low: f64,
    /// Mean squared magnitude in the mid band
    pub mid: f64,
    /// Mean squared magnitude in the high band
    pub high: f64,
    /// `low + mid + high`
    pub total: f64,
    /// Timestamp of the source spectrum
    pub timestamp: f64,
}

impl BandEnergy {
    /// Build from the three band values; `total` is derived.
    pub fn new(low: f64, mid: f64, high: f64, timestamp: f64) -> Self {
        Self {
            low,
            mid,
            high,
            total: low + mid + high,
            timestamp,
        }
    }
}

/// Stateless reducer from [`Spectrum`] to [`BandEnergy`]
#[derive(Debug, Clone)]
pub struct BandEnergyAnalyzer {
    ranges: BandRanges,
}

impl Default for BandEnergyAnalyzer {
    fn default() -> Self {
        Self {
            ranges: BandRanges::default(),
        }
    }
}

impl BandEnergyAnalyzer {
    /// Create an analyzer over validated `ranges`
    pub fn new(ranges: BandRanges) -> Result<Self> {
        ranges.validate()?;
        Ok(Self { ranges })
    }

    /// Configured bands
    pub fn ranges(&self) -> &BandRanges {
        &self.ranges
    }

    /// Reduce `spectrum` using its own sample rate and size.
    ///
    /// Bands above Nyquist are clamped to the last bin; a band that lies
    /// entirely above it reports zero.
    pub fn analyze(&self, spectrum: &Spectrum) -> BandEnergy {
        if spectrum.is_empty() || spectrum.sample_rate() == 0 {
            warn!("Band analysis on an empty spectrum; reporting silence");
            return BandEnergy::new(0.0, 0.0, 0.0, spectrum.timestamp());
        }

        let low = mean_square(spectrum, &self.ranges.low);
        let mid = mean_square(spectrum, &self.ranges.mid);
        let high = mean_square(spectrum, &self.ranges.high);
        let energy = BandEnergy::new(low, mid, high, spectrum.timestamp());
        trace!(
            "Bands: low={:.5} mid={:.5} high={:.5}",
            energy.low,
            energy.mid,
            energy.high
        );
        energy
    }
}

fn mean_square(spectrum: &Spectrum, range: &FrequencyRange) -> f64 {
    let Some((start, end)) = range.bins(spectrum) else {
        return 0.0;
    };
    let bins = &spectrum.magnitudes()[start..=end];
    let sum: f64 = bins
        .iter()
        .map(|&m| {
            let m = m as f64;
            m * m
        })
        .sum();
    sum / bins.len() as f64
}
