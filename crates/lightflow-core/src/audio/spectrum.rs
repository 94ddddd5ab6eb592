//! Windowed FFT into a folded magnitude spectrum

use crate::error::{CoreError, Result};
use num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Magnitude spectrum of one transform
///
/// `magnitudes.len() == fft_size / 2` always holds.
#[derive(Debug, Clone, PartialEq)]
pub struct Spectrum {
    magnitudes: Vec<f32>,
    sample_rate: u32,
    fft_size: usize,
    timestamp: f64,
}

impl Spectrum {
    /// Build a spectrum from precomputed magnitudes.
    ///
    /// Fails with `InvalidConfig` when the length is not half of `fft_size`.
    pub fn new(
        magnitudes: Vec<f32>,
        sample_rate: u32,
        fft_size: usize,
        timestamp: f64,
    ) -> Result<Self> {
        if magnitudes.len() * 2 != fft_size {
            return Err(CoreError::InvalidConfig(format!(
                "spectrum of {} bins does not match transform size {}",
                magnitudes.len(),
                fft_size
            )));
        }
        Ok(Self {
            magnitudes,
            sample_rate,
            fft_size,
            timestamp,
        })
    }

    /// Bin magnitudes, DC first
    pub fn magnitudes(&self) -> &[f32] {
        &self.magnitudes
    }

    /// Sample rate of the transformed signal
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Transform size that produced this spectrum
    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    /// Seconds since capture start of the newest transformed sample
    pub fn timestamp(&self) -> f64 {
        self.timestamp
    }

    /// Number of bins
    pub fn len(&self) -> usize {
        self.magnitudes.len()
    }

    /// True for a zero-length spectrum (never produced by a transform)
    pub fn is_empty(&self) -> bool {
        self.magnitudes.is_empty()
    }

    /// Hz covered by one bin
    pub fn bin_width(&self) -> f64 {
        self.sample_rate as f64 / self.fft_size as f64
    }

    /// Index of the largest magnitude, ignoring DC
    pub fn peak_bin(&self) -> Option<usize> {
        self.magnitudes
            .iter()
            .enumerate()
            .skip(1)
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
    }
}

/// Hann-windowed forward FFT of a fixed power-of-two size
pub struct SpectrumTransform {
    size: usize,
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    /// 2 / sum(window): a full-scale sine lands near magnitude 1.0
    scale: f32,
    buffer: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
    transforms: u64,
}

impl std::fmt::Debug for SpectrumTransform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpectrumTransform")
            .field("size", &self.size)
            .field("transforms", &self.transforms)
            .finish()
    }
}

impl SpectrumTransform {
    /// Plan a transform. `size` must be a power of two no smaller than 2.
    pub fn new(size: usize) -> Result<Self> {
        if size < 2 || !size.is_power_of_two() {
            return Err(CoreError::InvalidConfig(format!(
                "transform size must be a power of two >= 2, got {}",
                size
            )));
        }

        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(size);

        // Periodic Hann window
        let window: Vec<f32> = (0..size)
            .map(|i| {
                let t = i as f32 / size as f32;
                0.5 * (1.0 - (2.0 * std::f32::consts::PI * t).cos())
            })
            .collect();
        let window_sum: f32 = window.iter().sum();
        let scale = if window_sum > 0.0 {
            2.0 / window_sum
        } else {
            0.0
        };

        let scratch_len = fft.get_inplace_scratch_len();
        debug!("SpectrumTransform planned: size={}", size);

        Ok(Self {
            size,
            fft,
            window,
            scale,
            buffer: vec![Complex::new(0.0, 0.0); size],
            scratch: vec![Complex::new(0.0, 0.0); scratch_len],
            transforms: 0,
        })
    }

    /// Transform size
    pub fn size(&self) -> usize {
        self.size
    }

    /// Number of spectra produced so far
    pub fn transforms(&self) -> u64 {
        self.transforms
    }

    /// Transform the first `size` samples.
    ///
    /// Returns `None` without transforming when fewer than `size` samples are
    /// given or the sample rate is zero.
    pub fn process(&mut self, samples: &[f32], sample_rate: u32, timestamp: f64) -> Option<Spectrum> {
        if sample_rate == 0 {
            warn!("Ignoring transform request with zero sample rate");
            return None;
        }
        if samples.len() < self.size {
            trace!(
                "Transform skipped: {} of {} samples available",
                samples.len(),
                self.size
            );
            return None;
        }

        for ((slot, &sample), &w) in self
            .buffer
            .iter_mut()
            .zip(samples.iter())
            .zip(self.window.iter())
        {
            let sample = if sample.is_finite() { sample } else { 0.0 };
            *slot = Complex::new(sample * w, 0.0);
        }

        self.fft
            .process_with_scratch(&mut self.buffer, &mut self.scratch);

        let half = self.size / 2;
        let magnitudes: Vec<f32> = self.buffer[..half]
            .iter()
            .map(|c| c.norm() * self.scale)
            .collect();

        self.transforms += 1;
        trace!("Transform #{} complete", self.transforms);

        Some(Spectrum {
            magnitudes,
            sample_rate,
            fft_size: self.size,
            timestamp,
        })
    }

    /// Hz per bin at `sample_rate`
    pub fn bin_width(&self, sample_rate: u32) -> f64 {
        sample_rate as f64 / self.size as f64
    }

    /// Nearest bin for `frequency`, clamped to the last folded bin.
    ///
    /// Fails with `OutOfRange` for negative or non-finite frequencies and for
    /// frequencies above Nyquist.
    pub fn bin_index_for(&self, frequency: f64, sample_rate: u32) -> Result<usize> {
        if sample_rate == 0 {
            return Err(CoreError::OutOfRange("sample rate must be positive".to_string()));
        }
        if !frequency.is_finite() || frequency < 0.0 {
            return Err(CoreError::OutOfRange(format!(
                "frequency {} Hz is not a non-negative number",
                frequency
            )));
        }
        let nyquist = sample_rate as f64 / 2.0;
        if frequency > nyquist {
            return Err(CoreError::OutOfRange(format!(
                "frequency {} Hz exceeds Nyquist {} Hz",
                frequency, nyquist
            )));
        }
        let bin = (frequency / self.bin_width(sample_rate)).round() as usize;
        Ok(bin.min(self.size / 2 - 1))
    }

    /// Center frequency of `bin`. Fails with `OutOfRange` past the folded half.
    pub fn frequency_for(&self, bin: usize, sample_rate: u32) -> Result<f64> {
        if sample_rate == 0 {
            return Err(CoreError::OutOfRange("sample rate must be positive".to_string()));
        }
        if bin >= self.size / 2 {
            return Err(CoreError::OutOfRange(format!(
                "bin {} outside 0..{}",
                bin,
                self.size / 2
            )));
        }
        Ok(bin as f64 * self.bin_width(sample_rate))
    }
}
