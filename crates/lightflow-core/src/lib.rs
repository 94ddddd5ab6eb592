//! LightFlow Core - Audio capture and signal analysis
//!
//! This crate contains the audio half of the LightFlow pipeline:
//! - Device enumeration and capture (`cpal` or a synthetic generator)
//! - Windowed FFT into a folded magnitude spectrum
//! - Low/mid/high band energy reduction
//! - Adaptive-threshold beat detection with a running BPM estimate
//! - The analysis chain that composes the above per captured block
//!
//! Nothing in here knows about lights. The control crate consumes
//! [`BandEnergy`] and [`BeatEvent`] values produced by [`AnalysisChain`].

#![warn(missing_docs)]

pub mod audio;
pub mod error;
pub mod logging;

pub use audio::{
    AnalysisChain, AnalysisConfig, AnalysisFrame, AudioBackend, AudioDevice, AudioDeviceKind,
    AudioSource, BandEnergy, BandEnergyAnalyzer, BandRanges, BeatConfig, BeatEstimator,
    BeatEvent, BlockQueue, CaptureHandle, CaptureState, FrequencyRange, SampleBlock,
    SampleSink, Spectrum, SpectrumTransform, SyntheticBackend, SyntheticSignal,
};
pub use error::{CoreError, Result};
pub use logging::LogConfig;

#[cfg(feature = "audio")]
pub use audio::CpalBackend;
