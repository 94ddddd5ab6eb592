//! Capture backends
//!
//! A backend knows how to list devices and open one of them. The returned
//! [`CaptureHandle`] owns whatever thread or stream the backend needs; stopping
//! it must join that thread before returning.

#[cfg(feature = "audio")]
pub mod cpal_backend;
pub mod synthetic;

use super::{AudioDevice, SampleBlock};
use crate::Result;
use std::sync::Arc;

/// Receives every block a capture produces. Called on the capture thread,
/// so implementations must not block.
pub type SampleSink = Arc<dyn Fn(SampleBlock) + Send + Sync>;

/// Device enumeration and stream creation
pub trait AudioBackend: Send {
    /// Short backend name for logs
    fn name(&self) -> &str;

    /// List capture-capable devices
    fn enumerate(&self) -> Result<Vec<AudioDevice>>;

    /// Open `device` and start delivering blocks to `sink`
    fn open(&self, device: &AudioDevice, sink: SampleSink) -> Result<Box<dyn CaptureHandle>>;
}

/// A running capture
pub trait CaptureHandle: Send {
    /// Native sample rate of the opened stream
    fn sample_rate(&self) -> u32;

    /// Device channel count before downmix
    fn channels(&self) -> u16;

    /// Stop delivery and join the capture thread. Idempotent.
    fn stop(&mut self);
}
