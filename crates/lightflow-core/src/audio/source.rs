//! Device selection and capture lifecycle

use super::backend::{AudioBackend, CaptureHandle, SampleSink};
use super::AudioDevice;
use crate::error::{CoreError, Result};
use tracing::{info, warn};

/// Capture lifecycle as seen by callers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    /// No stream open
    Idle,
    /// Stream open and delivering blocks
    Capturing,
}

/// Owns one capture stream on top of an [`AudioBackend`]
pub struct AudioSource<B: AudioBackend> {
    backend: B,
    selected: Option<AudioDevice>,
    capture: Option<Box<dyn CaptureHandle>>,
}

impl<B: AudioBackend> AudioSource<B> {
    /// Wrap a backend. Nothing is opened until [`AudioSource::start`].
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            selected: None,
            capture: None,
        }
    }

    /// Backend in use
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// List devices the backend can capture from
    pub fn enumerate(&self) -> Result<Vec<AudioDevice>> {
        self.backend.enumerate()
    }

    /// Choose the device for the next `start`
    pub fn select(&mut self, device: AudioDevice) -> Result<()> {
        if self.is_capturing() {
            return Err(CoreError::InvalidState(
                "cannot change device while capturing".to_string(),
            ));
        }
        info!("Selected audio device: {}", device);
        self.selected = Some(device);
        Ok(())
    }

    /// Select the backend's default input, falling back to the first device
    pub fn select_default(&mut self) -> Result<AudioDevice> {
        let devices = self.enumerate()?;
        let device = devices
            .iter()
            .find(|d| d.is_default && d.kind == super::AudioDeviceKind::Input)
            .or_else(|| devices.first())
            .cloned()
            .ok_or_else(|| CoreError::Device("no audio devices available".to_string()))?;
        self.select(device.clone())?;
        Ok(device)
    }

    /// Currently selected device
    pub fn selected_device(&self) -> Option<&AudioDevice> {
        self.selected.as_ref()
    }

    /// Open the selected device and deliver every block to `sink`
    pub fn start(&mut self, sink: SampleSink) -> Result<()> {
        let device = self
            .selected
            .as_ref()
            .ok_or_else(|| CoreError::InvalidState("no audio device selected".to_string()))?;

        if self.capture.is_some() {
            warn!("Capture already running on '{}'", device.name);
            return Ok(());
        }

        let handle = self.backend.open(device, sink)?;
        info!(
            "Capture started on '{}' via {} ({} Hz, {} ch)",
            device.name,
            self.backend.name(),
            handle.sample_rate(),
            handle.channels()
        );
        self.capture = Some(handle);
        Ok(())
    }

    /// Stop capturing. Safe to call when idle.
    pub fn stop(&mut self) {
        if let Some(mut handle) = self.capture.take() {
            handle.stop();
            info!("Capture stopped");
        }
    }

    /// Whether a stream is open
    pub fn is_capturing(&self) -> bool {
        self.capture.is_some()
    }

    /// Current lifecycle state
    pub fn state(&self) -> CaptureState {
        if self.is_capturing() {
            CaptureState::Capturing
        } else {
            CaptureState::Idle
        }
    }

    /// Native sample rate of the open stream
    pub fn sample_rate(&self) -> Option<u32> {
        self.capture.as_ref().map(|c| c.sample_rate())
    }
}

impl<B: AudioBackend> Drop for AudioSource<B> {
    fn drop(&mut self) {
        self.stop();
    }
}
