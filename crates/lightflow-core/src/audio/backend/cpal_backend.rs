//! `cpal` capture backend
//!
//! `cpal::Stream` is not `Send` on every host, so each capture lives on its own
//! thread: the thread builds and plays the stream, reports the outcome back,
//! then parks on a stop channel until the handle is stopped or dropped.

use super::{AudioBackend, CaptureHandle, SampleSink};
use crate::audio::format::{downmix_into, sanitize};
use crate::audio::{AudioDevice, AudioDeviceKind, SampleBlock};
use crate::error::{CoreError, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, Sample, SampleFormat, SizedSample};
use crossbeam_channel::{bounded, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// How long `open` waits for the capture thread to report the stream state
const OPEN_TIMEOUT: Duration = Duration::from_secs(5);

/// Capture backend for the platform's default `cpal` host
#[derive(Debug, Default)]
pub struct CpalBackend;

impl CpalBackend {
    /// Create a backend bound to the default host
    pub fn new() -> Self {
        Self
    }

    fn device_id(kind: AudioDeviceKind, name: &str) -> String {
        match kind {
            AudioDeviceKind::Input => format!("in:{}", name),
            AudioDeviceKind::Output => format!("out:{}", name),
        }
    }

    fn find_device(device: &AudioDevice) -> Result<cpal::Device> {
        let host = cpal::default_host();
        let mut devices = match device.kind {
            AudioDeviceKind::Input => host
                .input_devices()
                .map_err(|e| CoreError::Device(e.to_string()))?,
            AudioDeviceKind::Output => host
                .output_devices()
                .map_err(|e| CoreError::Device(e.to_string()))?,
        };
        devices
            .find(|d| d.name().map(|n| n == device.name).unwrap_or(false))
            .ok_or_else(|| CoreError::Device(format!("device '{}' not found", device.name)))
    }
}

impl AudioBackend for CpalBackend {
    fn name(&self) -> &str {
        "cpal"
    }

    fn enumerate(&self) -> Result<Vec<AudioDevice>> {
        let host = cpal::default_host();
        let default_in = host.default_input_device().and_then(|d| d.name().ok());
        let default_out = host.default_output_device().and_then(|d| d.name().ok());

        let mut devices = Vec::new();

        if let Ok(inputs) = host.input_devices() {
            for device in inputs {
                if let Ok(name) = device.name() {
                    devices.push(AudioDevice {
                        id: Self::device_id(AudioDeviceKind::Input, &name),
                        is_default: default_in.as_deref() == Some(name.as_str()),
                        name,
                        kind: AudioDeviceKind::Input,
                    });
                }
            }
        }

        if let Ok(outputs) = host.output_devices() {
            for device in outputs {
                if let Ok(name) = device.name() {
                    devices.push(AudioDevice {
                        id: Self::device_id(AudioDeviceKind::Output, &name),
                        is_default: default_out.as_deref() == Some(name.as_str()),
                        name,
                        kind: AudioDeviceKind::Output,
                    });
                }
            }
        }

        info!("Found {} audio devices", devices.len());
        Ok(devices)
    }

    fn open(&self, device: &AudioDevice, sink: SampleSink) -> Result<Box<dyn CaptureHandle>> {
        let (ready_tx, ready_rx) = bounded::<Result<(u32, u16)>>(1);
        let (stop_tx, stop_rx) = bounded::<()>(1);
        let device = device.clone();

        let thread = thread::Builder::new()
            .name("lightflow-capture".to_string())
            .spawn(move || {
                let stream = match build_stream(&device, sink) {
                    Ok(built) => built,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                let (stream, sample_rate, channels) = stream;
                if let Err(e) = stream.play() {
                    let _ = ready_tx.send(Err(CoreError::Device(e.to_string())));
                    return;
                }
                let _ = ready_tx.send(Ok((sample_rate, channels)));

                // Blocks until stop() sends or the handle is dropped
                let _ = stop_rx.recv();
                drop(stream);
                debug!("Capture stream for '{}' released", device.name);
            })
            .map_err(|e| CoreError::Device(format!("failed to spawn capture thread: {}", e)))?;

        match ready_rx.recv_timeout(OPEN_TIMEOUT) {
            Ok(Ok((sample_rate, channels))) => Ok(Box::new(CpalCapture {
                stop_tx: Some(stop_tx),
                thread: Some(thread),
                sample_rate,
                channels,
            })),
            Ok(Err(e)) => {
                let _ = thread.join();
                Err(e)
            }
            Err(_) => {
                drop(stop_tx);
                Err(CoreError::Device(format!(
                    "device did not open within {:?}",
                    OPEN_TIMEOUT
                )))
            }
        }
    }
}

fn build_stream(device: &AudioDevice, sink: SampleSink) -> Result<(cpal::Stream, u32, u16)> {
    let cpal_device = CpalBackend::find_device(device)?;

    // Loopback capture builds an input stream on the output device's own config
    let supported = match device.kind {
        AudioDeviceKind::Input => cpal_device.default_input_config(),
        AudioDeviceKind::Output => cpal_device.default_output_config(),
    }
    .map_err(|e| CoreError::Device(e.to_string()))?;

    let sample_rate = supported.sample_rate().0;
    let channels = supported.channels();
    let format = supported.sample_format();
    let config: cpal::StreamConfig = supported.into();

    info!(
        "Opening '{}': {} Hz, {} channels, {:?}",
        device.name, sample_rate, channels, format
    );

    let stream = match format {
        SampleFormat::F32 => build_typed::<f32>(&cpal_device, &config, sink),
        SampleFormat::I16 => build_typed::<i16>(&cpal_device, &config, sink),
        SampleFormat::U16 => build_typed::<u16>(&cpal_device, &config, sink),
        other => {
            return Err(CoreError::UnsupportedFormat(format!(
                "sample format {:?} cannot be normalized to f32",
                other
            )))
        }
    }?;

    Ok((stream, sample_rate, channels))
}

fn build_typed<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    sink: SampleSink,
) -> Result<cpal::Stream>
where
    T: SizedSample,
    f32: FromSample<T>,
{
    let channels = config.channels as usize;
    let sample_rate = config.sample_rate.0;
    let started = Instant::now();

    let data_fn = move |data: &[T], _: &cpal::InputCallbackInfo| {
        // The block owns its samples, so this is the only allocation per callback
        let mut mono = Vec::with_capacity(data.len() / channels.max(1));
        if let Err(e) = downmix_into(data, channels, |s| s.to_sample::<f32>(), &mut mono) {
            // Drop this block, keep capturing
            error!("Dropping capture block: {}", e);
            return;
        }
        let replaced = sanitize(&mut mono);
        if replaced > 0 {
            warn!("Replaced {} non-finite samples in capture block", replaced);
        }
        let timestamp = started.elapsed().as_secs_f64();
        sink(SampleBlock::new(mono, sample_rate, channels as u16, timestamp));
    };

    let err_fn = |err| error!("Audio stream error: {}", err);

    device
        .build_input_stream(config, data_fn, err_fn, None)
        .map_err(|e| CoreError::Device(e.to_string()))
}

struct CpalCapture {
    stop_tx: Option<Sender<()>>,
    thread: Option<JoinHandle<()>>,
    sample_rate: u32,
    channels: u16,
}

impl CaptureHandle for CpalCapture {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn channels(&self) -> u16 {
        self.channels
    }

    fn stop(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("Capture thread panicked during shutdown");
            }
        }
    }
}

impl Drop for CpalCapture {
    fn drop(&mut self) {
        self.stop();
    }
}
