//! Synthetic capture backend
//!
//! Generates blocks on a timer thread so the full pipeline can run without
//! audio hardware (tests, demos, headless boxes).

use super::{AudioBackend, CaptureHandle, SampleSink};
use crate::audio::{AudioDevice, AudioDeviceKind, SampleBlock};
use crate::error::{CoreError, Result};
use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

/// Signal shape produced by [`SyntheticBackend`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SyntheticSignal {
    /// Digital silence
    Silence,
    /// Continuous sine tone
    Sine {
        /// Tone frequency in Hz
        frequency: f64,
        /// Peak amplitude in `[0, 1]`
        amplitude: f32,
    },
    /// Short low-frequency bursts at a fixed tempo
    KickTrain {
        /// Tempo in beats per minute
        bpm: f64,
        /// Burst frequency in Hz
        frequency: f64,
        /// Burst length in milliseconds
        length_ms: f64,
    },
}

impl Default for SyntheticSignal {
    fn default() -> Self {
        Self::KickTrain {
            bpm: 120.0,
            frequency: 60.0,
            length_ms: 60.0,
        }
    }
}

impl SyntheticSignal {
    /// Sample value at absolute sample index `n`
    pub fn sample_at(&self, n: u64, sample_rate: u32) -> f32 {
        let rate = sample_rate as f64;
        let t = n as f64 / rate;
        match *self {
            Self::Silence => 0.0,
            Self::Sine {
                frequency,
                amplitude,
            } => (TAU * frequency * t).sin() as f32 * amplitude,
            Self::KickTrain {
                bpm,
                frequency,
                length_ms,
            } => {
                if bpm <= 0.0 {
                    return 0.0;
                }
                let period = 60.0 / bpm;
                let phase = t % period;
                let length = length_ms / 1000.0;
                if phase < length {
                    // Linear decay keeps the burst click-free at the tail
                    let env = 1.0 - phase / length;
                    ((TAU * frequency * phase).sin() * env) as f32
                } else {
                    0.0
                }
            }
        }
    }
}

/// Backend producing a generated signal at a fixed block cadence
#[derive(Debug, Clone)]
pub struct SyntheticBackend {
    signal: SyntheticSignal,
    sample_rate: u32,
    block_size: usize,
    channels: u16,
}

impl Default for SyntheticBackend {
    fn default() -> Self {
        Self::new(SyntheticSignal::default())
    }
}

impl SyntheticBackend {
    /// 44.1 kHz, 512-sample blocks
    pub fn new(signal: SyntheticSignal) -> Self {
        Self {
            signal,
            sample_rate: 44100,
            block_size: 512,
            channels: 1,
        }
    }

    /// Override sample rate
    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    /// Override block size
    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size;
        self
    }

    /// The device this backend exposes
    pub fn device() -> AudioDevice {
        AudioDevice {
            id: "synthetic:0".to_string(),
            name: "Synthetic Signal".to_string(),
            kind: AudioDeviceKind::Input,
            is_default: true,
        }
    }
}

impl AudioBackend for SyntheticBackend {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn enumerate(&self) -> Result<Vec<AudioDevice>> {
        Ok(vec![Self::device()])
    }

    fn open(&self, device: &AudioDevice, sink: SampleSink) -> Result<Box<dyn CaptureHandle>> {
        if device.id != Self::device().id {
            return Err(CoreError::Device(format!(
                "device '{}' not provided by synthetic backend",
                device.name
            )));
        }
        if self.sample_rate == 0 || self.block_size == 0 {
            return Err(CoreError::UnsupportedFormat(
                "synthetic backend needs a non-zero sample rate and block size".to_string(),
            ));
        }

        let (stop_tx, stop_rx) = bounded::<()>(1);
        let signal = self.signal;
        let sample_rate = self.sample_rate;
        let block_size = self.block_size;
        let channels = self.channels;
        let block_period = Duration::from_secs_f64(block_size as f64 / sample_rate as f64);

        let thread = thread::Builder::new()
            .name("lightflow-synthetic".to_string())
            .spawn(move || {
                let started = Instant::now();
                let mut position: u64 = 0;
                let mut next_deadline = started + block_period;
                loop {
                    let samples: Vec<f32> = (0..block_size as u64)
                        .map(|i| signal.sample_at(position + i, sample_rate))
                        .collect();
                    let timestamp = position as f64 / sample_rate as f64;
                    position += block_size as u64;
                    sink(SampleBlock::new(samples, sample_rate, channels, timestamp));

                    let wait = next_deadline.saturating_duration_since(Instant::now());
                    next_deadline += block_period;
                    match stop_rx.recv_timeout(wait) {
                        Err(RecvTimeoutError::Timeout) => continue,
                        _ => break,
                    }
                }
                debug!("Synthetic capture stopped after {} samples", position);
            })
            .map_err(|e| CoreError::Device(format!("failed to spawn synthetic thread: {}", e)))?;

        info!(
            "Synthetic capture started: {:?} @ {} Hz, {} samples/block",
            signal, sample_rate, block_size
        );

        Ok(Box::new(SyntheticCapture {
            stop_tx: Some(stop_tx),
            thread: Some(thread),
            sample_rate,
            channels,
        }))
    }
}

struct SyntheticCapture {
    stop_tx: Option<Sender<()>>,
    thread: Option<JoinHandle<()>>,
    sample_rate: u32,
    channels: u16,
}

impl CaptureHandle for SyntheticCapture {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn channels(&self) -> u16 {
        self.channels
    }

    fn stop(&mut self) {
        // Dropping the sender disconnects the channel and wakes the thread
        self.stop_tx.take();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("Synthetic capture thread panicked");
            }
        }
    }
}

impl Drop for SyntheticCapture {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[test]
    fn test_sine_sample_values() {
        let signal = SyntheticSignal::Sine {
            frequency: 1.0,
            amplitude: 0.5,
        };
        // Quarter period at 4 Hz sample rate -> peak
        assert!((signal.sample_at(1, 4) - 0.5).abs() < 1e-6);
        assert!(signal.sample_at(0, 4).abs() < 1e-6);
    }

    #[test]
    fn test_kick_train_is_silent_between_bursts() {
        let signal = SyntheticSignal::KickTrain {
            bpm: 120.0,
            frequency: 60.0,
            length_ms: 50.0,
        };
        // 0.25s into a 0.5s period is past the 50ms burst
        assert_eq!(signal.sample_at(11025, 44100), 0.0);
    }

    #[test]
    fn test_capture_delivers_blocks_and_stops() {
        let backend = SyntheticBackend::new(SyntheticSignal::Silence).with_block_size(256);
        let received = Arc::new(Mutex::new(Vec::new()));
        let sink_store = received.clone();
        let sink: SampleSink = Arc::new(move |block| sink_store.lock().push(block));

        let mut handle = backend.open(&SyntheticBackend::device(), sink).unwrap();
        std::thread::sleep(Duration::from_millis(50));
        handle.stop();
        handle.stop();

        let blocks = received.lock();
        assert!(!blocks.is_empty());
        assert!(blocks.iter().all(|b| b.len() == 256 && b.sample_rate() == 44100));
        // Timestamps advance by one block duration
        if blocks.len() >= 2 {
            let delta = blocks[1].timestamp() - blocks[0].timestamp();
            assert!((delta - 256.0 / 44100.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_open_rejects_foreign_device() {
        let backend = SyntheticBackend::default();
        let device = AudioDevice {
            id: "in:mic".to_string(),
            name: "mic".to_string(),
            kind: AudioDeviceKind::Input,
            is_default: false,
        };
        let sink: SampleSink = Arc::new(|_| {});
        assert!(backend.open(&device, sink).is_err());
    }
}
