//! Pipeline performance counters

use parking_lot::Mutex;
use serde::Serialize;
use std::collections::VecDeque;
use std::time::Duration;

/// Samples kept per moving average
pub const METRICS_WINDOW: usize = 30;

/// Fixed-length moving average
#[derive(Debug, Clone)]
pub struct MovingAverage {
    samples: VecDeque<f64>,
    capacity: usize,
    sum: f64,
}

impl MovingAverage {
    /// Average over the last `capacity` samples
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
            sum: 0.0,
        }
    }

    /// Add a sample, evicting the oldest when full
    pub fn push(&mut self, value: f64) {
        if self.samples.len() == self.capacity {
            if let Some(old) = self.samples.pop_front() {
                self.sum -= old;
            }
        }
        self.samples.push_back(value);
        self.sum += value;
    }

    /// Mean of the held samples, 0 when empty
    pub fn average(&self) -> f64 {
        if self.samples.is_empty() {
            0.0
        } else {
            self.sum / self.samples.len() as f64
        }
    }

    /// Samples held
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// True before the first sample
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Drop all samples
    pub fn clear(&mut self) {
        self.samples.clear();
        self.sum = 0.0;
    }
}

/// Point-in-time view of [`PipelineMetrics`]
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct MetricsSnapshot {
    /// Mean time to analyze one captured block, ms
    pub analysis_latency_ms: f64,
    /// Mean time to dispatch one analysis frame to the effect, ms
    pub dispatch_latency_ms: f64,
    /// Achieved streaming frame rate
    pub streaming_fps: f64,
    /// Frames sent by the dispatcher
    pub frames_sent: u64,
    /// Analysis frames produced
    pub analysis_frames: u64,
    /// Beats detected
    pub beats: u64,
}

#[derive(Debug)]
struct Inner {
    analysis: MovingAverage,
    dispatch: MovingAverage,
    fps: f64,
    frames_sent: u64,
    analysis_frames: u64,
    beats: u64,
}

/// Shared counters written by the analysis thread and the dispatcher
#[derive(Debug)]
pub struct PipelineMetrics {
    inner: Mutex<Inner>,
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineMetrics {
    /// Zeroed metrics
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                analysis: MovingAverage::new(METRICS_WINDOW),
                dispatch: MovingAverage::new(METRICS_WINDOW),
                fps: 0.0,
                frames_sent: 0,
                analysis_frames: 0,
                beats: 0,
            }),
        }
    }

    /// Time spent analyzing one block and how many frames and beats it produced
    pub fn record_analysis(&self, elapsed: Duration, frames: u64, beats: u64) {
        let mut inner = self.inner.lock();
        inner.analysis.push(elapsed.as_secs_f64() * 1000.0);
        inner.analysis_frames += frames;
        inner.beats += beats;
    }

    /// Time spent forwarding one frame to the effect host
    pub fn record_dispatch(&self, elapsed: Duration) {
        self.inner.lock().dispatch.push(elapsed.as_secs_f64() * 1000.0);
    }

    /// One frame went out; `fps` is the dispatcher's rolling rate
    pub fn record_frame(&self, fps: f64) {
        let mut inner = self.inner.lock();
        inner.frames_sent += 1;
        inner.fps = fps;
    }

    /// Copy the current values
    pub fn snapshot(&self) -> MetricsSnapshot {
        let inner = self.inner.lock();
        MetricsSnapshot {
            analysis_latency_ms: inner.analysis.average(),
            dispatch_latency_ms: inner.dispatch.average(),
            streaming_fps: inner.fps,
            frames_sent: inner.frames_sent,
            analysis_frames: inner.analysis_frames,
            beats: inner.beats,
        }
    }

    /// Zero everything
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        inner.analysis.clear();
        inner.dispatch.clear();
        inner.fps = 0.0;
        inner.frames_sent = 0;
        inner.analysis_frames = 0;
        inner.beats = 0;
    }
}
