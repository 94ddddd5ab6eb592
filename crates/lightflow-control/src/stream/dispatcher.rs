//! Fixed-rate streaming loop
//!
//! Each tick drains the [`ChannelTable`], clamps brightness, hands the frame
//! to the sink and sleeps until the next deadline. Deadlines advance by whole
//! intervals, so time spent building and sending a frame is absorbed instead
//! of added. A loop that falls more than one interval behind resynchronizes
//! rather than bursting to catch up.

use super::channels::{ChannelState, ChannelTable};
use super::sink::FrameSink;
use super::StreamConfig;
use crate::error::{ControlError, Result};
use crate::events::{EventBus, PipelineEvent};
use crate::metrics::PipelineMetrics;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Rolling frame-rate measurement over the last N frame instants
#[derive(Debug)]
struct FpsMeter {
    stamps: VecDeque<Instant>,
    window: usize,
}

impl FpsMeter {
    fn new(window: usize) -> Self {
        Self {
            stamps: VecDeque::with_capacity(window),
            window: window.max(2),
        }
    }

    fn record(&mut self, at: Instant) {
        if self.stamps.len() == self.window {
            self.stamps.pop_front();
        }
        self.stamps.push_back(at);
    }

    fn fps(&self) -> f64 {
        match (self.stamps.front(), self.stamps.back()) {
            (Some(first), Some(last)) if self.stamps.len() >= 2 => {
                let span = last.duration_since(*first).as_secs_f64();
                if span > 0.0 {
                    (self.stamps.len() - 1) as f64 / span
                } else {
                    0.0
                }
            }
            _ => 0.0,
        }
    }

    fn clear(&mut self) {
        self.stamps.clear();
    }
}

struct Running {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<Box<dyn FrameSink>>,
}

/// Owns the streaming task for one entertainment area
pub struct StreamDispatcher {
    config: StreamConfig,
    channels: Arc<ChannelTable>,
    events: Option<EventBus>,
    metrics: Option<Arc<PipelineMetrics>>,
    fps: Arc<Mutex<FpsMeter>>,
    running: Option<Running>,
}

impl StreamDispatcher {
    /// Dispatcher reading from `channels`. The table must have exactly
    /// `config.channel_count` slots.
    pub fn new(config: StreamConfig, channels: Arc<ChannelTable>) -> Result<Self> {
        config.validate()?;
        if channels.len() != config.channel_count {
            return Err(ControlError::InvalidConfig(format!(
                "channel table has {} slots, stream expects {}",
                channels.len(),
                config.channel_count
            )));
        }
        Ok(Self {
            fps: Arc::new(Mutex::new(FpsMeter::new(config.fps_window))),
            config,
            channels,
            events: None,
            metrics: None,
            running: None,
        })
    }

    /// Publish streaming events on `events`
    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    /// Report frames into `metrics`
    pub fn with_metrics(mut self, metrics: Arc<PipelineMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Settings in use
    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    /// Shared table this dispatcher drains
    pub fn channels(&self) -> &Arc<ChannelTable> {
        &self.channels
    }

    /// Whether the streaming task is running
    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// Frame rate measured over the last `fps_window` frames
    pub fn achieved_fps(&self) -> f64 {
        self.fps.lock().fps()
    }

    /// Drain the table and clamp brightness into `[min_brightness, max_brightness]`
    pub fn next_frame(&self) -> Vec<ChannelState> {
        compose_frame(&self.channels, &self.config)
    }

    /// Connect `sink` and spawn the loop on the current tokio runtime
    pub fn start(&mut self, mut sink: Box<dyn FrameSink>) -> Result<()> {
        if self.running.is_some() {
            return Err(ControlError::InvalidState(
                "dispatcher already running".to_string(),
            ));
        }
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| ControlError::Stream(format!("no tokio runtime: {}", e)))?;

        sink.connect()?;
        self.fps.lock().clear();

        let (shutdown, shutdown_rx) = watch::channel(false);
        let ctx = LoopContext {
            config: self.config.clone(),
            channels: self.channels.clone(),
            events: self.events.clone(),
            metrics: self.metrics.clone(),
            fps: self.fps.clone(),
        };
        info!(
            "Streaming to '{}' at {} fps over {} channels",
            sink.name(),
            self.config.target_fps,
            self.config.channel_count
        );
        if let Some(events) = &self.events {
            events.publish(PipelineEvent::StreamingStarted {
                target_fps: self.config.target_fps,
                channels: self.config.channel_count,
            });
        }

        let task = runtime.spawn(run_loop(ctx, sink, shutdown_rx));
        self.running = Some(Running { shutdown, task });
        Ok(())
    }

    /// Signal the loop, wait for it to exit and disconnect the sink.
    /// Safe to call when not running.
    pub async fn stop(&mut self) -> Result<()> {
        let Some(running) = self.running.take() else {
            return Ok(());
        };
        // Receiver lives in the task; a send error means it already exited
        let _ = running.shutdown.send(true);
        let mut sink = running
            .task
            .await
            .map_err(|e| ControlError::Stream(format!("streaming task failed: {}", e)))?;
        sink.disconnect()?;
        info!("Streaming stopped");
        Ok(())
    }
}

impl Drop for StreamDispatcher {
    fn drop(&mut self) {
        if let Some(running) = self.running.take() {
            warn!("Dispatcher dropped while running; aborting stream task");
            let _ = running.shutdown.send(true);
            running.task.abort();
        }
    }
}

struct LoopContext {
    config: StreamConfig,
    channels: Arc<ChannelTable>,
    events: Option<EventBus>,
    metrics: Option<Arc<PipelineMetrics>>,
    fps: Arc<Mutex<FpsMeter>>,
}

fn compose_frame(channels: &ChannelTable, config: &StreamConfig) -> Vec<ChannelState> {
    channels
        .drain()
        .channels
        .into_iter()
        .map(|state| ChannelState {
            color: state.color,
            brightness: state
                .brightness
                .clamp(config.min_brightness, config.max_brightness),
        })
        .collect()
}

async fn run_loop(
    ctx: LoopContext,
    mut sink: Box<dyn FrameSink>,
    mut shutdown: watch::Receiver<bool>,
) -> Box<dyn FrameSink> {
    let interval = Duration::from_secs_f64(1.0 / ctx.config.target_fps);
    let mut deadline = Instant::now();
    let mut frames: u64 = 0;
    let mut consecutive_failures: u32 = 0;

    loop {
        if *shutdown.borrow() {
            break;
        }

        let frame = compose_frame(&ctx.channels, &ctx.config);
        match sink.send_frame(&frame) {
            Ok(()) => {
                if consecutive_failures >= ctx.config.failure_threshold {
                    info!(
                        "Streaming recovered after {} failed frames",
                        consecutive_failures
                    );
                }
                consecutive_failures = 0;
                frames += 1;
            }
            Err(e) => {
                consecutive_failures += 1;
                warn!("Frame send failed ({} in a row): {}", consecutive_failures, e);
                if consecutive_failures % ctx.config.failure_threshold == 0 {
                    error!(
                        "Streaming failing persistently: {} consecutive frames",
                        consecutive_failures
                    );
                    if let Some(events) = &ctx.events {
                        events.publish(PipelineEvent::StreamingError {
                            message: e.to_string(),
                            consecutive_failures,
                        });
                    }
                }
            }
        }

        let now = Instant::now();
        let fps = {
            let mut meter = ctx.fps.lock();
            meter.record(now);
            meter.fps()
        };
        if let Some(metrics) = &ctx.metrics {
            metrics.record_frame(fps);
        }

        deadline += interval;
        if now > deadline + interval {
            debug!(
                "Dispatcher {:?} behind schedule, resynchronizing",
                now - deadline
            );
            deadline = now;
        }

        tokio::select! {
            _ = tokio::time::sleep_until(deadline) => {}
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }

    if let Some(events) = &ctx.events {
        events.publish(PipelineEvent::StreamingStopped { frames });
    }
    debug!("Streaming loop exited after {} frames", frames);
    sink
}
