//! Capture → analysis → effect wiring
//!
//! [`LightEngine`] owns the audio source and the analysis thread. Captured
//! blocks go through a drop-oldest [`BlockQueue`] so a slow analysis never
//! stalls the capture callback. Each analysis frame is published on the event
//! bus and forwarded to the [`EffectHost`]. Streaming is driven separately by
//! a [`StreamDispatcher`](crate::stream::StreamDispatcher) reading the same
//! channel table.

use crate::effects::{EffectConfig, EffectContext, EffectHost, EffectRegistry};
use crate::error::{ControlError, Result};
use crate::events::{EventBus, PipelineEvent};
use crate::metrics::PipelineMetrics;
use crate::stream::ChannelTable;
use crossbeam_channel::{bounded, select, Receiver, Sender};
use lightflow_core::{
    AnalysisChain, AnalysisConfig, AudioBackend, AudioDevice, AudioSource, BlockQueue, SampleBlock,
};
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;
use tracing::{debug, info, warn};

struct AnalysisWorker {
    stop_tx: Option<Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl AnalysisWorker {
    fn stop(&mut self) {
        self.stop_tx.take();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("Analysis thread panicked");
            }
        }
    }
}

/// Audio-to-light pipeline up to the channel table
pub struct LightEngine<B: AudioBackend> {
    source: AudioSource<B>,
    analysis: AnalysisConfig,
    channels: Arc<ChannelTable>,
    host: Arc<Mutex<EffectHost>>,
    events: EventBus,
    metrics: Arc<PipelineMetrics>,
    queue: Option<BlockQueue>,
    worker: Option<AnalysisWorker>,
}

impl<B: AudioBackend> LightEngine<B> {
    /// Engine over `backend` driving effects from `registry` into `channels`
    pub fn new(
        backend: B,
        analysis: AnalysisConfig,
        channels: Arc<ChannelTable>,
        registry: EffectRegistry,
    ) -> Result<Self> {
        analysis.validate()?;
        let events = EventBus::default();
        let host = EffectHost::new(registry, EffectContext::new(channels.clone()))
            .with_events(events.clone());
        Ok(Self {
            source: AudioSource::new(backend),
            analysis,
            channels,
            host: Arc::new(Mutex::new(host)),
            events,
            metrics: Arc::new(PipelineMetrics::new()),
            queue: None,
            worker: None,
        })
    }

    /// Use `events` instead of the engine's own bus.
    ///
    /// The host is kept, so an effect activated earlier stays active and
    /// reports its later transitions on `events`.
    pub fn with_events(mut self, events: EventBus) -> Self {
        self.host.lock().set_events(events.clone());
        self.events = events;
        self
    }

    /// Audio source, for device selection
    pub fn source(&self) -> &AudioSource<B> {
        &self.source
    }

    /// Mutable audio source
    pub fn source_mut(&mut self) -> &mut AudioSource<B> {
        &mut self.source
    }

    /// Devices offered by the backend
    pub fn enumerate_devices(&self) -> Result<Vec<AudioDevice>> {
        Ok(self.source.enumerate()?)
    }

    /// Shared effect host
    pub fn host(&self) -> &Arc<Mutex<EffectHost>> {
        &self.host
    }

    /// Shared output table
    pub fn channels(&self) -> &Arc<ChannelTable> {
        &self.channels
    }

    /// Event bus
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Shared metrics
    pub fn metrics(&self) -> &Arc<PipelineMetrics> {
        &self.metrics
    }

    /// Whether capture and analysis are running
    pub fn is_running(&self) -> bool {
        self.worker.is_some()
    }

    /// Blocks dropped because analysis fell behind
    pub fn dropped_blocks(&self) -> u64 {
        self.queue.as_ref().map_or(0, |q| q.dropped())
    }

    /// Activate `name` on the host
    pub fn activate_effect(&self, name: &str, config: EffectConfig) -> Result<()> {
        self.host.lock().activate(name, config)
    }

    /// Start analysis and capture. Selects the default device when none is set.
    pub fn start(&mut self) -> Result<()> {
        if self.worker.is_some() {
            return Err(ControlError::InvalidState(
                "engine already running".to_string(),
            ));
        }
        if self.source.selected_device().is_none() {
            let device = self.source.select_default()?;
            info!("Using audio device {}", device);
        }

        let chain = AnalysisChain::new(self.analysis.clone())?;
        let queue = BlockQueue::new(self.analysis.queue_capacity)?;
        let (stop_tx, stop_rx) = bounded::<()>(1);
        let ctx = AnalysisContext {
            blocks: queue.receiver(),
            stop: stop_rx,
            host: self.host.clone(),
            events: self.events.clone(),
            metrics: self.metrics.clone(),
        };
        let thread = thread::Builder::new()
            .name("lightflow-analysis".to_string())
            .spawn(move || run_analysis(ctx, chain))?;
        let mut worker = AnalysisWorker {
            stop_tx: Some(stop_tx),
            thread: Some(thread),
        };

        if let Err(e) = self.source.start(queue.sink()) {
            worker.stop();
            return Err(e.into());
        }
        self.queue = Some(queue);
        self.worker = Some(worker);
        info!("Engine started");
        Ok(())
    }

    /// Stop capture, then analysis. The active effect keeps running.
    pub fn stop(&mut self) {
        self.source.stop();
        if let Some(mut worker) = self.worker.take() {
            worker.stop();
            if let Some(queue) = &self.queue {
                info!("Engine stopped ({} blocks dropped)", queue.dropped());
            }
        }
    }

    /// Stop everything and deactivate the effect
    pub fn shutdown(&mut self) {
        self.stop();
        self.host.lock().shutdown();
    }
}

impl<B: AudioBackend> Drop for LightEngine<B> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

struct AnalysisContext {
    blocks: Receiver<SampleBlock>,
    stop: Receiver<()>,
    host: Arc<Mutex<EffectHost>>,
    events: EventBus,
    metrics: Arc<PipelineMetrics>,
}

fn run_analysis(ctx: AnalysisContext, mut chain: AnalysisChain) {
    debug!("Analysis thread running");
    loop {
        select! {
            recv(ctx.blocks) -> block => match block {
                Ok(block) => analyze_block(&ctx, &mut chain, &block),
                Err(_) => break,
            },
            recv(ctx.stop) -> _ => break,
        }
    }
    debug!("Analysis thread exiting, {} samples discarded", chain.discarded());
}

fn analyze_block(ctx: &AnalysisContext, chain: &mut AnalysisChain, block: &SampleBlock) {
    let started = Instant::now();
    let frames = chain.process_block(block);
    let beats = frames.iter().filter(|f| f.beat.is_some()).count();
    ctx.metrics
        .record_analysis(started.elapsed(), frames.len() as u64, beats as u64);

    for frame in frames {
        ctx.events.publish(PipelineEvent::BandEnergy(frame.bands));
        if let Some(beat) = frame.beat {
            debug!("Beat at {:.3}s, {:.1} bpm", beat.timestamp, beat.bpm);
            ctx.events.publish(PipelineEvent::Beat(beat));
        }

        let dispatched = Instant::now();
        {
            let mut host = ctx.host.lock();
            host.dispatch_band_energy(&frame.bands);
            if let Some(beat) = &frame.beat {
                host.dispatch_beat(beat);
            }
        }
        ctx.metrics.record_dispatch(dispatched.elapsed());
    }
}
