//! Lighting effects
//!
//! Every effect implements [`LightEffect`]. The built-in ones are thin
//! [`EffectPattern`] implementations driven by [`EffectRunner`], which owns
//! the lifecycle, the config snapshot and the optional timing thread.

pub mod chase;
pub mod fade;
pub mod frequency_reactive;
pub mod host;
pub mod pulse;
pub mod rainbow;
pub mod registry;
pub mod sparkle;
pub mod strobe;

pub use chase::ChaseEffect;
pub use fade::FadeEffect;
pub use frequency_reactive::FrequencyReactiveEffect;
pub use host::EffectHost;
pub use pulse::PulseEffect;
pub use rainbow::RainbowEffect;
pub use registry::{factory, EffectFactory, EffectInfo, EffectRegistry};
pub use sparkle::SparkleEffect;
pub use strobe::StrobeEffect;

use crate::error::{ControlError, Result};
use crate::stream::ChannelTable;
use arc_swap::ArcSwap;
use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use lightflow_core::{BandEnergy, BeatEvent};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info};

/// Effect lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EffectState {
    /// Created, not configured
    Uninitialized,
    /// Configured, not running
    Initialized,
    /// Timing loop active, receiving audio
    Running,
    /// Timing loop idle, no audio dispatch
    Paused,
    /// Timing loop joined
    Stopped,
    /// A lifecycle transition failed
    Error,
}

impl fmt::Display for EffectState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Per-activation effect settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EffectConfig {
    /// Overall strength, `[0, 1]`
    pub intensity: f64,
    /// Animation rate multiplier, `[0.1, 5]`
    pub speed: f64,
    /// Brightness ceiling, `[0, 1]`
    pub brightness: f64,
    /// React to band energy and beats
    pub audio_reactive: bool,
    /// Scale applied to audio levels, `[0, 1]`
    pub audio_sensitivity: f64,
    /// Smooth between frames
    pub smooth_transitions: bool,
    /// Transition length in ms, `[0, 10000]`
    pub transition_ms: u64,
    /// How far hue may drift from an effect's base color, `[0, 1]`
    pub hue_variation: f64,
    /// Color saturation, `[0, 1]`
    pub saturation: f64,
    /// Warm (0) to cool (1) white
    pub color_temperature: f64,
}

impl Default for EffectConfig {
    fn default() -> Self {
        Self {
            intensity: 0.8,
            speed: 1.0,
            brightness: 0.8,
            audio_reactive: true,
            audio_sensitivity: 0.5,
            smooth_transitions: true,
            transition_ms: 100,
            hue_variation: 0.5,
            saturation: 0.8,
            color_temperature: 0.5,
        }
    }
}

impl EffectConfig {
    /// Reject non-finite values, then clamp everything into bounds
    pub fn validated(&self) -> Result<Self> {
        let fields = [
            ("intensity", self.intensity),
            ("speed", self.speed),
            ("brightness", self.brightness),
            ("audio_sensitivity", self.audio_sensitivity),
            ("hue_variation", self.hue_variation),
            ("saturation", self.saturation),
            ("color_temperature", self.color_temperature),
        ];
        if let Some((name, value)) = fields.iter().find(|(_, v)| !v.is_finite()) {
            return Err(ControlError::InvalidConfig(format!(
                "effect {} must be finite, got {}",
                name, value
            )));
        }
        Ok(Self {
            intensity: self.intensity.clamp(0.0, 1.0),
            speed: self.speed.clamp(0.1, 5.0),
            brightness: self.brightness.clamp(0.0, 1.0),
            audio_reactive: self.audio_reactive,
            audio_sensitivity: self.audio_sensitivity.clamp(0.0, 1.0),
            smooth_transitions: self.smooth_transitions,
            transition_ms: self.transition_ms.min(10_000),
            hue_variation: self.hue_variation.clamp(0.0, 1.0),
            saturation: self.saturation.clamp(0.0, 1.0),
            color_temperature: self.color_temperature.clamp(0.0, 1.0),
        })
    }

    /// `brightness * intensity`
    pub fn max_level(&self) -> f64 {
        self.brightness * self.intensity
    }

    /// Timer period for step-based effects: 500 ms at speed 1, clamped to 50–500 ms
    pub fn step_interval(&self) -> Duration {
        let ms = (500.0 / self.speed.max(f64::EPSILON)).clamp(50.0, 500.0);
        Duration::from_millis(ms.round() as u64)
    }
}

/// What an effect is allowed to touch
#[derive(Debug, Clone)]
pub struct EffectContext {
    /// Shared output table
    pub channels: Arc<ChannelTable>,
}

impl EffectContext {
    /// Context writing into `channels`
    pub fn new(channels: Arc<ChannelTable>) -> Self {
        Self { channels }
    }

    /// Channels in the active area
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }
}

/// Contract between [`EffectHost`] and an effect instance
pub trait LightEffect: Send {
    /// Registry name
    fn name(&self) -> &str;

    /// One-line description
    fn description(&self) -> &str;

    /// Current lifecycle state
    fn state(&self) -> EffectState;

    /// Apply `config` and move to `Initialized`
    fn initialize(&mut self, config: EffectConfig) -> Result<()>;

    /// Start the timing loop; only from `Initialized` or `Stopped`
    fn start(&mut self) -> Result<()>;

    /// Cancel and join the timing loop. No-op unless running or paused.
    fn stop(&mut self) -> Result<()>;

    /// `Running` → `Paused`
    fn pause(&mut self) -> Result<()>;

    /// `Paused` → `Running`
    fn resume(&mut self) -> Result<()>;

    /// Replace the config without restarting
    fn update_config(&mut self, config: EffectConfig) -> Result<()>;

    /// Band energies of the latest analysis frame
    fn on_band_energy(&mut self, bands: &BandEnergy) -> Result<()>;

    /// A detected beat
    fn on_beat(&mut self, beat: &BeatEvent) -> Result<()>;
}

/// Band energies normalized against their own recent peaks, each in `[0, 1]`
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BandLevels {
    /// Low band
    pub low: f64,
    /// Mid band
    pub mid: f64,
    /// High band
    pub high: f64,
    /// All bands
    pub total: f64,
}

/// Decaying-peak normalizer that maps raw band energy onto `[0, 1]`
#[derive(Debug, Clone)]
pub struct LevelTracker {
    peaks: [f64; 4],
    decay: f64,
}

impl Default for LevelTracker {
    fn default() -> Self {
        Self::new(0.995)
    }
}

impl LevelTracker {
    const FLOOR: f64 = 1e-9;

    /// Peaks shrink by `decay` per frame
    pub fn new(decay: f64) -> Self {
        Self {
            peaks: [Self::FLOOR; 4],
            decay: decay.clamp(0.0, 1.0),
        }
    }

    /// Fold `bands` into the peaks and return normalized levels
    pub fn update(&mut self, bands: &BandEnergy) -> BandLevels {
        let raw = [bands.low, bands.mid, bands.high, bands.total];
        let mut out = [0.0; 4];
        for ((peak, value), level) in self.peaks.iter_mut().zip(raw).zip(out.iter_mut()) {
            let value = if value.is_finite() { value.max(0.0) } else { 0.0 };
            *peak = (*peak * self.decay).max(value).max(Self::FLOOR);
            *level = (value / *peak).clamp(0.0, 1.0);
        }
        BandLevels {
            low: out[0],
            mid: out[1],
            high: out[2],
            total: out[3],
        }
    }

    /// Forget all peaks
    pub fn reset(&mut self) {
        self.peaks = [Self::FLOOR; 4];
    }
}

/// The effect-specific part of a built-in effect.
///
/// All methods run with the pattern locked, from either the timing thread or
/// the analysis thread, and must only write through `out`.
pub trait EffectPattern: Send + 'static {
    /// Timer period for `tick`, `None` for purely audio-driven patterns
    fn tick_interval(&self, config: &EffectConfig) -> Option<Duration>;

    /// Reset animation state before (re)starting
    fn reset(&mut self, channel_count: usize);

    /// Advance one timer step
    fn tick(&mut self, _config: &EffectConfig, _out: &ChannelTable) -> Result<()> {
        Ok(())
    }

    /// React to normalized band levels; only called when audio-reactive
    fn on_levels(
        &mut self,
        _config: &EffectConfig,
        _levels: &BandLevels,
        _out: &ChannelTable,
    ) -> Result<()> {
        Ok(())
    }

    /// React to a beat; only called when audio-reactive
    fn on_beat(
        &mut self,
        _config: &EffectConfig,
        _beat: &BeatEvent,
        _out: &ChannelTable,
    ) -> Result<()> {
        Ok(())
    }
}

struct Worker {
    name: String,
    stop_tx: Option<Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl Worker {
    fn spawn<P: EffectPattern>(
        name: &str,
        pattern: Arc<Mutex<P>>,
        config: Arc<ArcSwap<EffectConfig>>,
        channels: Arc<ChannelTable>,
        paused: Arc<AtomicBool>,
    ) -> Result<Self> {
        let (stop_tx, stop_rx) = bounded::<()>(1);
        let effect = name.to_string();
        let thread = thread::Builder::new()
            .name(format!("effect-{}", name.to_ascii_lowercase()))
            .spawn(move || loop {
                let snapshot = config.load_full();
                let interval = {
                    let mut pattern = pattern.lock();
                    if !paused.load(Ordering::Acquire) {
                        if let Err(e) = pattern.tick(&snapshot, &channels) {
                            error!("Effect '{}' tick failed: {}", effect, e);
                        }
                    }
                    pattern.tick_interval(&snapshot)
                };
                let Some(interval) = interval else {
                    break;
                };
                match stop_rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => continue,
                    _ => break,
                }
            })
            .map_err(|e| ControlError::effect(name, format!("failed to spawn worker: {}", e)))?;
        Ok(Self {
            name: name.to_string(),
            stop_tx: Some(stop_tx),
            thread: Some(thread),
        })
    }

    fn stop(&mut self) -> Result<()> {
        self.stop_tx.take();
        if let Some(thread) = self.thread.take() {
            thread
                .join()
                .map_err(|_| ControlError::effect(&self.name, "worker thread panicked"))?;
        }
        Ok(())
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

/// Lifecycle driver shared by the built-in effects
pub struct EffectRunner<P: EffectPattern> {
    name: &'static str,
    description: &'static str,
    state: EffectState,
    pattern: Arc<Mutex<P>>,
    config: Arc<ArcSwap<EffectConfig>>,
    levels: LevelTracker,
    paused: Arc<AtomicBool>,
    context: EffectContext,
    worker: Option<Worker>,
}

impl<P: EffectPattern> EffectRunner<P> {
    /// Wrap `pattern` under `name`
    pub fn new(
        name: &'static str,
        description: &'static str,
        pattern: P,
        context: EffectContext,
    ) -> Self {
        Self {
            name,
            description,
            state: EffectState::Uninitialized,
            pattern: Arc::new(Mutex::new(pattern)),
            config: Arc::new(ArcSwap::from_pointee(EffectConfig::default())),
            levels: LevelTracker::default(),
            paused: Arc::new(AtomicBool::new(false)),
            context,
            worker: None,
        }
    }

    /// Current config snapshot
    pub fn config(&self) -> Arc<EffectConfig> {
        self.config.load_full()
    }

    /// Run `f` against the pattern, for inspection in tests and tooling
    pub fn with_pattern<R>(&self, f: impl FnOnce(&P) -> R) -> R {
        f(&self.pattern.lock())
    }

    fn set_state(&mut self, state: EffectState) {
        if self.state != state {
            debug!("Effect '{}': {} -> {}", self.name, self.state, state);
            self.state = state;
        }
    }

    fn invalid(&self, op: &str) -> ControlError {
        ControlError::InvalidState(format!(
            "cannot {} effect '{}' in state {}",
            op, self.name, self.state
        ))
    }
}

impl<P: EffectPattern> LightEffect for EffectRunner<P> {
    fn name(&self) -> &str {
        self.name
    }

    fn description(&self) -> &str {
        self.description
    }

    fn state(&self) -> EffectState {
        self.state
    }

    fn initialize(&mut self, config: EffectConfig) -> Result<()> {
        if matches!(self.state, EffectState::Running | EffectState::Paused) {
            return Err(self.invalid("initialize"));
        }
        let config = match config.validated() {
            Ok(config) => config,
            Err(e) => {
                self.set_state(EffectState::Error);
                return Err(e);
            }
        };
        self.config.store(Arc::new(config));
        self.set_state(EffectState::Initialized);
        Ok(())
    }

    fn start(&mut self) -> Result<()> {
        if !matches!(self.state, EffectState::Initialized | EffectState::Stopped) {
            return Err(self.invalid("start"));
        }
        let timed = {
            let mut pattern = self.pattern.lock();
            pattern.reset(self.context.channel_count());
            pattern.tick_interval(&self.config.load()).is_some()
        };
        self.levels.reset();
        self.paused.store(false, Ordering::Release);

        if !timed {
            self.set_state(EffectState::Running);
            info!("Effect '{}' started", self.name);
            return Ok(());
        }
        match Worker::spawn(
            self.name,
            self.pattern.clone(),
            self.config.clone(),
            self.context.channels.clone(),
            self.paused.clone(),
        ) {
            Ok(worker) => self.worker = Some(worker),
            Err(e) => {
                self.set_state(EffectState::Error);
                return Err(e);
            }
        }
        self.set_state(EffectState::Running);
        info!("Effect '{}' started", self.name);
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        if !matches!(self.state, EffectState::Running | EffectState::Paused) {
            return Ok(());
        }
        let joined = match self.worker.take() {
            Some(mut worker) => worker.stop(),
            None => Ok(()),
        };
        if let Err(e) = joined {
            self.set_state(EffectState::Error);
            return Err(e);
        }
        self.set_state(EffectState::Stopped);
        info!("Effect '{}' stopped", self.name);
        Ok(())
    }

    fn pause(&mut self) -> Result<()> {
        if self.state != EffectState::Running {
            return Err(self.invalid("pause"));
        }
        self.paused.store(true, Ordering::Release);
        self.set_state(EffectState::Paused);
        Ok(())
    }

    fn resume(&mut self) -> Result<()> {
        if self.state != EffectState::Paused {
            return Err(self.invalid("resume"));
        }
        self.paused.store(false, Ordering::Release);
        self.set_state(EffectState::Running);
        Ok(())
    }

    fn update_config(&mut self, config: EffectConfig) -> Result<()> {
        let config = config.validated()?;
        self.config.store(Arc::new(config));
        debug!("Effect '{}' config updated", self.name);
        Ok(())
    }

    fn on_band_energy(&mut self, bands: &BandEnergy) -> Result<()> {
        // Peaks track the signal even while audio reaction is off
        let levels = self.levels.update(bands);
        let config = self.config.load();
        if !config.audio_reactive {
            return Ok(());
        }
        self.pattern
            .lock()
            .on_levels(&config, &levels, &self.context.channels)
    }

    fn on_beat(&mut self, beat: &BeatEvent) -> Result<()> {
        let config = self.config.load();
        if !config.audio_reactive {
            return Ok(());
        }
        self.pattern
            .lock()
            .on_beat(&config, beat, &self.context.channels)
    }
}

impl<P: EffectPattern> Drop for EffectRunner<P> {
    fn drop(&mut self) {
        if let Some(mut worker) = self.worker.take() {
            let _ = worker.stop();
        }
    }
}

/// Distance between two channels on a ring of `count`
pub(crate) fn ring_distance(a: usize, b: usize, count: usize) -> usize {
    let d = a.abs_diff(b);
    if count == 0 {
        d
    } else {
        d.min(count - d % count)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use lightflow_core::BandEnergy;

    pub fn context(channels: usize) -> EffectContext {
        EffectContext::new(Arc::new(ChannelTable::new(channels)))
    }

    pub fn bands(low: f64, mid: f64, high: f64) -> BandEnergy {
        BandEnergy::new(low, mid, high, 0.0)
    }

    pub fn beat() -> BeatEvent {
        BeatEvent {
            energy: 1.0,
            bpm: 120.0,
            confidence: 0.5,
            timestamp: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    struct Counting {
        ticks: u32,
    }

    impl EffectPattern for Counting {
        fn tick_interval(&self, _config: &EffectConfig) -> Option<Duration> {
            Some(Duration::from_millis(5))
        }

        fn reset(&mut self, _channel_count: usize) {
            self.ticks = 0;
        }

        fn tick(&mut self, _config: &EffectConfig, _out: &ChannelTable) -> Result<()> {
            self.ticks += 1;
            Ok(())
        }
    }

    fn runner() -> EffectRunner<Counting> {
        EffectRunner::new("Counting", "test", Counting { ticks: 0 }, context(2))
    }

    #[test]
    fn test_config_validated_clamps() {
        let config = EffectConfig {
            intensity: 2.0,
            speed: 0.0,
            brightness: -1.0,
            transition_ms: 50_000,
            ..Default::default()
        }
        .validated()
        .unwrap();
        assert_eq!(config.intensity, 1.0);
        assert_eq!(config.speed, 0.1);
        assert_eq!(config.brightness, 0.0);
        assert_eq!(config.transition_ms, 10_000);
    }

    #[test]
    fn test_config_rejects_nan() {
        let config = EffectConfig {
            speed: f64::NAN,
            ..Default::default()
        };
        assert!(matches!(
            config.validated(),
            Err(ControlError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_step_interval_clamped() {
        let at = |speed| {
            EffectConfig {
                speed,
                ..Default::default()
            }
            .step_interval()
        };
        assert_eq!(at(1.0), Duration::from_millis(500));
        assert_eq!(at(2.0), Duration::from_millis(250));
        assert_eq!(at(5.0), Duration::from_millis(100));
        assert_eq!(at(0.1), Duration::from_millis(500));
    }

    #[test]
    fn test_lifecycle() {
        let mut effect = runner();
        assert_eq!(effect.state(), EffectState::Uninitialized);
        assert!(matches!(effect.start(), Err(ControlError::InvalidState(_))));

        effect.initialize(EffectConfig::default()).unwrap();
        assert_eq!(effect.state(), EffectState::Initialized);
        effect.start().unwrap();
        assert_eq!(effect.state(), EffectState::Running);
        assert!(effect.initialize(EffectConfig::default()).is_err());

        effect.pause().unwrap();
        assert_eq!(effect.state(), EffectState::Paused);
        assert!(effect.pause().is_err());
        effect.resume().unwrap();

        std::thread::sleep(Duration::from_millis(30));
        effect.stop().unwrap();
        assert_eq!(effect.state(), EffectState::Stopped);
        let ticks = effect.with_pattern(|p| p.ticks);
        assert!(ticks > 0);

        // Joined: no more ticks after stop
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(effect.with_pattern(|p| p.ticks), ticks);

        effect.stop().unwrap();
        effect.start().unwrap();
        assert_eq!(effect.state(), EffectState::Running);
    }

    #[test]
    fn test_paused_worker_idles() {
        let mut effect = runner();
        effect.initialize(EffectConfig::default()).unwrap();
        effect.start().unwrap();
        effect.pause().unwrap();
        // Allow an in-flight tick to finish
        std::thread::sleep(Duration::from_millis(10));
        let before = effect.with_pattern(|p| p.ticks);
        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(effect.with_pattern(|p| p.ticks), before);
        effect.stop().unwrap();
    }

    #[test]
    fn test_invalid_config_moves_to_error() {
        let mut effect = runner();
        let config = EffectConfig {
            intensity: f64::INFINITY,
            ..Default::default()
        };
        assert!(effect.initialize(config).is_err());
        assert_eq!(effect.state(), EffectState::Error);
        // Recoverable with a good config
        effect.initialize(EffectConfig::default()).unwrap();
        assert_eq!(effect.state(), EffectState::Initialized);
    }

    #[test]
    fn test_level_tracker_normalizes() {
        let mut tracker = LevelTracker::new(1.0);
        let levels = tracker.update(&bands(0.02, 0.01, 0.0));
        assert_eq!(levels.low, 1.0);
        assert_eq!(levels.mid, 1.0);
        assert_eq!(levels.high, 0.0);
        let levels = tracker.update(&bands(0.01, 0.01, 0.0));
        assert!((levels.low - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_ring_distance() {
        assert_eq!(ring_distance(0, 1, 10), 1);
        assert_eq!(ring_distance(0, 9, 10), 1);
        assert_eq!(ring_distance(2, 7, 10), 5);
        assert_eq!(ring_distance(3, 3, 10), 0);
    }
}
