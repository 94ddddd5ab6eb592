//! Sine-driven brightness pulse across all channels

use super::{BandLevels, EffectConfig, EffectContext, EffectPattern, EffectRunner};
use crate::error::Result;
use crate::models::Rgb;
use crate::stream::ChannelTable;
use lightflow_core::BeatEvent;
use std::f64::consts::TAU;
use std::time::Duration;

/// Registry name
pub const NAME: &str = "Pulse";

/// Shown in effect listings
pub const DESCRIPTION: &str =
    "Magenta brightness pulse; strength follows loudness, beats restart the wave";

const TICK: Duration = Duration::from_millis(16);
const PHASE_STEP: f64 = 0.05;
const HUE: f64 = 300.0;

/// Pulse animation state
#[derive(Debug, Clone)]
pub struct Pulse {
    phase: f64,
    level: f64,
}

impl Default for Pulse {
    fn default() -> Self {
        Self {
            phase: 0.0,
            level: 0.5,
        }
    }
}

impl Pulse {
    /// Current phase in radians, `[0, 2π)`
    pub fn phase(&self) -> f64 {
        self.phase
    }

    /// Audio-driven pulse strength, `[0.2, 1]`
    pub fn level(&self) -> f64 {
        self.level
    }
}

impl EffectPattern for Pulse {
    fn tick_interval(&self, _config: &EffectConfig) -> Option<Duration> {
        Some(TICK)
    }

    fn reset(&mut self, _channel_count: usize) {
        *self = Self::default();
    }

    fn tick(&mut self, config: &EffectConfig, out: &ChannelTable) -> Result<()> {
        self.phase = (self.phase + config.speed * PHASE_STEP) % TAU;
        let wave = (self.phase.sin() + 1.0) / 2.0;
        let brightness = wave * config.max_level() * self.level;
        out.update_all(Rgb::from_hsv(HUE, 1.0, 1.0), brightness);
        Ok(())
    }

    fn on_levels(
        &mut self,
        config: &EffectConfig,
        levels: &BandLevels,
        _out: &ChannelTable,
    ) -> Result<()> {
        self.level = (levels.total * config.audio_sensitivity).clamp(0.2, 1.0);
        Ok(())
    }

    fn on_beat(
        &mut self,
        _config: &EffectConfig,
        _beat: &BeatEvent,
        _out: &ChannelTable,
    ) -> Result<()> {
        self.phase = 0.0;
        Ok(())
    }
}

/// Pulse effect
pub type PulseEffect = EffectRunner<Pulse>;

/// New pulse effect writing into `context`
pub fn create(context: EffectContext) -> PulseEffect {
    EffectRunner::new(NAME, DESCRIPTION, Pulse::default(), context)
}
