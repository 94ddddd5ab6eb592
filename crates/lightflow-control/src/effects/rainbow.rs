//! Hue wheel spread across the channels and rotating over time

use super::{EffectConfig, EffectContext, EffectPattern, EffectRunner};
use crate::error::Result;
use crate::models::Rgb;
use crate::stream::ChannelTable;
use std::time::Duration;

/// Registry name
pub const NAME: &str = "Rainbow";

/// Shown in effect listings
pub const DESCRIPTION: &str =
    "Rotating hue wheel spread evenly over the channels";

const TICK: Duration = Duration::from_millis(100);
const DEGREES_PER_TICK: f64 = 2.0;

/// Rainbow rotation state
#[derive(Debug, Clone, Default)]
pub struct Rainbow {
    hue: f64,
    channel_count: usize,
}

impl Rainbow {
    /// Hue of channel 0, degrees in `[0, 360)`
    pub fn hue(&self) -> f64 {
        self.hue
    }
}

impl EffectPattern for Rainbow {
    fn tick_interval(&self, _config: &EffectConfig) -> Option<Duration> {
        Some(TICK)
    }

    fn reset(&mut self, channel_count: usize) {
        self.hue = 0.0;
        self.channel_count = channel_count;
    }

    fn tick(&mut self, config: &EffectConfig, out: &ChannelTable) -> Result<()> {
        self.hue = (self.hue + DEGREES_PER_TICK * config.speed).rem_euclid(360.0);
        if self.channel_count == 0 {
            return Ok(());
        }
        let spacing = 360.0 / self.channel_count as f64;
        let level = config.max_level();
        for index in 0..self.channel_count {
            let color = Rgb::from_hsv(self.hue + spacing * index as f64, config.saturation, 1.0);
            out.update_channel(index, color, level)?;
        }
        Ok(())
    }
}

/// Rainbow effect
pub type RainbowEffect = EffectRunner<Rainbow>;

/// New rainbow effect writing into `context`
pub fn create(context: EffectContext) -> RainbowEffect {
    EffectRunner::new(NAME, DESCRIPTION, Rainbow::default(), context)
}
