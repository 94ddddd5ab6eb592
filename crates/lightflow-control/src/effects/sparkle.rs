//! Random short-lived twinkles

use super::{BandLevels, EffectConfig, EffectContext, EffectPattern, EffectRunner};
use crate::error::Result;
use crate::models::Rgb;
use crate::stream::ChannelTable;
use lightflow_core::BeatEvent;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;

/// Registry name
pub const NAME: &str = "Sparkle";

/// Shown in effect listings
pub const DESCRIPTION: &str =
    "Warm white twinkles at random channels, bursting on beats";

const TICK: Duration = Duration::from_millis(16);
const SPAWN_CHANCE: f64 = 0.02;
const DECAY: f64 = 0.05;
const BEAT_SPARKLES: usize = 3;
const LOUD: f64 = 0.5;

/// Per-channel twinkle levels
#[derive(Debug, Clone)]
pub struct Sparkle {
    levels: Vec<f64>,
    rng: StdRng,
}

impl Default for Sparkle {
    fn default() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }
}

impl Sparkle {
    /// Deterministic sparkle pattern
    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            levels: Vec::new(),
            rng,
        }
    }

    /// Current twinkle level per channel
    pub fn levels(&self) -> &[f64] {
        &self.levels
    }

    fn spawn(&mut self) {
        if self.levels.is_empty() {
            return;
        }
        let index = self.rng.gen_range(0..self.levels.len());
        self.levels[index] = 1.0;
    }
}

impl EffectPattern for Sparkle {
    fn tick_interval(&self, _config: &EffectConfig) -> Option<Duration> {
        Some(TICK)
    }

    fn reset(&mut self, channel_count: usize) {
        self.levels = vec![0.0; channel_count];
    }

    fn tick(&mut self, config: &EffectConfig, out: &ChannelTable) -> Result<()> {
        if self.rng.gen::<f64>() < config.speed * SPAWN_CHANCE {
            self.spawn();
        }
        let color = Rgb::from_hsv(60.0, 0.3, 1.0);
        let ceiling = config.max_level();
        for (index, level) in self.levels.iter_mut().enumerate() {
            *level = (*level - DECAY).max(0.0);
            out.update_channel(index, color, *level * ceiling)?;
        }
        Ok(())
    }

    fn on_levels(
        &mut self,
        config: &EffectConfig,
        levels: &BandLevels,
        _out: &ChannelTable,
    ) -> Result<()> {
        if levels.total > LOUD && self.rng.gen::<f64>() < levels.total * config.audio_sensitivity {
            self.spawn();
        }
        Ok(())
    }

    fn on_beat(
        &mut self,
        _config: &EffectConfig,
        _beat: &BeatEvent,
        _out: &ChannelTable,
    ) -> Result<()> {
        for _ in 0..BEAT_SPARKLES {
            self.spawn();
        }
        Ok(())
    }
}

/// Sparkle effect
pub type SparkleEffect = EffectRunner<Sparkle>;

/// New sparkle effect writing into `context`
pub fn create(context: EffectContext) -> SparkleEffect {
    EffectRunner::new(NAME, DESCRIPTION, Sparkle::default(), context)
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;

    #[test]
    fn test_beat_spawns_and_tick_decays() {
        let ctx = context(6);
        let mut sparkle = Sparkle::with_seed(7);
        sparkle.reset(6);
        let config = EffectConfig {
            speed: 0.1,
            ..Default::default()
        };

        sparkle.on_beat(&config, &beat(), &ctx.channels).unwrap();
        let lit = sparkle.levels().iter().filter(|l| **l == 1.0).count();
        assert!((1..=3).contains(&lit));

        for _ in 0..25 {
            sparkle.tick(&config, &ctx.channels).unwrap();
        }
        // Every twinkle fades out within 20 ticks; at most a fresh one remains
        let bright = sparkle.levels().iter().filter(|l| **l > 0.5).count();
        assert!(bright <= 1);
        assert!(ctx.channels.snapshot().iter().all(|s| s.brightness <= 0.64 + 1e-12));
    }

    #[test]
    fn test_empty_area_is_harmless() {
        let ctx = context(0);
        let mut sparkle = Sparkle::with_seed(1);
        sparkle.reset(0);
        let config = EffectConfig::default();
        sparkle.on_beat(&config, &beat(), &ctx.channels).unwrap();
        sparkle.tick(&config, &ctx.channels).unwrap();
        assert!(sparkle.levels().is_empty());
    }
}
