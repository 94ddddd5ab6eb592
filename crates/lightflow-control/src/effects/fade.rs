//! Slow breathing of a tinted white

use super::{BandLevels, EffectConfig, EffectContext, EffectPattern, EffectRunner};
use crate::error::Result;
use crate::models::Rgb;
use crate::stream::ChannelTable;
use std::time::Duration;

/// Registry name
pub const NAME: &str = "Fade";

/// Shown in effect listings
pub const DESCRIPTION: &str =
    "White slowly fading in and out; loud passages reverse the ramp";

const TICK: Duration = Duration::from_millis(100);
const STEP: f64 = 0.01;
const FLIP_THRESHOLD: f64 = 0.5;

// Roughly 2700 K and 8000 K
const WARM: Rgb = Rgb::new(255, 167, 87);
const COOL: Rgb = Rgb::new(201, 226, 255);

/// White tinted by `temperature`: 0 warm, 0.5 neutral, 1 cool
pub fn tinted_white(temperature: f64) -> Rgb {
    let t = temperature.clamp(0.0, 1.0);
    let (from, to, f) = if t < 0.5 {
        (WARM, Rgb::WHITE, t * 2.0)
    } else {
        (Rgb::WHITE, COOL, (t - 0.5) * 2.0)
    };
    let mix = |a: u8, b: u8| (a as f64 + (b as f64 - a as f64) * f).round() as u8;
    Rgb::new(mix(from.r, to.r), mix(from.g, to.g), mix(from.b, to.b))
}

/// Fade ramp state
#[derive(Debug, Clone)]
pub struct Fade {
    level: f64,
    rising: bool,
}

impl Default for Fade {
    fn default() -> Self {
        Self {
            level: 0.0,
            rising: true,
        }
    }
}

impl Fade {
    /// Current brightness
    pub fn level(&self) -> f64 {
        self.level
    }

    /// Ramp direction
    pub fn is_rising(&self) -> bool {
        self.rising
    }
}

impl EffectPattern for Fade {
    fn tick_interval(&self, _config: &EffectConfig) -> Option<Duration> {
        Some(TICK)
    }

    fn reset(&mut self, _channel_count: usize) {
        *self = Self::default();
    }

    fn tick(&mut self, config: &EffectConfig, out: &ChannelTable) -> Result<()> {
        let ceiling = config.max_level();
        let step = config.speed * STEP;
        if self.rising {
            self.level += step;
            if self.level >= ceiling {
                self.level = ceiling;
                self.rising = false;
            }
        } else {
            self.level -= step;
            if self.level <= 0.0 {
                self.level = 0.0;
                self.rising = true;
            }
        }
        out.update_all(tinted_white(config.color_temperature), self.level);
        Ok(())
    }

    fn on_levels(
        &mut self,
        _config: &EffectConfig,
        levels: &BandLevels,
        _out: &ChannelTable,
    ) -> Result<()> {
        if levels.total > FLIP_THRESHOLD {
            self.rising = !self.rising;
        }
        Ok(())
    }
}

/// Fade effect
pub type FadeEffect = EffectRunner<Fade>;

/// New fade effect writing into `context`
pub fn create(context: EffectContext) -> FadeEffect {
    EffectRunner::new(NAME, DESCRIPTION, Fade::default(), context)
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;

    #[test]
    fn test_tinted_white() {
        assert_eq!(tinted_white(0.5), Rgb::WHITE);
        assert_eq!(tinted_white(0.0), WARM);
        assert_eq!(tinted_white(1.0), COOL);
    }

    #[test]
    fn test_ramp_bounces() {
        let ctx = context(1);
        let mut fade = Fade::default();
        let config = EffectConfig {
            speed: 5.0,
            brightness: 0.5,
            intensity: 1.0,
            ..Default::default()
        };
        let mut ticks = 0;
        while fade.is_rising() {
            fade.tick(&config, &ctx.channels).unwrap();
            ticks += 1;
            assert!(ticks <= 11, "ramp never reached the ceiling");
        }
        assert_eq!(fade.level(), 0.5);

        fade.tick(&config, &ctx.channels).unwrap();
        assert!((fade.level() - 0.45).abs() < 1e-9);
        assert!((ctx.channels.get(0).unwrap().brightness - 0.45).abs() < 1e-9);
    }

    #[test]
    fn test_loud_input_flips_direction() {
        let ctx = context(1);
        let mut fade = Fade::default();
        let config = EffectConfig::default();
        let quiet = BandLevels {
            total: 0.2,
            ..Default::default()
        };
        fade.on_levels(&config, &quiet, &ctx.channels).unwrap();
        assert!(fade.is_rising());

        let loud = BandLevels {
            total: 0.9,
            ..Default::default()
        };
        fade.on_levels(&config, &loud, &ctx.channels).unwrap();
        assert!(!fade.is_rising());
    }
}
