//! Whole-area on/off flashing

use super::{EffectConfig, EffectContext, EffectPattern, EffectRunner};
use crate::error::Result;
use crate::models::Rgb;
use crate::stream::ChannelTable;
use lightflow_core::BeatEvent;
use std::time::Duration;

/// Registry name
pub const NAME: &str = "Strobe";

/// Shown in effect listings
pub const DESCRIPTION: &str =
    "White strobe on a fixed rate, toggled by beats when audio-reactive";

/// Strobe toggle state
#[derive(Debug, Clone, Default)]
pub struct Strobe {
    lit: bool,
}

impl Strobe {
    /// Whether the last write turned the lights on
    pub fn is_lit(&self) -> bool {
        self.lit
    }

    fn toggle(&mut self, config: &EffectConfig, out: &ChannelTable) {
        self.lit = !self.lit;
        if self.lit {
            out.update_all(Rgb::WHITE, config.max_level());
        } else {
            out.update_all(Rgb::BLACK, 0.0);
        }
    }
}

impl EffectPattern for Strobe {
    fn tick_interval(&self, config: &EffectConfig) -> Option<Duration> {
        Some(config.step_interval())
    }

    fn reset(&mut self, _channel_count: usize) {
        self.lit = false;
    }

    fn tick(&mut self, config: &EffectConfig, out: &ChannelTable) -> Result<()> {
        self.toggle(config, out);
        Ok(())
    }

    fn on_beat(
        &mut self,
        config: &EffectConfig,
        _beat: &BeatEvent,
        out: &ChannelTable,
    ) -> Result<()> {
        self.toggle(config, out);
        Ok(())
    }
}

/// Strobe effect
pub type StrobeEffect = EffectRunner<Strobe>;

/// New strobe effect writing into `context`
pub fn create(context: EffectContext) -> StrobeEffect {
    EffectRunner::new(NAME, DESCRIPTION, Strobe::default(), context)
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;

    #[test]
    fn test_toggles() {
        let ctx = context(2);
        let mut strobe = Strobe::default();
        let config = EffectConfig::default();

        strobe.tick(&config, &ctx.channels).unwrap();
        assert!(strobe.is_lit());
        assert_eq!(ctx.channels.get(0).unwrap().color, Rgb::WHITE);
        assert!((ctx.channels.get(1).unwrap().brightness - 0.64).abs() < 1e-12);

        strobe.on_beat(&config, &beat(), &ctx.channels).unwrap();
        assert!(!strobe.is_lit());
        assert_eq!(ctx.channels.get(0).unwrap().brightness, 0.0);
    }
}
