//! Single lit channel running around the area with a fading trail

use super::{ring_distance, EffectConfig, EffectContext, EffectPattern, EffectRunner};
use crate::error::Result;
use crate::models::Rgb;
use crate::stream::ChannelTable;
use lightflow_core::BeatEvent;
use std::time::Duration;

/// Registry name
pub const NAME: &str = "Chase";

/// Shown in effect listings
pub const DESCRIPTION: &str =
    "Orange light chasing around the area, stepping on beats when audio-reactive";

const HUE: f64 = 30.0;
const TRAIL: usize = 2;

/// Chase animation state
#[derive(Debug, Clone, Default)]
pub struct Chase {
    position: usize,
    channel_count: usize,
}

impl Chase {
    /// Index of the fully lit channel
    pub fn position(&self) -> usize {
        self.position
    }

    fn advance(&mut self) {
        if self.channel_count > 0 {
            self.position = (self.position + 1) % self.channel_count;
        }
    }

    fn render(&self, config: &EffectConfig, out: &ChannelTable) -> Result<()> {
        let color = Rgb::from_hsv(HUE, 1.0, 1.0);
        let peak = config.max_level();
        for index in 0..self.channel_count {
            let distance = ring_distance(index, self.position, self.channel_count);
            if distance == 0 {
                out.update_channel(index, color, peak)?;
            } else if distance <= TRAIL {
                let fade = 1.0 - distance as f64 / (TRAIL + 1) as f64;
                out.update_channel(index, color, peak * fade)?;
            } else {
                out.update_channel(index, Rgb::BLACK, 0.0)?;
            }
        }
        Ok(())
    }
}

impl EffectPattern for Chase {
    fn tick_interval(&self, config: &EffectConfig) -> Option<Duration> {
        Some(config.step_interval())
    }

    fn reset(&mut self, channel_count: usize) {
        self.position = 0;
        self.channel_count = channel_count;
    }

    fn tick(&mut self, config: &EffectConfig, out: &ChannelTable) -> Result<()> {
        self.render(config, out)?;
        // Audio-reactive chases step on beats instead
        if !config.audio_reactive {
            self.advance();
        }
        Ok(())
    }

    fn on_beat(
        &mut self,
        config: &EffectConfig,
        _beat: &BeatEvent,
        out: &ChannelTable,
    ) -> Result<()> {
        self.advance();
        self.render(config, out)
    }
}

/// Chase effect
pub type ChaseEffect = EffectRunner<Chase>;

/// New chase effect writing into `context`
pub fn create(context: EffectContext) -> ChaseEffect {
    EffectRunner::new(NAME, DESCRIPTION, Chase::default(), context)
}
