//! Low, mid and high bands mapped onto thirds of the area

use super::{BandLevels, EffectConfig, EffectContext, EffectPattern, EffectRunner};
use crate::error::Result;
use crate::models::Rgb;
use crate::stream::ChannelTable;
use lightflow_core::BeatEvent;
use std::time::Duration;

/// Registry name
pub const NAME: &str = "FrequencyReactive";

/// Shown in effect listings
pub const DESCRIPTION: &str =
    "Bass, mids and highs drive the color and level of one third of the area each";

/// Base hue per section: low red, mid green, high blue
const BASE_HUES: [f64; 3] = [0.0, 120.0, 240.0];
const HUE_SWING: f64 = 60.0;
const GAIN: f64 = 2.0;
const BEAT_FLASH: f64 = 1.5;

/// Band section (0 low, 1 mid, 2 high) for a channel
pub fn section_for(index: usize, channel_count: usize) -> usize {
    if channel_count == 0 {
        return 0;
    }
    (index * 3 / channel_count).min(2)
}

/// Last rendered color and brightness per section
#[derive(Debug, Clone, Default)]
pub struct FrequencyReactive {
    sections: [(Rgb, f64); 3],
    channel_count: usize,
}

impl FrequencyReactive {
    /// Current brightness of each section
    pub fn section_levels(&self) -> [f64; 3] {
        [self.sections[0].1, self.sections[1].1, self.sections[2].1]
    }

    fn render(&self, out: &ChannelTable, scale: f64) -> Result<()> {
        for index in 0..self.channel_count {
            let (color, level) = self.sections[section_for(index, self.channel_count)];
            out.update_channel(index, color, (level * scale).min(1.0))?;
        }
        Ok(())
    }
}

impl EffectPattern for FrequencyReactive {
    fn tick_interval(&self, _config: &EffectConfig) -> Option<Duration> {
        None
    }

    fn reset(&mut self, channel_count: usize) {
        self.sections = Default::default();
        self.channel_count = channel_count;
    }

    fn on_levels(
        &mut self,
        config: &EffectConfig,
        levels: &BandLevels,
        out: &ChannelTable,
    ) -> Result<()> {
        let bands = [levels.low, levels.mid, levels.high];
        let sum: f64 = bands.iter().sum();
        for ((section, level), base) in self.sections.iter_mut().zip(bands).zip(BASE_HUES) {
            let ratio = if sum > 0.0 { level / sum } else { 0.0 };
            let hue = base + config.hue_variation * ratio * HUE_SWING;
            let brightness = (level * config.audio_sensitivity * GAIN).clamp(0.0, 1.0);
            *section = (
                Rgb::from_hsv(hue, config.saturation, 1.0),
                brightness * config.max_level(),
            );
        }
        self.render(out, 1.0)
    }

    fn on_beat(
        &mut self,
        _config: &EffectConfig,
        _beat: &BeatEvent,
        out: &ChannelTable,
    ) -> Result<()> {
        self.render(out, BEAT_FLASH)
    }
}

/// Frequency-reactive effect
pub type FrequencyReactiveEffect = EffectRunner<FrequencyReactive>;

/// New frequency-reactive effect writing into `context`
pub fn create(context: EffectContext) -> FrequencyReactiveEffect {
    EffectRunner::new(NAME, DESCRIPTION, FrequencyReactive::default(), context)
}
