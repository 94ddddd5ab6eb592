use lightflow_control::{ChannelTable, EffectConfig, Rgb, StreamConfig, StreamDispatcher};
use proptest::prelude::*;
use std::sync::Arc;

proptest! {
    #[test]
    fn prop_sent_brightness_within_clamp(
        writes in proptest::collection::vec((0usize..8, -10.0f64..10.0), 0..32),
    ) {
        let table = Arc::new(ChannelTable::new(8));
        let config = StreamConfig { channel_count: 8, ..Default::default() };
        let dispatcher = StreamDispatcher::new(config.clone(), table.clone()).unwrap();
        for (index, brightness) in writes {
            table.update_channel(index, Rgb::WHITE, brightness).unwrap();
        }
        for state in dispatcher.next_frame() {
            prop_assert!(state.brightness >= config.min_brightness);
            prop_assert!(state.brightness <= config.max_brightness);
        }
    }

    #[test]
    fn prop_validated_config_in_bounds(
        intensity in -5.0f64..5.0,
        speed in -5.0f64..50.0,
        brightness in -5.0f64..5.0,
        sensitivity in -5.0f64..5.0,
        transition_ms in 0u64..100_000,
    ) {
        let config = EffectConfig {
            intensity,
            speed,
            brightness,
            audio_sensitivity: sensitivity,
            transition_ms,
            ..Default::default()
        }
        .validated()
        .unwrap();
        prop_assert!((0.0..=1.0).contains(&config.intensity));
        prop_assert!((0.1..=5.0).contains(&config.speed));
        prop_assert!((0.0..=1.0).contains(&config.brightness));
        prop_assert!((0.0..=1.0).contains(&config.audio_sensitivity));
        prop_assert!(config.transition_ms <= 10_000);
        let interval = config.step_interval().as_millis();
        prop_assert!((50..=500).contains(&interval));
    }
}
