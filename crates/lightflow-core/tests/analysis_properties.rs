use lightflow_core::{BandEnergyAnalyzer, BeatConfig, BeatEstimator, Spectrum, SpectrumTransform};
use proptest::prelude::*;

proptest! {
    #[test]
    fn zero_input_gives_zero_spectrum(exp in 1u32..=12, rate in 8000u32..=96000) {
        let size = 1usize << exp;
        let mut transform = SpectrumTransform::new(size).unwrap();
        let spectrum = transform.process(&vec![0.0; size], rate, 0.0).unwrap();
        prop_assert_eq!(spectrum.len(), size / 2);
        prop_assert!(spectrum.magnitudes().iter().all(|m| *m == 0.0));
    }

    #[test]
    fn bin_and_frequency_roundtrip(
        exp in 2u32..=13,
        rate in 8000u32..=192000,
        fraction in 0.0f64..1.0,
    ) {
        let size = 1usize << exp;
        let transform = SpectrumTransform::new(size).unwrap();
        let freq = fraction * rate as f64 / 2.0;
        let bin = transform.bin_index_for(freq, rate).unwrap();
        let back = transform.frequency_for(bin, rate).unwrap();
        let width = transform.bin_width(rate);
        prop_assert!((back - freq).abs() <= width + 1e-9);
    }

    #[test]
    fn band_total_is_sum(
        magnitudes in prop::collection::vec(0.0f32..10.0, 1..1024),
        rate in 8000u32..=96000,
    ) {
        let size = magnitudes.len() * 2;
        let spectrum = Spectrum::new(magnitudes, rate, size, 0.0).unwrap();
        let energy = BandEnergyAnalyzer::default().analyze(&spectrum);
        let sum = energy.low + energy.mid + energy.high;
        prop_assert!((energy.total - sum).abs() <= 1e-9 * sum.abs().max(1.0));
        prop_assert!(energy.low >= 0.0 && energy.mid >= 0.0 && energy.high >= 0.0);
    }

    #[test]
    fn constant_energy_never_beats(
        level in 0.0f64..100.0,
        window in 1usize..64,
        extra in 1usize..200,
    ) {
        let mut estimator = BeatEstimator::new(BeatConfig {
            window_size: window,
            ..Default::default()
        }).unwrap();
        for i in 0..window + extra {
            prop_assert!(estimator.process(level, i as f64 * 0.02).is_none());
        }
    }

    #[test]
    fn beats_respect_refractory_interval(
        energies in prop::collection::vec(0.0f64..10.0, 20..400),
        step_ms in 1u32..60,
        min_interval_ms in 50.0f64..500.0,
    ) {
        let mut estimator = BeatEstimator::new(BeatConfig {
            window_size: 8,
            min_interval_ms,
            ..Default::default()
        }).unwrap();

        let beats: Vec<_> = energies
            .iter()
            .enumerate()
            .filter_map(|(i, e)| estimator.process(*e, i as f64 * step_ms as f64 / 1000.0))
            .collect();

        for pair in beats.windows(2) {
            prop_assert!((pair[1].timestamp - pair[0].timestamp) * 1000.0 >= min_interval_ms);
        }
        for beat in &beats {
            prop_assert!((0.0..=1.0).contains(&beat.confidence));
        }
    }
}
