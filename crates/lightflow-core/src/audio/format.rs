//! Sample normalization helpers shared by the capture backends

use crate::error::{CoreError, Result};

/// Average interleaved frames down to a single channel.
///
/// Fails with `UnsupportedFormat` when `channels` is zero or the buffer ends
/// in a partial frame.
pub fn downmix_to_mono(interleaved: &[f32], channels: usize) -> Result<Vec<f32>> {
    let mut mono = Vec::new();
    downmix_into(interleaved, channels, |s| s, &mut mono)?;
    Ok(mono)
}

/// Convert and average interleaved frames in one pass, appending to `out`.
///
/// Used on the capture thread, where `T` is the device's native sample type
/// and `to_f32` its normalization. `out` is only reserved, never reallocated
/// per sample.
pub fn downmix_into<T: Copy>(
    interleaved: &[T],
    channels: usize,
    to_f32: impl Fn(T) -> f32,
    out: &mut Vec<f32>,
) -> Result<()> {
    if channels == 0 {
        return Err(CoreError::UnsupportedFormat(
            "device reported zero channels".to_string(),
        ));
    }
    if interleaved.len() % channels != 0 {
        return Err(CoreError::UnsupportedFormat(format!(
            "buffer of {} samples is not a whole number of {}-channel frames",
            interleaved.len(),
            channels
        )));
    }

    out.reserve(interleaved.len() / channels);
    if channels == 1 {
        out.extend(interleaved.iter().map(|&s| to_f32(s)));
        return Ok(());
    }

    let scale = 1.0 / channels as f32;
    out.extend(
        interleaved
            .chunks_exact(channels)
            .map(|frame| frame.iter().map(|&s| to_f32(s)).sum::<f32>() * scale),
    );
    Ok(())
}

/// Replace NaN/Inf with silence and clamp into `[-1, 1]`.
///
/// Returns how many samples were non-finite.
pub fn sanitize(samples: &mut [f32]) -> usize {
    let mut replaced = 0;
    for s in samples.iter_mut() {
        if s.is_finite() {
            *s = s.clamp(-1.0, 1.0);
        } else {
            *s = 0.0;
            replaced += 1;
        }
    }
    replaced
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_downmix_stereo_mean() {
        let mono = downmix_to_mono(&[1.0, 0.0, 0.5, 0.5, -1.0, 1.0], 2).unwrap();
        assert_eq!(mono, vec![0.5, 0.5, 0.0]);
    }

    #[test]
    fn test_downmix_mono_passthrough() {
        let mono = downmix_to_mono(&[0.1, 0.2], 1).unwrap();
        assert_eq!(mono, vec![0.1, 0.2]);
    }

    #[test]
    fn test_downmix_rejects_partial_frame() {
        let err = downmix_to_mono(&[0.1, 0.2, 0.3], 2).unwrap_err();
        assert!(matches!(err, CoreError::UnsupportedFormat(_)));
    }

    #[test]
    fn test_downmix_rejects_zero_channels() {
        assert!(downmix_to_mono(&[0.1], 0).is_err());
    }

    #[test]
    fn test_downmix_into_converts_in_one_pass() {
        let mut out = Vec::with_capacity(4);
        let ptr = out.as_ptr();
        downmix_into(&[i16::MAX, i16::MAX, 0, i16::MIN], 2, |s| s as f32 / 32768.0, &mut out)
            .unwrap();
        assert_eq!(out.len(), 2);
        assert!((out[0] - 32767.0 / 32768.0).abs() < 1e-6);
        assert_eq!(out[1], -0.5);
        // Fits the reserved buffer without reallocating
        assert_eq!(out.as_ptr(), ptr);
    }

    #[test]
    fn test_downmix_into_rejects_partial_frame_untouched() {
        let mut out = vec![0.25];
        assert!(downmix_into(&[1u16, 2, 3], 2, |s| s as f32, &mut out).is_err());
        assert_eq!(out, vec![0.25]);
    }

    #[test]
    fn test_sanitize() {
        let mut samples = vec![f32::NAN, 2.0, -0.5, f32::NEG_INFINITY];
        let replaced = sanitize(&mut samples);
        assert_eq!(replaced, 2);
        assert_eq!(samples, vec![0.0, 1.0, -0.5, 0.0]);
    }
}
