//! Linear-interpolation resampling of a single frame to the target rate.
//!
//! Each frame is resampled on its own. The first and last output samples are
//! copied from the input rather than interpolated, so consecutive frames join
//! without drifting at their boundaries.

use crate::defaults::TARGET_SAMPLE_RATE;
use crate::error::{PcmChunkError, Result};

/// Largest accepted output-to-input length ratio.
///
/// Frames whose rate is below `16000 / MAX_UPSAMPLE_RATIO` Hz (250 Hz) are
/// rejected as invalid instead of expanding into enormous outputs.
pub const MAX_UPSAMPLE_RATIO: f64 = 64.0;

/// Number of output samples for `input_len` samples captured at `source_rate`.
///
/// This is the nominal length `round(n * 16000 / rate)`. [`resample`] collapses
/// it to at most one sample when the input has fewer than two samples or the
/// nominal length is 0 or 1.
pub fn output_len(input_len: usize, source_rate: f64) -> usize {
    (input_len as f64 * TARGET_SAMPLE_RATE as f64 / source_rate).round() as usize
}

/// Checks that a source rate can be resampled from.
pub fn validate_rate(source_rate: f64) -> Result<()> {
    if !source_rate.is_finite() || source_rate <= 0.0 {
        return Err(PcmChunkError::InvalidFrame {
            reason: format!("sample rate must be a positive number, got {}", source_rate),
        });
    }
    Ok(())
}

/// Resample one frame from `source_rate` to 16 kHz.
///
/// - Empty input gives empty output.
/// - A single-sample input gives that sample alone, whatever the rate.
/// - When the nominal output length is 0 or 1, the output is the first input
///   sample.
///
/// # Errors
/// Returns [`PcmChunkError::InvalidFrame`] when `source_rate` is not a
/// positive finite number, or when it is so low that the output would be
/// more than [`MAX_UPSAMPLE_RATIO`] times longer than the input.
pub fn resample(input: &[f32], source_rate: f64) -> Result<Vec<f32>> {
    validate_rate(source_rate)?;

    let n = input.len();
    if n == 0 {
        return Ok(Vec::new());
    }

    if n == 1 {
        return Ok(vec![input[0]]);
    }

    let nominal = (n as f64 * TARGET_SAMPLE_RATE as f64 / source_rate).round();
    if !nominal.is_finite() || nominal > n as f64 * MAX_UPSAMPLE_RATIO {
        return Err(PcmChunkError::InvalidFrame {
            reason: format!(
                "sample rate {} Hz would upsample {} samples more than {}x",
                source_rate, n, MAX_UPSAMPLE_RATIO
            ),
        });
    }

    let m = nominal as usize;
    if m <= 1 {
        return Ok(vec![input[0]]);
    }

    let last = n - 1;
    let stride = last as f64 / (m - 1) as f64;

    let mut output = Vec::with_capacity(m);
    output.push(input[0]);
    for i in 1..m - 1 {
        let t = i as f64 * stride;
        let lo = (t.floor() as usize).min(last);
        let hi = (t.ceil() as usize).min(last);
        if lo == hi {
            output.push(input[lo]);
        } else {
            let frac = (t - lo as f64) as f32;
            output.push(input[lo] + (input[hi] - input[lo]) * frac);
        }
    }
    output.push(input[last]);

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_rate_is_identity() {
        let input = [0.0f32, 0.5, 1.0];
        let output = resample(&input, 16000.0).unwrap();
        assert_eq!(output, vec![0.0, 0.5, 1.0]);
    }

    #[test]
    fn output_length_follows_rounded_ratio() {
        for &(n, rate) in &[
            (4096usize, 44100.0f64),
            (4096, 48000.0),
            (480, 48000.0),
            (1024, 22050.0),
            (100, 8000.0),
            (333, 44100.0),
        ] {
            let input = vec![0.25f32; n];
            let output = resample(&input, rate).unwrap();
            let expected = (n as f64 * 16000.0 / rate).round() as usize;
            assert_eq!(output.len(), expected, "n={} rate={}", n, rate);
        }
    }

    #[test]
    fn endpoints_are_anchored() {
        let input: Vec<f32> = (0..4096).map(|i| ((i as f32) * 0.013).sin()).collect();
        for &rate in &[44100.0, 48000.0, 22050.0, 8000.0, 44056.7] {
            let output = resample(&input, rate).unwrap();
            assert_eq!(output[0], input[0]);
            assert_eq!(output[output.len() - 1], input[input.len() - 1]);
        }
    }

    #[test]
    fn downsample_by_three_picks_every_third_sample_on_a_ramp() {
        // 7 samples at 48 kHz: m = round(7/3) = 2, only endpoints.
        let ramp: Vec<f32> = (0..7).map(|i| i as f32 / 6.0).collect();
        let output = resample(&ramp, 48000.0).unwrap();
        assert_eq!(output, vec![0.0, 1.0]);

        // 10 samples at 48 kHz: m = round(3.33) = 3, stride 4.5.
        let ramp: Vec<f32> = (0..10).map(|i| i as f32).collect();
        let output = resample(&ramp, 48000.0).unwrap();
        assert_eq!(output.len(), 3);
        assert_eq!(output[0], 0.0);
        assert!((output[1] - 4.5).abs() < 1e-6);
        assert_eq!(output[2], 9.0);
    }

    #[test]
    fn upsample_interpolates_between_neighbours() {
        // 3 samples at 8 kHz: m = 6, stride 0.4.
        let input = [0.0f32, 1.0, 0.0];
        let output = resample(&input, 8000.0).unwrap();
        let expected = [0.0f32, 0.4, 0.8, 0.8, 0.4, 0.0];
        assert_eq!(output.len(), expected.len());
        for (got, want) in output.iter().zip(expected.iter()) {
            assert!((got - want).abs() < 1e-6, "got {} want {}", got, want);
        }
    }

    #[test]
    fn interior_samples_stay_within_neighbour_bounds() {
        let input: Vec<f32> = (0..441).map(|i| ((i as f32) * 0.37).cos() * 0.9).collect();
        let output = resample(&input, 44100.0).unwrap();
        let min = input.iter().cloned().fold(f32::INFINITY, f32::min);
        let max = input.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
        assert!(output.iter().all(|&s| s >= min - 1e-6 && s <= max + 1e-6));
    }

    #[test]
    fn constant_signal_stays_constant() {
        let input = vec![0.3f32; 1000];
        let output = resample(&input, 44100.0).unwrap();
        assert!(output.iter().all(|&s| (s - 0.3).abs() < 1e-6));
    }

    #[test]
    fn empty_input_gives_empty_output() {
        assert!(resample(&[], 44100.0).unwrap().is_empty());
    }

    #[test]
    fn single_sample_collapses_to_one_sample() {
        // Upsampling would ask for m = 6, but one point cannot be interpolated.
        assert_eq!(resample(&[0.7], 2666.0).unwrap(), vec![0.7]);
        assert_eq!(resample(&[0.7], 48000.0).unwrap(), vec![0.7]);
    }

    #[test]
    fn tiny_output_length_collapses_to_first_sample() {
        // n = 2 at 96 kHz: m = round(0.33) = 0.
        assert_eq!(resample(&[0.1, 0.9], 96000.0).unwrap(), vec![0.1]);
        // n = 4 at 48 kHz: m = round(1.33) = 1.
        assert_eq!(resample(&[0.2, 0.4, 0.6, 0.8], 48000.0).unwrap(), vec![0.2]);
    }

    #[test]
    fn rejects_non_positive_rate() {
        for rate in [0.0, -44100.0] {
            match resample(&[0.0, 1.0], rate) {
                Err(PcmChunkError::InvalidFrame { reason }) => {
                    assert!(reason.contains("positive"), "reason: {}", reason);
                }
                other => panic!("Expected InvalidFrame, got {:?}", other),
            }
        }
    }

    #[test]
    fn rejects_non_finite_rate() {
        assert!(resample(&[0.0, 1.0], f64::NAN).is_err());
        assert!(resample(&[0.0, 1.0], f64::INFINITY).is_err());
    }

    #[test]
    fn vanishing_rate_is_rejected_without_allocating() {
        match resample(&[0.0, 1.0], 1e-30) {
            Err(PcmChunkError::InvalidFrame { reason }) => {
                assert!(reason.contains("upsample"), "reason: {}", reason);
            }
            other => panic!("Expected InvalidFrame, got {:?}", other),
        }
        assert!(resample(&[0.0, 1.0], f64::MIN_POSITIVE).is_err());
    }

    #[test]
    fn very_low_rate_is_rejected() {
        // 4096 samples at 1 mHz would be ~6.5e10 output samples.
        assert!(matches!(
            resample(&vec![0.0; 4096], 1e-3),
            Err(PcmChunkError::InvalidFrame { .. })
        ));
    }

    #[test]
    fn upsampling_up_to_the_cap_is_allowed() {
        // 250 Hz is exactly MAX_UPSAMPLE_RATIO below the target rate.
        let output = resample(&[0.0, 1.0], 250.0).unwrap();
        assert_eq!(output.len(), 128);
        assert!(resample(&[0.0, 1.0], 249.0).is_err());
        // A single sample never expands, so it is accepted at any positive rate.
        assert_eq!(resample(&[0.4], 1e-30).unwrap(), vec![0.4]);
    }

    #[test]
    fn non_integer_rate_is_supported() {
        let input = vec![0.0f32; 4410];
        let output = resample(&input, 44100.5).unwrap();
        assert_eq!(output.len(), output_len(4410, 44100.5));
    }

    #[test]
    fn resampling_is_deterministic() {
        let input: Vec<f32> = (0..2048).map(|i| (i as f32 * 0.01).sin()).collect();
        assert_eq!(
            resample(&input, 44100.0).unwrap(),
            resample(&input, 44100.0).unwrap()
        );
    }
}
