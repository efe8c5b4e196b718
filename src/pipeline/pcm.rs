//! Float to signed 16-bit little-endian PCM conversion.

use crate::defaults::BYTES_PER_SAMPLE;

/// Scale for negative samples: -1.0 maps to `i16::MIN`.
const NEGATIVE_SCALE: f32 = 32768.0;
/// Scale for non-negative samples: 1.0 maps to `i16::MAX`.
const POSITIVE_SCALE: f32 = 32767.0;

/// Counters produced while encoding a frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EncodeStats {
    /// Samples written.
    pub samples: usize,
    /// NaN or infinite samples that were written as silence.
    pub non_finite: usize,
}

/// Convert one float sample to a PCM integer.
///
/// Non-finite input is treated as 0.0; everything else is clamped to
/// [-1.0, 1.0] and scaled asymmetrically so both ends of the i16 range are
/// reachable without overflow.
pub fn sample_to_i16(sample: f32) -> i16 {
    let s = if sample.is_finite() { sample } else { 0.0 };
    let s = s.clamp(-1.0, 1.0);
    if s < 0.0 {
        (s * NEGATIVE_SCALE).round() as i16
    } else {
        (s * POSITIVE_SCALE).round() as i16
    }
}

/// Convert one PCM integer back to a float sample, mirroring [`sample_to_i16`].
pub fn i16_to_sample(value: i16) -> f32 {
    if value < 0 {
        value as f32 / NEGATIVE_SCALE
    } else {
        value as f32 / POSITIVE_SCALE
    }
}

/// Append the PCM encoding of `samples` to `out`.
pub fn encode_pcm16_into(samples: &[f32], out: &mut Vec<u8>) -> EncodeStats {
    out.reserve(samples.len() * BYTES_PER_SAMPLE);
    let mut non_finite = 0;
    for &sample in samples {
        if !sample.is_finite() {
            non_finite += 1;
        }
        out.extend_from_slice(&sample_to_i16(sample).to_le_bytes());
    }
    EncodeStats {
        samples: samples.len(),
        non_finite,
    }
}

/// Encode float samples as signed 16-bit little-endian PCM.
///
/// The output is always exactly `2 * samples.len()` bytes.
pub fn encode_pcm16(samples: &[f32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(samples.len() * BYTES_PER_SAMPLE);
    encode_pcm16_into(samples, &mut out);
    out
}

/// Decode signed 16-bit little-endian PCM back to float samples.
///
/// A trailing odd byte is ignored.
pub fn decode_pcm16(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(BYTES_PER_SAMPLE)
        .map(|pair| i16_to_sample(i16::from_le_bytes([pair[0], pair[1]])))
        .collect()
}

/// Decode signed 16-bit little-endian PCM to raw integers.
pub fn pcm16_to_i16(bytes: &[u8]) -> Vec<i16> {
    bytes
        .chunks_exact(BYTES_PER_SAMPLE)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect()
}
