//! # Sample Rate Conversion
//!
//! Linear-interpolation resampling of mono 16-bit PCM.
//!
//! ## Method:
//! With `ratio = source_rate / target_rate`, output sample `i` is read from source
//! position `i * ratio`, interpolated between the two neighbouring input samples.
//! The last position has no right neighbour and takes the input sample as-is
//! (no extrapolation). Output length is `floor(len / ratio)`.
//!
//! Works for both directions; upsampling just means `ratio < 1`.

use super::ConversionError;

/// Default output rate for telephony audio (Hz)
pub const TELEPHONY_SAMPLE_RATE: u32 = 8000;

/// Resample `samples` from `source_rate` to `target_rate`.
///
/// ## Returns:
/// - A new buffer; the input is never modified
/// - An exact copy when the rates already match
/// - An empty buffer for empty input
///
/// ## Errors:
/// - `InvalidSampleRate` when `source_rate` is zero
/// - `InvalidTargetRate` when `target_rate` is zero
pub fn resample(
    samples: &[i16],
    source_rate: u32,
    target_rate: u32,
) -> Result<Vec<i16>, ConversionError> {
    if source_rate == 0 {
        return Err(ConversionError::InvalidSampleRate(source_rate));
    }
    if target_rate == 0 {
        return Err(ConversionError::InvalidTargetRate(target_rate));
    }
    if source_rate == target_rate || samples.is_empty() {
        return Ok(samples.to_vec());
    }

    let ratio = source_rate as f64 / target_rate as f64;
    let output_len = output_length(samples.len(), ratio);
    let last = samples.len() - 1;

    let output = (0..output_len)
        .map(|i| {
            let pos = i as f64 * ratio;
            let idx = (pos.floor() as usize).min(last);
            let frac = pos - idx as f64;

            let value = if idx < last {
                let a = samples[idx] as f64;
                let b = samples[idx + 1] as f64;
                a + (b - a) * frac
            } else {
                samples[idx] as f64
            };

            saturate(value)
        })
        .collect();

    Ok(output)
}

/// Number of output samples produced for `input_len` samples at the given ratio.
pub fn output_length(input_len: usize, ratio: f64) -> usize {
    (input_len as f64 / ratio).floor() as usize
}

/// Round to nearest and clamp into the i16 range.
fn saturate(value: f64) -> i16 {
    value.round().clamp(i16::MIN as f64, i16::MAX as f64) as i16
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::ErrorKind;

    fn ramp(len: usize) -> Vec<i16> {
        (0..len).map(|i| (i as i32 * 7 - 3000) as i16).collect()
    }

    #[test]
    fn test_identity_at_target_rate() {
        let input = ramp(1234);
        let output = resample(&input, 8000, TELEPHONY_SAMPLE_RATE).unwrap();
        assert_eq!(output, input);
    }

    #[test]
    fn test_output_length_law() {
        for &rate in &[11025u32, 16000, 22050, 32000, 44100, 48000, 96000, 4000] {
            for &len in &[0usize, 1, 2, 3, 17, 160, 1000, 44101] {
                let input = ramp(len);
                let output = resample(&input, rate, TELEPHONY_SAMPLE_RATE).unwrap();
                let ratio = rate as f64 / TELEPHONY_SAMPLE_RATE as f64;
                assert_eq!(
                    output.len(),
                    output_length(len, ratio),
                    "rate {} len {}",
                    rate,
                    len
                );
            }
        }

        // Exact ratios leave no rounding doubt
        assert_eq!(resample(&ramp(1000), 16000, 8000).unwrap().len(), 500);
        assert_eq!(resample(&ramp(1001), 16000, 8000).unwrap().len(), 500);
        assert_eq!(resample(&ramp(4800), 48000, 8000).unwrap().len(), 800);
        assert_eq!(resample(&ramp(100), 4000, 8000).unwrap().len(), 200);
    }

    #[test]
    fn test_halving_picks_even_samples() {
        let input = ramp(20);
        let output = resample(&input, 16000, 8000).unwrap();
        let expected: Vec<i16> = input.iter().step_by(2).copied().collect();
        assert_eq!(output, expected);
    }

    #[test]
    fn test_interpolates_between_neighbours() {
        // ratio 1.5: positions 0, 1.5, 3, 4.5
        let input = vec![0i16, 100, 200, 300, 400, 500];
        let output = resample(&input, 12000, 8000).unwrap();
        assert_eq!(output, vec![0, 150, 300, 450]);
    }

    #[test]
    fn test_last_position_is_clamped() {
        // ratio 0.5: the final position 1.5 has no right neighbour past index 1
        let input = vec![1000i16, 2000];
        let output = resample(&input, 4000, 8000).unwrap();
        assert_eq!(output, vec![1000, 1500, 2000, 2000]);
    }

    #[test]
    fn test_output_stays_within_input_envelope() {
        let input: Vec<i16> = (0..999)
            .map(|i| if i % 2 == 0 { i16::MAX } else { i16::MIN })
            .collect();

        for &rate in &[4000u32, 11025, 44100] {
            let output = resample(&input, rate, 8000).unwrap();
            assert!(!output.is_empty());

            // Interpolated values never wrap around at the extremes
            let ratio = rate as f64 / 8000.0;
            for (i, &sample) in output.iter().enumerate() {
                let pos = i as f64 * ratio;
                if pos.fract() == 0.0 {
                    assert_eq!(sample, input[pos as usize]);
                }
            }
        }

        let loud = vec![i16::MAX; 300];
        assert!(resample(&loud, 11025, 8000).unwrap().iter().all(|&s| s == i16::MAX));
        let quiet = vec![i16::MIN; 300];
        assert!(resample(&quiet, 4000, 8000).unwrap().iter().all(|&s| s == i16::MIN));
    }

    #[test]
    fn test_empty_input() {
        assert!(resample(&[], 44100, 8000).unwrap().is_empty());
    }

    #[test]
    fn test_zero_rates_are_rejected() {
        let err = resample(&[1, 2, 3], 0, 8000).unwrap_err();
        assert!(matches!(err, ConversionError::InvalidSampleRate(0)));
        assert_eq!(err.kind(), ErrorKind::Value);

        let err = resample(&[1, 2, 3], 16000, 0).unwrap_err();
        assert!(matches!(err, ConversionError::InvalidTargetRate(0)));
    }
}
