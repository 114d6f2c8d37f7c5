//! G.711 A-law companding encoder.
//!
//! Each 16-bit sample is reduced to a 13-bit magnitude, split into a 3-bit segment
//! (exponent) and a 4-bit mantissa, combined with the sign, and finally has its even
//! bits inverted (XOR 0x55) as the standard requires for transmission. Stateless:
//! every sample is encoded independently.

/// Even-bit inversion applied to every A-law byte
const EVEN_BIT_MASK: u8 = 0x55;

/// Set in the (pre-inversion) code for non-negative samples
const SIGN_BIT: u8 = 0x80;

/// Largest 13-bit magnitude
const MAX_MAGNITUDE: u16 = 0x0FFF;

/// Encode one 16-bit linear PCM sample as an A-law byte.
pub fn encode_sample(sample: i16) -> u8 {
    // Only the top 13 bits carry meaning for A-law
    let value = sample >> 3;

    let (sign, magnitude) = if value >= 0 {
        (SIGN_BIT, value as u16)
    } else {
        // One's complement keeps -4096 inside the 12-bit magnitude range
        (0, (-(value as i32) - 1) as u16)
    };
    let magnitude = magnitude.min(MAX_MAGNITUDE);

    let segment = segment_of(magnitude);
    let mantissa = if segment < 2 {
        (magnitude >> 1) & 0x0F
    } else {
        (magnitude >> segment) & 0x0F
    };

    (sign | (segment << 4) as u8 | mantissa as u8) ^ EVEN_BIT_MASK
}

/// Encode a whole buffer; output has one byte per input sample.
pub fn encode(samples: &[i16]) -> Vec<u8> {
    samples.iter().map(|&s| encode_sample(s)).collect()
}

/// Segment 0 covers magnitudes below 32; above that the segment grows with the
/// position of the highest set bit, topping out at 7.
fn segment_of(magnitude: u16) -> u16 {
    if magnitude < 0x20 {
        0
    } else {
        let bit_length = 16 - magnitude.leading_zeros() as u16;
        (bit_length - 5).min(7)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Reference A-law expansion, used to check the encoder's quantisation.
    fn decode_sample(code: u8) -> i16 {
        let code = code ^ EVEN_BIT_MASK;
        let segment = (code & 0x70) >> 4;
        let mut value = ((code & 0x0F) as i32) << 4;
        value = match segment {
            0 => value + 8,
            1 => value + 0x108,
            _ => (value + 0x108) << (segment - 1),
        };
        if code & SIGN_BIT != 0 {
            value as i16
        } else {
            -value as i16
        }
    }

    #[test]
    fn test_reference_codes() {
        assert_eq!(encode_sample(0), 0xD5);
        assert_eq!(encode_sample(-1), 0x55);
        assert_eq!(encode_sample(i16::MAX), 0xAA);
        assert_eq!(encode_sample(i16::MIN), 0x2A);
        assert_eq!(encode_sample(16), 0xD4);
        assert_eq!(encode_sample(1000), 0xFA);
    }

    #[test]
    fn test_extremes_differ_only_in_sign_bit() {
        let positive = encode_sample(i16::MAX);
        let negative = encode_sample(i16::MIN);
        assert_eq!(positive ^ negative, SIGN_BIT);
        assert_eq!(positive & SIGN_BIT, SIGN_BIT);
    }

    #[test]
    fn test_sign_symmetry_across_range() {
        for magnitude in (0i32..32768).step_by(97) {
            let positive = encode_sample(magnitude as i16);
            let negative = encode_sample((-magnitude - 1) as i16);
            assert_eq!(positive ^ negative, SIGN_BIT, "magnitude {}", magnitude);
        }
    }

    #[test]
    fn test_buffer_encoding_is_per_sample() {
        let samples: Vec<i16> = (-40..40).map(|i| (i * 811) as i16).collect();
        let whole = encode(&samples);
        let pieces: Vec<u8> = samples.iter().map(|&s| encode_sample(s)).collect();
        assert_eq!(whole.len(), samples.len());
        assert_eq!(whole, pieces);
        assert_eq!(encode(&samples), whole);
    }

    #[test]
    fn test_quantisation_error_is_bounded() {
        for sample in (i16::MIN..=i16::MAX).step_by(13) {
            let decoded = decode_sample(encode_sample(sample)) as i32;
            let error = (decoded - sample as i32).abs();
            // Step size doubles per segment, the top segment steps by 1024
            assert!(error <= 1024, "sample {} decoded as {}", sample, decoded);
        }
    }

    #[test]
    fn test_encoding_is_monotonic_in_magnitude() {
        let mut previous = decode_sample(encode_sample(0));
        for sample in (0..=i16::MAX).step_by(5) {
            let decoded = decode_sample(encode_sample(sample));
            assert!(decoded >= previous);
            previous = decoded;
        }
    }

    #[test]
    fn test_empty_buffer() {
        assert!(encode(&[]).is_empty());
    }
}
