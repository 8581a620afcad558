//! Q9.23 fixed-point codec and wire payload packing.
//!
//! The TAS5805M stores each coefficient as a signed 32-bit word with 9
//! integer and 23 fractional bits, big-endian on the wire. A filter slot is
//! a 20-byte window holding the five words `[b0][b1][b2][-a1][-a2]`.

use log::error;

use super::coeffs::BiquadCoefficients;

/// 1.0 in Q9.23 (0x0080_0000).
pub const Q9_23_ONE: i32 = 1 << 23;

/// Largest representable coefficient value.
pub const Q9_23_MAX: f64 = 255.999999;
/// Smallest representable coefficient value.
pub const Q9_23_MIN: f64 = -256.0;

/// Bytes per filter slot: five 4-byte words.
pub const COEFF_PAYLOAD_LEN: usize = 20;

/// Convert a float coefficient to a Q9.23 word.
///
/// Non-finite input never propagates to the chip: NaN and ±Inf encode as
/// `0`, the bypass numerator. Finite input saturates to
/// [`Q9_23_MIN`, `Q9_23_MAX`] before scaling, truncating toward zero.
pub fn q9_23_from_f32(value: f32) -> i32 {
    if !value.is_finite() {
        error!("Invalid coefficient: {} (NaN or Inf), using bypass", value);
        return 0;
    }

    let clamped = f64::from(value).clamp(Q9_23_MIN, Q9_23_MAX);
    (clamped * f64::from(Q9_23_ONE)) as i32
}

/// Reverse the Q9.23 scale (used by readback paths and tests).
pub fn q9_23_to_f32(word: i32) -> f32 {
    (f64::from(word) / f64::from(Q9_23_ONE)) as f32
}

/// Build the 20-byte wire payload for one filter slot.
///
/// The chip's filter transfer convention expects the feedback terms with
/// inverted signs, so a1 and a2 are negated here and nowhere else.
pub fn coefficient_payload(coeffs: &BiquadCoefficients) -> [u8; COEFF_PAYLOAD_LEN] {
    let words = [coeffs.b0, coeffs.b1, coeffs.b2, -coeffs.a1, -coeffs.a2];

    let mut payload = [0u8; COEFF_PAYLOAD_LEN];
    for (chunk, value) in payload.chunks_exact_mut(4).zip(words) {
        chunk.copy_from_slice(&q9_23_from_f32(value).to_be_bytes());
    }
    payload
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn test_unity() {
        assert_eq!(q9_23_from_f32(1.0), 0x0080_0000);
    }

    #[test]
    fn test_zero() {
        assert_eq!(q9_23_from_f32(0.0), 0);
    }

    #[test]
    fn test_negative_one() {
        assert_eq!(q9_23_from_f32(-1.0), -0x0080_0000);
    }

    #[test]
    fn test_half() {
        assert_eq!(q9_23_from_f32(0.5), 0x0040_0000);
    }

    #[test]
    fn test_saturation_high() {
        let at_rail = q9_23_from_f32(255.999_999);
        assert_eq!(q9_23_from_f32(300.0), at_rail);
        assert_eq!(q9_23_from_f32(f32::MAX), at_rail);
    }

    #[test]
    fn test_saturation_low() {
        let at_rail = q9_23_from_f32(-256.0);
        assert_eq!(at_rail, i32::MIN); // -256 * 2^23
        assert_eq!(q9_23_from_f32(-300.0), at_rail);
        assert_eq!(q9_23_from_f32(f32::MIN), at_rail);
    }

    #[test_case(f32::NAN; "nan")]
    #[test_case(f32::INFINITY; "positive infinity")]
    #[test_case(f32::NEG_INFINITY; "negative infinity")]
    fn test_non_finite_encodes_bypass(value: f32) {
        assert_eq!(q9_23_from_f32(value), 0);
    }

    #[test]
    fn test_round_trip_within_lsb() {
        // One Q9.23 LSB is 2^-23.
        let lsb = 1.0 / f64::from(Q9_23_ONE);
        for value in [1.5f32, -2.0, 0.5, -1.9, 0.95, 0.000_1, -255.5, 200.25] {
            let decoded = q9_23_to_f32(q9_23_from_f32(value));
            assert!(
                (f64::from(decoded) - f64::from(value)).abs() <= lsb,
                "round trip of {} drifted to {}",
                value,
                decoded
            );
        }
    }

    #[test]
    fn test_payload_layout_bypass() {
        let payload = coefficient_payload(&BiquadCoefficients::BYPASS);
        assert_eq!(&payload[0..4], &[0x00, 0x80, 0x00, 0x00]);
        assert_eq!(&payload[4..], &[0u8; 16]);
    }

    #[test]
    fn test_payload_inverts_feedback_signs() {
        let coeffs = BiquadCoefficients::new(0.0, 0.0, 0.0, -1.0, 0.5);
        let payload = coefficient_payload(&coeffs);

        // -a1 = 1.0, -a2 = -0.5
        let a1_word = i32::from_be_bytes(payload[12..16].try_into().unwrap());
        let a2_word = i32::from_be_bytes(payload[16..20].try_into().unwrap());
        assert_eq!(a1_word, 0x0080_0000);
        assert_eq!(a2_word, -0x0040_0000);
    }

    #[test]
    fn test_payload_is_big_endian() {
        let coeffs = BiquadCoefficients::new(q9_23_to_f32(0x0123_4567), 0.0, 0.0, 0.0, 0.0);
        let payload = coefficient_payload(&coeffs);
        assert_eq!(&payload[0..4], &[0x01, 0x23, 0x45, 0x67]);
    }
}
