//! Biquad coefficient and channel types.

use serde::{Deserialize, Serialize};

use crate::error::Tas5805mError;

/// Tolerance when comparing coefficients against the bypass set.
pub const BYPASS_EPSILON: f32 = 1e-4;

/// One normalized second-order IIR section.
///
/// Transfer function: H(z) = (b0 + b1*z^-1 + b2*z^-2) / (1 + a1*z^-1 + a2*z^-2)
/// with a0 already divided out. Note that the *wire* format inverts the
/// signs of a1 and a2 (see `dsp::fixed::coefficient_payload`); the fields
/// here always carry the textbook convention.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BiquadCoefficients {
    pub b0: f32,
    pub b1: f32,
    pub b2: f32,
    pub a1: f32,
    pub a2: f32,
}

impl Default for BiquadCoefficients {
    fn default() -> Self {
        Self::BYPASS
    }
}

impl BiquadCoefficients {
    /// The passthrough section: unity numerator, zero feedback.
    pub const BYPASS: Self = Self {
        b0: 1.0,
        b1: 0.0,
        b2: 0.0,
        a1: 0.0,
        a2: 0.0,
    };

    pub fn new(b0: f32, b1: f32, b2: f32, a1: f32, a2: f32) -> Self {
        Self { b0, b1, b2, a1, a2 }
    }

    /// Check whether this section is (within epsilon) a passthrough.
    pub fn is_bypass(&self) -> bool {
        (self.b0 - 1.0).abs() < BYPASS_EPSILON
            && self.b1.abs() < BYPASS_EPSILON
            && self.b2.abs() < BYPASS_EPSILON
            && self.a1.abs() < BYPASS_EPSILON
            && self.a2.abs() < BYPASS_EPSILON
    }

    /// Check that every coefficient is a finite number.
    pub fn is_finite(&self) -> bool {
        self.b0.is_finite()
            && self.b1.is_finite()
            && self.b2.is_finite()
            && self.a1.is_finite()
            && self.a2.is_finite()
    }
}

/// One physical chip channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

/// Target channel for a filter write.
///
/// `Both` is a write fan-out convenience, not a third physical channel:
/// the same coefficients land in the left and right slot for the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Left,
    Right,
    Both,
}

impl Channel {
    /// Physical channels this target fans out to, left first.
    pub fn sides(self) -> &'static [Side] {
        match self {
            Channel::Left => &[Side::Left],
            Channel::Right => &[Side::Right],
            Channel::Both => &[Side::Left, Side::Right],
        }
    }
}

impl TryFrom<u8> for Channel {
    type Error = Tas5805mError;

    /// Wire encoding used by the host configuration layer: 0=left,
    /// 1=right, 2=both.
    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Channel::Left),
            1 => Ok(Channel::Right),
            2 => Ok(Channel::Both),
            _ => Err(Tas5805mError::InvalidParameter {
                param: "channel",
                value: value.to_string(),
                expected: "0 (left), 1 (right) or 2 (both)",
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_bypass() {
        assert!(BiquadCoefficients::default().is_bypass());
        assert_eq!(BiquadCoefficients::default(), BiquadCoefficients::BYPASS);
    }

    #[test]
    fn test_non_bypass_detected() {
        let coeffs = BiquadCoefficients::new(1.5, -2.0, 0.5, -1.9, 0.95);
        assert!(!coeffs.is_bypass());
    }

    #[test]
    fn test_near_bypass_within_epsilon() {
        let coeffs = BiquadCoefficients::new(1.00005, 0.00005, -0.00005, 0.00005, 0.0);
        assert!(coeffs.is_bypass());
    }

    #[test]
    fn test_finite_check() {
        assert!(BiquadCoefficients::BYPASS.is_finite());
        let coeffs = BiquadCoefficients::new(1.0, f32::NAN, 0.0, 0.0, 0.0);
        assert!(!coeffs.is_finite());
        let coeffs = BiquadCoefficients::new(1.0, 0.0, f32::INFINITY, 0.0, 0.0);
        assert!(!coeffs.is_finite());
    }

    #[test]
    fn test_channel_fan_out() {
        assert_eq!(Channel::Left.sides(), &[Side::Left]);
        assert_eq!(Channel::Right.sides(), &[Side::Right]);
        assert_eq!(Channel::Both.sides(), &[Side::Left, Side::Right]);
    }

    #[test]
    fn test_channel_wire_encoding() {
        assert_eq!(Channel::try_from(0).unwrap(), Channel::Left);
        assert_eq!(Channel::try_from(1).unwrap(), Channel::Right);
        assert_eq!(Channel::try_from(2).unwrap(), Channel::Both);
        assert!(Channel::try_from(3).is_err());
    }
}
