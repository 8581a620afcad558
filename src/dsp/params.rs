//! Parameter validators for the filter-write surface.
//!
//! All validators are side-effect free and perform no bus I/O, so a
//! rejected request costs nothing beyond the returned error.

use crate::error::{Result, Tas5805mError};

use super::coeffs::BiquadCoefficients;
use super::BIQUADS_PER_CHANNEL;

pub const MIN_FREQUENCY_HZ: f32 = 10.0;
pub const MAX_FREQUENCY_HZ: f32 = 24_000.0;
pub const MIN_GAIN_DB: f32 = -20.0;
pub const MAX_GAIN_DB: f32 = 20.0;
pub const MIN_Q: f32 = 0.1;
pub const MAX_Q: f32 = 20.0;
pub const MIN_SLOPE: f32 = 0.1;
pub const MAX_SLOPE: f32 = 5.0;

fn reject(param: &'static str, value: impl ToString, expected: &'static str) -> Tas5805mError {
    Tas5805mError::InvalidParameter {
        param,
        value: value.to_string(),
        expected,
    }
}

/// Validate a raw channel selector (0=left, 1=right, 2=both).
pub fn validate_channel(channel: u8) -> Result<()> {
    if channel > 2 {
        return Err(reject("channel", channel, "0-2"));
    }
    Ok(())
}

/// Validate a biquad slot index.
pub fn validate_index(index: usize) -> Result<()> {
    if index >= BIQUADS_PER_CHANNEL {
        return Err(reject("biquad index", index, "0-14"));
    }
    Ok(())
}

/// Validate a center/corner frequency in Hz.
pub fn validate_frequency(frequency: f32) -> Result<()> {
    if !frequency.is_finite() || !(MIN_FREQUENCY_HZ..=MAX_FREQUENCY_HZ).contains(&frequency) {
        return Err(reject("frequency", frequency, "10-24000 Hz"));
    }
    Ok(())
}

/// Validate a gain in dB.
pub fn validate_gain(gain_db: f32) -> Result<()> {
    if !gain_db.is_finite() || !(MIN_GAIN_DB..=MAX_GAIN_DB).contains(&gain_db) {
        return Err(reject("gain", gain_db, "-20 to +20 dB"));
    }
    Ok(())
}

/// Validate a Q factor.
pub fn validate_q(q: f32) -> Result<()> {
    if !q.is_finite() || !(MIN_Q..=MAX_Q).contains(&q) {
        return Err(reject("Q", q, "0.1-20"));
    }
    Ok(())
}

/// Validate a shelf slope.
pub fn validate_slope(slope: f32) -> Result<()> {
    if !slope.is_finite() || !(MIN_SLOPE..=MAX_SLOPE).contains(&slope) {
        return Err(reject("slope", slope, "0.1-5.0"));
    }
    Ok(())
}

/// Validate that all five raw coefficients are finite.
pub fn validate_coefficients(coeffs: &BiquadCoefficients) -> Result<()> {
    if !coeffs.is_finite() {
        return Err(reject(
            "coefficients",
            format!("{:?}", coeffs),
            "five finite values",
        ));
    }
    Ok(())
}
