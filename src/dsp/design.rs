//! Filter design library
//!
//! Closed-form biquad coefficient calculators using the Audio EQ Cookbook
//! formulas. Reference: https://www.w3.org/2011/audio/audio-eq-cookbook.html
//!
//! Each function returns normalized coefficients (a0 divided out). The math
//! runs in f64 and the results are finite across the whole validated
//! parameter space (frequency 10-24000 Hz, gain ±20 dB, Q 0.1-20, slope
//! 0.1-5); validation itself is the caller's job, see `dsp::params`.

use std::f64::consts::PI;

use super::coeffs::BiquadCoefficients;

/// Sample rate assumed by the chip's DSP pipeline unless overridden.
pub const DEFAULT_SAMPLE_RATE: f32 = 48_000.0;

struct Omega {
    sin: f64,
    cos: f64,
}

fn omega(frequency: f32, sample_rate: f32) -> Omega {
    let w0 = 2.0 * PI * f64::from(frequency) / f64::from(sample_rate);
    Omega {
        sin: w0.sin(),
        cos: w0.cos(),
    }
}

/// Amplitude for gain-based filters: A = 10^(gain/40).
fn amplitude(gain_db: f32) -> f64 {
    10.0f64.powf(f64::from(gain_db) / 40.0)
}

/// Shelf alpha parameterized by slope instead of Q.
fn shelf_alpha(sin_w0: f64, a: f64, slope: f32) -> f64 {
    sin_w0 / 2.0 * ((a + 1.0 / a) * (1.0 / f64::from(slope) - 1.0) + 2.0).sqrt()
}

fn normalized(b0: f64, b1: f64, b2: f64, a0: f64, a1: f64, a2: f64) -> BiquadCoefficients {
    BiquadCoefficients::new(
        (b0 / a0) as f32,
        (b1 / a0) as f32,
        (b2 / a0) as f32,
        (a1 / a0) as f32,
        (a2 / a0) as f32,
    )
}

/// Parametric (peaking) EQ.
pub fn peaking(frequency: f32, gain_db: f32, q: f32, sample_rate: f32) -> BiquadCoefficients {
    let a = amplitude(gain_db);
    let w = omega(frequency, sample_rate);
    let alpha = w.sin / (2.0 * f64::from(q));

    normalized(
        1.0 + alpha * a,
        -2.0 * w.cos,
        1.0 - alpha * a,
        1.0 + alpha / a,
        -2.0 * w.cos,
        1.0 - alpha / a,
    )
}

/// Low shelf (boost/cut below the corner frequency).
pub fn low_shelf(frequency: f32, gain_db: f32, slope: f32, sample_rate: f32) -> BiquadCoefficients {
    let a = amplitude(gain_db);
    let w = omega(frequency, sample_rate);
    let alpha = shelf_alpha(w.sin, a, slope);
    let two_sqrt_a_alpha = 2.0 * a.sqrt() * alpha;

    normalized(
        a * ((a + 1.0) - (a - 1.0) * w.cos + two_sqrt_a_alpha),
        2.0 * a * ((a - 1.0) - (a + 1.0) * w.cos),
        a * ((a + 1.0) - (a - 1.0) * w.cos - two_sqrt_a_alpha),
        (a + 1.0) + (a - 1.0) * w.cos + two_sqrt_a_alpha,
        -2.0 * ((a - 1.0) + (a + 1.0) * w.cos),
        (a + 1.0) + (a - 1.0) * w.cos - two_sqrt_a_alpha,
    )
}

/// High shelf (boost/cut above the corner frequency).
pub fn high_shelf(frequency: f32, gain_db: f32, slope: f32, sample_rate: f32) -> BiquadCoefficients {
    let a = amplitude(gain_db);
    let w = omega(frequency, sample_rate);
    let alpha = shelf_alpha(w.sin, a, slope);
    let two_sqrt_a_alpha = 2.0 * a.sqrt() * alpha;

    normalized(
        a * ((a + 1.0) + (a - 1.0) * w.cos + two_sqrt_a_alpha),
        -2.0 * a * ((a - 1.0) + (a + 1.0) * w.cos),
        a * ((a + 1.0) + (a - 1.0) * w.cos - two_sqrt_a_alpha),
        (a + 1.0) - (a - 1.0) * w.cos + two_sqrt_a_alpha,
        2.0 * ((a - 1.0) - (a + 1.0) * w.cos),
        (a + 1.0) - (a - 1.0) * w.cos - two_sqrt_a_alpha,
    )
}

/// High-pass (removes below the corner frequency).
pub fn high_pass(frequency: f32, q: f32, sample_rate: f32) -> BiquadCoefficients {
    let w = omega(frequency, sample_rate);
    let alpha = w.sin / (2.0 * f64::from(q));

    normalized(
        (1.0 + w.cos) / 2.0,
        -(1.0 + w.cos),
        (1.0 + w.cos) / 2.0,
        1.0 + alpha,
        -2.0 * w.cos,
        1.0 - alpha,
    )
}

/// Low-pass (removes above the corner frequency).
pub fn low_pass(frequency: f32, q: f32, sample_rate: f32) -> BiquadCoefficients {
    let w = omega(frequency, sample_rate);
    let alpha = w.sin / (2.0 * f64::from(q));

    normalized(
        (1.0 - w.cos) / 2.0,
        1.0 - w.cos,
        (1.0 - w.cos) / 2.0,
        1.0 + alpha,
        -2.0 * w.cos,
        1.0 - alpha,
    )
}

/// Notch (narrow rejection at the center frequency).
pub fn notch(frequency: f32, q: f32, sample_rate: f32) -> BiquadCoefficients {
    let w = omega(frequency, sample_rate);
    let alpha = w.sin / (2.0 * f64::from(q));

    normalized(
        1.0,
        -2.0 * w.cos,
        1.0,
        1.0 + alpha,
        -2.0 * w.cos,
        1.0 - alpha,
    )
}
