//! Filter math for the TAS5805M DSP
//!
//! Everything in this module is pure: coefficient types, the Q9.23
//! fixed-point codec, parameter validators, and the cookbook filter design
//! library. No bus or storage I/O happens below this point.

mod coeffs;
pub mod design;
pub mod fixed;
pub mod params;

pub use coeffs::{BiquadCoefficients, Channel, Side, BYPASS_EPSILON};

/// Biquad sections per physical channel.
pub const BIQUADS_PER_CHANNEL: usize = 15;
