//! TAS5805M DSP control plane
//!
//! The TAS5805M class-D amplifier exposes 30 second-order IIR filter
//! sections (15 per stereo channel) through a register-oriented I2C bus.
//! This crate translates user-level filter intents (frequency/gain/Q or raw
//! coefficients) into chip-correct Q9.23 fixed-point register writes,
//! performs those writes through the chip's bank/page addressing protocol
//! with retries, and persists named 30-filter calibration profiles that
//! survive power loss and auto-apply at boot.
//!
//! # Architecture
//!
//! - [`dsp`] — fixed-point codec, parameter validators, and the cookbook
//!   filter design library (pure math, no I/O).
//! - [`bus`] — the register map, the retrying transaction engine, and the
//!   [`bus::BiquadProgrammer`] that commits filters to the chip.
//! - [`profile`] — checksummed calibration profile records, the
//!   [`profile::ProfileManager`], and the chip shadow state.
//!
//! The bus and the key/value record store are host-supplied trait objects
//! ([`bus::I2cBus`], [`profile::ProfileStorage`]); nothing here spawns
//! threads or takes locks. Every public operation is blocking and runs to
//! completion, and the multi-step bank/page protocol must never interleave
//! between two logical operations, so callers are expected to funnel all
//! filter writes through a single owner of the bus handle.

pub mod bus;
pub mod dsp;
pub mod error;
pub mod profile;

pub use bus::{BiquadProgrammer, BusError, I2cBus};
pub use dsp::{BiquadCoefficients, Channel, Side};
pub use error::{Result, Tas5805mError};
pub use profile::{
    ActiveProfile, CalibrationProfile, ProfileManager, ProfileStorage, ShadowState,
};
