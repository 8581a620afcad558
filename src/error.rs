//! Error handling for the TAS5805M control plane.
//!
//! Transient bus failures are retried internally and never surface here;
//! everything below is a terminal outcome for the operation that raised it.

use thiserror::Error;

/// Result type alias for control-plane operations
pub type Result<T> = std::result::Result<T, Tas5805mError>;

/// Main error type for control-plane operations
#[derive(Error, Debug)]
pub enum Tas5805mError {
    /// A parameter failed validation before any bus or storage I/O.
    #[error("Invalid {param}: {value} (expected {expected})")]
    InvalidParameter {
        param: &'static str,
        value: String,
        expected: &'static str,
    },

    /// A register write exhausted its retry budget.
    #[error("I2C write failed after {attempts} attempts: reg=0x{reg:02X}")]
    BusWriteFailed { reg: u8, attempts: u32 },

    /// The named profile (or slot) holds no record that validates.
    ///
    /// Absent, deleted, and corrupted records are deliberately
    /// indistinguishable here; see `profile::SlotStatus` for diagnostics.
    #[error("Profile '{profile}' not found")]
    ProfileNotFound { profile: String },

    /// Every profile slot already holds a valid profile with another name.
    #[error("No free profile slot (capacity {capacity})")]
    CapacityExhausted { capacity: usize },

    /// The underlying record store rejected a save.
    #[error("Profile storage error: {reason}")]
    Storage { reason: String },
}

impl Tas5805mError {
    /// Get the error code for this error type
    pub fn error_code(&self) -> &'static str {
        match self {
            Tas5805mError::InvalidParameter { .. } => "INVALID_PARAMETER",
            Tas5805mError::BusWriteFailed { .. } => "BUS_WRITE_FAILED",
            Tas5805mError::ProfileNotFound { .. } => "PROFILE_NOT_FOUND",
            Tas5805mError::CapacityExhausted { .. } => "CAPACITY_EXHAUSTED",
            Tas5805mError::Storage { .. } => "STORAGE_ERROR",
        }
    }

    /// Check if this error is recoverable by adjusting the request
    pub fn is_recoverable(&self) -> bool {
        match self {
            Tas5805mError::InvalidParameter { .. } => true,
            Tas5805mError::ProfileNotFound { .. } => true,
            Tas5805mError::CapacityExhausted { .. } => true,
            Tas5805mError::BusWriteFailed { .. } => false,
            Tas5805mError::Storage { .. } => false,
        }
    }
}
