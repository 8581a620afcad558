//! Calibration profile persistence
//!
//! Checksummed profile records, the manager that maps them onto a
//! host-supplied key/value store, and the shadow state mirroring the
//! chip's current configuration.

mod manager;
mod store;

pub use manager::{
    add_filter_to_profile, ActiveProfile, ProfileManager, ProfileStorage, ShadowState,
    SlotStatus, StorageError, APPLY_SLOT_DELAY_MS, MAX_PROFILES,
};
pub use store::{
    CalibrationProfile, FORMAT_TAG, FORMAT_TAG_DELETED, MAX_PROFILE_NAME_LEN, RECORD_LEN,
};
