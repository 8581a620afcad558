//! Profile manager and chip shadow state
//!
//! Persists calibration profiles into a host-supplied key/value record
//! store, tracks which profile is active across reboots, and replays the
//! active profile onto the chip at boot. Keys are FNV-1a hashes of stable
//! string names, so the store never needs to understand profile semantics.

use chrono::Utc;
use log::{error, info, warn};
use thiserror::Error;

use crate::bus::{BiquadProgrammer, I2cBus};
use crate::dsp::{BiquadCoefficients, Channel, Side, BIQUADS_PER_CHANNEL};
use crate::error::{Result, Tas5805mError};

use super::store::{CalibrationProfile, MAX_PROFILE_NAME_LEN, RECORD_LEN};

/// Number of persisted profile slots.
pub const MAX_PROFILES: usize = 5;

/// Sentinel persisted in the active-profile record when no profile is
/// active. A slot byte survives reboots; an absent record reads the same
/// as this sentinel.
const ACTIVE_NONE: u8 = 0xFF;

/// Pause between filter slots while replaying a profile onto the chip.
pub const APPLY_SLOT_DELAY_MS: u32 = 2;

/// Failure reported by the host's record store.
#[derive(Debug, Error)]
#[error("storage error: {0}")]
pub struct StorageError(pub String);

/// Host-supplied persistent key/value record store.
///
/// `load` returning `None` means the key has never been written; the
/// manager treats unreadable and absent records identically.
pub trait ProfileStorage {
    fn load(&mut self, key: u32) -> Option<Vec<u8>>;
    fn save(&mut self, key: u32, record: &[u8]) -> std::result::Result<(), StorageError>;
}

/// FNV-1a over the key name. Stable across builds, unlike a hasher seeded
/// at runtime.
fn fnv1a_hash(name: &str) -> u32 {
    let mut hash = 2_166_136_261u32;
    for &byte in name.as_bytes() {
        hash ^= u32::from(byte);
        hash = hash.wrapping_mul(16_777_619);
    }
    hash
}

fn profile_key(slot: usize) -> u32 {
    fnv1a_hash(&format!("profile_{}", slot))
}

fn active_key() -> u32 {
    fnv1a_hash("active_profile")
}

/// Diagnostic view of one persisted slot.
#[derive(Debug, Clone, PartialEq)]
pub enum SlotStatus {
    /// Never written.
    Empty,
    Valid {
        name: String,
        num_filters: u8,
        timestamp: u32,
    },
    /// Intentionally deleted (tombstone with intact checksum).
    Deleted,
    /// Present but fails the integrity check.
    Corrupted,
}

/// What the persisted active-profile pointer resolves to.
#[derive(Debug, Clone, PartialEq)]
pub enum ActiveProfile {
    NotSet,
    Named(String),
    /// The pointer names a slot whose record is missing or invalid.
    Unreadable,
}

/// In-memory mirror of the filter configuration currently on the chip.
///
/// Updated only after a slot write succeeds on the wire, so it never
/// claims a configuration the chip does not hold. Snapshots of it seed
/// new profiles.
#[derive(Debug, Clone, Default)]
pub struct ShadowState {
    profile: CalibrationProfile,
}

impl ShadowState {
    /// All 30 filters bypass, matching the chip's power-on state.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record(&mut self, side: Side, index: usize, coeffs: BiquadCoefficients) {
        self.profile.set_filter(side, index, coeffs);
    }

    /// The last coefficients successfully committed to a slot.
    pub fn filter(&self, side: Side, index: usize) -> BiquadCoefficients {
        self.profile.filter(side, index)
    }

    /// A profile seeded from the current chip configuration. Name,
    /// timestamp and checksum are left for the saver to stamp.
    pub fn snapshot(&self) -> CalibrationProfile {
        let mut profile = self.profile.clone();
        profile.count_active_filters();
        profile
    }
}

/// Manages the persisted profile slots and the active-profile pointer.
pub struct ProfileManager<S: ProfileStorage> {
    storage: S,
    active_slot: Option<usize>,
}

impl<S: ProfileStorage> ProfileManager<S> {
    /// Open the store and restore the persisted active-profile pointer.
    pub fn new(storage: S) -> Self {
        let mut manager = Self {
            storage,
            active_slot: None,
        };

        if let Some(record) = manager.storage.load(active_key()) {
            match record.first() {
                Some(&byte) if (byte as usize) < MAX_PROFILES => {
                    manager.active_slot = Some(byte as usize);
                }
                Some(&ACTIVE_NONE) | None => {}
                Some(&byte) => {
                    warn!("ignoring out-of-range active profile slot {}", byte);
                }
            }
        }

        manager
    }

    /// Save a profile (typically a [`ShadowState::snapshot`]) under `name`.
    ///
    /// Overwrites the slot already holding `name` if one exists, else
    /// takes the first free slot (empty, deleted or corrupted). Fails
    /// when all slots hold other valid profiles. Name, timestamp, filter
    /// count and checksum are stamped here; the caller's copy is not
    /// modified.
    pub fn save_profile(&mut self, name: &str, profile: &CalibrationProfile) -> Result<()> {
        if name.is_empty() || name.len() > MAX_PROFILE_NAME_LEN {
            return Err(Tas5805mError::InvalidParameter {
                param: "name",
                value: format!("{} bytes", name.len()),
                expected: "1-31 bytes",
            });
        }

        let slot = match self.find_slot_by_name(name) {
            Some(slot) => slot,
            None => self.find_free_slot().ok_or(Tas5805mError::CapacityExhausted {
                capacity: MAX_PROFILES,
            })?,
        };

        let mut profile = profile.clone();
        profile.name = name.to_string();
        profile.timestamp = Utc::now().timestamp() as u32;
        profile.count_active_filters();
        profile.update_checksum();

        self.storage
            .save(profile_key(slot), &profile.to_bytes())
            .map_err(|err| Tas5805mError::Storage {
                reason: err.to_string(),
            })?;

        info!(
            "saved profile '{}' to slot {} ({} active filters)",
            name, slot, profile.num_filters_used
        );
        Ok(())
    }

    /// Load a profile by name. Deleted and corrupted records read the
    /// same as absent ones.
    pub fn load_profile(&mut self, name: &str) -> Result<CalibrationProfile> {
        self.find_slot_by_name(name)
            .and_then(|slot| self.read_slot(slot))
            .ok_or_else(|| Tas5805mError::ProfileNotFound {
                profile: name.to_string(),
            })
    }

    /// Load a profile by slot index.
    pub fn load_profile_by_index(&mut self, slot: usize) -> Result<CalibrationProfile> {
        if slot >= MAX_PROFILES {
            return Err(Tas5805mError::InvalidParameter {
                param: "slot",
                value: slot.to_string(),
                expected: "0-4",
            });
        }
        self.read_slot(slot)
            .ok_or_else(|| Tas5805mError::ProfileNotFound {
                profile: format!("slot {}", slot),
            })
    }

    /// Classify one slot without loading the full profile into the caller.
    pub fn slot_status(&mut self, slot: usize) -> SlotStatus {
        let record = match self.storage.load(profile_key(slot)) {
            Some(record) => record,
            None => return SlotStatus::Empty,
        };

        match CalibrationProfile::from_bytes(&record) {
            Some(profile) if profile.is_valid() => SlotStatus::Valid {
                name: profile.name,
                num_filters: profile.num_filters_used,
                timestamp: profile.timestamp,
            },
            Some(profile) if profile.is_deleted() && profile.checksum_matches() => {
                SlotStatus::Deleted
            }
            _ => SlotStatus::Corrupted,
        }
    }

    /// Names of all valid profiles, by slot order.
    pub fn list_profiles(&mut self) -> Vec<String> {
        (0..MAX_PROFILES)
            .filter_map(|slot| match self.slot_status(slot) {
                SlotStatus::Valid { name, .. } => Some(name),
                _ => None,
            })
            .collect()
    }

    /// Delete a profile by overwriting its slot with a tombstone.
    ///
    /// If the deleted profile was active, the persisted active pointer is
    /// cleared too so the next boot does not chase a tombstone.
    pub fn delete_profile(&mut self, name: &str) -> Result<()> {
        let slot = self
            .find_slot_by_name(name)
            .ok_or_else(|| Tas5805mError::ProfileNotFound {
                profile: name.to_string(),
            })?;

        self.storage
            .save(profile_key(slot), &CalibrationProfile::tombstone().to_bytes())
            .map_err(|err| Tas5805mError::Storage {
                reason: err.to_string(),
            })?;
        info!("deleted profile '{}' (slot {})", name, slot);

        if self.active_slot == Some(slot) {
            self.set_active_slot(None)?;
        }
        Ok(())
    }

    /// Mark the named profile as the one to auto-apply at boot.
    pub fn set_active_profile(&mut self, name: &str) -> Result<()> {
        let slot = self
            .find_slot_by_name(name)
            .ok_or_else(|| Tas5805mError::ProfileNotFound {
                profile: name.to_string(),
            })?;
        self.set_active_slot(Some(slot))
    }

    /// Set or clear the active-profile pointer by slot index.
    pub fn set_active_profile_slot(&mut self, slot: Option<usize>) -> Result<()> {
        if let Some(slot) = slot {
            if slot >= MAX_PROFILES {
                return Err(Tas5805mError::InvalidParameter {
                    param: "slot",
                    value: slot.to_string(),
                    expected: "0-4",
                });
            }
        }
        self.set_active_slot(slot)
    }

    /// Resolve the persisted active-profile pointer.
    pub fn active_profile_name(&mut self) -> ActiveProfile {
        let slot = match self.active_slot {
            Some(slot) => slot,
            None => return ActiveProfile::NotSet,
        };
        match self.read_slot(slot) {
            Some(profile) => ActiveProfile::Named(profile.name),
            None => ActiveProfile::Unreadable,
        }
    }

    /// Replay the active profile onto the chip. A missing pointer is not
    /// an error (fresh device); an unreadable record is.
    ///
    /// Filters are applied index by index, left then right, pausing
    /// between slots. A slot failure does not stop the replay; the first
    /// error is reported after every slot has been attempted, and the
    /// shadow reflects exactly the slots that landed.
    pub fn load_and_apply_active_profile<B: I2cBus>(
        &mut self,
        bus: &mut B,
        address: u8,
        shadow: &mut ShadowState,
    ) -> Result<()> {
        let slot = match self.active_slot {
            Some(slot) => slot,
            None => {
                info!("no active profile set, leaving chip at bypass");
                return Ok(());
            }
        };

        let profile = self
            .read_slot(slot)
            .ok_or_else(|| Tas5805mError::ProfileNotFound {
                profile: format!("slot {}", slot),
            })?;
        info!("applying active profile '{}' from slot {}", profile.name, slot);

        let mut programmer = BiquadProgrammer::new(bus, address);
        let mut first_failure = None;
        for index in 0..BIQUADS_PER_CHANNEL {
            for side in [Side::Left, Side::Right] {
                let channel = match side {
                    Side::Left => Channel::Left,
                    Side::Right => Channel::Right,
                };
                if let Err(err) =
                    programmer.write_biquad(channel, index, profile.filter(side, index), shadow)
                {
                    error!("failed to apply {:?} filter {}: {}", side, index, err);
                    first_failure.get_or_insert(err);
                }
            }
            programmer.delay_ms(APPLY_SLOT_DELAY_MS);
        }

        match first_failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Give the storage handle back, e.g. to hand it to a successor
    /// manager instance.
    pub fn into_storage(self) -> S {
        self.storage
    }

    fn set_active_slot(&mut self, slot: Option<usize>) -> Result<()> {
        let byte = slot.map_or(ACTIVE_NONE, |s| s as u8);
        // Persist first; the in-memory pointer only moves once the store
        // has accepted the record.
        self.storage
            .save(active_key(), &[byte])
            .map_err(|err| Tas5805mError::Storage {
                reason: err.to_string(),
            })?;
        self.active_slot = slot;
        Ok(())
    }

    fn read_slot(&mut self, slot: usize) -> Option<CalibrationProfile> {
        let record = self.storage.load(profile_key(slot))?;
        if record.len() != RECORD_LEN {
            warn!("slot {} record has wrong size {}", slot, record.len());
            return None;
        }
        CalibrationProfile::from_bytes(&record).filter(|profile| profile.is_valid())
    }

    fn find_slot_by_name(&mut self, name: &str) -> Option<usize> {
        (0..MAX_PROFILES).find(|&slot| {
            self.read_slot(slot)
                .map_or(false, |profile| profile.name == name)
        })
    }

    fn find_free_slot(&mut self) -> Option<usize> {
        (0..MAX_PROFILES).find(|&slot| self.read_slot(slot).is_none())
    }
}

/// Stamp one designed filter into an in-memory profile without touching
/// the chip. Used to assemble profiles offline before committing them.
pub fn add_filter_to_profile(
    profile: &mut CalibrationProfile,
    channel: Channel,
    index: usize,
    coeffs: BiquadCoefficients,
) -> Result<()> {
    crate::dsp::params::validate_index(index)?;
    crate::dsp::params::validate_coefficients(&coeffs)?;
    for &side in channel.sides() {
        profile.set_filter(side, index, coeffs);
    }
    profile.count_active_filters();
    profile.update_checksum();
    Ok(())
}
