//! Calibration profile record
//!
//! A profile bundles all 30 filters plus metadata into one fixed-size,
//! checksummed record. The persisted format is a canonical byte stream
//! serialized field by field (never a raw memory image), so the CRC is
//! stable across compilers and field reordering; the serde derives exist
//! only for the host's JSON surface and play no part in persistence.

use serde::{Deserialize, Serialize};

use crate::dsp::{BiquadCoefficients, Side, BIQUADS_PER_CHANNEL};

/// Maximum profile name length in bytes (the record reserves 32, with at
/// least one NUL of padding).
pub const MAX_PROFILE_NAME_LEN: usize = 31;
const NAME_FIELD_LEN: usize = 32;

/// Format tag of a live record ("TAS5").
pub const FORMAT_TAG: u32 = 0x5441_5335;
/// Format tag of an intentionally deleted record ("DELD").
///
/// Deletion is an overwrite because the record store has no delete
/// primitive. The tombstone carries a correct checksum over its own
/// contents, which is how diagnostics tell "deleted" from "corrupted".
pub const FORMAT_TAG_DELETED: u32 = 0x4445_4C44;

/// Serialized record size: tag + name + timestamp + 30 coefficient sets +
/// filter count + CRC32.
pub const RECORD_LEN: usize = 4 + NAME_FIELD_LEN + 4 + BIQUADS_PER_CHANNEL * 2 * 20 + 1 + 4;

/// A named, persisted bundle of 30 filter configurations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationProfile {
    format_tag: u32,
    /// Profile name; truncated to [`MAX_PROFILE_NAME_LEN`] bytes on save.
    pub name: String,
    /// Creation time, UTC seconds.
    pub timestamp: u32,
    pub left: [BiquadCoefficients; BIQUADS_PER_CHANNEL],
    pub right: [BiquadCoefficients; BIQUADS_PER_CHANNEL],
    /// Count of indices where either channel differs from bypass; derived
    /// by [`CalibrationProfile::count_active_filters`].
    pub num_filters_used: u8,
    checksum: u32,
}

impl Default for CalibrationProfile {
    /// All 30 filters bypass, empty name, checksum not yet computed.
    fn default() -> Self {
        Self {
            format_tag: FORMAT_TAG,
            name: String::new(),
            timestamp: 0,
            left: [BiquadCoefficients::BYPASS; BIQUADS_PER_CHANNEL],
            right: [BiquadCoefficients::BYPASS; BIQUADS_PER_CHANNEL],
            num_filters_used: 0,
            checksum: 0,
        }
    }
}

impl CalibrationProfile {
    /// Build the tombstone written over a deleted slot.
    pub fn tombstone() -> Self {
        let mut profile = Self {
            format_tag: FORMAT_TAG_DELETED,
            ..Self::default()
        };
        profile.update_checksum();
        profile
    }

    pub fn is_deleted(&self) -> bool {
        self.format_tag == FORMAT_TAG_DELETED
    }

    /// Access one filter slot.
    pub fn filter(&self, side: Side, index: usize) -> BiquadCoefficients {
        match side {
            Side::Left => self.left[index],
            Side::Right => self.right[index],
        }
    }

    /// Replace one filter slot.
    pub fn set_filter(&mut self, side: Side, index: usize, coeffs: BiquadCoefficients) {
        match side {
            Side::Left => self.left[index] = coeffs,
            Side::Right => self.right[index] = coeffs,
        }
    }

    /// Recompute the stored CRC32 from the current contents.
    pub fn update_checksum(&mut self) {
        self.checksum = crc32(&self.canonical_bytes());
    }

    /// Whether the stored checksum matches the current contents
    /// (regardless of format tag; tombstones can pass this too).
    pub fn checksum_matches(&self) -> bool {
        self.checksum == crc32(&self.canonical_bytes())
    }

    /// A record is valid iff it carries the live format tag *and* its
    /// checksum matches. Any single-field mutation after
    /// `update_checksum()` makes this false.
    pub fn is_valid(&self) -> bool {
        self.format_tag == FORMAT_TAG && self.checksum_matches()
    }

    /// Derive `num_filters_used`: an index counts as active when either
    /// channel's filter differs from bypass.
    pub fn count_active_filters(&mut self) {
        self.num_filters_used = (0..BIQUADS_PER_CHANNEL)
            .filter(|&i| !self.left[i].is_bypass() || !self.right[i].is_bypass())
            .count() as u8;
    }

    /// Serialize to the persisted wire format.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = self.canonical_bytes();
        bytes.extend_from_slice(&self.checksum.to_le_bytes());
        bytes
    }

    /// Parse a persisted record. Returns `None` for a wrong-size buffer;
    /// integrity is judged separately through [`CalibrationProfile::is_valid`].
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != RECORD_LEN {
            return None;
        }

        let mut cursor = Cursor { bytes, pos: 0 };
        let format_tag = cursor.read_u32();

        let name_field = cursor.read_slice(NAME_FIELD_LEN);
        let name_len = name_field.iter().position(|&b| b == 0).unwrap_or(NAME_FIELD_LEN);
        let name = String::from_utf8_lossy(&name_field[..name_len]).into_owned();

        let timestamp = cursor.read_u32();

        let mut left = [BiquadCoefficients::BYPASS; BIQUADS_PER_CHANNEL];
        let mut right = [BiquadCoefficients::BYPASS; BIQUADS_PER_CHANNEL];
        for coeffs in left.iter_mut().chain(right.iter_mut()) {
            *coeffs = BiquadCoefficients::new(
                cursor.read_f32(),
                cursor.read_f32(),
                cursor.read_f32(),
                cursor.read_f32(),
                cursor.read_f32(),
            );
        }

        let num_filters_used = cursor.read_u8();
        let checksum = cursor.read_u32();

        Some(Self {
            format_tag,
            name,
            timestamp,
            left,
            right,
            num_filters_used,
            checksum,
        })
    }

    /// The checksummed portion of the record, serialized field by field.
    fn canonical_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(RECORD_LEN - 4);
        out.extend_from_slice(&self.format_tag.to_le_bytes());

        let mut name_field = [0u8; NAME_FIELD_LEN];
        let raw = self.name.as_bytes();
        let mut len = raw.len().min(MAX_PROFILE_NAME_LEN);
        // Never split a multi-byte character when truncating.
        while !self.name.is_char_boundary(len) {
            len -= 1;
        }
        name_field[..len].copy_from_slice(&raw[..len]);
        out.extend_from_slice(&name_field);

        out.extend_from_slice(&self.timestamp.to_le_bytes());

        for coeffs in self.left.iter().chain(self.right.iter()) {
            for value in [coeffs.b0, coeffs.b1, coeffs.b2, coeffs.a1, coeffs.a2] {
                out.extend_from_slice(&value.to_le_bytes());
            }
        }

        out.push(self.num_filters_used);
        out
    }
}

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn read_slice(&mut self, len: usize) -> &'a [u8] {
        let slice = &self.bytes[self.pos..self.pos + len];
        self.pos += len;
        slice
    }

    fn read_u8(&mut self) -> u8 {
        self.read_slice(1)[0]
    }

    fn read_u32(&mut self) -> u32 {
        u32::from_le_bytes(self.read_slice(4).try_into().unwrap())
    }

    fn read_f32(&mut self) -> f32 {
        f32::from_le_bytes(self.read_slice(4).try_into().unwrap())
    }
}

/// CRC32, reflected polynomial 0xEDB88320, init all-ones, final complement.
fn crc32(data: &[u8]) -> u32 {
    let mut crc = 0xFFFF_FFFFu32;
    for &byte in data {
        crc ^= u32::from(byte);
        for _ in 0..8 {
            let mask = (crc & 1).wrapping_neg();
            crc = (crc >> 1) ^ (0xEDB8_8320 & mask);
        }
    }
    !crc
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn sample_profile() -> CalibrationProfile {
        let mut profile = CalibrationProfile::default();
        profile.name = "Kitchen".to_string();
        profile.timestamp = 1_700_000_000;
        profile.left[0] = BiquadCoefficients::new(1.5, -2.0, 0.5, -1.9, 0.95);
        profile.right[3] = BiquadCoefficients::new(0.9, 0.1, 0.0, -0.5, 0.2);
        profile.count_active_filters();
        profile.update_checksum();
        profile
    }

    #[test]
    fn test_crc32_known_answer() {
        // The canonical check value for this polynomial.
        assert_eq!(crc32(b"123456789"), 0xCBF4_3926);
        assert_eq!(crc32(b""), 0);
    }

    #[test]
    fn test_valid_after_update_checksum() {
        let profile = sample_profile();
        assert!(profile.is_valid());
        assert!(profile.checksum_matches());
    }

    #[test]
    fn test_mutation_invalidates() {
        let base = sample_profile();

        let mut corrupted = base.clone();
        corrupted.name = "Kitchem".to_string();
        assert!(!corrupted.is_valid());

        let mut corrupted = base.clone();
        corrupted.timestamp += 1;
        assert!(!corrupted.is_valid());

        let mut corrupted = base.clone();
        corrupted.left[14].b2 += 0.001;
        assert!(!corrupted.is_valid());

        let mut corrupted = base.clone();
        corrupted.num_filters_used = 9;
        assert!(!corrupted.is_valid());
    }

    #[test]
    fn test_single_byte_corruption_detected() {
        let profile = sample_profile();
        let bytes = profile.to_bytes();

        // Flip one bit in every byte of the checksummed region in turn.
        for pos in [0usize, 4, 20, 36, 41, 200, RECORD_LEN - 5] {
            let mut mutated = bytes.clone();
            mutated[pos] ^= 0x01;
            let parsed = CalibrationProfile::from_bytes(&mutated).unwrap();
            assert!(!parsed.is_valid(), "corruption at byte {} not caught", pos);
        }
    }

    #[test]
    fn test_round_trip() {
        let profile = sample_profile();
        let parsed = CalibrationProfile::from_bytes(&profile.to_bytes()).unwrap();

        assert!(parsed.is_valid());
        assert_eq!(parsed.name, "Kitchen");
        assert_eq!(parsed.timestamp, 1_700_000_000);
        assert_eq!(parsed.left[0], profile.left[0]);
        assert_eq!(parsed.right[3], profile.right[3]);
        assert_eq!(parsed.num_filters_used, 2);
    }

    #[test]
    fn test_record_len() {
        assert_eq!(RECORD_LEN, 645);
        assert_eq!(sample_profile().to_bytes().len(), RECORD_LEN);
    }

    #[test]
    fn test_wrong_size_rejected() {
        assert!(CalibrationProfile::from_bytes(&[]).is_none());
        assert!(CalibrationProfile::from_bytes(&[0u8; RECORD_LEN - 1]).is_none());
        assert!(CalibrationProfile::from_bytes(&[0u8; RECORD_LEN + 1]).is_none());
    }

    #[test]
    fn test_count_active_filters() {
        let mut profile = CalibrationProfile::default();
        profile.count_active_filters();
        assert_eq!(profile.num_filters_used, 0);

        // Left-only, right-only and both-set indices each count once.
        profile.left[0] = BiquadCoefficients::new(1.5, 0.0, 0.0, 0.0, 0.0);
        profile.right[1] = BiquadCoefficients::new(0.5, 0.0, 0.0, 0.0, 0.0);
        profile.left[2] = BiquadCoefficients::new(2.0, 0.0, 0.0, 0.0, 0.0);
        profile.right[2] = BiquadCoefficients::new(2.0, 0.0, 0.0, 0.0, 0.0);
        profile.count_active_filters();
        assert_eq!(profile.num_filters_used, 3);
    }

    #[test]
    fn test_tombstone_is_deleted_not_valid() {
        let tombstone = CalibrationProfile::tombstone();
        assert!(tombstone.is_deleted());
        assert!(!tombstone.is_valid());
        // Intact checksum is what separates "deleted" from "corrupted".
        assert!(tombstone.checksum_matches());

        let round_tripped = CalibrationProfile::from_bytes(&tombstone.to_bytes()).unwrap();
        assert!(round_tripped.is_deleted());
        assert!(round_tripped.checksum_matches());
    }

    #[test]
    fn test_name_truncated_at_field_limit() {
        let mut profile = CalibrationProfile::default();
        profile.name = "x".repeat(100);
        profile.update_checksum();

        let parsed = CalibrationProfile::from_bytes(&profile.to_bytes()).unwrap();
        assert_eq!(parsed.name.len(), MAX_PROFILE_NAME_LEN);
    }

    #[test]
    fn test_name_truncation_respects_char_boundaries() {
        // 20 two-byte characters: the 31-byte limit falls mid-character,
        // so the stored name backs off to 30 bytes instead of splitting.
        let mut profile = CalibrationProfile::default();
        profile.name = "é".repeat(20);
        profile.update_checksum();

        let parsed = CalibrationProfile::from_bytes(&profile.to_bytes()).unwrap();
        assert_eq!(parsed.name, "é".repeat(15));
        assert!(!parsed.name.contains('\u{FFFD}'));
    }

    #[test]
    fn test_json_surface() {
        // The host configuration layer serializes profiles as JSON; the
        // persisted byte format is unaffected by it.
        let profile = sample_profile();
        let json = serde_json::to_string(&profile).unwrap();
        let parsed: CalibrationProfile = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.name, profile.name);
        assert_eq!(parsed.left[0], profile.left[0]);
        assert!(parsed.is_valid());
    }
}
