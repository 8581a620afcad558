//! TAS5805M register map for the biquad coefficient bank.
//!
//! The chip's register space is addressed bank → page → byte offset. All
//! coefficient windows live in one fixed bank; within it, groups of up to
//! four filter slots share a page, each slot owning a fixed 20-byte window.
//! Pure data, no runtime mutation.

use crate::dsp::Side;

/// Page-select register, reachable on every page.
pub const REG_PAGE_SELECT: u8 = 0x00;
/// Bank-select register, reachable only on page 0.
pub const REG_BANK_SELECT: u8 = 0x7F;
/// Bank holding the biquad coefficient windows.
pub const BANK_COEFF: u8 = 0xAA;

/// Default I2C address of the chip.
pub const DEFAULT_ADDRESS: u8 = 0x2C;

/// Filter slots sharing one page.
pub const SLOTS_PER_PAGE: usize = 4;

// Page addresses for left channel biquads 0-14.
const LEFT_PAGES: [u8; 15] = [
    0x24, 0x24, 0x24, 0x24, // BQ0-BQ3
    0x25, 0x25, 0x25, 0x25, // BQ4-BQ7
    0x26, 0x26, 0x26, 0x26, // BQ8-BQ11
    0x27, 0x27, 0x27, // BQ12-BQ14
];

// Page addresses for right channel biquads 0-14.
const RIGHT_PAGES: [u8; 15] = [
    0x32, 0x32, 0x32, 0x32, //
    0x33, 0x33, 0x33, 0x33, //
    0x34, 0x34, 0x34, 0x34, //
    0x35, 0x35, 0x35, //
];

// Offset of each biquad within its page (20 bytes per slot, same layout on
// every coefficient page).
const SLOT_OFFSETS: [u8; 15] = [
    0x08, 0x1C, 0x30, 0x44, //
    0x08, 0x1C, 0x30, 0x44, //
    0x08, 0x1C, 0x30, 0x44, //
    0x08, 0x1C, 0x30, //
];

/// Look up the (page, offset) pair for a filter slot.
///
/// `index` must already be validated (0-14); see `dsp::params`.
pub fn slot_address(side: Side, index: usize) -> (u8, u8) {
    let page = match side {
        Side::Left => LEFT_PAGES[index],
        Side::Right => RIGHT_PAGES[index],
    };
    (page, SLOT_OFFSETS[index])
}
