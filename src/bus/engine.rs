//! Bus transaction engine
//!
//! Retrying single-byte and block register writes, plus the bank/page
//! selection protocol. The bus itself is supplied by the host platform
//! through the [`I2cBus`] trait; this module owns the retry and pacing
//! discipline around it.

use std::fmt;

use log::{error, warn};

use crate::error::{Result, Tas5805mError};

use super::regmap::{REG_BANK_SELECT, REG_PAGE_SELECT};

/// Attempts per register write before giving up.
pub const MAX_WRITE_ATTEMPTS: u32 = 3;
/// Delay between write attempts.
pub const RETRY_DELAY_MS: u32 = 5;
/// Settle time after each bank/page selection step.
pub const SELECT_SETTLE_MS: u32 = 2;

/// Opaque error code reported by the platform bus implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusError(pub u8);

impl fmt::Display for BusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bus error code {}", self.0)
    }
}

/// Blocking, addressed register bus supplied by the host platform.
///
/// `delay_ms` lives on the trait because transaction pacing is part of the
/// chip protocol: settle times between addressing steps are as load-bearing
/// as the writes themselves, and tests need to observe them.
pub trait I2cBus {
    /// Write `bytes` to the device at `address`; `stop` ends the
    /// transaction with a stop condition.
    fn write(&mut self, address: u8, bytes: &[u8], stop: bool) -> std::result::Result<(), BusError>;

    /// Block the calling context for `ms` milliseconds.
    fn delay_ms(&mut self, ms: u32);
}

/// Retrying register writer bound to one device address.
pub struct RegisterWriter<'a, B: I2cBus> {
    bus: &'a mut B,
    address: u8,
}

impl<'a, B: I2cBus> RegisterWriter<'a, B> {
    pub fn new(bus: &'a mut B, address: u8) -> Self {
        Self { bus, address }
    }

    /// Write a single byte to a register, retrying transient failures.
    pub fn write_register(&mut self, reg: u8, value: u8) -> Result<()> {
        self.write_with_retry(reg, &[value])
    }

    /// Write a block of bytes starting at `reg`.
    pub fn write_block(&mut self, reg: u8, data: &[u8]) -> Result<()> {
        self.write_with_retry(reg, data)
    }

    /// Block for `ms` milliseconds on the underlying bus.
    pub fn delay_ms(&mut self, ms: u32) {
        self.bus.delay_ms(ms);
    }

    fn write_with_retry(&mut self, reg: u8, data: &[u8]) -> Result<()> {
        let mut frame = Vec::with_capacity(data.len() + 1);
        frame.push(reg);
        frame.extend_from_slice(data);

        for attempt in 1..=MAX_WRITE_ATTEMPTS {
            match self.bus.write(self.address, &frame, true) {
                Ok(()) => return Ok(()),
                Err(err) => {
                    warn!(
                        "I2C write failed (attempt {}/{}): reg=0x{:02X} len={} {}",
                        attempt,
                        MAX_WRITE_ATTEMPTS,
                        reg,
                        data.len(),
                        err
                    );
                    if attempt < MAX_WRITE_ATTEMPTS {
                        self.bus.delay_ms(RETRY_DELAY_MS);
                    }
                }
            }
        }

        error!(
            "I2C write failed after {} attempts: reg=0x{:02X}",
            MAX_WRITE_ATTEMPTS, reg
        );
        Err(Tas5805mError::BusWriteFailed {
            reg,
            attempts: MAX_WRITE_ATTEMPTS,
        })
    }

    /// Select the bank and page holding a coefficient window.
    ///
    /// Page 0 is selected first so the bank register is reachable
    /// regardless of the chip's current page. Skipping or reordering the
    /// steps can land coefficient writes in the wrong filter.
    pub fn select_bank_page(&mut self, bank: u8, page: u8) -> Result<()> {
        self.write_register(REG_PAGE_SELECT, 0x00)?;
        self.bus.delay_ms(SELECT_SETTLE_MS);

        self.write_register(REG_BANK_SELECT, bank)?;
        self.bus.delay_ms(SELECT_SETTLE_MS);

        self.write_register(REG_PAGE_SELECT, page)?;
        self.bus.delay_ms(SELECT_SETTLE_MS);

        Ok(())
    }

    /// Return the chip to normal addressing (bank 0, page 0).
    pub fn return_to_normal(&mut self) -> Result<()> {
        self.write_register(REG_PAGE_SELECT, 0x00)?;
        self.write_register(REG_BANK_SELECT, 0x00)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::bus::testing::MockBus;

    #[test]
    fn test_write_register_success_is_one_transaction() {
        let mut bus = MockBus::new();
        let mut writer = RegisterWriter::new(&mut bus, 0x2C);

        writer.write_register(0x10, 0xAB).unwrap();

        assert_eq!(bus.writes, vec![vec![0x10, 0xAB]]);
        assert!(bus.delays.is_empty());
    }

    #[test]
    fn test_retry_then_success() {
        // Failures on the first two attempts, success on the third: three
        // transactions on the bus and exactly two retry delays.
        let mut bus = MockBus::new();
        bus.fail_next_writes(2);
        let mut writer = RegisterWriter::new(&mut bus, 0x2C);

        writer.write_register(0x10, 0xAB).unwrap();

        assert_eq!(bus.writes.len(), 3);
        assert_eq!(bus.delays, vec![RETRY_DELAY_MS, RETRY_DELAY_MS]);
    }

    #[test]
    fn test_retries_exhausted() {
        let mut bus = MockBus::new();
        bus.fail_next_writes(4);
        let mut writer = RegisterWriter::new(&mut bus, 0x2C);

        let err = writer.write_register(0x10, 0xAB).unwrap_err();

        assert!(matches!(
            err,
            Tas5805mError::BusWriteFailed {
                reg: 0x10,
                attempts: MAX_WRITE_ATTEMPTS
            }
        ));
        // Exactly three attempts, no fourth.
        assert_eq!(bus.writes.len(), 3);
        assert_eq!(bus.delays, vec![RETRY_DELAY_MS, RETRY_DELAY_MS]);
    }

    #[test]
    fn test_write_block_prepends_register() {
        let mut bus = MockBus::new();
        let mut writer = RegisterWriter::new(&mut bus, 0x2C);

        writer.write_block(0x08, &[1, 2, 3, 4]).unwrap();

        assert_eq!(bus.writes, vec![vec![0x08, 1, 2, 3, 4]]);
    }

    #[test]
    fn test_select_bank_page_sequence() {
        let mut bus = MockBus::new();
        let mut writer = RegisterWriter::new(&mut bus, 0x2C);

        writer.select_bank_page(0xAA, 0x24).unwrap();

        assert_eq!(
            bus.writes,
            vec![
                vec![REG_PAGE_SELECT, 0x00],
                vec![REG_BANK_SELECT, 0xAA],
                vec![REG_PAGE_SELECT, 0x24],
            ]
        );
        assert_eq!(
            bus.delays,
            vec![SELECT_SETTLE_MS, SELECT_SETTLE_MS, SELECT_SETTLE_MS]
        );
    }

    #[test]
    fn test_select_bank_page_aborts_on_first_failure() {
        let mut bus = MockBus::new();
        bus.fail_next_writes(MAX_WRITE_ATTEMPTS as usize);
        let mut writer = RegisterWriter::new(&mut bus, 0x2C);

        assert!(writer.select_bank_page(0xAA, 0x24).is_err());
        // The bank-select step must never run after the page-0 step failed.
        assert!(bus
            .writes
            .iter()
            .all(|frame| frame[0] != REG_BANK_SELECT));
    }

    #[test]
    fn test_return_to_normal() {
        let mut bus = MockBus::new();
        let mut writer = RegisterWriter::new(&mut bus, 0x2C);

        writer.return_to_normal().unwrap();

        assert_eq!(
            bus.writes,
            vec![vec![REG_PAGE_SELECT, 0x00], vec![REG_BANK_SELECT, 0x00]]
        );
    }
}
