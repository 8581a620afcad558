//! Bus transaction engine and biquad programmer
//!
//! Talks to the chip: the static register map, retrying register writes
//! with the bank/page addressing protocol, and the programmer that commits
//! coefficient payloads into filter slots.

mod engine;
mod programmer;
pub mod regmap;

pub use engine::{
    BusError, I2cBus, RegisterWriter, MAX_WRITE_ATTEMPTS, RETRY_DELAY_MS, SELECT_SETTLE_MS,
};
pub use programmer::{BiquadProgrammer, COEFF_SETTLE_MS};

#[cfg(test)]
pub(crate) mod testing {
    use super::{BusError, I2cBus};

    /// Scripted in-memory bus: records every transaction (including failed
    /// attempts) and every delay, and fails the next N writes on demand.
    pub(crate) struct MockBus {
        pub writes: Vec<Vec<u8>>,
        pub delays: Vec<u32>,
        failures_skip: usize,
        failures_remaining: usize,
    }

    impl MockBus {
        pub fn new() -> Self {
            Self {
                writes: Vec::new(),
                delays: Vec::new(),
                failures_skip: 0,
                failures_remaining: 0,
            }
        }

        /// Make the next `count` write attempts fail.
        pub fn fail_next_writes(&mut self, count: usize) {
            self.fail_writes(0, count);
        }

        /// Let `skip` more writes succeed, then fail the following `count`.
        pub fn fail_writes(&mut self, skip: usize, count: usize) {
            self.failures_skip = skip;
            self.failures_remaining = count;
        }

        /// Frames that carried a 20-byte coefficient payload (offset + data).
        pub fn coefficient_frames(&self) -> Vec<&Vec<u8>> {
            self.writes.iter().filter(|frame| frame.len() == 21).collect()
        }

        /// Number of page-select transactions.
        pub fn page_select_count(&self) -> usize {
            self.writes
                .iter()
                .filter(|frame| frame.len() == 2 && frame[0] == super::regmap::REG_PAGE_SELECT)
                .count()
        }
    }

    impl I2cBus for MockBus {
        fn write(
            &mut self,
            _address: u8,
            bytes: &[u8],
            _stop: bool,
        ) -> std::result::Result<(), BusError> {
            self.writes.push(bytes.to_vec());
            if self.failures_skip > 0 {
                self.failures_skip -= 1;
            } else if self.failures_remaining > 0 {
                self.failures_remaining -= 1;
                return Err(BusError(1));
            }
            Ok(())
        }

        fn delay_ms(&mut self, ms: u32) {
            self.delays.push(ms);
        }
    }
}
