//! Biquad programmer
//!
//! Orchestrates the codec, register map and transaction engine to commit
//! filters into the chip. Two write paths exist: the per-slot path
//! (`write_biquad` and friends) selects the bank/page for every slot, and
//! the batched path (`write_channel_biquads`, `write_all_biquads`) amortizes
//! one selection over the up-to-four slots sharing a page.
//!
//! The batched path is transactional: every wire payload is built before
//! the first bus write, and a failure part-way through recommits bypass to
//! every slot already touched so the chip never holds a half-applied
//! configuration. The per-slot path deliberately is not (a failed `Both`
//! write still attempts the other side and reports aggregate failure).

use log::{debug, error, info};

use crate::dsp::design;
use crate::dsp::fixed::{coefficient_payload, COEFF_PAYLOAD_LEN};
use crate::dsp::params;
use crate::dsp::{BiquadCoefficients, Channel, Side, BIQUADS_PER_CHANNEL};
use crate::error::{Result, Tas5805mError};
use crate::profile::ShadowState;

use super::engine::{I2cBus, RegisterWriter};
use super::regmap::{slot_address, BANK_COEFF, SLOTS_PER_PAGE};

/// Settle time after writing one coefficient window.
pub const COEFF_SETTLE_MS: u32 = 5;

/// One fully prepared slot write.
struct SlotWrite {
    side: Side,
    index: usize,
    coeffs: BiquadCoefficients,
    payload: [u8; COEFF_PAYLOAD_LEN],
}

/// Commits biquad coefficients to the chip's DSP over a borrowed bus.
///
/// Borrowing the bus mutably is what enforces the single-owner rule: two
/// programmers can never interleave bank/page sequences on one bus.
pub struct BiquadProgrammer<'a, B: I2cBus> {
    writer: RegisterWriter<'a, B>,
}

impl<'a, B: I2cBus> BiquadProgrammer<'a, B> {
    pub fn new(bus: &'a mut B, address: u8) -> Self {
        Self {
            writer: RegisterWriter::new(bus, address),
        }
    }

    /// Commit one filter to the requested channel(s).
    ///
    /// Rejects an out-of-range index or non-finite coefficients before any
    /// bus I/O. With `Channel::Both`, a failure on one side does not stop
    /// the other side from being attempted; the first error is reported and
    /// the side that succeeded is *not* rolled back. Normal addressing is
    /// restored on every path.
    pub fn write_biquad(
        &mut self,
        channel: Channel,
        index: usize,
        coeffs: BiquadCoefficients,
        shadow: &mut ShadowState,
    ) -> Result<()> {
        params::validate_index(index)?;
        params::validate_coefficients(&coeffs)?;

        let payload = coefficient_payload(&coeffs);
        debug!("writing biquad {:?} idx={}: {:?}", channel, index, coeffs);

        let mut first_failure = None;
        for &side in channel.sides() {
            match self.write_slot(side, index, &payload) {
                Ok(()) => shadow.record(side, index, coeffs),
                Err(err) => {
                    error!("failed to write {:?} biquad {}: {}", side, index, err);
                    first_failure.get_or_insert(err);
                }
            }
        }

        let restore = self.writer.return_to_normal();
        match first_failure {
            Some(err) => Err(err),
            None => restore,
        }
    }

    /// Reset one filter slot to bypass.
    pub fn reset_biquad(
        &mut self,
        channel: Channel,
        index: usize,
        shadow: &mut ShadowState,
    ) -> Result<()> {
        self.write_biquad(channel, index, BiquadCoefficients::BYPASS, shadow)
    }

    /// Reset all 30 filters to bypass. Idempotent.
    pub fn reset_all_biquads(&mut self, shadow: &mut ShadowState) -> Result<()> {
        info!("resetting all 30 biquads to bypass");
        let bypass = [BiquadCoefficients::BYPASS; BIQUADS_PER_CHANNEL];
        self.write_all_biquads(&bypass, &bypass, shadow)
    }

    /// Commit up to four filters sharing one coefficient page with a
    /// single bank/page selection. `start_index` must sit on a page
    /// boundary (a multiple of four).
    pub fn write_page_group(
        &mut self,
        side: Side,
        start_index: usize,
        filters: &[BiquadCoefficients],
        shadow: &mut ShadowState,
    ) -> Result<()> {
        if start_index % SLOTS_PER_PAGE != 0 || start_index >= BIQUADS_PER_CHANNEL {
            return Err(Tas5805mError::InvalidParameter {
                param: "start_index",
                value: start_index.to_string(),
                expected: "page-aligned index (0, 4, 8 or 12)",
            });
        }
        let slots_on_page = SLOTS_PER_PAGE.min(BIQUADS_PER_CHANNEL - start_index);
        if filters.is_empty() || filters.len() > slots_on_page {
            return Err(Tas5805mError::InvalidParameter {
                param: "filters",
                value: filters.len().to_string(),
                expected: "1-4 filters, all within one page",
            });
        }

        let mut plan = Vec::with_capacity(filters.len());
        for (offset, coeffs) in filters.iter().enumerate() {
            params::validate_coefficients(coeffs)?;
            plan.push(SlotWrite {
                side,
                index: start_index + offset,
                coeffs: *coeffs,
                payload: coefficient_payload(coeffs),
            });
        }
        self.commit_plan(plan, shadow)
    }

    /// Commit a full 15-filter set to one physical channel, batched.
    pub fn write_channel_biquads(
        &mut self,
        side: Side,
        filters: &[BiquadCoefficients; BIQUADS_PER_CHANNEL],
        shadow: &mut ShadowState,
    ) -> Result<()> {
        self.commit_batch(&[(side, filters)], shadow)
    }

    /// Commit all 30 filters, batched: roughly one bank/page selection per
    /// four slots instead of one per slot.
    pub fn write_all_biquads(
        &mut self,
        left: &[BiquadCoefficients; BIQUADS_PER_CHANNEL],
        right: &[BiquadCoefficients; BIQUADS_PER_CHANNEL],
        shadow: &mut ShadowState,
    ) -> Result<()> {
        self.commit_batch(&[(Side::Left, left), (Side::Right, right)], shadow)
    }

    /// Design and commit a parametric (peaking) EQ filter.
    ///
    /// Like the other design entry points, returns the computed
    /// coefficients so callers can inspect what was committed.
    pub fn write_parametric_eq(
        &mut self,
        channel: Channel,
        index: usize,
        frequency: f32,
        gain_db: f32,
        q: f32,
        sample_rate: f32,
        shadow: &mut ShadowState,
    ) -> Result<BiquadCoefficients> {
        params::validate_frequency(frequency)?;
        params::validate_gain(gain_db)?;
        params::validate_q(q)?;

        let coeffs = design::peaking(frequency, gain_db, q, sample_rate);
        info!(
            "PEQ: fc={:.1}Hz gain={:.1}dB Q={:.2}",
            frequency, gain_db, q
        );
        self.write_biquad(channel, index, coeffs, shadow)?;
        Ok(coeffs)
    }

    /// Design and commit a low shelf filter.
    pub fn write_low_shelf(
        &mut self,
        channel: Channel,
        index: usize,
        frequency: f32,
        gain_db: f32,
        slope: f32,
        sample_rate: f32,
        shadow: &mut ShadowState,
    ) -> Result<BiquadCoefficients> {
        params::validate_frequency(frequency)?;
        params::validate_gain(gain_db)?;
        params::validate_slope(slope)?;

        let coeffs = design::low_shelf(frequency, gain_db, slope, sample_rate);
        info!(
            "Low shelf: fc={:.1}Hz gain={:.1}dB slope={:.2}",
            frequency, gain_db, slope
        );
        self.write_biquad(channel, index, coeffs, shadow)?;
        Ok(coeffs)
    }

    /// Design and commit a high shelf filter.
    pub fn write_high_shelf(
        &mut self,
        channel: Channel,
        index: usize,
        frequency: f32,
        gain_db: f32,
        slope: f32,
        sample_rate: f32,
        shadow: &mut ShadowState,
    ) -> Result<BiquadCoefficients> {
        params::validate_frequency(frequency)?;
        params::validate_gain(gain_db)?;
        params::validate_slope(slope)?;

        let coeffs = design::high_shelf(frequency, gain_db, slope, sample_rate);
        info!(
            "High shelf: fc={:.1}Hz gain={:.1}dB slope={:.2}",
            frequency, gain_db, slope
        );
        self.write_biquad(channel, index, coeffs, shadow)?;
        Ok(coeffs)
    }

    /// Design and commit a high-pass filter.
    pub fn write_high_pass(
        &mut self,
        channel: Channel,
        index: usize,
        frequency: f32,
        q: f32,
        sample_rate: f32,
        shadow: &mut ShadowState,
    ) -> Result<BiquadCoefficients> {
        params::validate_frequency(frequency)?;
        params::validate_q(q)?;

        let coeffs = design::high_pass(frequency, q, sample_rate);
        info!("High-pass: fc={:.1}Hz Q={:.2}", frequency, q);
        self.write_biquad(channel, index, coeffs, shadow)?;
        Ok(coeffs)
    }

    /// Design and commit a low-pass filter.
    pub fn write_low_pass(
        &mut self,
        channel: Channel,
        index: usize,
        frequency: f32,
        q: f32,
        sample_rate: f32,
        shadow: &mut ShadowState,
    ) -> Result<BiquadCoefficients> {
        params::validate_frequency(frequency)?;
        params::validate_q(q)?;

        let coeffs = design::low_pass(frequency, q, sample_rate);
        info!("Low-pass: fc={:.1}Hz Q={:.2}", frequency, q);
        self.write_biquad(channel, index, coeffs, shadow)?;
        Ok(coeffs)
    }

    /// Design and commit a notch filter.
    pub fn write_notch(
        &mut self,
        channel: Channel,
        index: usize,
        frequency: f32,
        q: f32,
        sample_rate: f32,
        shadow: &mut ShadowState,
    ) -> Result<BiquadCoefficients> {
        params::validate_frequency(frequency)?;
        params::validate_q(q)?;

        let coeffs = design::notch(frequency, q, sample_rate);
        info!("Notch: fc={:.1}Hz Q={:.2}", frequency, q);
        self.write_biquad(channel, index, coeffs, shadow)?;
        Ok(coeffs)
    }

    pub(crate) fn delay_ms(&mut self, ms: u32) {
        self.writer.delay_ms(ms);
    }

    fn write_slot(&mut self, side: Side, index: usize, payload: &[u8]) -> Result<()> {
        let (page, offset) = slot_address(side, index);
        self.writer.select_bank_page(BANK_COEFF, page)?;
        self.writer.write_block(offset, payload)?;
        // Give the DSP time to absorb the new window.
        self.writer.delay_ms(COEFF_SETTLE_MS);
        Ok(())
    }

    fn commit_batch(
        &mut self,
        jobs: &[(Side, &[BiquadCoefficients; BIQUADS_PER_CHANNEL])],
        shadow: &mut ShadowState,
    ) -> Result<()> {
        // Build and validate the full write plan before any bus traffic.
        let mut plan = Vec::with_capacity(jobs.len() * BIQUADS_PER_CHANNEL);
        for &(side, filters) in jobs {
            for (index, coeffs) in filters.iter().enumerate() {
                params::validate_coefficients(coeffs)?;
                plan.push(SlotWrite {
                    side,
                    index,
                    coeffs: *coeffs,
                    payload: coefficient_payload(coeffs),
                });
            }
        }
        self.commit_plan(plan, shadow)
    }

    fn commit_plan(&mut self, plan: Vec<SlotWrite>, shadow: &mut ShadowState) -> Result<()> {
        let mut touched = Vec::new();
        let result = self.run_batch(&plan, shadow, &mut touched);
        let restore = self.writer.return_to_normal();

        match result {
            Ok(()) => restore,
            Err(err) => {
                error!(
                    "batched write failed, recommitting bypass to {} touched slots",
                    touched.len()
                );
                self.recommit_bypass(&plan, &touched, shadow);
                Err(err)
            }
        }
    }

    fn run_batch(
        &mut self,
        plan: &[SlotWrite],
        shadow: &mut ShadowState,
        touched: &mut Vec<usize>,
    ) -> Result<()> {
        let mut selected: Option<(Side, u8)> = None;
        for (i, write) in plan.iter().enumerate() {
            let (page, offset) = slot_address(write.side, write.index);
            if selected != Some((write.side, page)) {
                self.writer.select_bank_page(BANK_COEFF, page)?;
                selected = Some((write.side, page));
            }

            self.writer.write_block(offset, &write.payload)?;
            self.writer.delay_ms(COEFF_SETTLE_MS);
            shadow.record(write.side, write.index, write.coeffs);
            touched.push(i);
        }
        Ok(())
    }

    /// Best-effort compensation: return every touched slot to bypass so a
    /// partial batch never leaves a mixed configuration on the chip.
    fn recommit_bypass(&mut self, plan: &[SlotWrite], touched: &[usize], shadow: &mut ShadowState) {
        let bypass = coefficient_payload(&BiquadCoefficients::BYPASS);
        let mut selected: Option<(Side, u8)> = None;

        for &i in touched {
            let write = &plan[i];
            let (page, offset) = slot_address(write.side, write.index);
            if selected != Some((write.side, page)) {
                match self.writer.select_bank_page(BANK_COEFF, page) {
                    Ok(()) => selected = Some((write.side, page)),
                    Err(_) => {
                        selected = None;
                        continue;
                    }
                }
            }

            if self.writer.write_block(offset, &bypass).is_ok() {
                self.writer.delay_ms(COEFF_SETTLE_MS);
                shadow.record(write.side, write.index, BiquadCoefficients::BYPASS);
            }
        }

        let _ = self.writer.return_to_normal();
    }
}
