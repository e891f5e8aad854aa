//! Simulated single-device target.  [`SimTarget`] implements the TAP
//! protocol bit-for-bit against the same transition table the controller
//! uses: after a reset the default DR holds the configured IDCODE, Shift-IR
//! captures the mandatory `..01` pattern, and everything else reads as
//! ones.  An unresponsive variant models an open circuit (TDO floating
//! high).

use alloc::vec::Vec;

use crate::error::Result;
use crate::statemachine::TapState;
use crate::transport::{Transport, TransportConfig, TransportFactory};

/// IR capture value: IEEE 1149.1 requires the two least-significant bits to
/// be `01`.
const IR_CAPTURE: u8 = 0b0101;

pub struct SimTarget {
    idcode: Option<u32>,
    state: TapState,
    dr: u64,
    ir: u8,
}

impl SimTarget {
    /// A responsive target reporting `idcode` from its identification
    /// register.
    pub fn new(idcode: u32) -> Self {
        Self {
            idcode: Some(idcode),
            state: TapState::Reset,
            dr: idcode as u64,
            ir: IR_CAPTURE,
        }
    }

    /// An open circuit: TDO reads all-ones regardless of input.
    pub fn unresponsive() -> Self {
        Self {
            idcode: None,
            state: TapState::Reset,
            dr: 0,
            ir: 0,
        }
    }

    /// One TCK pulse: present TDO for the current state, shift, advance.
    fn clock(&mut self, tms: bool, tdi: bool) -> bool {
        let Some(idcode) = self.idcode else {
            return true;
        };

        let tdo = match self.state {
            TapState::ShiftDR => {
                let bit = self.dr & 1 != 0;
                self.dr = (self.dr >> 1) | ((tdi as u64) << 31);
                bit
            }
            TapState::ShiftIR => {
                let bit = self.ir & 1 != 0;
                self.ir = (self.ir >> 1) | ((tdi as u8) << 3);
                bit
            }
            _ => true,
        };

        self.state = self.state.next(tms);
        match self.state {
            TapState::CaptureDR => self.dr = idcode as u64,
            TapState::CaptureIR => self.ir = IR_CAPTURE,
            _ => {}
        }
        tdo
    }
}

impl Transport for SimTarget {
    fn change_mode(&mut self, tms: &[u8], tdi: bool) -> Result<()> {
        for &bit in tms {
            self.clock(bit != 0, tdi);
        }
        Ok(())
    }

    fn read_write_data(&mut self, data: &[u8], bits: u8, last_tms: bool) -> Result<Vec<u8>> {
        let bits = bits.clamp(1, 8);
        let mut captured = Vec::with_capacity(data.len());
        for (i, byte) in data.iter().enumerate() {
            let last_byte = i == data.len() - 1;
            let nbits = if last_byte { bits } else { 8 };

            let mut sample = 0u8;
            for b in 0..nbits {
                let tdi = (byte >> b) & 1 == 1;
                let tms = last_byte && b == nbits - 1 && last_tms;
                let tdo = self.clock(tms, tdi) as u8;
                sample |= tdo << b;
            }
            captured.push(sample);
        }
        Ok(captured)
    }
}

/// Factory that answers with a responsive [`SimTarget`] only for one pin
/// assignment, and an open circuit for every other candidate.  Used to
/// exercise pin discovery without hardware.
pub struct SimFactory {
    pub tck: u8,
    pub tms: u8,
    pub tdi: u8,
    pub tdo: u8,
    pub idcode: u32,
    /// Number of transports opened so far.
    pub opened: usize,
}

impl SimFactory {
    pub fn new(tck: u8, tms: u8, tdi: u8, tdo: u8, idcode: u32) -> Self {
        Self {
            tck,
            tms,
            tdi,
            tdo,
            idcode,
            opened: 0,
        }
    }
}

impl TransportFactory for SimFactory {
    type Transport = SimTarget;

    fn open(&mut self, config: &TransportConfig) -> Result<SimTarget> {
        self.opened += 1;
        let hit = config.tck == self.tck
            && config.tms == self.tms
            && config.tdi == self.tdi
            && config.tdo == self.tdo;
        if hit {
            Ok(SimTarget::new(self.idcode))
        } else {
            Ok(SimTarget::unresponsive())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unresponsive_target_reads_ones() {
        let mut sim = SimTarget::unresponsive();
        assert_eq!(sim.read_data(32).unwrap(), &[0xFF; 4]);
    }

    #[test]
    fn dr_shift_returns_idcode_bits() {
        let mut sim = SimTarget::new(0xDEAD_BEEF);
        // Reset, then walk to Shift-DR: TMS 0,1,0,0.
        sim.change_mode(&[1, 1, 1, 1, 1], true).unwrap();
        sim.change_mode(&[0, 1, 0, 0], true).unwrap();
        let bytes = sim.read_write_data(&[0xFF; 4], 8, true).unwrap();
        assert_eq!(u32::from_le_bytes(bytes.try_into().unwrap()), 0xDEAD_BEEF);
    }
}
