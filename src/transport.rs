//! Bit-level shift transports.  A transport issues TCK pulses while driving
//! the TMS and TDI lines and sampling TDO; everything above it (TAP state
//! tracking, register shifts, scanning, fuzzing) is built on this trait.
//! Hardware backends should implement `Transport`.

use alloc::vec;
use alloc::vec::Vec;

use crate::error::Result;

pub mod gpio;
pub mod loopback;
pub mod sim;

/// Minimum supported TCK frequency.
pub const MIN_CLOCK_HZ: u32 = 1_000;
/// Maximum supported TCK frequency.
pub const MAX_CLOCK_HZ: u32 = 10_000_000;
/// Conservative default TCK frequency.
pub const DEFAULT_CLOCK_HZ: u32 = 1_000_000;

/// Line assignments and timing for one transport instance.  Owned by the
/// TAP controller once handed over; build a fresh one to reconfigure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportConfig {
    /// Test Clock line.
    pub tck: u8,
    /// Test Mode Select line.
    pub tms: u8,
    /// Test Data In line (driven toward the target).
    pub tdi: u8,
    /// Test Data Out line (sampled from the target).
    pub tdo: u8,
    /// TCK frequency in Hz.
    pub clock_hz: u32,
    /// Optional hard-reset line.
    pub reset: Option<ResetLine>,
}

/// Optional TRST/SRST wiring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResetLine {
    pub line: u8,
    pub active_low: bool,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            tck: 2,
            tms: 3,
            tdi: 4,
            tdo: 5,
            clock_hz: DEFAULT_CLOCK_HZ,
            reset: Some(ResetLine {
                line: 6,
                active_low: true,
            }),
        }
    }
}

/// A bit-level shift transport.  Bits are transmitted LSB-first within each
/// byte; TDO is sampled once per TCK pulse and packed LSB-first the same
/// way.
pub trait Transport {
    /// Clock out one TCK pulse per element of `tms`, driving the TMS line to
    /// that bit's value.  `tdi` holds the TDI line state for the whole
    /// sequence.
    fn change_mode(&mut self, tms: &[u8], tdi: bool) -> Result<()>;

    /// Shift every byte of `data` out on TDI while capturing TDO.  `bits`
    /// is the number of valid bits in the final byte (1..=8).  When
    /// `last_tms` is true the final bit is clocked with TMS high, so a
    /// shifting TAP falls through to Exit1.  Returns one captured byte per
    /// input byte.
    fn read_write_data(&mut self, data: &[u8], bits: u8, last_tms: bool) -> Result<Vec<u8>>;

    /// Capture `bits` bits from TDO while clocking out all-ones.  Stays in
    /// the current shift state.
    fn read_data(&mut self, bits: usize) -> Result<Vec<u8>> {
        if bits == 0 {
            return Ok(Vec::new());
        }
        let data = vec![0xff; bits.div_ceil(8)];
        let rem = (bits % 8) as u8;
        let last = if rem == 0 { 8 } else { rem };
        self.read_write_data(&data, last, false)
    }

    /// Reconfigure the TCK frequency.  Backends without adjustable timing
    /// may ignore this.
    fn set_clock(&mut self, _hz: u32) -> Result<()> {
        Ok(())
    }
}

/// Opens transports on demand.  Pin discovery uses this to stand up a
/// transient transport per candidate pin assignment.
pub trait TransportFactory {
    type Transport: Transport;

    fn open(&mut self, config: &TransportConfig) -> Result<Self::Transport>;
}
