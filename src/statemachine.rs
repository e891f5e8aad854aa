//! The IEEE 1149.1 Test Access Port state machine and the register shifter
//! built on top of it.  [`TapController`] owns a [`Transport`] and tracks
//! the TAP state of the target, translating "go to this state" requests
//! into TMS bit sequences and shifting payloads through the instruction or
//! data registers.

use alloc::vec::Vec;
use core::fmt;

use log::{debug, trace};

use crate::error::{Error, Result};
use crate::transport::{Transport, TransportConfig, MAX_CLOCK_HZ, MIN_CLOCK_HZ};

/// Which shift register a payload is bound for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Register {
    Data,
    Instruction,
}

/// The 16 canonical TAP states.  Discriminants index [`TRANSITIONS`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TapState {
    Reset = 0,
    Idle = 1,
    SelectDR = 2,
    CaptureDR = 3,
    ShiftDR = 4,
    Exit1DR = 5,
    PauseDR = 6,
    Exit2DR = 7,
    UpdateDR = 8,
    SelectIR = 9,
    CaptureIR = 10,
    ShiftIR = 11,
    Exit1IR = 12,
    PauseIR = 13,
    Exit2IR = 14,
    UpdateIR = 15,
}

use TapState::*;

/// Fixed, total transition table: `TRANSITIONS[state][tms]` is the state
/// entered by one TCK pulse with TMS at `tms`.
pub const TRANSITIONS: [[TapState; 2]; 16] = [
    [Idle, Reset],         // Reset
    [Idle, SelectDR],      // Idle
    [CaptureDR, SelectIR], // SelectDR
    [ShiftDR, Exit1DR],    // CaptureDR
    [ShiftDR, Exit1DR],    // ShiftDR
    [PauseDR, UpdateDR],   // Exit1DR
    [PauseDR, Exit2DR],    // PauseDR
    [ShiftDR, UpdateDR],   // Exit2DR
    [Idle, SelectDR],      // UpdateDR
    [CaptureIR, Reset],    // SelectIR
    [ShiftIR, Exit1IR],    // CaptureIR
    [ShiftIR, Exit1IR],    // ShiftIR
    [PauseIR, UpdateIR],   // Exit1IR
    [PauseIR, Exit2IR],    // PauseIR
    [ShiftIR, UpdateIR],   // Exit2IR
    [Idle, SelectDR],      // UpdateIR
];

impl TapState {
    /// The state reached by one TCK pulse with TMS at `tms`.
    pub fn next(self, tms: bool) -> TapState {
        TRANSITIONS[self as usize][tms as usize]
    }

    /// Human-readable state name.
    pub fn name(self) -> &'static str {
        match self {
            Reset => "Test-Logic-Reset",
            Idle => "Run-Test/Idle",
            SelectDR => "Select-DR-Scan",
            CaptureDR => "Capture-DR",
            ShiftDR => "Shift-DR",
            Exit1DR => "Exit1-DR",
            PauseDR => "Pause-DR",
            Exit2DR => "Exit2-DR",
            UpdateDR => "Update-DR",
            SelectIR => "Select-IR-Scan",
            CaptureIR => "Capture-IR",
            ShiftIR => "Shift-IR",
            Exit1IR => "Exit1-IR",
            PauseIR => "Pause-IR",
            Exit2IR => "Exit2-IR",
            UpdateIR => "Update-IR",
        }
    }
}

impl fmt::Display for TapState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// TAP controller: owns the transport and the single shared TAP state.
/// Callers must serialize access to one controller; every operation takes
/// `&mut self` and mutates the tracked state.
pub struct TapController<T> {
    transport: T,
    config: TransportConfig,
    state: Option<TapState>,
}

impl<T: Transport> TapController<T> {
    /// Attach a transport and force the TAP into a known state.
    pub fn new(transport: T, config: TransportConfig) -> Result<Self> {
        let mut ctl = Self {
            transport,
            config,
            state: None,
        };
        ctl.reset()?;
        debug!(
            "TAP controller up: tck={} tms={} tdi={} tdo={} @ {} Hz",
            ctl.config.tck, ctl.config.tms, ctl.config.tdi, ctl.config.tdo, ctl.config.clock_hz
        );
        Ok(ctl)
    }

    /// Current TAP state, `None` if unknown.
    pub fn state(&self) -> Option<TapState> {
        self.state
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// Give the transport back, consuming the controller.
    pub fn release(self) -> T {
        self.transport
    }

    /// Drive TMS high for 5 clocks, unconditionally forcing Test-Logic-Reset.
    /// The only operation guaranteed to succeed from an unknown state.
    pub fn reset(&mut self) -> Result<()> {
        self.transport.change_mode(&[1, 1, 1, 1, 1], true)?;
        self.state = Some(Reset);
        trace!("TAP reset to Test-Logic-Reset");
        Ok(())
    }

    /// Reconfigure the TCK frequency, bounds-checked to the supported range.
    pub fn set_clock(&mut self, hz: u32) -> Result<()> {
        if !(MIN_CLOCK_HZ..=MAX_CLOCK_HZ).contains(&hz) {
            return Err(Error::InvalidConfig(alloc::format!(
                "clock {hz} Hz outside {MIN_CLOCK_HZ}..{MAX_CLOCK_HZ} Hz"
            )));
        }
        self.transport.set_clock(hz)?;
        self.config.clock_hz = hz;
        debug!("TCK set to {hz} Hz");
        Ok(())
    }

    /// Clock a TMS sequence out and track the resulting state.
    fn walk(&mut self, tms: &[u8]) -> Result<()> {
        self.transport.change_mode(tms, true)?;
        if let Some(mut s) = self.state {
            for &b in tms {
                s = s.next(b != 0);
            }
            self.state = Some(s);
        }
        Ok(())
    }

    /// Move to `target` by the documented TMS route.  Direct routes exist
    /// for Reset, Idle, Shift-DR and Shift-IR; any other target fails with
    /// [`Error::UnsupportedTransition`].  An unknown current state is
    /// recovered with a reset first.
    pub fn goto_state(&mut self, target: TapState) -> Result<()> {
        if self.state.is_none() {
            self.reset()?;
        }
        if target == Reset {
            return self.reset();
        }
        if self.state == Some(target) {
            return Ok(());
        }
        match target {
            Idle => match self.state {
                Some(Reset) | Some(UpdateDR) | Some(UpdateIR) => self.walk(&[0]),
                Some(Exit1DR) | Some(Exit1IR) => self.walk(&[1, 0]),
                Some(ShiftDR) | Some(ShiftIR) => self.walk(&[1, 1, 0]),
                _ => {
                    self.reset()?;
                    self.walk(&[0])
                }
            },
            ShiftDR => {
                self.goto_state(Idle)?;
                self.walk(&[1, 0, 0])
            }
            ShiftIR => {
                self.goto_state(Idle)?;
                self.walk(&[1, 1, 0, 0])
            }
            other => Err(Error::UnsupportedTransition(other)),
        }
    }

    /// Shift `bits` bits of `data` through the instruction or data
    /// register, capturing the response.  Bits go out LSB-first within each
    /// byte; the final bit is clocked with TMS high so the TAP falls
    /// through to Exit1, after which the controller routes to `exit`
    /// (Run-Test/Idle or Test-Logic-Reset).
    pub fn shift(
        &mut self,
        reg: Register,
        data: &[u8],
        bits: usize,
        exit: TapState,
    ) -> Result<Vec<u8>> {
        if data.is_empty() || bits == 0 || bits > data.len() * 8 {
            return Err(Error::InvalidLength);
        }
        if exit != Idle && exit != Reset {
            return Err(Error::UnsupportedTransition(exit));
        }

        let shift_state = match reg {
            Register::Data => ShiftDR,
            Register::Instruction => ShiftIR,
        };
        self.goto_state(shift_state)?;

        let nbytes = bits.div_ceil(8);
        let rem = (bits % 8) as u8;
        let last = if rem == 0 { 8 } else { rem };
        let captured = self.transport.read_write_data(&data[..nbytes], last, true)?;
        self.state = Some(match reg {
            Register::Data => Exit1DR,
            Register::Instruction => Exit1IR,
        });

        match exit {
            Idle => self.walk(&[1, 0])?,
            _ => self.reset()?,
        }
        Ok(captured)
    }

    /// Read the 32-bit identification code: the IDCODE register is the
    /// default DR after reset, so reset and shift 32 bits out of Shift-DR.
    pub fn read_idcode(&mut self) -> Result<u32> {
        self.reset()?;
        let bytes = self.shift(Register::Data, &[0xff; 4], 32, Idle)?;
        if bytes.len() < 4 {
            return Err(Error::Hardware("short IDCODE response"));
        }
        let idcode = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        trace!("IDCODE read: {idcode:#010x}");
        Ok(idcode)
    }

    /// Connectivity probe: shift a known pattern through DR and report
    /// whether the transport completed the exchange.  Any response counts;
    /// the probe does not require a specific value.
    pub fn test_connectivity(&mut self) -> Result<bool> {
        self.reset()?;
        let response = self.shift(Register::Data, &[0xAA], 8, Idle)?;
        debug!("connectivity probe response: {:02x?}", response);
        Ok(!response.is_empty())
    }
}
