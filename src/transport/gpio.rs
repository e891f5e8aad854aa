//! Bit-banged GPIO transport over `embedded-hal` pin and delay traits.
//! TCK idles low; TDI is driven before the rising edge and TDO is sampled
//! on it.

use alloc::vec::Vec;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin, PinState};

use crate::error::{Error, Result};
use crate::transport::Transport;

pub struct Gpio<Tck, Tms, Tdi, Tdo, Delay>
where
    Tck: OutputPin,
    Tms: OutputPin,
    Tdi: OutputPin,
    Tdo: InputPin,
    Delay: DelayNs,
{
    half_period_ns: u32,
    delay: Delay,
    tck: Tck,
    tms: Tms,
    tdi: Tdi,
    tdo: Tdo,
}

impl<Tck, Tms, Tdi, Tdo, Delay> Gpio<Tck, Tms, Tdi, Tdo, Delay>
where
    Tck: OutputPin,
    Tms: OutputPin,
    Tdi: OutputPin,
    Tdo: InputPin,
    Delay: DelayNs,
{
    pub fn new(clock_hz: u32, tck: Tck, tms: Tms, tdi: Tdi, tdo: Tdo, delay: Delay) -> Self {
        Self {
            half_period_ns: half_period(clock_hz),
            delay,
            tck,
            tms,
            tdi,
            tdo,
        }
    }

    /// One full TCK period: raise the clock, sample TDO, wait, lower, wait.
    fn pulse(&mut self) -> Result<bool> {
        self.tck
            .set_high()
            .map_err(|_| Error::Hardware("TCK drive failed"))?;
        let bit = self.tdo.is_high().map_err(|_| Error::Hardware("TDO sample failed"))?;
        self.delay.delay_ns(self.half_period_ns);
        self.tck
            .set_low()
            .map_err(|_| Error::Hardware("TCK drive failed"))?;
        self.delay.delay_ns(self.half_period_ns);
        Ok(bit)
    }

    fn drive_tms(&mut self, high: bool) -> Result<()> {
        self.tms
            .set_state(PinState::from(high))
            .map_err(|_| Error::Hardware("TMS drive failed"))
    }

    fn drive_tdi(&mut self, high: bool) -> Result<()> {
        self.tdi
            .set_state(PinState::from(high))
            .map_err(|_| Error::Hardware("TDI drive failed"))
    }
}

fn half_period(clock_hz: u32) -> u32 {
    let hz = clock_hz.max(1);
    (1_000_000_000 / hz) / 2
}

impl<Tck, Tms, Tdi, Tdo, Delay> Transport for Gpio<Tck, Tms, Tdi, Tdo, Delay>
where
    Tck: OutputPin,
    Tms: OutputPin,
    Tdi: OutputPin,
    Tdo: InputPin,
    Delay: DelayNs,
{
    fn change_mode(&mut self, tms: &[u8], tdi: bool) -> Result<()> {
        self.drive_tdi(tdi)?;
        for &bit in tms {
            self.drive_tms(bit != 0)?;
            self.pulse()?;
        }
        Ok(())
    }

    fn read_write_data(&mut self, data: &[u8], bits: u8, last_tms: bool) -> Result<Vec<u8>> {
        let bits = bits.clamp(1, 8);
        self.drive_tms(false)?;

        let mut captured = Vec::with_capacity(data.len());
        for (i, byte) in data.iter().enumerate() {
            let last_byte = i == data.len() - 1;
            let nbits = if last_byte { bits } else { 8 };

            let mut sample = 0u8;
            for b in 0..nbits {
                // LSB-first within each byte.
                self.drive_tdi((byte >> b) & 1 == 1)?;
                if last_byte && b == nbits - 1 && last_tms {
                    // Final bit falls through to Exit1.
                    self.drive_tms(true)?;
                }
                let tdo = self.pulse()? as u8;
                sample |= tdo << b;
            }
            captured.push(sample);
        }
        Ok(captured)
    }

    fn set_clock(&mut self, hz: u32) -> Result<()> {
        self.half_period_ns = half_period(hz);
        Ok(())
    }
}
