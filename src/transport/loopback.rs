//! Loopback transport: TDI wired straight to TDO.  Whatever is shifted out
//! comes straight back, which makes it useful for round-trip tests and for
//! exercising the TAP controller without hardware.

use alloc::vec::Vec;

use crate::error::Result;
use crate::transport::Transport;

#[derive(Debug, Default)]
pub struct Loopback;

impl Loopback {
    pub fn new() -> Self {
        Self
    }
}

impl Transport for Loopback {
    fn change_mode(&mut self, _tms: &[u8], _tdi: bool) -> Result<()> {
        Ok(())
    }

    fn read_write_data(&mut self, data: &[u8], bits: u8, _last_tms: bool) -> Result<Vec<u8>> {
        let bits = bits.clamp(1, 8);
        let mut captured: Vec<u8> = data.into();
        if let Some(last) = captured.last_mut() {
            // Only the valid bits of the final byte are echoed.
            if bits < 8 {
                *last &= (1 << bits) - 1;
            }
        }
        Ok(captured)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn echoes_data_back() {
        let mut lb = Loopback::new();
        assert_eq!(
            lb.read_write_data(&[0x12, 0x34], 8, true).unwrap(),
            &[0x12, 0x34]
        );
    }

    #[test]
    fn masks_partial_final_byte() {
        let mut lb = Loopback::new();
        assert_eq!(lb.read_write_data(&[0xFF], 4, false).unwrap(), &[0x0F]);
    }

    #[test]
    fn read_data_returns_all_ones() {
        let mut lb = Loopback::new();
        assert_eq!(lb.read_data(16).unwrap(), &[0xFF, 0xFF]);
    }
}
