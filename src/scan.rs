//! Chain enumeration.  A scan resets the TAP, reads the default data
//! register (IDCODE) and identifies whatever answers.  The direct form
//! supports a single device; the result type is sized so that multi-device
//! chain walking via BYPASS can be added without reshaping callers.

use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;

use log::info;

use crate::error::Result;
use crate::idcode::{identify, plausible, Device};
use crate::statemachine::TapController;
use crate::transport::Transport;

/// Upper bound on devices a chain result can carry.
pub const MAX_CHAIN_DEVICES: usize = 16;

/// Result of one chain scan.  Device 0 is electrically nearest the TDO
/// pin.  Not retained across scans; logging finished results is the
/// storage collaborator's job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainResult {
    pub devices: Vec<Device>,
    pub valid: bool,
}

impl ChainResult {
    fn empty() -> Self {
        Self {
            devices: Vec::new(),
            valid: false,
        }
    }

    /// Human-readable scan summary for the UI layer.
    pub fn summary(&self) -> String {
        if self.devices.is_empty() {
            return String::from("No devices found");
        }
        let first = &self.devices[0];
        format!(
            "{} device(s): {} {} (IDCODE 0x{:08X})",
            self.devices.len(),
            first.manufacturer,
            first.part,
            first.idcode
        )
    }
}

/// Enumerate the scan chain.  An all-zero or all-one capture is treated as
/// "no device" and yields an empty, invalid result.
pub fn scan_chain<T: Transport>(tap: &mut TapController<T>) -> Result<ChainResult> {
    let idcode = tap.read_idcode()?;

    if !plausible(idcode) {
        info!("chain scan: no devices found");
        return Ok(ChainResult::empty());
    }

    let device = identify(idcode);
    info!(
        "chain scan: found {} {} (IDCODE 0x{idcode:08X})",
        device.manufacturer, device.part
    );
    Ok(ChainResult {
        devices: alloc::vec![device],
        valid: true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::sim::SimTarget;
    use crate::transport::TransportConfig;

    #[test]
    fn clean_scan_identifies_arm() {
        let sim = SimTarget::new(0x4BA0_0477);
        let mut tap = TapController::new(sim, TransportConfig::default()).unwrap();
        let chain = scan_chain(&mut tap).unwrap();
        assert!(chain.valid);
        assert_eq!(chain.devices.len(), 1);
        assert_eq!(chain.devices[0].idcode, 0x4BA0_0477);
        assert!(chain.devices[0].identified);
        assert_eq!(chain.devices[0].manufacturer, "ARM");
        assert!(chain.summary().contains("ARM"));
    }

    #[test]
    fn all_ones_capture_is_an_empty_chain() {
        let sim = SimTarget::unresponsive();
        let mut tap = TapController::new(sim, TransportConfig::default()).unwrap();
        let chain = scan_chain(&mut tap).unwrap();
        assert!(!chain.valid);
        assert!(chain.devices.is_empty());
        assert_eq!(chain.summary(), "No devices found");
    }

    #[test]
    fn rescan_replaces_rather_than_accumulates() {
        let sim = SimTarget::new(0x4BA0_0477);
        let mut tap = TapController::new(sim, TransportConfig::default()).unwrap();
        let first = scan_chain(&mut tap).unwrap();
        let second = scan_chain(&mut tap).unwrap();
        assert_eq!(first, second);
        assert_eq!(second.devices.len(), 1);
    }
}
