//! Brute-force JTAG pin discovery.  Every 4-permutation of the candidate
//! pin set is tried with a transient transport at a conservative clock;
//! the first assignment that answers a connectivity probe with a plausible
//! IDCODE wins.  O(n^4) in candidate count, so the set is capped.

use alloc::format;
use alloc::vec::Vec;

use log::{debug, info, warn};
use std::thread;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::idcode::plausible;
use crate::statemachine::TapController;
use crate::transport::{TransportConfig, TransportFactory};

/// Largest candidate set the O(n^4) search will accept.
pub const MAX_CANDIDATE_PINS: usize = 16;

/// Results below this confidence are failures; the search only ever
/// produces 0 or [`DISCOVERY_CONFIDENCE`], so the threshold exists for
/// callers that persist or forward the score.
pub const CONFIDENCE_THRESHOLD: u8 = 50;

/// Confidence assigned to a verified assignment.
const DISCOVERY_CONFIDENCE: u8 = 90;

/// Probe clock: low enough not to upset marginal wiring.
const PROBE_CLOCK_HZ: u32 = 100_000;

/// Pause between attempts so an unstable target is not overwhelmed.
const SETTLE: Duration = Duration::from_millis(10);

/// One candidate line assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinAssignment {
    pub tck: u8,
    pub tms: u8,
    pub tdi: u8,
    pub tdo: u8,
}

/// Outcome of one discovery run.  Not persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PinDiscoveryResult {
    pub assignment: Option<PinAssignment>,
    /// 0 when nothing answered, [`DISCOVERY_CONFIDENCE`] otherwise.
    pub confidence: u8,
    /// IDCODE observed during verification.
    pub idcode: Option<u32>,
}

impl PinDiscoveryResult {
    pub fn verified(&self) -> bool {
        self.confidence >= CONFIDENCE_THRESHOLD
    }

    fn miss() -> Self {
        Self {
            assignment: None,
            confidence: 0,
            idcode: None,
        }
    }
}

/// Search `candidates` for a working JTAG pin assignment.  The first
/// (lowest-index) permutation that yields a plausible IDCODE is returned
/// at fixed high confidence; there is no partial credit for assignments
/// that probe but fail identification.
pub fn discover<F: TransportFactory>(
    factory: &mut F,
    candidates: &[u8],
) -> Result<PinDiscoveryResult> {
    if candidates.len() < 4 {
        return Err(Error::InvalidConfig(format!(
            "need at least 4 candidate pins, got {}",
            candidates.len()
        )));
    }
    if candidates.len() > MAX_CANDIDATE_PINS {
        return Err(Error::InvalidConfig(format!(
            "candidate set of {} exceeds the {MAX_CANDIDATE_PINS}-pin cap",
            candidates.len()
        )));
    }

    info!("pin discovery over {} candidates", candidates.len());

    for assignment in permutations(candidates) {
        if let Some(idcode) = probe(factory, assignment) {
            info!(
                "pin discovery hit: TCK={} TMS={} TDI={} TDO={} (IDCODE 0x{idcode:08X})",
                assignment.tck, assignment.tms, assignment.tdi, assignment.tdo
            );
            return Ok(PinDiscoveryResult {
                assignment: Some(assignment),
                confidence: DISCOVERY_CONFIDENCE,
                idcode: Some(idcode),
            });
        }
        thread::sleep(SETTLE);
    }

    warn!("pin discovery found no responsive JTAG interface");
    Ok(PinDiscoveryResult::miss())
}

/// Try one assignment: transient transport, TAP reset, connectivity probe,
/// IDCODE read.  Any failure along the way is a miss, not an error.
fn probe<F: TransportFactory>(factory: &mut F, assignment: PinAssignment) -> Option<u32> {
    let config = TransportConfig {
        tck: assignment.tck,
        tms: assignment.tms,
        tdi: assignment.tdi,
        tdo: assignment.tdo,
        clock_hz: PROBE_CLOCK_HZ,
        reset: None,
    };

    let transport = match factory.open(&config) {
        Ok(t) => t,
        Err(e) => {
            debug!("candidate {assignment:?}: transport open failed: {e}");
            return None;
        }
    };
    let mut tap = TapController::new(transport, config).ok()?;
    if !tap.test_connectivity().unwrap_or(false) {
        return None;
    }
    let idcode = tap.read_idcode().ok()?;
    plausible(idcode).then_some(idcode)
}

/// All 4-permutations of the candidate set, no pin reused across roles,
/// in lowest-index-first order.
fn permutations(pins: &[u8]) -> Vec<PinAssignment> {
    let mut out = Vec::new();
    for (ci, &tck) in pins.iter().enumerate() {
        for (mi, &tms) in pins.iter().enumerate() {
            if mi == ci {
                continue;
            }
            for (di, &tdi) in pins.iter().enumerate() {
                if di == ci || di == mi {
                    continue;
                }
                for (oi, &tdo) in pins.iter().enumerate() {
                    if oi == ci || oi == mi || oi == di {
                        continue;
                    }
                    out.push(PinAssignment { tck, tms, tdi, tdo });
                }
            }
        }
    }
    out
}
