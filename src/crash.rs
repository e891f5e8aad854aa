//! Crash-signature deduplication.  Fault events arrive from an external
//! sampling collaborator as compact signatures (typically captured program
//! counters); the ring remembers the most recent distinct signatures so
//! repeats can be filtered without unbounded storage.

use core::fmt;

use log::info;

/// Fixed capacity of the signature ring.
pub const SIGNATURE_CAPACITY: usize = 32;

/// Classification of one recorded fault event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Novelty {
    Novel,
    Duplicate,
}

/// Fault classes reported by the sampling collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrashKind {
    /// Target stopped answering within its budget.
    Timeout = 0,
    /// CPU fault or reset observed.
    HardFault = 1,
    /// Expected heartbeat missing.
    NoHeartbeat = 2,
    /// TAP no longer responds to state changes.
    TapStuck = 3,
}

impl CrashKind {
    pub fn name(self) -> &'static str {
        match self {
            CrashKind::Timeout => "timeout",
            CrashKind::HardFault => "hard fault",
            CrashKind::NoHeartbeat => "no heartbeat",
            CrashKind::TapStuck => "TAP stuck",
        }
    }
}

impl fmt::Display for CrashKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Bounded dedup ring.  Membership is a linear scan over at most
/// [`SIGNATURE_CAPACITY`] slots; once full, novel signatures overwrite the
/// oldest entry, so a signature not seen for a long time can be reported
/// novel again.  Callers needing exhaustive history must externalize it.
#[derive(Debug, Default)]
pub struct CrashDedup {
    slots: [u32; SIGNATURE_CAPACITY],
    len: usize,
    next: usize,
    kind_counts: [u32; 4],
}

impl CrashDedup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a fault signature, classifying it as novel or repeat.
    pub fn record(&mut self, signature: u32) -> Novelty {
        if self.slots[..self.len].contains(&signature) {
            return Novelty::Duplicate;
        }
        self.slots[self.next] = signature;
        if self.len < SIGNATURE_CAPACITY {
            self.len += 1;
        }
        self.next = (self.next + 1) % SIGNATURE_CAPACITY;
        info!("novel crash signature 0x{signature:08X}");
        Novelty::Novel
    }

    /// Count a fault event by class.
    pub fn tally(&mut self, kind: CrashKind) {
        self.kind_counts[kind as usize] += 1;
    }

    /// Events recorded for `kind` so far.
    pub fn count(&self, kind: CrashKind) -> u32 {
        self.kind_counts[kind as usize]
    }

    /// Per-class event counts, indexed by `CrashKind` discriminant.
    pub fn stats(&self) -> [u32; 4] {
        self.kind_counts
    }

    /// Distinct signatures currently resident in the ring.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeats_are_duplicates() {
        let mut dedup = CrashDedup::new();
        assert_eq!(dedup.record(0x2000_1234), Novelty::Novel);
        assert_eq!(dedup.record(0x2000_1234), Novelty::Duplicate);
        assert_eq!(dedup.record(0x2000_5678), Novelty::Novel);
    }

    #[test]
    fn wraparound_forgets_the_oldest() {
        let mut dedup = CrashDedup::new();
        for sig in 1..=SIGNATURE_CAPACITY as u32 {
            assert_eq!(dedup.record(sig), Novelty::Novel);
        }
        // Still remembered while the ring is exactly full.
        assert_eq!(dedup.record(1), Novelty::Duplicate);

        // The 33rd distinct signature evicts the 1st.
        assert_eq!(dedup.record(0xDEAD), Novelty::Novel);
        assert_eq!(dedup.record(1), Novelty::Novel);
        // 3 is still resident; only the oldest slots were overwritten.
        assert_eq!(dedup.record(3), Novelty::Duplicate);
    }

    #[test]
    fn kind_counters_accumulate() {
        let mut dedup = CrashDedup::new();
        dedup.tally(CrashKind::Timeout);
        dedup.tally(CrashKind::Timeout);
        dedup.tally(CrashKind::TapStuck);
        assert_eq!(dedup.count(CrashKind::Timeout), 2);
        assert_eq!(dedup.count(CrashKind::TapStuck), 1);
        assert_eq!(dedup.count(CrashKind::HardFault), 0);
        assert_eq!(dedup.stats(), [2, 0, 0, 1]);
    }

    #[test]
    fn ring_occupancy_saturates_at_capacity() {
        let mut dedup = CrashDedup::new();
        assert!(dedup.is_empty());
        for sig in 0..100u32 {
            dedup.record(0x1000 + sig);
        }
        assert_eq!(dedup.len(), SIGNATURE_CAPACITY);
    }
}
