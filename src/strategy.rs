//! Fuzzing payload generation.  Every strategy except `Random` is a pure
//! function of `(strategy, iteration)` so test vectors are reproducible.

use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;
use core::fmt;
use core::str::FromStr;

use rand::rngs::SmallRng;
use rand::Rng;

use crate::error::Error;

/// Hard ceiling on payload size.
pub const MAX_PAYLOAD_BYTES: usize = 128;

/// How payloads are produced across a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FuzzStrategy {
    /// Walk the 8-bit value space in order.
    Sequential,
    /// Uniformly random length (8..=32 bits) and content.
    Random,
    /// Placeholder mutation of a fixed seed.  Kept deterministic for
    /// reproducible vectors; a fitness-driven search would replace it.
    Genetic,
    /// Cycle the classic boundary patterns 0x00/0xFF/0xAA/0x55.
    Smart,
    /// Known-interesting instruction table, then random fallback.
    Dictionary,
}

impl FuzzStrategy {
    pub fn name(self) -> &'static str {
        match self {
            FuzzStrategy::Sequential => "sequential",
            FuzzStrategy::Random => "random",
            FuzzStrategy::Genetic => "genetic",
            FuzzStrategy::Smart => "smart",
            FuzzStrategy::Dictionary => "dictionary",
        }
    }
}

impl fmt::Display for FuzzStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for FuzzStrategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "sequential" => Ok(FuzzStrategy::Sequential),
            "random" => Ok(FuzzStrategy::Random),
            "genetic" => Ok(FuzzStrategy::Genetic),
            "smart" => Ok(FuzzStrategy::Smart),
            "dictionary" => Ok(FuzzStrategy::Dictionary),
            other => Err(Error::InvalidConfig(alloc::format!(
                "unknown strategy '{other}'"
            ))),
        }
    }
}

/// Common JTAG instruction values worth trying first: the low opcode
/// space, its complement, and the usual stuck-bit patterns.
pub const DICTIONARY: [u8; 48] = [
    0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, //
    0x08, 0x09, 0x0A, 0x0B, 0x0C, 0x0D, 0x0E, 0x0F, //
    0x10, 0x11, 0x12, 0x13, 0x14, 0x15, 0x16, 0x17, //
    0x18, 0x19, 0x1A, 0x1B, 0x1C, 0x1D, 0x1E, 0x1F, //
    0xFF, 0xFE, 0xFD, 0xFC, 0xFB, 0xFA, 0xF9, 0xF8, //
    0xAA, 0x55, 0xCC, 0x33, 0x0F, 0xF0, 0x00, 0xFF,
];

/// A generated payload: a bit buffer, its XOR checksum and which register
/// class it targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload {
    pub data: Vec<u8>,
    /// Payload length in bits.
    pub bits: usize,
    /// XOR of all payload bytes.
    pub checksum: u8,
    /// True when bound for the instruction register.
    pub for_instruction: bool,
}

impl Payload {
    fn new(data: Vec<u8>, bits: usize, for_instruction: bool) -> Self {
        debug_assert!(data.len() <= MAX_PAYLOAD_BYTES);
        let checksum = data.iter().fold(0, |acc, b| acc ^ b);
        Self {
            data,
            bits,
            checksum,
            for_instruction,
        }
    }

    pub fn describe(&self) -> String {
        alloc::format!(
            "{} bits, checksum 0x{:02X}",
            self.bits,
            self.checksum
        )
    }
}

/// Produce the payload for `iteration` under `strategy`.  `rng` is only
/// consulted by `Random` and by `Dictionary` once its table is exhausted.
pub fn generate(
    strategy: FuzzStrategy,
    iteration: u32,
    rng: &mut SmallRng,
    for_instruction: bool,
) -> Payload {
    let (data, bits) = match strategy {
        FuzzStrategy::Sequential => (vec![(iteration & 0xFF) as u8], 8),
        FuzzStrategy::Random => {
            let bits = rng.gen_range(8..=32usize);
            let data = (0..bits.div_ceil(8)).map(|_| rng.gen()).collect();
            (data, bits)
        }
        FuzzStrategy::Dictionary => match DICTIONARY.get(iteration as usize) {
            Some(&byte) => (vec![byte], 8),
            None => (vec![rng.gen()], 8),
        },
        FuzzStrategy::Genetic => (vec![(iteration.wrapping_mul(17) ^ 0xAA) as u8], 8),
        FuzzStrategy::Smart => {
            let byte = match iteration % 4 {
                0 => 0x00,
                1 => 0xFF,
                2 => 0xAA,
                _ => 0x55,
            };
            (vec![byte], 8)
        }
    };
    Payload::new(data, bits, for_instruction)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn rng() -> SmallRng {
        SmallRng::seed_from_u64(0xF00D)
    }

    #[test]
    fn sequential_is_iteration_mod_256() {
        let mut r = rng();
        assert_eq!(generate(FuzzStrategy::Sequential, 5, &mut r, true).data, [5]);
        assert_eq!(
            generate(FuzzStrategy::Sequential, 261, &mut r, true).data,
            [5]
        );
    }

    #[test]
    fn dictionary_walks_table_then_falls_back() {
        let mut r = rng();
        for (i, &expected) in DICTIONARY.iter().enumerate() {
            let p = generate(FuzzStrategy::Dictionary, i as u32, &mut r, true);
            assert_eq!(p.data, [expected]);
            assert_eq!(p.bits, 8);
        }
        // Beyond the table: value is random, but the shape is fixed.
        let p = generate(FuzzStrategy::Dictionary, DICTIONARY.len() as u32, &mut r, true);
        assert_eq!(p.bits, 8);
        assert_eq!(p.data.len(), 1);
    }

    #[test]
    fn genetic_formula_is_stable() {
        let mut r = rng();
        for i in 0..300u32 {
            let p = generate(FuzzStrategy::Genetic, i, &mut r, false);
            assert_eq!(p.data, [(i.wrapping_mul(17) ^ 0xAA) as u8]);
        }
    }

    #[test]
    fn smart_cycles_boundary_patterns() {
        let mut r = rng();
        let expect = [0x00, 0xFF, 0xAA, 0x55];
        for i in 0..12u32 {
            let p = generate(FuzzStrategy::Smart, i, &mut r, true);
            assert_eq!(p.data, [expect[(i % 4) as usize]]);
        }
    }

    #[test]
    fn random_length_stays_in_range() {
        let mut r = rng();
        for i in 0..100 {
            let p = generate(FuzzStrategy::Random, i, &mut r, false);
            assert!((8..=32).contains(&p.bits));
            assert_eq!(p.data.len(), p.bits.div_ceil(8));
        }
    }

    #[test]
    fn checksum_is_xor_of_bytes() {
        let p = Payload::new(vec![0x0F, 0xF0, 0xAA], 24, false);
        assert_eq!(p.checksum, 0x0F ^ 0xF0 ^ 0xAA);
    }

    #[test]
    fn strategy_names_round_trip() {
        for s in [
            FuzzStrategy::Sequential,
            FuzzStrategy::Random,
            FuzzStrategy::Genetic,
            FuzzStrategy::Smart,
            FuzzStrategy::Dictionary,
        ] {
            assert_eq!(s.name().parse::<FuzzStrategy>().unwrap(), s);
        }
        assert!("evolutionary".parse::<FuzzStrategy>().is_err());
    }
}
