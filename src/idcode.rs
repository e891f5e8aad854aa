//! Device identification from 32-bit IDCODE values.  Pure lookup against a
//! static, ordered table of masked signatures; more specific masks come
//! first and the first match wins.

use alloc::format;
use alloc::string::String;

/// 11-bit JEDEC manufacturer field, at bit offset 1.
pub const MANUFACTURER_MASK: u32 = 0x7FF;

/// Default instruction register length assumed for unrecognized parts.
pub const DEFAULT_IR_LENGTH: u8 = 4;

/// One device on the scan chain.  Labels are derived from the signature
/// table, not authoritative; the device is rebuilt on every scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Device {
    pub idcode: u32,
    pub ir_length: u8,
    pub manufacturer: String,
    pub part: String,
    pub identified: bool,
}

struct Signature {
    mask: u32,
    value: u32,
    manufacturer: &'static str,
    part: &'static str,
    ir_length: u8,
}

const fn mfg(id: u32) -> Signature {
    Signature {
        mask: MANUFACTURER_MASK << 1,
        value: id << 1,
        manufacturer: "",
        part: "",
        ir_length: DEFAULT_IR_LENGTH,
    }
}

const fn mfg_named(id: u32, manufacturer: &'static str, ir_length: u8) -> Signature {
    let mut s = mfg(id);
    s.manufacturer = manufacturer;
    s.ir_length = ir_length;
    s
}

/// Ordered signature table.  Full-code entries precede the per-manufacturer
/// fallbacks; order is significant because the first match wins.
static SIGNATURES: &[Signature] = &[
    // Specific parts (version nibble masked off).
    Signature {
        mask: 0x0FFF_FFFF,
        value: 0x0BA0_0477,
        manufacturer: "ARM",
        part: "CoreSight JTAG-DP",
        ir_length: 4,
    },
    Signature {
        mask: 0x0FFF_FFFF,
        value: 0x0362_D093,
        manufacturer: "Xilinx",
        part: "XC7A35T",
        ir_length: 6,
    },
    Signature {
        mask: 0x0FFF_FFFF,
        value: 0x0641_3041,
        manufacturer: "STMicroelectronics",
        part: "STM32F405/407",
        ir_length: 5,
    },
    // Manufacturer fallbacks, JEDEC ids in the 11-bit field at offset 1.
    mfg_named(0x23B, "ARM", 4),
    mfg_named(0x049, "Xilinx", 6),
    mfg_named(0x06E, "Intel/Altera", 10),
    mfg_named(0x017, "Texas Instruments", 6),
    mfg_named(0x020, "STMicroelectronics", 5),
    mfg_named(0x01F, "Microchip/Atmel", 4),
    mfg_named(0x015, "NXP/Philips", 4),
    mfg_named(0x00E, "Freescale", 4),
    mfg_named(0x040, "Lattice", 8),
    mfg_named(0x041, "Infineon", 4),
    mfg_named(0x0BF, "Broadcom", 5),
];

/// Extract the 11-bit JEDEC manufacturer field.
pub fn manufacturer_id(idcode: u32) -> u16 {
    ((idcode >> 1) & MANUFACTURER_MASK) as u16
}

/// Whether a captured 32-bit code could plausibly be an IDCODE.  All-zero
/// and all-one are electrically indistinguishable from an open or shorted
/// line.
pub fn plausible(idcode: u32) -> bool {
    idcode != 0 && idcode != 0xFFFF_FFFF
}

/// Match `idcode` against the signature table.  Deterministic and pure; an
/// unmatched code yields an unidentified device with a synthesized label.
pub fn identify(idcode: u32) -> Device {
    for sig in SIGNATURES {
        if idcode & sig.mask == sig.value {
            let part = if sig.part.is_empty() {
                format!("unknown {} device", sig.manufacturer)
            } else {
                String::from(sig.part)
            };
            return Device {
                idcode,
                ir_length: sig.ir_length,
                manufacturer: String::from(sig.manufacturer),
                part,
                identified: true,
            };
        }
    }
    Device {
        idcode,
        ir_length: DEFAULT_IR_LENGTH,
        manufacturer: format!("unknown (0x{:03X})", manufacturer_id(idcode)),
        part: String::from("unrecognized device"),
        identified: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arm_jtag_dp_identifies() {
        let dev = identify(0x4BA0_0477);
        assert!(dev.identified);
        assert_eq!(dev.manufacturer, "ARM");
        assert_eq!(dev.part, "CoreSight JTAG-DP");
        assert_eq!(dev.ir_length, 4);
    }

    #[test]
    fn specific_entry_beats_manufacturer_fallback() {
        // Same manufacturer field as the ARM fallback, but the full-code
        // entry must win because it comes first.
        let specific = identify(0x4BA0_0477);
        assert_eq!(specific.part, "CoreSight JTAG-DP");

        // A different ARM part falls back to the manufacturer entry.
        let generic = identify(0x1BA0_1477);
        assert!(generic.identified);
        assert_eq!(generic.manufacturer, "ARM");
        assert_eq!(generic.part, "unknown ARM device");
    }

    #[test]
    fn unknown_code_synthesizes_label() {
        let dev = identify(0x0000_1001);
        assert!(!dev.identified);
        assert_eq!(dev.ir_length, DEFAULT_IR_LENGTH);
        assert!(dev.manufacturer.starts_with("unknown"));
    }

    #[test]
    fn plausibility_rejects_stuck_lines() {
        assert!(!plausible(0));
        assert!(!plausible(0xFFFF_FFFF));
        assert!(plausible(0x4BA0_0477));
    }

    #[test]
    fn manufacturer_field_extraction() {
        assert_eq!(manufacturer_id(0x4BA0_0477), 0x23B);
    }
}
