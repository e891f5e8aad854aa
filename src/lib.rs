//! This crate drives a JTAG debug port for reconnaissance and fuzzing.  At
//! the lowest level, the `Transport` trait shifts bits over the TCK/TMS/
//! TDI/TDO lines; a bit-banged GPIO backend is provided and other hardware
//! shift peripherals can be added behind the same trait.
//!
//! The next level up is the `TapController`, which tracks the IEEE 1149.1
//! TAP state machine.  You ask for a state (Reset, Idle, Shift-DR or
//! Shift-IR) and it issues the TMS sequence to get there, then shifts
//! payloads through the instruction or data registers.
//!
//! On top of the controller sit the reconnaissance and attack layers:
//! `scan` enumerates the chain and identifies devices by IDCODE signature,
//! `discovery` brute-forces unknown pinouts, `fuzzer` runs adversarial
//! payload sessions against the instruction and data registers, and
//! `crash` deduplicates the fault signatures an external sampler reports.
//!
//! # Example
//! ```
//! use tapfuzz::scan::scan_chain;
//! use tapfuzz::statemachine::TapController;
//! use tapfuzz::transport::sim::SimTarget;
//! use tapfuzz::transport::TransportConfig;
//!
//! let target = SimTarget::new(0x4BA0_0477);
//! let mut tap = TapController::new(target, TransportConfig::default()).unwrap();
//! let chain = scan_chain(&mut tap).unwrap();
//! assert!(chain.valid);
//! assert_eq!(chain.devices[0].manufacturer, "ARM");
//! ```

#![no_std]

#[cfg(feature = "std")]
extern crate std;

extern crate alloc;

pub mod crash;
#[cfg(feature = "std")]
pub mod discovery;
pub mod error;
#[cfg(feature = "std")]
pub mod fuzzer;
pub mod idcode;
pub mod scan;
pub mod statemachine;
pub mod strategy;
pub mod transport;

pub use error::{Error, Result, Status};
