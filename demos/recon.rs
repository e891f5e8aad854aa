//! Reconnaissance walkthrough against a simulated target: scan the chain,
//! discover the pinout, then run a short dictionary fuzz of the
//! instruction register.

use tapfuzz::discovery::discover;
use tapfuzz::fuzzer::{FuzzConfig, FuzzOperation, FuzzScheduler, FuzzStrategy};
use tapfuzz::scan::scan_chain;
use tapfuzz::statemachine::TapController;
use tapfuzz::transport::sim::{SimFactory, SimTarget};
use tapfuzz::transport::TransportConfig;

fn main() -> Result<(), tapfuzz::Error> {
    env_logger::init();

    // Chain scan against a known target.
    let target = SimTarget::new(0x4BA0_0477);
    let mut tap = TapController::new(target, TransportConfig::default())?;
    let chain = scan_chain(&mut tap)?;
    println!("scan: {}", chain.summary());

    // Pin discovery: the simulated target only answers on one wiring.
    let mut factory = SimFactory::new(12, 10, 11, 13, 0x4BA0_0477);
    let found = discover(&mut factory, &[10, 11, 12, 13])?;
    match found.assignment {
        Some(pins) => println!(
            "pins: TCK={} TMS={} TDI={} TDO={} ({}% confidence)",
            pins.tck, pins.tms, pins.tdi, pins.tdo, found.confidence
        ),
        None => println!("pins: no responsive assignment"),
    }

    // Short instruction-register fuzz.
    let mut scheduler = FuzzScheduler::new(tap);
    scheduler.start(FuzzConfig {
        operation: FuzzOperation::Instruction,
        strategy: FuzzStrategy::Dictionary,
        max_iterations: 48,
        ..FuzzConfig::default()
    })?;
    while scheduler.is_active() {
        std::thread::sleep(std::time::Duration::from_millis(10));
        println!("fuzzing... {}%", scheduler.progress());
    }
    let report = scheduler.stop()?;
    println!("{}", report.summary);
    for finding in &report.findings {
        println!("  finding: 0x{finding:08X}");
    }

    Ok(())
}
