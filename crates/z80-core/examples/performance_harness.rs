//! Throughput harness for the z80-core execution controller.
//!
//! ## Usage
//!
//! ```sh
//! cargo run --release -p z80-core --example performance_harness
//! ```
//!
//! Reports instructions and cycles per second for a few tight loops, run on
//! several threads at once, and how many 3.5 MHz machines that throughput
//! would sustain in real time.

#![allow(clippy::pedantic)]

use log as _;
use proptest as _;
use rstest as _;
#[cfg(feature = "serde")]
use serde as _;
use thiserror as _;

use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use z80_core::memory::CONTROL_SHADOW_OFF;
use z80_core::{
    BankingLayout, Bus, CancellationToken, CoreConfig, ExecutionController, NullPorts, Platform,
    ProgramImage, SystemBus,
};

const NUM_THREADS: usize = 4;
const REFERENCE_CLOCK_HZ: f64 = 3_500_000.0;
const CHUNK_STEPS: u32 = 10_000;

#[derive(Debug, Clone, Copy)]
struct BenchmarkResult {
    name: &'static str,
    instructions_per_second: f64,
    cycles_per_second: f64,
    realtime_machines: f64,
}

fn benchmark(
    name: &'static str,
    platform: fn() -> Platform,
    program: &'static [u8],
    duration: Duration,
) -> BenchmarkResult {
    let (tx, rx) = mpsc::channel();

    let handles: Vec<_> = (0..NUM_THREADS)
        .map(|_| {
            let tx = tx.clone();
            thread::spawn(move || {
                let config = CoreConfig {
                    chunk_steps: CHUNK_STEPS,
                    ..CoreConfig::default()
                };
                let mut controller = ExecutionController::with_bus(
                    SystemBus::new(platform(), NullPorts),
                    config,
                );
                let Ok(image) = ProgramImage::from_bytes(0x0100, program) else {
                    return;
                };
                if controller.reset(Some(&image), None).is_err() {
                    return;
                }
                if let Some(bus) = controller.bus_mut() {
                    bus.port_out(0xFF, CONTROL_SHADOW_OFF);
                }

                let cancel = CancellationToken::new();
                cancel.cancel();
                let mut total_instructions = 0u64;
                let mut total_cycles = 0u64;
                let start = Instant::now();
                while start.elapsed() < duration {
                    let Ok(outcome) = controller.run_until_stop(&[][..], &cancel) else {
                        break;
                    };
                    total_instructions += u64::from(outcome.steps);
                    total_cycles += outcome.cycles;
                }
                tx.send((total_instructions, total_cycles)).ok();
            })
        })
        .collect();

    for h in handles {
        h.join().ok();
    }
    drop(tx);

    let mut total_instructions = 0u64;
    let mut total_cycles = 0u64;
    for (inst, cyc) in rx {
        total_instructions += inst;
        total_cycles += cyc;
    }

    let elapsed_secs = duration.as_secs_f64();
    let cycles_per_second = total_cycles as f64 / elapsed_secs;
    BenchmarkResult {
        name,
        instructions_per_second: total_instructions as f64 / elapsed_secs,
        cycles_per_second,
        realtime_machines: cycles_per_second / REFERENCE_CLOCK_HZ,
    }
}

fn simple() -> Platform {
    Platform::Simple
}

fn banked() -> Platform {
    Platform::Banked(BankingLayout::default())
}

// loop: NOP ; NOP ; JP loop
const NOP_LOOP: &[u8] = &[0x00, 0x00, 0xC3, 0x00, 0x01];
// loop: ADD A,B ; XOR C ; RLCA ; DEC D ; JR NZ,loop ; JP loop
const ALU_LOOP: &[u8] = &[0x80, 0xA9, 0x07, 0x15, 0x20, 0xFA, 0xC3, 0x00, 0x01];
// LD HL,0x8000 ; loop: LD (HL),A ; INC (HL) ; LD A,(HL) ; INC L ; JP loop
const MEMORY_LOOP: &[u8] = &[
    0x21, 0x00, 0x80, 0x77, 0x34, 0x7E, 0x2C, 0xC3, 0x03, 0x01,
];
// LD IX,0x8000 ; loop: INC (IX+1) ; LD B,(IX+1) ; RLC (IX+2) ; JP loop
const INDEXED_LOOP: &[u8] = &[
    0xDD, 0x21, 0x00, 0x80, 0xDD, 0x34, 0x01, 0xDD, 0x46, 0x01, 0xDD, 0xCB, 0x02, 0x06, 0xC3,
    0x04, 0x01,
];

fn main() {
    let duration = Duration::from_secs(2);
    println!("z80-core performance harness ({NUM_THREADS} threads, {duration:?} per run)");
    println!();

    let results = [
        benchmark("nop_loop", simple, NOP_LOOP, duration),
        benchmark("alu_loop", simple, ALU_LOOP, duration),
        benchmark("memory_loop", simple, MEMORY_LOOP, duration),
        benchmark("indexed_loop", simple, INDEXED_LOOP, duration),
        benchmark("banked_memory_loop", banked, MEMORY_LOOP, duration),
    ];

    println!(
        "{:<20} {:>16} {:>16} {:>14}",
        "benchmark", "instr/s", "cycles/s", "x 3.5 MHz"
    );
    for result in &results {
        println!(
            "{:<20} {:>16.0} {:>16.0} {:>14.1}",
            result.name,
            result.instructions_per_second,
            result.cycles_per_second,
            result.realtime_machines
        );
    }
}
