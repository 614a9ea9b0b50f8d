//! Runs a small grid of cores for a fixed number of frames and prints a
//! fingerprint of the resulting registry. Identical builds print identical
//! fingerprints on every host.

use proptest as _;
use rstest as _;
use serde as _;
use serde_json as _;
use thiserror as _;
use toml as _;
use tracing as _;

use substrate_core::{
    encode, program_bytes, CycleBudget, Opcode, Position, ProgramMetadata, Scheduler,
    SubstrateConfig, Viewport, DEFAULT_CONSOLE_START,
};

const FRAMES: usize = 16;

fn hash_bytes(hash: &mut u64, bytes: &[u8]) {
    for byte in bytes {
        *hash ^= u64::from(*byte);
        *hash = hash.wrapping_mul(0x1000_0000_01B3);
    }
}

fn ticker(seed: u16) -> Vec<u8> {
    let console = u16::try_from(DEFAULT_CONSOLE_START >> 16).unwrap_or(0);
    program_bytes(&[
        encode(Opcode::Lui, 1, 0, console),
        encode(Opcode::Li, 2, 0, seed),
        encode(Opcode::Li, 3, 0, 7),
        encode(Opcode::Mul, 2, 2, 3),
        encode(Opcode::Li, 4, 0, u16::from(b'.')),
        encode(Opcode::Sb, 4, 1, 0),
        encode(Opcode::Jmp, 0, 0, 0xFFFE),
    ])
}

fn fingerprint() -> String {
    let mut scheduler = match Scheduler::new(SubstrateConfig::default()) {
        Ok(scheduler) => scheduler,
        Err(err) => return format!("config error: {err}"),
    };
    for y in -2..=2 {
        for x in -2..=2 {
            let seed = u16::try_from((x + 3) * 10 + y + 3).unwrap_or(1);
            let _ = scheduler.register_core(Position::new(x, y), &ticker(seed), &ProgramMetadata::unsigned());
        }
    }
    scheduler.set_viewport(Some(Viewport::from_corners(
        Position::new(-1, -1),
        Position::new(2, 2),
    )));

    let mut hash = 0xcbf2_9ce4_8422_2325_u64;
    for _ in 0..FRAMES {
        for result in scheduler.execute_pass(CycleBudget::cycles(1_000)) {
            hash_bytes(&mut hash, &result.core_id.get().to_le_bytes());
            hash_bytes(&mut hash, &result.cycles_executed.to_le_bytes());
            hash_bytes(&mut hash, &result.pc.to_le_bytes());
        }
    }
    for core in scheduler.list_active_cores() {
        for value in core.registers {
            hash_bytes(&mut hash, &value.to_le_bytes());
        }
        hash_bytes(&mut hash, &core.cycles.to_le_bytes());
    }
    format!("{hash:016x}")
}

fn main() {
    println!("{}", fingerprint());
}
