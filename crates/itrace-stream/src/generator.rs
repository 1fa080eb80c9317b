//! Deterministic synthetic trace generator.
//!
//! Drives a [`TraceSource`] with a seeded mix of register, banked-register,
//! and memory operations, one packet per instruction. Used by the CLI
//! `simulate` subcommand and by integration tests that need a realistic
//! record stream without a real simulator attached.

use anyhow::Result;
use rand::{rngs::StdRng, Rng as _, SeedableRng};

use crate::source::TraceSource;

/// Emit `instructions` synthetic packets into `source`.
///
/// Deterministic for a given `seed`. The caller supplies a source with a
/// sink already assigned and remains responsible for terminating it.
pub fn generate_trace(source: &mut TraceSource, instructions: u64, seed: u64) -> Result<()> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut pc = 0x0000_1000u32;

    for _ in 0..instructions {
        let ir: u32 = rng.random();
        source.trace_instruction(pc, ir, 0, 0)?;

        for _ in 0..rng.random_range(0..=2) {
            source.trace_reg_read(rng.random_range(0..16), rng.random())?;
        }

        if rng.random_bool(0.3) {
            let width = [1u8, 2, 4][rng.random_range(0..3)];
            let addr = rng.random::<u32>() & !u32::from(width - 1);
            if rng.random_bool(0.5) {
                source.trace_mem_read(addr, rng.random(), width)?;
            } else {
                source.trace_mem_write(addr, rng.random(), width)?;
            }
        }

        if rng.random_bool(0.1) {
            source.trace_bank_reg_write(
                rng.random_range(0..4),
                rng.random_range(0..32),
                rng.random(),
            )?;
        }

        source.trace_reg_write(rng.random_range(0..16), rng.random())?;
        source.end_instruction();
        pc = pc.wrapping_add(4);
    }

    Ok(())
}
