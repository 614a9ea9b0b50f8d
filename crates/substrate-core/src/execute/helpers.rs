//! Address and branch-target arithmetic shared by the execute pipeline.

use crate::decoder::Instruction;
use crate::encoding::INSTRUCTION_BYTES;
use crate::RegisterFile;

/// Effective address `ra + sext(imm)` in the 32-bit core address space.
#[must_use]
pub fn effective_address(instr: &Instruction, regs: &RegisterFile) -> u64 {
    u64::from(regs.get(instr.ra).wrapping_add_signed(instr.simm()))
}

/// PC-relative target `pc + sext(imm) * 4`, wrapping in the 32-bit space.
#[must_use]
#[allow(clippy::cast_possible_wrap)]
pub const fn branch_target(pc: u32, instr: &Instruction) -> u32 {
    pc.wrapping_add_signed(instr.simm().wrapping_mul(INSTRUCTION_BYTES as i32))
}

/// Address of the sequentially next instruction.
#[must_use]
pub const fn next_sequential(pc: u32) -> u32 {
    pc.wrapping_add(INSTRUCTION_BYTES)
}
