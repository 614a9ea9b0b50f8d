//! Instruction execution pipeline for the reference instruction set.
//!
//! One step is fetch, decode, execute, commit. Faults are precise: a step
//! that faults leaves registers and `pc` untouched, and the mapper performs
//! no partial store.

mod helpers;

pub use helpers::{branch_target, effective_address, next_sequential};

use crate::decoder::{Decoder, Instruction};
use crate::encoding::{Opcode, INSTRUCTION_BYTES};
use crate::{CoreFault, MemoryMapper, Register, RegisterFile};

/// Side effects of a retired instruction, applied by [`commit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Retired {
    /// Program counter after this instruction.
    pub next_pc: u32,
    /// Destination register write, if any.
    pub dest: Option<(Register, u32)>,
    /// The instruction was `HALT`.
    pub halt: bool,
}

impl Retired {
    const fn sequential(pc: u32) -> Self {
        Self {
            next_pc: next_sequential(pc),
            dest: None,
            halt: false,
        }
    }

    const fn write(pc: u32, reg: Register, value: u32) -> Self {
        Self {
            next_pc: next_sequential(pc),
            dest: Some((reg, value)),
            halt: false,
        }
    }
}

/// Fetches the instruction word at `pc`.
///
/// # Errors
///
/// Returns [`CoreFault::MisalignedFetch`] for an unaligned `pc` and
/// [`CoreFault::Memory`] when the fetch leaves mapped memory.
pub fn fetch(pc: u32, mapper: &mut MemoryMapper) -> Result<u32, CoreFault> {
    if pc % INSTRUCTION_BYTES != 0 {
        return Err(CoreFault::MisalignedFetch { pc });
    }
    #[allow(clippy::cast_possible_truncation)]
    let word = mapper.read(u64::from(pc), 4)? as u32;
    Ok(word)
}

/// Executes `instr` located at `regs.pc()`.
///
/// Memory side effects (stores, device reads) happen here; register and
/// `pc` updates are returned for [`commit`].
///
/// # Errors
///
/// Returns [`CoreFault::Memory`] when a load or store leaves mapped memory.
pub fn execute_instruction(
    instr: &Instruction,
    regs: &RegisterFile,
    mapper: &mut MemoryMapper,
) -> Result<Retired, CoreFault> {
    let pc = regs.pc();
    let a = regs.get(instr.ra);
    let b = regs.get(instr.rb);
    let d = regs.get(instr.rd);

    let retired = match instr.opcode {
        Opcode::Nop => Retired::sequential(pc),
        Opcode::Halt => Retired {
            halt: true,
            ..Retired::sequential(pc)
        },
        Opcode::Li => Retired::write(pc, instr.rd, u32::from(instr.imm)),
        Opcode::Lui => Retired::write(pc, instr.rd, (u32::from(instr.imm) << 16) | (d & 0xFFFF)),
        Opcode::Mov => Retired::write(pc, instr.rd, a),
        Opcode::Add => Retired::write(pc, instr.rd, a.wrapping_add(b)),
        Opcode::Sub => Retired::write(pc, instr.rd, a.wrapping_sub(b)),
        Opcode::And => Retired::write(pc, instr.rd, a & b),
        Opcode::Or => Retired::write(pc, instr.rd, a | b),
        Opcode::Xor => Retired::write(pc, instr.rd, a ^ b),
        Opcode::Shl => Retired::write(pc, instr.rd, a.wrapping_shl(b)),
        Opcode::Shr => Retired::write(pc, instr.rd, a.wrapping_shr(b)),
        Opcode::Mul => Retired::write(pc, instr.rd, a.wrapping_mul(b)),
        Opcode::Addi => Retired::write(pc, instr.rd, a.wrapping_add_signed(instr.simm())),
        Opcode::Lb | Opcode::Lh | Opcode::Lw => {
            let width = instr.opcode.access_width().unwrap_or(4);
            #[allow(clippy::cast_possible_truncation)]
            let value = mapper.read(effective_address(instr, regs), width)? as u32;
            Retired::write(pc, instr.rd, value)
        }
        Opcode::Sb | Opcode::Sh | Opcode::Sw => {
            let width = instr.opcode.access_width().unwrap_or(4);
            mapper.write(effective_address(instr, regs), width, u64::from(d))?;
            Retired::sequential(pc)
        }
        Opcode::Jmp => Retired {
            next_pc: branch_target(pc, instr),
            ..Retired::sequential(pc)
        },
        Opcode::Beq | Opcode::Bne | Opcode::Bltu => {
            let taken = match instr.opcode {
                Opcode::Beq => d == a,
                Opcode::Bne => d != a,
                _ => d < a,
            };
            if taken {
                Retired {
                    next_pc: branch_target(pc, instr),
                    ..Retired::sequential(pc)
                }
            } else {
                Retired::sequential(pc)
            }
        }
    };
    Ok(retired)
}

/// Applies the register and `pc` effects of a retired instruction.
pub fn commit(regs: &mut RegisterFile, retired: Retired) {
    if let Some((reg, value)) = retired.dest {
        regs.set(reg, value);
    }
    regs.set_pc(retired.next_pc);
}

/// Runs one full fetch/decode/execute/commit step.
///
/// Returns `true` when the step retired `HALT`.
///
/// # Errors
///
/// Returns the [`CoreFault`] raised by fetch, decode or execute; `regs` is
/// unchanged in that case.
pub fn step_one(regs: &mut RegisterFile, mapper: &mut MemoryMapper) -> Result<bool, CoreFault> {
    let pc = regs.pc();
    let word = fetch(pc, mapper)?;
    let instr = Decoder::decode(word).map_err(|_| CoreFault::IllegalInstruction { pc, word })?;
    let retired = execute_instruction(&instr, regs, mapper)?;
    commit(regs, retired);
    Ok(retired.halt)
}

#[cfg(test)]
mod tests {
    use super::{fetch, step_one};
    use crate::encoding::{encode, program_bytes, Opcode, INERT_MARKER_WORD};
    use crate::{
        ConsoleConfig, CoreFault, MemoryFault, MemoryLayout, MemoryMapper, Register, RegisterFile,
        DEFAULT_CONSOLE_START, DEFAULT_RAM_SIZE,
    };
    use rstest::rstest;

    fn mapper_with(words: &[u32]) -> MemoryMapper {
        let mut mapper = MemoryMapper::new(&MemoryLayout::default(), ConsoleConfig::default())
            .expect("default layout");
        mapper.load(0, &program_bytes(words)).expect("program fits");
        mapper
    }

    fn run(words: &[u32], steps: usize) -> (RegisterFile, MemoryMapper) {
        let mut mapper = mapper_with(words);
        let mut regs = RegisterFile::default();
        for _ in 0..steps {
            step_one(&mut regs, &mut mapper).expect("step retires");
        }
        (regs, mapper)
    }

    #[rstest]
    #[case(Opcode::Add, 7, 5, 12)]
    #[case(Opcode::Sub, 5, 7, 0xFFFF_FFFE)]
    #[case(Opcode::And, 0b1100, 0b1010, 0b1000)]
    #[case(Opcode::Or, 0b1100, 0b1010, 0b1110)]
    #[case(Opcode::Xor, 0b1100, 0b1010, 0b0110)]
    #[case(Opcode::Shl, 1, 33, 2)]
    #[case(Opcode::Shr, 0x80, 4, 0x8)]
    #[case(Opcode::Mul, 6, 7, 42)]
    fn alu_ops_compute_expected_results(
        #[case] opcode: Opcode,
        #[case] a: u16,
        #[case] b: u16,
        #[case] expected: u32,
    ) {
        let (regs, _) = run(
            &[
                encode(Opcode::Li, 1, 0, a),
                encode(Opcode::Li, 2, 0, b),
                encode(opcode, 3, 1, 2),
            ],
            3,
        );
        assert_eq!(regs.get(Register::R3), expected);
        assert_eq!(regs.pc(), 12);
    }

    #[test]
    fn li_and_lui_build_a_full_word() {
        let (regs, _) = run(
            &[
                encode(Opcode::Li, 4, 0, 0xBEEF),
                encode(Opcode::Lui, 4, 0, 0xDEAD),
                encode(Opcode::Mov, 5, 4, 0),
                encode(Opcode::Addi, 6, 5, 0xFFFF),
            ],
            4,
        );
        assert_eq!(regs.get(Register::R4), 0xDEAD_BEEF);
        assert_eq!(regs.get(Register::R5), 0xDEAD_BEEF);
        assert_eq!(regs.get(Register::R6), 0xDEAD_BEEE);
    }

    #[test]
    fn stores_and_loads_roundtrip_through_ram() {
        let (regs, mapper) = run(
            &[
                encode(Opcode::Li, 1, 0, 0x1000),
                encode(Opcode::Li, 2, 0, 0xA1B2),
                encode(Opcode::Sw, 2, 1, 4),
                encode(Opcode::Lb, 3, 1, 4),
                encode(Opcode::Lh, 4, 1, 4),
                encode(Opcode::Lw, 5, 1, 4),
                encode(Opcode::Sb, 2, 1, 0),
            ],
            7,
        );
        assert_eq!(regs.get(Register::R3), 0xB2);
        assert_eq!(regs.get(Register::R4), 0xA1B2);
        assert_eq!(regs.get(Register::R5), 0xA1B2);
        assert_eq!(mapper.peek(0x1000, 1), Ok(0xB2));
    }

    #[test]
    fn branches_follow_comparison_outcome() {
        let (regs, _) = run(
            &[
                encode(Opcode::Li, 1, 0, 3),
                encode(Opcode::Li, 2, 0, 3),
                encode(Opcode::Beq, 1, 2, 2),
                encode(Opcode::Li, 3, 0, 99),
                encode(Opcode::Bltu, 1, 2, 0x7FFF),
                encode(Opcode::Bne, 1, 2, 0x7FFF),
                encode(Opcode::Jmp, 0, 0, 0xFFFA),
            ],
            6,
        );
        assert_eq!(regs.get(Register::R3), 0, "beq skipped the li");
        assert_eq!(regs.pc(), 0, "jmp went back six words");
    }

    #[test]
    fn halt_reports_completion_and_advances_pc() {
        let mut mapper = mapper_with(&[encode(Opcode::Halt, 0, 0, 0)]);
        let mut regs = RegisterFile::default();
        assert_eq!(step_one(&mut regs, &mut mapper), Ok(true));
        assert_eq!(regs.pc(), 4);
    }

    #[test]
    fn console_store_reaches_device() {
        let console = u16::try_from(DEFAULT_CONSOLE_START >> 16).expect("fits");
        let (_, mapper) = run(
            &[
                encode(Opcode::Li, 1, 0, 0),
                encode(Opcode::Lui, 1, 0, console),
                encode(Opcode::Li, 2, 0, 0x41),
                encode(Opcode::Sb, 2, 1, 0),
            ],
            4,
        );
        assert!(mapper.console().expect("mapped").last_line().ends_with('A'));
    }

    #[test]
    fn illegal_word_faults_without_side_effects() {
        let mut mapper = mapper_with(&[INERT_MARKER_WORD]);
        let mut regs = RegisterFile::default();
        assert_eq!(
            step_one(&mut regs, &mut mapper),
            Err(CoreFault::IllegalInstruction {
                pc: 0,
                word: INERT_MARKER_WORD
            })
        );
        assert_eq!(regs, RegisterFile::default());
    }

    #[test]
    fn out_of_bounds_store_faults_precisely() {
        let top = u16::try_from(DEFAULT_RAM_SIZE >> 16).expect("fits");
        let mut mapper = mapper_with(&[
            encode(Opcode::Li, 1, 0, 0),
            encode(Opcode::Lui, 1, 0, top),
            encode(Opcode::Addi, 1, 1, 0xFFFE),
            encode(Opcode::Sw, 2, 1, 0),
        ]);
        let mut regs = RegisterFile::default();
        for _ in 0..3 {
            step_one(&mut regs, &mut mapper).expect("setup steps");
        }
        let before = regs;
        assert_eq!(
            step_one(&mut regs, &mut mapper),
            Err(CoreFault::Memory(MemoryFault::OutOfBounds {
                address: DEFAULT_RAM_SIZE - 2,
                size: 4
            }))
        );
        assert_eq!(regs, before);
        assert_eq!(mapper.peek(DEFAULT_RAM_SIZE - 2, 2), Ok(0));
    }

    #[test]
    fn misaligned_pc_faults_before_fetch() {
        let mut mapper = mapper_with(&[0]);
        assert_eq!(
            fetch(2, &mut mapper),
            Err(CoreFault::MisalignedFetch { pc: 2 })
        );
    }
}
