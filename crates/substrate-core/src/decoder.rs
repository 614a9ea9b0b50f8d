use thiserror::Error;

use crate::encoding::{classify_opcode, decode_fields, encode, Opcode, OperandFormat};
use crate::Register;

/// Reason a word failed to decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum DecodeError {
    /// The `op` byte is not in the opcode table.
    #[error("unassigned opcode {0:#04x}")]
    UnassignedOpcode(u8),
    /// A field the opcode does not use is nonzero.
    #[error("nonzero unused field for {0:?}")]
    UnusedFieldSet(Opcode),
}

/// Fully validated instruction ready for execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Instruction {
    /// Operation.
    pub opcode: Opcode,
    /// Destination, or first comparand for branches, or source for stores.
    pub rd: Register,
    /// First source, or base address register.
    pub ra: Register,
    /// Second source (low nibble of `imm`).
    pub rb: Register,
    /// Raw 16-bit immediate.
    pub imm: u16,
}

impl Instruction {
    /// Immediate sign-extended to 32 bits.
    #[must_use]
    #[allow(clippy::cast_possible_wrap, clippy::cast_lossless)]
    pub const fn simm(self) -> i32 {
        self.imm as i16 as i32
    }

    /// Re-encodes this instruction to its 32-bit word.
    #[must_use]
    pub const fn encode(self) -> u32 {
        encode(self.opcode, self.rd as u8, self.ra as u8, self.imm)
    }
}

/// Instruction decoder for the reference instruction set.
pub struct Decoder;

impl Decoder {
    /// Decodes a 32-bit instruction word.
    ///
    /// Rejects unassigned opcodes and any nonzero field outside the opcode's
    /// operand format, so every accepted word re-encodes to itself.
    ///
    /// # Errors
    ///
    /// Returns a [`DecodeError`] describing why the word is illegal.
    pub fn decode(word: u32) -> Result<Instruction, DecodeError> {
        let (op, rd_bits, ra_bits, imm) = decode_fields(word);
        let opcode = classify_opcode(op).ok_or(DecodeError::UnassignedOpcode(op))?;

        let unused = match opcode.format() {
            OperandFormat::Bare => rd_bits != 0 || ra_bits != 0 || imm != 0,
            OperandFormat::RegImm => ra_bits != 0,
            OperandFormat::RegReg => imm != 0,
            OperandFormat::RegRegReg => imm & 0xFFF0 != 0,
            OperandFormat::RegRegImm => false,
            OperandFormat::Imm => rd_bits != 0 || ra_bits != 0,
        };
        if unused {
            return Err(DecodeError::UnusedFieldSet(opcode));
        }

        #[allow(clippy::cast_possible_truncation)]
        let rb_bits = (imm & 0xF) as u8;
        let register =
            |bits: u8| Register::from_u4(bits).ok_or(DecodeError::UnusedFieldSet(opcode));
        Ok(Instruction {
            opcode,
            rd: register(rd_bits)?,
            ra: register(ra_bits)?,
            rb: register(rb_bits)?,
            imm,
        })
    }
}
