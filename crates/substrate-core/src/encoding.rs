/// Width of one instruction word in bytes.
pub const INSTRUCTION_BYTES: u32 = 4;

/// Word that marks a program as inert. Its opcode is unassigned, so an inert
/// program would fault on its first step if it were ever scheduled.
pub const INERT_MARKER_WORD: u32 = 0xFE00_0000;

/// Operand layout of an opcode; fields outside the layout must be zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperandFormat {
    /// No operands (`NOP`, `HALT`).
    Bare,
    /// `rd, imm`.
    RegImm,
    /// `rd, ra`.
    RegReg,
    /// `rd, ra, rb` with `rb` in the low nibble of `imm`.
    RegRegReg,
    /// `rd, ra, imm`.
    RegRegImm,
    /// `imm` only.
    Imm,
}

/// Assigned opcodes of the reference instruction set (`op` field, bits 31..24).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Opcode {
    /// No operation.
    Nop = 0x00,
    /// Stop the core.
    Halt = 0x01,
    /// `rd = zext(imm)`.
    Li = 0x10,
    /// `rd = (imm << 16) | (rd & 0xFFFF)`.
    Lui = 0x11,
    /// `rd = ra`.
    Mov = 0x12,
    /// `rd = ra + rb`, wrapping.
    Add = 0x20,
    /// `rd = ra - rb`, wrapping.
    Sub = 0x21,
    /// `rd = ra & rb`.
    And = 0x22,
    /// `rd = ra | rb`.
    Or = 0x23,
    /// `rd = ra ^ rb`.
    Xor = 0x24,
    /// `rd = ra << (rb & 31)`.
    Shl = 0x25,
    /// `rd = ra >> (rb & 31)`, logical.
    Shr = 0x26,
    /// `rd = ra * rb`, wrapping.
    Mul = 0x27,
    /// `rd = ra + sext(imm)`, wrapping.
    Addi = 0x28,
    /// `rd = zext(mem8[ra + sext(imm)])`.
    Lb = 0x30,
    /// `rd = zext(mem16[ra + sext(imm)])`.
    Lh = 0x31,
    /// `rd = mem32[ra + sext(imm)]`.
    Lw = 0x32,
    /// `mem8[ra + sext(imm)] = rd`.
    Sb = 0x38,
    /// `mem16[ra + sext(imm)] = rd`.
    Sh = 0x39,
    /// `mem32[ra + sext(imm)] = rd`.
    Sw = 0x3A,
    /// `pc += sext(imm) * 4`.
    Jmp = 0x40,
    /// Branch when `rd == ra`.
    Beq = 0x41,
    /// Branch when `rd != ra`.
    Bne = 0x42,
    /// Branch when `rd < ra`, unsigned.
    Bltu = 0x43,
}

/// Single source-of-truth opcode table.
///
/// Any `op` byte not present here is illegal by definition.
pub const OPCODE_TABLE: &[(u8, Opcode)] = &[
    (0x00, Opcode::Nop),
    (0x01, Opcode::Halt),
    (0x10, Opcode::Li),
    (0x11, Opcode::Lui),
    (0x12, Opcode::Mov),
    (0x20, Opcode::Add),
    (0x21, Opcode::Sub),
    (0x22, Opcode::And),
    (0x23, Opcode::Or),
    (0x24, Opcode::Xor),
    (0x25, Opcode::Shl),
    (0x26, Opcode::Shr),
    (0x27, Opcode::Mul),
    (0x28, Opcode::Addi),
    (0x30, Opcode::Lb),
    (0x31, Opcode::Lh),
    (0x32, Opcode::Lw),
    (0x38, Opcode::Sb),
    (0x39, Opcode::Sh),
    (0x3A, Opcode::Sw),
    (0x40, Opcode::Jmp),
    (0x41, Opcode::Beq),
    (0x42, Opcode::Bne),
    (0x43, Opcode::Bltu),
];

impl Opcode {
    /// Operand layout enforced by the decoder.
    #[must_use]
    pub const fn format(self) -> OperandFormat {
        match self {
            Self::Nop | Self::Halt => OperandFormat::Bare,
            Self::Li | Self::Lui => OperandFormat::RegImm,
            Self::Mov => OperandFormat::RegReg,
            Self::Add
            | Self::Sub
            | Self::And
            | Self::Or
            | Self::Xor
            | Self::Shl
            | Self::Shr
            | Self::Mul => OperandFormat::RegRegReg,
            Self::Addi
            | Self::Lb
            | Self::Lh
            | Self::Lw
            | Self::Sb
            | Self::Sh
            | Self::Sw
            | Self::Beq
            | Self::Bne
            | Self::Bltu => OperandFormat::RegRegImm,
            Self::Jmp => OperandFormat::Imm,
        }
    }

    /// Access width in bytes for loads and stores.
    #[must_use]
    pub const fn access_width(self) -> Option<u8> {
        match self {
            Self::Lb | Self::Sb => Some(1),
            Self::Lh | Self::Sh => Some(2),
            Self::Lw | Self::Sw => Some(4),
            _ => None,
        }
    }
}

/// Returns the assigned opcode for an `op` byte, `None` when unassigned.
#[must_use]
pub fn classify_opcode(op: u8) -> Option<Opcode> {
    OPCODE_TABLE
        .iter()
        .find_map(|(entry, opcode)| (*entry == op).then_some(*opcode))
}

/// Splits a word into `(op, rd, ra, imm)`.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub const fn decode_fields(word: u32) -> (u8, u8, u8, u16) {
    (
        (word >> 24) as u8,
        ((word >> 20) & 0xF) as u8,
        ((word >> 16) & 0xF) as u8,
        (word & 0xFFFF) as u16,
    )
}

/// Packs an instruction word. Register fields are masked to four bits.
#[must_use]
#[allow(clippy::cast_lossless)]
pub const fn encode(opcode: Opcode, rd: u8, ra: u8, imm: u16) -> u32 {
    ((opcode as u32) << 24) | (((rd & 0xF) as u32) << 20) | (((ra & 0xF) as u32) << 16) | imm as u32
}

/// Serializes instruction words into a little-endian program image.
#[must_use]
pub fn program_bytes(words: &[u32]) -> Vec<u8> {
    words.iter().flat_map(|word| word.to_le_bytes()).collect()
}

/// Reads the first instruction word of a program image, if it has one.
#[must_use]
pub fn first_word(program: &[u8]) -> Option<u32> {
    let bytes: [u8; 4] = program.get(..4)?.try_into().ok()?;
    Some(u32::from_le_bytes(bytes))
}
