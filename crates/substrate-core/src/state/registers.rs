use serde::{Deserialize, Serialize};

/// Number of general-purpose registers (`R0..R15`).
pub const REGISTER_COUNT: usize = 16;

/// General-purpose register identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
#[allow(missing_docs)]
pub enum Register {
    R0 = 0,
    R1 = 1,
    R2 = 2,
    R3 = 3,
    R4 = 4,
    R5 = 5,
    R6 = 6,
    R7 = 7,
    R8 = 8,
    R9 = 9,
    R10 = 10,
    R11 = 11,
    R12 = 12,
    R13 = 13,
    R14 = 14,
    R15 = 15,
}

impl Register {
    /// Ordered list of all registers.
    pub const ALL: [Self; REGISTER_COUNT] = [
        Self::R0,
        Self::R1,
        Self::R2,
        Self::R3,
        Self::R4,
        Self::R5,
        Self::R6,
        Self::R7,
        Self::R8,
        Self::R9,
        Self::R10,
        Self::R11,
        Self::R12,
        Self::R13,
        Self::R14,
        Self::R15,
    ];

    /// Returns the array index for this register (`0..=15`).
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Decodes a 4-bit register field. Higher bits must be clear.
    #[must_use]
    pub const fn from_u4(bits: u8) -> Option<Self> {
        if bits as usize >= REGISTER_COUNT {
            return None;
        }
        Some(Self::ALL[bits as usize])
    }
}

/// Register file plus program counter of one core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RegisterFile {
    gpr: [u32; REGISTER_COUNT],
    pc: u32,
}

impl RegisterFile {
    /// Register file with every register zeroed and `pc` at `entry`.
    #[must_use]
    pub const fn at_entry(entry: u32) -> Self {
        Self {
            gpr: [0; REGISTER_COUNT],
            pc: entry,
        }
    }

    /// Reads a general-purpose register.
    #[must_use]
    pub const fn get(&self, reg: Register) -> u32 {
        self.gpr[reg.index()]
    }

    /// Writes a general-purpose register.
    pub const fn set(&mut self, reg: Register, value: u32) {
        self.gpr[reg.index()] = value;
    }

    /// Reads the program counter.
    #[must_use]
    pub const fn pc(&self) -> u32 {
        self.pc
    }

    /// Writes the program counter.
    pub const fn set_pc(&mut self, value: u32) {
        self.pc = value;
    }

    /// Copy of all general-purpose registers in index order.
    #[must_use]
    pub const fn values(&self) -> [u32; REGISTER_COUNT] {
        self.gpr
    }

    /// Replaces all general-purpose registers.
    pub const fn set_values(&mut self, values: [u32; REGISTER_COUNT]) {
        self.gpr = values;
    }
}

#[cfg(test)]
mod tests {
    use super::{Register, RegisterFile, REGISTER_COUNT};

    #[test]
    fn register_indices_follow_declaration_order() {
        for (index, reg) in Register::ALL.iter().enumerate() {
            assert_eq!(reg.index(), index);
            assert_eq!(Register::from_u4(u8::try_from(index).unwrap()), Some(*reg));
        }
        assert_eq!(Register::from_u4(16), None);
        assert_eq!(Register::ALL.len(), REGISTER_COUNT);
    }

    #[test]
    fn register_file_starts_zeroed_at_entry() {
        let mut regs = RegisterFile::at_entry(0x40);
        assert_eq!(regs.pc(), 0x40);
        assert!(regs.values().iter().all(|value| *value == 0));
        regs.set(Register::R15, 7);
        assert_eq!(regs.get(Register::R15), 7);
        assert_eq!(regs.values()[15], 7);
    }
}
