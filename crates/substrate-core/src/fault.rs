use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Memory access failure raised by the mapper.
///
/// A memory fault never aborts a pass: the stepping core converts it into a
/// core-local [`CoreFault::Memory`] and moves to the error state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error, Serialize, Deserialize)]
pub enum MemoryFault {
    /// Access landed in unmapped space or crossed a region boundary.
    #[error("access of {size} byte(s) at {address:#x} is outside every mapped region")]
    OutOfBounds {
        /// First byte of the attempted access.
        address: u64,
        /// Width of the attempted access in bytes.
        size: u8,
    },
    /// Access width is not one of 1, 2, 4 or 8 bytes.
    #[error("unsupported access width of {0} byte(s)")]
    UnsupportedWidth(u8),
    /// Host image copy does not fit inside a single mapped region.
    #[error("image of {len} byte(s) at {address:#x} does not fit a single mapped region")]
    ImageOutOfBounds {
        /// First byte of the image destination.
        address: u64,
        /// Image length in bytes.
        len: u64,
    },
}

/// Fault classes used for diagnostics aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultClass {
    /// Data or fetch access violated the memory map.
    Memory,
    /// Decoder rejected an instruction word.
    Decode,
}

/// Core-local execution fault.
///
/// Recorded on the faulting core and surfaced through pass results; it is
/// never propagated to other cores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error, Serialize, Deserialize)]
pub enum CoreFault {
    /// Load, store or fetch raised a memory fault.
    #[error("memory fault: {0}")]
    Memory(#[from] MemoryFault),
    /// Fetched word does not decode to an assigned opcode.
    #[error("illegal instruction {word:#010x} at pc {pc:#x}")]
    IllegalInstruction {
        /// Program counter of the offending fetch.
        pc: u32,
        /// Raw instruction word.
        word: u32,
    },
    /// Program counter is not aligned to the instruction width.
    #[error("misaligned instruction fetch at pc {pc:#x}")]
    MisalignedFetch {
        /// Offending program counter.
        pc: u32,
    },
}

impl CoreFault {
    /// Returns the diagnostics class of this fault.
    #[must_use]
    pub const fn class(self) -> FaultClass {
        match self {
            Self::Memory(_) | Self::MisalignedFetch { .. } => FaultClass::Memory,
            Self::IllegalInstruction { .. } => FaultClass::Decode,
        }
    }

    /// Stable single-byte code used by compact diagnostics.
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::Memory(MemoryFault::OutOfBounds { .. }) => 0x01,
            Self::Memory(MemoryFault::UnsupportedWidth(_)) => 0x02,
            Self::IllegalInstruction { .. } => 0x03,
            Self::MisalignedFetch { .. } => 0x04,
            Self::Memory(MemoryFault::ImageOutOfBounds { .. }) => 0x05,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{CoreFault, FaultClass, MemoryFault};

    #[test]
    fn memory_fault_converts_into_core_fault() {
        let fault = MemoryFault::OutOfBounds {
            address: 0x10,
            size: 4,
        };
        assert_eq!(CoreFault::from(fault), CoreFault::Memory(fault));
    }

    #[test]
    fn class_mapping_matches_fault_taxonomy() {
        assert_eq!(
            CoreFault::Memory(MemoryFault::UnsupportedWidth(3)).class(),
            FaultClass::Memory
        );
        assert_eq!(
            CoreFault::MisalignedFetch { pc: 2 }.class(),
            FaultClass::Memory
        );
        assert_eq!(
            CoreFault::IllegalInstruction { pc: 0, word: 0 }.class(),
            FaultClass::Decode
        );
    }

    #[test]
    fn fault_codes_are_distinct() {
        let codes = [
            CoreFault::Memory(MemoryFault::OutOfBounds {
                address: 0,
                size: 1,
            })
            .code(),
            CoreFault::Memory(MemoryFault::UnsupportedWidth(3)).code(),
            CoreFault::IllegalInstruction { pc: 0, word: 0 }.code(),
            CoreFault::MisalignedFetch { pc: 1 }.code(),
            CoreFault::Memory(MemoryFault::ImageOutOfBounds { address: 0, len: 1 }).code(),
        ];
        let mut sorted = codes;
        sorted.sort_unstable();
        assert_eq!(sorted, [0x01, 0x02, 0x03, 0x04, 0x05]);
    }

    #[test]
    fn out_of_bounds_message_names_address_and_width() {
        let fault = MemoryFault::OutOfBounds {
            address: 0xdead,
            size: 2,
        };
        assert_eq!(
            fault.to_string(),
            "access of 2 byte(s) at 0xdead is outside every mapped region"
        );
    }

    #[test]
    fn image_fault_reports_full_length() {
        let fault = MemoryFault::ImageOutOfBounds {
            address: 0x10,
            len: 4096,
        };
        assert_eq!(
            fault.to_string(),
            "image of 4096 byte(s) at 0x10 does not fit a single mapped region"
        );
        assert_eq!(CoreFault::from(fault).class(), FaultClass::Memory);
    }
}
