//! Registration-time integrity validation.
//!
//! Validation is deterministic and content-addressed: identical program
//! bytes with identical metadata always produce the same outcome.

use serde::{Deserialize, Serialize};

use crate::encoding::{first_word, INERT_MARKER_WORD};
use crate::ValidationError;

/// Width in bytes of one row of the symmetry tile.
pub const TILE_WIDTH: usize = 8;

const FNV_OFFSET_BASIS: u32 = 0x811C_9DC5;
const FNV_PRIME: u32 = 0x0100_0193;

/// 32-bit FNV-1a digest used as the program signature.
#[must_use]
pub fn fnv1a32(bytes: &[u8]) -> u32 {
    bytes.iter().fold(FNV_OFFSET_BASIS, |hash, byte| {
        (hash ^ u32::from(*byte)).wrapping_mul(FNV_PRIME)
    })
}

/// Selects tile columns that must fold to zero; bit `i` selects column `i`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SymmetryMask(pub u8);

impl SymmetryMask {
    /// Mask selecting every column.
    pub const ALL: Self = Self(0xFF);

    /// Returns `true` when column `column` is selected.
    #[must_use]
    pub const fn selects(self, column: usize) -> bool {
        column < TILE_WIDTH && self.0 & (1 << column) != 0
    }
}

/// Host-supplied integrity metadata for a program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgramMetadata {
    /// Expected FNV-1a-32 digest of the program bytes.
    pub signature: Option<u32>,
    /// Mask for the secondary symmetry check of a partial program.
    pub symmetry_mask: Option<SymmetryMask>,
}

impl ProgramMetadata {
    /// Metadata without signature or mask.
    #[must_use]
    pub const fn unsigned() -> Self {
        Self {
            signature: None,
            symmetry_mask: None,
        }
    }

    /// Metadata carrying the correct signature for `program`.
    #[must_use]
    pub fn signed_for(program: &[u8]) -> Self {
        Self {
            signature: Some(fnv1a32(program)),
            symmetry_mask: None,
        }
    }

    /// Metadata requesting the symmetry check under `mask`.
    #[must_use]
    pub const fn partial(mask: SymmetryMask) -> Self {
        Self {
            signature: None,
            symmetry_mask: Some(mask),
        }
    }
}

/// Validator policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidatorConfig {
    /// Treat programs without signature or mask as non-resonant.
    pub require_signature: bool,
}

/// Outcome of validating a program against its metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationOutcome {
    /// Unconditionally executable.
    #[default]
    Resonant,
    /// Inert or untrusted; never executes.
    NonResonant,
    /// Executable only if the symmetry check under the mask passes.
    Partial(SymmetryMask),
}

impl ValidationOutcome {
    /// Error reported when a program with this outcome is not cleared.
    #[must_use]
    pub const fn rejection(self) -> ValidationError {
        match self {
            Self::Partial(_) => ValidationError::Fraud,
            Self::Resonant | Self::NonResonant => ValidationError::NonResonant,
        }
    }
}

/// Returns `true` when every masked column of the program tile XOR-folds to
/// zero. The tile is [`TILE_WIDTH`] bytes wide; the last row is zero-padded.
#[must_use]
pub fn check_symmetry(program: &[u8], mask: SymmetryMask) -> bool {
    column_parity(program)
        .iter()
        .enumerate()
        .all(|(column, parity)| !mask.selects(column) || *parity == 0)
}

/// Pads `program` to whole tile rows and appends the parity row that makes
/// it pass [`check_symmetry`] under `mask`.
#[must_use]
pub fn seal(program: &[u8], mask: SymmetryMask) -> Vec<u8> {
    let rows = program.len().div_ceil(TILE_WIDTH);
    let mut sealed = Vec::with_capacity((rows + 1) * TILE_WIDTH);
    sealed.extend_from_slice(program);
    sealed.resize(rows * TILE_WIDTH, 0);
    let parity = column_parity(program);
    sealed.extend((0..TILE_WIDTH).map(|column| {
        if mask.selects(column) {
            parity[column]
        } else {
            0
        }
    }));
    sealed
}

fn column_parity(program: &[u8]) -> [u8; TILE_WIDTH] {
    let mut parity = [0_u8; TILE_WIDTH];
    for row in program.chunks(TILE_WIDTH) {
        for (column, byte) in row.iter().enumerate() {
            parity[column] ^= byte;
        }
    }
    parity
}

/// Integrity validator applied once per registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IntegrityValidator {
    config: ValidatorConfig,
}

impl IntegrityValidator {
    /// Creates a validator with the given policy.
    #[must_use]
    pub const fn new(config: ValidatorConfig) -> Self {
        Self { config }
    }

    /// Active policy.
    #[must_use]
    pub const fn config(&self) -> ValidatorConfig {
        self.config
    }

    /// Classifies `program` under `metadata`.
    ///
    /// Rules apply in order: empty or inert programs are non-resonant; a
    /// signature decides alone; a mask yields [`ValidationOutcome::Partial`];
    /// anything else is resonant unless the policy requires a signature.
    #[must_use]
    pub fn validate(&self, program: &[u8], metadata: &ProgramMetadata) -> ValidationOutcome {
        if program.is_empty() || first_word(program) == Some(INERT_MARKER_WORD) {
            return ValidationOutcome::NonResonant;
        }
        if let Some(signature) = metadata.signature {
            return if signature == fnv1a32(program) {
                ValidationOutcome::Resonant
            } else {
                ValidationOutcome::NonResonant
            };
        }
        if let Some(mask) = metadata.symmetry_mask {
            return ValidationOutcome::Partial(mask);
        }
        if self.config.require_signature {
            ValidationOutcome::NonResonant
        } else {
            ValidationOutcome::Resonant
        }
    }

    /// Decides whether a program with `outcome` may execute.
    #[must_use]
    #[allow(clippy::unused_self)]
    pub fn clears(&self, outcome: ValidationOutcome, program: &[u8]) -> bool {
        match outcome {
            ValidationOutcome::Resonant => true,
            ValidationOutcome::NonResonant => false,
            ValidationOutcome::Partial(mask) => check_symmetry(program, mask),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{
        check_symmetry, fnv1a32, seal, IntegrityValidator, ProgramMetadata, SymmetryMask,
        ValidationOutcome, ValidatorConfig, TILE_WIDTH,
    };
    use crate::encoding::{encode, program_bytes, Opcode, INERT_MARKER_WORD};
    use crate::ValidationError;
    use proptest::prelude::*;
    use rstest::rstest;

    fn halting_program() -> Vec<u8> {
        program_bytes(&[
            encode(Opcode::Li, 1, 0, 1),
            encode(Opcode::Addi, 1, 1, 1),
            encode(Opcode::Halt, 0, 0, 0),
        ])
    }

    #[test]
    fn fnv1a32_matches_reference_vectors() {
        assert_eq!(fnv1a32(b""), 0x811C_9DC5);
        assert_eq!(fnv1a32(b"a"), 0xE40C_292C);
        assert_eq!(fnv1a32(b"foobar"), 0xBF9C_F968);
    }

    #[rstest]
    #[case(ProgramMetadata::unsigned(), ValidationOutcome::Resonant)]
    #[case(ProgramMetadata { signature: Some(0), symmetry_mask: None }, ValidationOutcome::NonResonant)]
    #[case(ProgramMetadata::partial(SymmetryMask(0x0F)), ValidationOutcome::Partial(SymmetryMask(0x0F)))]
    fn outcome_follows_metadata(#[case] metadata: ProgramMetadata, #[case] expected: ValidationOutcome) {
        let validator = IntegrityValidator::default();
        assert_eq!(validator.validate(&halting_program(), &metadata), expected);
    }

    #[test]
    fn correct_signature_overrides_mask() {
        let program = halting_program();
        let metadata = ProgramMetadata {
            symmetry_mask: Some(SymmetryMask::ALL),
            ..ProgramMetadata::signed_for(&program)
        };
        assert_eq!(
            IntegrityValidator::default().validate(&program, &metadata),
            ValidationOutcome::Resonant
        );
    }

    #[test]
    fn empty_and_inert_programs_are_non_resonant() {
        let validator = IntegrityValidator::default();
        let inert = program_bytes(&[INERT_MARKER_WORD]);
        assert_eq!(
            validator.validate(&[], &ProgramMetadata::unsigned()),
            ValidationOutcome::NonResonant
        );
        assert_eq!(
            validator.validate(&inert, &ProgramMetadata::signed_for(&inert)),
            ValidationOutcome::NonResonant
        );
    }

    #[test]
    fn signing_policy_rejects_bare_programs() {
        let validator = IntegrityValidator::new(ValidatorConfig {
            require_signature: true,
        });
        let program = halting_program();
        let bare = validator.validate(&program, &ProgramMetadata::unsigned());
        assert_eq!(bare, ValidationOutcome::NonResonant);
        assert!(!validator.clears(bare, &program));
        assert_eq!(bare.rejection(), ValidationError::NonResonant);

        let signed = validator.validate(&program, &ProgramMetadata::signed_for(&program));
        assert_eq!(signed, ValidationOutcome::Resonant);
        assert!(validator.clears(signed, &program));
    }

    #[test]
    fn symmetry_check_folds_columns() {
        let mut tile = vec![0_u8; 16];
        tile[0] = 0xAA;
        tile[8] = 0xAA;
        tile[3] = 0x01;
        assert!(check_symmetry(&tile, SymmetryMask(0b0000_0001)));
        assert!(!check_symmetry(&tile, SymmetryMask(0b0000_1001)));
        assert!(check_symmetry(&tile, SymmetryMask(0)));
    }

    #[test]
    fn unsealed_partial_program_is_fraud_and_sealed_one_clears() {
        let validator = IntegrityValidator::default();
        let program = halting_program();
        let metadata = ProgramMetadata::partial(SymmetryMask::ALL);
        let outcome = validator.validate(&program, &metadata);
        assert!(!validator.clears(outcome, &program));
        assert_eq!(outcome.rejection(), ValidationError::Fraud);

        let sealed = seal(&program, SymmetryMask::ALL);
        assert_eq!(sealed.len() % TILE_WIDTH, 0);
        assert_eq!(&sealed[..program.len()], program.as_slice());
        let outcome = validator.validate(&sealed, &metadata);
        assert_eq!(outcome, ValidationOutcome::Partial(SymmetryMask::ALL));
        assert!(validator.clears(outcome, &sealed));
    }

    proptest! {
        #[test]
        fn sealing_always_passes_its_mask(program in prop::collection::vec(any::<u8>(), 0..64), mask in any::<u8>()) {
            prop_assert!(check_symmetry(&seal(&program, SymmetryMask(mask)), SymmetryMask(mask)));
        }

        #[test]
        fn validation_is_deterministic(program in prop::collection::vec(any::<u8>(), 0..64), mask in any::<u8>()) {
            let validator = IntegrityValidator::default();
            let metadata = ProgramMetadata::partial(SymmetryMask(mask));
            let first = validator.validate(&program, &metadata);
            prop_assert_eq!(first, validator.validate(&program, &metadata));
            prop_assert_eq!(
                validator.clears(first, &program),
                validator.clears(first, &program)
            );
        }
    }
}
