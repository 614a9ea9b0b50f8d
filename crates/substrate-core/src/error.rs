//! Registry, layout, persistence and configuration error types.

use thiserror::Error;

use crate::CoreId;

/// Integrity validation failure recorded for a core created in the fraud state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum ValidationError {
    /// Program is inert, unsigned under a signing policy, or its signature
    /// does not match its bytes.
    #[error("program is non-resonant")]
    NonResonant,
    /// Partial program failed the symmetry-mask integrity check.
    #[error("program failed the symmetry integrity check")]
    Fraud,
}

/// Failure returned by core registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum RegisterError {
    /// Validation failed; the core exists at the position in the fraud state.
    #[error("core {id} registered in fraud state: {error}")]
    Validation {
        /// Id of the fraud core now occupying the position.
        id: CoreId,
        /// Validation failure cause.
        error: ValidationError,
    },
    /// Program image does not fit the RAM region. No core was created and the
    /// prior occupant, if any, is untouched.
    #[error("program of {len} bytes exceeds ram capacity of {capacity} bytes")]
    ProgramTooLarge {
        /// Program length in bytes.
        len: usize,
        /// RAM region size in bytes.
        capacity: usize,
    },
    /// Every core id has been handed out; ids are never reused.
    #[error("core id space exhausted")]
    IdSpaceExhausted,
}

impl RegisterError {
    /// Returns the id of the core created by the failed registration, if any.
    #[must_use]
    pub const fn core_id(&self) -> Option<CoreId> {
        match self {
            Self::Validation { id, .. } => Some(*id),
            Self::ProgramTooLarge { .. } | Self::IdSpaceExhausted => None,
        }
    }
}

/// Failure of a control call addressed by core id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum RegistryError {
    /// No live core carries this id.
    #[error("unknown core {0}")]
    UnknownCore(CoreId),
}

/// Memory layout construction failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum LayoutError {
    /// Region overlaps an already-registered region.
    #[error("region {start:#x}..{end:#x} overlaps region {other_start:#x}..{other_end:#x}")]
    Overlap {
        /// Start of the rejected region.
        start: u64,
        /// Exclusive end of the rejected region.
        end: u64,
        /// Start of the conflicting region.
        other_start: u64,
        /// Exclusive end of the conflicting region.
        other_end: u64,
    },
    /// Region has zero length or its end would pass `u64::MAX`.
    #[error("region starting at {start:#x} is empty or unbounded")]
    EmptyRegion {
        /// Start of the rejected region.
        start: u64,
    },
    /// Region is larger than the table is willing to allocate.
    #[error("region starting at {start:#x} of {size} bytes is too large")]
    RegionTooLarge {
        /// Start of the rejected region.
        start: u64,
        /// Requested size in bytes.
        size: u64,
    },
    /// A second console or framebuffer region was requested.
    #[error("mapper already owns a {0} device region")]
    DuplicateDevice(&'static str),
    /// Framebuffer region size does not equal `width * height * 4`.
    #[error("framebuffer of {width}x{height} needs {expected} bytes, region has {actual}")]
    FramebufferSize {
        /// Framebuffer width in pixels.
        width: u32,
        /// Framebuffer height in pixels.
        height: u32,
        /// Required byte size.
        expected: u64,
        /// Region byte size.
        actual: u64,
    },
    /// The layout has no RAM region to load programs into.
    #[error("layout has no ram region")]
    MissingRam,
}

/// Snapshot encode/decode failure.
///
/// Decoding is all-or-nothing: on any of these errors the registry keeps its
/// prior state.
#[derive(Debug, Error)]
pub enum SerializationError {
    /// Snapshot could not be encoded.
    #[error("snapshot encode failed: {0}")]
    Encode(#[source] serde_json::Error),
    /// Snapshot bytes are not a well-formed snapshot document.
    #[error("snapshot decode failed: {0}")]
    Decode(#[source] serde_json::Error),
    /// Snapshot schema version is not understood.
    #[error("unsupported snapshot version {0}")]
    UnsupportedVersion(u16),
    /// Snapshot was taken under a different memory layout.
    #[error("snapshot memory layout does not match the configured layout")]
    LayoutMismatch,
    /// Snapshot is well-formed but violates a registry invariant.
    #[error("corrupt snapshot: {0}")]
    Corrupt(String),
}

/// Configuration loading failure.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Configuration text is not valid TOML for the configuration schema.
    #[error("config parse failed: {0}")]
    Parse(#[from] toml::de::Error),
    /// Configured memory layout is inconsistent.
    #[error("invalid memory layout: {0}")]
    Layout(#[from] LayoutError),
    /// A scheduler or device parameter is out of range.
    #[error("invalid config value for {field}: {reason}")]
    Value {
        /// Offending field name.
        field: &'static str,
        /// Why the value was rejected.
        reason: &'static str,
    },
}

#[cfg(test)]
mod tests {
    use super::{RegisterError, ValidationError};
    use crate::CoreId;

    #[test]
    fn validation_error_carries_fraud_core_id() {
        let err = RegisterError::Validation {
            id: CoreId::new(7),
            error: ValidationError::Fraud,
        };
        assert_eq!(err.core_id(), Some(CoreId::new(7)));
        assert_eq!(
            err.to_string(),
            "core #7 registered in fraud state: program failed the symmetry integrity check"
        );
    }

    #[test]
    fn oversize_program_creates_no_core() {
        let err = RegisterError::ProgramTooLarge {
            len: 10,
            capacity: 4,
        };
        assert_eq!(err.core_id(), None);
    }
}
