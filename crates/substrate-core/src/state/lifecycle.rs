use serde::{Deserialize, Serialize};

/// Lifecycle of one core.
///
/// `Idle` only exists during registration. `Halted` and `Error` leave only
/// through an explicit reset; `Fraud` leaves only through re-registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    /// Registered, not yet scheduled.
    #[default]
    Idle,
    /// Included in execution passes.
    Running,
    /// Suspended by the host; resumable.
    Paused,
    /// Program executed `HALT`.
    Halted,
    /// Core-local fault stopped execution.
    Error,
    /// Integrity validation failed; never executes.
    Fraud,
}

impl LifecycleState {
    /// Returns `true` for states that pass can advance.
    #[must_use]
    pub const fn is_runnable(self) -> bool {
        matches!(self, Self::Running)
    }

    /// Returns `true` for states that stopped on their own (halt or fault).
    #[must_use]
    pub const fn is_stopped(self) -> bool {
        matches!(self, Self::Halted | Self::Error)
    }

    /// Returns `true` when a host reset may restart the core.
    #[must_use]
    pub const fn can_reset(self) -> bool {
        matches!(self, Self::Halted | Self::Error | Self::Running | Self::Paused)
    }
}
