//! Core register and lifecycle state.

/// Core lifecycle state machine.
pub mod lifecycle;
/// Register file types and storage model.
pub mod registers;

pub use lifecycle::LifecycleState;
pub use registers::{Register, RegisterFile, REGISTER_COUNT};
