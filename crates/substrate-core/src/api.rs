//! Public host-facing API contracts for driving the substrate.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{CoreFault, LifecycleState, ValidationOutcome, REGISTER_COUNT};

/// Default cycle budget for one pass when the host does not supply one.
pub const DEFAULT_PASS_BUDGET_CYCLES: u64 = 10_000;

/// Spatial coordinate a core is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    /// Horizontal grid coordinate.
    pub x: i32,
    /// Vertical grid coordinate.
    pub y: i32,
}

impl Position {
    /// Creates a position from grid coordinates.
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Squared euclidean distance to `(cx, cy)`, saturating at `u64::MAX`.
    #[must_use]
    pub const fn distance_squared(self, cx: i32, cy: i32) -> u64 {
        let dx = (self.x as i64 - cx as i64).unsigned_abs();
        let dy = (self.y as i64 - cy as i64).unsigned_abs();
        (dx * dx).saturating_add(dy * dy)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

impl From<(i32, i32)> for Position {
    fn from((x, y): (i32, i32)) -> Self {
        Self { x, y }
    }
}

/// Unique, monotonically assigned core identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CoreId(u32);

impl CoreId {
    /// Wraps a raw id value.
    #[must_use]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the raw id value.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for CoreId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Opaque renderer-side handle attached to a core by the host.
///
/// Never serialized; hosts re-attach handles after a snapshot restore.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExternalHandleId(pub u64);

/// Logical timestamp: sequence number of the pass that last executed a core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PassStamp(pub u64);

/// Budget granted to one execution pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CycleBudget {
    /// Total cycles shared across every visible running core.
    pub cycles: u64,
    /// Soft wall-clock cap for the whole pass, sampled periodically.
    pub time: Option<Duration>,
}

impl CycleBudget {
    /// Cycle-only budget without a wall-clock cap.
    #[must_use]
    pub const fn cycles(cycles: u64) -> Self {
        Self { cycles, time: None }
    }

    /// Adds a soft wall-clock cap to this budget.
    #[must_use]
    pub const fn with_time_limit(mut self, limit: Duration) -> Self {
        self.time = Some(limit);
        self
    }
}

impl Default for CycleBudget {
    fn default() -> Self {
        Self::cycles(DEFAULT_PASS_BUDGET_CYCLES)
    }
}

/// Host-supplied visible rectangle in grid coordinates (inclusive bounds).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Viewport {
    /// Left edge.
    pub min_x: i32,
    /// Top edge.
    pub min_y: i32,
    /// Right edge.
    pub max_x: i32,
    /// Bottom edge.
    pub max_y: i32,
}

impl Viewport {
    /// Builds a viewport from two corners in any order.
    #[must_use]
    pub fn from_corners(a: Position, b: Position) -> Self {
        Self {
            min_x: a.x.min(b.x),
            min_y: a.y.min(b.y),
            max_x: a.x.max(b.x),
            max_y: a.y.max(b.y),
        }
    }

    /// Centre of the rectangle, rounded toward negative infinity.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn center(&self) -> (i32, i32) {
        let cx = (i64::from(self.min_x) + i64::from(self.max_x)).div_euclid(2);
        let cy = (i64::from(self.min_y) + i64::from(self.max_y)).div_euclid(2);
        (cx as i32, cy as i32)
    }

    /// Returns `true` when `pos` lies inside the rectangle expanded by
    /// `padding` on every side. Points on the padded edge are inside.
    #[must_use]
    pub fn contains_padded(&self, pos: Position, padding: u32) -> bool {
        let pad = i64::from(padding);
        let (x, y) = (i64::from(pos.x), i64::from(pos.y));
        x >= i64::from(self.min_x) - pad
            && x <= i64::from(self.max_x) + pad
            && y >= i64::from(self.min_y) - pad
            && y <= i64::from(self.max_y) + pad
    }
}

/// Order in which a pass visits cores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriorityMode {
    /// Ascending core id.
    #[default]
    Sequential,
    /// Ascending distance from the viewport centre, ties by ascending id.
    /// Falls back to [`PriorityMode::Sequential`] when no viewport is set.
    ViewportDistance,
}

/// Output status of a single core step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StepOutcome {
    /// Instruction retired; the core can keep running.
    Continue,
    /// Program executed `HALT`.
    Halted,
    /// Instruction raised a core-local fault.
    Faulted(CoreFault),
}

/// Per-core outcome of one execution pass. Transient, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionResult {
    /// Core this result describes.
    pub core_id: CoreId,
    /// Position of the core.
    pub position: Position,
    /// Cycles spent by this core during the pass.
    pub cycles_executed: u64,
    /// Core is stopped (halted or errored) at the end of the pass.
    pub halted: bool,
    /// Core is in the fraud state.
    pub fraud: bool,
    /// Fault cause when the core is in the error state.
    pub faulted: Option<CoreFault>,
    /// Program counter at the end of the pass.
    pub pc: u32,
    /// Lifecycle state at the end of the pass.
    pub state: LifecycleState,
}

/// Read-only copy of one core's host-visible state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreSnapshot {
    /// Core id.
    pub id: CoreId,
    /// Bound position.
    pub position: Position,
    /// Program counter.
    pub pc: u32,
    /// Total cycles executed since registration or reset.
    pub cycles: u64,
    /// Lifecycle state.
    pub state: LifecycleState,
    /// Register file contents.
    pub registers: [u32; REGISTER_COUNT],
    /// Console bytes emitted during the last pass that produced output.
    pub last_output: Option<Vec<u8>>,
    /// Pass that last executed this core.
    pub last_executed_at: Option<PassStamp>,
    /// Fault retained by an errored core.
    pub fault: Option<CoreFault>,
    /// Registration-time validation outcome.
    pub validation: ValidationOutcome,
    /// Host-attached renderer handle.
    pub handle: Option<ExternalHandleId>,
}

#[cfg(test)]
mod tests {
    use super::{CoreId, CycleBudget, Position, Viewport, DEFAULT_PASS_BUDGET_CYCLES};
    use std::time::Duration;

    #[test]
    fn default_budget_has_no_time_cap() {
        let budget = CycleBudget::default();
        assert_eq!(budget.cycles, DEFAULT_PASS_BUDGET_CYCLES);
        assert_eq!(budget.time, None);
        assert_eq!(
            budget.with_time_limit(Duration::from_millis(4)).time,
            Some(Duration::from_millis(4))
        );
    }

    #[test]
    fn distance_squared_handles_extreme_coordinates() {
        let far = Position::new(i32::MIN, i32::MAX);
        let expected = (1_u64 << 62) + ((1_u64 << 31) - 1).pow(2);
        assert_eq!(far.distance_squared(0, 0), expected);
        assert_eq!(far.distance_squared(i32::MAX, i32::MIN), u64::MAX);
        assert_eq!(Position::new(3, 4).distance_squared(0, 0), 25);
    }

    #[test]
    fn viewport_padding_includes_edges() {
        let view = Viewport::from_corners(Position::new(10, 10), Position::new(0, 0));
        assert_eq!(view.min_x, 0);
        assert_eq!(view.max_y, 10);
        assert!(view.contains_padded(Position::new(0, 10), 0));
        assert!(!view.contains_padded(Position::new(-1, 5), 0));
        assert!(view.contains_padded(Position::new(-2, 12), 2));
        assert!(!view.contains_padded(Position::new(13, 5), 2));
    }

    #[test]
    fn viewport_center_rounds_down() {
        let view = Viewport::from_corners(Position::new(-3, -3), Position::new(0, 0));
        assert_eq!(view.center(), (-2, -2));
        let huge = Viewport::from_corners(
            Position::new(i32::MAX, i32::MAX),
            Position::new(i32::MAX - 2, i32::MAX - 2),
        );
        assert_eq!(huge.center(), (i32::MAX - 1, i32::MAX - 1));
    }

    #[test]
    fn core_id_displays_with_hash_prefix() {
        assert_eq!(CoreId::new(42).to_string(), "#42");
        assert_eq!(Position::new(-1, 2).to_string(), "(-1, 2)");
    }
}
