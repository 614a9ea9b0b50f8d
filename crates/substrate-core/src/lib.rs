//! Spatial execution substrate: many small virtual cores bound to grid
//! positions, each with its own memory map and devices, run cooperatively
//! under a per-frame cycle budget.

/// Host-facing value types shared across the control surface.
pub mod api;
pub use api::{
    CoreId, CoreSnapshot, CycleBudget, ExecutionResult, ExternalHandleId, PassStamp, Position,
    PriorityMode, StepOutcome, Viewport, DEFAULT_PASS_BUDGET_CYCLES,
};

/// Registry, layout, persistence and configuration errors.
pub mod error;
pub use error::{
    ConfigError, LayoutError, RegisterError, RegistryError, SerializationError, ValidationError,
};

/// Core-local fault taxonomy.
pub mod fault;
pub use fault::{CoreFault, FaultClass, MemoryFault};

/// Region table, configurable layout and per-core mapper.
pub mod memory;
pub use memory::{
    is_supported_width, FramebufferSpec, MemoryLayout, MemoryMapper, MemoryRegion,
    RegionDescriptor, RegionHandle, RegionKind, RegionSpec, RegionTable, DEFAULT_CONSOLE_SIZE,
    DEFAULT_CONSOLE_START, DEFAULT_FRAMEBUFFER_HEIGHT, DEFAULT_FRAMEBUFFER_START,
    DEFAULT_FRAMEBUFFER_WIDTH, DEFAULT_RAM_SIZE, DEFAULT_RAM_START, FRAMEBUFFER_BYTES_PER_PIXEL,
    MAX_REGION_BYTES,
};

/// Console and framebuffer devices.
pub mod peripherals;
pub use peripherals::{
    ConsoleConfig, ConsoleDevice, ConsoleImage, DeviceBridge, FramebufferDevice, FramebufferView,
    CONSOLE_INPUT_OFFSET, CONSOLE_OUTPUT_OFFSET, CONSOLE_STATUS_INPUT_AVAILABLE,
    CONSOLE_STATUS_OFFSET, CONSOLE_STATUS_OUTPUT_READY,
};

/// Register file and lifecycle state.
pub mod state;
pub use state::{LifecycleState, Register, RegisterFile, REGISTER_COUNT};

/// Opcode table and instruction word layout.
pub mod encoding;
pub use encoding::{classify_opcode, encode, program_bytes, Opcode, OperandFormat};

/// Instruction word decoding.
pub mod decoder;
pub use decoder::{DecodeError, Decoder, Instruction};

/// Fetch, execute and commit.
pub mod execute;
pub use execute::{commit, execute_instruction, fetch, step_one, Retired};

/// Registration-time integrity validation.
pub mod validator;
pub use validator::{
    check_symmetry, fnv1a32, seal, IntegrityValidator, ProgramMetadata, SymmetryMask,
    ValidationOutcome, ValidatorConfig, TILE_WIDTH,
};

/// TOML configuration.
pub mod config;
pub use config::{SchedulerConfig, SubstrateConfig, DEFAULT_TIME_CHECK_INTERVAL};

/// A single virtual core.
pub mod cpu;
pub use cpu::Core;

/// Position- and id-indexed core storage.
pub mod registry;
pub use registry::CoreRegistry;

/// Pass scheduling and the host control surface.
pub mod scheduler;
pub use scheduler::{MonotonicClock, PassClock, Scheduler};

/// Registry snapshots.
pub mod snapshot;
pub use snapshot::{CoreImage, PageImage, RegistrySnapshot, SnapshotVersion, PAGE_SIZE};

#[cfg(test)]
use proptest as _;
#[cfg(test)]
use rstest as _;
