//! Per-core memory model: region table, configurable layout and mapper.

/// Configurable memory map and default addresses.
pub mod layout;
/// Address resolution and device routing.
pub mod mapper;
/// Sorted region table with owned storage.
pub mod region;

pub use layout::{
    FramebufferSpec, MemoryLayout, RegionSpec, DEFAULT_CONSOLE_SIZE, DEFAULT_CONSOLE_START,
    DEFAULT_FRAMEBUFFER_HEIGHT, DEFAULT_FRAMEBUFFER_START, DEFAULT_FRAMEBUFFER_WIDTH,
    DEFAULT_RAM_SIZE, DEFAULT_RAM_START,
};
pub use mapper::{is_supported_width, MemoryMapper};
pub use region::{
    MemoryRegion, RegionDescriptor, RegionHandle, RegionKind, RegionTable,
    FRAMEBUFFER_BYTES_PER_PIXEL, MAX_REGION_BYTES,
};
