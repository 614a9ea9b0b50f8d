//! Memory-mapped device bridges owned by a core's mapper.

/// Line-buffered text console.
pub mod console;
/// Dirty-tracked RGBA framebuffer.
pub mod framebuffer;

pub use console::{
    ConsoleConfig, ConsoleDevice, ConsoleImage, CONSOLE_INPUT_OFFSET, CONSOLE_OUTPUT_OFFSET,
    CONSOLE_STATUS_INPUT_AVAILABLE, CONSOLE_STATUS_OFFSET, CONSOLE_STATUS_OUTPUT_READY,
};
pub use framebuffer::{FramebufferDevice, FramebufferView};

/// Synchronous, bounded-cost side-effect hooks for a device region.
///
/// The mapper stores every byte in the region's backing buffer first and then
/// calls the hook, in the same call, in ascending offset order. Hooks must not
/// block.
pub trait DeviceBridge {
    /// Observes a byte written at `offset` within the device region.
    fn on_write(&mut self, offset: u64, value: u8);

    /// Produces the byte read at `offset`; `stored` is the backing-buffer value.
    fn on_read(&mut self, offset: u64, stored: u8) -> u8 {
        let _ = offset;
        stored
    }

    /// Restores power-on device state.
    fn reset(&mut self);
}
