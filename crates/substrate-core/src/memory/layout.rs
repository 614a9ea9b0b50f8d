//! Configurable per-core memory map.

use serde::{Deserialize, Serialize};

use crate::{LayoutError, RegionKind, RegionTable, FRAMEBUFFER_BYTES_PER_PIXEL};

/// Default start address of the RAM region.
pub const DEFAULT_RAM_START: u64 = 0x0000_0000;
/// Default RAM region size (2 MiB).
pub const DEFAULT_RAM_SIZE: u64 = 2 * 1024 * 1024;
/// Default start address of the console region.
pub const DEFAULT_CONSOLE_START: u64 = 0x0020_0000;
/// Default console region size (64 KiB).
pub const DEFAULT_CONSOLE_SIZE: u64 = 64 * 1024;
/// Default start address of the framebuffer region.
pub const DEFAULT_FRAMEBUFFER_START: u64 = 0x0030_0000;
/// Default framebuffer width in pixels.
pub const DEFAULT_FRAMEBUFFER_WIDTH: u32 = 64;
/// Default framebuffer height in pixels.
pub const DEFAULT_FRAMEBUFFER_HEIGHT: u32 = 64;

/// Placement of a plain region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RegionSpec {
    /// Inclusive start address.
    pub start: u64,
    /// Length in bytes.
    pub size: u64,
}

/// Placement and geometry of the framebuffer region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FramebufferSpec {
    /// Inclusive start address.
    pub start: u64,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl FramebufferSpec {
    /// Region size in bytes (`width * height * 4`).
    #[must_use]
    pub const fn size(&self) -> u64 {
        self.width as u64 * self.height as u64 * FRAMEBUFFER_BYTES_PER_PIXEL
    }
}

/// Memory map applied to every core's mapper.
///
/// Concrete addresses are configuration; the defaults place a 2 MiB RAM
/// region at zero, the console at `0x20_0000` and a 64x64 framebuffer at
/// `0x30_0000`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryLayout {
    /// Program and data memory. Programs load at `ram.start`.
    pub ram: RegionSpec,
    /// Console device window, if mapped.
    pub console: Option<RegionSpec>,
    /// Framebuffer device window, if mapped.
    pub framebuffer: Option<FramebufferSpec>,
}

impl Default for MemoryLayout {
    fn default() -> Self {
        Self {
            ram: RegionSpec {
                start: DEFAULT_RAM_START,
                size: DEFAULT_RAM_SIZE,
            },
            console: Some(RegionSpec {
                start: DEFAULT_CONSOLE_START,
                size: DEFAULT_CONSOLE_SIZE,
            }),
            framebuffer: Some(FramebufferSpec {
                start: DEFAULT_FRAMEBUFFER_START,
                width: DEFAULT_FRAMEBUFFER_WIDTH,
                height: DEFAULT_FRAMEBUFFER_HEIGHT,
            }),
        }
    }
}

impl MemoryLayout {
    /// Program entry point (first RAM byte).
    #[must_use]
    pub const fn entry_point(&self) -> u64 {
        self.ram.start
    }

    /// Builds the sorted, non-overlapping region table for this layout.
    ///
    /// # Errors
    ///
    /// Returns a [`LayoutError`] when a region is empty, regions overlap, or
    /// the framebuffer geometry is degenerate.
    pub fn build_regions(&self) -> Result<RegionTable, LayoutError> {
        let mut table = RegionTable::new();
        table.insert(self.ram.start, self.ram.size, RegionKind::Ram)?;
        if let Some(console) = self.console {
            table.insert(console.start, console.size, RegionKind::Console)?;
        }
        if let Some(fb) = self.framebuffer {
            table.insert(
                fb.start,
                fb.size(),
                RegionKind::Framebuffer {
                    width: fb.width,
                    height: fb.height,
                },
            )?;
        }
        Ok(table)
    }
}
