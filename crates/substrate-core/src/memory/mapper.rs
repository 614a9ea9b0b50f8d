//! Per-core address resolution and device routing.

use crate::{
    ConsoleConfig, ConsoleDevice, DeviceBridge, FramebufferDevice, FramebufferView, LayoutError,
    MemoryFault, MemoryLayout, MemoryRegion, RegionHandle, RegionKind, RegionTable,
};

/// Returns `true` for access widths the mapper supports.
#[must_use]
pub const fn is_supported_width(width: u8) -> bool {
    matches!(width, 1 | 2 | 4 | 8)
}

/// Flat address space of one core: region table plus the devices it owns.
///
/// Every access goes through [`MemoryMapper::resolve`]; nothing is shared
/// between mappers, so a fault in one core's address space cannot reach any
/// other core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryMapper {
    table: RegionTable,
    ram: RegionHandle,
    console: Option<ConsoleDevice>,
    framebuffer: Option<FramebufferDevice>,
}

impl MemoryMapper {
    /// Builds a zeroed mapper for `layout` with freshly reset devices.
    ///
    /// # Errors
    ///
    /// Returns a [`LayoutError`] when the layout's regions are inconsistent.
    pub fn new(layout: &MemoryLayout, console: ConsoleConfig) -> Result<Self, LayoutError> {
        Self::from_table(layout.build_regions()?, console)
    }

    /// Wraps an already-populated region table.
    ///
    /// A console device is attached when the table maps a console region and
    /// a framebuffer device when it maps a framebuffer region.
    ///
    /// # Errors
    ///
    /// Returns [`LayoutError::MissingRam`] when the table has no RAM region.
    pub fn from_table(table: RegionTable, console: ConsoleConfig) -> Result<Self, LayoutError> {
        let ram = table
            .find_kind(RegionKind::Ram)
            .ok_or(LayoutError::MissingRam)?;
        let mut has_console = false;
        let mut framebuffer = None;
        for descriptor in table.descriptors() {
            match descriptor.kind {
                RegionKind::Ram => {}
                RegionKind::Console => has_console = true,
                RegionKind::Framebuffer { width, height } => {
                    framebuffer = Some(FramebufferDevice::new(width, height));
                }
            }
        }
        Ok(Self {
            table,
            ram,
            console: has_console.then(|| ConsoleDevice::new(console)),
            framebuffer,
        })
    }

    /// Region table in ascending address order.
    #[must_use]
    pub const fn regions(&self) -> &RegionTable {
        &self.table
    }

    /// Region behind `handle`.
    #[must_use]
    pub fn region(&self, handle: RegionHandle) -> Option<&MemoryRegion> {
        self.table.get(handle)
    }

    /// The RAM region programs load into.
    #[must_use]
    pub fn ram(&self) -> Option<&MemoryRegion> {
        self.table.get(self.ram)
    }

    /// RAM size in bytes.
    #[must_use]
    pub fn ram_capacity(&self) -> usize {
        self.ram().map_or(0, MemoryRegion::len)
    }

    /// Resolves `[address, address + size)` to its owning region and the byte
    /// offset of `address` inside it.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryFault::UnsupportedWidth`] for widths other than 1, 2, 4
    /// or 8 and [`MemoryFault::OutOfBounds`] when the range wraps, touches
    /// unmapped space or crosses a region boundary.
    pub fn resolve(&self, address: u64, size: u8) -> Result<(RegionHandle, usize), MemoryFault> {
        if !is_supported_width(size) {
            return Err(MemoryFault::UnsupportedWidth(size));
        }
        self.resolve_span(address, u64::from(size))
            .ok_or(MemoryFault::OutOfBounds { address, size })
    }

    fn resolve_span(&self, address: u64, len: u64) -> Option<(RegionHandle, usize)> {
        let end = address.checked_add(len)?;
        let handle = self.table.find(address)?;
        let region = self.table.get(handle)?;
        if end > region.end() {
            return None;
        }
        let offset = usize::try_from(address - region.start()).ok()?;
        Some((handle, offset))
    }

    /// Reads a little-endian value of `size` bytes.
    ///
    /// Device regions route every byte through the device's read hook, so
    /// reading the console input register consumes input.
    ///
    /// # Errors
    ///
    /// Propagates [`MemoryMapper::resolve`] failures.
    pub fn read(&mut self, address: u64, size: u8) -> Result<u64, MemoryFault> {
        let (handle, offset) = self.resolve(address, size)?;
        let Some(region) = self.table.get(handle) else {
            return Err(MemoryFault::OutOfBounds { address, size });
        };
        let kind = region.kind();
        let base = offset as u64;
        let mut value = 0_u64;
        for index in 0..usize::from(size) {
            let stored = region.bytes()[offset + index];
            let byte_offset = base + index as u64;
            let byte = match kind {
                RegionKind::Ram => stored,
                RegionKind::Console => self
                    .console
                    .as_mut()
                    .map_or(stored, |device| device.on_read(byte_offset, stored)),
                RegionKind::Framebuffer { .. } => self
                    .framebuffer
                    .as_mut()
                    .map_or(stored, |device| device.on_read(byte_offset, stored)),
            };
            value |= u64::from(byte) << (8 * index);
        }
        Ok(value)
    }

    /// Reads without invoking device hooks.
    ///
    /// # Errors
    ///
    /// Propagates [`MemoryMapper::resolve`] failures.
    pub fn peek(&self, address: u64, size: u8) -> Result<u64, MemoryFault> {
        let (handle, offset) = self.resolve(address, size)?;
        let region = self
            .table
            .get(handle)
            .ok_or(MemoryFault::OutOfBounds { address, size })?;
        let bytes = &region.bytes()[offset..offset + usize::from(size)];
        Ok(bytes
            .iter()
            .rev()
            .fold(0_u64, |acc, byte| (acc << 8) | u64::from(*byte)))
    }

    /// Writes the low `size` bytes of `value`, little-endian.
    ///
    /// Bytes are stored first; device regions then see one `on_write` per
    /// byte in ascending offset order.
    ///
    /// # Errors
    ///
    /// Propagates [`MemoryMapper::resolve`] failures; nothing is written then.
    pub fn write(&mut self, address: u64, size: u8, value: u64) -> Result<(), MemoryFault> {
        let (handle, offset) = self.resolve(address, size)?;
        let Some(region) = self.table.get_mut(handle) else {
            return Err(MemoryFault::OutOfBounds { address, size });
        };
        let kind = region.kind();
        let width = usize::from(size);
        let bytes = value.to_le_bytes();
        region.bytes_mut()[offset..offset + width].copy_from_slice(&bytes[..width]);

        let device: Option<&mut dyn DeviceBridge> = match kind {
            RegionKind::Ram => None,
            RegionKind::Console => self
                .console
                .as_mut()
                .map(|device| device as &mut dyn DeviceBridge),
            RegionKind::Framebuffer { .. } => self
                .framebuffer
                .as_mut()
                .map(|device| device as &mut dyn DeviceBridge),
        };
        if let Some(device) = device {
            for (index, byte) in bytes[..width].iter().enumerate() {
                device.on_write((offset + index) as u64, *byte);
            }
        }
        Ok(())
    }

    /// Copies `bytes` to `address` without device hooks.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryFault::ImageOutOfBounds`] unless the whole image fits
    /// in a single region.
    pub fn load(&mut self, address: u64, bytes: &[u8]) -> Result<(), MemoryFault> {
        if bytes.is_empty() {
            return Ok(());
        }
        let len = bytes.len() as u64;
        let fault = MemoryFault::ImageOutOfBounds { address, len };
        let (handle, offset) = self
            .resolve_span(address, len)
            .ok_or(fault)?;
        let region = self.table.get_mut(handle).ok_or(fault)?;
        region.bytes_mut()[offset..offset + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    /// Zeroes every region and resets every device.
    pub fn reset(&mut self) {
        for region in self.table.iter_mut() {
            region.bytes_mut().fill(0);
        }
        if let Some(console) = self.console.as_mut() {
            console.reset();
        }
        if let Some(framebuffer) = self.framebuffer.as_mut() {
            framebuffer.reset();
        }
    }

    /// Console device, if the layout maps one.
    #[must_use]
    pub const fn console(&self) -> Option<&ConsoleDevice> {
        self.console.as_ref()
    }

    /// Mutable console device for host input and line draining.
    pub fn console_mut(&mut self) -> Option<&mut ConsoleDevice> {
        self.console.as_mut()
    }

    /// Framebuffer state paired with its raw pixel bytes.
    #[must_use]
    pub fn framebuffer(&self) -> Option<FramebufferView<'_>> {
        let device = self.framebuffer.as_ref()?;
        let region = self
            .table
            .iter()
            .find(|region| matches!(region.kind(), RegionKind::Framebuffer { .. }))?;
        Some(FramebufferView::new(device, region.bytes()))
    }

    /// Marks the framebuffer clean after the host consumed it. Returns
    /// whether it was dirty.
    pub fn clear_framebuffer_dirty(&mut self) -> bool {
        self.framebuffer.as_mut().is_some_and(|device| {
            let was_dirty = device.is_dirty();
            device.clear_dirty();
            was_dirty
        })
    }

    pub(crate) fn framebuffer_mut(&mut self) -> Option<&mut FramebufferDevice> {
        self.framebuffer.as_mut()
    }

    /// Mutable backing bytes of the region starting exactly at `start`.
    pub(crate) fn region_bytes_mut(&mut self, start: u64) -> Option<&mut [u8]> {
        self.table
            .iter_mut()
            .find(|region| region.start() == start)
            .map(MemoryRegion::bytes_mut)
    }
}
