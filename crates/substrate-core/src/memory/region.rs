//! Region table: sorted, non-overlapping address ranges with owned storage.

use serde::{Deserialize, Serialize};

use crate::LayoutError;

/// Framebuffer pixel size in bytes (RGBA).
pub const FRAMEBUFFER_BYTES_PER_PIXEL: u64 = 4;

/// Largest single region the table will allocate (1 GiB).
pub const MAX_REGION_BYTES: u64 = 1 << 30;

/// Owner classification of a region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RegionKind {
    /// General core-local read/write memory.
    Ram,
    /// Console device window.
    Console,
    /// RGBA framebuffer window, row-major.
    Framebuffer {
        /// Width in pixels.
        width: u32,
        /// Height in pixels.
        height: u32,
    },
}

impl RegionKind {
    /// Returns `true` for regions backed by a device bridge.
    #[must_use]
    pub const fn is_device(self) -> bool {
        !matches!(self, Self::Ram)
    }

    const fn device_name(self) -> Option<&'static str> {
        match self {
            Self::Ram => None,
            Self::Console => Some("console"),
            Self::Framebuffer { .. } => Some("framebuffer"),
        }
    }
}

/// Copyable description of a region without its storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegionDescriptor {
    /// Region classification.
    pub kind: RegionKind,
    /// Inclusive start address.
    pub start: u64,
    /// Exclusive end address.
    pub end: u64,
}

/// Stable index of a region inside its table.
///
/// Handles stay valid until the next [`RegionTable::insert`] on the same table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegionHandle(usize);

impl RegionHandle {
    /// Position of the region in ascending address order.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

/// Address range `[start, end)` with its owned backing bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryRegion {
    start: u64,
    end: u64,
    kind: RegionKind,
    buffer: Box<[u8]>,
}

impl MemoryRegion {
    /// Inclusive start address.
    #[must_use]
    pub const fn start(&self) -> u64 {
        self.start
    }

    /// Exclusive end address.
    #[must_use]
    pub const fn end(&self) -> u64 {
        self.end
    }

    /// Region classification.
    #[must_use]
    pub const fn kind(&self) -> RegionKind {
        self.kind
    }

    /// Length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Regions are never empty; present for API completeness.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Returns `true` when `addr` belongs to this region.
    #[must_use]
    pub const fn contains(&self, addr: u64) -> bool {
        addr >= self.start && addr < self.end
    }

    /// Backing bytes.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.buffer
    }

    pub(crate) fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.buffer
    }

    /// Copyable descriptor for this region.
    #[must_use]
    pub const fn descriptor(&self) -> RegionDescriptor {
        RegionDescriptor {
            kind: self.kind,
            start: self.start,
            end: self.end,
        }
    }
}

/// Sorted, non-overlapping list of regions; exactly one region owns any
/// mapped address.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegionTable {
    regions: Vec<MemoryRegion>,
}

impl RegionTable {
    /// Creates an empty table.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            regions: Vec::new(),
        }
    }

    /// Number of regions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.regions.len()
    }

    /// Returns `true` when no region is mapped.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// Allocates a zeroed region and inserts it in address order.
    ///
    /// # Errors
    ///
    /// Returns [`LayoutError::EmptyRegion`] for zero-length or wrapping ranges,
    /// [`LayoutError::RegionTooLarge`] above [`MAX_REGION_BYTES`],
    /// [`LayoutError::Overlap`] when the range intersects an existing region,
    /// [`LayoutError::DuplicateDevice`] for a second console or framebuffer and
    /// [`LayoutError::FramebufferSize`] when a framebuffer size disagrees with
    /// its geometry.
    pub fn insert(
        &mut self,
        start: u64,
        size: u64,
        kind: RegionKind,
    ) -> Result<RegionHandle, LayoutError> {
        let end = match start.checked_add(size) {
            Some(end) if size > 0 => end,
            _ => return Err(LayoutError::EmptyRegion { start }),
        };
        if size > MAX_REGION_BYTES {
            return Err(LayoutError::RegionTooLarge { start, size });
        }
        if let RegionKind::Framebuffer { width, height } = kind {
            let expected = u64::from(width) * u64::from(height) * FRAMEBUFFER_BYTES_PER_PIXEL;
            if expected != size {
                return Err(LayoutError::FramebufferSize {
                    width,
                    height,
                    expected,
                    actual: size,
                });
            }
        }
        if let Some(name) = kind.device_name() {
            if self
                .regions
                .iter()
                .any(|region| region.kind.device_name() == Some(name))
            {
                return Err(LayoutError::DuplicateDevice(name));
            }
        }
        if let Some(other) = self
            .regions
            .iter()
            .find(|region| start < region.end && region.start < end)
        {
            return Err(LayoutError::Overlap {
                start,
                end,
                other_start: other.start,
                other_end: other.end,
            });
        }

        let len = usize::try_from(size).map_err(|_| LayoutError::RegionTooLarge { start, size })?;
        let index = self.regions.partition_point(|region| region.start < start);
        self.regions.insert(
            index,
            MemoryRegion {
                start,
                end,
                kind,
                buffer: vec![0; len].into_boxed_slice(),
            },
        );
        Ok(RegionHandle(index))
    }

    /// Finds the region owning `addr`.
    #[must_use]
    pub fn find(&self, addr: u64) -> Option<RegionHandle> {
        let index = self
            .regions
            .partition_point(|region| region.start <= addr)
            .checked_sub(1)?;
        self.regions[index]
            .contains(addr)
            .then_some(RegionHandle(index))
    }

    /// Finds the first region of `kind`.
    #[must_use]
    pub fn find_kind(&self, kind: RegionKind) -> Option<RegionHandle> {
        self.regions
            .iter()
            .position(|region| region.kind == kind)
            .map(RegionHandle)
    }

    /// Returns the region behind `handle`.
    #[must_use]
    pub fn get(&self, handle: RegionHandle) -> Option<&MemoryRegion> {
        self.regions.get(handle.0)
    }

    pub(crate) fn get_mut(&mut self, handle: RegionHandle) -> Option<&mut MemoryRegion> {
        self.regions.get_mut(handle.0)
    }

    /// Regions in ascending address order.
    pub fn iter(&self) -> impl Iterator<Item = &MemoryRegion> {
        self.regions.iter()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut MemoryRegion> {
        self.regions.iter_mut()
    }

    /// Descriptors in ascending address order.
    pub fn descriptors(&self) -> impl Iterator<Item = RegionDescriptor> + '_ {
        self.regions.iter().map(MemoryRegion::descriptor)
    }
}
