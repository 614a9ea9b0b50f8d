//! Framebuffer device: dirty tracking only, never rasterizes.
//!
//! The pixel bytes live in the framebuffer region's backing buffer. The host
//! reads them through [`FramebufferView`] once per frame and clears the dirty
//! state afterwards.

use std::ops::Range;

use super::DeviceBridge;

/// Dirty-tracking bridge for an RGBA framebuffer region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FramebufferDevice {
    width: u32,
    height: u32,
    dirty: Option<Range<u64>>,
}

impl FramebufferDevice {
    /// Creates a clean framebuffer bridge of the given geometry.
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            dirty: None,
        }
    }

    /// Width in pixels.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Returns `true` when any byte changed since the last [`Self::clear_dirty`].
    #[must_use]
    pub const fn is_dirty(&self) -> bool {
        self.dirty.is_some()
    }

    /// Byte span covering every write since the last clear.
    #[must_use]
    pub fn dirty_span(&self) -> Option<Range<u64>> {
        self.dirty.clone()
    }

    /// Marks the framebuffer clean.
    pub fn clear_dirty(&mut self) {
        self.dirty = None;
    }

    /// Marks the whole framebuffer dirty, e.g. after a snapshot restore.
    pub fn mark_all_dirty(&mut self) {
        let len = u64::from(self.width) * u64::from(self.height) * crate::FRAMEBUFFER_BYTES_PER_PIXEL;
        if len > 0 {
            self.dirty = Some(0..len);
        }
    }
}

impl DeviceBridge for FramebufferDevice {
    fn on_write(&mut self, offset: u64, _value: u8) {
        let end = offset.saturating_add(1);
        self.dirty = Some(match self.dirty.take() {
            Some(span) => span.start.min(offset)..span.end.max(end),
            None => offset..end,
        });
    }

    fn reset(&mut self) {
        *self = Self::new(self.width, self.height);
    }
}

/// Borrowed pairing of framebuffer state with its raw pixel bytes.
#[derive(Debug, Clone, Copy)]
pub struct FramebufferView<'a> {
    device: &'a FramebufferDevice,
    pixels: &'a [u8],
}

impl<'a> FramebufferView<'a> {
    pub(crate) const fn new(device: &'a FramebufferDevice, pixels: &'a [u8]) -> Self {
        Self { device, pixels }
    }

    /// Device dirty-tracking state.
    #[must_use]
    pub const fn device(&self) -> &'a FramebufferDevice {
        self.device
    }

    /// Raw RGBA bytes, row-major.
    #[must_use]
    pub const fn pixels(&self) -> &'a [u8] {
        self.pixels
    }

    /// Returns `true` when the pixels changed since the last clear.
    #[must_use]
    pub const fn is_dirty(&self) -> bool {
        self.device.is_dirty()
    }

    /// RGBA value of pixel `(x, y)`, or `None` outside the framebuffer.
    #[must_use]
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.device.width || y >= self.device.height {
            return None;
        }
        let index = (u64::from(y) * u64::from(self.device.width) + u64::from(x)) * 4;
        let start = usize::try_from(index).ok()?;
        let bytes = self.pixels.get(start..start + 4)?;
        Some([bytes[0], bytes[1], bytes[2], bytes[3]])
    }
}

#[cfg(test)]
mod tests {
    use super::{FramebufferDevice, FramebufferView};
    use crate::DeviceBridge;

    #[test]
    fn writes_mark_dirty_until_cleared() {
        let mut fb = FramebufferDevice::new(4, 4);
        assert!(!fb.is_dirty());
        fb.on_write(8, 0xFF);
        assert!(fb.is_dirty());
        fb.clear_dirty();
        assert!(!fb.is_dirty());
    }

    #[test]
    fn dirty_span_covers_all_writes() {
        let mut fb = FramebufferDevice::new(4, 4);
        fb.on_write(20, 1);
        fb.on_write(3, 1);
        fb.on_write(40, 1);
        assert_eq!(fb.dirty_span(), Some(3..41));
    }

    #[test]
    fn mark_all_dirty_covers_every_pixel() {
        let mut fb = FramebufferDevice::new(2, 3);
        fb.mark_all_dirty();
        assert_eq!(fb.dirty_span(), Some(0..24));
    }

    #[test]
    fn view_reads_rgba_pixels_row_major() {
        let fb = FramebufferDevice::new(2, 2);
        let mut pixels = vec![0_u8; 16];
        pixels[12..16].copy_from_slice(&[1, 2, 3, 4]);
        let view = FramebufferView::new(&fb, &pixels);
        assert_eq!(view.pixel(1, 1), Some([1, 2, 3, 4]));
        assert_eq!(view.pixel(0, 0), Some([0, 0, 0, 0]));
        assert_eq!(view.pixel(2, 0), None);
        assert_eq!(view.pixel(0, 2), None);
    }

    #[test]
    fn reset_clears_dirty_state() {
        let mut fb = FramebufferDevice::new(2, 2);
        fb.on_write(0, 9);
        fb.reset();
        assert!(!fb.is_dirty());
        assert_eq!((fb.width(), fb.height()), (2, 2));
    }
}
