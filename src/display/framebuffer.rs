// Frame Buffer - RGBA frames produced by the core
//
// `FrameView` borrows the core's framebuffer region in place and is only
// valid until the next step. `FrameBuffer` is an owned copy for anything
// that has to outlive that (presentation, thumbnails).

/// Bytes per RGBA pixel
pub const BYTES_PER_PIXEL: usize = 4;

/// Borrowed RGBA frame inside core memory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameView<'a> {
    width: u32,
    height: u32,
    data: &'a [u8],
}

impl<'a> FrameView<'a> {
    /// Wrap an RGBA slice
    ///
    /// # Returns
    /// `None` if `data` is not exactly `width * height * 4` bytes
    pub fn new(width: u32, height: u32, data: &'a [u8]) -> Option<Self> {
        if data.len() != frame_len(width, height) {
            return None;
        }
        Some(Self {
            width,
            height,
            data,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Raw RGBA bytes, row-major
    pub fn as_bytes(&self) -> &'a [u8] {
        self.data
    }

    /// RGBA of the pixel at (x, y)
    ///
    /// # Panics
    /// Panics if coordinates are out of bounds
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        assert!(x < self.width, "X coordinate {} out of bounds", x);
        assert!(y < self.height, "Y coordinate {} out of bounds", y);
        let offset = (y as usize * self.width as usize + x as usize) * BYTES_PER_PIXEL;
        [
            self.data[offset],
            self.data[offset + 1],
            self.data[offset + 2],
            self.data[offset + 3],
        ]
    }

    /// Copy into an owned frame
    pub fn to_frame_buffer(&self) -> FrameBuffer {
        FrameBuffer {
            width: self.width,
            height: self.height,
            pixels: self.data.to_vec(),
        }
    }
}

/// Owned RGBA frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameBuffer {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl FrameBuffer {
    /// Create a black, opaque frame
    pub fn new(width: u32, height: u32) -> Self {
        let mut pixels = vec![0u8; frame_len(width, height)];
        for px in pixels.chunks_exact_mut(BYTES_PER_PIXEL) {
            px[3] = 0xFF;
        }
        Self {
            width,
            height,
            pixels,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.pixels
    }

    /// Borrow as a view
    pub fn view(&self) -> FrameView<'_> {
        FrameView {
            width: self.width,
            height: self.height,
            data: &self.pixels,
        }
    }

    /// Overwrite with a view of the same size
    ///
    /// # Returns
    /// `false` (and leaves the frame untouched) if the sizes differ
    pub fn copy_from(&mut self, view: &FrameView<'_>) -> bool {
        if view.width != self.width || view.height != self.height {
            return false;
        }
        self.pixels.copy_from_slice(view.data);
        true
    }
}

/// Byte length of a `width x height` RGBA frame
pub fn frame_len(width: u32, height: u32) -> usize {
    width as usize * height as usize * BYTES_PER_PIXEL
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_view_requires_exact_length() {
        let data = vec![0u8; 64 * 32 * 4];
        assert!(FrameView::new(64, 32, &data).is_some());
        assert!(FrameView::new(64, 31, &data).is_none());
        assert!(FrameView::new(64, 32, &data[1..]).is_none());
    }

    #[test]
    fn test_view_pixel() {
        let mut data = vec![0u8; 2 * 2 * 4];
        data[12..16].copy_from_slice(&[1, 2, 3, 4]);
        let view = FrameView::new(2, 2, &data).unwrap();
        assert_eq!(view.pixel(1, 1), [1, 2, 3, 4]);
        assert_eq!(view.pixel(0, 0), [0, 0, 0, 0]);
    }

    #[test]
    fn test_new_frame_is_opaque_black() {
        let frame = FrameBuffer::new(4, 4);
        assert_eq!(frame.as_slice().len(), 64);
        assert_eq!(frame.view().pixel(3, 3), [0, 0, 0, 0xFF]);
    }

    #[test]
    fn test_copy_from_view() {
        let data: Vec<u8> = (0..16).collect();
        let view = FrameView::new(2, 2, &data).unwrap();

        let mut frame = FrameBuffer::new(2, 2);
        assert!(frame.copy_from(&view));
        assert_eq!(frame.as_slice(), &data[..]);
        assert_eq!(view.to_frame_buffer(), frame);

        let mut other = FrameBuffer::new(4, 1);
        assert!(!other.copy_from(&view));
    }
}
