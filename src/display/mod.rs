// Display module - Frame presentation
//
// This module provides:
// - Borrowed and owned RGBA frames
// - The presentation surface the pacer draws into
// - A winit + pixels window hosting an emulator session

pub mod framebuffer;
pub mod window;

pub use framebuffer::{frame_len, FrameBuffer, FrameView};
pub use window::{run_host_window, WindowConfig};

/// Pixel sink for finished frames
pub trait DisplaySurface {
    /// Take one finished frame; the view is only valid for this call
    fn present(&mut self, frame: FrameView<'_>);
}

impl DisplaySurface for FrameBuffer {
    fn present(&mut self, frame: FrameView<'_>) {
        if !self.copy_from(&frame) {
            *self = frame.to_frame_buffer();
        }
    }
}
