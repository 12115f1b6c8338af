//! Framebuffer for the 7.3" e-paper display
//!
//! The display is 800x480 pixels with 4 bits per pixel (6 colors).
//! Two pixels are packed per byte: high nibble = left pixel, low nibble = right pixel.
//!
//! The framebuffer is allocated on the heap, which the firmware backs with
//! PSRAM, and lives only for the duration of one wake cycle.

use alloc::boxed::Box;
use alloc::vec;

use crate::palette::{self, BLANK};

/// Display width in pixels
pub const WIDTH: u32 = 800;
/// Display height in pixels
pub const HEIGHT: u32 = 480;
/// Buffer size: 4 bits per pixel, 2 pixels per byte
pub const BUFFER_SIZE: usize = (WIDTH as usize * HEIGHT as usize) / 2;

/// Framebuffer for the 800x480 4-bit display
pub struct Framebuffer {
    buffer: Box<[u8]>,
}

impl Framebuffer {
    /// Create a new framebuffer filled with the blank byte
    /// Allocates from heap (should be called after PSRAM heap is initialized)
    pub fn new() -> Self {
        // Built in place, a 192KB array would not fit on the task stack
        let buffer = vec![BLANK; BUFFER_SIZE].into_boxed_slice();
        Self { buffer }
    }

    /// Get the raw buffer slice for sending to the display
    pub fn as_slice(&self) -> &[u8] {
        &self.buffer[..]
    }

    /// Get mutable access to the raw buffer
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.buffer[..]
    }

    /// Translate server palette indices to panel color codes
    pub fn remap(&mut self) {
        palette::remap_buffer(&mut self.buffer[..]);
    }
}

impl Default for Framebuffer {
    fn default() -> Self {
        Self::new()
    }
}
