//! Color palettes for the Spectra 6 (6-color) e-paper panel
//!
//! The content server packs pixels using its own palette order (black,
//! white, green, blue, red, yellow), which does not match the controller's
//! 4-bit color codes. Every nibble is passed through [`REMAP`] before the
//! frame is sent to the panel.

/// Hardware color codes understood by the Spectra 6 controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum Color {
    /// Black (0x00)
    Black = 0x00,
    /// White (0x01)
    #[default]
    White = 0x01,
    /// Yellow (0x02)
    Yellow = 0x02,
    /// Red (0x03)
    Red = 0x03,
    /// Blue (0x05)
    Blue = 0x05,
    /// Green (0x06)
    Green = 0x06,
}

impl Color {
    /// Get a byte with this color in both pixel positions (for fills)
    #[inline]
    pub const fn to_dual_pixel(self) -> u8 {
        let c = self as u8;
        (c << 4) | c
    }
}

/// Color index remapping table: server palette index -> EPD 4-bit value
/// Server: 0=Black, 1=White, 2=Green, 3=Blue, 4=Red, 5=Yellow
/// EPD:    0=Black, 1=White, 2=Yellow, 3=Red, 5=Blue, 6=Green
pub const REMAP: [u8; 6] = [
    Color::Black as u8,
    Color::White as u8,
    Color::Green as u8,
    Color::Blue as u8,
    Color::Red as u8,
    Color::Yellow as u8,
];

/// Byte used to pad short downloads: white in both nibbles, in both palettes
pub const BLANK: u8 = Color::White.to_dual_pixel();

/// Remap a single 4-bit server index to the EPD color value.
///
/// Values outside the table (6..=15) are passed through unchanged.
#[inline]
pub const fn remap_index(index: u8) -> u8 {
    let index = index & 0x0F;
    if (index as usize) < REMAP.len() {
        REMAP[index as usize]
    } else {
        index
    }
}

/// Remap both nibbles of a packed byte
#[inline]
pub const fn remap_byte(byte: u8) -> u8 {
    (remap_index(byte >> 4) << 4) | remap_index(byte & 0x0F)
}

/// Remap every packed byte in place
pub fn remap_buffer(buffer: &mut [u8]) {
    for byte in buffer.iter_mut() {
        *byte = remap_byte(*byte);
    }
}
