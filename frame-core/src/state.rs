//! State persisted in RTC memory across deep sleep
//!
//! RTC fast memory keeps its contents through deep sleep but holds garbage
//! after a cold boot, so the record carries a magic number and is reset
//! whenever it does not match.

use crate::http::MAX_VALIDATOR_LEN;

/// Magic number to validate RTC memory state
pub const SLEEP_STATE_MAGIC: u32 = 0x5EC7_F4A3;

#[repr(C)]
pub struct SleepState {
    /// Magic number to validate state
    magic: u32,
    /// Wakes since the last cold boot
    boot_count: u32,
    /// Length of `last_modified` in bytes, 0 when unset
    last_modified_len: u8,
    /// `Last-Modified` of the image on the panel
    last_modified: [u8; MAX_VALIDATOR_LEN],
}

impl SleepState {
    pub const fn new() -> Self {
        Self {
            magic: 0,
            boot_count: 0,
            last_modified_len: 0,
            last_modified: [0; MAX_VALIDATOR_LEN],
        }
    }

    pub fn is_valid(&self) -> bool {
        self.magic == SLEEP_STATE_MAGIC && self.last_modified_len as usize <= MAX_VALIDATOR_LEN
    }

    fn reset(&mut self) {
        *self = Self::new();
        self.magic = SLEEP_STATE_MAGIC;
    }

    /// Validate the record and count this wake. Returns the new boot count.
    pub fn begin_cycle(&mut self) -> u32 {
        if !self.is_valid() {
            self.reset();
        }
        self.boot_count = self.boot_count.wrapping_add(1);
        self.boot_count
    }

    pub fn last_modified(&self) -> Option<&str> {
        if !self.is_valid() || self.last_modified_len == 0 {
            return None;
        }
        core::str::from_utf8(&self.last_modified[..self.last_modified_len as usize]).ok()
    }

    /// Store the validator of the image now on the panel.
    /// Values that do not fit clear the stored one instead.
    pub fn set_last_modified(&mut self, value: Option<&str>) {
        match value {
            Some(v) if !v.is_empty() && v.len() <= MAX_VALIDATOR_LEN => {
                self.last_modified[..v.len()].copy_from_slice(v.as_bytes());
                self.last_modified_len = v.len() as u8;
            }
            _ => self.clear_last_modified(),
        }
    }

    pub fn clear_last_modified(&mut self) {
        self.last_modified_len = 0;
    }
}

impl Default for SleepState {
    fn default() -> Self {
        Self::new()
    }
}
