//! Controller commands and register sequences for the GDEP073E01 panel

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
#[allow(clippy::upper_case_acronyms, non_camel_case_types)]
pub enum Command {
    /// Panel Setting
    PSR = 0x00,
    /// Power Setting
    PWRR = 0x01,
    /// Power Off
    POF = 0x02,
    /// Power Off Sequence Setting
    POFS = 0x03,
    /// Power On
    PON = 0x04,
    /// Booster Soft Start 1
    BTST1 = 0x05,
    /// Booster Soft Start 2
    BTST2 = 0x06,
    /// Deep Sleep
    DSLP = 0x07,
    /// Booster Soft Start 3
    BTST3 = 0x08,
    /// Data Start Transmission
    DTM = 0x10,
    /// Display Refresh
    DRF = 0x12,
    /// Image Process Command
    IPC = 0x13,
    /// PLL Control
    PLL = 0x30,
    /// Temperature Sensor Enable
    TSE = 0x41,
    /// VCOM and Data Interval Setting
    CDI = 0x50,
    /// TCON Setting
    TCON = 0x60,
    /// Resolution Setting
    TRES = 0x61,
    /// VCOM DC Setting
    VDCS = 0x82,
    /// Temperature VCOM DC Setting
    T_VDCS = 0x84,
    AGID = 0x86,
    /// Command Header
    CMDH = 0xAA,
    /// Cascade Setting
    CCSET = 0xE0,
    /// Power Saving Setting
    PWS = 0xE3,
    /// Temperature Sensor Setting
    TSSET = 0xE6,
}

impl Command {
    #[inline]
    pub fn addr(self) -> u8 {
        self as u8
    }
}

/// One register write: command byte followed by its data
pub type Step = (Command, &'static [u8]);

/// Deep sleep check code
pub const DEEP_SLEEP_CHECK: u8 = 0xA5;

/// Booster soft start 2 for standard refresh, resent before every refresh
pub const BTST2_STANDARD: &[u8] = &[0x6F, 0x1F, 0x17, 0x49];
/// Booster soft start 2 for fast refresh
pub const BTST2_FAST: &[u8] = &[0x6F, 0x1F, 0x16, 0x25];

/// Standard init (~15-20s refresh, best image quality)
pub const STANDARD_INIT: &[Step] = &[
    (Command::CMDH, &[0x49, 0x55, 0x20, 0x08, 0x09, 0x18]),
    (Command::PWRR, &[0x3F]),
    (Command::PSR, &[0x5F, 0x69]),
    (Command::POFS, &[0x00, 0x54, 0x00, 0x44]),
    (Command::BTST1, &[0x40, 0x1F, 0x1F, 0x2C]),
    (Command::BTST2, BTST2_STANDARD),
    (Command::BTST3, &[0x6F, 0x1F, 0x1F, 0x22]),
    (Command::PLL, &[0x08]),
    (Command::CDI, &[0x3F]),
    (Command::TCON, &[0x02, 0x00]),
    // 800x480
    (Command::TRES, &[0x03, 0x20, 0x01, 0xE0]),
    (Command::T_VDCS, &[0x01]),
    (Command::PWS, &[0x2F]),
];

/// Fast init (~5-8s refresh, slightly reduced quality)
pub const FAST_INIT: &[Step] = &[
    (Command::CMDH, &[0x49, 0x55, 0x20, 0x08, 0x09, 0x18]),
    (Command::PWRR, &[0x3F, 0x00, 0x32, 0x2A, 0x0E, 0x2A]),
    (Command::PSR, &[0x5F, 0x69]),
    (Command::POFS, &[0x00, 0x54, 0x00, 0x44]),
    (Command::BTST1, &[0x40, 0x1F, 0x1F, 0x2C]),
    (Command::BTST2, BTST2_FAST),
    (Command::BTST3, &[0x6F, 0x1F, 0x1F, 0x22]),
    (Command::IPC, &[0x00, 0x04]),
    (Command::PLL, &[0x02]),
    (Command::TSE, &[0x00]),
    (Command::CDI, &[0x3F]),
    (Command::TCON, &[0x02, 0x00]),
    (Command::TRES, &[0x03, 0x20, 0x01, 0xE0]),
    (Command::VDCS, &[0x1E]),
    (Command::T_VDCS, &[0x01]),
    (Command::AGID, &[0x00]),
    (Command::PWS, &[0x2F]),
    (Command::CCSET, &[0x00]),
    (Command::TSSET, &[0x00]),
];
