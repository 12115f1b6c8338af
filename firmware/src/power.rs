//! AXP2101 PMIC setup
//!
//! The panel runs from the ALDO3/ALDO4 rails, which may be off after a cold
//! boot. I2C: SDA=GPIO47, SCL=GPIO48, address 0x34.

use embedded_hal::i2c::I2c;

pub const AXP2101_ADDR: u8 = 0x34;

/// ALDO enable bits
const LDO_ONOFF_CTRL0: u8 = 0x90;
/// ALDO3 voltage
const LDO_VOL2_CTRL: u8 = 0x94;
/// ALDO4 voltage
const LDO_VOL3_CTRL: u8 = 0x95;
/// Battery percentage (0-100)
const BAT_PERCENT_REG: u8 = 0xA4;

/// 3.3V: (3300 - 500) / 100
const LDO_3V3: u8 = 0x1C;

/// Set ALDO3/ALDO4 to 3.3V and enable the common LDOs
pub fn enable_panel_rails<I: I2c>(i2c: &mut I) -> Result<(), I::Error> {
    i2c.write(AXP2101_ADDR, &[LDO_VOL2_CTRL, LDO_3V3])?;
    i2c.write(AXP2101_ADDR, &[LDO_VOL3_CTRL, LDO_3V3])?;
    i2c.write(AXP2101_ADDR, &[LDO_ONOFF_CTRL0, 0x0F])
}

/// Fuel gauge reading, for the wake log
pub fn battery_percent<I: I2c>(i2c: &mut I) -> Result<u8, I::Error> {
    let mut buf = [0u8; 1];
    i2c.write_read(AXP2101_ADDR, &[BAT_PERCENT_REG], &mut buf)?;
    Ok(buf[0])
}
