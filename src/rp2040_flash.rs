use crate::config::{ConfigError, MeterConfig, CONFIG_BLOCK_LENGTH};
use core::slice;

/* IMPORTANT NOTE ABOUT RP2040 FLASH SPACE ADDRESSES:
When you pass an `addr` to a `rp2040-hal::rom_data` function it wants
addresses that start at `0x0000_0000`. However, when you want to read
that data back using something like `slice::from_raw_parts()` you
need the address space to start at `0x1000_0000` (aka `FLASH_XIP_BASE`).
*/
pub const FLASH_XIP_BASE: u32 = 0x1000_0000;
pub const FLASH_END: u32 = 0x0020_0000;
pub const SECTOR_SIZE: u32 = 4096;

/// The meter config lives at the start of the last sector of the 2MB flash.
pub const METER_CONFIG_OFFSET: u32 = FLASH_END - SECTOR_SIZE;

pub fn read_meter_config_from_rp2040_flash() -> &'static [u8] {
    let addr = (FLASH_XIP_BASE + METER_CONFIG_OFFSET) as *const u8;
    unsafe { slice::from_raw_parts(addr, CONFIG_BLOCK_LENGTH) }
}

pub fn load_meter_config() -> Result<MeterConfig, ConfigError> {
    MeterConfig::from_bytes(read_meter_config_from_rp2040_flash())
}
