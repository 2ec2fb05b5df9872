use fugit::HertzU32;
use rp2040_hal::pac::CLOCKS;

// CLK_GPOUT0_CTRL
const GPOUT_ENABLE: u32 = 1 << 11;
const GPOUT_AUXSRC_CLK_SYS: u32 = 0x6 << 5;

/// Fixed point 24.8 divider taking `source` down to `target`, clamped to what the
/// register can hold.
fn gpout_divider(source: HertzU32, target: HertzU32) -> Option<u32> {
    if target.raw() == 0 {
        return None;
    }
    let divider = (u64::from(source.raw()) << 8) / u64::from(target.raw());
    Some(divider.clamp(1 << 8, 0xffff_ffff) as u32)
}

/// Put `clk_sys` divided down to roughly `target` out on GPOUT0 (GPIO21), so there is a
/// known signal to point an input at. Returns the frequency actually produced.
pub fn enable_calibration_output(
    clocks: &CLOCKS,
    system_clock: HertzU32,
    target: HertzU32,
) -> Option<HertzU32> {
    let divider = gpout_divider(system_clock, target)?;
    clocks.clk_gpout0_ctrl().write(|w| unsafe { w.bits(0) });
    clocks.clk_gpout0_div().write(|w| unsafe { w.bits(divider) });
    clocks
        .clk_gpout0_ctrl()
        .write(|w| unsafe { w.bits(GPOUT_AUXSRC_CLK_SYS | GPOUT_ENABLE) });
    Some(HertzU32::from_raw(
        ((u64::from(system_clock.raw()) << 8) / u64::from(divider)) as u32,
    ))
}
