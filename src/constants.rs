// NOTE: Bump this whenever the telemetry frame or the stored config layout changes,
//  so whatever is listening on the other end of the UART can tell which firmware it is talking to.
pub const FIRMWARE_VERSION: u32 = 3;

pub const SYSTEM_CLOCK_HZ: u32 = 125_000_000;

// RP2040 PWM counters are 16 bits wide, TOP = 0xffff means the counter rolls over after
// 65_536 edges.
pub const COUNTER_MAX_WRAP_THRESHOLD: u32 = u16::MAX as u32;

pub const DEFAULT_WINDOW_US: u32 = 1_000_000;
pub const DEFAULT_SETTLE_MS: u32 = 1000;
pub const DEFAULT_REFERENCE_DIVIDER: u8 = 16;
pub const DEFAULT_REFERENCE_HZ: u32 = SYSTEM_CLOCK_HZ / DEFAULT_REFERENCE_DIVIDER as u32;
// Worst case time between a counter wrapping and PWM_IRQ_WRAP being serviced.
pub const DEFAULT_MAX_ISR_LATENCY_US: u32 = 2;
