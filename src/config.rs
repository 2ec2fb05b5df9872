use crate::byte_slice_cursor::{Cursor, CursorMut};
use crate::constants::{
    COUNTER_MAX_WRAP_THRESHOLD, DEFAULT_MAX_ISR_LATENCY_US, DEFAULT_REFERENCE_DIVIDER,
    DEFAULT_REFERENCE_HZ, DEFAULT_SETTLE_MS, DEFAULT_WINDOW_US,
};
use core::fmt;
use crc::{Crc, CRC_16_XMODEM};
use fugit::{HertzU32, MicrosDurationU32, MillisDurationU32};

pub const CONFIG_FORMAT_VERSION: u8 = 1;
pub const CONFIG_BLOCK_LENGTH: usize = 30;
const CONFIG_PAYLOAD_LENGTH: usize = CONFIG_BLOCK_LENGTH - 2;
const ERASED_FLASH_BYTE: u8 = 0xff;

#[repr(u8)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "rp2040", derive(defmt::Format))]
pub enum CountingMode {
    /// Count for a precisely timed window, frequency = count / window.
    Direct = 0,
    /// Count the unknown signal and a known reference over the same latched window.
    Reciprocal = 1,
}

impl TryFrom<u8> for CountingMode {
    type Error = ConfigError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(CountingMode::Direct),
            1 => Ok(CountingMode::Reciprocal),
            x => Err(ConfigError::UnknownMode(x)),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "rp2040", derive(defmt::Format))]
pub enum GateSource {
    MasterTrigger,
    SoftwareLatch,
}

#[derive(Debug, Copy, Clone, PartialEq)]
#[cfg_attr(feature = "rp2040", derive(defmt::Format))]
pub struct GateWindow {
    pub mode: CountingMode,
    /// Only known in direct mode; a latched window is never timed by the firmware.
    pub nominal_duration: Option<MicrosDurationU32>,
    pub gate_source: GateSource,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "rp2040", derive(defmt::Format))]
pub enum ConfigError {
    Erased,
    BadLength,
    BadCrc,
    UnsupportedVersion(u8),
    UnknownMode(u8),
    ZeroWrapThreshold,
    WrapThresholdTooWide(u32),
    ZeroWindow,
    BadChannelCount(u8),
    MissingReference,
    ZeroDivider,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Erased => write!(f, "no config stored"),
            ConfigError::BadLength => write!(f, "config block is truncated"),
            ConfigError::BadCrc => write!(f, "config block failed crc check"),
            ConfigError::UnsupportedVersion(v) => write!(f, "unsupported config version {v}"),
            ConfigError::UnknownMode(m) => write!(f, "unknown counting mode {m}"),
            ConfigError::ZeroWrapThreshold => write!(f, "wrap threshold must be non-zero"),
            ConfigError::WrapThresholdTooWide(w) => {
                write!(f, "wrap threshold {w} exceeds the counter range")
            }
            ConfigError::ZeroWindow => write!(f, "window duration must be non-zero"),
            ConfigError::BadChannelCount(c) => {
                write!(f, "direct mode supports 1 or 2 channels, got {c}")
            }
            ConfigError::MissingReference => {
                write!(f, "reciprocal mode needs a reference frequency")
            }
            ConfigError::ZeroDivider => write!(f, "reference divider must be non-zero"),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
#[cfg_attr(feature = "rp2040", derive(defmt::Format))]
pub struct MeterConfig {
    pub counting_mode: CountingMode,
    /// Number of measured inputs in direct mode. Reciprocal mode always measures one input
    /// against the reference, so this is ignored there.
    pub channel_count: u8,
    /// Highest value the hardware counter holds before rolling over to zero.
    pub wrap_threshold: u32,
    /// Direct mode: the nominal window. Reciprocal mode: how long the gate output is held high.
    pub window: MicrosDurationU32,
    /// Reciprocal mode: wait after dropping the gate output so the latch can follow.
    pub settle: MillisDurationU32,
    /// Calibrated frequency of the reference channel after `reference_divider`.
    pub reference_frequency: HertzU32,
    pub reference_divider: u8,
    pub max_isr_latency: MicrosDurationU32,
    pub calibration_output: Option<HertzU32>,
}

impl Default for MeterConfig {
    fn default() -> Self {
        MeterConfig {
            counting_mode: CountingMode::Direct,
            channel_count: 2,
            wrap_threshold: COUNTER_MAX_WRAP_THRESHOLD,
            window: MicrosDurationU32::from_ticks(DEFAULT_WINDOW_US),
            settle: MillisDurationU32::from_ticks(DEFAULT_SETTLE_MS),
            reference_frequency: HertzU32::from_raw(DEFAULT_REFERENCE_HZ),
            reference_divider: DEFAULT_REFERENCE_DIVIDER,
            max_isr_latency: MicrosDurationU32::from_ticks(DEFAULT_MAX_ISR_LATENCY_US),
            calibration_output: None,
        }
    }
}

impl MeterConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.wrap_threshold == 0 {
            return Err(ConfigError::ZeroWrapThreshold);
        }
        if self.wrap_threshold > COUNTER_MAX_WRAP_THRESHOLD {
            return Err(ConfigError::WrapThresholdTooWide(self.wrap_threshold));
        }
        if self.window.ticks() == 0 {
            return Err(ConfigError::ZeroWindow);
        }
        if self.reference_divider == 0 {
            return Err(ConfigError::ZeroDivider);
        }
        match self.counting_mode {
            CountingMode::Direct => {
                if !(1..=2).contains(&self.channel_count) {
                    return Err(ConfigError::BadChannelCount(self.channel_count));
                }
            }
            CountingMode::Reciprocal => {
                if self.reference_frequency.raw() == 0 {
                    return Err(ConfigError::MissingReference);
                }
            }
        }
        Ok(())
    }

    pub fn gate_window(&self) -> GateWindow {
        match self.counting_mode {
            CountingMode::Direct => GateWindow {
                mode: CountingMode::Direct,
                nominal_duration: Some(self.window),
                gate_source: GateSource::MasterTrigger,
            },
            CountingMode::Reciprocal => GateWindow {
                mode: CountingMode::Reciprocal,
                nominal_duration: None,
                gate_source: GateSource::SoftwareLatch,
            },
        }
    }

    /// Highest input frequency whose wraps can all be serviced before the next one lands.
    /// Above this the overflow count silently falls behind.
    pub fn max_trackable_frequency_hz(&self) -> Option<u64> {
        let latency_us = u64::from(self.max_isr_latency.ticks());
        if latency_us == 0 {
            return None;
        }
        Some((u64::from(self.wrap_threshold) + 1) * 1_000_000 / latency_us)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<MeterConfig, ConfigError> {
        if bytes.first() == Some(&ERASED_FLASH_BYTE) {
            return Err(ConfigError::Erased);
        }
        if bytes.len() < CONFIG_BLOCK_LENGTH {
            return Err(ConfigError::BadLength);
        }
        let crc_check = Crc::<u16>::new(&CRC_16_XMODEM);
        let mut cursor = Cursor::new(&bytes[..CONFIG_BLOCK_LENGTH]);
        let version = cursor.read_u8();
        let counting_mode = cursor.read_u8();
        let channel_count = cursor.read_u8();
        let reference_divider = cursor.read_u8();
        let wrap_threshold = cursor.read_u32();
        let window_us = cursor.read_u32();
        let settle_ms = cursor.read_u32();
        let reference_hz = cursor.read_u32();
        let max_isr_latency_us = cursor.read_u32();
        let calibration_output_hz = cursor.read_u32();
        let stored_crc = cursor.read_u16();
        if crc_check.checksum(&bytes[..CONFIG_PAYLOAD_LENGTH]) != stored_crc {
            return Err(ConfigError::BadCrc);
        }
        if version != CONFIG_FORMAT_VERSION {
            return Err(ConfigError::UnsupportedVersion(version));
        }
        let config = MeterConfig {
            counting_mode: CountingMode::try_from(counting_mode)?,
            channel_count,
            wrap_threshold,
            window: MicrosDurationU32::from_ticks(window_us),
            settle: MillisDurationU32::from_ticks(settle_ms),
            reference_frequency: HertzU32::from_raw(reference_hz),
            reference_divider,
            max_isr_latency: MicrosDurationU32::from_ticks(max_isr_latency_us),
            calibration_output: (calibration_output_hz != 0)
                .then(|| HertzU32::from_raw(calibration_output_hz)),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn to_bytes(&self) -> [u8; CONFIG_BLOCK_LENGTH] {
        let mut bytes = [0u8; CONFIG_BLOCK_LENGTH];
        {
            let mut cursor = CursorMut::new(&mut bytes);
            cursor.write_u8(CONFIG_FORMAT_VERSION);
            cursor.write_u8(self.counting_mode as u8);
            cursor.write_u8(self.channel_count);
            cursor.write_u8(self.reference_divider);
            cursor.write_u32(self.wrap_threshold);
            cursor.write_u32(self.window.ticks());
            cursor.write_u32(self.settle.ticks());
            cursor.write_u32(self.reference_frequency.raw());
            cursor.write_u32(self.max_isr_latency.ticks());
            cursor.write_u32(self.calibration_output.map_or(0, |hz| hz.raw()));
        }
        let crc_check = Crc::<u16>::new(&CRC_16_XMODEM);
        let crc = crc_check.checksum(&bytes[..CONFIG_PAYLOAD_LENGTH]);
        CursorMut::new(&mut bytes[CONFIG_PAYLOAD_LENGTH..]).write_u16(crc);
        bytes
    }
}
