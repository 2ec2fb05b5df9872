use crate::byte_slice_cursor::CursorMut;
use crate::config::CountingMode;
use crate::frequency::Measurement;
use crate::re_exports::log::{info, warn};
use core::fmt;
use crc::{Crc, CRC_16_XMODEM};
use num_traits::float::FloatCore;

pub const FRAME_SYNC: u8 = 0xa5;
pub const FRAME_VERSION: u8 = 1;
pub const FRAME_LENGTH: usize = 42;
const FRAME_PAYLOAD_LENGTH: usize = FRAME_LENGTH - 2;

const READY_CH1: u8 = 1 << 0;
const READY_CH2: u8 = 1 << 1;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "rp2040", derive(defmt::Format))]
pub enum PublishError {
    Io,
}

impl fmt::Display for PublishError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PublishError::Io => write!(f, "telemetry sink write failed"),
        }
    }
}

/// Where each window's result goes. Display, telemetry link, or both.
pub trait Publisher {
    fn publish(&mut self, measurement: &Measurement) -> Result<(), PublishError>;
}

/// Publishes to both, even if the first fails.
impl<A: Publisher, B: Publisher> Publisher for (A, B) {
    fn publish(&mut self, measurement: &Measurement) -> Result<(), PublishError> {
        let first = self.0.publish(measurement);
        let second = self.1.publish(measurement);
        first.and(second)
    }
}

#[derive(Default)]
pub struct LogPublisher;

impl Publisher for LogPublisher {
    fn publish(&mut self, m: &Measurement) -> Result<(), PublishError> {
        match (m.mode, m.frequency_hz) {
            (CountingMode::Direct, [Some(ch1), Some(ch2)]) => {
                info!("#{} ch1 {} Hz, ch2 {} Hz", m.sequence, ch1, ch2);
            }
            (CountingMode::Direct, [Some(ch1), None]) => {
                info!("#{} ch1 {} Hz", m.sequence, ch1);
            }
            (CountingMode::Reciprocal, [Some(hz), _]) => {
                info!(
                    "#{} {} Hz ({} edges against {} reference edges)",
                    m.sequence, hz, m.counts[0], m.counts[1]
                );
            }
            (CountingMode::Reciprocal, [None, _]) => {
                warn!(
                    "#{} not ready, reference counter saw no edges ({} input edges)",
                    m.sequence, m.counts[0]
                );
            }
            (CountingMode::Direct, _) => {
                warn!("#{} not ready", m.sequence);
            }
        }
        Ok(())
    }
}

/// Frequency in integer millihertz for the wire. Not-ready channels go out as zero.
pub fn to_millihertz(frequency_hz: Option<f64>) -> u64 {
    match frequency_hz {
        Some(hz) if hz.is_finite() && hz > 0.0 => FloatCore::round(hz * 1000.0) as u64,
        _ => 0,
    }
}

pub fn encode_frame(m: &Measurement) -> [u8; FRAME_LENGTH] {
    let mut frame = [0u8; FRAME_LENGTH];
    let mut flags = 0u8;
    if m.frequency_hz[0].is_some() {
        flags |= READY_CH1;
    }
    if m.frequency_hz[1].is_some() {
        flags |= READY_CH2;
    }
    {
        let mut cursor = CursorMut::new(&mut frame);
        cursor.write_u8(FRAME_SYNC);
        cursor.write_u8(FRAME_VERSION);
        cursor.write_u32(m.sequence);
        cursor.write_u8(m.mode as u8);
        cursor.write_u8(flags);
        for count in m.counts {
            cursor.write_u64(count);
        }
        for frequency_hz in m.frequency_hz {
            cursor.write_u64(to_millihertz(frequency_hz));
        }
    }
    let crc = Crc::<u16>::new(&CRC_16_XMODEM).checksum(&frame[..FRAME_PAYLOAD_LENGTH]);
    CursorMut::new(&mut frame[FRAME_PAYLOAD_LENGTH..]).write_u16(crc);
    frame
}

/// Writes every measurement as a binary frame to a byte sink, e.g. a UART.
pub struct FramePublisher<W> {
    sink: W,
}

impl<W: embedded_io::Write> FramePublisher<W> {
    pub fn new(sink: W) -> Self {
        FramePublisher { sink }
    }

    pub fn sink(&self) -> &W {
        &self.sink
    }
}

impl<W: embedded_io::Write> Publisher for FramePublisher<W> {
    fn publish(&mut self, measurement: &Measurement) -> Result<(), PublishError> {
        let frame = encode_frame(measurement);
        self.sink.write_all(&frame).map_err(|_| PublishError::Io)?;
        self.sink.flush().map_err(|_| PublishError::Io)
    }
}
