use crate::config::{CountingMode, MeterConfig};
use crate::pulse_counter::CountSource;
use fugit::{HertzU32, MicrosDurationU32};

pub const MAX_CHANNELS: usize = 2;

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Strategy {
    /// frequency = count / window
    Direct { window: MicrosDurationU32 },
    /// frequency = unknown count * reference frequency / reference count
    Reciprocal { reference: HertzU32 },
}

impl Strategy {
    pub fn mode(&self) -> CountingMode {
        match self {
            Strategy::Direct { .. } => CountingMode::Direct,
            Strategy::Reciprocal { .. } => CountingMode::Reciprocal,
        }
    }
}

/// The counters read at the end of one window.
///
/// In direct mode these are the measured channels. In reciprocal mode `secondary` is the
/// reference counter and must be present.
pub struct Channels<'a> {
    pub primary: &'a dyn CountSource,
    pub secondary: Option<&'a dyn CountSource>,
}

impl<'a> Channels<'a> {
    pub fn single(primary: &'a dyn CountSource) -> Self {
        Channels {
            primary,
            secondary: None,
        }
    }

    pub fn pair(primary: &'a dyn CountSource, secondary: &'a dyn CountSource) -> Self {
        Channels {
            primary,
            secondary: Some(secondary),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
#[cfg_attr(feature = "rp2040", derive(defmt::Format))]
pub struct Measurement {
    pub sequence: u32,
    pub mode: CountingMode,
    /// Total edges per channel for this window. In reciprocal mode `counts[1]` is the
    /// reference count.
    pub counts: [u64; MAX_CHANNELS],
    /// `None` where there is no valid reading for this window.
    pub frequency_hz: [Option<f64>; MAX_CHANNELS],
}

impl Measurement {
    pub fn is_ready(&self) -> bool {
        self.frequency_hz[0].is_some()
    }
}

pub fn direct_frequency(count: u64, window: MicrosDurationU32) -> f64 {
    count as f64 * 1_000_000.0 / f64::from(window.ticks())
}

/// `None` if no reference edges were seen, which would otherwise be a division by zero.
pub fn reciprocal_frequency(
    unknown_count: u64,
    reference: HertzU32,
    reference_count: u64,
) -> Option<f64> {
    if reference_count == 0 {
        return None;
    }
    // Product can easily exceed 32 bits (~1e11 for a second at 8MHz), and f64 loses
    // integer precision above 2^53, so build it exactly first.
    let product = u128::from(unknown_count) * u128::from(reference.raw());
    Some(product as f64 / reference_count as f64)
}

pub struct FrequencyComputer {
    strategy: Strategy,
    sequence: u32,
}

impl FrequencyComputer {
    pub fn new(strategy: Strategy) -> FrequencyComputer {
        FrequencyComputer {
            strategy,
            sequence: 0,
        }
    }

    pub fn from_config(config: &MeterConfig) -> FrequencyComputer {
        let strategy = match config.counting_mode {
            CountingMode::Direct => Strategy::Direct {
                window: config.window,
            },
            CountingMode::Reciprocal => Strategy::Reciprocal {
                reference: config.reference_frequency,
            },
        };
        FrequencyComputer::new(strategy)
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    /// Snapshot and reset every channel, then turn the counts into a measurement.
    ///
    /// Only call this after the gate has closed. In direct mode `measured_window`, when the
    /// gate knows it, replaces the nominal window.
    pub fn complete_window(
        &mut self,
        channels: &Channels,
        measured_window: Option<MicrosDurationU32>,
    ) -> Measurement {
        let counts = [
            channels.primary.snapshot_and_reset(),
            channels.secondary.map_or(0, CountSource::snapshot_and_reset),
        ];
        self.compute(counts, channels.secondary.is_some(), measured_window)
    }

    pub fn compute(
        &mut self,
        counts: [u64; MAX_CHANNELS],
        has_secondary: bool,
        measured_window: Option<MicrosDurationU32>,
    ) -> Measurement {
        self.sequence = self.sequence.wrapping_add(1);
        let frequency_hz = match self.strategy {
            Strategy::Direct { window } => {
                let window = measured_window
                    .filter(|measured| measured.ticks() != 0)
                    .unwrap_or(window);
                [
                    Some(direct_frequency(counts[0], window)),
                    has_secondary.then(|| direct_frequency(counts[1], window)),
                ]
            }
            Strategy::Reciprocal { reference } => [
                if has_secondary {
                    reciprocal_frequency(counts[0], reference, counts[1])
                } else {
                    None
                },
                None,
            ],
        };
        Measurement {
            sequence: self.sequence,
            mode: self.strategy.mode(),
            counts,
            frequency_hz,
        }
    }
}
