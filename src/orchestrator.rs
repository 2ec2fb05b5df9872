use crate::config::{ConfigError, CountingMode, MeterConfig};
use crate::frequency::{Channels, FrequencyComputer, Measurement};
use crate::gate::GateController;
use crate::publisher::Publisher;
use crate::re_exports::log::{info, warn};
use core::fmt;

/// Where the counters are in the current window. All channels share one gate, so they
/// move through these together.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "rp2040", derive(defmt::Format))]
pub enum ChannelState {
    Idle,
    Counting,
    Frozen,
    Snapshotted,
}

impl ChannelState {
    pub fn next(self) -> ChannelState {
        match self {
            ChannelState::Idle => ChannelState::Counting,
            ChannelState::Counting => ChannelState::Frozen,
            ChannelState::Frozen => ChannelState::Snapshotted,
            ChannelState::Snapshotted => ChannelState::Idle,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "rp2040", derive(defmt::Format))]
pub enum OrchestratorError {
    InvalidConfig(ConfigError),
    MissingReferenceChannel,
    ChannelCountMismatch { configured: u8, wired: u8 },
}

impl fmt::Display for OrchestratorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrchestratorError::InvalidConfig(e) => write!(f, "invalid config: {e}"),
            OrchestratorError::MissingReferenceChannel => {
                write!(f, "reciprocal counting needs a reference counter")
            }
            OrchestratorError::ChannelCountMismatch { configured, wired } => write!(
                f,
                "config asks for {configured} channel(s) but {wired} counter(s) are wired up"
            ),
        }
    }
}

pub struct Orchestrator<'a, G, P> {
    gate: G,
    computer: FrequencyComputer,
    channels: Channels<'a>,
    publisher: P,
    state: ChannelState,
}

impl<'a, G: GateController, P: Publisher> Orchestrator<'a, G, P> {
    pub fn new(
        config: &MeterConfig,
        gate: G,
        channels: Channels<'a>,
        publisher: P,
    ) -> Result<Self, OrchestratorError> {
        config.validate().map_err(OrchestratorError::InvalidConfig)?;
        let wired = 1 + u8::from(channels.secondary.is_some());
        match config.counting_mode {
            CountingMode::Direct if config.channel_count != wired => {
                return Err(OrchestratorError::ChannelCountMismatch {
                    configured: config.channel_count,
                    wired,
                });
            }
            CountingMode::Reciprocal if channels.secondary.is_none() => {
                return Err(OrchestratorError::MissingReferenceChannel);
            }
            _ => {}
        }
        match config.counting_mode {
            CountingMode::Direct => info!(
                "Direct counting, {} channel(s), {}us window",
                wired,
                config.window.ticks()
            ),
            CountingMode::Reciprocal => info!(
                "Reciprocal counting against {}Hz reference, gate held {}us",
                config.reference_frequency.raw(),
                config.window.ticks()
            ),
        }
        Ok(Orchestrator {
            gate,
            computer: FrequencyComputer::from_config(config),
            channels,
            publisher,
            state: ChannelState::Idle,
        })
    }

    pub fn state(&self) -> ChannelState {
        self.state
    }

    pub fn gate(&self) -> &G {
        &self.gate
    }

    pub fn publisher(&self) -> &P {
        &self.publisher
    }

    fn advance_to(&mut self, next: ChannelState) {
        if self.state.next() != next {
            warn!("Channel state went from {:?} to {:?}", self.state, next);
        }
        self.state = next;
    }

    /// One full window: open, wait for close, snapshot, compute, publish.
    pub fn step(&mut self) -> Measurement {
        self.advance_to(ChannelState::Counting);
        self.gate.open();
        self.gate.wait_for_close();
        self.advance_to(ChannelState::Frozen);

        let measurement = self
            .computer
            .complete_window(&self.channels, self.gate.measured_window());
        self.advance_to(ChannelState::Snapshotted);

        if let Err(e) = self.publisher.publish(&measurement) {
            warn!("Failed to publish window #{}: {}", measurement.sequence, e);
        }
        self.advance_to(ChannelState::Idle);
        measurement
    }

    pub fn run(&mut self) -> ! {
        loop {
            self.step();
        }
    }
}
