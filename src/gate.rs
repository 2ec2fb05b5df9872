//! Measurement window generation.
//!
//! Two ways of gating the counters:
//!
//! - [`MasterTriggerGate`]: a one-shot timebase calibrated to the nominal window is the master.
//!   Its run state is broadcast to every slave counter in a single operation, so all channels
//!   start and stop counting on the same clock edge. When the period elapses the timebase
//!   interrupt calls [`close_window`], which freezes the slaves and signals the control loop.
//!   The open and close are both timestamped right before the broadcast, so interrupt
//!   latency lengthens the measured window instead of skewing the result.
//! - [`SoftwareLatchGate`]: the firmware drives a gate output high for a calibrated time, then
//!   low. An external edge triggered latch turns that into the physical gate seen by both the
//!   unknown-signal counter and the reference counter. The firmware never knows the window's
//!   exact length, which is fine because reciprocal counting cancels it out.

use crate::re_exports::log::{error, warn};
use core::cell::Cell;
use critical_section::Mutex;
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;
use fugit::{MicrosDurationU32, MillisDurationU32, TimerInstantU64};

/// Microsecond timestamp from the free running system timer.
pub type Instant = TimerInstantU64<1_000_000>;

pub trait GateController {
    /// Start a new window. The counters must already have been reset.
    fn open(&mut self);

    /// Block until the window has closed and no more edges can reach the counters.
    fn wait_for_close(&mut self);

    /// How long the counters were actually enabled for the last window, if the gate can
    /// tell. `None` means use the nominal window.
    fn measured_window(&self) -> Option<MicrosDurationU32> {
        None
    }
}

/// The master's run state as seen by its slave counters.
pub trait TriggerOutput {
    /// Enable (`true`) or freeze (`false`) every slave counter in one operation.
    fn broadcast(&self, running: bool);
}

/// One-shot timer acting as synchronization master.
pub trait Timebase {
    /// Run for a single `period`. The timebase stops by itself once it elapses, so this
    /// must be called again for every window.
    fn start(&mut self, period: MicrosDurationU32);

    fn now(&self) -> Instant;
}

/// Single slot window-close notification from interrupt context to the control loop.
/// Carries the time the slaves were frozen.
pub struct WindowSignal {
    closed_at: Mutex<Cell<Option<Instant>>>,
    missed: Mutex<Cell<u32>>,
}

impl WindowSignal {
    pub const fn new() -> WindowSignal {
        WindowSignal {
            closed_at: Mutex::new(Cell::new(None)),
            missed: Mutex::new(Cell::new(0)),
        }
    }

    pub fn raise(&self, closed_at: Instant) {
        critical_section::with(|cs| {
            if self.closed_at.borrow(cs).replace(Some(closed_at)).is_some() {
                let missed = self.missed.borrow(cs);
                missed.set(missed.get().wrapping_add(1));
            }
        });
    }

    /// Returns the close time once per raised window close.
    pub fn take(&self) -> Option<Instant> {
        critical_section::with(|cs| self.closed_at.borrow(cs).take())
    }

    /// Look without taking, e.g. to decide whether it is safe to sleep.
    pub fn is_raised(&self) -> bool {
        critical_section::with(|cs| self.closed_at.borrow(cs).get().is_some())
    }

    pub fn clear(&self) {
        critical_section::with(|cs| self.closed_at.borrow(cs).set(None));
    }

    /// Window closes that were raised again before the loop picked up the previous one,
    /// since the last call.
    pub fn take_missed(&self) -> u32 {
        critical_section::with(|cs| self.missed.borrow(cs).replace(0))
    }
}

impl Default for WindowSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Timebase period-elapsed handler. Freezes the slaves before telling anyone the window is
/// over. `now` is read just before the broadcast, the same way [`MasterTriggerGate`] stamps
/// the open.
pub fn close_window<S: TriggerOutput + ?Sized>(trigger: &S, signal: &WindowSignal, now: Instant) {
    trigger.broadcast(false);
    signal.raise(now);
}

/// Latch feedback handler for reciprocal counting where the latch output can't gate the
/// counters in hardware directly.
pub fn on_latch_edge<S: TriggerOutput + ?Sized>(trigger: &S, latch_is_high: bool) {
    trigger.broadcast(latch_is_high);
}

pub struct MasterTriggerGate<'a, T, S: ?Sized, I> {
    timebase: T,
    trigger: &'a S,
    signal: &'a WindowSignal,
    period: MicrosDurationU32,
    idle: I,
    opened_at: Option<Instant>,
    measured: Option<MicrosDurationU32>,
}

impl<'a, T, S, I> MasterTriggerGate<'a, T, S, I>
where
    T: Timebase,
    S: TriggerOutput + ?Sized,
    I: FnMut(),
{
    /// `idle` is called while waiting for the window to close, `wfi` on the device.
    pub fn new(
        timebase: T,
        trigger: &'a S,
        signal: &'a WindowSignal,
        period: MicrosDurationU32,
        idle: I,
    ) -> Self {
        MasterTriggerGate {
            timebase,
            trigger,
            signal,
            period,
            idle,
            opened_at: None,
            measured: None,
        }
    }

    pub fn period(&self) -> MicrosDurationU32 {
        self.period
    }
}

impl<T, S, I> GateController for MasterTriggerGate<'_, T, S, I>
where
    T: Timebase,
    S: TriggerOutput + ?Sized,
    I: FnMut(),
{
    fn open(&mut self) {
        self.measured = None;
        self.opened_at = Some(critical_section::with(|_cs| {
            self.signal.clear();
            let opened_at = self.timebase.now();
            self.trigger.broadcast(true);
            self.timebase.start(self.period);
            opened_at
        }));
    }

    fn wait_for_close(&mut self) {
        let closed_at = loop {
            if let Some(closed_at) = self.signal.take() {
                break closed_at;
            }
            (self.idle)();
        };
        let missed = self.signal.take_missed();
        if missed != 0 {
            warn!("{} window closes were raised before being handled", missed);
        }
        self.measured = self
            .opened_at
            .take()
            .and_then(|opened_at| closed_at.checked_duration_since(opened_at))
            .and_then(|elapsed| u32::try_from(elapsed.ticks()).ok())
            .filter(|&us| us != 0)
            .map(MicrosDurationU32::from_ticks);
        if self.measured.is_none() {
            warn!("Couldn't time the last window, using the nominal {}us", self.period.ticks());
        }
    }

    fn measured_window(&self) -> Option<MicrosDurationU32> {
        self.measured
    }
}

pub struct SoftwareLatchGate<P, D> {
    gate: P,
    delay: D,
    hold: MicrosDurationU32,
    settle: MillisDurationU32,
}

impl<P: OutputPin, D: DelayNs> SoftwareLatchGate<P, D> {
    pub fn new(gate: P, delay: D, hold: MicrosDurationU32, settle: MillisDurationU32) -> Self {
        SoftwareLatchGate {
            gate,
            delay,
            hold,
            settle,
        }
    }

    pub fn release(self) -> (P, D) {
        (self.gate, self.delay)
    }
}

impl<P: OutputPin, D: DelayNs> GateController for SoftwareLatchGate<P, D> {
    fn open(&mut self) {
        if self.gate.set_high().is_err() {
            error!("Failed to raise gate output");
        }
    }

    fn wait_for_close(&mut self) {
        self.delay.delay_us(self.hold.ticks());
        if self.gate.set_low().is_err() {
            error!("Failed to drop gate output");
        }
        // Give the latch time to follow the last edge of the measured signal.
        self.delay.delay_ms(self.settle.ticks());
    }
}
