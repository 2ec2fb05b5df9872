//! Hardware edge counters extended in software to a wide "virtual" count.
//!
//! The hardware counter rolls over to zero after `wrap_threshold + 1` edges and raises a
//! wrap interrupt. The interrupt handler calls [`PulseCounter::on_overflow`], which bumps
//! an overflow count, so that at any time
//!
//! `virtual_count = hardware_count + overflow_count * (wrap_threshold + 1)`.
//!
//! The overflow count is shared between the wrap interrupt and the control loop, so it
//! lives behind a `critical_section::Mutex`. The RP2040 has no atomic read-modify-write
//! instructions, which rules out `AtomicU32::fetch_add` here anyway.
//!
//! Overflow tracking only works while every wrap is serviced before the next one happens.
//! An input faster than `(wrap_threshold + 1)` edges per worst case interrupt latency
//! loses wraps and the count silently comes up short. That is a property of the
//! hardware, nothing here tries to detect it.

use core::cell::Cell;
use critical_section::Mutex;

/// Register level access to one hardware edge counter.
///
/// Methods take `&self` since the underlying registers are shared with interrupt context.
pub trait CounterHardware {
    /// Current value of the hardware counter, `0..=wrap_threshold()`.
    fn count(&self) -> u32;
    fn reset_count(&self);
    /// Highest value the counter holds before rolling over to zero.
    fn wrap_threshold(&self) -> u32;
    /// Whether the counter has wrapped since the flag was last cleared.
    fn wrap_pending(&self) -> bool;
    fn clear_wrap(&self);
}

/// Something the frequency computer can take a window's total count from.
pub trait CountSource {
    /// Reads the total count for the window that just closed and zeroes it for the next one.
    ///
    /// Must only be called once the gate is closed and no more edges can arrive.
    fn snapshot_and_reset(&self) -> u64;
}

/// Combine a hardware count and overflow count into the total number of edges seen.
pub fn virtual_count(hardware_count: u32, overflow_count: u32, wrap_threshold: u32) -> u64 {
    u64::from(hardware_count) + u64::from(overflow_count) * (u64::from(wrap_threshold) + 1)
}

pub struct PulseCounter<H> {
    hardware: H,
    overflow_count: Mutex<Cell<u32>>,
}

impl<H: CounterHardware> PulseCounter<H> {
    pub const fn new(hardware: H) -> PulseCounter<H> {
        PulseCounter {
            hardware,
            overflow_count: Mutex::new(Cell::new(0)),
        }
    }

    pub fn hardware(&self) -> &H {
        &self.hardware
    }

    pub fn overflow_count(&self) -> u32 {
        critical_section::with(|cs| self.overflow_count.borrow(cs).get())
    }

    /// Wrap interrupt handler. Returns `true` if this counter had a wrap pending.
    ///
    /// The pending flag is cleared before returning, otherwise the interrupt fires again.
    pub fn on_overflow(&self) -> bool {
        critical_section::with(|cs| {
            if !self.hardware.wrap_pending() {
                return false;
            }
            self.hardware.clear_wrap();
            let overflow_count = self.overflow_count.borrow(cs);
            overflow_count.set(overflow_count.get().wrapping_add(1));
            true
        })
    }

    /// Total edges seen since the last reset, without disturbing anything.
    pub fn peek(&self) -> u64 {
        critical_section::with(|cs| {
            virtual_count(
                self.hardware.count(),
                self.overflow_count.borrow(cs).get(),
                self.hardware.wrap_threshold(),
            )
        })
    }
}

impl<H: CounterHardware> CountSource for PulseCounter<H> {
    fn snapshot_and_reset(&self) -> u64 {
        critical_section::with(|cs| {
            let overflow_count = self.overflow_count.borrow(cs);
            let mut overflows = overflow_count.get();
            // A wrap that happened just before the gate closed may not have been serviced yet.
            // It belongs to this window, and must not leak into the next one.
            if self.hardware.wrap_pending() {
                self.hardware.clear_wrap();
                overflows = overflows.wrapping_add(1);
            }
            let total = virtual_count(
                self.hardware.count(),
                overflows,
                self.hardware.wrap_threshold(),
            );
            self.hardware.reset_count();
            overflow_count.set(0);
            total
        })
    }
}
