use crate::pulse_counter::CounterHardware;
use core::cell::Cell;

/// Stands in for a PWM slice counting edges on its B input.
pub struct SimCounter {
    wrap_threshold: u32,
    count: Cell<u32>,
    wrap_pending: Cell<bool>,
    enabled: Cell<bool>,
    enabled_at: Cell<Option<u64>>,
    disabled_at: Cell<Option<u64>>,
}

impl SimCounter {
    pub fn new(wrap_threshold: u32) -> SimCounter {
        SimCounter {
            wrap_threshold,
            count: Cell::new(0),
            wrap_pending: Cell::new(false),
            enabled: Cell::new(false),
            enabled_at: Cell::new(None),
            disabled_at: Cell::new(None),
        }
    }

    pub fn set_enabled(&self, enabled: bool, tick: u64) {
        if enabled && !self.enabled.get() {
            self.enabled_at.set(Some(tick));
        }
        if !enabled && self.enabled.get() {
            self.disabled_at.set(Some(tick));
        }
        self.enabled.set(enabled);
    }

    pub fn enabled(&self) -> bool {
        self.enabled.get()
    }

    /// Tick of the most recent enable.
    pub fn enabled_at(&self) -> Option<u64> {
        self.enabled_at.get()
    }

    pub fn disabled_at(&self) -> Option<u64> {
        self.disabled_at.get()
    }

    /// Apply up to `edges` input edges, stopping right after a wrap so the caller gets a
    /// chance to run the wrap interrupt. Returns how many edges were consumed.
    ///
    /// Edges while disabled are all consumed without counting. A wrap while another is
    /// still pending is lost, like on the real hardware.
    pub fn pulse(&self, edges: u64) -> u64 {
        if !self.enabled.get() || edges == 0 {
            return edges;
        }
        let until_wrap = u64::from(self.wrap_threshold - self.count.get()) + 1;
        if edges >= until_wrap {
            self.count.set(0);
            self.wrap_pending.set(true);
            until_wrap
        } else {
            self.count.set(self.count.get() + edges as u32);
            edges
        }
    }
}

impl CounterHardware for SimCounter {
    fn count(&self) -> u32 {
        self.count.get()
    }

    fn reset_count(&self) {
        self.count.set(0);
    }

    fn wrap_threshold(&self) -> u32 {
        self.wrap_threshold
    }

    fn wrap_pending(&self) -> bool {
        self.wrap_pending.get()
    }

    fn clear_wrap(&self) {
        self.wrap_pending.set(false);
    }
}
