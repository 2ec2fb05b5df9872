//! RP2040 PWM slices used as edge counters.
//!
//! In rising edge mode a slice's counter advances once per rising edge on its B pin.
//! With TOP = wrap threshold it rolls over to zero after `wrap_threshold + 1` edges and
//! sets the slice's bit in INTR, which fires `PWM_IRQ_WRAP` when enabled in INTE.
//!
//! A slice only counts while its bit in the shared EN register is set. Writing EN
//! starts or stops any set of slices together, which is what keeps the channels in
//! lockstep.

use crate::gate::TriggerOutput;
use crate::pulse_counter::CounterHardware;
use rp2040_hal::pac;

const CSR_DIVMODE_RISE: u32 = 0x2 << 4;
const DIV_INT_SHIFT: u32 = 4;

fn pwm() -> &'static pac::pwm::RegisterBlock {
    // Registers are only touched from here, either inside a critical section or with
    // single word writes.
    unsafe { &*pac::PWM::ptr() }
}

#[derive(Copy, Clone)]
pub struct PwmCounter {
    slice: u8,
}

impl PwmCounter {
    pub const fn new(slice: u8) -> PwmCounter {
        PwmCounter { slice }
    }

    pub fn slice(&self) -> u8 {
        self.slice
    }

    pub const fn mask(&self) -> u32 {
        1 << self.slice
    }

    fn ch(&self) -> &'static pac::pwm::CH {
        pwm().ch(usize::from(self.slice))
    }

    /// Count rising edges on the B pin, stopped, from zero.
    ///
    /// `wrap_threshold` must already be validated against the 16 bit counter.
    pub fn configure_edge_counter(&self, wrap_threshold: u32) {
        let ch = self.ch();
        ch.csr().write(|w| unsafe { w.bits(CSR_DIVMODE_RISE) });
        ch.div().write(|w| unsafe { w.bits(1 << DIV_INT_SHIFT) });
        ch.top().write(|w| unsafe { w.bits(wrap_threshold & 0xffff) });
        ch.ctr().write(|w| unsafe { w.bits(0) });
        self.clear_wrap();
    }

    /// Count the system clock divided by `divider`. Used as the reciprocal reference, so
    /// it is gated through EN like the input counters.
    pub fn configure_reference(&self, divider: u8, wrap_threshold: u32) {
        let ch = self.ch();
        ch.csr().write(|w| unsafe { w.bits(0) });
        ch.div()
            .write(|w| unsafe { w.bits(u32::from(divider) << DIV_INT_SHIFT) });
        ch.top().write(|w| unsafe { w.bits(wrap_threshold & 0xffff) });
        ch.ctr().write(|w| unsafe { w.bits(0) });
        self.clear_wrap();
    }

    pub fn enable_wrap_interrupt(&self) {
        critical_section::with(|_cs| {
            pwm()
                .inte()
                .modify(|r, w| unsafe { w.bits(r.bits() | self.mask()) });
        });
    }
}

impl CounterHardware for PwmCounter {
    fn count(&self) -> u32 {
        self.ch().ctr().read().bits() & 0xffff
    }

    fn reset_count(&self) {
        self.ch().ctr().write(|w| unsafe { w.bits(0) });
    }

    fn wrap_threshold(&self) -> u32 {
        self.ch().top().read().bits() & 0xffff
    }

    fn wrap_pending(&self) -> bool {
        pwm().intr().read().bits() & self.mask() != 0
    }

    fn clear_wrap(&self) {
        // Write 1 to clear.
        pwm().intr().write(|w| unsafe { w.bits(self.mask()) });
    }
}

/// Slices that start and stop together.
pub struct SliceGroup {
    mask: u32,
}

impl SliceGroup {
    pub const fn new(mask: u32) -> SliceGroup {
        SliceGroup { mask }
    }

    pub fn mask(&self) -> u32 {
        self.mask
    }
}

impl TriggerOutput for SliceGroup {
    fn broadcast(&self, running: bool) {
        critical_section::with(|_cs| {
            pwm().en().modify(|r, w| {
                let bits = if running {
                    r.bits() | self.mask
                } else {
                    r.bits() & !self.mask
                };
                unsafe { w.bits(bits) }
            });
        });
    }
}
