use crate::gate::{Instant, Timebase};
use crate::re_exports::log::error;
use core::cell::RefCell;
use critical_section::Mutex;
use fugit::MicrosDurationU32;
use rp2040_hal::pac;
use rp2040_hal::timer::{Alarm, Alarm0};

/// Shared between the control loop, which arms it, and `TIMER_IRQ_0`, which acknowledges it.
pub type SharedAlarm = Mutex<RefCell<Option<Alarm0>>>;

/// TIMER alarm 0 as the master timebase. An alarm is one-shot, so each window re-arms it.
pub struct AlarmTimebase {
    alarm: &'static SharedAlarm,
}

impl AlarmTimebase {
    pub fn new(alarm: &'static SharedAlarm) -> AlarmTimebase {
        critical_section::with(|cs| {
            if let Some(alarm) = alarm.borrow_ref_mut(cs).as_mut() {
                alarm.enable_interrupt();
            }
        });
        AlarmTimebase { alarm }
    }
}

impl Timebase for AlarmTimebase {
    fn start(&mut self, period: MicrosDurationU32) {
        critical_section::with(|cs| match self.alarm.borrow_ref_mut(cs).as_mut() {
            Some(alarm) => {
                if alarm.schedule(period).is_err() {
                    error!("Failed to schedule window alarm for {}us", period.ticks());
                }
            }
            None => error!("Window alarm is not set up"),
        });
    }

    fn now(&self) -> Instant {
        read_timer()
    }
}

/// The 64-bit microsecond TIMER count. Usable from interrupt handlers, which don't own the
/// `Timer`. Reads the raw halves since the latched TIMEHR/TIMELR pair isn't safe to share
/// between the loop and an interrupt.
pub fn read_timer() -> Instant {
    let timer = unsafe { &*pac::TIMER::ptr() };
    let mut high = timer.timerawh().read().bits();
    loop {
        let low = timer.timerawl().read().bits();
        let high_again = timer.timerawh().read().bits();
        if high == high_again {
            return Instant::from_ticks((u64::from(high) << 32) | u64::from(low));
        }
        high = high_again;
    }
}

/// Acknowledge the alarm from its interrupt handler.
pub fn clear_alarm_interrupt(alarm: &SharedAlarm) {
    critical_section::with(|cs| {
        if let Some(alarm) = alarm.borrow_ref_mut(cs).as_mut() {
            alarm.clear_interrupt();
        }
    });
}
