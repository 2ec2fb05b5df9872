use crate::tests::stubs::sim_bench::SimBench;
use embedded_hal::delay::DelayNs;

/// Busy-wait stand in. Delays take no real time; when attached to a bench they move
/// its clock forward instead.
pub struct FakeDelay<'a> {
    elapsed_ns: u64,
    bench: Option<&'a SimBench>,
}

impl FakeDelay<'static> {
    pub fn new() -> FakeDelay<'static> {
        FakeDelay {
            elapsed_ns: 0,
            bench: None,
        }
    }
}

impl<'a> FakeDelay<'a> {
    pub fn on(bench: &'a SimBench) -> FakeDelay<'a> {
        FakeDelay {
            elapsed_ns: 0,
            bench: Some(bench),
        }
    }

    pub fn elapsed_ns(&self) -> u64 {
        self.elapsed_ns
    }
}

impl DelayNs for FakeDelay<'_> {
    fn delay_ns(&mut self, ns: u32) {
        self.elapsed_ns += u64::from(ns);
        if let Some(bench) = self.bench {
            bench.advance_by(u64::from(ns));
        }
    }
}
