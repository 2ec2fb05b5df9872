use crate::frequency::Channels;
use crate::gate::{GateController, WindowSignal};
use crate::orchestrator::Orchestrator;
use crate::tests::helpers::{
    master_trigger_gate, software_latch_gate, ConfigBuilder, RecordingPublisher,
};
use crate::tests::stubs::sim_bench::{SimBench, TriggerEvent};
use fugit::ExtU32;
use test_log::test;

#[test]
fn slaves_start_and_stop_on_the_same_tick() {
    let config = ConfigBuilder::new().direct(2).window_us(20).build();
    let bench = SimBench::new();
    let ch1 = bench.add_input(5_000_000);
    let ch2 = bench.add_input(3);
    let signal = WindowSignal::new();

    let mut gate = master_trigger_gate(&bench, &signal, &config);
    bench.advance_by(1_234);
    gate.open();
    assert!(ch1.hardware().enabled());
    assert_eq!(ch1.hardware().enabled_at(), Some(1_234));
    assert_eq!(ch2.hardware().enabled_at(), Some(1_234));

    gate.wait_for_close();
    assert!(!ch1.hardware().enabled());
    assert!(!ch2.hardware().enabled());
    assert_eq!(ch1.hardware().disabled_at(), Some(21_234));
    assert_eq!(ch2.hardware().disabled_at(), Some(21_234));
    assert_eq!(gate.measured_window(), Some(20.micros()));
    assert_eq!(
        bench.trigger_log(),
        [
            TriggerEvent {
                at_ns: 1_234,
                running: true
            },
            TriggerEvent {
                at_ns: 21_234,
                running: false
            },
        ]
    );
}

#[test]
fn timebase_is_rearmed_every_window() {
    let config = ConfigBuilder::new().direct(2).window_us(10_000).build();
    let bench = SimBench::new();
    let ch1 = bench.add_input(1_000);
    let ch2 = bench.add_input(2_000);
    let signal = WindowSignal::new();

    let mut orchestrator = Orchestrator::new(
        &config,
        master_trigger_gate(&bench, &signal, &config),
        Channels::pair(&*ch1, &*ch2),
        RecordingPublisher::default(),
    )
    .unwrap();
    for _ in 0..3 {
        orchestrator.step();
    }

    let log = bench.trigger_log();
    assert_eq!(log.len(), 6);
    for (i, pair) in log.chunks(2).enumerate() {
        let start = i as u64 * 10_000_000;
        assert_eq!(pair[0].at_ns, start);
        assert!(pair[0].running);
        assert_eq!(pair[1].at_ns, start + 10_000_000);
        assert!(!pair[1].running);
    }
    assert_eq!(signal.take_missed(), 0);
}

#[test]
fn latch_enables_unknown_and_reference_together() {
    let config = ConfigBuilder::new()
        .reciprocal(8_000_040)
        .window_us(1_000)
        .settle_ms(1)
        .build();
    let bench = SimBench::new();
    let unknown = bench.add_input(100_000);
    let reference = bench.add_input(8_000_040);
    bench.attach_latch(&unknown);

    let mut gate = software_latch_gate(&bench, &config);
    gate.open();
    // Nothing happens until the first unknown edge clocks the latch.
    assert!(!unknown.hardware().enabled());
    gate.wait_for_close();

    // First and last edges of a 100kHz input around a 1ms gate.
    assert_eq!(unknown.hardware().enabled_at(), Some(10_000));
    assert_eq!(reference.hardware().enabled_at(), Some(10_000));
    assert_eq!(unknown.hardware().disabled_at(), Some(1_010_000));
    assert_eq!(reference.hardware().disabled_at(), Some(1_010_000));
}
