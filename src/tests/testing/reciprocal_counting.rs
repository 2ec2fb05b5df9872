use crate::config::CountingMode;
use crate::frequency::Channels;
use crate::orchestrator::Orchestrator;
use crate::tests::helpers::{
    assert_close, run_windows, software_latch_gate, ConfigBuilder, RecordingPublisher,
};
use crate::tests::stubs::sim_bench::SimBench;
use test_log::test;

const REFERENCE_HZ: u32 = 8_000_040;

#[test]
fn low_frequency_against_reference() {
    let config = ConfigBuilder::new()
        .reciprocal(REFERENCE_HZ)
        .window_us(1_000_000)
        .settle_ms(1_000)
        .build();
    let bench = SimBench::new();
    let unknown = bench.add_input(98_760);
    let reference = bench.add_input(u64::from(REFERENCE_HZ));
    bench.attach_latch(&unknown);

    let mut orchestrator = Orchestrator::new(
        &config,
        software_latch_gate(&bench, &config),
        Channels::pair(&*unknown, &*reference),
        RecordingPublisher::default(),
    )
    .unwrap();

    let m = orchestrator.step();
    assert_eq!(m.mode, CountingMode::Reciprocal);
    assert!(m.is_ready());
    // The latch opens and closes on edges of the unknown signal, so that channel sees a
    // whole number of its own periods, a bit over the 1s the gate output is held.
    assert!((98_760..=98_761).contains(&m.counts[0]), "{}", m.counts[0]);
    assert!((8_000_000..=8_100_000).contains(&m.counts[1]), "{}", m.counts[1]);
    assert_close(m.frequency_hz[0].unwrap(), 98_760.0, 0.05);
    assert_eq!(m.frequency_hz[1], None);
    assert!(!bench.latch_output());
    // Gate held 1s then 1s settle.
    assert!(bench.now_ns() >= 2_000_000_000);
}

#[test]
fn gate_length_drops_out_of_the_result() {
    let bench = SimBench::new();
    let unknown = bench.add_input(12_345);
    let reference = bench.add_input(u64::from(REFERENCE_HZ));
    bench.attach_latch(&unknown);

    for window_us in [100_000, 250_000, 1_000_000] {
        let config = ConfigBuilder::new()
            .reciprocal(REFERENCE_HZ)
            .window_us(window_us)
            .settle_ms(10)
            .build();
        let mut orchestrator = Orchestrator::new(
            &config,
            software_latch_gate(&bench, &config),
            Channels::pair(&*unknown, &*reference),
            RecordingPublisher::default(),
        )
        .unwrap();
        let m = orchestrator.step();
        assert_close(m.frequency_hz[0].unwrap(), 12_345.0, 0.05);
    }
}

#[test]
fn dead_reference_is_not_ready_and_recovers() {
    let config = ConfigBuilder::new()
        .reciprocal(REFERENCE_HZ)
        .window_us(500_000)
        .settle_ms(10)
        .build();
    let bench = SimBench::new();
    let unknown = bench.add_input(98_760);
    let reference = bench.add_input(0);
    bench.attach_latch(&unknown);

    let mut orchestrator = Orchestrator::new(
        &config,
        software_latch_gate(&bench, &config),
        Channels::pair(&*unknown, &*reference),
        RecordingPublisher::default(),
    )
    .unwrap();

    let stalled = orchestrator.step();
    assert!(!stalled.is_ready());
    assert_eq!(stalled.counts[1], 0);
    assert!(stalled.counts[0] > 0);

    bench.set_frequency(&reference, u64::from(REFERENCE_HZ));
    let recovered = run_windows(&mut orchestrator, 2);
    for m in &recovered {
        assert_close(m.frequency_hz[0].unwrap(), 98_760.0, 0.1);
    }
    assert_eq!(orchestrator.publisher().published.len(), 3);
}

#[test]
fn silent_input_never_opens_the_latch() {
    let config = ConfigBuilder::new()
        .reciprocal(REFERENCE_HZ)
        .window_us(100_000)
        .settle_ms(10)
        .build();
    let bench = SimBench::new();
    let unknown = bench.add_input(0);
    let reference = bench.add_input(u64::from(REFERENCE_HZ));
    bench.attach_latch(&unknown);

    let mut orchestrator = Orchestrator::new(
        &config,
        software_latch_gate(&bench, &config),
        Channels::pair(&*unknown, &*reference),
        RecordingPublisher::default(),
    )
    .unwrap();

    let m = orchestrator.step();
    assert_eq!(m.counts, [0, 0]);
    assert!(!m.is_ready());
    assert!(bench.trigger_log().is_empty());
}
