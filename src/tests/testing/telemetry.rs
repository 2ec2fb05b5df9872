use crate::byte_slice_cursor::Cursor;
use crate::config::CountingMode;
use crate::frequency::Channels;
use crate::gate::WindowSignal;
use crate::orchestrator::Orchestrator;
use crate::publisher::{FramePublisher, LogPublisher, FRAME_LENGTH, FRAME_SYNC};
use crate::tests::helpers::{master_trigger_gate, software_latch_gate, ConfigBuilder};
use crate::tests::stubs::sim_bench::SimBench;
use crc::{Crc, CRC_16_XMODEM};
use std::vec::Vec;
use test_log::test;

struct DecodedFrame {
    sequence: u32,
    mode: u8,
    ready_flags: u8,
    counts: [u64; 2],
    millihertz: [u64; 2],
}

fn decode(frame: &[u8]) -> DecodedFrame {
    assert_eq!(frame.len(), FRAME_LENGTH);
    let crc = Crc::<u16>::new(&CRC_16_XMODEM).checksum(&frame[..FRAME_LENGTH - 2]);
    assert_eq!(
        u16::from_le_bytes([frame[FRAME_LENGTH - 2], frame[FRAME_LENGTH - 1]]),
        crc
    );
    let mut cursor = Cursor::new(frame);
    assert_eq!(cursor.read_u8(), FRAME_SYNC);
    cursor.read_u8();
    let sequence = cursor.read_u32();
    let mode = cursor.read_u8();
    let ready_flags = cursor.read_u8();
    let counts = [cursor.read_u64(), cursor.read_u64()];
    let millihertz = [cursor.read_u64(), cursor.read_u64()];
    DecodedFrame {
        sequence,
        mode,
        ready_flags,
        counts,
        millihertz,
    }
}

#[test]
fn every_direct_window_goes_out_as_a_frame() {
    let config = ConfigBuilder::new().direct(2).window_us(250_000).build();
    let bench = SimBench::new();
    let ch1 = bench.add_input(36_000_000);
    let ch2 = bench.add_input(1_000);
    let signal = WindowSignal::new();

    let mut orchestrator = Orchestrator::new(
        &config,
        master_trigger_gate(&bench, &signal, &config),
        Channels::pair(&*ch1, &*ch2),
        (LogPublisher, FramePublisher::new(Vec::new())),
    )
    .unwrap();
    for _ in 0..3 {
        orchestrator.step();
    }

    let sink = orchestrator.publisher().1.sink();
    assert_eq!(sink.len(), 3 * FRAME_LENGTH);
    for (i, frame) in sink.chunks(FRAME_LENGTH).enumerate() {
        let frame = decode(frame);
        assert_eq!(frame.sequence, i as u32 + 1);
        assert_eq!(frame.mode, CountingMode::Direct as u8);
        assert_eq!(frame.ready_flags, 0b11);
        assert_eq!(frame.counts, [9_000_000, 250]);
        assert_eq!(frame.millihertz, [36_000_000_000, 1_000_000]);
    }
}

#[test]
fn not_ready_reciprocal_window_is_flagged() {
    let config = ConfigBuilder::new()
        .reciprocal(8_000_040)
        .window_us(100_000)
        .settle_ms(5)
        .build();
    let bench = SimBench::new();
    let unknown = bench.add_input(5_000);
    let reference = bench.add_input(0);
    bench.attach_latch(&unknown);

    let mut orchestrator = Orchestrator::new(
        &config,
        software_latch_gate(&bench, &config),
        Channels::pair(&*unknown, &*reference),
        (LogPublisher, FramePublisher::new(Vec::new())),
    )
    .unwrap();
    orchestrator.step();
    bench.set_frequency(&reference, 8_000_040);
    orchestrator.step();

    let sink = orchestrator.publisher().1.sink();
    let frames: Vec<DecodedFrame> = sink.chunks(FRAME_LENGTH).map(decode).collect();
    assert_eq!(frames.len(), 2);

    assert_eq!(frames[0].mode, CountingMode::Reciprocal as u8);
    assert_eq!(frames[0].ready_flags, 0);
    assert_eq!(frames[0].counts[1], 0);
    assert_eq!(frames[0].millihertz, [0, 0]);

    assert_eq!(frames[1].ready_flags, 0b01);
    assert!(frames[1].millihertz[0].abs_diff(5_000_000) < 100);
    assert_eq!(frames[1].millihertz[1], 0);
}
