/*
    fluxforge
    https://github.com/fluxforge/fluxforge

    Copyright 2025 the fluxforge authors

    Permission is hereby granted, free of charge, to any person obtaining a
    copy of this software and associated documentation files (the “Software”),
    to deal in the Software without restriction, including without limitation
    the rights to use, copy, modify, merge, publish, distribute, sublicense,
    and/or sell copies of the Software, and to permit persons to whom the
    Software is furnished to do so, subject to the following conditions:

    The above copyright notice and this permission notice shall be included in
    all copies or substantial portions of the Software.

    THE SOFTWARE IS PROVIDED “AS IS”, WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
    IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
    FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
    AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
    LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING
    FROM, OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER
    DEALINGS IN THE SOFTWARE.

    --------------------------------------------------------------------------

    tests/stream.rs

    The capture-stream wire format: opcode decoding, index-mark placement,
    error handling, and the encode/decode round trip.
*/

mod common;

use common::{init, Rng};
use fluxforge::{
    fluxmap::{FluxEventKind, Fluxmap, TICK_FREQUENCY},
    source::stream::{read_stream, write_stream, DEFAULT_SCLK},
    FluxError,
};

fn sclks_to_ticks(sclks: u64) -> u64 {
    (sclks as f64 * TICK_FREQUENCY / DEFAULT_SCLK).round() as u64
}

#[test]
fn single_byte_delay() {
    init();
    let fluxmap = read_stream(&[0xFF]).unwrap();
    assert_eq!(fluxmap.pulse_ct(), 1);
    assert_eq!(fluxmap.duration_ticks(), sclks_to_ticks(0xFF));
}

#[test]
fn two_byte_delay_carries_the_opcode_as_high_byte() {
    init();
    let fluxmap = read_stream(&[0x01, 0x00]).unwrap();
    assert_eq!(fluxmap.pulse_ct(), 1);
    assert_eq!(fluxmap.duration_ticks(), sclks_to_ticks(0x100));
}

#[test]
fn three_byte_delay_is_big_endian() {
    init();
    let fluxmap = read_stream(&[0x0C, 0x10, 0x00]).unwrap();
    assert_eq!(fluxmap.pulse_ct(), 1);
    assert_eq!(fluxmap.duration_ticks(), sclks_to_ticks(0x1000));
}

#[test]
fn overflow_opcodes_extend_the_next_delay() {
    init();
    // Two overflows and a one-byte delay: a single pulse after
    // 0x10000 + 0x10000 + 0x20 sample clocks.
    let fluxmap = read_stream(&[0x0B, 0x0B, 0x20]).unwrap();
    assert_eq!(fluxmap.pulse_ct(), 1);
    assert_eq!(fluxmap.duration_ticks(), sclks_to_ticks(0x20020));
}

#[test]
fn nops_are_skipped() {
    init();
    let fluxmap = read_stream(&[0x08, 0x09, 0xEE, 0x0A, 0xEE, 0xEE, 0x40]).unwrap();
    assert_eq!(fluxmap.pulse_ct(), 1);
    assert_eq!(fluxmap.duration_ticks(), sclks_to_ticks(0x40));
}

#[test]
fn index_mark_lands_between_the_right_pulses() {
    init();
    // A pulse of 0x1000 sclks, an index reported at stream position 3
    // (just past that pulse's bytes), then a pulse of 0xFF sclks.
    let bytes = [
        0x0C, 0x10, 0x00, // Flux3 0x1000
        0x0D, 0x02, 0x04, 0x00, 0x03, 0x00, 0x00, 0x00, // index @ pos 3
        0xFF, // Flux1 0xFF
    ];
    let fluxmap = read_stream(&bytes).unwrap();

    assert_eq!(fluxmap.pulse_ct(), 2);
    assert_eq!(fluxmap.index_ct(), 1);
    let kinds: Vec<FluxEventKind> = fluxmap.iter().map(|e| e.kind).collect();
    assert_eq!(
        kinds,
        vec![FluxEventKind::Pulse, FluxEventKind::Index, FluxEventKind::Pulse]
    );
    assert_eq!(fluxmap.events()[0].ticks as u64, sclks_to_ticks(0x1000));
    assert_eq!(fluxmap.events()[2].ticks as u64, sclks_to_ticks(0xFF));
}

#[test]
fn index_payload_longer_than_the_position_is_accepted() {
    init();
    // Real capture devices append sample and index counters to the index
    // block; everything past the position is skipped by length.
    let bytes = [
        0x50, // pulse
        0x0D, 0x02, 0x0C, 0x00, // index block, 12-byte payload
        0x01, 0x00, 0x00, 0x00, // stream position 1
        0xAA, 0xBB, 0xCC, 0xDD, // sample counter
        0x11, 0x22, 0x33, 0x44, // index counter
        0x60, // pulse
    ];
    let fluxmap = read_stream(&bytes).unwrap();
    assert_eq!(fluxmap.pulse_ct(), 2);
    assert_eq!(fluxmap.index_ct(), 1);
}

#[test]
fn unknown_oob_type_is_an_error() {
    init();
    let result = read_stream(&[0x50, 0x0D, 0x07, 0x00, 0x00]);
    assert!(matches!(result, Err(FluxError::UnknownBlock { block_type: 0x07, .. })));
}

#[test]
fn truncated_two_byte_delay_is_an_error() {
    init();
    assert!(matches!(read_stream(&[0x01]), Err(FluxError::Truncated { .. })));
}

#[test]
fn truncated_oob_payload_is_an_error() {
    init();
    // Index block declaring four payload bytes but carrying one.
    assert!(read_stream(&[0x0D, 0x02, 0x04, 0x00, 0x03]).is_err());
}

#[test]
fn hardware_fault_status_aborts_the_track() {
    init();
    let bytes = [
        0x50, // pulse
        0x0D, 0x03, 0x08, 0x00, // stream end block
        0x01, 0x00, 0x00, 0x00, // stream position
        0x02, 0x00, 0x00, 0x00, // status: no index signal
    ];
    assert!(matches!(
        read_stream(&bytes),
        Err(FluxError::HardwareFault(_))
    ));
}

#[test]
fn clean_stream_end_is_accepted() {
    init();
    let bytes = [
        0x50, // pulse
        0x0D, 0x03, 0x08, 0x00, // stream end block
        0x01, 0x00, 0x00, 0x00, // stream position
        0x00, 0x00, 0x00, 0x00, // status: ok
        0x0D, 0x0D, 0x0D, 0x0D, // end of stream
    ];
    let fluxmap = read_stream(&bytes).unwrap();
    assert_eq!(fluxmap.pulse_ct(), 1);
}

#[test]
fn device_info_overrides_the_sample_clock() {
    init();
    let info = b"sck=12013714.2857142625, ick=1501714.2857142625";
    let mut bytes = vec![0x0D, 0x04];
    bytes.extend_from_slice(&(info.len() as u16).to_le_bytes());
    bytes.extend_from_slice(info);
    bytes.push(0x50);

    let fluxmap = read_stream(&bytes).unwrap();
    let expected = (0x50 as f64 * TICK_FREQUENCY / 12_013_714.285_714_262_5).round() as u64;
    assert_eq!(fluxmap.duration_ticks(), expected);
}

#[test]
fn write_then_read_preserves_the_pulse_train() {
    init();
    let mut rng = Rng::new(0xF1_0CC5);
    let mut original = Fluxmap::new();
    for i in 0..500 {
        if i % 167 == 0 {
            original.append_index();
        }
        // Spread intervals across the one-, two- and three-byte encodings,
        // with a few forcing overflow opcodes.
        let ticks = rng.range(30.0, 120_000.0) as u32;
        original.append_interval(ticks);
        original.append_pulse();
    }

    let encoded = write_stream(&original);
    let decoded = read_stream(&encoded).unwrap();

    assert_eq!(decoded.pulse_ct(), original.pulse_ct());
    assert_eq!(decoded.index_ct(), original.index_ct());

    // Each pulse may shift by at most one tick of rounding.
    let difference = decoded.duration_ticks() as i64 - original.duration_ticks() as i64;
    assert!(
        difference.unsigned_abs() <= original.pulse_ct() as u64,
        "cumulative drift {} over {} pulses",
        difference,
        original.pulse_ct()
    );
}

#[test]
fn round_trip_places_index_marks_between_the_same_pulses() {
    init();
    let mut original = Fluxmap::new();
    original.append_interval(5_000);
    original.append_pulse();
    original.append_interval(5_000);
    original.append_pulse();
    original.append_index();
    original.append_interval(70_000);
    original.append_pulse();

    let decoded = read_stream(&write_stream(&original)).unwrap();
    let kinds: Vec<FluxEventKind> = decoded.iter().map(|e| e.kind).collect();
    assert_eq!(
        kinds,
        vec![
            FluxEventKind::Pulse,
            FluxEventKind::Pulse,
            FluxEventKind::Index,
            FluxEventKind::Pulse,
        ]
    );
}
