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

    src/source/stream.rs

    The capture-stream wire format: 8-bit opcodes carrying pulse delays in
    sample-clock units, with out-of-band blocks for index marks and device
    metadata. One such stream holds every revolution captured from a single
    (track, side).

    The stream is read in two passes. The first collects the stream
    positions of the index marks, which the device reports asynchronously;
    the second converts pulse delays to ticks and attaches each index mark
    just before the first pulse at or past its position.
*/

use std::io::{Cursor, Seek, SeekFrom};

use binrw::{binrw, BinRead};
use regex::Regex;

use crate::{
    fluxmap::{Fluxmap, TICK_FREQUENCY},
    FluxError,
};

/// Clocks of the capture device, derived from its master crystal.
pub const DEFAULT_MCLK: f64 = (18_432_000.0 * 73.0 / 14.0) / 2.0;
pub const DEFAULT_SCLK: f64 = DEFAULT_MCLK / 2.0;
pub const DEFAULT_ICLK: f64 = DEFAULT_MCLK / 16.0;

const OP_NOP1: u8 = 0x08;
const OP_NOP2: u8 = 0x09;
const OP_NOP3: u8 = 0x0A;
const OP_OVL16: u8 = 0x0B;
const OP_FLUX3: u8 = 0x0C;
const OP_OOB: u8 = 0x0D;

const OOB_STREAM_INFO: u8 = 0x01;
const OOB_INDEX: u8 = 0x02;
const OOB_STREAM_END: u8 = 0x03;
const OOB_DEVICE_INFO: u8 = 0x04;
const OOB_END_OF_STREAM: u8 = 0x0D;

#[binrw]
#[brw(little)]
struct PositionPayload {
    stream_pos: u32,
}

#[binrw]
#[brw(little)]
struct StreamEndPayload {
    stream_pos: u32,
    hw_status:  u32,
}

/// Decode a capture stream into a Fluxmap.
pub fn read_stream(data: &[u8]) -> Result<Fluxmap, FluxError> {
    let index_marks = scan_index_positions(data)?;
    log::debug!(
        "read_stream(): {} bytes, {} index marks",
        data.len(),
        index_marks.len()
    );
    decode_pulses(data, &index_marks)
}

/// First pass: collect index-mark stream positions, skipping everything
/// else as cheaply as possible.
fn scan_index_positions(data: &[u8]) -> Result<Vec<u32>, FluxError> {
    let mut cur = Cursor::new(data);
    let mut marks = Vec::new();

    while (cur.position() as usize) < data.len() {
        let offset = cur.position();
        let op = take_u8(&mut cur)?;
        match op {
            0x00..=0x07 => skip(&mut cur, 1)?,
            OP_NOP1 => {}
            OP_NOP2 => skip(&mut cur, 1)?,
            OP_NOP3 => skip(&mut cur, 2)?,
            OP_OVL16 => {}
            OP_FLUX3 => skip(&mut cur, 2)?,
            OP_OOB => {
                let block_type = take_u8(&mut cur)?;
                if block_type == OOB_END_OF_STREAM {
                    break;
                }
                let size = take_u16_le(&mut cur)? as u64;
                match block_type {
                    OOB_INDEX => {
                        if size < 4 {
                            return Err(FluxError::Truncated { offset });
                        }
                        let payload = PositionPayload::read(&mut cur)?;
                        marks.push(payload.stream_pos);
                        skip(&mut cur, size - 4)?;
                    }
                    OOB_STREAM_INFO | OOB_STREAM_END | OOB_DEVICE_INFO => skip(&mut cur, size)?,
                    _ => {
                        return Err(FluxError::UnknownBlock { block_type, offset });
                    }
                }
            }
            _ => {} // Flux1
        }
    }

    marks.sort_unstable();
    Ok(marks)
}

/// Second pass: the flux data itself. `stream_pos` counts in-band bytes
/// only; out-of-band blocks report positions in that coordinate, adjusted
/// by the baseline delta when the device's counter doesn't start at zero.
fn decode_pulses(data: &[u8], index_marks: &[u32]) -> Result<Fluxmap, FluxError> {
    let mut cur = Cursor::new(data);
    let mut fluxmap = Fluxmap::new();

    let mut sck = DEFAULT_SCLK;
    let mut stream_pos: u64 = 0;
    let mut stream_delta: i64 = 0;
    let mut extra_sclks: u32 = 0;
    let mut next_mark = 0usize;

    while (cur.position() as usize) < data.len() {
        let offset = cur.position();
        // An index mark at stream position p precedes the pulse whose
        // opcode starts at or past p.
        let pulse_stream_pos = stream_pos;
        let op = take_u8(&mut cur)?;
        match op {
            0x00..=0x07 => {
                let low = take_u8(&mut cur)?;
                let sclks = u16::from_be_bytes([op, low]) as u32;
                stream_pos += 2;
                append_pulse(
                    &mut fluxmap,
                    index_marks,
                    &mut next_mark,
                    stream_delta,
                    pulse_stream_pos,
                    extra_sclks + sclks,
                    sck,
                );
                extra_sclks = 0;
            }
            OP_NOP1 => stream_pos += 1,
            OP_NOP2 => {
                skip(&mut cur, 1)?;
                stream_pos += 2;
            }
            OP_NOP3 => {
                skip(&mut cur, 2)?;
                stream_pos += 3;
            }
            OP_OVL16 => {
                // The next pulse is 0x10000 sample clocks longer than
                // its operand says.
                extra_sclks = extra_sclks.saturating_add(0x10000);
                stream_pos += 1;
            }
            OP_FLUX3 => {
                let sclks = take_u16_be(&mut cur)? as u32;
                stream_pos += 3;
                append_pulse(
                    &mut fluxmap,
                    index_marks,
                    &mut next_mark,
                    stream_delta,
                    pulse_stream_pos,
                    extra_sclks + sclks,
                    sck,
                );
                extra_sclks = 0;
            }
            OP_OOB => {
                let block_type = take_u8(&mut cur)?;
                if block_type == OOB_END_OF_STREAM {
                    log::trace!("decode_pulses(): end-of-stream block at {:#x}", offset);
                    break;
                }
                let size = take_u16_le(&mut cur)? as u64;
                match block_type {
                    OOB_STREAM_INFO => {
                        if size < 4 {
                            return Err(FluxError::Truncated { offset });
                        }
                        let payload = PositionPayload::read(&mut cur)?;
                        // Re-bases the device's position counter onto ours.
                        stream_delta = stream_pos as i64 - payload.stream_pos as i64;
                        skip(&mut cur, size - 4)?;
                    }
                    OOB_INDEX => skip(&mut cur, size)?,
                    OOB_STREAM_END => {
                        if size < 8 {
                            return Err(FluxError::Truncated { offset });
                        }
                        let payload = StreamEndPayload::read(&mut cur)?;
                        check_hw_status(payload.hw_status)?;
                        skip(&mut cur, size - 8)?;
                    }
                    OOB_DEVICE_INFO => {
                        let text = take_ascii(&mut cur, size)?;
                        log::debug!("decode_pulses(): device info: {}", text.trim_end());
                        if let Some(new_sck) = parse_sck(&text) {
                            log::debug!("decode_pulses(): sample clock set to {:.2} Hz", new_sck);
                            sck = new_sck;
                        }
                    }
                    _ => {
                        return Err(FluxError::UnknownBlock { block_type, offset });
                    }
                }
            }
            _ => {
                // Flux1
                stream_pos += 1;
                append_pulse(
                    &mut fluxmap,
                    index_marks,
                    &mut next_mark,
                    stream_delta,
                    pulse_stream_pos,
                    extra_sclks + op as u32,
                    sck,
                );
                extra_sclks = 0;
            }
        }
    }

    if next_mark < index_marks.len() {
        log::warn!(
            "decode_pulses(): {} index marks past the last pulse were dropped",
            index_marks.len() - next_mark
        );
    }

    Ok(fluxmap)
}

fn append_pulse(
    fluxmap: &mut Fluxmap,
    index_marks: &[u32],
    next_mark: &mut usize,
    stream_delta: i64,
    pulse_stream_pos: u64,
    sclks: u32,
    sck: f64,
) {
    while *next_mark < index_marks.len() {
        let fire_at = index_marks[*next_mark] as i64 + stream_delta;
        if pulse_stream_pos as i64 >= fire_at {
            fluxmap.append_index();
            *next_mark += 1;
        }
        else {
            break;
        }
    }

    let ticks = (sclks as f64 * TICK_FREQUENCY / sck).round() as u32;
    fluxmap.append_interval(ticks);
    fluxmap.append_pulse();
}

fn check_hw_status(status: u32) -> Result<(), FluxError> {
    match status {
        0 => Ok(()),
        1 => Err(FluxError::HardwareFault("buffer overrun recorded in stream")),
        2 => Err(FluxError::HardwareFault("no index signal detected")),
        _ => {
            log::warn!("check_hw_status(): unknown hardware status {}", status);
            Ok(())
        }
    }
}

/// Pull `sck=` out of a device info string such as
/// `sck=24027428.5714285, ick=3003428.5714285625`.
fn parse_sck(text: &str) -> Option<f64> {
    let re = Regex::new(r"sck=(\d+(?:\.\d+)?)").unwrap();
    re.captures(text)?.get(1)?.as_str().parse().ok()
}

/// Encode a Fluxmap back into the wire format. Index marks are written as
/// index blocks with a fresh stream-position baseline, so a decode of the
/// output reproduces the pulse train and mark placement.
pub fn write_stream(fluxmap: &Fluxmap) -> Vec<u8> {
    use crate::fluxmap::FluxEventKind;

    let ticks_per_sclk = TICK_FREQUENCY / DEFAULT_SCLK;
    let mut out: Vec<u8> = Vec::new();
    let mut stream_pos: u32 = 0;
    let mut carry_ticks: u64 = 0;

    for event in fluxmap.iter() {
        match event.kind {
            FluxEventKind::Index => {
                carry_ticks += event.ticks as u64;
                push_oob(&mut out, OOB_STREAM_INFO, &stream_pos.to_le_bytes());
                push_oob(&mut out, OOB_INDEX, &stream_pos.to_le_bytes());
            }
            FluxEventKind::Pulse => {
                let ticks = carry_ticks + event.ticks as u64;
                carry_ticks = 0;
                let mut sclks = (ticks as f64 / ticks_per_sclk).round() as u64;
                while sclks > 0xFFFF {
                    out.push(OP_OVL16);
                    stream_pos += 1;
                    sclks -= 0x10000;
                }
                match sclks {
                    0x0E..=0xFF => {
                        out.push(sclks as u8);
                        stream_pos += 1;
                    }
                    0x0000..=0x07FF => {
                        out.push((sclks >> 8) as u8);
                        out.push((sclks & 0xFF) as u8);
                        stream_pos += 2;
                    }
                    _ => {
                        out.push(OP_FLUX3);
                        out.extend_from_slice(&(sclks as u16).to_be_bytes());
                        stream_pos += 3;
                    }
                }
            }
        }
    }

    let mut end_payload = Vec::with_capacity(8);
    end_payload.extend_from_slice(&stream_pos.to_le_bytes());
    end_payload.extend_from_slice(&0u32.to_le_bytes());
    push_oob(&mut out, OOB_STREAM_END, &end_payload);
    out.extend_from_slice(&[OP_OOB, OOB_END_OF_STREAM, 0x0D, 0x0D]);

    out
}

fn push_oob(out: &mut Vec<u8>, block_type: u8, payload: &[u8]) {
    out.push(OP_OOB);
    out.push(block_type);
    out.extend_from_slice(&(payload.len() as u16).to_le_bytes());
    out.extend_from_slice(payload);
}

fn take_u8(cur: &mut Cursor<&[u8]>) -> Result<u8, FluxError> {
    let offset = cur.position();
    let data = *cur.get_ref();
    let byte = *data
        .get(offset as usize)
        .ok_or(FluxError::Truncated { offset })?;
    cur.set_position(offset + 1);
    Ok(byte)
}

fn take_u16_le(cur: &mut Cursor<&[u8]>) -> Result<u16, FluxError> {
    let low = take_u8(cur)?;
    let high = take_u8(cur)?;
    Ok(u16::from_le_bytes([low, high]))
}

fn take_u16_be(cur: &mut Cursor<&[u8]>) -> Result<u16, FluxError> {
    let high = take_u8(cur)?;
    let low = take_u8(cur)?;
    Ok(u16::from_be_bytes([high, low]))
}

fn take_ascii(cur: &mut Cursor<&[u8]>, len: u64) -> Result<String, FluxError> {
    let offset = cur.position();
    let data = *cur.get_ref();
    let end = offset + len;
    if end as usize > data.len() {
        return Err(FluxError::Truncated { offset });
    }
    let text: String = data[offset as usize..end as usize]
        .iter()
        .take_while(|&&b| b != 0)
        .map(|&b| b as char)
        .collect();
    cur.set_position(end);
    Ok(text)
}

fn skip(cur: &mut Cursor<&[u8]>, len: u64) -> Result<(), FluxError> {
    let offset = cur.position();
    if (offset + len) as usize > cur.get_ref().len() {
        return Err(FluxError::Truncated { offset });
    }
    cur.seek(SeekFrom::Current(len as i64))?;
    Ok(())
}
