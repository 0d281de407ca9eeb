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

    tests/common/mod.rs

    Shared support for the integration tests: track synthesis helpers and a
    tiny deterministic RNG.
*/
#![allow(dead_code)]

use bit_vec::BitVec;
use fluxforge::{
    codec,
    crc::{crc16_ccitt, crc16_ref, MODBUS_POLY_REF},
    decoder::aeslanier::{RECORD_SEPARATOR, RECORD_SEPARATOR_BITS, RECORD_SIZE, SECTOR_LENGTH},
    fluxmap::Fluxmap,
};

pub fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Cell width used by synthesized tracks: ~2 µs at the 48 ns tick.
pub const CELL_TICKS: u32 = 42;

/// Tiny deterministic RNG (xorshift64*), so jittered tests don't need a
/// dependency and always replay the same way.
#[derive(Clone, Copy)]
pub struct Rng(u64);

impl Rng {
    pub fn new(seed: u64) -> Self {
        Rng(seed | 1)
    }

    pub fn next_u64(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.0 = x;
        x.wrapping_mul(0x2545_F491_4F6C_DD1D)
    }

    pub fn next_f64(&mut self) -> f64 {
        ((self.next_u64() >> 11) as f64) / ((1u64 << 53) as f64)
    }

    pub fn range(&mut self, lo: f64, hi: f64) -> f64 {
        lo + (hi - lo) * self.next_f64()
    }
}

/// Turn a cell string into a Fluxmap: every set cell is a pulse, spaced by
/// `cell_ticks` per cell.
pub fn fluxmap_from_cells(cells: &BitVec, cell_ticks: u32) -> Fluxmap {
    let mut fluxmap = Fluxmap::new();
    let mut gap = 0u32;
    for cell in cells.iter() {
        gap += cell_ticks;
        if cell {
            fluxmap.append_interval(gap);
            fluxmap.append_pulse();
            gap = 0;
        }
    }
    fluxmap
}

/// A 261-byte AES Lanier record with a valid header sum and data checksum.
/// The layout overlaps: the 256-byte sector payload starts at the track
/// byte, and the checksum word sits at 0x101.
pub fn aeslanier_record(track: u8, sector: u8, fill: u8) -> Vec<u8> {
    let mut record = vec![0u8; RECORD_SIZE];
    record[0] = 0xFE;
    record[1] = track;
    record[2] = sector;
    record[3] = track.wrapping_add(sector);
    for byte in record[4..1 + SECTOR_LENGTH].iter_mut() {
        *byte = fill;
    }
    let crc = crc16_ref(MODBUS_POLY_REF, &record[1..1 + SECTOR_LENGTH]);
    record[0x101..0x103].copy_from_slice(&crc.to_le_bytes());
    record
}

/// The payload a decode of `record` should produce.
pub fn aeslanier_payload(record: &[u8]) -> Vec<u8> {
    record[1..1 + SECTOR_LENGTH].to_vec()
}

/// Lay records out as a cell stream: lead-in, then per record a gap, the
/// record separator, its clock half, and the byte-reversed record body.
pub fn aeslanier_track_cells(records: &[Vec<u8>]) -> BitVec {
    let mut cells = BitVec::new();
    codec::push_cells(&mut cells, 0x5555, 16);
    for record in records {
        codec::push_cells(&mut cells, 0x5555_5555, 32);
        codec::push_cells(&mut cells, RECORD_SEPARATOR, RECORD_SEPARATOR_BITS);
        codec::push_cells(&mut cells, 0x5555, 16);

        let mut bytes = record.clone();
        codec::reverse_bit_order(&mut bytes);
        cells.extend(codec::encode_fm_mfm(&bytes, true).iter());
    }
    codec::push_cells(&mut cells, 0x5555, 16);
    cells
}

pub fn aeslanier_fluxmap(records: &[Vec<u8>]) -> Fluxmap {
    fluxmap_from_cells(&aeslanier_track_cells(records), CELL_TICKS)
}

/// Incrementally builds an MFM cell stream, tracking the data bit the next
/// byte's clock depends on.
pub struct CellWriter {
    pub cells: BitVec,
    prev: bool,
}

impl CellWriter {
    pub fn new() -> Self {
        CellWriter {
            cells: BitVec::new(),
            prev: false,
        }
    }

    pub fn bytes(&mut self, data: &[u8]) {
        self.cells.extend(codec::encode_fm_mfm(data, self.prev).iter());
        if let Some(&last) = data.last() {
            self.prev = last & 1 != 0;
        }
    }

    /// Append pre-encoded cells (sync marks). `prev` is the data bit the
    /// mark ends on.
    pub fn raw(&mut self, value: u64, bits: usize, prev: bool) {
        codec::push_cells(&mut self.cells, value, bits);
        self.prev = prev;
    }
}

/// One System-34 sector: gap, sync, IDAM, gap, sync, DAM. `size_shift` is
/// the n field; the payload must be 128 << n bytes.
pub fn ibm_sector_cells(track: u8, side: u8, sector: u8, size_shift: u8, payload: &[u8]) -> BitVec {
    assert_eq!(payload.len(), 128 << size_shift as usize);

    let mut writer = CellWriter::new();
    writer.bytes(&[0x4E; 4]);
    writer.bytes(&[0x00; 12]);
    writer.raw(codec::MFM_A1_SYNC, codec::MFM_A1_SYNC_BITS, true);

    let idam = [0xFE, track, side, sector, size_shift];
    let mut check = vec![0xA1, 0xA1, 0xA1];
    check.extend_from_slice(&idam);
    writer.bytes(&idam);
    writer.bytes(&crc16_ccitt(&check).to_be_bytes());

    writer.bytes(&[0x4E; 8]);
    writer.bytes(&[0x00; 12]);
    writer.raw(codec::MFM_A1_SYNC, codec::MFM_A1_SYNC_BITS, true);

    let mut dam = vec![0xFB];
    dam.extend_from_slice(payload);
    let mut check = vec![0xA1, 0xA1, 0xA1];
    check.extend_from_slice(&dam);
    writer.bytes(&dam);
    writer.bytes(&crc16_ccitt(&check).to_be_bytes());

    writer.bytes(&[0x4E; 4]);
    writer.cells
}
