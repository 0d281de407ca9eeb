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

    src/codec/mod.rs

    The FM/MFM/M2FM cell codec. All three encodings interleave clock and
    data cells, so a single permissive decoder covers the family: data cells
    sit at odd offsets and clock cells are never validated.
*/

use bit_vec::BitVec;

/// Cells occupied by one encoded byte.
pub const CELLS_PER_BYTE: usize = 16;

/// Cell image of three 0xA1 sync bytes carrying the missing-clock
/// violation. Normal data never encodes to this.
pub const MFM_A1_SYNC: u64 = 0x4489_4489_4489;
pub const MFM_A1_SYNC_BITS: usize = 48;

/// Decode interleaved clock/data cells into bytes: every other cell
/// starting at offset 1, MSB first. Trailing cells short of a byte are
/// dropped.
pub fn decode_fm_mfm(cells: &BitVec) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(cells.len() / CELLS_PER_BYTE);
    let mut accum: u8 = 0;
    let mut bit_ct = 0;

    for (i, cell) in cells.iter().enumerate() {
        if i % 2 == 1 {
            accum = (accum << 1) | cell as u8;
            bit_ct += 1;
            if bit_ct == 8 {
                bytes.push(accum);
                accum = 0;
                bit_ct = 0;
            }
        }
    }
    bytes
}

/// Count cell sequences illegal under the FM/MFM rules: adjacent set cells,
/// or runs of more than three clear cells. Diagnostic only; records are
/// never rejected on this basis.
pub fn clock_violations(cells: &BitVec) -> usize {
    let mut violations = 0;
    let mut zero_run = 0;
    let mut last = false;

    for cell in cells.iter() {
        if cell {
            if last {
                violations += 1;
            }
            zero_run = 0;
        }
        else {
            zero_run += 1;
            if zero_run > 3 {
                violations += 1;
            }
        }
        last = cell;
    }
    violations
}

/// Encode bytes as MFM cells. `prev_data` is the data bit preceding the
/// first byte; it decides the initial clock cell.
pub fn encode_fm_mfm(data: &[u8], mut prev_data: bool) -> BitVec {
    let mut cells = BitVec::with_capacity(data.len() * CELLS_PER_BYTE);
    for &byte in data {
        for i in (0..8).rev() {
            let bit = byte & (1 << i) != 0;
            // A clock cell is set only between two clear data bits.
            cells.push(!prev_data && !bit);
            cells.push(bit);
            prev_data = bit;
        }
    }
    cells
}

/// Append the low `bits` of `value` as cells, MSB first.
pub fn push_cells(cells: &mut BitVec, value: u64, bits: usize) {
    for i in (0..bits).rev() {
        cells.push(value & (1 << i) != 0);
    }
}

/// Reverse the bit order of every byte in place, for controllers that shift
/// LSB first.
pub fn reverse_bit_order(bytes: &mut [u8]) {
    for byte in bytes.iter_mut() {
        *byte = byte.reverse_bits();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_decode_is_identity() {
        let data = [0x00, 0xFF, 0xA1, 0x5A, 0x03];
        let cells = encode_fm_mfm(&data, true);
        assert_eq!(cells.len(), data.len() * CELLS_PER_BYTE);
        assert_eq!(decode_fm_mfm(&cells), data);
    }

    #[test]
    fn mfm_encoding_never_violates_run_limits() {
        let data: Vec<u8> = (0..=255).collect();
        let cells = encode_fm_mfm(&data, false);
        assert_eq!(clock_violations(&cells), 0);
    }

    #[test]
    fn sync_image_carries_violations() {
        let mut cells = BitVec::new();
        push_cells(&mut cells, MFM_A1_SYNC, MFM_A1_SYNC_BITS);
        assert!(clock_violations(&cells) > 0);
    }

    #[test]
    fn fe_after_sync_matches_known_cell_image() {
        // A 0xFE address mark following an A1 run encodes to 0x5554.
        let cells = encode_fm_mfm(&[0xFE], true);
        let mut value: u64 = 0;
        for cell in cells.iter() {
            value = (value << 1) | cell as u64;
        }
        assert_eq!(value, 0x5554);
    }

    #[test]
    fn bit_reversal() {
        let mut bytes = [0x01, 0x80, 0xAA];
        reverse_bit_order(&mut bytes);
        assert_eq!(bytes, [0x80, 0x01, 0x55]);
    }
}
