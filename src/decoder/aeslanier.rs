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

    src/decoder/aeslanier.rs

    Decoder for AES Lanier word-processor disks. The encoding is M2FM, but
    the permissive FM/MFM cell decoder copes with it fine.
*/

use crate::{
    codec::{self, CELLS_PER_BYTE},
    crc::{crc16_ref, MODBUS_POLY_REF},
    decoder::RawRecord,
    fluxmap::{FluxmapReader, FluxPattern},
    sector::{Sector, SectorStatus},
};

/// The 32 raw cells that open every record.
pub const RECORD_SEPARATOR: u64 = 0x5555_5122;
pub const RECORD_SEPARATOR_BITS: usize = 32;

pub const SECTOR_LENGTH: usize = 256;
pub const RECORD_SIZE: usize = SECTOR_LENGTH + 5;

/// Little-endian data checksum offset within the de-reversed record.
const DATA_CRC_OFFSET: usize = 0x101;

pub struct AesLanierDecoder {
    separator: FluxPattern,
}

impl AesLanierDecoder {
    pub fn new() -> Self {
        AesLanierDecoder {
            separator: FluxPattern::new(RECORD_SEPARATOR_BITS, RECORD_SEPARATOR),
        }
    }

    pub fn advance_to_next_record(&mut self, reader: &mut FluxmapReader) -> Option<u64> {
        reader.seek_to_pattern(&self.separator)
    }

    pub fn decode_record(&mut self, reader: &mut FluxmapReader) -> Option<Sector> {
        // Skip the trailing half of the record separator.
        reader.read_raw_bits(CELLS_PER_BYTE);

        let record = RawRecord::read(reader, RECORD_SIZE * CELLS_PER_BYTE);
        if !record.is_complete(RECORD_SIZE * CELLS_PER_BYTE) {
            return None;
        }
        // M2FM clocking differs from MFM, so violations here are expected
        // and carry no weight; the count is diagnostic only.
        log::trace!(
            "AesLanierDecoder::decode_record(): record at tick {} with {} clock rule violations",
            record.start_ticks,
            codec::clock_violations(&record.cells)
        );

        let mut bytes = codec::decode_fm_mfm(&record.cells);
        bytes.truncate(RECORD_SIZE);
        // The controller shifts bytes out LSB first.
        codec::reverse_bit_order(&mut bytes);

        let logical_track = bytes[1];
        let logical_sector = bytes[2];

        // Header checksum, a plain byte sum. Records failing it are dropped
        // without report; most are not sector records at all.
        let wanted = bytes[3];
        let got = bytes[1].wrapping_add(bytes[2]);
        if wanted != got {
            log::trace!(
                "AesLanierDecoder::decode_record(): header sum {:02X} != {:02X}, dropping record",
                got,
                wanted
            );
            return None;
        }

        // The data checksum covers the header bytes as well.
        let payload = bytes[1..1 + SECTOR_LENGTH].to_vec();
        let wanted_crc = u16::from_le_bytes([bytes[DATA_CRC_OFFSET], bytes[DATA_CRC_OFFSET + 1]]);
        let got_crc = crc16_ref(MODBUS_POLY_REF, &payload);

        Some(Sector {
            logical_track: logical_track as u16,
            logical_side: 0,
            logical_sector,
            payload,
            status: if wanted_crc == got_crc {
                SectorStatus::Ok
            }
            else {
                SectorStatus::BadChecksum
            },
        })
    }
}

impl Default for AesLanierDecoder {
    fn default() -> Self {
        AesLanierDecoder::new()
    }
}
