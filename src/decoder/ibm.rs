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

    src/decoder/ibm.rs

    Decoder for IBM System-34 MFM tracks. Address and data records are
    framed separately; the header parsed from an IDAM is carried until its
    DAM arrives.
*/

use crate::{
    codec::{self, CELLS_PER_BYTE, MFM_A1_SYNC, MFM_A1_SYNC_BITS},
    crc::crc16_ccitt,
    decoder::RawRecord,
    fluxmap::{FluxmapReader, FluxPattern},
    sector::{Sector, SectorStatus},
};

pub const IDAM: u8 = 0xFE;
pub const DAM: u8 = 0xFB;
pub const DDAM: u8 = 0xF8;

/// Sector sizes are 128 << n, capped at 8 KiB.
const MAX_SECTOR_SIZE: usize = 8192;

#[derive(Copy, Clone, Debug)]
struct SectorHeader {
    track:  u8,
    side:   u8,
    sector: u8,
    size_shift: u8,
}

impl SectorHeader {
    fn size_bytes(&self) -> usize {
        MAX_SECTOR_SIZE.min(128usize << (self.size_shift & 0x0F).min(6))
    }
}

pub struct IbmDecoder {
    sync: FluxPattern,
    pending: Option<SectorHeader>,
}

impl IbmDecoder {
    pub fn new() -> Self {
        IbmDecoder {
            sync: FluxPattern::new(MFM_A1_SYNC_BITS, MFM_A1_SYNC),
            pending: None,
        }
    }

    pub fn advance_to_next_record(&mut self, reader: &mut FluxmapReader) -> Option<u64> {
        reader.seek_to_pattern(&self.sync)
    }

    pub fn decode_record(&mut self, reader: &mut FluxmapReader) -> Option<Sector> {
        let mark = read_bytes(reader, 1)?[0];

        match mark {
            IDAM => self.decode_address_record(reader),
            DAM | DDAM => self.decode_data_record(reader, mark),
            _ => {
                log::trace!("IbmDecoder::decode_record(): unrecognized mark {:02X}", mark);
                None
            }
        }
    }

    /// A header still pending at the end of the track never got its data.
    pub fn finish(&mut self) -> Option<Sector> {
        self.pending.take().map(missing_data_sector)
    }

    fn decode_address_record(&mut self, reader: &mut FluxmapReader) -> Option<Sector> {
        let body = read_bytes(reader, 6)?;

        let mut check = vec![0xA1, 0xA1, 0xA1, IDAM];
        check.extend_from_slice(&body[..4]);
        let wanted = u16::from_be_bytes([body[4], body[5]]);
        if crc16_ccitt(&check) != wanted {
            // A corrupt header is useless; drop it without report.
            self.pending = None;
            return None;
        }

        let header = SectorHeader {
            track:  body[0],
            side:   body[1],
            sector: body[2],
            size_shift: body[3],
        };
        log::trace!(
            "IbmDecoder::decode_address_record(): c:{} h:{} s:{} n:{}",
            header.track,
            header.side,
            header.sector,
            header.size_shift
        );

        // Replacing an unconsumed header means its data record never
        // arrived; report that sector as present but empty.
        self.pending.replace(header).map(missing_data_sector)
    }

    fn decode_data_record(&mut self, reader: &mut FluxmapReader, mark: u8) -> Option<Sector> {
        // A data record with no preceding header cannot be placed.
        let header = self.pending.take()?;
        let len = header.size_bytes();

        let body = read_bytes(reader, len + 2)?;

        let mut check = vec![0xA1, 0xA1, 0xA1, mark];
        check.extend_from_slice(&body[..len]);
        let wanted = u16::from_be_bytes([body[len], body[len + 1]]);

        Some(Sector {
            logical_track: header.track as u16,
            logical_side: header.side,
            logical_sector: header.sector,
            payload: body[..len].to_vec(),
            status: if crc16_ccitt(&check) == wanted {
                SectorStatus::Ok
            }
            else {
                SectorStatus::BadChecksum
            },
        })
    }
}

impl Default for IbmDecoder {
    fn default() -> Self {
        IbmDecoder::new()
    }
}

fn missing_data_sector(header: SectorHeader) -> Sector {
    Sector {
        logical_track: header.track as u16,
        logical_side: header.side,
        logical_sector: header.sector,
        payload: Vec::new(),
        status: SectorStatus::DataMissing,
    }
}

fn read_bytes(reader: &mut FluxmapReader, ct: usize) -> Option<Vec<u8>> {
    let record = RawRecord::read(reader, ct * CELLS_PER_BYTE);
    if !record.is_complete(ct * CELLS_PER_BYTE) {
        return None;
    }
    Some(codec::decode_fm_mfm(&record.cells))
}
