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

    src/decoder/mod.rs

    Per-format sector decoders and the per-track decode loop. Formats are a
    closed sum; whatever state a format needs between records lives in its
    enum payload.
*/

pub mod aeslanier;
pub mod ibm;

use bit_vec::BitVec;
use strum::{Display, EnumIter, EnumString};

use crate::{
    config::DecoderConfig,
    driver::CancelToken,
    flux::Pll,
    fluxmap::{Fluxmap, FluxmapReader},
    sector::{Sector, TrackLocation, TrackSectors},
};

pub use aeslanier::AesLanierDecoder;
pub use ibm::IbmDecoder;

/// The selector a caller configures a decoder with.
#[derive(Copy, Clone, Debug, PartialEq, Eq, EnumString, Display, EnumIter)]
#[strum(serialize_all = "lowercase")]
pub enum DecoderVariant {
    AesLanier,
    Ibm,
}

/// A framed record as it came off the flux: where it started and the raw
/// cells that follow the sync mark. The cells borrow nothing; they are
/// consumed within a single decode pass.
#[derive(Clone, Debug)]
pub struct RawRecord {
    pub start_ticks: u64,
    pub cells: BitVec,
}

impl RawRecord {
    pub fn read(reader: &mut FluxmapReader, cell_ct: usize) -> Self {
        let start_ticks = reader.tell_ticks();
        RawRecord {
            start_ticks,
            cells: reader.read_raw_bits(cell_ct),
        }
    }

    pub fn is_complete(&self, cell_ct: usize) -> bool {
        self.cells.len() >= cell_ct
    }
}

/// One sector decoder, dispatched over the variant tag.
pub enum TrackDecoder {
    AesLanier(AesLanierDecoder),
    Ibm(IbmDecoder),
}

impl TrackDecoder {
    pub fn new(variant: DecoderVariant) -> Self {
        match variant {
            DecoderVariant::AesLanier => TrackDecoder::AesLanier(AesLanierDecoder::new()),
            DecoderVariant::Ibm => TrackDecoder::Ibm(IbmDecoder::new()),
        }
    }

    /// Seek to the next record sync. Returns the ticks skipped, or `None`
    /// when the flux is exhausted.
    pub fn advance_to_next_record(&mut self, reader: &mut FluxmapReader) -> Option<u64> {
        match self {
            TrackDecoder::AesLanier(decoder) => decoder.advance_to_next_record(reader),
            TrackDecoder::Ibm(decoder) => decoder.advance_to_next_record(reader),
        }
    }

    /// Decode the record under the cursor. `None` means the record produced
    /// no sector: it may have failed its header check, been an address
    /// record, or simply not been a sector at all.
    pub fn decode_record(&mut self, reader: &mut FluxmapReader) -> Option<Sector> {
        match self {
            TrackDecoder::AesLanier(decoder) => decoder.decode_record(reader),
            TrackDecoder::Ibm(decoder) => decoder.decode_record(reader),
        }
    }

    /// Flush any end-of-track state.
    pub fn finish(&mut self) -> Option<Sector> {
        match self {
            TrackDecoder::AesLanier(_) => None,
            TrackDecoder::Ibm(decoder) => decoder.finish(),
        }
    }
}

/// Decode every record in a Fluxmap and merge the results. Multiple
/// revolutions in the capture simply yield repeated records, which the
/// merge in [`TrackSectors`] resolves. Decoding the same Fluxmap twice
/// yields identical output; no state survives the call.
pub fn decode_track(
    fluxmap: &Fluxmap,
    location: TrackLocation,
    config: &DecoderConfig,
    cancel: &CancelToken,
) -> TrackSectors {
    let pll = Pll::new(
        config.nominal_cell_ticks,
        config.min_cell_ticks,
        config.max_cell_ticks,
        config.pll_phase_gain,
    );
    let mut reader = FluxmapReader::new(fluxmap, pll);
    let mut decoder = TrackDecoder::new(config.variant);
    let mut sectors = TrackSectors::new(location);

    let mut records = 0;
    while records < config.max_records_per_track {
        if cancel.is_cancelled() {
            log::debug!("decode_track(): {} cancelled after {} records", location, records);
            break;
        }
        let Some(skipped) = decoder.advance_to_next_record(&mut reader) else {
            break;
        };
        log::trace!(
            "decode_track(): {} record {} sync at tick {} (skipped {})",
            location,
            records,
            reader.tell_ticks(),
            skipped
        );
        if let Some(sector) = decoder.decode_record(&mut reader) {
            log::debug!("decode_track(): {} decoded {}", location, sector);
            sectors.insert(sector);
        }
        records += 1;
    }
    if records >= config.max_records_per_track {
        log::warn!(
            "decode_track(): {} stopped at the {}-record cap",
            location,
            config.max_records_per_track
        );
    }

    if let Some(sector) = decoder.finish() {
        sectors.insert(sector);
    }

    if let Some((first, count)) = config.expected_sectors {
        sectors.fill_missing(first, count);
    }

    log::debug!(
        "decode_track(): {} finished: {} ({})",
        location,
        sectors.summary(),
        reader.stats()
    );
    sectors
}
