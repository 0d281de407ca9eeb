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
*/

//! fluxforge reads raw magnetic-flux captures of vintage floppy disks and
//! reconstructs validated sectors from them. The pipeline runs from a
//! [`fluxmap::Fluxmap`] (timestamped flux transitions) through adaptive clock
//! recovery and FM/MFM bit separation down to [`sector::Sector`] records, with
//! a [`driver`] that walks whole disks and merges repeated revolutions.

pub mod codec;
pub mod config;
pub mod crc;
pub mod decoder;
pub mod driver;
pub mod flux;
pub mod fluxmap;
pub mod sector;
pub mod source;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FluxError {
    #[error("I/O error reading or writing flux data")]
    Io(#[from] std::io::Error),
    #[error("unknown out-of-band block type {block_type:#04x} at offset {offset:#010x}")]
    UnknownBlock { block_type: u8, offset: u64 },
    #[error("truncated capture stream at offset {offset:#010x}")]
    Truncated { offset: u64 },
    #[error("malformed out-of-band block: {0}")]
    OobParse(#[from] binrw::Error),
    #[error("capture device reported a fault: {0}")]
    HardwareFault(&'static str),
    #[error("invalid decoder configuration: {0}")]
    Config(String),
    #[error("flux source error: {0}")]
    Source(String),
    #[error("decoder driver thread panicked")]
    DriverPanic,
}

impl FluxError {
    /// Whether this error must abort the whole run rather than a single track.
    pub fn is_fatal(&self) -> bool {
        matches!(self, FluxError::Io(_) | FluxError::Config(_) | FluxError::DriverPanic)
    }
}

pub mod prelude {
    pub use crate::{
        config::{Config, ConfigBuilder, ConfigPatch, DecoderConfig},
        decoder::{decode_track, DecoderVariant, TrackDecoder},
        driver::{decode_disk, CancelToken, DecodeEvent, DecodeSession, DecodeSummary, ImageWriter},
        flux::{Pll, RawCell},
        fluxmap::{FluxEvent, FluxEventKind, Fluxmap, FluxmapReader, FluxPattern},
        sector::{Sector, SectorStatus, TrackLocation, TrackSectors},
        source::{FluxSink, FluxSource},
        FluxError,
    };
}

pub use crate::{
    fluxmap::{Fluxmap, FluxmapReader, FluxPattern},
    sector::{Sector, SectorStatus, TrackLocation},
};
