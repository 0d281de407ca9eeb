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

    src/source/mod.rs

    Flux sources and sinks. A source hands the decoder one Fluxmap per
    (track, side) on demand; a sink accepts one, for diagnostics or
    re-capture.
*/

pub mod kryoflux;
pub mod stream;

use std::collections::HashMap;

use crate::{fluxmap::Fluxmap, FluxError};

/// Something that can produce flux for a (track, side) on demand. Sources
/// backed by files are reentrant and may be polled from several worker
/// threads at once; live hardware is not.
pub trait FluxSource: Send + Sync {
    fn read_flux(&self, track: u16, side: u8) -> Result<Fluxmap, FluxError>;

    /// Ask a mechanical source to re-home its positioner. File-backed
    /// sources have nothing to do.
    fn recalibrate(&mut self) {}

    fn is_reentrant(&self) -> bool {
        false
    }
}

/// Something that accepts captured flux, e.g. for diagnostic mirroring.
pub trait FluxSink: Send + Sync {
    fn write_flux(&self, track: u16, side: u8, fluxmap: &Fluxmap) -> Result<(), FluxError>;
}

/// A source over pre-built Fluxmaps, useful for tests and for replaying
/// captures already held in memory.
#[derive(Default)]
pub struct MemoryFluxSource {
    tracks: HashMap<(u16, u8), Fluxmap>,
}

impl MemoryFluxSource {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn insert(&mut self, track: u16, side: u8, fluxmap: Fluxmap) {
        self.tracks.insert((track, side), fluxmap);
    }
}

impl FluxSource for MemoryFluxSource {
    fn read_flux(&self, track: u16, side: u8) -> Result<Fluxmap, FluxError> {
        self.tracks
            .get(&(track, side))
            .cloned()
            .ok_or_else(|| FluxError::Source(format!("no flux held for track {track} side {side}")))
    }

    fn is_reentrant(&self) -> bool {
        true
    }
}
