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

    src/fluxmap/reader.rs

    A rewindable cursor over a Fluxmap. The reader owns the clock recovery
    loop, so a caller sees recovered cells rather than raw intervals.
*/

use bit_vec::BitVec;

use crate::{
    flux::{FluxStats, Pll, PllCells, RawCell},
    fluxmap::{FluxEventKind, Fluxmap, FluxPattern},
};

pub struct FluxmapReader<'a> {
    fluxmap: &'a Fluxmap,
    pos:  usize,
    tick: u64,
    pll:  Pll,

    // Cells produced by the last pulse but not yet handed out.
    queued_zeros: u32,
    queued_one:   bool,
}

impl<'a> FluxmapReader<'a> {
    pub fn new(fluxmap: &'a Fluxmap, pll: Pll) -> Self {
        FluxmapReader {
            fluxmap,
            pos: 0,
            tick: 0,
            pll,
            queued_zeros: 0,
            queued_one: false,
        }
    }

    /// The next committed event, or `None` at the end of the flux.
    pub fn next_event(&mut self) -> Option<(u32, FluxEventKind)> {
        let event = self.fluxmap.events().get(self.pos)?;
        self.pos += 1;
        self.tick += event.ticks as u64;
        Some((event.ticks, event.kind))
    }

    /// The next recovered cell, or `None` at the end of the flux. Index
    /// marks are transparent at the cell level.
    pub fn next_cell(&mut self) -> Option<RawCell> {
        loop {
            if self.queued_zeros > 0 {
                self.queued_zeros -= 1;
                return Some(RawCell::Zero);
            }
            if self.queued_one {
                self.queued_one = false;
                return Some(RawCell::One);
            }

            let (ticks, kind) = self.next_event()?;
            match kind {
                FluxEventKind::Index => continue,
                FluxEventKind::Pulse => match self.pll.feed(ticks) {
                    PllCells::Cells { zeros } => {
                        self.queued_zeros = zeros;
                        self.queued_one = true;
                    }
                    PllCells::Folded => continue,
                    PllCells::Loss => return Some(RawCell::Loss),
                },
            }
        }
    }

    /// Read up to `ct` raw cells at the current clock estimate. The result
    /// is shorter than `ct` only at the end of the flux. Loss cells read as
    /// zero; the damage surfaces later as a checksum failure.
    pub fn read_raw_bits(&mut self, ct: usize) -> BitVec {
        let mut bits = BitVec::with_capacity(ct);
        while bits.len() < ct {
            match self.next_cell() {
                Some(cell) => bits.push(cell == RawCell::One),
                None => break,
            }
        }
        bits
    }

    /// Advance until the trailing window of recovered cells matches
    /// `pattern`. Returns the ticks skipped, or `None` if the flux ran out
    /// first. On a match the cursor sits immediately after the final cell
    /// of the pattern; the earliest matching position wins.
    pub fn seek_to_pattern(&mut self, pattern: &FluxPattern) -> Option<u64> {
        let start = self.tick;
        let mut window: u64 = 0;
        let mut seen: usize = 0;

        loop {
            match self.next_cell()? {
                RawCell::Loss => {
                    window = 0;
                    seen = 0;
                }
                cell => {
                    window = (window << 1) | (cell == RawCell::One) as u64;
                    if seen < pattern.len() {
                        seen += 1;
                    }
                    if seen >= pattern.len() && pattern.matches(window) {
                        log::trace!(
                            "FluxmapReader::seek_to_pattern(): matched {} at tick {}",
                            pattern,
                            self.tick
                        );
                        return Some(self.tick - start);
                    }
                }
            }
        }
    }

    /// Absolute tick position of the cursor.
    pub fn tell_ticks(&self) -> u64 {
        self.tick
    }

    /// Rewind and replay until the cursor reaches `target` ticks. Resets
    /// the clock loop.
    pub fn seek_ticks(&mut self, target: u64) {
        self.rewind();
        while self.tick < target {
            if self.next_event().is_none() {
                break;
            }
        }
    }

    pub fn rewind(&mut self) {
        self.pos = 0;
        self.tick = 0;
        self.queued_zeros = 0;
        self.queued_one = false;
        self.pll.reset();
    }

    /// The current cell period estimate, in ticks.
    pub fn cell_period_ticks(&self) -> f64 {
        self.pll.period()
    }

    pub fn stats(&self) -> &FluxStats {
        self.pll.stats()
    }
}
