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

    src/fluxmap/mod.rs

    The Fluxmap event log: an append-only record of flux transitions and
    index marks for one pass over a (track, side).
*/

pub mod pattern;
pub mod reader;

pub use pattern::FluxPattern;
pub use reader::FluxmapReader;

/// Nanoseconds represented by one tick of the internal time base.
pub const NS_PER_TICK: f64 = 48.0;

/// The internal time base, in ticks per second.
pub const TICK_FREQUENCY: f64 = 1_000_000_000.0 / NS_PER_TICK;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FluxEventKind {
    /// A detected flux transition.
    Pulse,
    /// The once-per-revolution index signal.
    Index,
}

/// One committed event. `ticks` is the interval that precedes the event, so
/// a consumer always sees atomic (interval, event) units.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct FluxEvent {
    pub ticks: u32,
    pub kind:  FluxEventKind,
}

/// An ordered log of flux events for a single capture pass. Intervals
/// accumulate via [`Fluxmap::append_interval`] until a pulse or index mark
/// commits them. Once captured, a Fluxmap is never mutated by the decode
/// pipeline; readers borrow it.
#[derive(Clone, Debug, Default)]
pub struct Fluxmap {
    events: Vec<FluxEvent>,
    pending_ticks: u32,
    duration_ticks: u64,
    pulse_ct: usize,
    index_ct: usize,
}

impl Fluxmap {
    pub fn new() -> Self {
        Default::default()
    }

    /// Add `ticks` to the interval of the next committed event.
    pub fn append_interval(&mut self, ticks: u32) {
        self.pending_ticks = self.pending_ticks.saturating_add(ticks);
    }

    pub fn append_pulse(&mut self) {
        self.commit(FluxEventKind::Pulse);
        self.pulse_ct += 1;
    }

    pub fn append_index(&mut self) {
        self.commit(FluxEventKind::Index);
        self.index_ct += 1;
    }

    fn commit(&mut self, kind: FluxEventKind) {
        let ticks = std::mem::take(&mut self.pending_ticks);
        self.duration_ticks += ticks as u64;
        self.events.push(FluxEvent { ticks, kind });
    }

    /// Total time covered by committed events. An uncommitted trailing
    /// interval is not included.
    pub fn duration_ticks(&self) -> u64 {
        self.duration_ticks
    }

    pub fn duration_secs(&self) -> f64 {
        self.duration_ticks as f64 / TICK_FREQUENCY
    }

    pub fn pulse_ct(&self) -> usize {
        self.pulse_ct
    }

    pub fn index_ct(&self) -> usize {
        self.index_ct
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn events(&self) -> &[FluxEvent] {
        &self.events
    }

    pub fn iter(&self) -> impl Iterator<Item = &FluxEvent> {
        self.events.iter()
    }
}
