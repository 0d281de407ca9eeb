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

use std::fmt::{self, Display, Formatter};

pub mod pll;

pub use pll::{Pll, PllCells};

#[doc(hidden)]
#[macro_export]
macro_rules! format_us {
    ($value:expr) => {
        format!("{:.4}μs", $value * 1_000_000.0)
    };
}

/// One recovered bit cell. A `Loss` cell marks an interval too long for the
/// clock loop to span; pattern search treats it as a mismatch boundary.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RawCell {
    Zero,
    One,
    Loss,
}

impl Display for RawCell {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            RawCell::Zero => write!(f, "0"),
            RawCell::One => write!(f, "1"),
            RawCell::Loss => write!(f, "X"),
        }
    }
}

/// Counters gathered while a clock loop consumes a flux stream.
#[derive(Clone, Debug, Default)]
pub struct FluxStats {
    pub total:  u32,
    pub folded: u32,
    pub losses: u32,

    pub shortest_ticks: u32,
    pub longest_ticks:  u32,
}

impl Display for FluxStats {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(
            f,
            "Total: {} Folded: {} Losses: {} Shortest: {}t Longest: {}t",
            self.total, self.folded, self.losses, self.shortest_ticks, self.longest_ticks
        )
    }
}

impl FluxStats {
    pub(crate) fn record(&mut self, ticks: u32) {
        if self.total == 0 {
            self.shortest_ticks = ticks;
            self.longest_ticks = ticks;
        }
        else {
            self.shortest_ticks = self.shortest_ticks.min(ticks);
            self.longest_ticks = self.longest_ticks.max(ticks);
        }
        self.total += 1;
    }
}
