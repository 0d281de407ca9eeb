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

    src/flux/pll.rs

    Adaptive clock recovery. Converts pulse-to-pulse intervals into bit
    cells while tracking a drifting cell period.
*/

use crate::{flux::FluxStats, format_us, fluxmap::TICK_FREQUENCY};

/// An interval spanning more cells than this yields a clock-loss marker
/// instead of a zero run.
pub const MAX_CELLS_PER_INTERVAL: u32 = 16;

/// What one pulse interval turned into.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PllCells {
    /// `zeros` empty cells followed by one set cell.
    Cells { zeros: u32 },
    /// The interval was shorter than half a minimum cell and folds into the
    /// cell of the previous pulse. Nothing is emitted.
    Folded,
    /// The clock could not span the interval.
    Loss,
}

/// The cell clock. The period starts at a nominal estimate and is nudged by
/// a fraction of the observed per-cell interval after every pulse, clamped
/// to the configured window.
pub struct Pll {
    nominal_period: f64,
    period: f64,
    min_period: f64,
    max_period: f64,
    phase_gain: f64,
    stats: FluxStats,
}

impl Pll {
    /// All periods are in ticks. `phase_gain` is the fraction of the
    /// observed error applied per pulse; useful values sit in [0.01, 0.2].
    pub fn new(nominal_period: f64, min_period: f64, max_period: f64, phase_gain: f64) -> Self {
        debug_assert!(min_period <= nominal_period && nominal_period <= max_period);
        log::trace!(
            "Pll::new(): nominal period {} ({:.2} ticks), window [{:.2}, {:.2}], gain {:.3}",
            format_us!(nominal_period / TICK_FREQUENCY),
            nominal_period,
            min_period,
            max_period,
            phase_gain
        );
        Pll {
            nominal_period,
            period: nominal_period,
            min_period,
            max_period,
            phase_gain,
            stats: FluxStats::default(),
        }
    }

    /// The current cell period estimate, in ticks.
    pub fn period(&self) -> f64 {
        self.period
    }

    pub fn reset(&mut self) {
        self.period = self.nominal_period;
        self.stats = FluxStats::default();
    }

    pub fn stats(&self) -> &FluxStats {
        &self.stats
    }

    /// Consume one pulse interval and report the cells it produced.
    pub fn feed(&mut self, delta_ticks: u32) -> PllCells {
        let delta = delta_ticks as f64;
        self.stats.record(delta_ticks);

        if delta < self.min_period / 2.0 {
            self.stats.folded += 1;
            return PllCells::Folded;
        }

        let cells = (delta / self.period).round().max(1.0) as u32;
        if cells > MAX_CELLS_PER_INTERVAL {
            self.stats.losses += 1;
            // Start over from the nominal clock; whatever we were tracking
            // is gone.
            self.period = self.nominal_period;
            return PllCells::Loss;
        }

        let observed = delta / cells as f64;
        self.period = (self.period * (1.0 - self.phase_gain) + observed * self.phase_gain)
            .clamp(self.min_period, self.max_period);

        PllCells::Cells { zeros: cells - 1 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_pll() -> Pll {
        Pll::new(42.0, 32.0, 52.0, 0.05)
    }

    #[test]
    fn exact_intervals_produce_exact_cells() {
        let mut pll = test_pll();
        assert_eq!(pll.feed(42), PllCells::Cells { zeros: 0 });
        assert_eq!(pll.feed(84), PllCells::Cells { zeros: 1 });
        assert_eq!(pll.feed(126), PllCells::Cells { zeros: 2 });
        assert!((pll.period() - 42.0).abs() < 0.01);
    }

    #[test]
    fn runt_interval_folds() {
        let mut pll = test_pll();
        assert_eq!(pll.feed(10), PllCells::Folded);
    }

    #[test]
    fn unspannable_interval_is_a_loss() {
        let mut pll = test_pll();
        // Drag the period off nominal first, then confirm the loss resets it.
        pll.feed(46);
        assert_eq!(pll.feed(42 * (MAX_CELLS_PER_INTERVAL + 4)), PllCells::Loss);
        assert_eq!(pll.period(), 42.0);
        assert_eq!(pll.stats().losses, 1);
    }

    #[test]
    fn period_stays_clamped() {
        let mut pll = test_pll();
        for _ in 0..100 {
            pll.feed(60);
        }
        assert!(pll.period() <= 52.0);
    }
}
