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

/// A fixed cell-level synchronization pattern, matched against a rolling
/// window of recovered cells. The newest cell occupies bit 0 of the window.
///
/// Patterns are 8 to 64 cells wide and must contain at least one set bit.
/// Bits outside the significance mask are ignored during comparison, which
/// lets a pattern tolerate don't-care cells (weakly written clock positions,
/// for example).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct FluxPattern {
    bits:    usize,
    pattern: u64,
    mask:    u64,
}

impl FluxPattern {
    pub fn new(bits: usize, pattern: u64) -> Self {
        let mask = width_mask(bits);
        Self::with_mask(bits, pattern, mask)
    }

    pub fn with_mask(bits: usize, pattern: u64, mask: u64) -> Self {
        assert!((8..=64).contains(&bits), "pattern width out of range");
        let mask = mask & width_mask(bits);
        assert!(pattern & mask != 0, "pattern has no significant set bits");
        FluxPattern { bits, pattern, mask }
    }

    /// Width of the pattern in cells.
    pub fn len(&self) -> usize {
        self.bits
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub(crate) fn matches(&self, window: u64) -> bool {
        window & self.mask == self.pattern & self.mask
    }
}

impl Display for FluxPattern {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "[{}:{:016X}/{:016X}]", self.bits, self.pattern, self.mask)
    }
}

fn width_mask(bits: usize) -> u64 {
    if bits >= 64 {
        u64::MAX
    }
    else {
        (1u64 << bits) - 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_width_match() {
        let p = FluxPattern::new(16, 0x4489);
        assert!(p.matches(0x4489));
        assert!(p.matches(0xABCD_4489));
        assert!(!p.matches(0x4488));
    }

    #[test]
    fn masked_bits_are_ignored() {
        let p = FluxPattern::with_mask(8, 0b1010_0000, 0b1111_0000);
        assert!(p.matches(0b1010_1111));
        assert!(!p.matches(0b0110_0000));
    }

    #[test]
    #[should_panic]
    fn zero_pattern_is_rejected() {
        let _ = FluxPattern::new(8, 0);
    }
}
