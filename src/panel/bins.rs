//! Fixed-width rate-gap bins with unbounded outer bins

use crate::config::BinSpec;

/// Edge placement tolerance, as a fraction of one bin
const EDGE_TOLERANCE: f64 = 1e-9;

/// Left-closed, right-open bins over `[min, max)`.
///
/// Index 0 is `(-inf, min)`, index `i` in `1..=n` is
/// `[min + (i-1)w, min + iw)` and index `n + 1` is `[max, +inf)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateGapBins {
    min: f64,
    width: f64,
    n_finite: u32,
}

impl RateGapBins {
    pub fn new(spec: BinSpec) -> Self {
        let n_finite = ((spec.max - spec.min) / spec.width).round().max(1.0) as u32;
        Self {
            min: spec.min,
            width: spec.width,
            n_finite,
        }
    }

    /// Number of bins including both outer bins
    pub fn len(&self) -> u32 {
        self.n_finite + 2
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn bin(&self, value: Option<f64>) -> Option<u32> {
        let value = value.filter(|v| v.is_finite())?;
        let position = (value - self.min) / self.width;
        if position < -EDGE_TOLERANCE {
            return Some(0);
        }
        let index = (position + EDGE_TOLERANCE).floor() as u32;
        Some(if index >= self.n_finite { self.n_finite + 1 } else { index + 1 })
    }

    /// Lower edge of a bin; `-inf` for the first
    pub fn lower_edge(&self, bin: u32) -> f64 {
        match bin {
            0 => f64::NEG_INFINITY,
            b => self.min + (b - 1) as f64 * self.width,
        }
    }
}

impl Default for RateGapBins {
    fn default() -> Self {
        Self::new(BinSpec::default())
    }
}
