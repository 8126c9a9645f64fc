//! Agarwal-Driscoll-Laibson square-root refinance threshold
//!
//! For a loan-period the threshold is the rate gap (percentage points) at
//! which refinancing breaks even under the model:
//!
//! ```text
//! threshold = 100 * sqrt(vol * cost / (balance * (1 - tax))) * sqrt(2 * (disc + lambda))
//! lambda    = prob_move + (annual_payment / balance - rate_orig) + inflation
//! ```
//!
//! Rates enter as fractions. Anything that leaves the threshold undefined
//! (no balance, unknown inflation, a negative radicand) yields `None`.

use super::annuity::Annuity;
use crate::config::{ScenarioParameters, TransactionCost};
use crate::persist::sample_std;

/// Annualised volatility of monthly changes in the market mortgage rate
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateVolatility {
    annual: Option<f64>,
}

impl RateVolatility {
    /// From monthly rates in percentage points, in date order.
    ///
    /// Undefined with fewer than two month-over-month changes.
    pub fn from_monthly_rates(rates: &[f64]) -> Self {
        let changes: Vec<f64> = rates.windows(2).map(|w| (w[1] - w[0]) / 100.0).collect();
        let annual = sample_std(&changes).map(|sd| sd * 12f64.sqrt());
        if annual.is_none() {
            log::warn!("Too few market rates ({}) for a volatility estimate; thresholds will be undefined", rates.len());
        }
        Self { annual }
    }

    pub fn new(annual: f64) -> Self {
        Self { annual: Some(annual) }
    }

    pub fn annual(&self) -> Option<f64> {
        self.annual
    }
}

/// Per-row inputs to the threshold
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThresholdInputs {
    /// Original note rate in percentage points
    pub rate_orig: f64,
    pub upb_orig: f64,
    pub upb_curr: f64,
    /// Original term in months
    pub term: u32,
    /// Annual inflation as a fraction
    pub inflation: Option<f64>,
}

/// ADL break-even rate gap in percentage points
pub fn adl_threshold(
    inputs: &ThresholdInputs,
    params: &ScenarioParameters,
    volatility: RateVolatility,
    cost: &TransactionCost,
) -> Option<f64> {
    let vol = volatility.annual()?;
    let balance = inputs.upb_curr;
    if !(balance > 0.0) {
        return None;
    }
    let inflation = inputs.inflation?;
    let rate_orig = inputs.rate_orig / 100.0;

    let annual_payment = 12.0 * Annuity::level_payment(rate_orig / 12.0, inputs.term, inputs.upb_orig)?;
    let lambda = params.prob_move + (annual_payment / balance - rate_orig) + inflation;

    let cost_radicand = vol * cost.amount(balance) / (balance * (1.0 - params.marginal_tax_rate));
    let rate_radicand = 2.0 * (params.annual_discount_rate + lambda);
    if cost_radicand < 0.0 || rate_radicand < 0.0 {
        return None;
    }

    let threshold = 100.0 * cost_radicand.sqrt() * rate_radicand.sqrt();
    threshold.is_finite().then_some(threshold)
}

/// Refinance when the observed gap exceeds the threshold
pub fn should_refi(rate_gap: Option<f64>, threshold: Option<f64>) -> Option<bool> {
    Some(rate_gap? > threshold?)
}

/// How far the observed gap sits above the threshold
pub fn adl_gap(rate_gap: Option<f64>, threshold: Option<f64>) -> Option<f64> {
    Some(rate_gap? - threshold?)
}

#[cfg(test)]
pub(crate) mod fixtures {
    /// 12 volatile months, then 24 months at 4% and 36 months at 3%
    pub fn market_history() -> Vec<f64> {
        let mut rates: Vec<f64> = [4.0, 8.0].repeat(6);
        rates.extend(std::iter::repeat(4.0).take(24));
        rates.extend(std::iter::repeat(3.0).take(36));
        rates
    }
}
