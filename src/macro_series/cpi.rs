//! Real-dollar conversion against a fixed CPI base month

use chrono::NaiveDate;

use super::series::MonthlySeries;
use crate::error::{PipelineError, Result};

/// CPI level of the base month
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CpiBase {
    pub date: NaiveDate,
    pub value: f64,
}

impl CpiBase {
    /// Fails when the base month is absent or not positive
    pub fn new(cpi: &MonthlySeries, base_date: NaiveDate) -> Result<Self> {
        match cpi.get(base_date) {
            Some(value) if value > 0.0 => Ok(Self {
                date: base_date,
                value,
            }),
            _ => Err(PipelineError::MissingReference(format!(
                "CPI has no positive value for base month {}",
                base_date.format("%Y-%m")
            ))),
        }
    }

    /// Express `value`, measured at price level `cpi`, in base-month dollars
    pub fn deflate(&self, value: Option<f64>, cpi: Option<f64>) -> Option<f64> {
        match (value, cpi) {
            (Some(v), Some(c)) if c > 0.0 => Some(v * self.value / c),
            _ => None,
        }
    }
}
