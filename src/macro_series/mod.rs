//! Macro time series: the 30-year mortgage rate and CPI

mod cpi;
mod series;

pub use cpi::CpiBase;
pub use series::{MonthlySeries, PeriodSeries};
