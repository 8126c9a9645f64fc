//! Date -> period crosswalk
//!
//! Every time-based join in the pipeline goes through this table: a calendar
//! month is looked up here to obtain a comparable integer period. It is
//! built once over a fixed range and shared read-only afterwards.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::convert::TryFrom;
use std::path::Path;

use super::dates::{add_months, month_start, months_between};
use crate::error::{PipelineError, Result};
use crate::persist::{read_rows, Cell, TableRow};

/// Length of one period in calendar months.
///
/// Deserialises from `"monthly"`, `"quarterly"`, `"annual"` or
/// `{"months": n}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "GranularitySpec")]
pub struct PeriodGranularity {
    months: u32,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum GranularitySpec {
    Named(String),
    Custom { months: u32 },
}

impl TryFrom<GranularitySpec> for PeriodGranularity {
    type Error = String;

    fn try_from(spec: GranularitySpec) -> std::result::Result<Self, Self::Error> {
        match spec {
            GranularitySpec::Named(name) => match name.to_lowercase().as_str() {
                "monthly" | "ms" => Ok(Self::MONTHLY),
                "quarterly" | "qs" => Ok(Self::QUARTERLY),
                "annual" | "yearly" | "ys" => Ok(Self::ANNUAL),
                other => Err(format!("unknown period granularity '{}'", other)),
            },
            GranularitySpec::Custom { months } => Self::every(months).ok_or_else(|| "period length must be at least one month".to_string()),
        }
    }
}

impl PeriodGranularity {
    pub const MONTHLY: Self = Self { months: 1 };
    pub const QUARTERLY: Self = Self { months: 3 };
    pub const ANNUAL: Self = Self { months: 12 };

    /// Periods of `months` calendar months; `None` for zero
    pub fn every(months: u32) -> Option<Self> {
        (months > 0).then_some(Self { months })
    }

    pub fn months(&self) -> u32 {
        self.months
    }
}

impl Default for PeriodGranularity {
    fn default() -> Self {
        Self::MONTHLY
    }
}

/// One persisted crosswalk entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrosswalkRow {
    pub date: NaiveDate,
    pub period: u32,
}

impl TableRow for CrosswalkRow {
    fn columns() -> Vec<&'static str> {
        vec!["date", "period"]
    }

    fn cells(&self) -> Vec<Cell> {
        vec![self.date.into(), self.period.into()]
    }
}

/// Monotonic map from first-of-month dates to period indices
#[derive(Debug, Clone, PartialEq)]
pub struct PeriodCrosswalk {
    /// First month covered
    start: NaiveDate,
    /// Period index per month, offset from `start`
    periods: Vec<u32>,
}

impl PeriodCrosswalk {
    /// Build the crosswalk for every month start in `[start, end]`.
    ///
    /// A start date past the 1st rolls forward to the next month. Periods
    /// begin on calendar boundaries: every month whose index since January
    /// of year 0 is a multiple of `granularity.months()` (January, April,
    /// July and October for quarters). A month's period is the number of
    /// such boundaries in `[start, month]`, so months before the first
    /// boundary map to period 0.
    pub fn build(start: NaiveDate, end: NaiveDate, granularity: PeriodGranularity) -> Result<Self> {
        let start = if start.day() == 1 { start } else { add_months(month_start(start), 1) };
        let end = month_start(end);
        if start > end {
            return Err(PipelineError::Config(format!(
                "crosswalk range is empty: {} is after {}",
                start, end
            )));
        }

        let n_months = months_between(start, end) as u32 + 1;
        let step = granularity.months() as i64;
        let mut period = 0;
        let periods = (0..n_months)
            .map(|offset| {
                let month = add_months(start, offset as i32);
                if (month.year() as i64 * 12 + month.month0() as i64).rem_euclid(step) == 0 {
                    period += 1;
                }
                period
            })
            .collect();

        log::debug!(
            "Built period crosswalk {}..{} ({} months, {}-month periods)",
            start,
            end,
            n_months,
            granularity.months()
        );

        Ok(Self { start, periods })
    }

    /// Rebuild from persisted rows.
    ///
    /// Rows must cover consecutive months with non-decreasing periods.
    pub fn from_rows(mut rows: Vec<CrosswalkRow>) -> Result<Self> {
        rows.sort_by_key(|r| r.date);
        let first = rows
            .first()
            .ok_or_else(|| PipelineError::MissingReference("period crosswalk is empty".to_string()))?;
        let start = month_start(first.date);

        let mut periods = Vec::with_capacity(rows.len());
        for (offset, row) in rows.iter().enumerate() {
            if month_start(row.date) != add_months(start, offset as i32) {
                return Err(PipelineError::MissingReference(format!(
                    "period crosswalk has a gap before {}",
                    row.date
                )));
            }
            if periods.last().is_some_and(|&prev| row.period < prev) {
                return Err(PipelineError::MissingReference(format!(
                    "period crosswalk decreases at {}",
                    row.date
                )));
            }
            periods.push(row.period);
        }

        Ok(Self { start, periods })
    }

    /// Load a crosswalk saved by [`PeriodCrosswalk::rows`] through the persistence gate
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_rows(read_rows(path)?)
    }

    /// Period containing `date`; `None` outside the built range
    pub fn period_of(&self, date: NaiveDate) -> Option<u32> {
        let offset = months_between(self.start, month_start(date));
        if offset < 0 {
            return None;
        }
        self.periods.get(offset as usize).copied()
    }

    /// First month mapped to `period`
    pub fn date_of(&self, period: u32) -> Option<NaiveDate> {
        self.periods
            .iter()
            .position(|&p| p == period)
            .map(|offset| add_months(self.start, offset as i32))
    }

    /// `(date, period)` pairs in date order
    pub fn rows(&self) -> Vec<CrosswalkRow> {
        self.periods
            .iter()
            .enumerate()
            .map(|(offset, &period)| CrosswalkRow {
                date: add_months(self.start, offset as i32),
                period,
            })
            .collect()
    }

    pub fn first_month(&self) -> NaiveDate {
        self.start
    }

    pub fn last_month(&self) -> NaiveDate {
        add_months(self.start, self.periods.len() as i32 - 1)
    }

    pub fn len(&self) -> usize {
        self.periods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.periods.is_empty()
    }
}
