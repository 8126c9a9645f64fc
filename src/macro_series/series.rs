//! Monthly macro series and their per-period view

use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::path::Path;

use crate::calendar::{add_months, month_start, parse_date, PeriodCrosswalk};
use crate::error::{PipelineError, Result};
use crate::persist::{Cell, Table};

/// A series with one value per calendar month
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MonthlySeries {
    values: BTreeMap<NaiveDate, f64>,
}

impl MonthlySeries {
    /// Aggregate raw observations to calendar months by mean.
    ///
    /// Non-finite observations are skipped.
    pub fn from_observations<I>(observations: I) -> Self
    where
        I: IntoIterator<Item = (NaiveDate, f64)>,
    {
        let mut sums: BTreeMap<NaiveDate, (f64, usize)> = BTreeMap::new();
        for (date, value) in observations {
            if !value.is_finite() {
                continue;
            }
            let entry = sums.entry(month_start(date)).or_insert((0.0, 0));
            entry.0 += value;
            entry.1 += 1;
        }

        Self {
            values: sums
                .into_iter()
                .map(|(month, (sum, n))| (month, sum / n as f64))
                .collect(),
        }
    }

    /// Load a `(date, value)` CSV with a header row.
    ///
    /// The first column is the date in any recognised encoding, the second
    /// the value. Blank or `.` values (FRED's missing marker) are skipped.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut reader = csv::Reader::from_path(path)?;
        let mut observations = Vec::new();
        let mut skipped = 0usize;

        for result in reader.records() {
            let record = result?;
            let line = record.position().map_or(0, |p| p.line());
            let raw_date = record.get(0).unwrap_or("");
            let raw_value = record.get(1).unwrap_or("").trim();

            let date = parse_date(raw_date, None).ok_or_else(|| PipelineError::InvalidDate(raw_date.to_string()))?;
            if raw_value.is_empty() || raw_value == "." {
                skipped += 1;
                continue;
            }
            let value: f64 = raw_value.parse().map_err(|_| PipelineError::MalformedRecord {
                line,
                reason: format!("non-numeric value '{}'", raw_value),
            })?;
            observations.push((date, value));
        }

        let series = Self::from_observations(observations);
        log::info!(
            "Loaded {} monthly values from {} ({} missing observations skipped)",
            series.len(),
            path.display(),
            skipped
        );
        Ok(series)
    }

    /// Value for the month containing `date`
    pub fn get(&self, date: NaiveDate) -> Option<f64> {
        self.values.get(&month_start(date)).copied()
    }

    /// `(month, value)` pairs in date order
    pub fn iter(&self) -> impl Iterator<Item = (NaiveDate, f64)> + '_ {
        self.values.iter().map(|(d, v)| (*d, *v))
    }

    pub fn values(&self) -> Vec<f64> {
        self.values.values().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// `ln(x_t / x_{t-12})` for every month with a positive value a year earlier
    pub fn annualized_inflation(&self) -> MonthlySeries {
        let values = self
            .values
            .iter()
            .filter_map(|(&month, &value)| {
                let base = self.get(add_months(month, -12))?;
                (base > 0.0 && value > 0.0).then(|| (month, (value / base).ln()))
            })
            .collect();
        MonthlySeries { values }
    }

    /// Mean value of the months in each crosswalk period
    pub fn by_period(&self, crosswalk: &PeriodCrosswalk) -> PeriodSeries {
        let mut sums: BTreeMap<u32, (f64, usize)> = BTreeMap::new();
        let mut dropped = 0usize;
        for (&month, &value) in &self.values {
            match crosswalk.period_of(month) {
                Some(period) => {
                    let entry = sums.entry(period).or_insert((0.0, 0));
                    entry.0 += value;
                    entry.1 += 1;
                }
                None => dropped += 1,
            }
        }
        if dropped > 0 {
            log::debug!("{} months fall outside the period crosswalk", dropped);
        }

        PeriodSeries {
            values: sums
                .into_iter()
                .map(|(period, (sum, n))| (period, sum / n as f64))
                .collect(),
        }
    }

    /// Two-column table ready for the persistence gate, keyed by `date`
    pub fn to_table(&self, value_column: &str) -> Table {
        let mut table = Table::new(["date", value_column]);
        for (month, value) in self.iter() {
            table.push_row(vec![Cell::from(month), Cell::from(value)]);
        }
        table
    }
}

/// A macro series keyed by crosswalk period
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PeriodSeries {
    values: BTreeMap<u32, f64>,
}

impl PeriodSeries {
    pub fn get(&self, period: u32) -> Option<f64> {
        self.values.get(&period).copied()
    }

    /// Lookup for an optional period, as joins on nullable keys need
    pub fn at(&self, period: Option<u32>) -> Option<f64> {
        period.and_then(|p| self.get(p))
    }

    /// Values in period order
    pub fn values(&self) -> Vec<f64> {
        self.values.values().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl FromIterator<(u32, f64)> for PeriodSeries {
    fn from_iter<I: IntoIterator<Item = (u32, f64)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}
