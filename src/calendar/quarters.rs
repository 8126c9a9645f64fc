//! Acquisition quarters (`YYYYQn`), the partitioning unit of the raw files

use chrono::{Datelike, NaiveDate};
use std::fmt;
use std::str::FromStr;

use crate::error::{PipelineError, Result};

/// A calendar quarter such as `2001Q3`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Quarter {
    pub year: i32,
    pub quarter: u32,
}

impl Quarter {
    pub fn new(year: i32, quarter: u32) -> Result<Self> {
        if !(1..=4).contains(&quarter) {
            return Err(PipelineError::Config(format!("quarter must be 1-4, got {}", quarter)));
        }
        Ok(Self { year, quarter })
    }

    /// Quarter containing `date`
    pub fn containing(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            quarter: (date.month() - 1) / 3 + 1,
        }
    }

    /// Loans in a quarterly file are dated to the first day of the
    /// quarter's last month (Q1 -> March, Q4 -> December)
    pub fn acquisition_date(&self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.year, self.quarter * 3, 1)
            .unwrap_or(NaiveDate::MIN)
    }

    pub fn next(&self) -> Self {
        if self.quarter == 4 {
            Self { year: self.year + 1, quarter: 1 }
        } else {
            Self { year: self.year, quarter: self.quarter + 1 }
        }
    }

    /// File stem of the raw quarterly extract
    pub fn label(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Quarter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}Q{}", self.year, self.quarter)
    }
}

impl FromStr for Quarter {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || PipelineError::Config(format!("invalid quarter label '{}'", s));
        let (year, quarter) = s.trim().split_once(['Q', 'q']).ok_or_else(invalid)?;
        let year: i32 = year.parse().map_err(|_| invalid())?;
        let quarter: u32 = quarter.parse().map_err(|_| invalid())?;
        Quarter::new(year, quarter)
    }
}

/// Every quarter touched by `[start, end]`, in order
pub fn quarters_between(start: NaiveDate, end: NaiveDate) -> Result<Vec<Quarter>> {
    if start > end {
        return Err(PipelineError::Config(format!(
            "sample range is empty: {} is after {}",
            start, end
        )));
    }

    let last = Quarter::containing(end);
    let mut current = Quarter::containing(start);
    let mut quarters = vec![current];
    while current < last {
        current = current.next();
        quarters.push(current);
    }
    Ok(quarters)
}
