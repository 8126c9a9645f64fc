//! Date string normalisation
//!
//! Raw sources encode dates in a handful of ways (`MMYYYY` activity
//! periods, ISO dates from macro exports, spelled-out months in survey
//! files). Everything is reduced to a `NaiveDate`; month-only encodings map
//! to the first day of the month.

use chrono::{Datelike, Months, NaiveDate};

/// Recognised date encodings, in auto-detection order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatePattern {
    /// 2023-01-15
    IsoDate,
    /// 15/01/2023
    DayMonthYear,
    /// 15/jan/2023
    DaySlashMonthName,
    /// 15-jan-2023
    DayDashMonthName,
    /// january 15, 2023
    MonthNameDayYear,
    /// 012023
    MonthYearCompact,
    /// 01/2023
    MonthSlashYear,
    /// 01-2023
    MonthDashYear,
    /// january, 2023
    MonthNameYear,
    /// 202301
    YearMonthCompact,
}

impl DatePattern {
    pub const ALL: [DatePattern; 10] = [
        DatePattern::IsoDate,
        DatePattern::DayMonthYear,
        DatePattern::DaySlashMonthName,
        DatePattern::DayDashMonthName,
        DatePattern::MonthNameDayYear,
        DatePattern::MonthYearCompact,
        DatePattern::MonthSlashYear,
        DatePattern::MonthDashYear,
        DatePattern::MonthNameYear,
        DatePattern::YearMonthCompact,
    ];

    fn parse(self, text: &str) -> Option<NaiveDate> {
        match self {
            DatePattern::IsoDate => {
                let (y, m, d) = split3(text, '-')?;
                if y.len() != 4 || m.len() != 2 || d.len() != 2 {
                    return None;
                }
                ymd(y, m, d)
            }
            DatePattern::DayMonthYear => {
                let (d, m, y) = split3(text, '/')?;
                if !(1..=2).contains(&d.len()) || !(1..=2).contains(&m.len()) {
                    return None;
                }
                let year = expand_year(y)?;
                NaiveDate::from_ymd_opt(year, m.parse().ok()?, d.parse().ok()?)
            }
            DatePattern::DaySlashMonthName | DatePattern::DayDashMonthName => {
                let sep = if self == DatePattern::DaySlashMonthName { '/' } else { '-' };
                let (d, m, y) = split3(text, sep)?;
                if m.len() != 3 || y.len() != 4 {
                    return None;
                }
                NaiveDate::from_ymd_opt(y.parse().ok()?, month_from_name(m)?, d.parse().ok()?)
            }
            DatePattern::MonthNameDayYear => {
                let (head, year) = text.split_once(',')?;
                let mut parts = head.split_whitespace();
                let month = month_from_name(parts.next()?)?;
                let day: u32 = parts.next()?.parse().ok()?;
                if parts.next().is_some() {
                    return None;
                }
                NaiveDate::from_ymd_opt(four_digits(year.trim())?, month, day)
            }
            DatePattern::MonthYearCompact => {
                if text.len() != 6 || !text.chars().all(|c| c.is_ascii_digit()) {
                    return None;
                }
                ymd(&text[2..], &text[..2], "01")
            }
            DatePattern::MonthSlashYear | DatePattern::MonthDashYear => {
                let sep = if self == DatePattern::MonthSlashYear { '/' } else { '-' };
                let (m, y) = text.split_once(sep)?;
                if m.len() != 2 || y.len() != 4 {
                    return None;
                }
                ymd(y, m, "01")
            }
            DatePattern::MonthNameYear => {
                let (m, y) = text.split_once(',')?;
                NaiveDate::from_ymd_opt(four_digits(y.trim())?, month_from_name(m.trim())?, 1)
            }
            DatePattern::YearMonthCompact => {
                if text.len() != 6 || !text.chars().all(|c| c.is_ascii_digit()) {
                    return None;
                }
                ymd(&text[..4], &text[4..], "01")
            }
        }
    }
}

fn split3(text: &str, sep: char) -> Option<(&str, &str, &str)> {
    let mut parts = text.split(sep);
    let a = parts.next()?;
    let b = parts.next()?;
    let c = parts.next()?;
    if parts.next().is_some() {
        return None;
    }
    Some((a.trim(), b.trim(), c.trim()))
}

fn ymd(y: &str, m: &str, d: &str) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(four_digits(y)?, m.parse().ok()?, d.parse().ok()?)
}

fn four_digits(y: &str) -> Option<i32> {
    if y.len() != 4 || !y.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    y.parse().ok()
}

fn expand_year(y: &str) -> Option<i32> {
    let value: i32 = y.parse().ok()?;
    match y.len() {
        2 => Some(2000 + value),
        3 | 4 => Some(value),
        _ => None,
    }
}

fn month_from_name(name: &str) -> Option<u32> {
    let month = match name {
        "jan" | "january" => 1,
        "feb" | "february" => 2,
        "mar" | "march" => 3,
        "apr" | "april" => 4,
        "may" => 5,
        "jun" | "june" => 6,
        "jul" | "july" => 7,
        "aug" | "august" => 8,
        "sep" | "sept" | "september" => 9,
        "oct" | "october" => 10,
        "nov" | "november" => 11,
        "dec" | "december" => 12,
        _ => return None,
    };
    Some(month)
}

/// Parse a raw date string.
///
/// With an explicit pattern only that encoding is tried; otherwise the
/// first pattern in [`DatePattern::ALL`] that parses wins. Blank or
/// unparseable input yields `None`.
pub fn parse_date(text: &str, pattern: Option<DatePattern>) -> Option<NaiveDate> {
    let cleaned = text.trim().to_lowercase();
    if cleaned.is_empty() {
        return None;
    }
    match pattern {
        Some(p) => p.parse(&cleaned),
        None => DatePattern::ALL.iter().find_map(|p| p.parse(&cleaned)),
    }
}

/// First day of the month containing `date`
pub fn month_start(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

/// Shift a date by a signed number of months, clamping the day
pub fn add_months(date: NaiveDate, months: i32) -> NaiveDate {
    let shifted = if months >= 0 {
        date.checked_add_months(Months::new(months as u32))
    } else {
        date.checked_sub_months(Months::new(months.unsigned_abs()))
    };
    shifted.unwrap_or(date)
}

/// Whole calendar months from `from` to `to` (negative when `to` is earlier)
pub fn months_between(from: NaiveDate, to: NaiveDate) -> i32 {
    (to.year() - from.year()) * 12 + to.month() as i32 - from.month() as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_activity_period_encoding() {
        assert_eq!(parse_date("012000", Some(DatePattern::MonthYearCompact)), Some(date(2000, 1, 1)));
        assert_eq!(parse_date("122019", Some(DatePattern::MonthYearCompact)), Some(date(2019, 12, 1)));
        assert_eq!(parse_date("132019", Some(DatePattern::MonthYearCompact)), None);
        assert_eq!(parse_date("", Some(DatePattern::MonthYearCompact)), None);
    }

    #[test]
    fn test_auto_detection() {
        assert_eq!(parse_date("2023-01-15", None), Some(date(2023, 1, 15)));
        assert_eq!(parse_date("15/01/2023", None), Some(date(2023, 1, 15)));
        assert_eq!(parse_date("15-Jan-2023", None), Some(date(2023, 1, 15)));
        assert_eq!(parse_date("  January 15, 2023 ", None), Some(date(2023, 1, 15)));
        assert_eq!(parse_date("01/2023", None), Some(date(2023, 1, 1)));
        assert_eq!(parse_date("March, 2021", None), Some(date(2021, 3, 1)));
        // Six digits are read as MMYYYY before YYYYMM
        assert_eq!(parse_date("032021", None), Some(date(2021, 3, 1)));
        assert_eq!(parse_date("202103", Some(DatePattern::YearMonthCompact)), Some(date(2021, 3, 1)));
        assert_eq!(parse_date("not a date", None), None);
    }

    #[test]
    fn test_month_arithmetic() {
        assert_eq!(month_start(date(2020, 2, 29)), date(2020, 2, 1));
        assert_eq!(add_months(date(2020, 1, 31), 1), date(2020, 2, 29));
        assert_eq!(add_months(date(2020, 3, 1), -3), date(2019, 12, 1));
        assert_eq!(months_between(date(2000, 1, 1), date(2030, 1, 1)), 360);
        assert_eq!(months_between(date(2001, 6, 1), date(2001, 3, 1)), -3);
    }
}
