//! Loan-panel construction, one acquisition quarter at a time
//!
//! Each quarter is an independent partition: a loan is acquired in exactly
//! one quarter, so all of its rows are in the same file. Quarters are built
//! in parallel and share the reference tables read-only.

use rayon::prelude::*;
use std::path::Path;

use super::bins::RateGapBins;
use super::clean::CleanRecord;
use super::fill::fill_within_groups;
use crate::calendar::{PeriodCrosswalk, Quarter};
use crate::error::{PipelineError, Result};
use crate::loan::{load_raw_records, GeographyCrosswalk, LoanPeriod, RawLoanRecord};
use crate::macro_series::PeriodSeries;
use crate::persist::{read_rows, save_table, SaveOptions, SaveReport, Table};

/// Key columns of every loan-period table
pub const PANEL_KEYS: [&str; 2] = ["loan_id", "period"];

/// Reference data shared by every quarter
#[derive(Debug, Clone, Copy)]
pub struct PanelBuilder<'a> {
    crosswalk: &'a PeriodCrosswalk,
    geography: &'a GeographyCrosswalk,
    mortgage_rates: &'a PeriodSeries,
    bins: RateGapBins,
}

impl<'a> PanelBuilder<'a> {
    pub fn new(
        crosswalk: &'a PeriodCrosswalk,
        geography: &'a GeographyCrosswalk,
        mortgage_rates: &'a PeriodSeries,
        bins: RateGapBins,
    ) -> Self {
        Self {
            crosswalk,
            geography,
            mortgage_rates,
            bins,
        }
    }

    /// Build the finished panel rows of one quarter
    pub fn build(&self, quarter: Quarter, raw: Vec<RawLoanRecord>) -> Result<Vec<LoanPeriod>> {
        let n_raw = raw.len();
        let mut rows: Vec<LoanPeriod> = raw
            .into_iter()
            .filter_map(|r| self.to_loan_period(CleanRecord::from_raw(r, quarter)))
            .collect();

        let dropped = n_raw - rows.len();
        if dropped > 0 {
            log::warn!("{}: dropped {} rows whose activity date has no period", quarter, dropped);
        }
        let unmatched = rows.iter().filter(|r| r.state.is_some() && r.fips.is_none()).count();
        if unmatched > 0 {
            log::warn!("{}: {} rows have a state with no FIPS code", quarter, unmatched);
        }

        rows.sort_by(|a, b| a.loan_id.cmp(&b.loan_id).then(a.period.cmp(&b.period)));
        ensure_unique_keys(&rows)?;

        fill_within_groups(&mut rows, |r| r.loan_id.clone(), |r| r.exit_code, |r, v| r.exit_code = Some(v));
        fill_within_groups(&mut rows, |r| r.loan_id.clone(), |r| r.date_exit, |r, v| r.date_exit = Some(v));
        fill_within_groups(&mut rows, |r| r.loan_id.clone(), |r| r.period_exit, |r, v| r.period_exit = Some(v));

        for row in &mut rows {
            row.time_to_exit = row.period_exit.map(|exit| exit as i32 - row.period as i32);
            row.set_exit_indicators();
        }

        log::debug!("{}: {} panel rows from {} raw records", quarter, rows.len(), n_raw);
        Ok(rows)
    }

    /// Map one cleaned record onto periods, geography and market rates.
    ///
    /// `None` when the activity month is outside the crosswalk.
    fn to_loan_period(&self, rec: CleanRecord) -> Option<LoanPeriod> {
        let date = rec.date?;
        let period = self.crosswalk.period_of(date)?;
        let period_orig = rec.date_orig.and_then(|d| self.crosswalk.period_of(d));
        let period_exit = rec.date_exit.and_then(|d| self.crosswalk.period_of(d));

        let rate_mortgage30us = self.mortgage_rates.get(period);
        let rate_mortgage30us_orig = self.mortgage_rates.at(period_orig);
        let rate_gap = rec.rate_curr.or(rec.rate_orig).zip(rate_mortgage30us).map(|(note, market)| note - market);
        let rate_spread_orig = rec.rate_orig.zip(rate_mortgage30us_orig).map(|(note, market)| note - market);

        let fips = rec.state.as_deref().and_then(|s| self.geography.fips_of(s));

        Some(LoanPeriod {
            period,
            date,
            date_acq: rec.date_acq,
            date_orig: rec.date_orig,
            period_orig,
            rate_orig: rec.rate_orig,
            rate_curr: rec.rate_curr,
            upb_orig: rec.upb_orig,
            upb_curr: rec.upb_curr,
            term: rec.term,
            loan_age: rec.loan_age,
            time_to_maturity: rec.months_remaining,
            ltv: rec.ltv,
            dti: rec.dti,
            num_borrowers: rec.num_borrowers,
            credit_score_orig: rec.credit_score_orig,
            credit_score_curr: rec.credit_score_curr,
            first_home_buyer: rec.first_home_buyer,
            purpose: rec.purpose,
            dlq_status: rec.dlq_status,
            fips,
            state: rec.state,
            msa: rec.msa,
            zip: rec.zip,
            mortgage_type: rec.mortgage_type,
            exit_code: rec.exit_code,
            date_exit: rec.date_exit,
            period_exit,
            time_to_exit: None,
            time_from_orig: period_orig.map(|orig| period as i32 - orig as i32),
            exit_t1: 0,
            exit_t3: 0,
            exit_t6: 0,
            exit_t12: 0,
            exit_t24: 0,
            rate_mortgage30us,
            rate_mortgage30us_orig,
            rate_spread_orig,
            rate_gap,
            rate_gap_bin: self.bins.bin(rate_gap),
            loan_id: rec.loan_id,
        })
    }

    /// Build and persist every quarter found in `input_dir`
    pub fn build_quarters(&self, quarters: &[Quarter], input_dir: &Path, output_dir: &Path) -> Result<Vec<(Quarter, SaveReport)>> {
        quarters
            .par_iter()
            .map(|&quarter| {
                let raw = load_raw_records(input_dir.join(format!("{}.csv", quarter)))?;
                let rows = self.build(quarter, raw)?;
                let options = SaveOptions::new(output_dir.join(format!("{}.csv", quarter)), &PANEL_KEYS);
                let report = save_table(Table::from_rows(&rows), &options)?;
                Ok((quarter, report))
            })
            .collect()
    }
}

/// Read back the persisted panel of every quarter, in quarter order
pub fn load_panel(quarters: &[Quarter], panel_dir: &Path) -> Result<Vec<LoanPeriod>> {
    let mut panel = Vec::new();
    for quarter in quarters {
        let rows: Vec<LoanPeriod> = read_rows(panel_dir.join(format!("{}.csv", quarter)))?;
        log::debug!("{}: {} panel rows", quarter, rows.len());
        panel.extend(rows);
    }
    log::info!("Loaded {} panel rows from {} quarters", panel.len(), quarters.len());
    Ok(panel)
}

/// Rows sorted by key must not repeat `(loan_id, period)`
pub fn ensure_unique_keys(rows: &[LoanPeriod]) -> Result<()> {
    match rows
        .windows(2)
        .find(|w| w[0].loan_id == w[1].loan_id && w[0].period == w[1].period)
    {
        Some(w) => Err(PipelineError::DuplicateKey {
            keys: PANEL_KEYS.join(", "),
            example: format!("{}, {}", w[0].loan_id, w[0].period),
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::PeriodGranularity;
    use crate::loan::load_raw_records_from_reader;
    use crate::loan::raw::fixtures::{raw_line, standard_line};
    use crate::loan::raw::position::*;
    use crate::loan::ExitCode;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;

    struct Reference {
        crosswalk: PeriodCrosswalk,
        geography: GeographyCrosswalk,
        rates: PeriodSeries,
    }

    fn reference() -> Reference {
        let start = NaiveDate::from_ymd_opt(2000, 1, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2002, 12, 1).unwrap();
        Reference {
            crosswalk: PeriodCrosswalk::build(start, end, PeriodGranularity::MONTHLY).unwrap(),
            geography: vec![("CA".to_string(), 6)].into_iter().collect(),
            rates: (1..=36).map(|p| (p, if p < 4 { 8.0 } else { 7.5 })).collect(),
        }
    }

    fn records(lines: &[String]) -> Vec<RawLoanRecord> {
        load_raw_records_from_reader(lines.join("\n").as_bytes()).unwrap()
    }

    #[test]
    fn test_build_fills_exit_and_sets_horizons() {
        let reference = reference();
        let builder = PanelBuilder::new(&reference.crosswalk, &reference.geography, &reference.rates, RateGapBins::default());

        let lines = vec![
            standard_line("L1", "022000", "0", ""),
            standard_line("L1", "042000", "2", "299000"),
            standard_line("L1", "032000", "1", "299500"),
            raw_line(&[(LOAN_ID, "L1"), (ACT_PERIOD, "052000"), (ORIG_RATE, "6.0"), (ORIG_DATE, "012000"), (ZERO_BAL_CODE, "01"), (ZB_DTE, "052000"), (STATE, "CA"), (PRODUCT, "FRM")]),
            standard_line("L2", "022000", "0", ""),
        ];

        let rows = builder.build("2000Q1".parse().unwrap(), records(&lines)).unwrap();
        assert_eq!(rows.len(), 5);

        let l1: Vec<&LoanPeriod> = rows.iter().filter(|r| r.loan_id == "L1").collect();
        assert_eq!(l1.iter().map(|r| r.period).collect::<Vec<_>>(), vec![2, 3, 4, 5]);
        assert!(l1.iter().all(|r| r.exit_code == Some(ExitCode::Prepaid)));
        assert!(l1.iter().all(|r| r.period_exit == Some(5)));
        assert_eq!(l1.iter().map(|r| r.time_to_exit).collect::<Vec<_>>(), vec![Some(3), Some(2), Some(1), Some(0)]);
        assert_eq!(l1.iter().map(|r| r.exit_t1).collect::<Vec<_>>(), vec![0, 0, 1, 0]);
        assert_eq!(l1.iter().map(|r| r.exit_t3).collect::<Vec<_>>(), vec![1, 1, 1, 1]);

        let first = l1[0];
        assert_eq!(first.period_orig, Some(1));
        assert_eq!(first.time_from_orig, Some(1));
        assert_eq!(first.fips, Some(6));
        assert_relative_eq!(first.rate_mortgage30us.unwrap(), 8.0);
        assert_relative_eq!(first.rate_gap.unwrap(), -2.0);
        assert_relative_eq!(first.rate_spread_orig.unwrap(), -2.0);
        assert_eq!(first.rate_gap_bin, Some(11));
        assert_relative_eq!(l1[2].rate_gap.unwrap(), -1.5);

        let l2 = rows.iter().find(|r| r.loan_id == "L2").unwrap();
        assert_eq!(l2.exit_code, None);
        assert_eq!(l2.time_to_exit, None);
        assert_eq!(l2.exit_t24, 0);
    }

    #[test]
    fn test_rows_outside_crosswalk_are_dropped() {
        let reference = reference();
        let builder = PanelBuilder::new(&reference.crosswalk, &reference.geography, &reference.rates, RateGapBins::default());
        let lines = vec![standard_line("L1", "021999", "0", ""), standard_line("L1", "022000", "1", "")];
        let rows = builder.build("2000Q1".parse().unwrap(), records(&lines)).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].period, 2);
    }

    #[test]
    fn test_duplicate_loan_period_is_fatal() {
        let reference = reference();
        let builder = PanelBuilder::new(&reference.crosswalk, &reference.geography, &reference.rates, RateGapBins::default());
        let lines = vec![standard_line("L1", "022000", "0", ""), standard_line("L1", "022000", "0", "")];
        let err = builder.build("2000Q1".parse().unwrap(), records(&lines)).unwrap_err();
        assert!(matches!(err, PipelineError::DuplicateKey { .. }));
    }

    #[test]
    fn test_unmatched_state_has_no_fips() {
        let reference = reference();
        let builder = PanelBuilder::new(&reference.crosswalk, &reference.geography, &reference.rates, RateGapBins::default());
        let lines = vec![raw_line(&[(LOAN_ID, "L9"), (ACT_PERIOD, "022000"), (STATE, "ZZ")])];
        let rows = builder.build("2000Q1".parse().unwrap(), records(&lines)).unwrap();
        assert_eq!(rows[0].state.as_deref(), Some("ZZ"));
        assert_eq!(rows[0].fips, None);
        assert_eq!(rows[0].rate_gap, None);
        assert_eq!(rows[0].rate_gap_bin, None);
    }

    #[test]
    fn test_build_quarters_persists_each_quarter() {
        let reference = reference();
        let builder = PanelBuilder::new(&reference.crosswalk, &reference.geography, &reference.rates, RateGapBins::default());
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        std::fs::write(input.path().join("2000Q1.csv"), standard_line("L1", "022000", "0", "")).unwrap();
        std::fs::write(input.path().join("2000Q2.csv"), standard_line("L2", "052000", "0", "")).unwrap();

        let quarters: Vec<Quarter> = vec!["2000Q1".parse().unwrap(), "2000Q2".parse().unwrap()];
        let reports = builder.build_quarters(&quarters, input.path(), output.path()).unwrap();
        assert_eq!(reports.len(), 2);
        assert!(reports.iter().all(|(_, r)| r.rows == 1));
        assert!(output.path().join("2000Q2.csv").exists());
        assert!(output.path().join("2000Q2.log").exists());

        let panel = load_panel(&quarters, output.path()).unwrap();
        let ids: Vec<&str> = panel.iter().map(|r| r.loan_id.as_str()).collect();
        assert_eq!(ids, ["L1", "L2"]);
        assert_eq!(panel[1].period, 5);
    }
}
