//! Scenario runner for the refinance model
//!
//! Reference data shared by every scenario (rate volatility, CPI levels,
//! realised inflation, cost and binning) is prepared once; each scenario
//! then evaluates the panel loan by loan in parallel.

use rayon::prelude::*;
use std::path::{Path, PathBuf};

use crate::calendar::PeriodCrosswalk;
use crate::config::{PipelineConfig, ScenarioParameters, TransactionCost};
use crate::error::Result;
use crate::loan::LoanPeriod;
use crate::macro_series::{CpiBase, MonthlySeries, PeriodSeries};
use crate::panel::{RateGapBins, PANEL_KEYS};
use crate::persist::{save_table, SaveOptions, SaveReport, Table};
use crate::refi::{
    adl_gap, adl_threshold, impute_upb, should_refi, NpvComparator, ProcessedLoanPeriod, RateVolatility,
    SampleMask, ThresholdInputs,
};

/// Pre-loaded reference data for running refinance scenarios
///
/// # Example
/// ```ignore
/// let runner = ScenarioRunner::from_series(&config, &rates, &cpi, &crosswalk)?;
/// let panel = runner.prepare(panel);
/// for (name, rows) in runner.run_all(&config, &panel) {
///     runner.persist(&name, &rows, out_dir)?;
/// }
/// ```
#[derive(Debug, Clone)]
pub struct ScenarioRunner {
    volatility: RateVolatility,
    cpi_base: CpiBase,
    period_cpi: PeriodSeries,
    period_inflation: PeriodSeries,
    cost: TransactionCost,
    bins: RateGapBins,
    imputation_window: usize,
}

impl ScenarioRunner {
    /// Build the shared reference data from monthly market-rate and CPI series
    pub fn from_series(
        config: &PipelineConfig,
        mortgage_rates: &MonthlySeries,
        cpi: &MonthlySeries,
        crosswalk: &PeriodCrosswalk,
    ) -> Result<Self> {
        let cpi_base = CpiBase::new(cpi, config.cpi_base_date)?;
        let volatility = RateVolatility::from_monthly_rates(&mortgage_rates.values());
        if let Some(vol) = volatility.annual() {
            log::info!("Annualised mortgage-rate volatility: {:.6}", vol);
        }

        Ok(Self {
            volatility,
            cpi_base,
            period_cpi: cpi.by_period(crosswalk),
            period_inflation: cpi.annualized_inflation().by_period(crosswalk),
            cost: config.transaction_cost,
            bins: RateGapBins::new(config.rate_gap_bins),
            imputation_window: config.imputation_window,
        })
    }

    /// Order the panel by loan and period and impute leading zero balances
    pub fn prepare(&self, mut panel: Vec<LoanPeriod>) -> Vec<LoanPeriod> {
        panel.sort_by(|a, b| a.loan_id.cmp(&b.loan_id).then(a.period.cmp(&b.period)));
        let imputed = impute_upb(&mut panel, self.imputation_window);
        if imputed > 0 {
            log::info!("Imputed {} leading zero balances from the amortisation schedule", imputed);
        }
        panel
    }

    /// Evaluate one scenario over a prepared panel
    pub fn run(&self, name: &str, params: &ScenarioParameters, panel: &[LoanPeriod]) -> Vec<ProcessedLoanPeriod> {
        let comparator = NpvComparator::new(params, self.cost);
        let loans: Vec<&[LoanPeriod]> = panel.chunk_by(|a, b| a.loan_id == b.loan_id).collect();

        let rows: Vec<ProcessedLoanPeriod> = loans
            .par_iter()
            .map(|loan| self.process_loan(name, params, &comparator, loan))
            .collect::<Vec<_>>()
            .into_iter()
            .flatten()
            .collect();

        let undefined = rows.iter().filter(|r| r.adl_threshold.is_none()).count();
        if undefined > 0 {
            log::warn!("Scenario '{}': threshold undefined for {} of {} rows", name, undefined, rows.len());
        }
        log::info!("Scenario '{}': processed {} loans, {} rows", name, loans.len(), rows.len());
        rows
    }

    /// Every configured scenario, in name order
    pub fn run_all(&self, config: &PipelineConfig, panel: &[LoanPeriod]) -> Vec<(String, Vec<ProcessedLoanPeriod>)> {
        config
            .scenarios
            .iter()
            .map(|(name, params)| (name.clone(), self.run(name, params, panel)))
            .collect()
    }

    /// Save both analysis samples of a scenario as
    /// `processed_{scenario}_{sample}.csv`
    pub fn persist(
        &self,
        name: &str,
        rows: &[ProcessedLoanPeriod],
        output_dir: &Path,
    ) -> Result<Vec<(PathBuf, SaveReport)>> {
        SampleMask::ALL
            .iter()
            .map(|mask| {
                let path = output_dir.join(format!("processed_{}_{}.csv", name, mask.name()));
                let selected: Vec<ProcessedLoanPeriod> =
                    rows.iter().filter(|r| mask.matches(&r.loan)).cloned().collect();
                let report = save_table(Table::from_rows(&selected), &SaveOptions::new(&path, &PANEL_KEYS))?;
                Ok((path, report))
            })
            .collect()
    }

    fn process_loan(
        &self,
        name: &str,
        params: &ScenarioParameters,
        comparator: &NpvComparator,
        loan: &[LoanPeriod],
    ) -> Vec<ProcessedLoanPeriod> {
        let evaluated: Vec<RowEvaluation> = loan.iter().map(|row| self.evaluate(params, row)).collect();
        let decisions: Vec<Option<bool>> = evaluated.iter().map(|e| e.should_refi).collect();
        let savings = comparator.compare(loan, &decisions);

        let first_cpi = evaluated.first().and_then(|e| e.cpi);
        let deflate = |value: Option<f64>| self.cpi_base.deflate(value, first_cpi);
        let savings_optimal_refi_adj = deflate(savings.savings_optimal_refi);
        let savings_realized_refi_adj = deflate(savings.savings_realized_refi);
        let savings_loss_adj = deflate(savings.savings_loss);

        loan.iter()
            .zip(evaluated)
            .map(|(row, e)| {
                let rate_mortgage30us_adj = self.cpi_base.deflate(row.rate_mortgage30us, e.cpi);
                let rate_gap_adj = row.note_rate().zip(rate_mortgage30us_adj).map(|(note, market)| note - market);
                let gap = adl_gap(row.rate_gap, e.threshold);
                let gap_adj = adl_gap(rate_gap_adj, e.threshold);
                ProcessedLoanPeriod {
                    loan: row.clone(),
                    scenario: name.to_string(),
                    cpi: e.cpi,
                    inflation_annualized: e.inflation,
                    transaction_cost: row.upb_curr.map(|b| self.cost.amount(b)),
                    adl_threshold: e.threshold,
                    should_refi: e.should_refi,
                    adl_gap: gap,
                    adl_gap_bin: self.bins.bin(gap),
                    rate_mortgage30us_adj,
                    rate_gap_adj,
                    rate_gap_adj_bin: self.bins.bin(rate_gap_adj),
                    adl_gap_adj: gap_adj,
                    adl_gap_adj_bin: self.bins.bin(gap_adj),
                    rate_orig_adj: self.cpi_base.deflate(row.rate_orig, e.cpi),
                    rate_curr_adj: self.cpi_base.deflate(row.rate_curr, e.cpi),
                    upb_orig_adj: self.cpi_base.deflate(row.upb_orig, e.cpi),
                    upb_curr_adj: self.cpi_base.deflate(row.upb_curr, e.cpi),
                    npv_never_refi: savings.npv_never_refi,
                    npv_optimal_refi: savings.npv_optimal_refi,
                    npv_realized_refi: savings.npv_realized_refi,
                    savings_optimal_refi: savings.savings_optimal_refi,
                    savings_realized_refi: savings.savings_realized_refi,
                    savings_loss: savings.savings_loss,
                    savings_optimal_refi_adj,
                    savings_realized_refi_adj,
                    savings_loss_adj,
                    period_refi_optimal: savings.period_refi_optimal,
                    refi_delay: savings.refi_delay,
                }
            })
            .collect()
    }

    fn evaluate(&self, params: &ScenarioParameters, row: &LoanPeriod) -> RowEvaluation {
        let cpi = self.period_cpi.get(row.period);
        let inflation = params
            .expected_inflation
            .or_else(|| self.period_inflation.get(row.period));
        let threshold = (|| {
            let inputs = ThresholdInputs {
                rate_orig: row.rate_orig?,
                upb_orig: row.upb_orig?,
                upb_curr: row.upb_curr?,
                term: row.term?,
                inflation,
            };
            adl_threshold(&inputs, params, self.volatility, &self.cost)
        })();

        RowEvaluation {
            cpi,
            inflation,
            threshold,
            should_refi: should_refi(row.rate_gap, threshold),
        }
    }
}

/// Row-level inputs the loan-level comparison depends on
struct RowEvaluation {
    cpi: Option<f64>,
    inflation: Option<f64>,
    threshold: Option<f64>,
    should_refi: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::{add_months, PeriodGranularity};
    use crate::persist::{read_rows, TableRow};
    use crate::refi::fixtures::{market_history, refi_loan};
    use crate::refi::SavingsRecord;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;
    use std::collections::BTreeMap;

    fn ymd(y: i32, m: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, 1).unwrap()
    }

    fn config() -> PipelineConfig {
        let mut scenarios = BTreeMap::new();
        scenarios.insert("baseline".to_string(), ScenarioParameters::default());
        scenarios.insert(
            "mobile".to_string(),
            ScenarioParameters {
                prob_move: 0.5,
                ..ScenarioParameters::default()
            },
        );
        PipelineConfig {
            sample_start: ymd(2001, 1),
            sample_end: ymd(2001, 3),
            crosswalk_start: ymd(2001, 1),
            crosswalk_end: ymd(2005, 12),
            period: PeriodGranularity::MONTHLY,
            seed: 123,
            sample_fraction: 1.0,
            sample_term: 360,
            cpi_base_date: ymd(2001, 1),
            rate_gap_bins: Default::default(),
            transaction_cost: TransactionCost::default(),
            imputation_window: 6,
            scenarios,
        }
    }

    /// Market history from 2000-01 and flat CPI; period 1 is 2001-01 so
    /// the volatile first year sits before the panel
    fn runner(config: &PipelineConfig) -> ScenarioRunner {
        let start = ymd(2000, 1);
        let rates = MonthlySeries::from_observations(
            market_history()
                .into_iter()
                .enumerate()
                .map(|(i, r)| (add_months(start, i as i32), r)),
        );
        let cpi = MonthlySeries::from_observations((0..72).map(|i| (add_months(start, i), 100.0)));
        let crosswalk =
            PeriodCrosswalk::build(config.crosswalk_start, config.crosswalk_end, config.period).unwrap();
        ScenarioRunner::from_series(config, &rates, &cpi, &crosswalk).unwrap()
    }

    #[test]
    fn test_first_refi_signal() {
        let config = config();
        let runner = runner(&config);
        let panel = runner.prepare(refi_loan());
        let rows = runner.run("baseline", config.scenario("baseline").unwrap(), &panel);

        assert_eq!(rows.len(), 36);
        let first = rows.iter().find(|r| r.should_refi == Some(true)).unwrap();
        assert_eq!(first.loan.period, 25);
        assert!(rows[..24].iter().all(|r| r.should_refi == Some(false)));
        assert_relative_eq!(rows[24].adl_threshold.unwrap(), 2.099406559180665, epsilon = 1e-6);
        assert_eq!(rows[0].inflation_annualized, Some(0.0));

        for row in &rows {
            assert_eq!(row.scenario, "baseline");
            assert_eq!(row.period_refi_optimal, Some(25));
            assert_eq!(row.refi_delay, 12);
            assert_relative_eq!(row.savings_optimal_refi.unwrap(), 79133.06910322123, epsilon = 1e-4);
            assert_relative_eq!(row.savings_optimal_refi_adj.unwrap(), row.savings_optimal_refi.unwrap());
            assert_relative_eq!(
                row.savings_loss.unwrap(),
                row.savings_optimal_refi.unwrap() - row.savings_realized_refi.unwrap(),
                epsilon = 1e-9
            );
        }
    }

    #[test]
    fn test_real_dollar_gaps_are_binned() {
        let config = config();
        let runner = runner(&config);
        let rows = runner.run("baseline", config.scenario("baseline").unwrap(), &runner.prepare(refi_loan()));
        let bins = RateGapBins::new(config.rate_gap_bins);

        // flat CPI: a 2 point gap lands in [2.0, 2.2), a 3 point gap in [3.0, 3.2)
        assert_eq!(rows[0].rate_gap_adj_bin, Some(31));
        assert_eq!(rows[24].rate_gap_adj_bin, Some(36));
        for row in &rows {
            assert_eq!(row.rate_gap_adj_bin, bins.bin(row.rate_gap_adj));
            assert_eq!(row.adl_gap_adj_bin, bins.bin(row.adl_gap_adj));
            assert!(row.adl_gap_adj_bin.is_some());
        }

        let columns = ProcessedLoanPeriod::columns();
        assert!(columns.contains(&"rate_gap_adj_bin"));
        assert!(columns.contains(&"adl_gap_adj_bin"));
    }

    #[test]
    fn test_expected_inflation_overrides_realised() {
        let config = config();
        let runner = runner(&config);
        let params = ScenarioParameters {
            expected_inflation: Some(0.02),
            ..ScenarioParameters::default()
        };
        let rows = runner.run("inflating", &params, &runner.prepare(refi_loan()));
        assert_eq!(rows[0].inflation_annualized, Some(0.02));
        assert_relative_eq!(rows[0].adl_threshold.unwrap(), 2.2011349055916427, epsilon = 1e-6);
    }

    #[test]
    fn test_missing_balance_leaves_threshold_undefined() {
        let config = config();
        let runner = runner(&config);
        let mut panel = refi_loan();
        panel[20].upb_curr = None;
        let rows = runner.run("baseline", &ScenarioParameters::default(), &runner.prepare(panel));
        assert!(rows[20].adl_threshold.is_none());
        assert!(rows[20].should_refi.is_none());
        assert!(rows[20].transaction_cost.is_none());
        assert_eq!(rows[20].refi_delay, 12);
    }

    #[test]
    fn test_run_all_and_persist() {
        let config = config();
        let runner = runner(&config);
        let panel = runner.prepare(refi_loan());
        let results = runner.run_all(&config, &panel);
        let names: Vec<&str> = results.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, ["baseline", "mobile"]);

        let dir = tempfile::tempdir().unwrap();
        let (name, rows) = &results[0];
        let saved = runner.persist(name, rows, dir.path()).unwrap();
        assert_eq!(saved.len(), 2);
        assert!(dir.path().join("processed_baseline_full.csv").exists());
        assert!(dir.path().join("processed_baseline_refi_eligible.csv").exists());

        // time_to_exit >= 1 keeps periods 1..=30
        assert_eq!(saved[0].1.rows, 30);
        // the fixture carries no credit score, LTV or delinquency status
        assert_eq!(saved[1].1.rows, 0);

        let back: Vec<SavingsRecord> = read_rows(dir.path().join("processed_baseline_full.csv")).unwrap();
        assert_eq!(back.len(), 30);
        assert_eq!(back[0].refi_delay, 12);
    }
}
