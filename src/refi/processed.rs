//! Scenario-tagged loan-period rows and the analysis samples drawn from them

use serde::Deserialize;

use super::annuity::Annuity;
use crate::loan::{ExitCode, LoanPeriod, MortgageType};
use crate::persist::{Cell, TableRow};

/// A panel row with threshold, real-dollar and savings columns for one scenario
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedLoanPeriod {
    pub loan: LoanPeriod,
    pub scenario: String,
    pub cpi: Option<f64>,
    pub inflation_annualized: Option<f64>,
    pub transaction_cost: Option<f64>,
    pub adl_threshold: Option<f64>,
    pub should_refi: Option<bool>,
    pub adl_gap: Option<f64>,
    pub adl_gap_bin: Option<u32>,

    pub rate_mortgage30us_adj: Option<f64>,
    pub rate_gap_adj: Option<f64>,
    pub rate_gap_adj_bin: Option<u32>,
    pub adl_gap_adj: Option<f64>,
    pub adl_gap_adj_bin: Option<u32>,
    pub rate_orig_adj: Option<f64>,
    pub rate_curr_adj: Option<f64>,
    pub upb_orig_adj: Option<f64>,
    pub upb_curr_adj: Option<f64>,

    pub npv_never_refi: Option<f64>,
    pub npv_optimal_refi: Option<f64>,
    pub npv_realized_refi: Option<f64>,
    pub savings_optimal_refi: Option<f64>,
    pub savings_realized_refi: Option<f64>,
    pub savings_loss: Option<f64>,
    pub savings_optimal_refi_adj: Option<f64>,
    pub savings_realized_refi_adj: Option<f64>,
    pub savings_loss_adj: Option<f64>,
    pub period_refi_optimal: Option<u32>,
    pub refi_delay: u32,
}

const PROCESSED_COLUMNS: [&str; 30] = [
    "scenario",
    "cpi",
    "inflation_annualized",
    "transaction_cost",
    "adl_threshold",
    "should_refi",
    "adl_gap",
    "adl_gap_bin",
    "rate_mortgage30us_adj",
    "rate_gap_adj",
    "rate_gap_adj_bin",
    "adl_gap_adj",
    "adl_gap_adj_bin",
    "rate_orig_adj",
    "rate_curr_adj",
    "upb_orig_adj",
    "upb_curr_adj",
    "npv_never_refi",
    "npv_optimal_refi",
    "npv_realized_refi",
    "savings_optimal_refi",
    "savings_realized_refi",
    "savings_loss",
    "savings_optimal_refi_adj",
    "savings_realized_refi_adj",
    "savings_loss_adj",
    "period_refi_optimal",
    "refi_delay",
    "mask_full",
    "mask_refi_eligible",
];

impl TableRow for ProcessedLoanPeriod {
    fn columns() -> Vec<&'static str> {
        let mut columns = LoanPeriod::columns();
        columns.extend(PROCESSED_COLUMNS);
        columns
    }

    fn cells(&self) -> Vec<Cell> {
        let mut cells = self.loan.cells();
        cells.extend([
            self.scenario.as_str().into(),
            self.cpi.into(),
            self.inflation_annualized.into(),
            self.transaction_cost.into(),
            self.adl_threshold.into(),
            self.should_refi.into(),
            self.adl_gap.into(),
            self.adl_gap_bin.into(),
            self.rate_mortgage30us_adj.into(),
            self.rate_gap_adj.into(),
            self.rate_gap_adj_bin.into(),
            self.adl_gap_adj.into(),
            self.adl_gap_adj_bin.into(),
            self.rate_orig_adj.into(),
            self.rate_curr_adj.into(),
            self.upb_orig_adj.into(),
            self.upb_curr_adj.into(),
            self.npv_never_refi.into(),
            self.npv_optimal_refi.into(),
            self.npv_realized_refi.into(),
            self.savings_optimal_refi.into(),
            self.savings_realized_refi.into(),
            self.savings_loss.into(),
            self.savings_optimal_refi_adj.into(),
            self.savings_realized_refi_adj.into(),
            self.savings_loss_adj.into(),
            self.period_refi_optimal.into(),
            self.refi_delay.into(),
            SampleMask::Full.matches(&self.loan).into(),
            SampleMask::RefiEligible.matches(&self.loan).into(),
        ]);
        cells
    }
}

/// Analysis samples persisted for every scenario
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SampleMask {
    /// Prepaid fixed-rate loans observed before their exit
    Full,
    /// The full sample restricted to borrowers who could refinance
    RefiEligible,
}

impl SampleMask {
    pub const ALL: [SampleMask; 2] = [SampleMask::Full, SampleMask::RefiEligible];

    pub fn matches(&self, row: &LoanPeriod) -> bool {
        let full = row.exit_code == Some(ExitCode::Prepaid)
            && row.mortgage_type == Some(MortgageType::Fixed)
            && row.time_to_exit.is_some_and(|t| t >= 1)
            && row.time_from_orig.is_some_and(|t| t >= 0);
        match self {
            SampleMask::Full => full,
            SampleMask::RefiEligible => {
                full && row.credit_score_orig.is_some_and(|s| s > 680)
                    && row.ltv.is_some_and(|l| l < 90.0)
                    && row.dlq_status == Some(0)
            }
        }
    }

    /// File-name suffix
    pub fn name(&self) -> &'static str {
        match self {
            SampleMask::Full => "full",
            SampleMask::RefiEligible => "refi_eligible",
        }
    }

    /// Row label in the savings table
    pub fn label(&self) -> &'static str {
        match self {
            SampleMask::Full => "Full",
            SampleMask::RefiEligible => "Refi Eligible",
        }
    }
}

/// Replace zero or blank balances in the first `window` rows of each loan
/// with the scheduled balance at that age.
///
/// Rows must be grouped by loan in period order. Returns the number of
/// imputed rows.
pub fn impute_upb(rows: &mut [LoanPeriod], window: usize) -> usize {
    let mut imputed = 0;
    for loan in rows.chunk_by_mut(|a, b| a.loan_id == b.loan_id) {
        for row in loan.iter_mut().take(window) {
            if row.upb_curr.is_some_and(|b| b != 0.0) {
                continue;
            }
            let scheduled = (|| {
                let age = row.loan_age.or(row.time_from_orig)?;
                Some(Annuity::scheduled_balance(row.upb_orig?, row.rate_orig? / 1200.0, row.term?, age))
            })();
            if let Some(balance) = scheduled {
                row.upb_curr = Some(balance);
                imputed += 1;
            }
        }
    }
    imputed
}

/// The columns of a persisted processed table that summaries read back
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SavingsRecord {
    pub loan_id: String,
    pub period: u32,
    pub savings_optimal_refi_adj: Option<f64>,
    pub savings_realized_refi_adj: Option<f64>,
    pub savings_loss_adj: Option<f64>,
    pub refi_delay: u32,
}
