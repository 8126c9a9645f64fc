//! Loan-period data structures: the unit of observation of the panel

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::persist::{Cell, TableRow};

/// Terminal disposition of a loan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitCode {
    Prepaid,
    Matured,
    ShortSale,
    ThirdPartySale,
    Repurchased,
    DeedInLieu,
    NonPerformingNoteSale,
    ReperformingNoteSale,
    Removal,
    Delinquency,
    Other,
}

impl ExitCode {
    /// Decode a zero-balance code; unknown or blank codes have no exit
    pub fn from_zero_balance_code(code: &str) -> Option<Self> {
        match code.trim() {
            "01" | "1" => Some(ExitCode::Prepaid),
            "02" | "2" => Some(ExitCode::ThirdPartySale),
            "03" | "3" => Some(ExitCode::ShortSale),
            "06" | "6" => Some(ExitCode::Repurchased),
            "09" | "9" => Some(ExitCode::DeedInLieu),
            "15" => Some(ExitCode::NonPerformingNoteSale),
            "16" => Some(ExitCode::ReperformingNoteSale),
            "96" => Some(ExitCode::Removal),
            "97" => Some(ExitCode::Delinquency),
            "98" => Some(ExitCode::Other),
            _ => None,
        }
    }

    /// A prepayment dated on the maturity date is a matured loan
    pub fn recode_at_maturity(self, date_exit: Option<NaiveDate>, date_maturity: Option<NaiveDate>) -> Self {
        match (self, date_exit, date_maturity) {
            (ExitCode::Prepaid, Some(exit), Some(maturity)) if exit == maturity => ExitCode::Matured,
            (code, _, _) => code,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ExitCode::Prepaid => "prepaid",
            ExitCode::Matured => "matured",
            ExitCode::ShortSale => "short_sale",
            ExitCode::ThirdPartySale => "third_party_sale",
            ExitCode::Repurchased => "repurchased",
            ExitCode::DeedInLieu => "deed_in_lieu",
            ExitCode::NonPerformingNoteSale => "non_performing_note_sale",
            ExitCode::ReperformingNoteSale => "reperforming_note_sale",
            ExitCode::Removal => "removal",
            ExitCode::Delinquency => "delinquency",
            ExitCode::Other => "other",
        }
    }
}

impl fmt::Display for ExitCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Amortisation type of the loan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MortgageType {
    Fixed,
    Adjustable,
}

impl MortgageType {
    /// `FRM` or `ARM` product codes
    pub fn from_product(code: &str) -> Option<Self> {
        match code.trim().to_uppercase().as_str() {
            "FRM" => Some(MortgageType::Fixed),
            "ARM" => Some(MortgageType::Adjustable),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MortgageType::Fixed => "fixed",
            MortgageType::Adjustable => "adjustable",
        }
    }
}

/// Exit horizons, in periods, carried as `exit_t{h}` indicators
pub const EXIT_HORIZONS: [i32; 5] = [1, 3, 6, 12, 24];

/// One loan in one period
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanPeriod {
    pub loan_id: String,
    pub period: u32,
    /// Activity month
    pub date: NaiveDate,
    /// Acquisition date of the loan's quarterly file
    pub date_acq: NaiveDate,
    pub date_orig: Option<NaiveDate>,
    pub period_orig: Option<u32>,

    /// Note rates in percentage points
    pub rate_orig: Option<f64>,
    pub rate_curr: Option<f64>,
    pub upb_orig: Option<f64>,
    pub upb_curr: Option<f64>,
    /// Original term in months
    pub term: Option<u32>,
    pub loan_age: Option<i32>,
    /// Months remaining to maturity
    pub time_to_maturity: Option<i32>,

    pub ltv: Option<f64>,
    pub dti: Option<f64>,
    pub num_borrowers: Option<u32>,
    pub credit_score_orig: Option<u32>,
    pub credit_score_curr: Option<u32>,
    pub first_home_buyer: Option<String>,
    pub purpose: Option<String>,
    /// Months delinquent; `None` when the servicer reports it as unknown
    pub dlq_status: Option<u32>,

    pub state: Option<String>,
    pub fips: Option<u32>,
    pub msa: Option<String>,
    pub zip: Option<String>,
    pub mortgage_type: Option<MortgageType>,

    pub exit_code: Option<ExitCode>,
    pub date_exit: Option<NaiveDate>,
    pub period_exit: Option<u32>,
    pub time_to_exit: Option<i32>,
    pub time_from_orig: Option<i32>,
    pub exit_t1: u8,
    pub exit_t3: u8,
    pub exit_t6: u8,
    pub exit_t12: u8,
    pub exit_t24: u8,

    /// Market 30-year rate in the current and origination periods
    pub rate_mortgage30us: Option<f64>,
    pub rate_mortgage30us_orig: Option<f64>,
    pub rate_spread_orig: Option<f64>,
    pub rate_gap: Option<f64>,
    pub rate_gap_bin: Option<u32>,
}

impl LoanPeriod {
    /// Note rate used for gaps: the current rate when reported
    pub fn note_rate(&self) -> Option<f64> {
        self.rate_curr.or(self.rate_orig)
    }

    /// Remaining months, falling back to term minus age
    pub fn remaining_term(&self) -> Option<i32> {
        self.time_to_maturity
            .or_else(|| Some(self.term? as i32 - self.loan_age?))
    }

    /// Set every `exit_t{h}` indicator from `time_to_exit`
    pub fn set_exit_indicators(&mut self) {
        let flag = |h: i32| -> u8 {
            match self.time_to_exit {
                Some(t) if h == 1 => (t == 1) as u8,
                Some(t) => (t <= h) as u8,
                None => 0,
            }
        };
        let [t1, t3, t6, t12, t24] = EXIT_HORIZONS.map(flag);
        self.exit_t1 = t1;
        self.exit_t3 = t3;
        self.exit_t6 = t6;
        self.exit_t12 = t12;
        self.exit_t24 = t24;
    }
}

impl TableRow for LoanPeriod {
    fn columns() -> Vec<&'static str> {
        vec![
            "loan_id", "period", "date", "date_acq", "date_orig", "period_orig",
            "rate_orig", "rate_curr", "upb_orig", "upb_curr", "term", "loan_age",
            "time_to_maturity", "ltv", "dti", "num_borrowers", "credit_score_orig",
            "credit_score_curr", "first_home_buyer", "purpose", "dlq_status", "state",
            "fips", "msa", "zip", "mortgage_type", "exit_code", "date_exit", "period_exit",
            "time_to_exit", "time_from_orig", "exit_t1", "exit_t3", "exit_t6", "exit_t12",
            "exit_t24", "rate_mortgage30us", "rate_mortgage30us_orig", "rate_spread_orig",
            "rate_gap", "rate_gap_bin",
        ]
    }

    fn cells(&self) -> Vec<Cell> {
        vec![
            self.loan_id.as_str().into(),
            self.period.into(),
            self.date.into(),
            self.date_acq.into(),
            self.date_orig.into(),
            self.period_orig.into(),
            self.rate_orig.into(),
            self.rate_curr.into(),
            self.upb_orig.into(),
            self.upb_curr.into(),
            self.term.into(),
            self.loan_age.into(),
            self.time_to_maturity.into(),
            self.ltv.into(),
            self.dti.into(),
            self.num_borrowers.into(),
            self.credit_score_orig.into(),
            self.credit_score_curr.into(),
            self.first_home_buyer.clone().into(),
            self.purpose.clone().into(),
            self.dlq_status.into(),
            self.state.clone().into(),
            self.fips.into(),
            self.msa.clone().into(),
            self.zip.clone().into(),
            self.mortgage_type.map(|m| m.as_str()).into(),
            self.exit_code.map(|c| c.as_str()).into(),
            self.date_exit.into(),
            self.period_exit.into(),
            self.time_to_exit.into(),
            self.time_from_orig.into(),
            self.exit_t1.into(),
            self.exit_t3.into(),
            self.exit_t6.into(),
            self.exit_t12.into(),
            self.exit_t24.into(),
            self.rate_mortgage30us.into(),
            self.rate_mortgage30us_orig.into(),
            self.rate_spread_orig.into(),
            self.rate_gap.into(),
            self.rate_gap_bin.into(),
        ]
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    /// A fixed-rate loan row with everything but the keys blank
    pub fn loan_period(loan_id: &str, period: u32) -> LoanPeriod {
        let date = NaiveDate::from_ymd_opt(2000, 1, 1).unwrap();
        LoanPeriod {
            loan_id: loan_id.to_string(),
            period,
            date: crate::calendar::add_months(date, period as i32 - 1),
            date_acq: date,
            date_orig: None,
            period_orig: None,
            rate_orig: None,
            rate_curr: None,
            upb_orig: None,
            upb_curr: None,
            term: None,
            loan_age: None,
            time_to_maturity: None,
            ltv: None,
            dti: None,
            num_borrowers: None,
            credit_score_orig: None,
            credit_score_curr: None,
            first_home_buyer: None,
            purpose: None,
            dlq_status: None,
            state: None,
            fips: None,
            msa: None,
            zip: None,
            mortgage_type: Some(MortgageType::Fixed),
            exit_code: None,
            date_exit: None,
            period_exit: None,
            time_to_exit: None,
            time_from_orig: None,
            exit_t1: 0,
            exit_t3: 0,
            exit_t6: 0,
            exit_t12: 0,
            exit_t24: 0,
            rate_mortgage30us: None,
            rate_mortgage30us_orig: None,
            rate_spread_orig: None,
            rate_gap: None,
            rate_gap_bin: None,
        }
    }
}
