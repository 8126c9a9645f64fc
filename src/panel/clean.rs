//! Step one of the panel: rename raw fields and parse their dates

use chrono::NaiveDate;

use crate::calendar::{parse_date, DatePattern, Quarter};
use crate::loan::{ExitCode, MortgageType, RawLoanRecord};

/// A raw record with semantic names and parsed dates
#[derive(Debug, Clone, PartialEq)]
pub struct CleanRecord {
    pub loan_id: String,
    pub date: Option<NaiveDate>,
    pub date_acq: NaiveDate,
    pub date_orig: Option<NaiveDate>,
    pub date_maturity: Option<NaiveDate>,
    pub date_exit: Option<NaiveDate>,
    pub rate_orig: Option<f64>,
    pub rate_curr: Option<f64>,
    pub upb_orig: Option<f64>,
    pub upb_curr: Option<f64>,
    pub term: Option<u32>,
    pub loan_age: Option<i32>,
    pub months_remaining: Option<i32>,
    pub ltv: Option<f64>,
    pub dti: Option<f64>,
    pub num_borrowers: Option<u32>,
    pub credit_score_orig: Option<u32>,
    pub credit_score_curr: Option<u32>,
    pub first_home_buyer: Option<String>,
    pub purpose: Option<String>,
    pub dlq_status: Option<u32>,
    pub state: Option<String>,
    pub msa: Option<String>,
    pub zip: Option<String>,
    pub mortgage_type: Option<MortgageType>,
    pub exit_code: Option<ExitCode>,
}

fn non_empty(text: String) -> Option<String> {
    (!text.is_empty()).then_some(text)
}

fn mmyyyy(text: &str) -> Option<NaiveDate> {
    parse_date(text, Some(DatePattern::MonthYearCompact))
}

impl CleanRecord {
    pub fn from_raw(raw: RawLoanRecord, quarter: Quarter) -> Self {
        let date_exit = mmyyyy(&raw.zb_dte);
        let date_maturity = mmyyyy(&raw.matr_dt);
        let exit_code = ExitCode::from_zero_balance_code(&raw.zero_bal_code)
            .map(|code| code.recode_at_maturity(date_exit, date_maturity));

        Self {
            date: mmyyyy(&raw.act_period),
            date_acq: quarter.acquisition_date(),
            date_orig: mmyyyy(&raw.orig_date),
            date_maturity,
            date_exit,
            rate_orig: raw.orig_rate,
            rate_curr: raw.curr_rate,
            upb_orig: raw.orig_upb,
            upb_curr: raw.current_upb,
            term: raw.orig_term,
            loan_age: raw.loan_age,
            months_remaining: raw.adj_rem_months,
            ltv: raw.oltv,
            dti: raw.dti,
            num_borrowers: raw.num_bo,
            credit_score_orig: raw.cscore_b,
            credit_score_curr: raw.curr_scoreb,
            // "XX" marks an unknown delinquency status
            dlq_status: raw.dlq_status.parse().ok(),
            mortgage_type: MortgageType::from_product(&raw.product),
            exit_code,
            first_home_buyer: non_empty(raw.first_flag),
            purpose: non_empty(raw.purpose),
            state: non_empty(raw.state),
            msa: non_empty(raw.msa),
            zip: non_empty(raw.zip),
            loan_id: raw.loan_id,
        }
    }
}
