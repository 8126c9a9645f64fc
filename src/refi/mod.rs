//! Refinance-threshold engine and NPV comparator
//!
//! Threshold inputs are evaluated row by row; the NPV comparison needs each
//! loan's whole path and runs over period-ordered loan groups.

mod annuity;
mod processed;
mod savings;
mod threshold;

pub use annuity::Annuity;
pub use processed::{impute_upb, ProcessedLoanPeriod, SampleMask, SavingsRecord};
pub use savings::{longest_run, LoanSavings, NpvComparator};
pub use threshold::{adl_gap, adl_threshold, should_refi, RateVolatility, ThresholdInputs};

#[cfg(test)]
pub(crate) mod fixtures {
    pub use super::savings::fixtures::refi_loan;
    pub use super::threshold::fixtures::market_history;
}
