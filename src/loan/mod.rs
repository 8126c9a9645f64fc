//! Loan records: the raw quarterly layout and the loan-period panel row

mod data;
mod geography;
pub mod raw;

pub use data::{ExitCode, LoanPeriod, MortgageType, EXIT_HORIZONS};
pub use geography::GeographyCrosswalk;
pub use raw::{load_raw_records, load_raw_records_from_reader, RawLoanRecord};

#[cfg(test)]
pub(crate) use data::fixtures;
