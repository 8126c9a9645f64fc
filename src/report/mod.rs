//! Reporting layer: loan-level summary statistics and the savings table

mod savings_table;
mod summary;

pub use savings_table::{
    build_savings_table, render_savings_table, write_savings_table, SavingsTableRow, SAVINGS_TABLE_TAG,
};
pub use summary::{load_summary_records, LoanSummaryRecord, SummaryTables};
