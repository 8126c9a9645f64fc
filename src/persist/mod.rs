//! Persistence gate: every stage boundary writes through [`save_table`]

mod save;
mod stats;
mod table;

pub use save::{check_keys, read_rows, save_table, SaveOptions, SaveReport};
pub use stats::{format_number, median, sample_std, summarize, ColumnSummary};
pub use table::{Cell, Table, TableRow};
