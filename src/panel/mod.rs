//! Loan-panel constructor
//!
//! Raw quarterly records become one row per `(loan_id, period)` with
//! periods, geography, market rates, filled exit outcomes, exit horizons and
//! binned rate gaps.

mod bins;
mod builder;
mod clean;
mod fill;
mod sample;

pub use bins::RateGapBins;
pub use builder::{ensure_unique_keys, load_panel, PanelBuilder, PANEL_KEYS};
pub use clean::CleanRecord;
pub use fill::fill_within_groups;
pub use sample::LoanSampler;
