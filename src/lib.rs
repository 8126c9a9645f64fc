//! Mortgage refinance research pipeline
//!
//! This library provides:
//! - Date normalisation and the date -> period crosswalk
//! - Monthly macro series (30-year mortgage rate, CPI) and real-dollar conversion
//! - A loan-level panel built from quarterly single-family performance files
//! - The Agarwal-Driscoll-Laibson refinance threshold and an NPV comparison
//!   of never, optimal and realised refinancing, run per parameter scenario
//! - A validating persistence gate in front of every written table
//! - Summary statistics and the savings table

pub mod calendar;
pub mod config;
pub mod error;
pub mod loan;
pub mod macro_series;
pub mod panel;
pub mod persist;
pub mod refi;
pub mod report;
pub mod scenario;

// Re-export commonly used types
pub use calendar::{PeriodCrosswalk, PeriodGranularity, Quarter};
pub use config::{PipelineConfig, ScenarioParameters, TransactionCost};
pub use error::{PipelineError, Result};
pub use loan::{ExitCode, LoanPeriod, MortgageType};
pub use macro_series::{CpiBase, MonthlySeries, PeriodSeries};
pub use panel::{LoanSampler, PanelBuilder, RateGapBins};
pub use persist::{save_table, SaveOptions, SaveReport, Table, TableRow};
pub use refi::{NpvComparator, ProcessedLoanPeriod, RateVolatility, SampleMask};
pub use scenario::ScenarioRunner;
