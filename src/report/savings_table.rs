//! Mean loan-level savings per scenario and sample, as a tab-separated
//! autofill table

use std::collections::HashSet;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use crate::config::{PipelineConfig, ScenarioParameters};
use crate::error::{PipelineError, Result};
use crate::persist::read_rows;
use crate::refi::{SampleMask, SavingsRecord};

/// Tag on the first line of the table file
pub const SAVINGS_TABLE_TAG: &str = "<tab:table_savings>";

/// One scenario and sample of the savings table
#[derive(Debug, Clone, PartialEq)]
pub struct SavingsTableRow {
    pub scenario: String,
    pub sample: SampleMask,
    pub params: ScenarioParameters,
    pub mean_savings_optimal_refi: Option<f64>,
    pub mean_savings_realized_refi: Option<f64>,
    pub mean_savings_loss: Option<f64>,
    pub mean_refi_delay: Option<f64>,
}

fn mean(values: impl Iterator<Item = Option<f64>>) -> Option<f64> {
    let (sum, n) = values.flatten().fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    (n > 0).then(|| sum / n as f64)
}

impl SavingsTableRow {
    /// Averages over loans; savings repeat on every row of a loan, so only
    /// its first row counts
    pub fn from_records(scenario: &str, sample: SampleMask, params: ScenarioParameters, records: &[SavingsRecord]) -> Self {
        let mut seen = HashSet::new();
        let loans: Vec<&SavingsRecord> = records.iter().filter(|r| seen.insert(r.loan_id.as_str())).collect();
        Self {
            scenario: scenario.to_string(),
            sample,
            params,
            mean_savings_optimal_refi: mean(loans.iter().map(|r| r.savings_optimal_refi_adj)),
            mean_savings_realized_refi: mean(loans.iter().map(|r| r.savings_realized_refi_adj)),
            mean_savings_loss: mean(loans.iter().map(|r| r.savings_loss_adj)),
            mean_refi_delay: mean(loans.iter().map(|r| Some(r.refi_delay as f64))),
        }
    }

    fn render(&self) -> String {
        let na = |v: Option<f64>| v.map_or_else(|| "NA".to_string(), |v| v.to_string());
        [
            self.scenario.clone(),
            self.sample.label().to_string(),
            self.params.annual_discount_rate.to_string(),
            self.params.prob_move.to_string(),
            self.params.marginal_tax_rate.to_string(),
            na(self.mean_savings_optimal_refi),
            na(self.mean_savings_realized_refi),
            na(self.mean_savings_loss),
            na(self.mean_refi_delay),
        ]
        .join("\t")
    }
}

/// Read every scenario's processed samples from `input_dir`
pub fn build_savings_table(config: &PipelineConfig, input_dir: &Path) -> Result<Vec<SavingsTableRow>> {
    let mut rows = Vec::with_capacity(config.scenarios.len() * SampleMask::ALL.len());
    for (name, params) in &config.scenarios {
        for mask in SampleMask::ALL {
            let path = input_dir.join(format!("processed_{}_{}.csv", name, mask.name()));
            let records: Vec<SavingsRecord> = read_rows(&path)?;
            log::debug!("{}: {} rows", path.display(), records.len());
            rows.push(SavingsTableRow::from_records(name, mask, *params, &records));
        }
    }
    Ok(rows)
}

pub fn render_savings_table(rows: &[SavingsTableRow]) -> String {
    let mut text = String::new();
    let _ = writeln!(text, "{}", SAVINGS_TABLE_TAG);
    for row in rows {
        let _ = writeln!(text, "{}", row.render());
    }
    text
}

pub fn write_savings_table(rows: &[SavingsTableRow], out_file: &Path) -> Result<()> {
    if let Some(parent) = out_file.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| PipelineError::io(parent, e))?;
    }
    fs::write(out_file, render_savings_table(rows)).map_err(|e| PipelineError::io(out_file, e))?;
    log::info!("Savings table with {} rows written to {}", rows.len(), out_file.display());
    Ok(())
}
