//! Pipeline configuration
//!
//! Loaded once from JSON at startup, validated, and passed by reference to
//! every stage. Parameter scenarios for the refinance model are named
//! entries of `scenarios`.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::calendar::PeriodGranularity;
use crate::error::{PipelineError, Result};

/// Default path of the configuration file
pub const DEFAULT_CONFIG_PATH: &str = "config/pipeline.json";

/// One parameterisation of the ADL refinance model
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScenarioParameters {
    /// Annual discount rate (e.g. 0.05)
    pub annual_discount_rate: f64,
    /// Annual probability of moving
    pub prob_move: f64,
    /// Marginal tax rate
    pub marginal_tax_rate: f64,
    /// Expected inflation; `None` uses realised CPI inflation of each row
    #[serde(default)]
    pub expected_inflation: Option<f64>,
}

impl ScenarioParameters {
    pub fn monthly_discount_rate(&self) -> f64 {
        self.annual_discount_rate / 12.0
    }
}

impl Default for ScenarioParameters {
    fn default() -> Self {
        Self {
            annual_discount_rate: 0.05,
            prob_move: 0.1,
            marginal_tax_rate: 0.28,
            expected_inflation: None,
        }
    }
}

/// Refinancing cost: a share of the balance plus a fixed dollar amount
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransactionCost {
    pub balance_share: f64,
    pub fixed: f64,
}

impl TransactionCost {
    pub fn amount(&self, balance: f64) -> f64 {
        self.balance_share * balance + self.fixed
    }
}

impl Default for TransactionCost {
    fn default() -> Self {
        Self {
            balance_share: 0.01,
            fixed: 2000.0,
        }
    }
}

/// Fixed-width binning range for rate gaps (percentage points)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BinSpec {
    pub min: f64,
    pub max: f64,
    pub width: f64,
}

impl Default for BinSpec {
    fn default() -> Self {
        Self {
            min: -4.0,
            max: 4.0,
            width: 0.2,
        }
    }
}

fn default_crosswalk_start() -> NaiveDate {
    NaiveDate::from_ymd_opt(2000, 1, 1).unwrap_or_default()
}

fn default_crosswalk_end() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 1, 1).unwrap_or_default()
}

fn default_cpi_base_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 1, 1).unwrap_or_default()
}

fn default_seed() -> u64 {
    123
}

fn default_sample_fraction() -> f64 {
    0.01
}

fn default_sample_term() -> u32 {
    360
}

fn default_imputation_window() -> usize {
    6
}

/// Full pipeline configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// First acquisition date to process
    pub sample_start: NaiveDate,
    /// Last acquisition date to process
    pub sample_end: NaiveDate,

    #[serde(default = "default_crosswalk_start")]
    pub crosswalk_start: NaiveDate,
    #[serde(default = "default_crosswalk_end")]
    pub crosswalk_end: NaiveDate,
    #[serde(default)]
    pub period: PeriodGranularity,

    #[serde(default = "default_seed")]
    pub seed: u64,
    /// Share of loans drawn per origination period
    #[serde(default = "default_sample_fraction")]
    pub sample_fraction: f64,
    #[serde(default = "default_sample_term")]
    pub sample_term: u32,

    /// Month whose CPI anchors real-dollar conversions
    #[serde(default = "default_cpi_base_date")]
    pub cpi_base_date: NaiveDate,
    #[serde(default)]
    pub rate_gap_bins: BinSpec,
    #[serde(default)]
    pub transaction_cost: TransactionCost,
    /// Leading rows per loan whose zero balance is replaced by the scheduled one
    #[serde(default = "default_imputation_window")]
    pub imputation_window: usize,

    pub scenarios: BTreeMap<String, ScenarioParameters>,
}

impl PipelineConfig {
    /// Parse and validate a JSON configuration
    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate the configuration file at `path`
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| PipelineError::io(path, e))?;
        let config = Self::from_json(&text)?;
        log::info!(
            "Loaded configuration from {} ({} scenarios)",
            path.display(),
            config.scenarios.len()
        );
        Ok(config)
    }

    /// Reject configurations no stage can run with
    pub fn validate(&self) -> Result<()> {
        let fail = |msg: String| Err(PipelineError::Config(msg));

        if self.sample_start > self.sample_end {
            return fail(format!(
                "sample range is empty: {} is after {}",
                self.sample_start, self.sample_end
            ));
        }
        if self.crosswalk_start > self.crosswalk_end {
            return fail(format!(
                "crosswalk range is empty: {} is after {}",
                self.crosswalk_start, self.crosswalk_end
            ));
        }
        if !(self.sample_fraction > 0.0 && self.sample_fraction <= 1.0) {
            return fail(format!("sample_fraction must be in (0, 1], got {}", self.sample_fraction));
        }
        if self.sample_term == 0 {
            return fail("sample_term must be positive".to_string());
        }

        let bins = &self.rate_gap_bins;
        if !(bins.width > 0.0) || !(bins.min < bins.max) {
            return fail(format!(
                "rate_gap_bins needs min < max and a positive width, got {:?}",
                bins
            ));
        }
        if self.transaction_cost.balance_share < 0.0 || self.transaction_cost.fixed < 0.0 {
            return fail("transaction costs cannot be negative".to_string());
        }

        if self.scenarios.is_empty() {
            return fail("at least one parameter scenario is required".to_string());
        }
        for (name, params) in &self.scenarios {
            if params.marginal_tax_rate >= 1.0 {
                return fail(format!("scenario '{}': marginal_tax_rate must be below 1", name));
            }
            if params.prob_move < 0.0 {
                return fail(format!("scenario '{}': prob_move cannot be negative", name));
            }
            if !params.annual_discount_rate.is_finite() || params.annual_discount_rate <= -1.0 {
                return fail(format!("scenario '{}': invalid annual_discount_rate", name));
            }
        }
        Ok(())
    }

    pub fn scenario(&self, name: &str) -> Result<&ScenarioParameters> {
        self.scenarios
            .get(name)
            .ok_or_else(|| PipelineError::Config(format!("unknown scenario '{}'", name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"{
        "sample_start": "2000-01-01",
        "sample_end": "2000-12-31",
        "scenarios": {
            "high": {"annual_discount_rate": 0.05, "prob_move": 0.1, "marginal_tax_rate": 0.28},
            "low": {"annual_discount_rate": 0.03, "prob_move": 0.05, "marginal_tax_rate": 0.2, "expected_inflation": 0.02}
        }
    }"#;

    #[test]
    fn test_defaults_fill_in() {
        let config = PipelineConfig::from_json(MINIMAL).unwrap();
        assert_eq!(config.period, PeriodGranularity::MONTHLY);
        assert_eq!(config.seed, 123);
        assert_eq!(config.sample_term, 360);
        assert_eq!(config.rate_gap_bins, BinSpec::default());
        assert_eq!(config.transaction_cost.amount(100_000.0), 3000.0);
        assert_eq!(config.scenarios.keys().collect::<Vec<_>>(), vec!["high", "low"]);
        assert_eq!(config.scenario("low").unwrap().expected_inflation, Some(0.02));
        assert!(config.scenario("high").unwrap().expected_inflation.is_none());
        assert!(config.scenario("medium").is_err());
    }

    #[test]
    fn test_missing_scenarios_is_fatal() {
        let text = r#"{"sample_start": "2000-01-01", "sample_end": "2000-12-31", "scenarios": {}}"#;
        assert!(matches!(PipelineConfig::from_json(text), Err(PipelineError::Config(_))));

        let text = r#"{"sample_start": "2000-01-01", "sample_end": "2000-12-31"}"#;
        assert!(matches!(PipelineConfig::from_json(text), Err(PipelineError::Json(_))));
    }

    #[test]
    fn test_inverted_range_is_fatal() {
        let text = MINIMAL.replace("2000-12-31", "1999-12-31");
        assert!(matches!(PipelineConfig::from_json(&text), Err(PipelineError::Config(_))));
    }

    #[test]
    fn test_bad_bins_are_fatal() {
        let mut config = PipelineConfig::from_json(MINIMAL).unwrap();
        config.rate_gap_bins.width = 0.0;
        assert!(config.validate().is_err());
    }
}
