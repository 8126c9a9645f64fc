//! Seeded loan sample stratified by origination period

use rand::seq::index;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use std::collections::{BTreeMap, BTreeSet, HashSet};

use crate::config::PipelineConfig;
use crate::loan::{LoanPeriod, MortgageType};

/// Draws whole loans: every row of a sampled loan is kept
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoanSampler {
    pub seed: u64,
    pub fraction: f64,
    pub term: u32,
}

impl LoanSampler {
    pub fn new(seed: u64, fraction: f64, term: u32) -> Self {
        Self { seed, fraction, term }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.seed, config.sample_fraction, config.sample_term)
    }

    fn eligible(&self, row: &LoanPeriod) -> bool {
        row.mortgage_type == Some(MortgageType::Fixed) && row.term == Some(self.term)
    }

    /// Loan ids drawn from each origination period.
    ///
    /// Ids are sorted and periods visited in order so a seed always yields
    /// the same sample.
    pub fn sample_ids(&self, rows: &[LoanPeriod]) -> HashSet<String> {
        let mut by_origination: BTreeMap<Option<u32>, BTreeSet<&str>> = BTreeMap::new();
        for row in rows.iter().filter(|r| self.eligible(r)) {
            by_origination.entry(row.period_orig).or_default().insert(row.loan_id.as_str());
        }

        let mut rng = ChaCha20Rng::seed_from_u64(self.seed);
        let mut sampled = HashSet::new();
        for ids in by_origination.values() {
            let ids: Vec<&str> = ids.iter().copied().collect();
            let amount = ((self.fraction * ids.len() as f64).round() as usize).min(ids.len());
            for i in index::sample(&mut rng, ids.len(), amount) {
                sampled.insert(ids[i].to_string());
            }
        }
        sampled
    }

    /// Keep every row of the sampled loans
    pub fn draw(&self, rows: Vec<LoanPeriod>) -> Vec<LoanPeriod> {
        let ids = self.sample_ids(&rows);
        let n_rows = rows.len();
        let sample: Vec<LoanPeriod> = rows
            .into_iter()
            .filter(|r| self.eligible(r) && ids.contains(&r.loan_id))
            .collect();
        log::info!(
            "Sampled {} loans ({} of {} rows) with seed {}",
            ids.len(),
            sample.len(),
            n_rows,
            self.seed
        );
        sample
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loan::fixtures::loan_period;

    fn panel() -> Vec<LoanPeriod> {
        let mut rows = Vec::new();
        for id in 0..200 {
            for period in 1..=3 {
                let mut row = loan_period(&format!("L{:03}", id), period);
                row.term = Some(if id % 10 == 0 { 180 } else { 360 });
                row.period_orig = Some(id % 2);
                rows.push(row);
            }
        }
        rows
    }

    #[test]
    fn test_sample_is_deterministic() {
        let sampler = LoanSampler::new(123, 0.1, 360);
        assert_eq!(sampler.sample_ids(&panel()), sampler.sample_ids(&panel()));
        assert_ne!(sampler.sample_ids(&panel()), LoanSampler::new(7, 0.1, 360).sample_ids(&panel()));
    }

    #[test]
    fn test_draw_keeps_whole_loans_per_stratum() {
        let sampler = LoanSampler::new(123, 0.1, 360);
        let sample = sampler.draw(panel());

        // 80 eligible loans originated in period 0 and 100 in period 1
        let ids: BTreeSet<&str> = sample.iter().map(|r| r.loan_id.as_str()).collect();
        assert_eq!(ids.len(), 18);
        assert_eq!(sample.len(), 54);
        assert!(sample.iter().all(|r| r.term == Some(360)));
        assert_eq!(sample.iter().filter(|r| r.period_orig == Some(0)).count(), 24);
        assert_eq!(sample.iter().filter(|r| r.period_orig == Some(1)).count(), 30);
    }

    #[test]
    fn test_adjustable_loans_are_excluded() {
        let mut rows = panel();
        for row in &mut rows {
            row.mortgage_type = Some(MortgageType::Adjustable);
        }
        assert!(LoanSampler::new(1, 1.0, 360).draw(rows).is_empty());
    }
}
