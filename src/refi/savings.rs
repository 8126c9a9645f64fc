//! NPV comparison of never, optimal and realised refinancing
//!
//! Works on one loan's full period-ordered path: the optimal date needs the
//! whole `should_refi` history and the realised date needs the loan's exit.

use super::annuity::Annuity;
use crate::config::{ScenarioParameters, TransactionCost};
use crate::loan::LoanPeriod;

/// Loan-level NPVs and savings, in nominal dollars
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LoanSavings {
    pub npv_never_refi: Option<f64>,
    pub npv_optimal_refi: Option<f64>,
    pub npv_realized_refi: Option<f64>,
    pub savings_optimal_refi: Option<f64>,
    pub savings_realized_refi: Option<f64>,
    pub savings_loss: Option<f64>,
    /// Earliest period at which the model says to refinance
    pub period_refi_optimal: Option<u32>,
    /// Longest run of consecutive periods with `should_refi`
    pub refi_delay: u32,
}

/// Discounts every payment stream at the scenario's monthly rate
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NpvComparator {
    monthly_discount: f64,
    cost: TransactionCost,
}

impl NpvComparator {
    pub fn new(params: &ScenarioParameters, cost: TransactionCost) -> Self {
        Self {
            monthly_discount: params.monthly_discount_rate(),
            cost,
        }
    }

    /// Compare the three paths for one loan.
    ///
    /// `rows` are the loan's rows in period order and `should_refi` holds the
    /// decision for each of them.
    pub fn compare(&self, rows: &[LoanPeriod], should_refi: &[Option<bool>]) -> LoanSavings {
        let period_refi_optimal = rows
            .iter()
            .zip(should_refi)
            .filter(|(_, decision)| **decision == Some(true))
            .map(|(row, _)| row.period)
            .min();
        let refi_delay = longest_run(should_refi);

        let Some(schedule) = rows.first().and_then(OriginalSchedule::of) else {
            return LoanSavings {
                period_refi_optimal,
                refi_delay,
                ..LoanSavings::default()
            };
        };
        let never = Annuity::present_value(schedule.payment, schedule.term as i32, self.monthly_discount);

        let optimal = match period_refi_optimal {
            None => Some(never),
            Some(period) => rows
                .iter()
                .find(|r| r.period == period)
                .and_then(|row| self.refinanced_npv(&schedule, row)),
        };

        let realized = match rows.first().and_then(|r| r.period_exit) {
            None => Some(never),
            Some(exit) => rows
                .iter()
                .filter(|r| r.period < exit)
                .max_by_key(|r| r.period)
                .and_then(|row| self.refinanced_npv(&schedule, row)),
        };

        let savings_optimal_refi = optimal.map(|o| never - o);
        let savings_realized_refi = realized.map(|r| never - r);
        LoanSavings {
            npv_never_refi: Some(never),
            npv_optimal_refi: optimal,
            npv_realized_refi: realized,
            savings_optimal_refi,
            savings_realized_refi,
            savings_loss: savings_optimal_refi.zip(savings_realized_refi).map(|(o, r)| o - r),
            period_refi_optimal,
            refi_delay,
        }
    }

    /// Original payments until `row`, a new loan for the remaining term
    /// from there, and the cost of refinancing at `row`
    fn refinanced_npv(&self, schedule: &OriginalSchedule, row: &LoanPeriod) -> Option<f64> {
        let remaining = row.remaining_term()?;
        if remaining <= 0 || remaining > schedule.term as i32 {
            return None;
        }
        let elapsed = schedule.term as i32 - remaining;
        let balance = row.upb_curr?;
        let market = row.rate_mortgage30us?;
        let new_payment = Annuity::level_payment(market / 1200.0, remaining as u32, balance)?;

        let d = self.monthly_discount;
        let to_refi = Annuity::discount_factor(d, elapsed);
        let npv = Annuity::present_value(schedule.payment, elapsed, d)
            + Annuity::present_value(new_payment, remaining, d) * to_refi
            + self.cost.amount(balance) * to_refi;
        npv.is_finite().then_some(npv)
    }
}

/// The loan's payment as originated
struct OriginalSchedule {
    payment: f64,
    term: u32,
}

impl OriginalSchedule {
    fn of(row: &LoanPeriod) -> Option<Self> {
        let term = row.term?;
        let payment = Annuity::level_payment(row.rate_orig? / 1200.0, term, row.upb_orig?)?;
        Some(Self { payment, term })
    }
}

/// Longest run of consecutive `Some(true)`
pub fn longest_run(decisions: &[Option<bool>]) -> u32 {
    let mut longest = 0;
    let mut current = 0;
    for decision in decisions {
        if *decision == Some(true) {
            current += 1;
            longest = longest.max(current);
        } else {
            current = 0;
        }
    }
    longest
}

#[cfg(test)]
pub(crate) mod fixtures {
    use crate::loan::fixtures::loan_period;
    use crate::loan::{ExitCode, LoanPeriod};
    use crate::refi::Annuity;

    /// 6% 30-year $300,000 loan over periods 1-36: the market sits at 4%
    /// for 24 periods then drops to 3%; the loan prepays in period 31
    pub fn refi_loan() -> Vec<LoanPeriod> {
        (1..=36)
            .map(|period| {
                let age = period as i32 - 1;
                let mut row = loan_period("REFI", period);
                row.rate_orig = Some(6.0);
                row.rate_curr = Some(6.0);
                row.upb_orig = Some(300_000.0);
                row.upb_curr = Some(Annuity::scheduled_balance(300_000.0, 0.005, 360, age));
                row.term = Some(360);
                row.loan_age = Some(age);
                row.time_to_maturity = Some(360 - age);
                row.period_orig = Some(1);
                row.time_from_orig = Some(age);
                let market = if period <= 24 { 4.0 } else { 3.0 };
                row.rate_mortgage30us = Some(market);
                row.rate_gap = Some(6.0 - market);
                row.exit_code = Some(ExitCode::Prepaid);
                row.period_exit = Some(31);
                row.time_to_exit = Some(31 - period as i32);
                row
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::refi_loan;
    use super::*;
    use approx::assert_relative_eq;

    fn comparator() -> NpvComparator {
        NpvComparator::new(&ScenarioParameters::default(), TransactionCost::default())
    }

    fn decisions(first_refi: u32, n: u32) -> Vec<Option<bool>> {
        (1..=n).map(|p| Some(p >= first_refi)).collect()
    }

    #[test]
    fn test_npv_paths() {
        let rows = refi_loan();
        let savings = comparator().compare(&rows, &decisions(25, 36));

        assert_relative_eq!(savings.npv_never_refi.unwrap(), 335055.7239788375, epsilon = 1e-4);
        assert_relative_eq!(savings.npv_optimal_refi.unwrap(), 255922.65487561625, epsilon = 1e-4);
        assert_relative_eq!(savings.npv_realized_refi.unwrap(), 258875.37061139967, epsilon = 1e-4);
        assert_relative_eq!(savings.savings_optimal_refi.unwrap(), 79133.06910322123, epsilon = 1e-4);
        assert_relative_eq!(savings.savings_realized_refi.unwrap(), 76180.35336743781, epsilon = 1e-4);
        assert_eq!(savings.period_refi_optimal, Some(25));
        assert_eq!(savings.refi_delay, 12);
    }

    #[test]
    fn test_never_dominates_optimal() {
        let savings = comparator().compare(&refi_loan(), &decisions(25, 36));
        let never = savings.npv_never_refi.unwrap();
        let optimal = savings.npv_optimal_refi.unwrap();
        assert!(never >= optimal);
        assert!(optimal >= 0.0);
    }

    #[test]
    fn test_savings_loss_identity() {
        for first in [1, 10, 25, 36] {
            let s = comparator().compare(&refi_loan(), &decisions(first, 36));
            assert_eq!(
                s.savings_loss.unwrap(),
                s.savings_optimal_refi.unwrap() - s.savings_realized_refi.unwrap()
            );
        }
    }

    #[test]
    fn test_no_signal_means_optimal_equals_never() {
        let rows = refi_loan();
        let s = comparator().compare(&rows, &vec![Some(false); rows.len()]);
        assert_eq!(s.npv_optimal_refi, s.npv_never_refi);
        assert_eq!(s.savings_optimal_refi, Some(0.0));
        assert_eq!(s.period_refi_optimal, None);
        assert_eq!(s.refi_delay, 0);
    }

    #[test]
    fn test_no_exit_means_realized_equals_never() {
        let mut rows = refi_loan();
        for row in &mut rows {
            row.period_exit = None;
        }
        let s = comparator().compare(&rows, &decisions(25, 36));
        assert_eq!(s.npv_realized_refi, s.npv_never_refi);
    }

    #[test]
    fn test_exit_before_first_row_is_undefined() {
        let mut rows = refi_loan();
        for row in &mut rows {
            row.period_exit = Some(1);
        }
        let s = comparator().compare(&rows, &decisions(25, 36));
        assert!(s.npv_realized_refi.is_none());
        assert!(s.savings_loss.is_none());
        assert!(s.savings_optimal_refi.is_some());
    }

    #[test]
    fn test_undefined_decisions_break_runs() {
        assert_eq!(longest_run(&[Some(true), None, Some(true), Some(true), Some(false)]), 2);
        assert_eq!(longest_run(&[]), 0);
    }
}
