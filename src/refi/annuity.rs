//! Level-payment annuity arithmetic
//!
//! One payment model is used everywhere: a level payment that amortises the
//! principal to zero over `n` periods, payments at period end.

/// Helper functions for mortgage payment and present value calculations
pub struct Annuity;

impl Annuity {
    /// Level payment amortising `principal` over `n_periods` at `rate` per period.
    ///
    /// `None` for a zero-length schedule.
    pub fn level_payment(rate: f64, n_periods: u32, principal: f64) -> Option<f64> {
        if n_periods == 0 {
            return None;
        }
        if rate.abs() < 1e-12 {
            return Some(principal / n_periods as f64);
        }
        let growth = (1.0 + rate).powi(n_periods as i32);
        Some(principal * rate * growth / (growth - 1.0))
    }

    /// Balance outstanding after `age` scheduled payments
    pub fn scheduled_balance(principal: f64, rate: f64, n_periods: u32, age: i32) -> f64 {
        if rate.abs() < 1e-12 {
            return principal * (1.0 - age as f64 / n_periods as f64);
        }
        let total = (1.0 + rate).powi(n_periods as i32);
        principal * (total - (1.0 + rate).powi(age)) / (total - 1.0)
    }

    /// PV of `n_periods` payments of `payment`, first payment one period out
    pub fn present_value(payment: f64, n_periods: i32, rate: f64) -> f64 {
        if rate.abs() < 1e-12 {
            return payment * n_periods as f64;
        }
        payment * (1.0 - (1.0 + rate).powi(-n_periods)) / rate
    }

    /// `(1 + rate)^-n`
    pub fn discount_factor(rate: f64, n_periods: i32) -> f64 {
        (1.0 + rate).powi(-n_periods)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_level_payment() {
        let payment = Annuity::level_payment(0.06 / 12.0, 360, 300_000.0).unwrap();
        assert_relative_eq!(payment, 1798.6515754582708, epsilon = 1e-8);
        assert_relative_eq!(Annuity::level_payment(0.0, 10, 1000.0).unwrap(), 100.0);
        assert!(Annuity::level_payment(0.01, 0, 1000.0).is_none());
    }

    #[test]
    fn test_scheduled_balance() {
        let r = 0.06 / 12.0;
        assert_relative_eq!(Annuity::scheduled_balance(300_000.0, r, 360, 0), 300_000.0, epsilon = 1e-6);
        assert_relative_eq!(Annuity::scheduled_balance(300_000.0, r, 360, 24), 292404.7065002679, epsilon = 1e-6);
        assert_relative_eq!(Annuity::scheduled_balance(300_000.0, r, 360, 360), 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_present_value_of_payments_is_the_principal() {
        let r = 0.06 / 12.0;
        let payment = Annuity::level_payment(r, 360, 300_000.0).unwrap();
        assert_relative_eq!(Annuity::present_value(payment, 360, r), 300_000.0, epsilon = 1e-6);
        assert_relative_eq!(Annuity::present_value(10.0, 12, 0.0), 120.0);
    }

    #[test]
    fn test_discount_factor() {
        assert_relative_eq!(Annuity::discount_factor(0.01, 0), 1.0);
        assert_relative_eq!(Annuity::discount_factor(0.01, 2), 1.0 / 1.0201, epsilon = 1e-12);
    }
}
