//! Gamma-Gamma model of average transaction value

use std::fmt;

use ndarray::{Array1, Zip};
use tracing::debug;

use super::optimize::NelderMead;
use super::special::ln_gamma;
use super::{ClvFrequency, TransactionModel, LOG_PARAM_BOUND};
use crate::error::{CltvError, CltvResult};

/// Fits a Gamma-Gamma spend model by penalized maximum likelihood
///
/// Assumes spend per transaction is independent of purchase frequency.
#[derive(Debug, Clone)]
pub struct GammaGammaFitter {
    pub penalizer: f64,
    pub optimizer: NelderMead,
}

/// Fitted Gamma-Gamma parameters
#[derive(Debug, Clone, PartialEq)]
pub struct GammaGammaModel {
    pub p: f64,
    pub q: f64,
    pub v: f64,
    pub n_subjects: usize,
    pub objective: f64,
}

impl GammaGammaFitter {
    pub fn new(penalizer: f64) -> Self {
        Self {
            penalizer,
            optimizer: NelderMead::default(),
        }
    }

    pub fn with_optimizer(mut self, optimizer: NelderMead) -> Self {
        self.optimizer = optimizer;
        self
    }

    /// Fit on per-customer transaction counts and average spend
    pub fn fit(
        &self,
        frequency: &Array1<f64>,
        monetary_value: &Array1<f64>,
    ) -> CltvResult<GammaGammaModel> {
        if frequency.is_empty() {
            return Err(CltvError::invalid("no customers to fit"));
        }
        if frequency.len() != monetary_value.len() {
            return Err(CltvError::invalid(format!(
                "input lengths differ: frequency {}, monetary value {}",
                frequency.len(),
                monetary_value.len()
            )));
        }
        if frequency.iter().any(|&x| !(x > 0.0) || !x.is_finite()) {
            return Err(CltvError::invalid("frequency must be positive for every customer"));
        }
        if monetary_value.iter().any(|&m| !(m > 0.0) || !m.is_finite()) {
            return Err(CltvError::invalid(
                "there exist non-positive values in the monetary value vector",
            ));
        }

        let minimum = self.optimizer.minimize(
            |log_params| {
                negative_log_likelihood(log_params, frequency, monetary_value, self.penalizer)
            },
            Array1::from_elem(3, 0.1),
        );

        if !minimum.converged || !minimum.value.is_finite() {
            return Err(CltvError::NotConverged {
                model: "Gamma-Gamma",
                iterations: minimum.iterations,
                objective: minimum.value,
            });
        }

        let params = minimum.point.mapv(f64::exp);
        let model = GammaGammaModel {
            p: params[0],
            q: params[1],
            v: params[2],
            n_subjects: frequency.len(),
            objective: minimum.value,
        };
        debug!(iterations = minimum.iterations, %model, "Gamma-Gamma fitted");
        Ok(model)
    }
}

fn negative_log_likelihood(
    log_params: &Array1<f64>,
    frequency: &Array1<f64>,
    monetary_value: &Array1<f64>,
    penalizer: f64,
) -> f64 {
    if log_params.iter().any(|p| p.abs() > LOG_PARAM_BOUND) {
        return f64::INFINITY;
    }
    let params = log_params.mapv(f64::exp);
    let (p, q, v) = (params[0], params[1], params[2]);
    let ln_gamma_q = ln_gamma(q);
    let ln_v = v.ln();

    let log_likelihood = Zip::from(frequency)
        .and(monetary_value)
        .fold(0.0, |acc, &x, &m| {
            let px = p * x;
            acc + ln_gamma(px + q) - ln_gamma(px) - ln_gamma_q + q * ln_v + (px - 1.0) * m.ln()
                + px * x.ln()
                - (px + q) * (x * m + v).ln()
        });

    -log_likelihood / frequency.len() as f64 + penalizer * params.mapv(|p| p * p).sum()
}

impl GammaGammaModel {
    /// Expected average spend per transaction, shrunk toward the population
    /// mean for customers with few transactions
    pub fn conditional_expected_average_profit(&self, frequency: f64, monetary_value: f64) -> f64 {
        let individual_weight = self.p * frequency / (self.p * frequency + self.q - 1.0);
        (1.0 - individual_weight) * self.population_mean() + individual_weight * monetary_value
    }

    /// Mean spend per transaction across the population, `v·p / (q - 1)`
    pub fn population_mean(&self) -> f64 {
        self.v * self.p / (self.q - 1.0)
    }

    /// Discounted customer lifetime value over `time` months
    ///
    /// Each month contributes the incremental purchases predicted by
    /// `transactions` times the expected spend, discounted by
    /// `(1 + discount_rate)^month`.
    #[allow(clippy::too_many_arguments)]
    pub fn customer_lifetime_value<M: TransactionModel>(
        &self,
        transactions: &M,
        frequency: f64,
        recency: f64,
        tenure: f64,
        monetary_value: f64,
        time: u32,
        freq: ClvFrequency,
        discount_rate: f64,
    ) -> f64 {
        let adjusted_monetary_value = self.conditional_expected_average_profit(frequency, monetary_value);
        let factor = freq.periods_per_month();

        (1..=time)
            .map(|month| {
                let end = month as f64 * factor;
                let purchases = transactions.predict(end, frequency, recency, tenure)
                    - transactions.predict(end - factor, frequency, recency, tenure);
                adjusted_monetary_value * purchases / (1.0 + discount_rate).powi(month as i32)
            })
            .sum()
    }
}

impl fmt::Display for GammaGammaModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<GammaGammaFitter: fitted with {} subjects, p: {:.2}, q: {:.2}, v: {:.2}>",
            self.n_subjects, self.p, self.q, self.v
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    /// Purchases accrue linearly at `rate` per time unit
    struct ConstantRate {
        rate: f64,
    }

    impl TransactionModel for ConstantRate {
        fn predict(&self, t: f64, _frequency: f64, _recency: f64, _tenure: f64) -> f64 {
            self.rate * t
        }
    }

    fn paper_model() -> GammaGammaModel {
        GammaGammaModel {
            p: 6.25,
            q: 3.74,
            v: 15.44,
            n_subjects: 946,
            objective: 0.0,
        }
    }

    fn synthetic_spend(n: usize) -> (Array1<f64>, Array1<f64>) {
        let frequency: Array1<f64> = (0..n).map(|i| (2 + (i * 7) % 9) as f64).collect();
        let monetary: Array1<f64> = (0..n)
            .map(|i| 40.0 + ((i * 37) % 23) as f64 * 6.5 + ((i * 11) % 5) as f64 * 20.0)
            .collect();
        (frequency, monetary)
    }

    #[test]
    fn test_expected_profit_shrinks_toward_population_mean() {
        let model = paper_model();
        let population = model.population_mean();
        assert!((population - 15.44 * 6.25 / 2.74).abs() < 1e-9);

        let spend = model.conditional_expected_average_profit(2.0, 100.0);
        let weight = 12.5 / (12.5 + 2.74);
        assert!((spend - ((1.0 - weight) * population + weight * 100.0)).abs() < 1e-9);
        assert!(spend > population && spend < 100.0);

        // More transactions lean harder on the customer's own average
        assert!(model.conditional_expected_average_profit(20.0, 100.0) > spend);
    }

    #[test]
    fn test_clv_sums_discounted_monthly_increments() {
        let model = paper_model();
        let transactions = ConstantRate { rate: 0.5 };
        let clv = model.customer_lifetime_value(
            &transactions,
            3.0,
            10.0,
            20.0,
            80.0,
            6,
            ClvFrequency::Weekly,
            0.01,
        );

        let spend = model.conditional_expected_average_profit(3.0, 80.0);
        let per_month = 0.5 * 4.345 * spend;
        let expected: f64 = (1..=6).map(|m| per_month / 1.01_f64.powi(m)).sum();
        assert!((clv - expected).abs() < 1e-9);
    }

    #[test]
    fn test_clv_zero_when_no_purchases_expected() {
        let transactions = ConstantRate { rate: 0.0 };
        let clv = paper_model().customer_lifetime_value(
            &transactions,
            3.0,
            10.0,
            20.0,
            80.0,
            6,
            ClvFrequency::Weekly,
            0.01,
        );
        assert_eq!(clv, 0.0);
    }

    #[test]
    fn test_fit_yields_positive_parameters() {
        let (frequency, monetary) = synthetic_spend(200);
        let model = GammaGammaFitter::new(0.01).fit(&frequency, &monetary).unwrap();

        for value in [model.p, model.q, model.v] {
            assert!(value.is_finite() && value > 0.0);
        }
        let spend = model.conditional_expected_average_profit(frequency[0], monetary[0]);
        assert!(spend.is_finite());
    }

    #[test]
    fn test_fit_rejects_non_positive_spend() {
        let result = GammaGammaFitter::new(0.01).fit(&array![2.0, 3.0], &array![10.0, 0.0]);
        assert!(matches!(result, Err(CltvError::InvalidInput(_))));
    }

    #[test]
    fn test_fit_rejects_mismatched_lengths() {
        let result = GammaGammaFitter::new(0.01).fit(&array![2.0, 3.0], &array![10.0]);
        assert!(matches!(result, Err(CltvError::InvalidInput(_))));
    }
}
