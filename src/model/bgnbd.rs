//! Beta-Geometric/Negative-Binomial (BG/NBD) purchase frequency model

use std::fmt;

use ndarray::{Array1, Zip};
use tracing::debug;

use super::optimize::NelderMead;
use super::special::{hyp2f1, ln_gamma};
use super::{TransactionModel, LOG_PARAM_BOUND};
use crate::data::CalibrationSet;
use crate::error::{CltvError, CltvResult};

/// Fits a BG/NBD model by penalized maximum likelihood
#[derive(Debug, Clone)]
pub struct BetaGeoFitter {
    /// L2 penalty on the (time-scaled) parameters
    pub penalizer: f64,
    pub optimizer: NelderMead,
}

/// Fitted BG/NBD parameters
#[derive(Debug, Clone, PartialEq)]
pub struct BetaGeoModel {
    /// Shape of the Gamma purchase-rate distribution
    pub r: f64,
    /// Scale of the Gamma purchase-rate distribution, in input time units
    pub alpha: f64,
    /// Beta dropout parameters
    pub a: f64,
    pub b: f64,
    pub n_subjects: usize,
    /// Penalized mean negative log-likelihood at the optimum
    pub objective: f64,
}

impl BetaGeoFitter {
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

    /// Fit on per-customer (frequency, recency, tenure) triples
    ///
    /// # Arguments
    /// * `frequency` - Purchase counts (non-negative integers)
    /// * `recency` - Time of last purchase since the first one
    /// * `tenure` - Time since the first purchase (`T`)
    pub fn fit(
        &self,
        frequency: &Array1<f64>,
        recency: &Array1<f64>,
        tenure: &Array1<f64>,
    ) -> CltvResult<BetaGeoModel> {
        check_inputs(frequency, recency, tenure)?;

        // Rescale time so the optimizer starts near sensible magnitudes
        let max_tenure = tenure.fold(f64::MIN, |acc, &t| acc.max(t));
        if max_tenure <= 0.0 {
            return Err(CltvError::invalid("tenure must be positive for at least one customer"));
        }
        let scale = 10.0 / max_tenure;
        let scaled_recency = recency * scale;
        let scaled_tenure = tenure * scale;

        let minimum = self.optimizer.minimize(
            |log_params| {
                negative_log_likelihood(
                    log_params,
                    frequency,
                    &scaled_recency,
                    &scaled_tenure,
                    self.penalizer,
                )
            },
            Array1::from_elem(4, 0.1),
        );

        if !minimum.converged || !minimum.value.is_finite() {
            return Err(CltvError::NotConverged {
                model: "BG/NBD",
                iterations: minimum.iterations,
                objective: minimum.value,
            });
        }

        let params = minimum.point.mapv(f64::exp);
        let model = BetaGeoModel {
            r: params[0],
            alpha: params[1] / scale,
            a: params[2],
            b: params[3],
            n_subjects: frequency.len(),
            objective: minimum.value,
        };
        debug!(iterations = minimum.iterations, %model, "BG/NBD fitted");
        Ok(model)
    }
}

fn check_inputs(
    frequency: &Array1<f64>,
    recency: &Array1<f64>,
    tenure: &Array1<f64>,
) -> CltvResult<()> {
    if frequency.is_empty() {
        return Err(CltvError::invalid("no customers to fit"));
    }
    if frequency.len() != recency.len() || frequency.len() != tenure.len() {
        return Err(CltvError::invalid(format!(
            "input lengths differ: frequency {}, recency {}, tenure {}",
            frequency.len(),
            recency.len(),
            tenure.len()
        )));
    }
    let all_finite = frequency
        .iter()
        .chain(recency.iter())
        .chain(tenure.iter())
        .all(|v| v.is_finite());
    if !all_finite {
        return Err(CltvError::invalid("inputs contain non-finite values"));
    }
    if Zip::from(recency).and(tenure).fold(false, |any, &r, &t| any || r > t) {
        return Err(CltvError::invalid(
            "some values in the recency vector are larger than the tenure vector",
        ));
    }
    if recency.iter().any(|&r| r < 0.0) {
        return Err(CltvError::invalid("recency must be non-negative"));
    }
    if frequency.iter().any(|&x| x < 0.0) {
        return Err(CltvError::invalid("there exist negative values in the frequency vector"));
    }
    if frequency.iter().any(|&x| x.fract() != 0.0) {
        return Err(CltvError::invalid("there exist non-integer values in the frequency vector"));
    }
    Ok(())
}

fn negative_log_likelihood(
    log_params: &Array1<f64>,
    frequency: &Array1<f64>,
    recency: &Array1<f64>,
    tenure: &Array1<f64>,
    penalizer: f64,
) -> f64 {
    if log_params.iter().any(|p| p.abs() > LOG_PARAM_BOUND) {
        return f64::INFINITY;
    }
    let params = log_params.mapv(f64::exp);
    let (r, alpha, a, b) = (params[0], params[1], params[2], params[3]);

    let ln_gamma_r = ln_gamma(r);
    let ln_gamma_b = ln_gamma(b);
    let ln_gamma_ab = ln_gamma(a + b);
    let ln_alpha = alpha.ln();
    let ln_a = a.ln();

    let log_likelihood = Zip::from(frequency)
        .and(recency)
        .and(tenure)
        .fold(0.0, |acc, &x, &t_x, &t| {
            let a1 = ln_gamma(r + x) - ln_gamma_r + r * ln_alpha;
            let a2 = ln_gamma_ab + ln_gamma(b + x) - ln_gamma_b - ln_gamma(a + b + x);
            let a3 = -(r + x) * (alpha + t).ln();
            let a4 = ln_a - (b + x.max(1.0) - 1.0).ln() - (r + x) * (t_x + alpha).ln();

            let max = a3.max(a4);
            let mut tail = (a3 - max).exp();
            if x > 0.0 {
                tail += (a4 - max).exp();
            }
            acc + a1 + a2 + max + tail.ln()
        });

    -log_likelihood / frequency.len() as f64 + penalizer * params.mapv(|p| p * p).sum()
}

impl BetaGeoModel {
    /// Expected number of purchases in the next `t` time units for a customer
    /// with the given history
    pub fn conditional_expected_number_of_purchases_up_to_time(
        &self,
        t: f64,
        frequency: f64,
        recency: f64,
        tenure: f64,
    ) -> f64 {
        let (r, alpha, a, b) = (self.r, self.alpha, self.a, self.b);
        let x = frequency;

        let hyp_a = r + x;
        let hyp_b = b + x;
        let hyp_c = a + b + x - 1.0;
        let z = t / (alpha + tenure + t);

        let mut ln_hyp = hyp2f1(hyp_a, hyp_b, hyp_c, z).ln();
        if !ln_hyp.is_finite() {
            // Euler's transformation of the same function
            ln_hyp = hyp2f1(hyp_c - hyp_a, hyp_c - hyp_b, hyp_c, z).ln()
                + (hyp_c - hyp_a - hyp_b) * (1.0 - z).ln();
        }

        let first_term = (a + b + x - 1.0) / (a - 1.0);
        let second_term =
            1.0 - (ln_hyp + (r + x) * ((alpha + tenure) / (alpha + t + tenure)).ln()).exp();
        let numerator = first_term * second_term;

        let denominator = if x > 0.0 {
            1.0 + (a / (b + x - 1.0)) * ((alpha + tenure) / (alpha + recency)).powf(r + x)
        } else {
            1.0
        };

        numerator / denominator
    }

    /// Expected purchases over `t` for every customer of a calibration set
    pub fn expected_purchases(&self, t: f64, data: &CalibrationSet) -> Array1<f64> {
        Zip::from(&data.frequency)
            .and(&data.recency)
            .and(&data.tenure)
            .map_collect(|&x, &t_x, &tenure| {
                self.conditional_expected_number_of_purchases_up_to_time(t, x, t_x, tenure)
            })
    }
}

impl TransactionModel for BetaGeoModel {
    fn predict(&self, t: f64, frequency: f64, recency: f64, tenure: f64) -> f64 {
        self.conditional_expected_number_of_purchases_up_to_time(t, frequency, recency, tenure)
    }
}

impl fmt::Display for BetaGeoModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<BetaGeoFitter: fitted with {} subjects, a: {:.2}, alpha: {:.2}, b: {:.2}, r: {:.2}>",
            self.n_subjects, self.a, self.alpha, self.b, self.r
        )
    }
}
