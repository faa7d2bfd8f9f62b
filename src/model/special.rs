//! Special functions needed by the closed-form expectations

pub use statrs::function::gamma::ln_gamma;

const MAX_TERMS: usize = 100_000;
const SERIES_EPSILON: f64 = 1e-15;

/// Gauss hypergeometric function ₂F₁(a, b; c; z) for `|z| < 1`
///
/// Evaluated by its power series. Returns `f64::INFINITY` when the series
/// overflows or fails to settle, so callers can switch to a transformed form.
pub fn hyp2f1(a: f64, b: f64, c: f64, z: f64) -> f64 {
    if z == 0.0 {
        return 1.0;
    }
    if z.abs() >= 1.0 || (c <= 0.0 && c.fract() == 0.0) {
        return f64::INFINITY;
    }

    let mut term = 1.0;
    let mut sum = 1.0;
    for k in 0..MAX_TERMS {
        let k = k as f64;
        term *= (a + k) * (b + k) / ((c + k) * (k + 1.0)) * z;
        sum += term;
        if !sum.is_finite() {
            return f64::INFINITY;
        }
        if term.abs() <= SERIES_EPSILON * sum.abs() {
            return sum;
        }
    }
    f64::INFINITY
}
