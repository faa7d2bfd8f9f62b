//! Nelder-Mead simplex minimizer used for the likelihood fits

use ndarray::Array1;

const REFLECTION: f64 = 1.0;
const EXPANSION: f64 = 2.0;
const CONTRACTION: f64 = 0.5;
const SHRINK: f64 = 0.5;

/// Derivative-free minimizer configuration
#[derive(Debug, Clone, Copy)]
pub struct NelderMead {
    pub max_iterations: usize,
    /// Convergence threshold on both the objective spread and simplex extent
    pub tolerance: f64,
    /// Offset of the initial simplex vertices from the starting point
    pub initial_step: f64,
}

impl Default for NelderMead {
    fn default() -> Self {
        Self {
            max_iterations: 20_000,
            tolerance: 1e-7,
            initial_step: 0.25,
        }
    }
}

/// Best point found by the minimizer
#[derive(Debug, Clone)]
pub struct Minimum {
    pub point: Array1<f64>,
    pub value: f64,
    pub iterations: usize,
    pub converged: bool,
}

impl NelderMead {
    pub fn new(max_iterations: usize, tolerance: f64) -> Self {
        Self {
            max_iterations,
            tolerance,
            ..Self::default()
        }
    }

    /// Minimize `objective` starting from `start`
    ///
    /// NaN objective values are treated as `+inf`, so an objective can reject
    /// infeasible points by returning either.
    pub fn minimize<F>(&self, objective: F, start: Array1<f64>) -> Minimum
    where
        F: Fn(&Array1<f64>) -> f64,
    {
        let eval = |x: &Array1<f64>| {
            let value = objective(x);
            if value.is_nan() {
                f64::INFINITY
            } else {
                value
            }
        };

        let dim = start.len();
        let mut simplex: Vec<(Array1<f64>, f64)> = Vec::with_capacity(dim + 1);
        simplex.push((start.clone(), eval(&start)));
        for i in 0..dim {
            let mut vertex = start.clone();
            vertex[i] += self.initial_step;
            let value = eval(&vertex);
            simplex.push((vertex, value));
        }

        let mut iterations = 0;
        let mut converged = false;
        while iterations < self.max_iterations {
            simplex.sort_by(|a, b| a.1.total_cmp(&b.1));
            if self.has_converged(&simplex) {
                converged = true;
                break;
            }
            iterations += 1;

            let worst = dim;
            let centroid = simplex[..worst]
                .iter()
                .fold(Array1::<f64>::zeros(dim), |acc, (x, _)| acc + x)
                / dim as f64;

            let reflected = &centroid + &((&centroid - &simplex[worst].0) * REFLECTION);
            let f_reflected = eval(&reflected);

            if f_reflected < simplex[0].1 {
                let expanded = &centroid + &((&reflected - &centroid) * EXPANSION);
                let f_expanded = eval(&expanded);
                simplex[worst] = if f_expanded < f_reflected {
                    (expanded, f_expanded)
                } else {
                    (reflected, f_reflected)
                };
                continue;
            }

            if f_reflected < simplex[worst - 1].1 {
                simplex[worst] = (reflected, f_reflected);
                continue;
            }

            let (contracted, f_contracted) = if f_reflected < simplex[worst].1 {
                let outside = &centroid + &((&reflected - &centroid) * CONTRACTION);
                let value = eval(&outside);
                (outside, value)
            } else {
                let inside = &centroid + &((&simplex[worst].0 - &centroid) * CONTRACTION);
                let value = eval(&inside);
                (inside, value)
            };

            if f_contracted < f_reflected.min(simplex[worst].1) {
                simplex[worst] = (contracted, f_contracted);
                continue;
            }

            let best = simplex[0].0.clone();
            for vertex in simplex.iter_mut().skip(1) {
                let shrunk = &best + &((&vertex.0 - &best) * SHRINK);
                let value = eval(&shrunk);
                *vertex = (shrunk, value);
            }
        }

        simplex.sort_by(|a, b| a.1.total_cmp(&b.1));
        let (point, value) = simplex.swap_remove(0);
        Minimum {
            point,
            value,
            iterations,
            converged,
        }
    }

    fn has_converged(&self, simplex: &[(Array1<f64>, f64)]) -> bool {
        let (best, f_best) = &simplex[0];
        if !f_best.is_finite() {
            return false;
        }
        let f_spread = simplex
            .iter()
            .map(|(_, f)| (f - f_best).abs())
            .fold(0.0, f64::max);
        let x_spread = simplex
            .iter()
            .flat_map(|(x, _)| x.iter().zip(best.iter()).map(|(a, b)| (a - b).abs()))
            .fold(0.0, f64::max);
        f_spread <= self.tolerance && x_spread <= self.tolerance
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_quadratic_minimum() {
        let objective = |x: &Array1<f64>| (x[0] - 3.0).powi(2) + 2.0 * (x[1] + 1.0).powi(2);
        let result = NelderMead::default().minimize(objective, array![0.0, 0.0]);

        assert!(result.converged);
        assert!((result.point[0] - 3.0).abs() < 1e-3);
        assert!((result.point[1] + 1.0).abs() < 1e-3);
        assert!(result.value < 1e-6);
    }

    #[test]
    fn test_rosenbrock() {
        let objective =
            |x: &Array1<f64>| (1.0 - x[0]).powi(2) + 100.0 * (x[1] - x[0] * x[0]).powi(2);
        let result = NelderMead::default().minimize(objective, array![-1.2, 1.0]);

        assert!(result.converged);
        assert!((result.point[0] - 1.0).abs() < 1e-2);
        assert!((result.point[1] - 1.0).abs() < 1e-2);
    }

    #[test]
    fn test_infeasible_region_is_avoided() {
        let objective = |x: &Array1<f64>| {
            if x[0] < 0.5 {
                f64::NAN
            } else {
                (x[0] - 0.2).powi(2)
            }
        };
        let result = NelderMead::default().minimize(objective, array![2.0]);

        assert!(result.point[0] >= 0.5);
        assert!((result.point[0] - 0.5).abs() < 1e-2);
    }

    #[test]
    fn test_flat_objective_still_pins_the_point() {
        // Values differ by far less than the tolerance long before the
        // simplex shrinks, so only the point spread stops the search
        let objective =
            |x: &Array1<f64>| 1e-6 * ((x[0] - 3.3).powi(2) + (x[1] + 0.7).powi(2));
        let result = NelderMead::default().minimize(objective, array![0.1, 0.2]);

        assert!(result.converged);
        assert!((result.point[0] - 3.3).abs() < 1e-6);
        assert!((result.point[1] + 0.7).abs() < 1e-6);
    }

    #[test]
    fn test_iteration_cap_reports_not_converged() {
        let objective = |x: &Array1<f64>| x.iter().map(|v| v * v).sum::<f64>();
        let result = NelderMead::new(3, 1e-12).minimize(objective, array![5.0, 5.0, 5.0]);

        assert!(!result.converged);
        assert_eq!(result.iterations, 3);
    }
}
