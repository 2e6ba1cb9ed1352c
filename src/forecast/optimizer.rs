//! Derivative-free minimisation (Nelder–Mead simplex).

/// Simplex search settings.
#[derive(Debug, Clone, Copy)]
pub struct NelderMead {
    pub max_iterations: usize,
    /// Largest coordinate distance from the best vertex at convergence.
    pub x_tolerance: f64,
    /// Largest objective spread across the simplex at convergence.
    pub f_tolerance: f64,
    /// Offset of the initial vertices from the starting point.
    pub initial_step: f64,
}

impl Default for NelderMead {
    fn default() -> Self {
        Self {
            max_iterations: 20_000,
            x_tolerance: 1e-4,
            f_tolerance: 1e-8,
            initial_step: 0.5,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Minimum {
    pub point: Vec<f64>,
    pub value: f64,
    pub iterations: usize,
    pub converged: bool,
}

const REFLECT: f64 = 1.0;
const EXPAND: f64 = 2.0;
const CONTRACT: f64 = 0.5;
const SHRINK: f64 = 0.5;

impl NelderMead {
    /// Minimises `f` starting at `start`. Non-finite objective values are
    /// treated as worse than every finite value.
    pub fn minimize<F>(&self, mut f: F, start: &[f64]) -> Minimum
    where
        F: FnMut(&[f64]) -> f64,
    {
        let n = start.len();
        let mut eval = |x: &[f64]| {
            let v = f(x);
            if v.is_nan() { f64::INFINITY } else { v }
        };

        let mut simplex: Vec<(Vec<f64>, f64)> = Vec::with_capacity(n + 1);
        simplex.push((start.to_vec(), eval(start)));
        if n == 0 {
            let (point, value) = simplex.remove(0);
            return Minimum {
                point,
                value,
                iterations: 0,
                converged: true,
            };
        }
        for i in 0..n {
            let mut vertex = start.to_vec();
            vertex[i] += self.initial_step;
            let value = eval(&vertex);
            simplex.push((vertex, value));
        }

        for iteration in 0..self.max_iterations {
            simplex.sort_by(|a, b| a.1.total_cmp(&b.1));

            let best = simplex[0].1;
            let worst = simplex[n].1;
            let f_spread = if worst.is_finite() {
                worst - best
            } else {
                f64::INFINITY
            };
            let x_spread = simplex[1..]
                .iter()
                .flat_map(|(x, _)| x.iter().zip(&simplex[0].0).map(|(a, b)| (a - b).abs()))
                .fold(0.0, f64::max);

            if f_spread <= self.f_tolerance && x_spread <= self.x_tolerance {
                let (point, value) = simplex.swap_remove(0);
                return Minimum {
                    point,
                    value,
                    iterations: iteration,
                    converged: true,
                };
            }

            let centroid: Vec<f64> = (0..n)
                .map(|k| simplex[..n].iter().map(|(x, _)| x[k]).sum::<f64>() / n as f64)
                .collect();
            let toward = |from: &[f64], coeff: f64| -> Vec<f64> {
                centroid
                    .iter()
                    .zip(from)
                    .map(|(c, x)| c + coeff * (x - c))
                    .collect()
            };

            let reflected = toward(&simplex[n].0, -REFLECT);
            let f_reflected = eval(&reflected);

            if f_reflected < best {
                let expanded = toward(&reflected, EXPAND);
                let f_expanded = eval(&expanded);
                simplex[n] = if f_expanded < f_reflected {
                    (expanded, f_expanded)
                } else {
                    (reflected, f_reflected)
                };
                continue;
            }

            if f_reflected < simplex[n - 1].1 {
                simplex[n] = (reflected, f_reflected);
                continue;
            }

            let (contracted, accept_below) = if f_reflected < worst {
                (toward(&reflected, CONTRACT), f_reflected)
            } else {
                (toward(&simplex[n].0, CONTRACT), worst)
            };
            let f_contracted = eval(&contracted);
            if f_contracted < accept_below {
                simplex[n] = (contracted, f_contracted);
                continue;
            }

            let anchor = simplex[0].0.clone();
            for vertex in simplex.iter_mut().skip(1) {
                let shrunk: Vec<f64> = anchor
                    .iter()
                    .zip(&vertex.0)
                    .map(|(a, x)| a + SHRINK * (x - a))
                    .collect();
                let value = eval(&shrunk);
                *vertex = (shrunk, value);
            }
        }

        simplex.sort_by(|a, b| a.1.total_cmp(&b.1));
        let (point, value) = simplex.swap_remove(0);
        Minimum {
            point,
            value,
            iterations: self.max_iterations,
            converged: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quadratic_minimum() {
        let result = NelderMead::default().minimize(
            |x| (x[0] - 3.0).powi(2) + 2.0 * (x[1] + 1.0).powi(2),
            &[0.0, 0.0],
        );

        assert!(result.converged);
        assert!((result.point[0] - 3.0).abs() < 1e-3);
        assert!((result.point[1] + 1.0).abs() < 1e-3);
        assert!(result.value < 1e-6);
    }

    #[test]
    fn test_rosenbrock() {
        let rosenbrock = |x: &[f64]| (1.0 - x[0]).powi(2) + 100.0 * (x[1] - x[0] * x[0]).powi(2);
        let result = NelderMead::default().minimize(rosenbrock, &[-1.2, 1.0]);

        assert!(result.converged);
        assert!((result.point[0] - 1.0).abs() < 1e-2);
        assert!((result.point[1] - 1.0).abs() < 1e-2);
    }

    #[test]
    fn test_infinite_regions_are_avoided() {
        let walled = |x: &[f64]| {
            if x[0] < 0.0 {
                f64::INFINITY
            } else {
                (x[0] - 0.5).powi(2)
            }
        };
        let result = NelderMead::default().minimize(walled, &[2.0]);

        assert!(result.converged);
        assert!((result.point[0] - 0.5).abs() < 1e-3);
    }

    #[test]
    fn test_iteration_budget_reports_non_convergence() {
        let settings = NelderMead {
            max_iterations: 3,
            ..NelderMead::default()
        };
        let result = settings.minimize(|x| x[0].powi(2) + x[1].powi(2), &[10.0, 10.0]);

        assert!(!result.converged);
        assert_eq!(result.iterations, 3);
    }

    #[test]
    fn test_zero_dimensions() {
        let result = NelderMead::default().minimize(|_| 4.0, &[]);
        assert!(result.converged);
        assert_eq!(result.value, 4.0);
    }
}
