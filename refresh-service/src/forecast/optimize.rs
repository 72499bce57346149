//! Quasi-Newton minimization for the model likelihood.

/// Result of a BFGS run.
#[derive(Debug, Clone)]
pub struct BfgsResult {
    pub point: Vec<f64>,
    pub value: f64,
    pub iterations: usize,
    pub converged: bool,
}

#[derive(Debug, Clone)]
pub struct BfgsConfig {
    /// Hard cap on iterations.
    pub max_iter: usize,
    /// Stop when the largest gradient component falls below this.
    pub gradient_tolerance: f64,
    /// Stop when the relative objective decrease falls below this.
    pub function_tolerance: f64,
}

impl Default for BfgsConfig {
    fn default() -> Self {
        Self {
            max_iter: 200,
            gradient_tolerance: 1e-5,
            function_tolerance: 1e7 * f64::EPSILON,
        }
    }
}

/// Central-difference gradient.
fn gradient<F>(objective: &F, x: &[f64]) -> Vec<f64>
where
    F: Fn(&[f64]) -> f64,
{
    let step = f64::EPSILON.cbrt();
    let mut probe = x.to_vec();
    (0..x.len())
        .map(|i| {
            let h = step * x[i].abs().max(1.0);
            probe[i] = x[i] + h;
            let up = objective(&probe);
            probe[i] = x[i] - h;
            let down = objective(&probe);
            probe[i] = x[i];
            (up - down) / (2.0 * h)
        })
        .collect()
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn max_abs(v: &[f64]) -> f64 {
    v.iter().fold(0.0_f64, |m, x| m.max(x.abs()))
}

/// Backtracking line search satisfying the Armijo condition.
fn line_search<F>(objective: &F, x: &[f64], f: f64, g: &[f64], direction: &[f64]) -> Option<(Vec<f64>, f64)>
where
    F: Fn(&[f64]) -> f64,
{
    let slope = dot(g, direction);
    let mut alpha = 1.0;
    for _ in 0..50 {
        let candidate: Vec<f64> = x.iter().zip(direction).map(|(xi, di)| xi + alpha * di).collect();
        let value = objective(&candidate);
        if value.is_finite() && value <= f + 1e-4 * alpha * slope {
            return Some((candidate, value));
        }
        alpha *= 0.5;
    }
    None
}

/// Minimize `objective` from `initial` with BFGS and numerical gradients.
///
/// `converged` is false only when `max_iter` is exhausted. A line search that
/// cannot decrease the objective along either the quasi-Newton or the steepest
/// descent direction means the point is stationary to working precision, and
/// counts as converged.
pub fn bfgs<F>(objective: F, initial: &[f64], config: &BfgsConfig) -> BfgsResult
where
    F: Fn(&[f64]) -> f64,
{
    let n = initial.len();
    let mut x = initial.to_vec();
    let mut f = objective(&x);
    if n == 0 || !f.is_finite() {
        return BfgsResult {
            point: x,
            value: f,
            iterations: 0,
            converged: n == 0,
        };
    }

    let identity = |n: usize| -> Vec<Vec<f64>> {
        (0..n)
            .map(|i| (0..n).map(|j| if i == j { 1.0 } else { 0.0 }).collect())
            .collect()
    };

    let mut inverse_hessian = identity(n);
    let mut g = gradient(&objective, &x);

    for iteration in 0..config.max_iter {
        if !g.iter().all(|v| v.is_finite()) {
            break;
        }
        if max_abs(&g) < config.gradient_tolerance {
            return BfgsResult { point: x, value: f, iterations: iteration, converged: true };
        }

        let mut direction: Vec<f64> = inverse_hessian.iter().map(|row| -dot(row, &g)).collect();
        if dot(&direction, &g) >= 0.0 {
            inverse_hessian = identity(n);
            direction = g.iter().map(|v| -v).collect();
        }

        let step = line_search(&objective, &x, f, &g, &direction).or_else(|| {
            let steepest: Vec<f64> = g.iter().map(|v| -v).collect();
            line_search(&objective, &x, f, &g, &steepest)
        });
        let Some((x_new, f_new)) = step else {
            return BfgsResult { point: x, value: f, iterations: iteration, converged: true };
        };

        let g_new = gradient(&objective, &x_new);
        let s: Vec<f64> = x_new.iter().zip(&x).map(|(a, b)| a - b).collect();
        let y: Vec<f64> = g_new.iter().zip(&g).map(|(a, b)| a - b).collect();

        let decrease = (f - f_new) / f.abs().max(f_new.abs()).max(1.0);
        x = x_new;
        f = f_new;
        g = g_new;

        if decrease <= config.function_tolerance {
            return BfgsResult { point: x, value: f, iterations: iteration + 1, converged: true };
        }

        let sy = dot(&s, &y);
        if sy > 1e-12 {
            let rho = 1.0 / sy;
            let hy: Vec<f64> = inverse_hessian.iter().map(|row| dot(row, &y)).collect();
            let yhy = dot(&y, &hy);
            for i in 0..n {
                for j in 0..n {
                    inverse_hessian[i][j] += rho * ((1.0 + rho * yhy) * s[i] * s[j] - hy[i] * s[j] - s[i] * hy[j]);
                }
            }
        }
    }

    BfgsResult {
        point: x,
        value: f,
        iterations: config.max_iter,
        converged: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimizes_shifted_quadratic() {
        let result = bfgs(
            |x| (x[0] - 2.0).powi(2) + 3.0 * (x[1] + 1.0).powi(2),
            &[0.0, 0.0],
            &BfgsConfig::default(),
        );

        assert!(result.converged);
        assert!((result.point[0] - 2.0).abs() < 1e-4);
        assert!((result.point[1] + 1.0).abs() < 1e-4);
    }

    #[test]
    fn minimizes_rosenbrock_within_budget() {
        let result = bfgs(
            |x| (1.0 - x[0]).powi(2) + 100.0 * (x[1] - x[0] * x[0]).powi(2),
            &[-1.2, 1.0],
            &BfgsConfig::default(),
        );

        assert!(result.converged);
        assert!(result.iterations <= 200);
        assert!((result.point[0] - 1.0).abs() < 1e-2);
        assert!((result.point[1] - 1.0).abs() < 2e-2);
    }

    #[test]
    fn reports_exhausted_budget() {
        let config = BfgsConfig {
            max_iter: 1,
            gradient_tolerance: 0.0,
            function_tolerance: 0.0,
        };
        let result = bfgs(
            |x| (1.0 - x[0]).powi(2) + 100.0 * (x[1] - x[0] * x[0]).powi(2),
            &[-1.2, 1.0],
            &config,
        );
        assert!(!result.converged);
    }

    #[test]
    fn flat_objective_converges_immediately() {
        let result = bfgs(|_| 1.0, &[0.3, 0.1], &BfgsConfig::default());
        assert!(result.converged);
        assert_eq!(result.iterations, 0);
    }
}
