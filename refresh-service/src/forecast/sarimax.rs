//! Seasonal ARIMA with exogenous regressors.
//!
//! The model is a regression on the exogenous columns whose errors follow a
//! seasonal ARIMA process:
//!
//! ```text
//! y_t = x_t' beta + u_t
//! phi(L) Phi(L^s) (1 - L)^d (1 - L^s)^D u_t = c + theta(L) Theta(L^s) e_t
//! ```
//!
//! `beta` is estimated by least squares on the differenced data, then the
//! ARMA coefficients and the constant by conditional sum of squares. The
//! constant enters linearly, so it is concentrated out of the search.

use super::optimize::{bfgs, BfgsConfig};
use super::polynomial::{self, apply, degree, differencing, integrate, multiply};

/// Non-seasonal `(p, d, q)` and seasonal `(P, D, Q, s)` orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SarimaxOrder {
    pub p: usize,
    pub d: usize,
    pub q: usize,
    pub seasonal_p: usize,
    pub seasonal_d: usize,
    pub seasonal_q: usize,
    pub period: usize,
}

impl SarimaxOrder {
    /// `(1, 2, 1) x (1, 1, 2, 12)`, the dashboard's monthly generation model.
    pub const MONTHLY_GENERATION: SarimaxOrder = SarimaxOrder {
        p: 1,
        d: 2,
        q: 1,
        seasonal_p: 1,
        seasonal_d: 1,
        seasonal_q: 2,
        period: 12,
    };

    /// Observations needed before a fit is attempted: strictly more than the
    /// sum of all regular and seasonal terms.
    pub fn min_observations(&self) -> usize {
        self.p
            + self.d
            + self.q
            + self.period * (self.seasonal_p + self.seasonal_d + self.seasonal_q)
            + 1
    }

    fn n_arma_params(&self) -> usize {
        self.p + self.seasonal_p + self.q + self.seasonal_q
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SarimaxSpec {
    pub order: SarimaxOrder,
    /// Estimate a constant on the differenced scale.
    pub trend_constant: bool,
    /// Keep moving-average roots outside the unit circle.
    pub enforce_invertibility: bool,
    pub max_iterations: usize,
}

impl Default for SarimaxSpec {
    fn default() -> Self {
        Self {
            order: SarimaxOrder::MONTHLY_GENERATION,
            trend_constant: true,
            enforce_invertibility: false,
            max_iterations: 200,
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum FitError {
    #[error("insufficient history: {got} observations, need at least {need}")]
    InsufficientHistory { got: usize, need: usize },
    #[error("exogenous data has {got} columns per row, expected {expected}")]
    ExogShape { expected: usize, got: usize },
    #[error("series contains non-finite values")]
    NonFinite,
    #[error("optimizer did not converge within {iterations} iterations")]
    NotConverged { iterations: usize },
}

/// Maps an unconstrained real onto (-1, 1), keeping first-order AR stationary.
fn constrain_stationary(x: f64) -> f64 {
    x / (1.0 + x * x).sqrt()
}

fn unconstrain_stationary(phi: f64) -> f64 {
    let phi = phi.clamp(-0.99, 0.99);
    phi / (1.0 - phi * phi).sqrt()
}

/// Unconstrained search vector laid out as `[ar, seasonal_ar, ma, seasonal_ma]`.
#[derive(Debug, Clone, PartialEq)]
struct ArmaParams {
    ar: Vec<f64>,
    seasonal_ar: Vec<f64>,
    ma: Vec<f64>,
    seasonal_ma: Vec<f64>,
}

impl ArmaParams {
    fn from_search(order: &SarimaxOrder, x: &[f64], enforce_invertibility: bool) -> Self {
        let (ar, rest) = x.split_at(order.p);
        let (seasonal_ar, rest) = rest.split_at(order.seasonal_p);
        let (ma, seasonal_ma) = rest.split_at(order.q);

        let ma_transform = |v: &f64| {
            if enforce_invertibility {
                constrain_stationary(*v)
            } else {
                *v
            }
        };

        Self {
            ar: ar.iter().map(|v| constrain_stationary(*v)).collect(),
            seasonal_ar: seasonal_ar.iter().map(|v| constrain_stationary(*v)).collect(),
            ma: ma.iter().map(ma_transform).collect(),
            seasonal_ma: seasonal_ma.iter().map(ma_transform).collect(),
        }
    }

    /// Full AR polynomial `phi(L) Phi(L^s)`.
    fn ar_polynomial(&self, period: usize) -> Vec<f64> {
        multiply(
            &polynomial::autoregressive(&self.ar, 1),
            &polynomial::autoregressive(&self.seasonal_ar, period),
        )
    }

    /// Full MA polynomial `theta(L) Theta(L^s)`.
    fn ma_polynomial(&self, period: usize) -> Vec<f64> {
        multiply(
            &polynomial::moving_average(&self.ma, 1),
            &polynomial::moving_average(&self.seasonal_ma, period),
        )
    }
}

/// Conditional residuals of the stationary series `w` given the ARMA
/// polynomials and constant. Residuals before the AR window are zero.
fn conditional_residuals(w: &[f64], ar: &[f64], ma: &[f64], constant: f64) -> Vec<f64> {
    let start = degree(ar);
    let mut e = vec![0.0; w.len()];
    for t in start..w.len() {
        let ar_part: f64 = ar.iter().enumerate().map(|(k, a)| a * w[t - k]).sum();
        let ma_part: f64 = ma
            .iter()
            .enumerate()
            .skip(1)
            .filter(|(k, _)| *k <= t)
            .map(|(k, m)| m * e[t - k])
            .sum();
        e[t] = ar_part - constant - ma_part;
    }
    e
}

/// Residuals with the constant concentrated out.
///
/// Residuals are affine in the constant, `e = a - c * g`, where `a` are the
/// residuals at `c = 0` and `g` is the MA filter applied to a unit intercept.
fn concentrated_residuals(w: &[f64], ar: &[f64], ma: &[f64], with_constant: bool) -> (Vec<f64>, f64) {
    let base = conditional_residuals(w, ar, ma, 0.0);
    if !with_constant {
        return (base, 0.0);
    }

    let zeros = vec![0.0; w.len()];
    let unit: Vec<f64> = conditional_residuals(&zeros, ar, ma, 1.0).iter().map(|v| -v).collect();

    let start = degree(ar);
    let gg: f64 = unit[start..].iter().map(|g| g * g).sum();
    let ag: f64 = base[start..].iter().zip(&unit[start..]).map(|(a, g)| a * g).sum();
    let constant = if gg > 0.0 { ag / gg } else { 0.0 };

    let residuals = base.iter().zip(&unit).map(|(a, g)| a - constant * g).collect();
    (residuals, constant)
}

fn sum_of_squares(residuals: &[f64], start: usize) -> f64 {
    residuals[start.min(residuals.len())..].iter().map(|e| e * e).sum()
}

/// Least-squares coefficients of `y` on `columns`.
///
/// Columns that vanish after differencing carry no information and get a zero
/// coefficient. Solved through the normal equations with partial pivoting.
fn least_squares(columns: &[Vec<f64>], y: &[f64]) -> Vec<f64> {
    let k = columns.len();
    let mut beta = vec![0.0; k];

    let active: Vec<usize> = (0..k)
        .filter(|&j| columns[j].iter().map(|v| v * v).sum::<f64>() > 1e-12)
        .collect();
    if active.is_empty() {
        return beta;
    }

    let m = active.len();
    let mut a = vec![vec![0.0; m + 1]; m];
    for (r, &i) in active.iter().enumerate() {
        for (c, &j) in active.iter().enumerate() {
            a[r][c] = columns[i].iter().zip(&columns[j]).map(|(x, z)| x * z).sum();
        }
        a[r][m] = columns[i].iter().zip(y).map(|(x, v)| x * v).sum();
    }

    for col in 0..m {
        let pivot = (col..m)
            .max_by(|&r1, &r2| a[r1][col].abs().total_cmp(&a[r2][col].abs()))
            .unwrap_or(col);
        a.swap(col, pivot);
        if a[col][col].abs() < 1e-12 {
            continue;
        }
        for r in 0..m {
            if r != col {
                let factor = a[r][col] / a[col][col];
                for c in col..=m {
                    a[r][c] -= factor * a[col][c];
                }
            }
        }
    }

    for (r, &j) in active.iter().enumerate() {
        if a[r][r].abs() >= 1e-12 {
            beta[j] = a[r][m] / a[r][r];
        }
    }
    beta
}

fn regression_fit(exog: &[Vec<f64>], beta: &[f64]) -> Vec<f64> {
    exog.iter().map(|row| row.iter().zip(beta).map(|(x, b)| x * b).sum::<f64>()).collect()
}

#[derive(Debug, Clone)]
pub struct FittedSarimax {
    spec: SarimaxSpec,
    exog_coefficients: Vec<f64>,
    constant: f64,
    params: ArmaParams,
    sigma2: f64,
    iterations: usize,
    /// `y - x'beta` on the original scale.
    regression_errors: Vec<f64>,
    /// Differenced regression errors.
    stationary: Vec<f64>,
    residuals: Vec<f64>,
}

impl FittedSarimax {
    /// Fit to `y` with one exogenous row per observation.
    pub fn fit(spec: SarimaxSpec, y: &[f64], exog: &[Vec<f64>]) -> Result<Self, FitError> {
        let order = spec.order;
        let need = order.min_observations();
        if y.len() < need {
            return Err(FitError::InsufficientHistory { got: y.len(), need });
        }
        if exog.len() != y.len() {
            return Err(FitError::ExogShape {
                expected: y.len(),
                got: exog.len(),
            });
        }
        let k = exog.first().map(Vec::len).unwrap_or(0);
        if let Some(bad) = exog.iter().find(|row| row.len() != k) {
            return Err(FitError::ExogShape { expected: k, got: bad.len() });
        }
        if !y.iter().chain(exog.iter().flatten()).all(|v| v.is_finite()) {
            return Err(FitError::NonFinite);
        }

        let diff = differencing(order.d, order.seasonal_d, order.period);
        let y_diff = apply(&diff, y);
        let exog_diff: Vec<Vec<f64>> = (0..k)
            .map(|j| {
                let column: Vec<f64> = exog.iter().map(|row| row[j]).collect();
                apply(&diff, &column)
            })
            .collect();
        let exog_coefficients = least_squares(&exog_diff, &y_diff);

        let fitted_regression = regression_fit(exog, &exog_coefficients);
        let regression_errors: Vec<f64> = y.iter().zip(&fitted_regression).map(|(v, f)| v - f).collect();
        let stationary = apply(&diff, &regression_errors);

        let n_effective = stationary.len() as f64;
        let objective = |x: &[f64]| -> f64 {
            let params = ArmaParams::from_search(&order, x, spec.enforce_invertibility);
            let ar = params.ar_polynomial(order.period);
            let ma = params.ma_polynomial(order.period);
            let (residuals, _) = concentrated_residuals(&stationary, &ar, &ma, spec.trend_constant);
            let sse = sum_of_squares(&residuals, degree(&ar));
            if !sse.is_finite() {
                return f64::INFINITY;
            }
            0.5 * (sse / n_effective).max(f64::MIN_POSITIVE).ln()
        };

        let mut initial = vec![0.0; order.n_arma_params()];
        if order.p > 0 {
            initial[0] = unconstrain_stationary(lag_one_autocorrelation(&stationary));
        }

        let config = BfgsConfig {
            max_iter: spec.max_iterations,
            ..BfgsConfig::default()
        };
        let result = bfgs(objective, &initial, &config);
        if !result.converged {
            return Err(FitError::NotConverged {
                iterations: result.iterations,
            });
        }
        if !result.value.is_finite() || !result.point.iter().all(|v| v.is_finite()) {
            return Err(FitError::NonFinite);
        }

        let params = ArmaParams::from_search(&order, &result.point, spec.enforce_invertibility);
        let ar = params.ar_polynomial(order.period);
        let ma = params.ma_polynomial(order.period);
        let (residuals, constant) = concentrated_residuals(&stationary, &ar, &ma, spec.trend_constant);
        let start = degree(&ar);
        let sigma2 = sum_of_squares(&residuals, start) / (stationary.len() - start).max(1) as f64;

        Ok(Self {
            spec,
            exog_coefficients,
            constant,
            params,
            sigma2,
            iterations: result.iterations,
            regression_errors,
            stationary,
            residuals,
        })
    }

    pub fn exog_coefficients(&self) -> &[f64] {
        &self.exog_coefficients
    }

    pub fn constant(&self) -> f64 {
        self.constant
    }

    pub fn ar(&self) -> &[f64] {
        &self.params.ar
    }

    pub fn seasonal_ar(&self) -> &[f64] {
        &self.params.seasonal_ar
    }

    pub fn ma(&self) -> &[f64] {
        &self.params.ma
    }

    pub fn seasonal_ma(&self) -> &[f64] {
        &self.params.seasonal_ma
    }

    pub fn sigma2(&self) -> f64 {
        self.sigma2
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }

    /// Point forecasts (predicted mean), one per future exogenous row.
    pub fn forecast(&self, future_exog: &[Vec<f64>]) -> Result<Vec<f64>, FitError> {
        let k = self.exog_coefficients.len();
        if let Some(bad) = future_exog.iter().find(|row| row.len() != k) {
            return Err(FitError::ExogShape { expected: k, got: bad.len() });
        }

        let order = self.spec.order;
        let ar = self.params.ar_polynomial(order.period);
        let ma = self.params.ma_polynomial(order.period);

        let mut w = self.stationary.clone();
        let mut e = self.residuals.clone();
        for _ in 0..future_exog.len() {
            let t = w.len();
            let ar_part: f64 = ar
                .iter()
                .enumerate()
                .skip(1)
                .filter(|(k, _)| *k <= t)
                .map(|(k, a)| a * w[t - k])
                .sum();
            let ma_part: f64 = ma
                .iter()
                .enumerate()
                .skip(1)
                .filter(|(k, _)| *k <= t)
                .map(|(k, m)| m * e[t - k])
                .sum();
            w.push(self.constant - ar_part + ma_part);
            e.push(0.0);
        }

        let diff = differencing(order.d, order.seasonal_d, order.period);
        let future_errors = integrate(&diff, &self.regression_errors, &w[self.stationary.len()..]);
        let future_regression = regression_fit(future_exog, &self.exog_coefficients);

        let out: Vec<f64> = future_errors.iter().zip(&future_regression).map(|(u, r)| u + r).collect();
        if !out.iter().all(|v| v.is_finite()) {
            return Err(FitError::NonFinite);
        }
        Ok(out)
    }
}

fn lag_one_autocorrelation(series: &[f64]) -> f64 {
    let n = series.len();
    if n < 2 {
        return 0.0;
    }
    let mean = series.iter().sum::<f64>() / n as f64;
    let denom: f64 = series.iter().map(|v| (v - mean).powi(2)).sum();
    if denom <= 0.0 {
        return 0.0;
    }
    let num: f64 = series.windows(2).map(|p| (p[0] - mean) * (p[1] - mean)).sum();
    num / denom
}
