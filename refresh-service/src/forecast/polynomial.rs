//! Lag-operator polynomials.
//!
//! A polynomial is stored as its coefficient vector indexed by lag, with the
//! lag-0 coefficient first: `[1.0, -0.5]` is `1 - 0.5L`.

/// Product of two lag polynomials.
pub fn multiply(a: &[f64], b: &[f64]) -> Vec<f64> {
    if a.is_empty() || b.is_empty() {
        return Vec::new();
    }

    let mut out = vec![0.0; a.len() + b.len() - 1];
    for (i, x) in a.iter().enumerate() {
        for (j, y) in b.iter().enumerate() {
            out[i + j] += x * y;
        }
    }
    out
}

/// `1 - c1 L^s - c2 L^2s - ...`, the autoregressive form.
pub fn autoregressive(coefficients: &[f64], step: usize) -> Vec<f64> {
    lagged(coefficients, step, -1.0)
}

/// `1 + c1 L^s + c2 L^2s + ...`, the moving-average form.
pub fn moving_average(coefficients: &[f64], step: usize) -> Vec<f64> {
    lagged(coefficients, step, 1.0)
}

fn lagged(coefficients: &[f64], step: usize, sign: f64) -> Vec<f64> {
    let step = step.max(1);
    let mut out = vec![0.0; coefficients.len() * step + 1];
    out[0] = 1.0;
    for (i, c) in coefficients.iter().enumerate() {
        out[(i + 1) * step] = sign * c;
    }
    out
}

/// `(1 - L)^d (1 - L^s)^D`.
pub fn differencing(d: usize, seasonal_d: usize, period: usize) -> Vec<f64> {
    let mut out = vec![1.0];
    for _ in 0..d {
        out = multiply(&out, &[1.0, -1.0]);
    }
    for _ in 0..seasonal_d {
        out = multiply(&out, &autoregressive(&[1.0], period));
    }
    out
}

/// Highest lag with a coefficient.
pub fn degree(poly: &[f64]) -> usize {
    poly.len().saturating_sub(1)
}

/// Apply `poly` to `series`: `out[t] = sum_k poly[k] * series[t + deg - k]`.
///
/// The first `deg` observations only serve as lags, so the output is
/// `deg` shorter than the input.
pub fn apply(poly: &[f64], series: &[f64]) -> Vec<f64> {
    let deg = degree(poly);
    if series.len() <= deg {
        return Vec::new();
    }

    (deg..series.len())
        .map(|t| poly.iter().enumerate().map(|(k, c)| c * series[t - k]).sum::<f64>())
        .collect()
}

/// Undo [`apply`] for a differencing polynomial.
///
/// `history` holds the original-scale values already known; each value of
/// `differenced` extends it by one step. Returns only the new values.
pub fn integrate(poly: &[f64], history: &[f64], differenced: &[f64]) -> Vec<f64> {
    let mut levels = history.to_vec();
    for w in differenced {
        let t = levels.len();
        let carried: f64 = poly
            .iter()
            .enumerate()
            .skip(1)
            .filter(|(k, _)| *k <= t)
            .map(|(k, c)| c * levels[t - k])
            .sum();
        levels.push(w - carried);
    }
    levels.split_off(history.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn differencing_expands_regular_and_seasonal_terms() {
        let poly = differencing(2, 1, 12);
        assert_eq!(degree(&poly), 14);
        assert_eq!(poly[0], 1.0);
        assert_eq!(poly[1], -2.0);
        assert_eq!(poly[2], 1.0);
        assert_eq!(poly[12], -1.0);
        assert_eq!(poly[13], 2.0);
        assert_eq!(poly[14], -1.0);
        assert_eq!(poly.iter().sum::<f64>(), 0.0);
    }

    #[test]
    fn seasonal_ma_places_coefficients_on_multiples_of_period() {
        let poly = moving_average(&[0.3, -0.2], 12);
        assert_eq!(poly.len(), 25);
        assert_eq!(poly[12], 0.3);
        assert_eq!(poly[24], -0.2);
        assert_eq!(poly[1], 0.0);
    }

    #[test]
    fn apply_then_integrate_recovers_series() {
        let series: Vec<f64> = (0..40).map(|t| (t * t) as f64 + (t % 12) as f64).collect();
        let poly = differencing(2, 1, 12);

        let diffed = apply(&poly, &series);
        assert_eq!(diffed.len(), series.len() - 14);

        let head = &series[..14];
        let rebuilt = integrate(&poly, head, &diffed);
        assert_eq!(rebuilt, series[14..].to_vec());
    }

    #[test]
    fn first_difference_of_linear_trend_is_constant() {
        let diffed = apply(&[1.0, -1.0], &[1.0, 3.0, 5.0, 7.0]);
        assert_eq!(diffed, vec![2.0, 2.0, 2.0]);
    }
}
