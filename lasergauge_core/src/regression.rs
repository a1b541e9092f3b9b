//! Polynomial least squares with cross-validated order selection.
//!
//! The feature expansion of a scalar `x` at degree `d` is `[1, x, x^2, .., x^d]`.
//! Fitting centres the features and the target, so the constant feature
//! always receives a zero coefficient and the offset lives in `intercept`.
//! Rank-deficient systems resolve to the minimum-norm solution.

use nalgebra::{DMatrix, DVector};

use crate::error::{GaugeError, Result};
use crate::model::{CalibrationSample, PolynomialModel};

/// Fewest samples a calibration curve is fitted from.
pub const MIN_SAMPLES: usize = 3;

/// Folds used for cross-validation; capped by the sample count.
pub const CV_FOLDS: usize = 5;

/// Cross-validation score of one candidate degree.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DegreeScore {
    pub degree: usize,
    pub cv_mse: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModelSelection {
    /// Chosen degree refitted on every sample; `mse` is its CV score.
    pub model: PolynomialModel,
    pub scores: Vec<DegreeScore>,
}

/// Ordinary least squares of `y` on the polynomial expansion of `x`.
///
/// Returns `(coefficients, intercept)` with `coefficients.len() == degree + 1`
/// and `coefficients[0] == 0.0`.
pub fn fit_polynomial(x: &[f64], y: &[f64], degree: usize) -> Result<(Vec<f64>, f64)> {
    let n = x.len();
    if n == 0 || n != y.len() {
        return Err(eyre::eyre!(
            "polynomial fit needs equally sized, non-empty inputs ({} x, {} y)",
            x.len(),
            y.len()
        ));
    }
    if degree == 0 {
        let mean = y.iter().sum::<f64>() / n as f64;
        return Ok((vec![0.0], mean));
    }

    let mut a = DMatrix::<f64>::from_fn(n, degree, |r, c| x[r].powi(c as i32 + 1));
    let y_mean = y.iter().sum::<f64>() / n as f64;
    let mut col_means = vec![0.0; degree];
    let mut col_scale = vec![1.0; degree];
    for c in 0..degree {
        let mut col = a.column_mut(c);
        let mean = col.mean();
        col.add_scalar_mut(-mean);
        let norm = col.norm();
        // Equilibrate columns; x^6 and x differ by many orders of magnitude.
        if norm > 0.0 && norm.is_finite() {
            col /= norm;
            col_scale[c] = norm;
        }
        col_means[c] = mean;
    }
    let b = DVector::from_iterator(n, y.iter().map(|v| v - y_mean));

    let svd = a.svd(true, true);
    let max_sv = svd.singular_values.iter().copied().fold(0.0f64, f64::max);
    let eps = max_sv * n.max(degree) as f64 * f64::EPSILON;
    let scaled = svd
        .solve(&b, eps)
        .map_err(|e| eyre::eyre!("least-squares solve failed: {e}"))?;

    let mut coefficients = Vec::with_capacity(degree + 1);
    coefficients.push(0.0);
    let mut intercept = y_mean;
    for c in 0..degree {
        let coef = scaled[c] / col_scale[c];
        intercept -= coef * col_means[c];
        coefficients.push(coef);
    }
    if coefficients.iter().any(|c| !c.is_finite()) || !intercept.is_finite() {
        return Err(eyre::eyre!("polynomial fit of degree {degree} is not finite"));
    }
    Ok((coefficients, intercept))
}

/// Evaluate `intercept + sum(coefficients[k] * x^k)`.
#[inline]
pub fn evaluate(coefficients: &[f64], intercept: f64, x: f64) -> f64 {
    coefficients
        .iter()
        .rev()
        .fold(0.0, |acc, c| acc * x + c)
        + intercept
}

/// Contiguous, unshuffled fold boundaries; the first `n % k` folds hold one
/// extra sample.
fn fold_ranges(n: usize, k: usize) -> Vec<std::ops::Range<usize>> {
    let base = n / k;
    let extra = n % k;
    let mut start = 0;
    (0..k)
        .map(|i| {
            let len = base + usize::from(i < extra);
            let r = start..start + len;
            start += len;
            r
        })
        .collect()
}

/// Mean of per-fold test MSE over `min(CV_FOLDS, n)` folds.
pub fn cross_val_mse(x: &[f64], y: &[f64], degree: usize) -> Result<f64> {
    let n = x.len();
    let k = CV_FOLDS.min(n);
    if k < 2 {
        return Err(eyre::eyre!("cross-validation needs at least 2 samples, got {n}"));
    }
    let mut total = 0.0;
    for test in fold_ranges(n, k) {
        let (train_x, train_y): (Vec<f64>, Vec<f64>) = (0..n)
            .filter(|i| !test.contains(i))
            .map(|i| (x[i], y[i]))
            .unzip();
        let (coef, intercept) = fit_polynomial(&train_x, &train_y, degree)?;
        let sq: f64 = test
            .clone()
            .map(|i| {
                let e = evaluate(&coef, intercept, x[i]) - y[i];
                e * e
            })
            .sum();
        total += sq / test.len() as f64;
    }
    Ok(total / k as f64)
}

/// Search degrees `1..=max_degree` for the lowest CV-MSE mapping
/// pixel delta to height. Ties keep the lower degree.
pub fn pick_best_model(samples: &[CalibrationSample], max_degree: usize) -> Result<ModelSelection> {
    if samples.len() < MIN_SAMPLES {
        return Err(GaugeError::InsufficientCalibrationData { got: samples.len() }.report());
    }
    let x: Vec<f64> = samples.iter().map(|s| s.pixel_delta).collect();
    let y: Vec<f64> = samples.iter().map(|s| s.height_mm).collect();

    let mut scores = Vec::with_capacity(max_degree);
    let mut best: Option<DegreeScore> = None;
    for degree in 1..=max_degree.max(1) {
        let cv_mse = match cross_val_mse(&x, &y, degree) {
            Ok(v) if v.is_finite() => v,
            Ok(_) | Err(_) => {
                tracing::debug!(degree, "degree skipped: no finite CV score");
                continue;
            }
        };
        tracing::debug!(degree, cv_mse, "cross-validated");
        let score = DegreeScore { degree, cv_mse };
        scores.push(score);
        if best.is_none_or(|b| cv_mse < b.cv_mse) {
            best = Some(score);
        }
    }

    let best = best.ok_or_else(|| eyre::eyre!("no polynomial degree produced a finite score"))?;
    let (coefficients, intercept) = fit_polynomial(&x, &y, best.degree)?;
    tracing::info!(degree = best.degree, cv_mse = best.cv_mse, "calibration model selected");
    Ok(ModelSelection {
        model: PolynomialModel {
            degree: best.degree,
            coefficients,
            intercept,
            mse: best.cv_mse,
        },
        scores,
    })
}
