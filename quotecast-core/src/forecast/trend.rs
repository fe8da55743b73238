//! Ordinary least squares fit of close against bar index.
//!
//! With a single regressor the normal equations reduce to
//! `slope = Σ(x - x̄)(y - ȳ) / Σ(x - x̄)²` and `intercept = ȳ - slope·x̄`,
//! so no matrix solve is needed.

use crate::domain::TrendLine;

/// Fit `y = intercept + slope * i` over `i = 0..values.len()`.
///
/// Returns `None` for fewer than two points or non-finite input.
pub fn fit_line(values: &[f64]) -> Option<TrendLine> {
    let n = values.len();
    if n < 2 || values.iter().any(|v| !v.is_finite()) {
        return None;
    }

    let n_f = n as f64;
    let x_mean = (n_f - 1.0) / 2.0;
    let y_mean = values.iter().sum::<f64>() / n_f;

    let mut sxy = 0.0;
    let mut sxx = 0.0;
    for (i, &y) in values.iter().enumerate() {
        let dx = i as f64 - x_mean;
        sxy += dx * (y - y_mean);
        sxx += dx * dx;
    }

    let slope = sxy / sxx;
    let intercept = y_mean - slope * x_mean;

    let ss_tot: f64 = values.iter().map(|&y| (y - y_mean).powi(2)).sum();
    let ss_res: f64 = values
        .iter()
        .enumerate()
        .map(|(i, &y)| (y - (intercept + slope * i as f64)).powi(2))
        .sum();
    let r_squared = if ss_tot > 0.0 { 1.0 - ss_res / ss_tot } else { 1.0 };

    Some(TrendLine {
        slope,
        intercept,
        r_squared,
    })
}
