//! Residual diagnostics on the response scale.
//!
//! Fitted values are the censored expectation `E[y | x]`, not the latent
//! `xβ`, so residuals live on the same bounded scale as the scores. Because
//! the response is clipped, every residual is confined to the band
//! `[lower - fitted, upper - fitted]`; plotting that band shows the straight
//! diagonal edges that censoring produces.

use serde::Serialize;

use crate::domain::{Bounds, Dataset};
use crate::error::AppError;
use crate::fit::{FittedCensoredModel, build_design};
use crate::math::{norm_cdf, norm_pdf, norm_quantile};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResidualPoint {
    pub row: usize,
    pub group: String,
    pub observed: f64,
    pub linear_predictor: f64,
    pub fitted: f64,
    pub residual: f64,
    pub upper_limit: f64,
    pub lower_limit: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResidualSet {
    /// One point per observation used in the fit, in source-row order.
    pub points: Vec<ResidualPoint>,
    /// `(theoretical quantile, sorted residual)` pairs.
    pub qq: Vec<(f64, f64)>,
    /// Pearson correlation of the QQ pairs.
    pub qq_correlation: f64,
}

impl ResidualSet {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn residuals(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.residual).collect()
    }

    pub fn fitted(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.fitted).collect()
    }
}

/// Expected value of the response clipped to `bounds` when the latent score is
/// `Normal(mu, sigma)`.
pub fn censored_expectation(mu: f64, sigma: f64, bounds: &Bounds) -> f64 {
    let alpha = (bounds.lower - mu) / sigma;
    let beta = (bounds.upper - mu) / sigma;
    let p_lower = norm_cdf(alpha);
    let p_upper = norm_cdf(beta);
    let value = bounds.lower * p_lower
        + bounds.upper * (1.0 - p_upper)
        + mu * (p_upper - p_lower)
        + sigma * (norm_pdf(alpha) - norm_pdf(beta));
    value.clamp(bounds.lower, bounds.upper)
}

/// Plotting positions used for normal probability plots.
pub fn ppoints(n: usize) -> Vec<f64> {
    let a = if n <= 10 { 3.0 / 8.0 } else { 0.5 };
    let nf = n as f64;
    (1..=n).map(|i| (i as f64 - a) / (nf + 1.0 - 2.0 * a)).collect()
}

/// Normal QQ pairs for `values`: standard normal quantiles against the sorted values.
pub fn normal_qq(values: &[f64]) -> Result<Vec<(f64, f64)>, AppError> {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    ppoints(sorted.len())
        .into_iter()
        .zip(sorted)
        .map(|(p, v)| Ok((norm_quantile(p)?, v)))
        .collect()
}

pub fn compute_residuals(model: &FittedCensoredModel, dataset: &Dataset) -> Result<ResidualSet, AppError> {
    let design = build_design(dataset, &model.formula)?;
    if design.rows != model.rows {
        return Err(AppError::data(
            "Dataset rows no longer match the rows used to fit the model.",
        ));
    }

    let sigma = model.sigma();
    let bounds = model.bounds;
    let levels = model.formula.factor.levels.levels();
    let mut points = Vec::with_capacity(design.rows.len());

    for i in 0..design.x.nrows() {
        let x_row: Vec<f64> = design.x.row(i).iter().copied().collect();
        let mu = model.linear_predictor(&x_row);
        let fitted = censored_expectation(mu, sigma, &bounds);
        let observed = design.y[i];
        if !fitted.is_finite() {
            return Err(AppError::numeric(format!(
                "Line {}: fitted value is not finite (mu={mu}, sigma={sigma}).",
                design.rows[i]
            )));
        }
        points.push(ResidualPoint {
            row: design.rows[i],
            group: levels[design.level_of_row[i]].clone(),
            observed,
            linear_predictor: mu,
            fitted,
            residual: observed - fitted,
            upper_limit: bounds.upper - fitted,
            lower_limit: bounds.lower - fitted,
        });
    }

    let residuals: Vec<f64> = points.iter().map(|p| p.residual).collect();
    let qq = normal_qq(&residuals)?;
    let qq_correlation = correlation(&qq);

    Ok(ResidualSet {
        points,
        qq,
        qq_correlation,
    })
}

fn correlation(pairs: &[(f64, f64)]) -> f64 {
    let n = pairs.len() as f64;
    if pairs.len() < 2 {
        return f64::NAN;
    }
    let mx = pairs.iter().map(|p| p.0).sum::<f64>() / n;
    let my = pairs.iter().map(|p| p.1).sum::<f64>() / n;
    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (x, y) in pairs {
        sxy += (x - mx) * (y - my);
        sxx += (x - mx).powi(2);
        syy += (y - my).powi(2);
    }
    sxy / (sxx * syy).sqrt()
}
