//! Ordinary least squares ANOVA/ANCOVA for the uncensored path.
//!
//! When the 30-20 rule holds, a linear model on the observed scores is
//! acceptable. We report a coefficient table (t statistics) and Type III F
//! tests, each term tested against the model with only that term removed.

use serde::Serialize;
use statrs::distribution::{ContinuousCDF, FisherSnedecor, StudentsT};

use crate::domain::{Dataset, ModelFormula};
use crate::error::AppError;
use crate::fit::design::build_design;
use crate::math::{drop_columns, solve_least_squares, spd_inverse, sse};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinearCoefficient {
    pub term: String,
    pub estimate: f64,
    pub std_error: f64,
    pub t_value: f64,
    pub p_value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FTest {
    pub term: String,
    pub sum_sq: f64,
    pub df: usize,
    pub f_value: f64,
    pub p_value: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct LinearFit {
    pub formula: String,
    pub coefficients: Vec<LinearCoefficient>,
    pub type3: Vec<FTest>,
    pub sse: f64,
    pub df_resid: usize,
    pub sigma: f64,
    pub r_squared: f64,
    pub n_used: usize,
}

pub fn fit_linear(dataset: &Dataset, formula: &ModelFormula) -> Result<LinearFit, AppError> {
    let design = build_design(dataset, formula)?;
    let n = design.x.nrows();
    let p = design.x.ncols();
    let df_resid = n - p;

    let beta = solve_least_squares(&design.x, &design.y)
        .ok_or_else(|| AppError::numeric(format!("Least squares solve failed for `{formula}`.")))?;
    let sse_full = sse(&design.x, &design.y, &beta);
    let sigma2 = sse_full / df_resid as f64;

    let xtx = design.x.transpose() * &design.x;
    let xtx_inv = spd_inverse(&xtx).ok_or_else(|| AppError::numeric("X'X is singular."))?;

    let t_dist = StudentsT::new(0.0, 1.0, df_resid as f64)
        .map_err(|e| AppError::numeric(format!("Student-t distribution error: {e}")))?;

    let coefficients = design
        .coef_names
        .iter()
        .enumerate()
        .map(|(j, name)| {
            let se = (sigma2 * xtx_inv[(j, j)]).max(0.0).sqrt();
            let t = beta[j] / se;
            let p_value = if t.is_finite() { 2.0 * t_dist.cdf(-t.abs()) } else { f64::NAN };
            LinearCoefficient {
                term: name.clone(),
                estimate: beta[j],
                std_error: se,
                t_value: t,
                p_value,
            }
        })
        .collect();

    let mut type3 = Vec::with_capacity(design.terms.len());
    for term in &design.terms {
        let reduced = drop_columns(&design.x, term.range());
        let beta_r = solve_least_squares(&reduced, &design.y).ok_or_else(|| {
            AppError::numeric(format!("Least squares solve failed without term `{}`.", term.name))
        })?;
        let sum_sq = (sse(&reduced, &design.y, &beta_r) - sse_full).max(0.0);
        let df = term.df();
        let f_value = (sum_sq / df as f64) / sigma2;
        let p_value = if f_value.is_finite() && df_resid > 0 {
            FisherSnedecor::new(df as f64, df_resid as f64)
                .map(|d| d.sf(f_value))
                .map_err(|e| AppError::numeric(format!("F distribution error: {e}")))?
        } else {
            f64::NAN
        };
        type3.push(FTest {
            term: term.name.clone(),
            sum_sq,
            df,
            f_value,
            p_value,
        });
    }

    let mean = design.y.mean();
    let sst = design.y.iter().map(|v| (v - mean).powi(2)).sum::<f64>();
    let r_squared = if sst > 0.0 { 1.0 - sse_full / sst } else { f64::NAN };

    Ok(LinearFit {
        formula: formula.to_string(),
        coefficients,
        type3,
        sse: sse_full,
        df_resid,
        sigma: sigma2.sqrt(),
        r_squared,
        n_used: n,
    })
}
