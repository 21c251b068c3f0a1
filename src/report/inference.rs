//! Inference on a fitted censored model.
//!
//! Everything here is a pure function of a `FittedCensoredModel` (plus the
//! dataset when a reduced model must be refit for likelihood-ratio tests).

use nalgebra::DVector;
use serde::Serialize;
use statrs::distribution::{ChiSquared, ContinuousCDF};

use crate::domain::{Dataset, TestKind};
use crate::error::AppError;
use crate::fit::{FittedCensoredModel, INTERCEPT, reduced_log_likelihood};
use crate::math::{norm_quantile, spd_inverse, two_sided_p};

/// Label of the scale parameter row.
pub const LOG_SIGMA: &str = "log(sigma)";

pub const EFFECT_SIZE_CAVEAT: &str = "Effect sizes divide each coefficient by the latent residual SD. \
Heavy censoring inflates them slightly; the bias is negligible when the 70% rule is satisfied.";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoefficientRow {
    pub term: String,
    pub estimate: f64,
    pub std_error: f64,
    pub z_value: f64,
    pub p_value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfidenceInterval {
    pub term: String,
    pub estimate: f64,
    pub lower: f64,
    pub upper: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntervalTable {
    pub level: f64,
    pub rows: Vec<ConfidenceInterval>,
    /// Interval for `sigma`, the exponentiated `log(sigma)` interval.
    pub sigma: ConfidenceInterval,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Type3Test {
    pub term: String,
    pub df: usize,
    pub statistic: f64,
    pub p_value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Type3Table {
    pub kind: TestKind,
    pub tests: Vec<Type3Test>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EffectSize {
    pub term: String,
    pub estimate: f64,
    pub effect_size: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EffectSizes {
    pub sigma: f64,
    pub effects: Vec<EffectSize>,
    pub caveat: String,
}

/// Estimates, standard errors, z statistics and two-sided p-values, with
/// `log(sigma)` as the last row.
pub fn coefficient_table(model: &FittedCensoredModel) -> Vec<CoefficientRow> {
    let se = model.std_errors();
    let names = model.coef_names.iter().map(String::as_str).chain([LOG_SIGMA]);
    let estimates = model.coefficients.iter().copied().chain([model.log_sigma]);
    names
        .zip(estimates)
        .zip(se)
        .map(|((term, estimate), std_error)| {
            let z_value = estimate / std_error;
            CoefficientRow {
                term: term.to_string(),
                estimate,
                std_error,
                z_value,
                p_value: two_sided_p(z_value),
            }
        })
        .collect()
}

/// Wald intervals `estimate ± z·se` at `level`.
pub fn confidence_intervals(model: &FittedCensoredModel, level: f64) -> Result<IntervalTable, AppError> {
    if !(level > 0.0 && level < 1.0) {
        return Err(AppError::usage(format!("Confidence level must lie in (0, 1), got {level}.")));
    }
    let z = norm_quantile(0.5 * (1.0 + level))?;
    let coefficients = coefficient_table(model);

    let mut rows: Vec<ConfidenceInterval> = coefficients
        .iter()
        .map(|c| ConfidenceInterval {
            term: c.term.clone(),
            estimate: c.estimate,
            lower: c.estimate - z * c.std_error,
            upper: c.estimate + z * c.std_error,
        })
        .collect();

    let log_sigma = rows
        .pop()
        .ok_or_else(|| AppError::numeric("Coefficient table is empty."))?;
    let sigma = ConfidenceInterval {
        term: "sigma".to_string(),
        estimate: log_sigma.estimate.exp(),
        lower: log_sigma.lower.exp(),
        upper: log_sigma.upper.exp(),
    };
    rows.push(log_sigma);

    Ok(IntervalTable { level, rows, sigma })
}

/// Type III tests: each term against the model with only that term removed.
pub fn type3_tests(model: &FittedCensoredModel, dataset: &Dataset, kind: TestKind) -> Result<Type3Table, AppError> {
    let mut tests = Vec::with_capacity(model.terms.len());
    for term in &model.terms {
        let df = term.df();
        let statistic = match kind {
            TestKind::Wald => {
                let range = term.range();
                let beta = DVector::from_column_slice(&model.coefficients[range.clone()]);
                let v = model
                    .covariance
                    .view((range.start, range.start), (df, df))
                    .into_owned();
                let v_inv = spd_inverse(&v).ok_or_else(|| {
                    AppError::numeric(format!("Covariance block of `{}` is singular.", term.name))
                })?;
                (beta.transpose() * v_inv * &beta)[(0, 0)]
            }
            TestKind::Lr => {
                let reduced = reduced_log_likelihood(model, dataset, term)?;
                (2.0 * (model.log_likelihood - reduced)).max(0.0)
            }
        };
        if !statistic.is_finite() {
            return Err(AppError::numeric(format!("Non-finite {kind:?} statistic for `{}`.", term.name)));
        }
        let chi2 = ChiSquared::new(df as f64)
            .map_err(|e| AppError::numeric(format!("Chi-squared distribution error: {e}")))?;
        tests.push(Type3Test {
            term: term.name.clone(),
            df,
            statistic,
            p_value: chi2.sf(statistic),
        });
    }
    Ok(Type3Table { kind, tests })
}

/// Standardised coefficients `β / σ` for every non-intercept term.
pub fn effect_sizes(model: &FittedCensoredModel) -> EffectSizes {
    let sigma = model.sigma();
    let effects = model
        .coef_names
        .iter()
        .zip(&model.coefficients)
        .filter(|(name, _)| name.as_str() != INTERCEPT)
        .map(|(name, &estimate)| EffectSize {
            term: name.clone(),
            estimate,
            effect_size: estimate / sigma,
        })
        .collect();
    EffectSizes {
        sigma,
        effects,
        caveat: EFFECT_SIZE_CAVEAT.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::sample::{SampleConfig, generate_sample};
    use crate::domain::{ContrastScheme, FactorTerm, GroupLevels, ModelFormula, OptimizerOptions};
    use crate::fit::{fit_tobit, refit_with_contrasts};
    use approx::assert_relative_eq;

    fn fitted(contrast: ContrastScheme) -> (Dataset, FittedCensoredModel) {
        let config = SampleConfig {
            n_per_group: 50,
            seed: 7,
            ..SampleConfig::default()
        };
        let dataset = generate_sample(&config).unwrap();
        let formula = ModelFormula {
            response: "post".to_string(),
            factor: FactorTerm {
                column: "group".to_string(),
                levels: GroupLevels::new(dataset.distinct_groups(), None).unwrap(),
                contrast,
            },
            covariates: vec!["pre".to_string()],
        };
        let model = fit_tobit(&dataset, &formula, config.bounds, &OptimizerOptions::default()).unwrap();
        (dataset, model)
    }

    #[test]
    fn coefficient_table_ends_with_log_sigma() {
        let (_, model) = fitted(ContrastScheme::Reference);
        let table = coefficient_table(&model);
        assert_eq!(table.len(), model.n_coefficients() + 1);
        let last = table.last().unwrap();
        assert_eq!(last.term, LOG_SIGMA);
        assert_relative_eq!(last.estimate, model.log_sigma);
        assert!(table.iter().all(|r| r.std_error > 0.0 && (0.0..=1.0).contains(&r.p_value)));
    }

    #[test]
    fn wider_level_gives_wider_interval() {
        let (_, model) = fitted(ContrastScheme::Reference);
        let ci90 = confidence_intervals(&model, 0.90).unwrap();
        let ci99 = confidence_intervals(&model, 0.99).unwrap();
        for (a, b) in ci90.rows.iter().zip(&ci99.rows) {
            assert!(b.upper - b.lower > a.upper - a.lower);
            assert!(a.lower < a.estimate && a.estimate < a.upper);
        }
        assert!(ci90.sigma.lower < model.sigma() && model.sigma() < ci90.sigma.upper);
        assert_relative_eq!(ci90.sigma.estimate, model.sigma(), epsilon = 1e-12);
        assert!(confidence_intervals(&model, 1.0).is_err());
    }

    #[test]
    fn effect_size_halves_when_sigma_doubles() {
        let (_, model) = fitted(ContrastScheme::Reference);
        let base = effect_sizes(&model);
        let mut wide = model.clone();
        wide.log_sigma += 2.0_f64.ln();
        let doubled = effect_sizes(&wide);
        assert_eq!(base.effects.len(), model.n_coefficients() - 1);
        for (a, b) in base.effects.iter().zip(&doubled.effects) {
            assert_relative_eq!(b.effect_size, a.effect_size / 2.0, max_relative = 1e-12);
        }
        assert!(!base.caveat.is_empty());
    }

    #[test]
    fn wald_tests_do_not_depend_on_coding() {
        let (dataset, model) = fitted(ContrastScheme::Reference);
        let sdif = refit_with_contrasts(&model, &dataset, ContrastScheme::SuccessiveDifference).unwrap();
        let a = type3_tests(&model, &dataset, TestKind::Wald).unwrap();
        let b = type3_tests(&sdif, &dataset, TestKind::Wald).unwrap();
        assert_eq!(a.tests.len(), 2);
        for (x, y) in a.tests.iter().zip(&b.tests) {
            assert_eq!(x.term, y.term);
            assert_eq!(x.df, y.df);
            assert_relative_eq!(x.statistic, y.statistic, max_relative = 1e-4);
        }
    }

    #[test]
    fn likelihood_ratio_tests_are_non_negative() {
        let (dataset, model) = fitted(ContrastScheme::Reference);
        let lr = type3_tests(&model, &dataset, TestKind::Lr).unwrap();
        assert_eq!(lr.kind, TestKind::Lr);
        assert_eq!(lr.tests[0].df, 2);
        assert!(lr.tests.iter().all(|t| t.statistic >= 0.0 && (0.0..=1.0).contains(&t.p_value)));
    }
}
