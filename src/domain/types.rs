//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so they can be:
//!
//! - used in-memory during diagnostics and fitting
//! - exported to JSON/CSV
//! - parsed directly from CLI flags (`ValueEnum`)

use std::path::PathBuf;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Absolute tolerance used when deciding whether a score sits exactly on a bound.
pub const BOUND_TOL: f64 = 1e-9;

/// Which end of the score scale a computation refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BoundSide {
    Ceiling,
    Floor,
}

impl BoundSide {
    pub fn label(self) -> &'static str {
        match self {
            BoundSide::Ceiling => "ceiling",
            BoundSide::Floor => "floor",
        }
    }
}

/// Which bound(s) the ceiling/floor rules are evaluated at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BoundConcern {
    Ceiling,
    Floor,
    Both,
}

impl BoundConcern {
    pub fn sides(self) -> &'static [BoundSide] {
        match self {
            BoundConcern::Ceiling => &[BoundSide::Ceiling],
            BoundConcern::Floor => &[BoundSide::Floor],
            BoundConcern::Both => &[BoundSide::Ceiling, BoundSide::Floor],
        }
    }
}

/// Parameterization of the categorical group coefficients.
///
/// The two schemes span the same column space, so fitted values and the
/// log-likelihood do not depend on the choice; the coefficients and their
/// standard errors do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ContrastScheme {
    /// Treatment coding: each coefficient is the difference from the reference level.
    Reference,
    /// Successive differences: each coefficient is the difference from the
    /// immediately preceding level in the declared order.
    #[value(name = "sdif")]
    #[serde(rename = "sdif")]
    SuccessiveDifference,
}

impl ContrastScheme {
    pub fn other(self) -> Self {
        match self {
            ContrastScheme::Reference => ContrastScheme::SuccessiveDifference,
            ContrastScheme::SuccessiveDifference => ContrastScheme::Reference,
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            ContrastScheme::Reference => "reference",
            ContrastScheme::SuccessiveDifference => "successive-difference",
        }
    }
}

/// Which Type III test to report for each term.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TestKind {
    /// Wald chi-square from the parameter covariance matrix.
    Wald,
    /// Likelihood-ratio chi-square against a refit without the term.
    Lr,
}

/// Closed score interval `[lower, upper]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub lower: f64,
    pub upper: f64,
}

impl Bounds {
    pub fn new(lower: f64, upper: f64) -> Result<Self, AppError> {
        if !(lower.is_finite() && upper.is_finite()) {
            return Err(AppError::usage(format!(
                "Score bounds must be finite (got lower={lower}, upper={upper})."
            )));
        }
        if lower >= upper {
            return Err(AppError::usage(format!(
                "Lower bound must be below upper bound (got lower={lower}, upper={upper})."
            )));
        }
        Ok(Self { lower, upper })
    }

    pub fn value(&self, side: BoundSide) -> f64 {
        match side {
            BoundSide::Ceiling => self.upper,
            BoundSide::Floor => self.lower,
        }
    }

    pub fn contains(&self, y: f64) -> bool {
        y >= self.lower - BOUND_TOL && y <= self.upper + BOUND_TOL
    }

    pub fn is_at_lower(&self, y: f64) -> bool {
        (y - self.lower).abs() <= BOUND_TOL
    }

    pub fn is_at_upper(&self, y: f64) -> bool {
        (y - self.upper).abs() <= BOUND_TOL
    }
}

/// Rule limits for the ceiling/floor heuristics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RuleThresholds {
    /// 30-20 rule: maximum per-group proportion at the bound.
    pub group_limit: f64,
    /// 30-20 rule: maximum difference in proportions between any two groups.
    pub spread_limit: f64,
    /// 70% rule: maximum per-group proportion at the bound for a censored model.
    pub censored_limit: f64,
}

impl Default for RuleThresholds {
    fn default() -> Self {
        Self {
            group_limit: 0.30,
            spread_limit: 0.20,
            censored_limit: 0.70,
        }
    }
}

/// Newton-Raphson stopping rules.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OptimizerOptions {
    pub max_iter: usize,
    /// Converged once the largest absolute score component falls below this.
    pub gradient_tol: f64,
}

impl Default for OptimizerOptions {
    fn default() -> Self {
        Self {
            max_iter: 100,
            gradient_tol: 1e-6,
        }
    }
}

/// Declared ordering of the group factor plus its reference level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupLevels {
    levels: Vec<String>,
    reference: usize,
}

impl GroupLevels {
    /// Build from an explicit ordering; the reference defaults to the first level.
    pub fn new(levels: Vec<String>, reference: Option<&str>) -> Result<Self, AppError> {
        if levels.is_empty() {
            return Err(AppError::data("The group factor has no levels."));
        }
        for (i, level) in levels.iter().enumerate() {
            if levels[..i].contains(level) {
                return Err(AppError::usage(format!("Duplicate group level `{level}`.")));
            }
        }
        let reference = match reference {
            None => 0,
            Some(name) => levels.iter().position(|l| l == name).ok_or_else(|| {
                AppError::usage(format!(
                    "Reference level `{name}` is not one of the declared levels [{}].",
                    levels.join(", ")
                ))
            })?,
        };
        Ok(Self { levels, reference })
    }

    pub fn levels(&self) -> &[String] {
        &self.levels
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    pub fn reference_index(&self) -> usize {
        self.reference
    }

    pub fn reference(&self) -> &str {
        &self.levels[self.reference]
    }

    pub fn index_of(&self, label: &str) -> Option<usize> {
        self.levels.iter().position(|l| l == label)
    }
}

/// The categorical explanatory term of a model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactorTerm {
    pub column: String,
    pub levels: GroupLevels,
    pub contrast: ContrastScheme,
}

/// Structured model specification: `response ~ factor + covariates...`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelFormula {
    pub response: String,
    pub factor: FactorTerm,
    pub covariates: Vec<String>,
}

impl ModelFormula {
    /// Same formula with the factor re-coded under `scheme`.
    pub fn with_contrast(&self, scheme: ContrastScheme) -> Self {
        let mut out = self.clone();
        out.factor.contrast = scheme;
        out
    }
}

impl std::fmt::Display for ModelFormula {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ~ {}", self.response, self.factor.column)?;
        for c in &self.covariates {
            write!(f, " + {c}")?;
        }
        Ok(())
    }
}

/// Input column names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnNames {
    pub group: String,
    pub pre: String,
    pub post: String,
}

impl Default for ColumnNames {
    fn default() -> Self {
        Self {
            group: "group".to_string(),
            pre: "pre".to_string(),
            post: "post".to_string(),
        }
    }
}

/// Fully resolved configuration of one analysis run.
#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    pub data_path: PathBuf,
    pub delimiter: u8,
    pub columns: ColumnNames,
    /// Additional numeric covariate columns beyond the pre-score.
    pub extra_covariates: Vec<String>,
    pub use_pre_covariate: bool,

    pub bounds: Bounds,
    pub near_window: f64,
    pub concern: BoundConcern,
    pub thresholds: RuleThresholds,

    pub levels: Option<Vec<String>>,
    pub reference: Option<String>,
    pub contrast: ContrastScheme,
    pub compare_contrasts: bool,
    pub also_censored: bool,

    pub confidence: f64,
    pub test_kind: TestKind,
    pub optimizer: OptimizerOptions,

    pub plot: bool,
    pub plot_width: usize,
    pub plot_height: usize,
    pub export_residuals: Option<PathBuf>,
    pub export_report: Option<PathBuf>,
}

impl AnalysisConfig {
    /// Covariate column names in design order.
    pub fn covariate_names(&self) -> Vec<String> {
        let mut out = Vec::new();
        if self.use_pre_covariate {
            out.push(self.columns.pre.clone());
        }
        out.extend(self.extra_covariates.iter().cloned());
        out
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if !(self.confidence > 0.0 && self.confidence < 1.0) {
            return Err(AppError::usage(format!(
                "Confidence level must lie in (0, 1), got {}.",
                self.confidence
            )));
        }
        if !(self.near_window.is_finite() && self.near_window >= 0.0) {
            return Err(AppError::usage("Near-bound window must be finite and >= 0."));
        }
        if self.optimizer.max_iter == 0 {
            return Err(AppError::usage("Iteration budget must be > 0."));
        }
        let t = &self.thresholds;
        for (name, v) in [
            ("group limit", t.group_limit),
            ("spread limit", t.spread_limit),
            ("censored limit", t.censored_limit),
        ] {
            if !(0.0..=1.0).contains(&v) {
                return Err(AppError::usage(format!("Rule {name} must lie in [0, 1], got {v}.")));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounds_reject_inverted_interval() {
        assert!(Bounds::new(20.0, 0.0).is_err());
        assert!(Bounds::new(5.0, 5.0).is_err());
        assert!(Bounds::new(f64::NAN, 1.0).is_err());
        let b = Bounds::new(0.0, 20.0).unwrap();
        assert_eq!(b.value(BoundSide::Ceiling), 20.0);
        assert_eq!(b.value(BoundSide::Floor), 0.0);
        assert!(b.is_at_upper(20.0));
        assert!(!b.is_at_upper(19.5));
        assert!(!b.contains(20.5));
    }

    #[test]
    fn group_levels_resolve_reference() {
        let levels = GroupLevels::new(
            vec!["ctrl".to_string(), "low".to_string(), "high".to_string()],
            Some("low"),
        )
        .unwrap();
        assert_eq!(levels.reference_index(), 1);
        assert_eq!(levels.reference(), "low");
        assert_eq!(levels.index_of("high"), Some(2));
        assert!(GroupLevels::new(vec!["a".to_string()], Some("b")).is_err());
        assert!(GroupLevels::new(vec!["a".to_string(), "a".to_string()], None).is_err());
    }

    #[test]
    fn formula_display_lists_terms() {
        let formula = ModelFormula {
            response: "post".to_string(),
            factor: FactorTerm {
                column: "group".to_string(),
                levels: GroupLevels::new(vec!["A".to_string(), "B".to_string()], None).unwrap(),
                contrast: ContrastScheme::Reference,
            },
            covariates: vec!["pre".to_string()],
        };
        assert_eq!(formula.to_string(), "post ~ group + pre");
        assert_eq!(
            formula.with_contrast(ContrastScheme::SuccessiveDifference).factor.contrast,
            ContrastScheme::SuccessiveDifference
        );
    }
}
