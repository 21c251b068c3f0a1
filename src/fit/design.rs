//! Design-matrix construction for `response ~ group + covariates`.
//!
//! Column layout: intercept, then the group contrast columns (k-1 of them),
//! then one column per continuous covariate. Rows are the observations with a
//! non-missing response and non-missing covariates, in dataset order.

use nalgebra::{DMatrix, DVector};
use serde::Serialize;

use crate::domain::{ContrastScheme, Dataset, GroupLevels, ModelFormula};
use crate::error::AppError;
use crate::math::matrix_rank;

/// Name of the intercept coefficient.
pub const INTERCEPT: &str = "(Intercept)";

/// Contiguous block of design columns owned by one explanatory term.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TermColumns {
    pub name: String,
    pub start: usize,
    pub end: usize,
}

impl TermColumns {
    pub fn range(&self) -> std::ops::Range<usize> {
        self.start..self.end
    }

    pub fn df(&self) -> usize {
        self.end - self.start
    }
}

#[derive(Debug, Clone)]
pub struct Design {
    pub x: DMatrix<f64>,
    pub y: DVector<f64>,
    /// Source row of each design row.
    pub rows: Vec<usize>,
    /// Level index of each design row.
    pub level_of_row: Vec<usize>,
    pub coef_names: Vec<String>,
    pub terms: Vec<TermColumns>,
    /// Observations with a response but a missing covariate.
    pub n_excluded: usize,
}

/// `k × (k-1)` contrast matrix for the declared level order.
///
/// - reference: indicator columns for each non-reference level
/// - successive difference: column `j` holds `-(k-j)/k` for levels `0..=j-1`
///   and `j/k` for the rest (1-based `j`), so coefficient `j` is
///   `mean(level j) - mean(level j-1)` and the intercept is the mean of the
///   level means
pub fn contrast_matrix(levels: &GroupLevels, scheme: ContrastScheme) -> DMatrix<f64> {
    let k = levels.len();
    let mut c = DMatrix::zeros(k, k.saturating_sub(1));
    match scheme {
        ContrastScheme::Reference => {
            let reference = levels.reference_index();
            let non_ref: Vec<usize> = (0..k).filter(|&i| i != reference).collect();
            for (col, &level) in non_ref.iter().enumerate() {
                c[(level, col)] = 1.0;
            }
        }
        ContrastScheme::SuccessiveDifference => {
            let kf = k as f64;
            for col in 0..k.saturating_sub(1) {
                let j = (col + 1) as f64;
                for row in 0..k {
                    c[(row, col)] = if row <= col { -(kf - j) / kf } else { j / kf };
                }
            }
        }
    }
    c
}

/// Coefficient names in column order.
pub fn coefficient_names(formula: &ModelFormula) -> Vec<String> {
    let factor = &formula.factor;
    let levels = factor.levels.levels();
    let mut names = vec![INTERCEPT.to_string()];
    match factor.contrast {
        ContrastScheme::Reference => {
            let reference = factor.levels.reference_index();
            for (i, level) in levels.iter().enumerate() {
                if i != reference {
                    names.push(format!("{}{}", factor.column, level));
                }
            }
        }
        ContrastScheme::SuccessiveDifference => {
            for pair in levels.windows(2) {
                names.push(format!("{}{}-{}", factor.column, pair[1], pair[0]));
            }
        }
    }
    names.extend(formula.covariates.iter().cloned());
    names
}

/// Build the design for `formula` over the usable rows of `dataset`.
///
/// Fails on unknown group labels, too few rows, or a rank-deficient design.
pub fn build_design(dataset: &Dataset, formula: &ModelFormula) -> Result<Design, AppError> {
    let levels = &formula.factor.levels;
    let k = levels.len();
    let contrasts = contrast_matrix(levels, formula.factor.contrast);
    let n_cov = formula.covariates.len();
    let p = 1 + (k - 1) + n_cov;

    let mut data = Vec::new();
    let mut y = Vec::new();
    let mut rows = Vec::new();
    let mut level_of_row = Vec::new();
    let mut n_excluded = 0usize;

    'obs: for obs in &dataset.observations {
        let Some(response) = obs.post_score else {
            continue;
        };
        let level = levels.index_of(&obs.group).ok_or_else(|| {
            AppError::data(format!(
                "Line {}: group `{}` is not a declared level of `{}`.",
                obs.row, obs.group, formula.factor.column
            ))
        })?;
        let mut covs = Vec::with_capacity(n_cov);
        for name in &formula.covariates {
            match dataset.covariate(obs, name)? {
                Some(v) => covs.push(v),
                None => {
                    n_excluded += 1;
                    continue 'obs;
                }
            }
        }

        data.push(1.0);
        data.extend(contrasts.row(level).iter().copied());
        data.extend(covs);
        y.push(response);
        rows.push(obs.row);
        level_of_row.push(level);
    }

    let n = y.len();
    if n_excluded > 0 {
        tracing::warn!(n_excluded, "rows with a missing covariate excluded from the fit");
    }
    if n < p + 1 {
        return Err(AppError::data(format!(
            "Too few usable rows for `{formula}`: n={n} but the model has {p} coefficients."
        )));
    }

    let x = DMatrix::from_row_slice(n, p, &data);
    let rank = matrix_rank(&x);
    if rank < p {
        let empty: Vec<&str> = levels
            .levels()
            .iter()
            .enumerate()
            .filter(|(i, _)| !level_of_row.contains(i))
            .map(|(_, l)| l.as_str())
            .collect();
        let hint = if empty.is_empty() {
            String::new()
        } else {
            format!(" Levels without usable rows: {}.", empty.join(", "))
        };
        return Err(AppError::data(format!(
            "Rank-deficient design for `{formula}`: rank {rank} < {p} columns.{hint}"
        )));
    }

    let mut terms = Vec::new();
    if k > 1 {
        terms.push(TermColumns {
            name: formula.factor.column.clone(),
            start: 1,
            end: k,
        });
    }
    for (i, name) in formula.covariates.iter().enumerate() {
        terms.push(TermColumns {
            name: name.clone(),
            start: k + i,
            end: k + i + 1,
        });
    }

    Ok(Design {
        x,
        y: DVector::from_vec(y),
        rows,
        level_of_row,
        coef_names: coefficient_names(formula),
        terms,
        n_excluded,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ColumnNames, FactorTerm, Observation};

    fn levels(names: &[&str]) -> GroupLevels {
        GroupLevels::new(names.iter().map(|s| s.to_string()).collect(), None).unwrap()
    }

    fn formula(names: &[&str], scheme: ContrastScheme, covariates: &[&str]) -> ModelFormula {
        ModelFormula {
            response: "post".to_string(),
            factor: FactorTerm {
                column: "group".to_string(),
                levels: levels(names),
                contrast: scheme,
            },
            covariates: covariates.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn successive_difference_rows_differ_by_unit_steps() {
        let c = contrast_matrix(&levels(&["A", "B", "C", "D"]), ContrastScheme::SuccessiveDifference);
        assert_eq!(c.shape(), (4, 3));
        for level in 0..3 {
            for col in 0..3 {
                let step = c[(level + 1, col)] - c[(level, col)];
                let expected = if col == level { 1.0 } else { 0.0 };
                assert!((step - expected).abs() < 1e-12);
            }
        }
        // Columns sum to zero so the intercept is the mean of level means.
        for col in 0..3 {
            assert!(c.column(col).sum().abs() < 1e-12);
        }
    }

    #[test]
    fn reference_contrast_respects_reference_level() {
        let lv = GroupLevels::new(vec!["A".into(), "B".into(), "C".into()], Some("B")).unwrap();
        let c = contrast_matrix(&lv, ContrastScheme::Reference);
        assert_eq!(c.row(1).sum(), 0.0);
        assert_eq!(c[(0, 0)], 1.0);
        assert_eq!(c[(2, 1)], 1.0);
    }

    #[test]
    fn coefficient_names_follow_scheme() {
        let f = formula(&["A", "B", "C"], ContrastScheme::Reference, &["pre"]);
        assert_eq!(coefficient_names(&f), vec!["(Intercept)", "groupB", "groupC", "pre"]);
        let f = formula(&["A", "B", "C"], ContrastScheme::SuccessiveDifference, &[]);
        assert_eq!(coefficient_names(&f), vec!["(Intercept)", "groupB-A", "groupC-B"]);
    }

    fn dataset(rows: &[(&str, Option<f64>, Option<f64>)]) -> Dataset {
        let observations = rows
            .iter()
            .enumerate()
            .map(|(i, (g, pre, post))| Observation {
                row: i + 2,
                group: g.to_string(),
                pre_score: *pre,
                post_score: *post,
                extra: Vec::new(),
            })
            .collect();
        Dataset::new(ColumnNames::default(), observations)
    }

    #[test]
    fn design_skips_missing_rows_and_records_terms() {
        let ds = dataset(&[
            ("A", Some(1.0), Some(3.0)),
            ("A", Some(2.0), None),
            ("B", None, Some(4.0)),
            ("B", Some(3.0), Some(6.0)),
            ("A", Some(4.0), Some(5.0)),
            ("B", Some(5.0), Some(9.0)),
        ]);
        let d = build_design(&ds, &formula(&["A", "B"], ContrastScheme::Reference, &["pre"])).unwrap();
        assert_eq!(d.x.shape(), (4, 3));
        assert_eq!(d.rows, vec![2, 5, 6, 7]);
        assert_eq!(d.n_excluded, 1);
        assert_eq!(d.terms.len(), 2);
        assert_eq!(d.terms[0].range(), 1..2);
        assert_eq!(d.terms[1].name, "pre");
    }

    #[test]
    fn empty_declared_level_is_rank_deficient() {
        let ds = dataset(&[
            ("A", Some(1.0), Some(3.0)),
            ("A", Some(2.0), Some(4.0)),
            ("B", Some(3.0), Some(6.0)),
            ("B", Some(4.0), Some(5.0)),
            ("A", Some(5.0), Some(7.0)),
        ]);
        let err = build_design(&ds, &formula(&["A", "B", "C"], ContrastScheme::Reference, &["pre"])).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Data);
        assert!(err.message().contains("Rank-deficient"), "{err}");
        assert!(err.message().contains("C"), "{err}");
    }
}
