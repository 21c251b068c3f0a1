//! In-memory subject table.
//!
//! The dataset is loaded once and treated as read-only by every later stage.
//! Rows with a missing post-score stay in the table (so row numbers remain
//! meaningful in reports) and are skipped by group computations and fits.

use serde::{Deserialize, Serialize};

use crate::domain::{ColumnNames, GroupLevels};
use crate::error::AppError;

/// One subject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// 1-based data line in the source file (header is line 1).
    pub row: usize,
    pub group: String,
    pub pre_score: Option<f64>,
    pub post_score: Option<f64>,
    /// Values of additional covariate columns, aligned with `Dataset::extra_columns`.
    #[serde(default)]
    pub extra: Vec<Option<f64>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub columns: ColumnNames,
    pub extra_columns: Vec<String>,
    pub observations: Vec<Observation>,
}

impl Dataset {
    pub fn new(columns: ColumnNames, observations: Vec<Observation>) -> Self {
        Self {
            columns,
            extra_columns: Vec::new(),
            observations,
        }
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    pub fn n_missing_post(&self) -> usize {
        self.observations.iter().filter(|o| o.post_score.is_none()).count()
    }

    /// Group labels sorted lexically (the default level order).
    pub fn distinct_groups(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for o in &self.observations {
            if !out.contains(&o.group) {
                out.push(o.group.clone());
            }
        }
        out.sort();
        out
    }

    /// Resolve the factor levels: an explicit order must cover every label in
    /// the data; without one the labels are sorted.
    pub fn resolve_levels(
        &self,
        declared: Option<&[String]>,
        reference: Option<&str>,
    ) -> Result<GroupLevels, AppError> {
        let observed = self.distinct_groups();
        let levels = match declared {
            Some(declared) => {
                if let Some(unknown) = observed.iter().find(|g| !declared.contains(g)) {
                    return Err(AppError::data(format!(
                        "Group `{unknown}` appears in column `{}` but is not in the declared levels [{}].",
                        self.columns.group,
                        declared.join(", ")
                    )));
                }
                declared.to_vec()
            }
            None => observed,
        };
        GroupLevels::new(levels, reference)
    }

    /// Look up a covariate value by column name.
    pub fn covariate(&self, obs: &Observation, name: &str) -> Result<Option<f64>, AppError> {
        if name == self.columns.pre {
            return Ok(obs.pre_score);
        }
        let idx = self
            .extra_columns
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| AppError::data(format!("Unknown covariate column `{name}`.")))?;
        Ok(obs.extra.get(idx).copied().flatten())
    }

    /// Non-missing post-scores of one group.
    pub fn post_scores_for<'a>(&'a self, group: &'a str) -> impl Iterator<Item = f64> + 'a {
        self.observations
            .iter()
            .filter(move |o| o.group == group)
            .filter_map(|o| o.post_score)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obs(row: usize, group: &str, pre: Option<f64>, post: Option<f64>) -> Observation {
        Observation {
            row,
            group: group.to_string(),
            pre_score: pre,
            post_score: post,
            extra: Vec::new(),
        }
    }

    #[test]
    fn distinct_groups_are_sorted() {
        let ds = Dataset::new(
            ColumnNames::default(),
            vec![
                obs(2, "C", None, Some(1.0)),
                obs(3, "A", None, None),
                obs(4, "B", None, Some(2.0)),
                obs(5, "A", None, Some(3.0)),
            ],
        );
        assert_eq!(ds.distinct_groups(), vec!["A", "B", "C"]);
        assert_eq!(ds.n_missing_post(), 1);
        assert_eq!(ds.post_scores_for("A").collect::<Vec<_>>(), vec![3.0]);
    }

    #[test]
    fn declared_levels_must_cover_data() {
        let ds = Dataset::new(ColumnNames::default(), vec![obs(2, "X", None, Some(1.0))]);
        let declared = vec!["A".to_string(), "B".to_string()];
        assert!(ds.resolve_levels(Some(&declared), None).is_err());

        let declared = vec!["Y".to_string(), "X".to_string()];
        let levels = ds.resolve_levels(Some(&declared), Some("X")).unwrap();
        assert_eq!(levels.levels(), &["Y".to_string(), "X".to_string()]);
        assert_eq!(levels.reference(), "X");
    }

    #[test]
    fn covariate_lookup_by_name() {
        let mut ds = Dataset::new(ColumnNames::default(), vec![]);
        ds.extra_columns = vec!["age".to_string()];
        let mut o = obs(2, "A", Some(7.0), Some(1.0));
        o.extra = vec![Some(31.0)];
        assert_eq!(ds.covariate(&o, "pre").unwrap(), Some(7.0));
        assert_eq!(ds.covariate(&o, "age").unwrap(), Some(31.0));
        assert!(ds.covariate(&o, "height").is_err());
    }
}
