//! Per-group ceiling/floor proportions.
//!
//! The same proportion routine serves both ends of the scale; the floor
//! figures are the ceiling computation with the lower bound substituted.

use serde::Serialize;

use crate::domain::{BOUND_TOL, BoundSide, Bounds, Dataset, GroupLevels};

/// Derived per-group figures. Proportions are NaN when `n == 0`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupSummary {
    pub group: String,
    /// Count of non-missing post-scores.
    pub n: usize,
    pub n_missing: usize,
    pub p_at_ceiling: f64,
    pub p_near_ceiling: f64,
    pub p_at_floor: f64,
    pub p_near_floor: f64,
    pub mean: f64,
    pub sd: f64,
}

impl GroupSummary {
    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    pub fn p_at(&self, side: BoundSide) -> f64 {
        match side {
            BoundSide::Ceiling => self.p_at_ceiling,
            BoundSide::Floor => self.p_at_floor,
        }
    }
}

/// Summaries for every declared level, in level order (empty levels included).
pub fn summarize_groups(
    dataset: &Dataset,
    levels: &GroupLevels,
    bounds: &Bounds,
    near_window: f64,
) -> Vec<GroupSummary> {
    levels
        .levels()
        .iter()
        .map(|group| {
            let values: Vec<f64> = dataset.post_scores_for(group).collect();
            let n_missing = dataset
                .observations
                .iter()
                .filter(|o| &o.group == group && o.post_score.is_none())
                .count();
            let (p_at_ceiling, p_near_ceiling) =
                bound_proportions(&values, bounds.value(BoundSide::Ceiling), BoundSide::Ceiling, near_window);
            let (p_at_floor, p_near_floor) =
                bound_proportions(&values, bounds.value(BoundSide::Floor), BoundSide::Floor, near_window);
            let (mean, sd) = mean_sd(&values);
            GroupSummary {
                group: group.clone(),
                n: values.len(),
                n_missing,
                p_at_ceiling,
                p_near_ceiling,
                p_at_floor,
                p_near_floor,
                mean,
                sd,
            }
        })
        .collect()
}

/// Fraction of values equal to `bound`, and within `window` of it on the inside.
///
/// Returns `(NaN, NaN)` for an empty slice.
pub fn bound_proportions(values: &[f64], bound: f64, side: BoundSide, window: f64) -> (f64, f64) {
    if values.is_empty() {
        return (f64::NAN, f64::NAN);
    }
    let n = values.len() as f64;
    let at = values.iter().filter(|&&y| (y - bound).abs() <= BOUND_TOL).count();
    let near = values
        .iter()
        .filter(|&&y| match side {
            BoundSide::Ceiling => y >= bound - window - BOUND_TOL,
            BoundSide::Floor => y <= bound + window + BOUND_TOL,
        })
        .count();
    (at as f64 / n, near as f64 / n)
}

fn mean_sd(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (f64::NAN, f64::NAN);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    if values.len() < 2 {
        return (mean, f64::NAN);
    }
    let var = values.iter().map(|y| (y - mean).powi(2)).sum::<f64>() / (n - 1.0);
    (mean, var.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ColumnNames, Observation};

    fn dataset(rows: &[(&str, Option<f64>)]) -> Dataset {
        let observations = rows
            .iter()
            .enumerate()
            .map(|(i, (g, y))| Observation {
                row: i + 2,
                group: g.to_string(),
                pre_score: None,
                post_score: *y,
                extra: Vec::new(),
            })
            .collect();
        Dataset::new(ColumnNames::default(), observations)
    }

    #[test]
    fn proportions_at_and_near_ceiling() {
        let values = [20.0, 20.0, 19.0, 18.5, 10.0];
        let (at, near) = bound_proportions(&values, 20.0, BoundSide::Ceiling, 1.0);
        assert!((at - 0.4).abs() < 1e-12);
        assert!((near - 0.6).abs() < 1e-12);
    }

    #[test]
    fn floor_uses_the_same_routine() {
        let values = [0.0, 1.0, 5.0, 0.0];
        let (at, near) = bound_proportions(&values, 0.0, BoundSide::Floor, 1.0);
        assert!((at - 0.5).abs() < 1e-12);
        assert!((near - 0.75).abs() < 1e-12);
    }

    #[test]
    fn empty_group_reports_nan_without_panicking() {
        let ds = dataset(&[("A", Some(20.0)), ("A", None)]);
        let levels = GroupLevels::new(vec!["A".to_string(), "B".to_string()], None).unwrap();
        let bounds = Bounds::new(0.0, 20.0).unwrap();
        let summaries = summarize_groups(&ds, &levels, &bounds, 1.0);
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].n, 1);
        assert_eq!(summaries[0].n_missing, 1);
        assert_eq!(summaries[0].p_at_ceiling, 1.0);
        assert!(summaries[1].is_empty());
        assert!(summaries[1].p_at_ceiling.is_nan());
        assert!(summaries[1].mean.is_nan());
    }

    #[test]
    fn summary_mean_and_sd() {
        let ds = dataset(&[("A", Some(2.0)), ("A", Some(4.0)), ("A", Some(6.0))]);
        let levels = GroupLevels::new(vec!["A".to_string()], None).unwrap();
        let bounds = Bounds::new(0.0, 20.0).unwrap();
        let s = &summarize_groups(&ds, &levels, &bounds, 1.0)[0];
        assert!((s.mean - 4.0).abs() < 1e-12);
        assert!((s.sd - 2.0).abs() < 1e-12);
        assert_eq!(s.p_at_floor, 0.0);
    }
}
