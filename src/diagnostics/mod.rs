//! Ceiling/floor-effect diagnostics.
//!
//! Responsibilities:
//!
//! - per-group proportions at and near each bound (`summary`)
//! - the 30-20 and 70% rules, per bound (`rules`)

pub mod rules;
pub mod summary;

pub use rules::*;
pub use summary::*;

use serde::Serialize;

use crate::domain::{BoundConcern, Bounds, Dataset, GroupLevels, RuleThresholds};

/// Summaries plus rule outcomes for every bound under consideration.
#[derive(Debug, Clone, Serialize)]
pub struct CeilingFloorReport {
    pub summaries: Vec<GroupSummary>,
    pub sides: Vec<SideRules>,
    /// Declared levels without any usable post-score.
    pub empty_groups: Vec<String>,
}

pub fn diagnose(
    dataset: &Dataset,
    levels: &GroupLevels,
    bounds: &Bounds,
    near_window: f64,
    concern: BoundConcern,
    thresholds: &RuleThresholds,
) -> CeilingFloorReport {
    let summaries = summarize_groups(dataset, levels, bounds, near_window);
    let empty_groups: Vec<String> = summaries
        .iter()
        .filter(|s| s.is_empty())
        .map(|s| s.group.clone())
        .collect();
    for group in &empty_groups {
        tracing::warn!(group = %group, "group has no non-missing post-scores; excluded from rule evaluation");
    }

    let sides = concern
        .sides()
        .iter()
        .map(|&side| evaluate_side(&summaries, side, thresholds))
        .collect();

    CeilingFloorReport {
        summaries,
        sides,
        empty_groups,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BoundSide, ColumnNames, Observation};

    #[test]
    fn both_concern_evaluates_each_bound() {
        let mut observations = Vec::new();
        for (i, y) in [20.0, 20.0, 0.0, 10.0, 12.0].iter().enumerate() {
            observations.push(Observation {
                row: i + 2,
                group: "A".to_string(),
                pre_score: None,
                post_score: Some(*y),
                extra: Vec::new(),
            });
        }
        let ds = Dataset::new(ColumnNames::default(), observations);
        let levels = ds.resolve_levels(None, None).unwrap();
        let bounds = Bounds::new(0.0, 20.0).unwrap();
        let report = diagnose(&ds, &levels, &bounds, 1.0, BoundConcern::Both, &RuleThresholds::default());
        assert_eq!(report.sides.len(), 2);
        assert_eq!(report.sides[0].side, BoundSide::Ceiling);
        assert!(!report.sides[0].thirty_twenty.passed);
        assert_eq!(report.sides[1].side, BoundSide::Floor);
        assert!(report.sides[1].thirty_twenty.passed);
        assert!(report.empty_groups.is_empty());
    }
}
