//! The 30-20 and 70% ceiling/floor rules.
//!
//! - 30-20 (gate for ANOVA/ANCOVA): no group above 30% at the bound, and no
//!   two groups more than 20 points apart.
//! - 70% (gate for Tobit): no group above 70% at the bound.
//!
//! Limits are exclusive: a proportion equal to the limit passes. Empty groups
//! are left out of the evaluation and reported in `skipped`.

use serde::Serialize;

use crate::diagnostics::GroupSummary;
use crate::domain::{BoundSide, RuleThresholds};

/// Slack for comparing differences of proportions against a limit.
const RULE_EPS: f64 = 1e-12;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupViolation {
    pub group: String,
    pub proportion: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PairViolation {
    pub first: String,
    pub second: String,
    pub difference: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThirtyTwentyOutcome {
    pub side: BoundSide,
    pub passed: bool,
    pub group_limit: f64,
    pub spread_limit: f64,
    pub group_violations: Vec<GroupViolation>,
    pub pair_violations: Vec<PairViolation>,
    pub max_difference: f64,
    /// Groups with no observations (excluded from evaluation).
    pub skipped: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeventyOutcome {
    pub side: BoundSide,
    pub passed: bool,
    pub limit: f64,
    pub violations: Vec<GroupViolation>,
    pub max_proportion: f64,
    pub skipped: Vec<String>,
}

/// Both rule outcomes for one bound.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SideRules {
    pub side: BoundSide,
    pub thirty_twenty: ThirtyTwentyOutcome,
    pub seventy: SeventyOutcome,
}

/// `(group, proportion)` for every non-empty group, plus the empty ones.
fn split_groups(summaries: &[GroupSummary], side: BoundSide) -> (Vec<(&str, f64)>, Vec<String>) {
    let mut evaluated = Vec::new();
    let mut skipped = Vec::new();
    for s in summaries {
        let p = s.p_at(side);
        if s.is_empty() || !p.is_finite() {
            skipped.push(s.group.clone());
        } else {
            evaluated.push((s.group.as_str(), p));
        }
    }
    (evaluated, skipped)
}

pub fn evaluate_thirty_twenty(
    summaries: &[GroupSummary],
    side: BoundSide,
    thresholds: &RuleThresholds,
) -> ThirtyTwentyOutcome {
    let (evaluated, skipped) = split_groups(summaries, side);

    let group_violations: Vec<GroupViolation> = evaluated
        .iter()
        .filter(|(_, p)| *p > thresholds.group_limit + RULE_EPS)
        .map(|(g, p)| GroupViolation {
            group: g.to_string(),
            proportion: *p,
        })
        .collect();

    let mut pair_violations = Vec::new();
    let mut max_difference = 0.0_f64;
    for (i, (g1, p1)) in evaluated.iter().enumerate() {
        for (g2, p2) in &evaluated[i + 1..] {
            let d = (p1 - p2).abs();
            max_difference = max_difference.max(d);
            if d > thresholds.spread_limit + RULE_EPS {
                pair_violations.push(PairViolation {
                    first: g1.to_string(),
                    second: g2.to_string(),
                    difference: d,
                });
            }
        }
    }

    ThirtyTwentyOutcome {
        side,
        passed: group_violations.is_empty() && pair_violations.is_empty(),
        group_limit: thresholds.group_limit,
        spread_limit: thresholds.spread_limit,
        group_violations,
        pair_violations,
        max_difference,
        skipped,
    }
}

pub fn evaluate_seventy(summaries: &[GroupSummary], side: BoundSide, thresholds: &RuleThresholds) -> SeventyOutcome {
    let (evaluated, skipped) = split_groups(summaries, side);
    let violations: Vec<GroupViolation> = evaluated
        .iter()
        .filter(|(_, p)| *p > thresholds.censored_limit + RULE_EPS)
        .map(|(g, p)| GroupViolation {
            group: g.to_string(),
            proportion: *p,
        })
        .collect();
    let max_proportion = evaluated.iter().map(|(_, p)| *p).fold(0.0_f64, f64::max);

    SeventyOutcome {
        side,
        passed: violations.is_empty(),
        limit: thresholds.censored_limit,
        violations,
        max_proportion,
        skipped,
    }
}

pub fn evaluate_side(summaries: &[GroupSummary], side: BoundSide, thresholds: &RuleThresholds) -> SideRules {
    SideRules {
        side,
        thirty_twenty: evaluate_thirty_twenty(summaries, side, thresholds),
        seventy: evaluate_seventy(summaries, side, thresholds),
    }
}
