//! Model-family selection from the ceiling/floor rule outcomes.
//!
//! Decision table (per bound):
//! 1. both rules pass → linear ANOVA/ANCOVA
//! 2. 30-20 fails, 70% passes → Tobit (censored) regression
//! 3. 70% fails → no valid model; the pipeline must stop
//!
//! With several bounds the most severe decision wins.

use serde::Serialize;

use crate::diagnostics::{SeventyOutcome, SideRules, ThirtyTwentyOutcome};
use crate::domain::BoundSide;
use crate::error::AppError;

/// Ordered by severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DecisionKind {
    UseLinear,
    UseCensored,
    NoValidModel,
}

impl DecisionKind {
    pub fn display_name(self) -> &'static str {
        match self {
            DecisionKind::UseLinear => "USE_LINEAR",
            DecisionKind::UseCensored => "USE_CENSORED",
            DecisionKind::NoValidModel => "NO_VALID_MODEL",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TriggeringRule {
    None,
    ThirtyTwenty,
    Seventy,
}

impl TriggeringRule {
    pub fn display_name(self) -> &'static str {
        match self {
            TriggeringRule::None => "none",
            TriggeringRule::ThirtyTwenty => "30-20 rule",
            TriggeringRule::Seventy => "70% rule",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelDecision {
    pub kind: DecisionKind,
    pub rule: TriggeringRule,
    pub side: Option<BoundSide>,
    /// Violating groups (and `a-b` pairs for the 30-20 spread criterion).
    pub violators: Vec<String>,
    pub justification: String,
}

impl ModelDecision {
    /// Hard stop for `NO_VALID_MODEL`; passes the decision through otherwise.
    pub fn require_model(&self) -> Result<&Self, AppError> {
        if self.kind == DecisionKind::NoValidModel {
            return Err(AppError::gate(format!(
                "No valid model: {} Censored-regression bias is not negligible; refusing to fit.",
                self.justification
            )));
        }
        Ok(self)
    }
}

/// Pure decision from the two rule outcomes of one bound.
pub fn select_model(thirty_twenty: &ThirtyTwentyOutcome, seventy: &SeventyOutcome) -> ModelDecision {
    let side = seventy.side;

    if !seventy.passed {
        let violators: Vec<String> = seventy.violations.iter().map(|v| v.group.clone()).collect();
        let detail: Vec<String> = seventy
            .violations
            .iter()
            .map(|v| format!("{}={:.3}", v.group, v.proportion))
            .collect();
        return ModelDecision {
            kind: DecisionKind::NoValidModel,
            rule: TriggeringRule::Seventy,
            side: Some(side),
            violators,
            justification: format!(
                "70% rule failed at the {}: proportion at bound exceeds {:.2} for {}.",
                side.label(),
                seventy.limit,
                detail.join(", ")
            ),
        };
    }

    if !thirty_twenty.passed {
        let mut violators: Vec<String> = thirty_twenty
            .group_violations
            .iter()
            .map(|v| v.group.clone())
            .collect();
        let mut parts = Vec::new();
        if !thirty_twenty.group_violations.is_empty() {
            let detail: Vec<String> = thirty_twenty
                .group_violations
                .iter()
                .map(|v| format!("{}={:.3}", v.group, v.proportion))
                .collect();
            parts.push(format!(
                "groups above {:.2}: {}",
                thirty_twenty.group_limit,
                detail.join(", ")
            ));
        }
        if !thirty_twenty.pair_violations.is_empty() {
            let detail: Vec<String> = thirty_twenty
                .pair_violations
                .iter()
                .map(|p| format!("{}-{}={:.3}", p.first, p.second, p.difference))
                .collect();
            violators.extend(thirty_twenty.pair_violations.iter().map(|p| format!("{}-{}", p.first, p.second)));
            parts.push(format!(
                "pairs differing by more than {:.2}: {}",
                thirty_twenty.spread_limit,
                detail.join(", ")
            ));
        }
        return ModelDecision {
            kind: DecisionKind::UseCensored,
            rule: TriggeringRule::ThirtyTwenty,
            side: Some(side),
            violators,
            justification: format!(
                "30-20 rule failed at the {} ({}); 70% rule holds (max {:.3} <= {:.2}), so Tobit regression is appropriate.",
                side.label(),
                parts.join("; "),
                seventy.max_proportion,
                seventy.limit
            ),
        };
    }

    ModelDecision {
        kind: DecisionKind::UseLinear,
        rule: TriggeringRule::None,
        side: Some(side),
        violators: Vec::new(),
        justification: format!(
            "Both rules hold at the {} (max difference {:.3}, max proportion {:.3}); ANOVA/ANCOVA is acceptable.",
            side.label(),
            thirty_twenty.max_difference,
            seventy.max_proportion
        ),
    }
}

/// Decision across several bounds: the most severe one wins, first side on ties.
pub fn select_across(sides: &[SideRules]) -> ModelDecision {
    let mut best: Option<ModelDecision> = None;
    for rules in sides {
        let decision = select_model(&rules.thirty_twenty, &rules.seventy);
        let replace = match &best {
            None => true,
            Some(b) => decision.kind > b.kind,
        };
        if replace {
            best = Some(decision);
        }
    }
    best.unwrap_or_else(|| ModelDecision {
        kind: DecisionKind::UseLinear,
        rule: TriggeringRule::None,
        side: None,
        violators: Vec::new(),
        justification: "No bound was evaluated; ANOVA/ANCOVA assumed acceptable.".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::{GroupSummary, evaluate_side};
    use crate::domain::RuleThresholds;
    use crate::error::ErrorKind;

    fn summaries(props: &[(&str, f64)]) -> Vec<GroupSummary> {
        props
            .iter()
            .map(|(g, p)| GroupSummary {
                group: g.to_string(),
                n: 50,
                n_missing: 0,
                p_at_ceiling: *p,
                p_near_ceiling: *p,
                p_at_floor: 0.0,
                p_near_floor: 0.0,
                mean: 0.0,
                sd: 1.0,
            })
            .collect()
    }

    fn decide(props: &[(&str, f64)]) -> ModelDecision {
        let rules = evaluate_side(&summaries(props), BoundSide::Ceiling, &RuleThresholds::default());
        select_model(&rules.thirty_twenty, &rules.seventy)
    }

    #[test]
    fn moderate_ceiling_selects_censored() {
        let d = decide(&[("A", 0.19), ("B", 0.33), ("C", 0.49)]);
        assert_eq!(d.kind, DecisionKind::UseCensored);
        assert_eq!(d.rule, TriggeringRule::ThirtyTwenty);
        assert!(d.violators.contains(&"B".to_string()));
        assert!(d.violators.contains(&"C".to_string()));
        assert!(d.violators.contains(&"A-C".to_string()));
        assert!(d.require_model().is_ok());
    }

    #[test]
    fn mild_ceiling_selects_linear() {
        let d = decide(&[("A", 0.10), ("B", 0.25), ("C", 0.20)]);
        assert_eq!(d.kind, DecisionKind::UseLinear);
        assert!(d.violators.is_empty());
    }

    #[test]
    fn heavy_ceiling_is_a_hard_stop() {
        let d = decide(&[("A", 0.05), ("B", 0.05), ("C", 0.75)]);
        assert_eq!(d.kind, DecisionKind::NoValidModel);
        assert_eq!(d.rule, TriggeringRule::Seventy);
        assert_eq!(d.violators, vec!["C".to_string()]);
        let err = d.require_model().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ModelingGate);
        assert!(err.message().contains("C=0.750"), "{err}");
    }

    #[test]
    fn most_severe_side_wins() {
        let thresholds = RuleThresholds::default();
        let ceiling = evaluate_side(&summaries(&[("A", 0.1), ("B", 0.4)]), BoundSide::Ceiling, &thresholds);
        let mut floor_summaries = summaries(&[("A", 0.0), ("B", 0.0)]);
        floor_summaries[0].p_at_floor = 0.8;
        let floor = evaluate_side(&floor_summaries, BoundSide::Floor, &thresholds);
        let d = select_across(&[ceiling.clone(), floor]);
        assert_eq!(d.kind, DecisionKind::NoValidModel);
        assert_eq!(d.side, Some(BoundSide::Floor));

        let d = select_across(&[ceiling]);
        assert_eq!(d.kind, DecisionKind::UseCensored);
    }
}
