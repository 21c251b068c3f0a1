//! Formatted terminal output.
//!
//! We keep formatting code in one place so:
//! - the diagnostics/fitting code stays clean and testable
//! - output changes are localized

use crate::app::pipeline::{AlternateCoding, AnalysisOutput, CensoredAnalysis, DiagnosticsOutput};
use crate::diagnostics::{GroupSummary, SideRules};
use crate::domain::{AnalysisConfig, BoundSide, TestKind};
use crate::fit::{FittedCensoredModel, LinearFit, ModelDecision};
use crate::report::inference::{CoefficientRow, EffectSizes, IntervalTable, Type3Table};
use crate::report::residuals::ResidualSet;

/// Dataset header plus group table, rule outcomes and the decision.
pub fn format_diagnostics(diag: &DiagnosticsOutput, config: &AnalysisConfig) -> String {
    let mut out = String::new();
    let stats = &diag.ingest.stats;

    out.push_str("=== cfe - Ceiling/Floor Effect Analysis ===\n");
    out.push_str(&format!("Data: {}\n", config.data_path.display()));
    out.push_str(&format!(
        "Bounds: [{}, {}] | near window={} | concern={:?}\n",
        config.bounds.lower, config.bounds.upper, config.near_window, config.concern
    ));
    out.push_str(&format!(
        "Rows: n={} | groups={} | missing post={} | missing pre={} | post=[{}, {}]\n",
        stats.n_rows, stats.n_groups, stats.missing_post, stats.missing_pre, stats.post_min, stats.post_max
    ));
    out.push_str(&format!(
        "Levels: {} (reference={})\n",
        diag.levels.levels().join(", "),
        diag.levels.reference()
    ));

    out.push_str("\nGroup summary:\n");
    out.push_str(&format_group_table(&diag.report.summaries));

    out.push_str("\nRules:\n");
    for side in &diag.report.sides {
        out.push_str(&format_side_rules(side));
    }

    out.push('\n');
    out.push_str(&format_decision(&diag.decision));
    out
}

pub fn format_group_table(summaries: &[GroupSummary]) -> String {
    let mut out = String::new();
    push_line(
        &mut out,
        format!(
            "{:<12} {:>5} {:>5} {:>8} {:>8} {:>8} {:>8} {:>8} {:>8}",
            "group", "n", "miss", "at_ceil", "nr_ceil", "at_floor", "nr_floor", "mean", "sd"
        ),
    );
    push_line(
        &mut out,
        format!(
            "{:-<12} {:-<5} {:-<5} {:-<8} {:-<8} {:-<8} {:-<8} {:-<8} {:-<8}",
            "", "", "", "", "", "", "", "", ""
        ),
    );
    for s in summaries {
        push_line(
            &mut out,
            format!(
                "{:<12} {:>5} {:>5} {:>8} {:>8} {:>8} {:>8} {:>8} {:>8}",
                truncate(&s.group, 12),
                s.n,
                s.n_missing,
                fmt_num(s.p_at_ceiling, 3),
                fmt_num(s.p_near_ceiling, 3),
                fmt_num(s.p_at_floor, 3),
                fmt_num(s.p_near_floor, 3),
                fmt_num(s.mean, 2),
                fmt_num(s.sd, 2),
            ),
        );
    }
    out
}

pub fn format_side_rules(rules: &SideRules) -> String {
    let mut out = String::new();
    let side = rules.side.label();
    let tt = &rules.thirty_twenty;
    out.push_str(&format!(
        "- {side}: 30-20 rule {} (groups <= {:.2}, spread <= {:.2}; max spread {:.3})\n",
        pass_fail(tt.passed),
        tt.group_limit,
        tt.spread_limit,
        tt.max_difference
    ));
    for v in &tt.group_violations {
        out.push_str(&format!("    group {} at bound: {:.3}\n", v.group, v.proportion));
    }
    for p in &tt.pair_violations {
        out.push_str(&format!("    pair {}-{} differs by {:.3}\n", p.first, p.second, p.difference));
    }
    let sv = &rules.seventy;
    out.push_str(&format!(
        "- {side}: 70% rule {} (groups <= {:.2}; max {:.3})\n",
        pass_fail(sv.passed),
        sv.limit,
        sv.max_proportion
    ));
    for v in &sv.violations {
        out.push_str(&format!("    group {} at bound: {:.3}\n", v.group, v.proportion));
    }
    if !tt.skipped.is_empty() {
        out.push_str(&format!("    skipped (no data): {}\n", tt.skipped.join(", ")));
    }
    out
}

pub fn format_decision(decision: &ModelDecision) -> String {
    let side = decision.side.map(BoundSide::label).unwrap_or("-");
    format!(
        "Decision: {} (rule: {}, bound: {side})\n  {}\n",
        decision.kind.display_name(),
        decision.rule.display_name(),
        decision.justification
    )
}

/// Full text report of an analysis run (plots excluded).
pub fn format_analysis(output: &AnalysisOutput, config: &AnalysisConfig) -> String {
    let mut out = format_diagnostics(&output.diagnostics, config);
    out.push_str(&format!("\nModel: {}\n", output.formula));

    if let Some(linear) = &output.linear {
        out.push('\n');
        out.push_str(&format_linear(linear));
    }
    if let Some(censored) = &output.censored {
        out.push('\n');
        out.push_str(&format_censored(censored, config.test_kind));
    }
    out
}

pub fn format_linear(fit: &LinearFit) -> String {
    let mut out = String::new();
    out.push_str("Linear model (OLS):\n");
    out.push_str(&format!(
        "n={} | df resid={} | sigma={:.4} | R^2={:.4}\n",
        fit.n_used, fit.df_resid, fit.sigma, fit.r_squared
    ));
    push_line(
        &mut out,
        format!("{:<24} {:>10} {:>10} {:>8} {:>10}", "term", "estimate", "std.err", "t", "p"),
    );
    for c in &fit.coefficients {
        push_line(
            &mut out,
            format!(
                "{:<24} {:>10.4} {:>10.4} {:>8.3} {:>10}",
                truncate(&c.term, 24),
                c.estimate,
                c.std_error,
                c.t_value,
                fmt_p(c.p_value)
            ),
        );
    }
    out.push_str("\nType III tests (F):\n");
    push_line(
        &mut out,
        format!("{:<24} {:>10} {:>4} {:>10} {:>10}", "term", "sum sq", "df", "F", "p"),
    );
    for t in &fit.type3 {
        push_line(
            &mut out,
            format!(
                "{:<24} {:>10.3} {:>4} {:>10.3} {:>10}",
                truncate(&t.term, 24),
                t.sum_sq,
                t.df,
                t.f_value,
                fmt_p(t.p_value)
            ),
        );
    }
    out
}

pub fn format_censored(analysis: &CensoredAnalysis, kind: TestKind) -> String {
    let mut out = String::new();
    out.push_str(&format_model_header(&analysis.model));
    out.push_str("\nCoefficients:\n");
    out.push_str(&format_coefficients(&analysis.coefficients));
    out.push('\n');
    out.push_str(&format_intervals(&analysis.intervals));
    out.push('\n');
    out.push_str(&format_type3(&analysis.type3, kind));
    out.push('\n');
    out.push_str(&format_effects(&analysis.effects));
    out.push('\n');
    out.push_str(&format_residual_summary(&analysis.residuals));
    if let Some(alt) = &analysis.alternate {
        out.push('\n');
        out.push_str(&format_alternate(alt));
    }
    out
}

fn format_model_header(model: &FittedCensoredModel) -> String {
    format!(
        "Censored regression (Tobit, {} contrasts):\nn={} | left-censored={} | right-censored={} | excluded={} | logLik={:.4} | iterations={} | sigma={:.4}\n",
        model.contrast().display_name(),
        model.n_used,
        model.n_left_censored,
        model.n_right_censored,
        model.n_excluded,
        model.log_likelihood,
        model.iterations,
        model.sigma()
    )
}

pub fn format_coefficients(rows: &[CoefficientRow]) -> String {
    let mut out = String::new();
    push_line(
        &mut out,
        format!("{:<24} {:>10} {:>10} {:>8} {:>10}", "term", "estimate", "std.err", "z", "p"),
    );
    push_line(
        &mut out,
        format!("{:-<24} {:-<10} {:-<10} {:-<8} {:-<10}", "", "", "", "", ""),
    );
    for r in rows {
        push_line(
            &mut out,
            format!(
                "{:<24} {:>10.4} {:>10.4} {:>8.3} {:>10}",
                truncate(&r.term, 24),
                r.estimate,
                r.std_error,
                r.z_value,
                fmt_p(r.p_value)
            ),
        );
    }
    out
}

pub fn format_intervals(table: &IntervalTable) -> String {
    let mut out = String::new();
    out.push_str(&format!("Wald {:.0}% confidence intervals:\n", table.level * 100.0));
    push_line(
        &mut out,
        format!("{:<24} {:>10} {:>10} {:>10}", "term", "estimate", "lower", "upper"),
    );
    for r in table.rows.iter().chain(std::iter::once(&table.sigma)) {
        push_line(
            &mut out,
            format!(
                "{:<24} {:>10.4} {:>10.4} {:>10.4}",
                truncate(&r.term, 24),
                r.estimate,
                r.lower,
                r.upper
            ),
        );
    }
    out
}

pub fn format_type3(table: &Type3Table, kind: TestKind) -> String {
    let label = match kind {
        TestKind::Wald => "Wald",
        TestKind::Lr => "likelihood-ratio",
    };
    let mut out = String::new();
    out.push_str(&format!("Type III tests ({label} chi-square):\n"));
    push_line(
        &mut out,
        format!("{:<24} {:>4} {:>10} {:>10}", "term", "df", "chisq", "p"),
    );
    for t in &table.tests {
        push_line(
            &mut out,
            format!(
                "{:<24} {:>4} {:>10.3} {:>10}",
                truncate(&t.term, 24),
                t.df,
                t.statistic,
                fmt_p(t.p_value)
            ),
        );
    }
    out
}

pub fn format_effects(effects: &EffectSizes) -> String {
    let mut out = String::new();
    out.push_str(&format!("Effect sizes (beta / sigma, sigma={:.4}):\n", effects.sigma));
    for e in &effects.effects {
        push_line(
            &mut out,
            format!("{:<24} {:>10.4} {:>10.4}", truncate(&e.term, 24), e.estimate, e.effect_size),
        );
    }
    out.push_str(&format!("Note: {}\n", effects.caveat));
    out
}

pub fn format_residual_summary(set: &ResidualSet) -> String {
    let residuals = set.residuals();
    let fitted = set.fitted();
    let n = residuals.len();
    let mean = residuals.iter().sum::<f64>() / n.max(1) as f64;
    let extent = |v: &[f64]| {
        (
            v.iter().copied().fold(f64::INFINITY, f64::min),
            v.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        )
    };
    let (min, max) = extent(&residuals);
    let (fit_min, fit_max) = extent(&fitted);
    format!(
        "Residuals (observed - censored expectation): n={n} | mean={} | min={} | max={} | fitted=[{}, {}] | QQ r={}\n",
        fmt_num(mean, 4),
        fmt_num(min, 4),
        fmt_num(max, 4),
        fmt_num(fit_min, 2),
        fmt_num(fit_max, 2),
        fmt_num(set.qq_correlation, 4)
    )
}

fn format_alternate(alt: &AlternateCoding) -> String {
    let mut out = String::new();
    out.push_str(&format!("Refit with {} contrasts:\n", alt.contrast.display_name()));
    out.push_str(&format_coefficients(&alt.coefficients));
    out.push('\n');
    out.push_str(&format_intervals(&alt.intervals));
    out
}

fn push_line(out: &mut String, line: String) {
    out.push_str(line.trim_end());
    out.push('\n');
}

fn pass_fail(passed: bool) -> &'static str {
    if passed { "PASS" } else { "FAIL" }
}

fn fmt_num(v: f64, decimals: usize) -> String {
    if v.is_finite() {
        format!("{v:.decimals$}")
    } else {
        "NA".to_string()
    }
}

fn fmt_p(p: f64) -> String {
    if !p.is_finite() {
        "NA".to_string()
    } else if p < 1e-4 {
        "<0.0001".to_string()
    } else {
        format!("{p:.4}")
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
    out.push('.');
    out
}
