//! Shared analysis pipeline used by the `diagnose` and `analyze` commands.
//!
//! ingest -> ceiling/floor diagnostics -> model decision (gate) -> fit ->
//! residuals -> inference
//!
//! Presentation (tables, plots, exports) lives elsewhere; this module only
//! computes.

use serde::Serialize;

use crate::diagnostics::{CeilingFloorReport, diagnose};
use crate::domain::{AnalysisConfig, ContrastScheme, Dataset, FactorTerm, GroupLevels, ModelFormula};
use crate::error::AppError;
use crate::fit::{
    DecisionKind, FittedCensoredModel, LinearFit, ModelDecision, fit_linear, fit_tobit, refit_with_contrasts,
    select_across,
};
use crate::io::ingest::{IngestedData, load_dataset};
use crate::report::inference::{
    CoefficientRow, EffectSizes, IntervalTable, Type3Table, coefficient_table, confidence_intervals, effect_sizes,
    type3_tests,
};
use crate::report::residuals::{ResidualSet, compute_residuals};

/// Output of the diagnostic stage.
#[derive(Debug, Clone)]
pub struct DiagnosticsOutput {
    pub ingest: IngestedData,
    pub levels: GroupLevels,
    pub report: CeilingFloorReport,
    pub decision: ModelDecision,
}

/// Coefficients and intervals under the alternate contrast coding.
#[derive(Debug, Clone, Serialize)]
pub struct AlternateCoding {
    pub contrast: ContrastScheme,
    pub coefficients: Vec<CoefficientRow>,
    pub intervals: IntervalTable,
}

/// Everything computed for a censored fit.
#[derive(Debug, Clone)]
pub struct CensoredAnalysis {
    pub model: FittedCensoredModel,
    pub residuals: ResidualSet,
    pub coefficients: Vec<CoefficientRow>,
    pub intervals: IntervalTable,
    pub type3: Type3Table,
    pub effects: EffectSizes,
    pub alternate: Option<AlternateCoding>,
}

/// All computed outputs of a single `cfe analyze` run.
#[derive(Debug, Clone)]
pub struct AnalysisOutput {
    pub diagnostics: DiagnosticsOutput,
    pub formula: ModelFormula,
    pub linear: Option<LinearFit>,
    pub censored: Option<CensoredAnalysis>,
}

/// Load the data and evaluate the ceiling/floor rules.
pub fn run_diagnostics(config: &AnalysisConfig) -> Result<DiagnosticsOutput, AppError> {
    config.validate()?;
    let ingest = load_dataset(config)?;
    tracing::info!(
        path = %config.data_path.display(),
        rows = ingest.stats.n_rows,
        groups = ingest.stats.n_groups,
        missing_post = ingest.stats.missing_post,
        "dataset loaded"
    );
    diagnose_dataset(ingest, config)
}

/// Diagnostic stage on an already loaded dataset.
pub fn diagnose_dataset(ingest: IngestedData, config: &AnalysisConfig) -> Result<DiagnosticsOutput, AppError> {
    let levels = ingest
        .dataset
        .resolve_levels(config.levels.as_deref(), config.reference.as_deref())?;
    let report = diagnose(
        &ingest.dataset,
        &levels,
        &config.bounds,
        config.near_window,
        config.concern,
        &config.thresholds,
    );
    let decision = select_across(&report.sides);
    tracing::info!(
        decision = decision.kind.display_name(),
        rule = decision.rule.display_name(),
        "model decision"
    );
    Ok(DiagnosticsOutput {
        ingest,
        levels,
        report,
        decision,
    })
}

/// Full pipeline. Stops with a `ModelingGate` error on `NO_VALID_MODEL`.
pub fn run_analysis(config: &AnalysisConfig) -> Result<AnalysisOutput, AppError> {
    let diagnostics = run_diagnostics(config)?;
    analyze_diagnosed(diagnostics, config)
}

pub fn analyze_diagnosed(diagnostics: DiagnosticsOutput, config: &AnalysisConfig) -> Result<AnalysisOutput, AppError> {
    diagnostics.decision.require_model()?;

    let dataset = &diagnostics.ingest.dataset;
    let formula = ModelFormula {
        response: dataset.columns.post.clone(),
        factor: FactorTerm {
            column: dataset.columns.group.clone(),
            levels: diagnostics.levels.clone(),
            contrast: config.contrast,
        },
        covariates: config.covariate_names(),
    };

    let use_censored = diagnostics.decision.kind == DecisionKind::UseCensored;
    let linear = if use_censored {
        None
    } else {
        tracing::info!(formula = %formula, "fitting linear model");
        Some(fit_linear(dataset, &formula)?)
    };
    let censored = if use_censored || config.also_censored {
        Some(analyze_censored(dataset, &formula, config)?)
    } else {
        None
    };

    Ok(AnalysisOutput {
        diagnostics,
        formula,
        linear,
        censored,
    })
}

fn analyze_censored(
    dataset: &Dataset,
    formula: &ModelFormula,
    config: &AnalysisConfig,
) -> Result<CensoredAnalysis, AppError> {
    let model = fit_tobit(dataset, formula, config.bounds, &config.optimizer)?;
    let residuals = compute_residuals(&model, dataset)?;
    let coefficients = coefficient_table(&model);
    let intervals = confidence_intervals(&model, config.confidence)?;
    let type3 = type3_tests(&model, dataset, config.test_kind)?;
    let effects = effect_sizes(&model);

    let alternate = if config.compare_contrasts {
        let scheme = model.contrast().other();
        let refit = refit_with_contrasts(&model, dataset, scheme)?;
        Some(AlternateCoding {
            contrast: scheme,
            coefficients: coefficient_table(&refit),
            intervals: confidence_intervals(&refit, config.confidence)?,
        })
    } else {
        None
    };

    Ok(CensoredAnalysis {
        model,
        residuals,
        coefficients,
        intervals,
        type3,
        effects,
        alternate,
    })
}
