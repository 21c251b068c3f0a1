//! Read/write analysis report JSON files.
//!
//! The report JSON is the portable record of one `cfe analyze` run:
//! - input file, bounds and formula
//! - group summaries, rule outcomes and the model decision
//! - linear fit and/or censored-fit inference tables
//!
//! Residuals are exported separately as CSV.

use std::fs::File;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::app::pipeline::{AlternateCoding, AnalysisOutput};
use crate::diagnostics::{GroupSummary, SideRules};
use crate::domain::{Bounds, ContrastScheme};
use crate::error::AppError;
use crate::fit::{LinearFit, ModelDecision};
use crate::io::ingest::DatasetStats;
use crate::report::inference::{CoefficientRow, EffectSizes, IntervalTable, Type3Table};

#[derive(Debug, Clone, Serialize)]
pub struct ReportFile<'a> {
    pub tool: &'static str,
    pub version: &'static str,
    pub generated_at: DateTime<Utc>,
    pub data_file: String,
    pub bounds: Bounds,
    pub formula: String,
    pub dataset: &'a DatasetStats,
    pub summaries: &'a [GroupSummary],
    pub rules: &'a [SideRules],
    pub decision: &'a ModelDecision,
    pub linear: Option<&'a LinearFit>,
    pub censored: Option<CensoredSection<'a>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CensoredSection<'a> {
    pub contrast: ContrastScheme,
    pub log_likelihood: f64,
    pub iterations: usize,
    pub sigma: f64,
    pub n_used: usize,
    pub n_left_censored: usize,
    pub n_right_censored: usize,
    pub coefficients: &'a [CoefficientRow],
    pub intervals: &'a IntervalTable,
    pub type3: &'a Type3Table,
    pub effect_sizes: &'a EffectSizes,
    pub qq_correlation: f64,
    pub alternate: Option<&'a AlternateCoding>,
}

/// Subset of a report file read back for inspection.
#[derive(Debug, Clone, Deserialize)]
pub struct ReportSummary {
    pub tool: String,
    pub generated_at: DateTime<Utc>,
    pub formula: String,
    pub decision: DecisionRecord,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DecisionRecord {
    pub kind: String,
    pub justification: String,
}

pub fn build_report<'a>(output: &'a AnalysisOutput, data_file: &Path, bounds: Bounds) -> ReportFile<'a> {
    let diagnostics = &output.diagnostics;
    let censored = output.censored.as_ref().map(|c| CensoredSection {
        contrast: c.model.contrast(),
        log_likelihood: c.model.log_likelihood,
        iterations: c.model.iterations,
        sigma: c.model.sigma(),
        n_used: c.model.n_used,
        n_left_censored: c.model.n_left_censored,
        n_right_censored: c.model.n_right_censored,
        coefficients: &c.coefficients,
        intervals: &c.intervals,
        type3: &c.type3,
        effect_sizes: &c.effects,
        qq_correlation: c.residuals.qq_correlation,
        alternate: c.alternate.as_ref(),
    });

    ReportFile {
        tool: "cfe",
        version: env!("CARGO_PKG_VERSION"),
        generated_at: Utc::now(),
        data_file: data_file.display().to_string(),
        bounds,
        formula: output.formula.to_string(),
        dataset: &diagnostics.ingest.stats,
        summaries: &diagnostics.report.summaries,
        rules: &diagnostics.report.sides,
        decision: &diagnostics.decision,
        linear: output.linear.as_ref(),
        censored,
    }
}

/// Write a report JSON file.
pub fn write_report_json(path: &Path, report: &ReportFile<'_>) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::usage(format!("Failed to create report JSON '{}': {e}", path.display())))?;
    serde_json::to_writer_pretty(file, report)
        .map_err(|e| AppError::usage(format!("Failed to write report JSON: {e}")))?;
    Ok(())
}

/// Read back the header fields of a report JSON file.
pub fn read_report_summary(path: &Path) -> Result<ReportSummary, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::usage(format!("Failed to open report JSON '{}': {e}", path.display())))?;
    serde_json::from_reader(file).map_err(|e| AppError::data(format!("Invalid report JSON: {e}")))
}
