//! Delimited-text ingest and validation.
//!
//! This module is responsible for turning a subject table (one row per
//! subject: group label, pre-score, post-score, optional extra covariates)
//! into a `Dataset` that is safe to diagnose and fit.
//!
//! Design goals:
//! - **Strict schema** for required columns (clear `Data` errors)
//! - **Strict cells**: a non-numeric value in a numeric column stops the load,
//!   reporting line and column; empty / `NA` / `NaN` / `.` cells are missing
//! - **Rows are never dropped**: a missing post-score is kept as `None`
//! - **Separation of concerns**: no fitting logic here

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;

use csv::StringRecord;
use serde::Serialize;

use crate::domain::{AnalysisConfig, Bounds, ColumnNames, Dataset, Observation};
use crate::error::AppError;

/// Summary stats about the loaded table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetStats {
    pub n_rows: usize,
    pub n_groups: usize,
    pub missing_post: usize,
    pub missing_pre: usize,
    pub post_min: f64,
    pub post_max: f64,
}

/// Ingest output: dataset + stats.
#[derive(Debug, Clone)]
pub struct IngestedData {
    pub dataset: Dataset,
    pub stats: DatasetStats,
}

/// Options that control how a table is read.
#[derive(Debug, Clone)]
pub struct IngestOptions {
    pub delimiter: u8,
    pub columns: ColumnNames,
    pub extra_covariates: Vec<String>,
    pub bounds: Bounds,
}

impl IngestOptions {
    pub fn from_config(config: &AnalysisConfig) -> Self {
        Self {
            delimiter: config.delimiter,
            columns: config.columns.clone(),
            extra_covariates: config.extra_covariates.clone(),
            bounds: config.bounds,
        }
    }
}

/// Load the dataset named in the config.
pub fn load_dataset(config: &AnalysisConfig) -> Result<IngestedData, AppError> {
    let file = File::open(&config.data_path).map_err(|e| {
        AppError::usage(format!(
            "Failed to open data file '{}': {e}",
            config.data_path.display()
        ))
    })?;
    read_dataset(file, &IngestOptions::from_config(config))
}

/// Parse a dataset from any reader.
pub fn read_dataset<R: Read>(reader: R, opts: &IngestOptions) -> Result<IngestedData, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(opts.delimiter)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = reader
        .headers()
        .map_err(|e| AppError::data(format!("Failed to read header row: {e}")))?
        .clone();
    let header_map = build_header_map(&headers);

    let group_idx = require_column(&header_map, &opts.columns.group)?;
    let pre_idx = require_column(&header_map, &opts.columns.pre)?;
    let post_idx = require_column(&header_map, &opts.columns.post)?;
    let extra_idx = opts
        .extra_covariates
        .iter()
        .map(|name| require_column(&header_map, name))
        .collect::<Result<Vec<_>, _>>()?;

    let mut observations = Vec::new();

    for (idx, result) in reader.records().enumerate() {
        // +2 because records() starts after the header and lines are 1-based.
        let line = idx + 2;
        let record = result.map_err(|e| AppError::data(format!("Line {line}: parse error: {e}")))?;
        if record.iter().all(|cell| cell.trim().is_empty()) {
            continue;
        }

        let group = cell(&record, group_idx)
            .ok_or_else(|| {
                AppError::data(format!(
                    "Line {line}: missing group label in column `{}`.",
                    opts.columns.group
                ))
            })?
            .to_string();
        let pre_score = parse_numeric(&record, pre_idx, &opts.columns.pre, line)?;
        let post_score = parse_numeric(&record, post_idx, &opts.columns.post, line)?;

        if let Some(y) = post_score {
            if !opts.bounds.contains(y) {
                return Err(AppError::data(format!(
                    "Line {line}: `{}` = {y} lies outside the score bounds [{}, {}].",
                    opts.columns.post, opts.bounds.lower, opts.bounds.upper
                )));
            }
        }

        let extra = extra_idx
            .iter()
            .zip(&opts.extra_covariates)
            .map(|(&i, name)| parse_numeric(&record, i, name, line))
            .collect::<Result<Vec<_>, _>>()?;

        observations.push(Observation {
            row: line,
            group,
            pre_score,
            post_score,
            extra,
        });
    }

    if observations.is_empty() {
        return Err(AppError::data("The data file contains no rows."));
    }

    let mut dataset = Dataset::new(opts.columns.clone(), observations);
    dataset.extra_columns = opts.extra_covariates.clone();

    let stats = compute_stats(&dataset).ok_or_else(|| {
        AppError::data(format!(
            "Every `{}` value is missing; nothing to analyse.",
            opts.columns.post
        ))
    })?;

    Ok(IngestedData { dataset, stats })
}

fn build_header_map(headers: &StringRecord) -> HashMap<String, usize> {
    headers
        .iter()
        .enumerate()
        .map(|(idx, name)| (normalize_header_name(name), idx))
        .collect()
}

fn normalize_header_name(name: &str) -> String {
    // Spreadsheet exports sometimes prefix the first header with a BOM.
    let name = name.trim().trim_start_matches('\u{feff}');
    name.to_ascii_lowercase()
}

fn require_column(header_map: &HashMap<String, usize>, name: &str) -> Result<usize, AppError> {
    header_map
        .get(&normalize_header_name(name))
        .copied()
        .ok_or_else(|| AppError::data(format!("Missing required column: `{name}`")))
}

fn cell(record: &StringRecord, idx: usize) -> Option<&str> {
    record.get(idx).map(str::trim).filter(|s| !s.is_empty())
}

fn is_missing_token(s: &str) -> bool {
    matches!(s, "." | "NA" | "na" | "N/A" | "NaN" | "nan" | "NULL" | "null")
}

fn parse_numeric(record: &StringRecord, idx: usize, name: &str, line: usize) -> Result<Option<f64>, AppError> {
    let Some(raw) = cell(record, idx) else {
        return Ok(None);
    };
    if is_missing_token(raw) {
        return Ok(None);
    }
    let v = raw.parse::<f64>().map_err(|_| {
        AppError::data(format!(
            "Line {line}: non-numeric value '{raw}' in numeric column `{name}`."
        ))
    })?;
    if !v.is_finite() {
        return Err(AppError::data(format!(
            "Line {line}: non-finite value '{raw}' in numeric column `{name}`."
        )));
    }
    Ok(Some(v))
}

fn compute_stats(dataset: &Dataset) -> Option<DatasetStats> {
    let mut post_min = f64::INFINITY;
    let mut post_max = f64::NEG_INFINITY;
    for y in dataset.observations.iter().filter_map(|o| o.post_score) {
        post_min = post_min.min(y);
        post_max = post_max.max(y);
    }
    if !post_min.is_finite() || !post_max.is_finite() {
        return None;
    }
    Some(DatasetStats {
        n_rows: dataset.len(),
        n_groups: dataset.distinct_groups().len(),
        missing_post: dataset.n_missing_post(),
        missing_pre: dataset.observations.iter().filter(|o| o.pre_score.is_none()).count(),
        post_min,
        post_max,
    })
}
