//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - configuration enums parsed from CLI flags (`BoundConcern`, `ContrastScheme`, `TestKind`)
//! - score bounds, rule thresholds, optimizer options and the run config (`AnalysisConfig`)
//! - the structured model specification (`ModelFormula`)
//! - the subject table (`Dataset`, `Observation`)

pub mod dataset;
pub mod types;

pub use dataset::*;
pub use types::*;
