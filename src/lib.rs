//! `cfe-tobit` library crate.
//!
//! The binary (`cfe`) is a thin wrapper around this library so that:
//!
//! - core logic is testable without spawning processes
//! - diagnostics, fitting and reporting stay separate from argument parsing

pub mod app;
pub mod cli;
pub mod data;
pub mod diagnostics;
pub mod domain;
pub mod error;
pub mod fit;
pub mod io;
pub mod math;
pub mod plot;
pub mod report;
