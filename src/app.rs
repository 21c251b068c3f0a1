//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - loads `.env` and parses CLI arguments
//! - installs the tracing subscriber
//! - runs diagnostics, the model gate and the fits
//! - prints reports/plots
//! - writes optional exports

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{AnalyzeArgs, Command, DataArgs, DiagnoseArgs, SimulateArgs};
use crate::data::{SampleConfig, generate_sample};
use crate::domain::{AnalysisConfig, Bounds, ColumnNames, OptimizerOptions, RuleThresholds};
use crate::error::AppError;

pub mod pipeline;

/// Entry point for the `cfe` binary.
pub fn run() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    let cli = crate::cli::Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Diagnose(args) => handle_diagnose(args),
        Command::Analyze(args) => handle_analyze(args),
        Command::Simulate(args) => handle_simulate(args),
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "cfe_tobit=debug" } else { "cfe_tobit=warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    // Already installed when run twice in one process.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn handle_diagnose(args: DiagnoseArgs) -> Result<(), AppError> {
    let config = config_from_data_args(&args.data)?;
    let diag = pipeline::run_diagnostics(&config)?;
    print!("{}", crate::report::format_diagnostics(&diag, &config));
    Ok(())
}

fn handle_analyze(args: AnalyzeArgs) -> Result<(), AppError> {
    let config = config_from_args(&args)?;
    let diag = pipeline::run_diagnostics(&config)?;

    // Show the table behind a gate failure.
    if let Err(err) = diag.decision.require_model() {
        print!("{}", crate::report::format_diagnostics(&diag, &config));
        return Err(err);
    }

    let output = pipeline::analyze_diagnosed(diag, &config)?;
    print!("{}", crate::report::format_analysis(&output, &config));

    if let Some(censored) = &output.censored {
        if config.plot {
            println!();
            println!(
                "{}",
                crate::plot::render_qq_plot(&censored.residuals, config.plot_width, config.plot_height)
            );
            println!(
                "{}",
                crate::plot::render_residual_plot(&censored.residuals, config.plot_width, config.plot_height)
            );
        }
        if let Some(path) = &config.export_residuals {
            crate::io::export::write_residuals_csv(path, &censored.residuals)?;
            tracing::info!(path = %path.display(), "residuals exported");
        }
    } else if config.export_residuals.is_some() {
        tracing::warn!("no censored fit was run; residual export skipped");
    }

    if let Some(path) = &config.export_report {
        let report = crate::io::report_file::build_report(&output, &config.data_path, config.bounds);
        crate::io::report_file::write_report_json(path, &report)?;
        tracing::info!(path = %path.display(), "report exported");
    }

    Ok(())
}

fn handle_simulate(args: SimulateArgs) -> Result<(), AppError> {
    let groups = args
        .groups
        .iter()
        .map(|spec| parse_group_shift(spec))
        .collect::<Result<Vec<_>, _>>()?;
    let config = SampleConfig {
        groups,
        n_per_group: args.n_per_group,
        intercept: args.intercept,
        slope: args.slope,
        noise_sd: args.noise_sd,
        bounds: Bounds::new(args.lower, args.upper)?,
        seed: args.seed,
        ..SampleConfig::default()
    };
    let dataset = generate_sample(&config)?;
    crate::io::export::write_dataset_csv(&args.out, &dataset)?;
    println!("Wrote {} rows to {}", dataset.len(), args.out.display());
    Ok(())
}

fn parse_group_shift(spec: &str) -> Result<(String, f64), AppError> {
    let (label, shift) = spec
        .split_once('=')
        .ok_or_else(|| AppError::usage(format!("Group spec '{spec}' must look like LABEL=SHIFT.")))?;
    let shift = shift
        .trim()
        .parse::<f64>()
        .map_err(|_| AppError::usage(format!("Group spec '{spec}': shift is not a number.")))?;
    Ok((label.trim().to_string(), shift))
}

/// Comma-split CLI lists keep the spaces around each item.
fn trim_all(items: &[String]) -> Vec<String> {
    items.iter().map(|s| s.trim().to_string()).collect()
}

/// Configuration for `diagnose` (no fitting options).
pub fn config_from_data_args(args: &DataArgs) -> Result<AnalysisConfig, AppError> {
    let delimiter = u8::try_from(args.delimiter)
        .map_err(|_| AppError::usage(format!("Delimiter '{}' is not a single ASCII character.", args.delimiter)))?;
    Ok(AnalysisConfig {
        data_path: args.file.clone(),
        delimiter,
        columns: ColumnNames {
            group: args.group_col.clone(),
            pre: args.pre_col.clone(),
            post: args.post_col.clone(),
        },
        extra_covariates: Vec::new(),
        use_pre_covariate: true,
        bounds: Bounds::new(args.lower, args.upper)?,
        near_window: args.near_window,
        concern: args.concern,
        thresholds: RuleThresholds {
            group_limit: args.group_limit,
            spread_limit: args.spread_limit,
            censored_limit: args.censored_limit,
        },
        levels: args.levels.as_deref().map(trim_all),
        reference: args.reference.as_deref().map(|r| r.trim().to_string()),
        contrast: crate::domain::ContrastScheme::Reference,
        compare_contrasts: false,
        also_censored: false,
        confidence: 0.95,
        test_kind: crate::domain::TestKind::Wald,
        optimizer: OptimizerOptions::default(),
        plot: false,
        plot_width: 72,
        plot_height: 20,
        export_residuals: None,
        export_report: None,
    })
}

pub fn config_from_args(args: &AnalyzeArgs) -> Result<AnalysisConfig, AppError> {
    let base = config_from_data_args(&args.data)?;
    let config = AnalysisConfig {
        extra_covariates: trim_all(&args.covariates),
        use_pre_covariate: !args.no_covariate,
        contrast: args.contrast,
        compare_contrasts: args.compare_contrasts,
        also_censored: args.also_censored,
        confidence: args.confidence,
        test_kind: args.test_kind,
        optimizer: OptimizerOptions {
            max_iter: args.max_iter,
            gradient_tol: args.gradient_tol,
        },
        plot: args.plot && !args.no_plot,
        plot_width: args.width,
        plot_height: args.height,
        export_residuals: args.export_residuals.clone(),
        export_report: args.export_report.clone(),
        ..base
    };
    config.validate()?;
    Ok(config)
}
