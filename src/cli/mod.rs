//! Command-line parsing for the ceiling/floor-effect analyzer.
//!
//! The goal of this module is to keep **argument parsing** separate from the
//! diagnostics/modeling code. Every option can also be set through a `CFE_*`
//! environment variable (a `.env` file is loaded first).

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::domain::{BoundConcern, ContrastScheme, TestKind};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "cfe", version, about = "Ceiling/floor-effect diagnostics and censored (Tobit) regression")]
pub struct Cli {
    /// Enable debug logging (overridden by RUST_LOG).
    #[arg(short, long, global = true, env = "CFE_VERBOSE")]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print group proportions at/near the bounds, rule outcomes and the model decision.
    Diagnose(DiagnoseArgs),
    /// Run the full pipeline: diagnose, gate, fit, residuals, inference.
    Analyze(AnalyzeArgs),
    /// Write a synthetic pre/post score table to CSV.
    Simulate(SimulateArgs),
}

/// Input and ceiling/floor options shared by `diagnose` and `analyze`.
#[derive(Debug, Args, Clone)]
pub struct DataArgs {
    /// Delimited data file with a header row.
    #[arg(value_name = "FILE", env = "CFE_DATA")]
    pub file: PathBuf,

    /// Field delimiter (single ASCII character).
    #[arg(long, default_value_t = ',', env = "CFE_DELIMITER")]
    pub delimiter: char,

    /// Column holding the group label.
    #[arg(long, default_value = "group", env = "CFE_GROUP_COL")]
    pub group_col: String,

    /// Column holding the pre-score (covariate).
    #[arg(long, default_value = "pre", env = "CFE_PRE_COL")]
    pub pre_col: String,

    /// Column holding the post-score (response).
    #[arg(long, default_value = "post", env = "CFE_POST_COL")]
    pub post_col: String,

    /// Lowest attainable score.
    #[arg(long, default_value_t = 0.0, env = "CFE_LOWER", allow_negative_numbers = true)]
    pub lower: f64,

    /// Highest attainable score.
    #[arg(long, default_value_t = 20.0, env = "CFE_UPPER", allow_negative_numbers = true)]
    pub upper: f64,

    /// Distance from a bound that still counts as "near" it.
    #[arg(long, default_value_t = 1.0, env = "CFE_NEAR_WINDOW")]
    pub near_window: f64,

    /// Which bound(s) to check.
    #[arg(long, value_enum, default_value_t = BoundConcern::Ceiling, env = "CFE_CONCERN")]
    pub concern: BoundConcern,

    /// 30-20 rule: per-group limit.
    #[arg(long, default_value_t = 0.30, env = "CFE_GROUP_LIMIT")]
    pub group_limit: f64,

    /// 30-20 rule: pairwise spread limit.
    #[arg(long, default_value_t = 0.20, env = "CFE_SPREAD_LIMIT")]
    pub spread_limit: f64,

    /// 70% rule: per-group limit for a censored model.
    #[arg(long, default_value_t = 0.70, env = "CFE_CENSORED_LIMIT")]
    pub censored_limit: f64,

    /// Group level order, comma separated (default: sorted labels).
    #[arg(long, value_delimiter = ',', env = "CFE_LEVELS")]
    pub levels: Option<Vec<String>>,

    /// Reference level (default: first level).
    #[arg(long, env = "CFE_REFERENCE")]
    pub reference: Option<String>,
}

/// `cfe diagnose`.
#[derive(Debug, Args, Clone)]
pub struct DiagnoseArgs {
    #[command(flatten)]
    pub data: DataArgs,
}

/// `cfe analyze`.
#[derive(Debug, Args, Clone)]
pub struct AnalyzeArgs {
    #[command(flatten)]
    pub data: DataArgs,

    /// Contrast coding of the group factor.
    #[arg(long, value_enum, default_value_t = ContrastScheme::Reference, env = "CFE_CONTRAST")]
    pub contrast: ContrastScheme,

    /// Also refit under the other contrast coding.
    #[arg(long, env = "CFE_COMPARE_CONTRASTS")]
    pub compare_contrasts: bool,

    /// Fit without the pre-score covariate (ANOVA instead of ANCOVA).
    #[arg(long, env = "CFE_NO_COVARIATE")]
    pub no_covariate: bool,

    /// Additional numeric covariate columns, comma separated.
    #[arg(long, value_delimiter = ',', env = "CFE_COVARIATES")]
    pub covariates: Vec<String>,

    /// Fit the censored model even when the linear model is acceptable.
    #[arg(long, env = "CFE_ALSO_CENSORED")]
    pub also_censored: bool,

    /// Confidence level for Wald intervals.
    #[arg(long, default_value_t = 0.95, env = "CFE_CONFIDENCE")]
    pub confidence: f64,

    /// Type III test statistic.
    #[arg(long = "test", value_enum, default_value_t = TestKind::Wald, env = "CFE_TEST")]
    pub test_kind: TestKind,

    /// Newton-Raphson iteration budget.
    #[arg(long, default_value_t = 100, env = "CFE_MAX_ITER")]
    pub max_iter: usize,

    /// Convergence threshold on the largest score component.
    #[arg(long, default_value_t = 1e-6, env = "CFE_GRADIENT_TOL")]
    pub gradient_tol: f64,

    /// Render ASCII plots (enabled by default).
    #[arg(long, default_value_t = true)]
    pub plot: bool,

    /// Disable the ASCII plots.
    #[arg(long, env = "CFE_NO_PLOT")]
    pub no_plot: bool,

    /// Plot width (columns).
    #[arg(long, default_value_t = 72, env = "CFE_WIDTH")]
    pub width: usize,

    /// Plot height (rows).
    #[arg(long, default_value_t = 20, env = "CFE_HEIGHT")]
    pub height: usize,

    /// Export per-observation residuals to CSV.
    #[arg(long, env = "CFE_EXPORT_RESIDUALS")]
    pub export_residuals: Option<PathBuf>,

    /// Export the analysis report to JSON.
    #[arg(long, env = "CFE_EXPORT_REPORT")]
    pub export_report: Option<PathBuf>,
}

/// `cfe simulate`.
#[derive(Debug, Args, Clone)]
pub struct SimulateArgs {
    /// Output CSV path.
    #[arg(long, value_name = "FILE")]
    pub out: PathBuf,

    /// Subjects per group.
    #[arg(short = 'n', long, default_value_t = 50)]
    pub n_per_group: usize,

    /// Random seed.
    #[arg(long, default_value_t = 42, env = "CFE_SEED")]
    pub seed: u64,

    /// Group shifts of the latent post-score mean, as LABEL=SHIFT pairs.
    #[arg(long, value_delimiter = ',', default_value = "A=0,B=2,C=4")]
    pub groups: Vec<String>,

    /// Latent post-score mean of a zero-shift group at the mean pre-score.
    #[arg(long, default_value_t = 13.0)]
    pub intercept: f64,

    /// Latent slope on the centred pre-score.
    #[arg(long, default_value_t = 0.6)]
    pub slope: f64,

    /// Residual SD of the latent post-score.
    #[arg(long, default_value_t = 3.0)]
    pub noise_sd: f64,

    /// Lowest attainable score.
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    pub lower: f64,

    /// Highest attainable score.
    #[arg(long, default_value_t = 20.0, allow_negative_numbers = true)]
    pub upper: f64,
}
