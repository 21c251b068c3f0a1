//! Synthetic pre/post score tables for demos and tests.
//!
//! Each subject gets a pre-score drawn around `pre_mean`; the latent
//! post-score is
//!
//! ```text
//! intercept + group_effect + slope * (pre - pre_mean) + noise
//! ```
//!
//! Both scores are rounded to whole points and clipped to the bounds, which is
//! how pile-ups at the ceiling or floor arise in real test data.

use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Normal;

use crate::domain::{Bounds, ColumnNames, Dataset, Observation};
use crate::error::AppError;

#[derive(Debug, Clone, PartialEq)]
pub struct SampleConfig {
    /// Group labels with their shift of the latent post-score mean.
    pub groups: Vec<(String, f64)>,
    pub n_per_group: usize,
    pub intercept: f64,
    pub slope: f64,
    pub pre_mean: f64,
    pub pre_sd: f64,
    pub noise_sd: f64,
    pub bounds: Bounds,
    pub seed: u64,
}

impl Default for SampleConfig {
    fn default() -> Self {
        Self {
            groups: vec![
                ("A".to_string(), 0.0),
                ("B".to_string(), 2.0),
                ("C".to_string(), 4.0),
            ],
            n_per_group: 50,
            intercept: 13.0,
            slope: 0.6,
            pre_mean: 10.0,
            pre_sd: 3.0,
            noise_sd: 3.0,
            bounds: Bounds {
                lower: 0.0,
                upper: 20.0,
            },
            seed: 42,
        }
    }
}

pub fn generate_sample(config: &SampleConfig) -> Result<Dataset, AppError> {
    if config.n_per_group == 0 {
        return Err(AppError::usage("Sample size per group must be > 0."));
    }
    if config.groups.is_empty() {
        return Err(AppError::usage("At least one group is required."));
    }
    let noise = Normal::new(0.0, config.noise_sd)
        .map_err(|e| AppError::usage(format!("Noise distribution error: {e}")))?;
    let pre_dist = Normal::new(config.pre_mean, config.pre_sd)
        .map_err(|e| AppError::usage(format!("Pre-score distribution error: {e}")))?;

    let mut rng = StdRng::seed_from_u64(config.seed);
    let bounds = config.bounds;
    let clip = |v: f64| v.round().clamp(bounds.lower, bounds.upper);

    let mut observations = Vec::with_capacity(config.groups.len() * config.n_per_group);
    // Data lines start after the header.
    let mut row = 2;
    for (label, effect) in &config.groups {
        for _ in 0..config.n_per_group {
            let pre = clip(pre_dist.sample(&mut rng));
            let latent = config.intercept + effect + config.slope * (pre - config.pre_mean) + noise.sample(&mut rng);
            observations.push(Observation {
                row,
                group: label.clone(),
                pre_score: Some(pre),
                post_score: Some(clip(latent)),
                extra: Vec::new(),
            });
            row += 1;
        }
    }

    tracing::debug!(n = observations.len(), seed = config.seed, "generated synthetic sample");
    Ok(Dataset::new(ColumnNames::default(), observations))
}
