//! Maximum-likelihood fitting of the double-censored (Tobit) normal linear model.
//!
//! Latent model: `y* ~ Normal(xβ, σ)`; observed `y = clamp(y*, lower, upper)`.
//!
//! Log-likelihood contribution of observation `i` (`μ = xβ`):
//!
//! ```text
//! lower < y < upper : ln φ((y - μ)/σ) - ln σ
//! y == lower        : ln Φ((lower - μ)/σ)
//! y == upper        : ln Φ((μ - upper)/σ)
//! ```
//!
//! We optimise over `θ = (β, τ = ln σ)` with Newton-Raphson on the analytic
//! gradient and Hessian. Each step solves `(-H + νI) δ = g` (ν = 0 unless
//! `-H` is not positive definite) and is halved until the log-likelihood does
//! not decrease. Convergence is declared when `max |g| < gradient_tol`.

use nalgebra::{DMatrix, DVector};

use crate::domain::{Bounds, ContrastScheme, Dataset, ModelFormula, OptimizerOptions};
use crate::error::AppError;
use crate::fit::design::{Design, TermColumns, build_design};
use crate::math::{LN_SQRT_2PI, drop_columns, inv_mills, ln_norm_cdf, solve_least_squares, spd_inverse};

/// Maximum number of step halvings per iteration.
const MAX_HALVINGS: usize = 40;

/// Relative log-likelihood decrease tolerated when accepting a step (rounding noise).
const LL_SLACK: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Censoring {
    Left,
    None,
    Right,
}

/// A fitted Tobit model. Immutable; refitting produces a new value.
#[derive(Debug, Clone)]
pub struct FittedCensoredModel {
    pub formula: ModelFormula,
    pub bounds: Bounds,
    pub options: OptimizerOptions,
    pub coef_names: Vec<String>,
    pub coefficients: Vec<f64>,
    /// Internal scale parameter; report `sigma()`.
    pub log_sigma: f64,
    /// Inverse observed information over `(β, ln σ)`; last row/column is `ln σ`.
    pub covariance: DMatrix<f64>,
    pub terms: Vec<TermColumns>,
    pub log_likelihood: f64,
    pub iterations: usize,
    pub gradient_norm: f64,
    pub n_used: usize,
    pub n_left_censored: usize,
    pub n_right_censored: usize,
    pub n_excluded: usize,
    /// Source rows used in the fit, in design order.
    pub rows: Vec<usize>,
}

impl FittedCensoredModel {
    pub fn sigma(&self) -> f64 {
        self.log_sigma.exp()
    }

    pub fn contrast(&self) -> ContrastScheme {
        self.formula.factor.contrast
    }

    /// Number of regression coefficients (excluding `ln σ`).
    pub fn n_coefficients(&self) -> usize {
        self.coefficients.len()
    }

    /// Standard errors of the coefficients followed by that of `ln σ`.
    pub fn std_errors(&self) -> Vec<f64> {
        (0..self.covariance.nrows())
            .map(|i| self.covariance[(i, i)].max(0.0).sqrt())
            .collect()
    }

    pub fn coefficient(&self, name: &str) -> Option<f64> {
        self.coef_names
            .iter()
            .position(|n| n == name)
            .map(|i| self.coefficients[i])
    }

    /// Uncensored linear predictor `xβ` for a design row.
    pub fn linear_predictor(&self, x_row: &[f64]) -> f64 {
        x_row.iter().zip(&self.coefficients).map(|(x, b)| x * b).sum()
    }
}

/// Optimum of the censored likelihood for one design.
#[derive(Debug, Clone)]
pub struct MleSolution {
    pub beta: DVector<f64>,
    pub log_sigma: f64,
    pub log_likelihood: f64,
    pub covariance: DMatrix<f64>,
    pub iterations: usize,
    pub gradient_norm: f64,
}

struct Evaluation {
    ll: f64,
    grad: DVector<f64>,
    hess: DMatrix<f64>,
}

/// Fit `formula` to `dataset` with censoring at `bounds`.
pub fn fit_tobit(
    dataset: &Dataset,
    formula: &ModelFormula,
    bounds: Bounds,
    options: &OptimizerOptions,
) -> Result<FittedCensoredModel, AppError> {
    let design = build_design(dataset, formula)?;
    validate_responses(&design, &bounds)?;
    let censoring = classify(&design.y, &bounds);

    let n_left = censoring.iter().filter(|c| **c == Censoring::Left).count();
    let n_right = censoring.iter().filter(|c| **c == Censoring::Right).count();
    if n_left + n_right == censoring.len() {
        return Err(AppError::data(format!(
            "Every usable response of `{formula}` sits on a bound; the residual scale is not identified."
        )));
    }

    tracing::info!(
        formula = %formula,
        contrast = formula.factor.contrast.display_name(),
        n = design.y.len(),
        n_left,
        n_right,
        "fitting censored regression"
    );

    let solution = maximize(&design.x, &design.y, &censoring, &bounds, options)?;

    tracing::info!(
        iterations = solution.iterations,
        log_likelihood = solution.log_likelihood,
        sigma = solution.log_sigma.exp(),
        "censored regression converged"
    );

    let Design {
        rows,
        coef_names,
        terms,
        n_excluded,
        y,
        ..
    } = design;

    Ok(FittedCensoredModel {
        formula: formula.clone(),
        bounds,
        options: *options,
        coef_names,
        coefficients: solution.beta.iter().copied().collect(),
        log_sigma: solution.log_sigma,
        covariance: solution.covariance,
        terms,
        log_likelihood: solution.log_likelihood,
        iterations: solution.iterations,
        gradient_norm: solution.gradient_norm,
        n_used: y.len(),
        n_left_censored: n_left,
        n_right_censored: n_right,
        n_excluded,
        rows,
    })
}

/// Refit from scratch under another contrast scheme.
///
/// Coefficients and standard errors are coding-dependent, so relabelling the
/// existing estimates is not enough.
pub fn refit_with_contrasts(
    model: &FittedCensoredModel,
    dataset: &Dataset,
    scheme: ContrastScheme,
) -> Result<FittedCensoredModel, AppError> {
    fit_tobit(dataset, &model.formula.with_contrast(scheme), model.bounds, &model.options)
}

/// Maximised log-likelihood with the columns of `term` removed.
pub fn reduced_log_likelihood(
    model: &FittedCensoredModel,
    dataset: &Dataset,
    term: &TermColumns,
) -> Result<f64, AppError> {
    let design = build_design(dataset, &model.formula)?;
    let censoring = classify(&design.y, &model.bounds);
    let reduced = drop_columns(&design.x, term.range());
    let solution = maximize(&reduced, &design.y, &censoring, &model.bounds, &model.options)
        .map_err(|e| AppError::new(e.kind(), format!("Reduced model without `{}`: {e}", term.name)))?;
    Ok(solution.log_likelihood)
}

fn validate_responses(design: &Design, bounds: &Bounds) -> Result<(), AppError> {
    for (y, row) in design.y.iter().zip(&design.rows) {
        if !bounds.contains(*y) {
            return Err(AppError::data(format!(
                "Line {row}: response {y} lies strictly outside the censoring bounds [{}, {}].",
                bounds.lower, bounds.upper
            )));
        }
    }
    Ok(())
}

pub fn classify(y: &DVector<f64>, bounds: &Bounds) -> Vec<Censoring> {
    y.iter()
        .map(|&v| {
            if bounds.is_at_lower(v) {
                Censoring::Left
            } else if bounds.is_at_upper(v) {
                Censoring::Right
            } else {
                Censoring::None
            }
        })
        .collect()
}

/// Newton-Raphson maximisation of the censored log-likelihood.
pub fn maximize(
    x: &DMatrix<f64>,
    y: &DVector<f64>,
    censoring: &[Censoring],
    bounds: &Bounds,
    options: &OptimizerOptions,
) -> Result<MleSolution, AppError> {
    let n = x.nrows();
    let p = x.ncols();

    let mut theta = start_values(x, y)?;
    let mut eval = evaluate(x, y, censoring, bounds, &theta);
    if !eval.ll.is_finite() {
        return Err(AppError::numeric("Non-finite log-likelihood at the starting values."));
    }

    for iter in 0..options.max_iter {
        let gnorm = eval.grad.amax();
        tracing::debug!(iter, log_likelihood = eval.ll, gradient = gnorm, "newton iteration");
        if gnorm < options.gradient_tol {
            return finish(theta, eval, iter, p);
        }

        let step = newton_step(&eval.hess, &eval.grad)?;

        let mut t = 1.0;
        let mut accepted = None;
        for _ in 0..MAX_HALVINGS {
            let candidate = &theta + &step * t;
            let next = evaluate(x, y, censoring, bounds, &candidate);
            if next.ll.is_finite() && next.ll >= eval.ll - LL_SLACK * (1.0 + eval.ll.abs()) {
                accepted = Some((candidate, next));
                break;
            }
            t *= 0.5;
        }

        let Some((next_theta, next_eval)) = accepted else {
            return Err(AppError::convergence(format!(
                "Censored regression stalled after {iter} iterations: no step improves the log-likelihood \
                 (max |gradient| = {gnorm:.3e}, tolerance {:.1e}, n={n}).",
                options.gradient_tol
            )));
        };
        theta = next_theta;
        eval = next_eval;
    }

    let gnorm = eval.grad.amax();
    if gnorm < options.gradient_tol {
        return finish(theta, eval, options.max_iter, p);
    }
    Err(AppError::convergence(format!(
        "Censored regression did not converge within {} iterations (max |gradient| = {gnorm:.3e}, tolerance {:.1e}).",
        options.max_iter, options.gradient_tol
    )))
}

fn finish(theta: DVector<f64>, eval: Evaluation, iterations: usize, p: usize) -> Result<MleSolution, AppError> {
    let information = -&eval.hess;
    let covariance = spd_inverse(&information)
        .ok_or_else(|| AppError::numeric("Observed information matrix is singular at the optimum."))?;
    Ok(MleSolution {
        beta: theta.rows(0, p).into_owned(),
        log_sigma: theta[p],
        log_likelihood: eval.ll,
        covariance,
        iterations,
        gradient_norm: eval.grad.amax(),
    })
}

/// OLS coefficients and `ln sqrt(SSE/n)` as the starting point.
fn start_values(x: &DMatrix<f64>, y: &DVector<f64>) -> Result<DVector<f64>, AppError> {
    let n = x.nrows();
    let p = x.ncols();
    let beta = solve_least_squares(x, y)
        .ok_or_else(|| AppError::numeric("Least squares start values could not be computed."))?;
    let sse = (y - x * &beta).norm_squared();
    let sigma = (sse / n as f64).sqrt();
    let log_sigma = if sigma.is_finite() && sigma > 1e-8 { sigma.ln() } else { 0.0 };

    let mut theta = DVector::zeros(p + 1);
    theta.rows_mut(0, p).copy_from(&beta);
    theta[p] = log_sigma;
    Ok(theta)
}

/// Solve `(-H + νI) δ = g`, raising ν until the system is positive definite.
fn newton_step(hess: &DMatrix<f64>, grad: &DVector<f64>) -> Result<DVector<f64>, AppError> {
    let information = -hess;
    if let Some(chol) = information.clone().cholesky() {
        return Ok(chol.solve(grad));
    }

    let dim = information.nrows();
    let scale = (0..dim)
        .map(|i| information[(i, i)].abs())
        .fold(0.0_f64, f64::max)
        .max(1.0);
    let mut nu = 1e-8 * scale;
    for _ in 0..30 {
        let damped = &information + DMatrix::identity(dim, dim) * nu;
        if let Some(chol) = damped.cholesky() {
            return Ok(chol.solve(grad));
        }
        nu *= 10.0;
    }
    Err(AppError::numeric("Could not regularise the Hessian for a Newton step."))
}

/// Log-likelihood, gradient and Hessian at `theta = (β, ln σ)`.
fn evaluate(
    x: &DMatrix<f64>,
    y: &DVector<f64>,
    censoring: &[Censoring],
    bounds: &Bounds,
    theta: &DVector<f64>,
) -> Evaluation {
    let p = x.ncols();
    let tau = theta[p];
    let sigma = tau.exp();
    let beta = theta.rows(0, p);

    let mut ll = 0.0;
    let mut grad = DVector::zeros(p + 1);
    let mut hess = DMatrix::zeros(p + 1, p + 1);

    for i in 0..x.nrows() {
        let xi = x.row(i);
        let mu: f64 = (0..p).map(|c| xi[c] * beta[c]).sum();

        // Per-observation derivatives w.r.t. μ-direction (scaled by x) and τ:
        // g_β = gb·x, g_τ = gt, H_ββ = hbb·xxᵀ, H_βτ = hbt·x, H_ττ = htt.
        let (li, gb, gt, hbb, hbt, htt) = match censoring[i] {
            Censoring::None => {
                let z = (y[i] - mu) / sigma;
                (
                    -LN_SQRT_2PI - tau - 0.5 * z * z,
                    z / sigma,
                    z * z - 1.0,
                    -1.0 / (sigma * sigma),
                    -2.0 * z / sigma,
                    -2.0 * z * z,
                )
            }
            Censoring::Left | Censoring::Right => {
                let (a, s) = if censoring[i] == Censoring::Left {
                    ((bounds.lower - mu) / sigma, -1.0)
                } else {
                    ((mu - bounds.upper) / sigma, 1.0)
                };
                let lambda = inv_mills(a);
                let dlambda = -lambda * (a + lambda);
                (
                    ln_norm_cdf(a),
                    lambda * s / sigma,
                    -lambda * a,
                    dlambda / (sigma * sigma),
                    -s * (dlambda * a + lambda) / sigma,
                    dlambda * a * a + lambda * a,
                )
            }
        };

        ll += li;
        for r in 0..p {
            let xr = xi[r];
            grad[r] += gb * xr;
            hess[(r, p)] += hbt * xr;
            for c in 0..=r {
                hess[(r, c)] += hbb * xr * xi[c];
            }
        }
        grad[p] += gt;
        hess[(p, p)] += htt;
    }

    // Mirror the lower triangle and the σ column.
    for r in 0..p {
        for c in 0..r {
            hess[(c, r)] = hess[(r, c)];
        }
        hess[(p, r)] = hess[(r, p)];
    }

    Evaluation { ll, grad, hess }
}

/// Log-likelihood at an arbitrary `(β, ln σ)`.
pub fn log_likelihood(
    x: &DMatrix<f64>,
    y: &DVector<f64>,
    bounds: &Bounds,
    beta: &DVector<f64>,
    log_sigma: f64,
) -> f64 {
    let censoring = classify(y, bounds);
    let mut theta = DVector::zeros(beta.len() + 1);
    theta.rows_mut(0, beta.len()).copy_from(beta);
    theta[beta.len()] = log_sigma;
    evaluate(x, y, &censoring, bounds, &theta).ll
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ColumnNames, FactorTerm, GroupLevels, Observation};
    use crate::error::ErrorKind;
    use crate::report::residuals::compute_residuals;

    fn formula(levels: &[&str], scheme: ContrastScheme, covariates: &[&str]) -> ModelFormula {
        ModelFormula {
            response: "post".to_string(),
            factor: FactorTerm {
                column: "group".to_string(),
                levels: GroupLevels::new(levels.iter().map(|s| s.to_string()).collect(), None).unwrap(),
                contrast: scheme,
            },
            covariates: covariates.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Deterministic pseudo-noise in roughly [-1.7, 1.7].
    fn noise(i: usize) -> f64 {
        let u = ((i as f64 + 1.0) * 0.618_033_988_749_895).fract();
        let v = ((i as f64 + 1.0) * 0.414_213_562_373_095).fract();
        (u + v - 1.0) * 1.7
    }

    fn ceiling_dataset() -> Dataset {
        let means = [("A", 12.0), ("B", 15.0), ("C", 17.5)];
        let mut observations = Vec::new();
        let mut row = 2;
        for (g, m) in means {
            for i in 0..40 {
                let pre = 8.0 + (i % 9) as f64;
                let latent = m + 0.5 * (pre - 12.0) + 2.0 * noise(row);
                let post = latent.round().clamp(0.0, 20.0);
                observations.push(Observation {
                    row,
                    group: g.to_string(),
                    pre_score: Some(pre),
                    post_score: Some(post),
                    extra: Vec::new(),
                });
                row += 1;
            }
        }
        Dataset::new(ColumnNames::default(), observations)
    }

    /// Group A piles up at the floor, group C at the ceiling.
    fn two_sided_dataset() -> Dataset {
        let mut ds = ceiling_dataset();
        for o in &mut ds.observations {
            if o.group == "A" {
                let pre = o.pre_score.unwrap_or(12.0);
                let latent = 1.0 + 0.5 * (pre - 12.0) + 2.0 * noise(o.row);
                o.post_score = Some(latent.round().clamp(0.0, 20.0));
            }
        }
        ds
    }

    fn mirrored(ds: &Dataset, upper: f64) -> Dataset {
        let mut out = ds.clone();
        for o in &mut out.observations {
            o.post_score = o.post_score.map(|y| upper - y);
        }
        out
    }

    #[test]
    fn uncensored_data_matches_least_squares() {
        let ds = ceiling_dataset();
        let bounds = Bounds::new(-100.0, 100.0).unwrap();
        let f = formula(&["A", "B", "C"], ContrastScheme::Reference, &["pre"]);
        let model = fit_tobit(&ds, &f, bounds, &OptimizerOptions::default()).unwrap();

        let design = build_design(&ds, &f).unwrap();
        let ols = solve_least_squares(&design.x, &design.y).unwrap();
        for (a, b) in model.coefficients.iter().zip(ols.iter()) {
            assert!((a - b).abs() < 1e-6, "{a} vs {b}");
        }
        // ML σ² is SSE/n.
        let sse = (&design.y - &design.x * &ols).norm_squared();
        let sigma_ml = (sse / design.y.len() as f64).sqrt();
        assert!((model.sigma() - sigma_ml).abs() < 1e-6);
        assert_eq!(model.n_right_censored, 0);
    }

    #[test]
    fn gradient_matches_finite_differences() {
        let ds = two_sided_dataset();
        let bounds = Bounds::new(0.0, 20.0).unwrap();
        let f = formula(&["A", "B", "C"], ContrastScheme::Reference, &["pre"]);
        let design = build_design(&ds, &f).unwrap();
        let cens = classify(&design.y, &bounds);
        assert!(cens.contains(&Censoring::Left));
        assert!(cens.contains(&Censoring::Right));
        let theta = DVector::from_row_slice(&[1.5, 13.0, 16.0, 0.4, 0.7]);
        let eval = evaluate(&design.x, &design.y, &cens, &bounds, &theta);
        let h = 1e-6;
        for j in 0..theta.len() {
            let mut up = theta.clone();
            up[j] += h;
            let mut down = theta.clone();
            down[j] -= h;
            let num = (evaluate(&design.x, &design.y, &cens, &bounds, &up).ll
                - evaluate(&design.x, &design.y, &cens, &bounds, &down).ll)
                / (2.0 * h);
            assert!((num - eval.grad[j]).abs() < 1e-4 * (1.0 + num.abs()), "param {j}: {num} vs {}", eval.grad[j]);

            let g_up = evaluate(&design.x, &design.y, &cens, &bounds, &up).grad;
            let g_down = evaluate(&design.x, &design.y, &cens, &bounds, &down).grad;
            for k in 0..theta.len() {
                let num_h = (g_up[k] - g_down[k]) / (2.0 * h);
                assert!(
                    (num_h - eval.hess[(k, j)]).abs() < 1e-3 * (1.0 + num_h.abs()),
                    "hessian ({k},{j}): {num_h} vs {}",
                    eval.hess[(k, j)]
                );
            }
        }
    }

    #[test]
    fn censored_fit_converges_to_stationary_point() {
        let ds = ceiling_dataset();
        let bounds = Bounds::new(0.0, 20.0).unwrap();
        let f = formula(&["A", "B", "C"], ContrastScheme::Reference, &["pre"]);
        let model = fit_tobit(&ds, &f, bounds, &OptimizerOptions::default()).unwrap();
        assert!(model.n_right_censored > 0);
        assert!(model.gradient_norm < 1e-6);
        assert!(model.sigma() > 0.0);
        // Group ordering survives censoring.
        let b = model.coefficient("groupB").unwrap();
        let c = model.coefficient("groupC").unwrap();
        assert!(b > 0.0 && c > b, "b={b} c={c}");
        assert_eq!(model.std_errors().len(), 5);
    }

    #[test]
    fn contrast_refit_preserves_likelihood_and_maps_coefficients() {
        let ds = ceiling_dataset();
        let bounds = Bounds::new(0.0, 20.0).unwrap();
        let f = formula(&["A", "B", "C"], ContrastScheme::Reference, &["pre"]);
        let reference = fit_tobit(&ds, &f, bounds, &OptimizerOptions::default()).unwrap();
        let sdif = refit_with_contrasts(&reference, &ds, ContrastScheme::SuccessiveDifference).unwrap();

        assert!((reference.log_likelihood - sdif.log_likelihood).abs() < 1e-8);
        assert!((reference.log_sigma - sdif.log_sigma).abs() < 1e-7);
        let b_b = reference.coefficient("groupB").unwrap();
        let b_c = reference.coefficient("groupC").unwrap();
        let d1 = sdif.coefficient("groupB-A").unwrap();
        let d2 = sdif.coefficient("groupC-B").unwrap();
        assert!((d1 - b_b).abs() < 1e-6);
        assert!((d2 - (b_c - b_b)).abs() < 1e-6);
        assert!((reference.coefficient("pre").unwrap() - sdif.coefficient("pre").unwrap()).abs() < 1e-6);

        let fitted_ref = compute_residuals(&reference, &ds).unwrap().fitted();
        let fitted_sdif = compute_residuals(&sdif, &ds).unwrap().fitted();
        assert_eq!(fitted_ref.len(), fitted_sdif.len());
        for (a, b) in fitted_ref.iter().zip(&fitted_sdif) {
            assert!((a - b).abs() < 1e-8, "{a} vs {b}");
        }
    }

    #[test]
    fn mirrored_responses_swap_floor_and_ceiling() {
        let ds = two_sided_dataset();
        let upper = 20.0;
        let bounds = Bounds::new(0.0, upper).unwrap();
        let f = formula(&["A", "B", "C"], ContrastScheme::Reference, &["pre"]);
        let model = fit_tobit(&ds, &f, bounds, &OptimizerOptions::default()).unwrap();
        let flipped_ds = mirrored(&ds, upper);
        let flipped = fit_tobit(&flipped_ds, &f, bounds, &OptimizerOptions::default()).unwrap();

        assert!(model.n_left_censored > 0 && model.n_right_censored > 0);
        assert_eq!(model.n_left_censored, flipped.n_right_censored);
        assert_eq!(model.n_right_censored, flipped.n_left_censored);
        assert!((model.log_likelihood - flipped.log_likelihood).abs() < 1e-8);
        assert!((model.log_sigma - flipped.log_sigma).abs() < 1e-7);

        // y' = upper - y: the intercept reflects about `upper`, slopes and shifts negate.
        assert!((flipped.coefficients[0] - (upper - model.coefficients[0])).abs() < 1e-6);
        for (a, b) in model.coefficients.iter().zip(&flipped.coefficients).skip(1) {
            assert!((a + b).abs() < 1e-6, "{a} vs {b}");
        }

        let res = compute_residuals(&model, &ds).unwrap();
        let res_flipped = compute_residuals(&flipped, &flipped_ds).unwrap();
        for (p, q) in res.points.iter().zip(&res_flipped.points) {
            assert_eq!(p.row, q.row);
            assert!((p.residual + q.residual).abs() < 1e-6, "row {}: {} vs {}", p.row, p.residual, q.residual);
        }
    }

    #[test]
    fn out_of_bound_response_is_a_data_error() {
        let mut ds = ceiling_dataset();
        ds.observations[3].post_score = Some(25.0);
        let f = formula(&["A", "B", "C"], ContrastScheme::Reference, &["pre"]);
        let err = fit_tobit(&ds, &f, Bounds::new(0.0, 20.0).unwrap(), &OptimizerOptions::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Data);
        assert!(err.message().contains("Line 5"), "{err}");
    }

    #[test]
    fn tiny_iteration_budget_is_a_convergence_error() {
        let ds = ceiling_dataset();
        let f = formula(&["A", "B", "C"], ContrastScheme::Reference, &["pre"]);
        let opts = OptimizerOptions {
            max_iter: 1,
            gradient_tol: 1e-12,
        };
        let err = fit_tobit(&ds, &f, Bounds::new(0.0, 20.0).unwrap(), &opts).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Convergence);
    }

    #[test]
    fn reported_likelihood_matches_direct_evaluation() {
        let ds = ceiling_dataset();
        let bounds = Bounds::new(0.0, 20.0).unwrap();
        let f = formula(&["A", "B", "C"], ContrastScheme::Reference, &[]);
        let model = fit_tobit(&ds, &f, bounds, &OptimizerOptions::default()).unwrap();
        let design = build_design(&ds, &f).unwrap();
        let beta = DVector::from_column_slice(&model.coefficients);
        let ll = log_likelihood(&design.x, &design.y, &bounds, &beta, model.log_sigma);
        assert!((ll - model.log_likelihood).abs() < 1e-9);
        // Moving away from the optimum lowers the likelihood.
        let worse = log_likelihood(&design.x, &design.y, &bounds, &beta, model.log_sigma + 0.1);
        assert!(worse < ll);
    }

    #[test]
    fn reduced_model_has_lower_likelihood() {
        let ds = ceiling_dataset();
        let f = formula(&["A", "B", "C"], ContrastScheme::Reference, &["pre"]);
        let model = fit_tobit(&ds, &f, Bounds::new(0.0, 20.0).unwrap(), &OptimizerOptions::default()).unwrap();
        let group_term = model.terms[0].clone();
        let ll0 = reduced_log_likelihood(&model, &ds, &group_term).unwrap();
        assert!(ll0 < model.log_likelihood);
    }
}
