//! ASCII plotting for terminal output.
//!
//! Fixed-size character grids, deterministic for a given input:
//! - normal QQ plot: residual quantiles `o` against a reference line `-`
//! - residuals vs fitted: residuals `o`, censoring limits `=`, zero line `.`
//!
//! The limits `upper - fitted` and `lower - fitted` are straight lines of slope
//! -1; residuals from censored observations sit exactly on them.

use crate::report::residuals::ResidualSet;

/// Render the normal QQ plot of the residuals.
pub fn render_qq_plot(set: &ResidualSet, width: usize, height: usize) -> String {
    let width = width.max(10);
    let height = height.max(5);
    let Some((x_min, x_max)) = range(set.qq.iter().map(|p| p.0)) else {
        return "QQ plot: not enough residuals\n".to_string();
    };
    let Some((y_min, y_max)) = range(set.qq.iter().map(|p| p.1)) else {
        return "QQ plot: residuals are constant\n".to_string();
    };
    let (y_min, y_max) = pad_range(y_min, y_max, 0.05);

    let mut grid = vec![vec![' '; width]; height];

    let (mean, sd) = mean_sd(set.qq.iter().map(|p| p.1));
    let line = [(x_min, mean + sd * x_min), (x_max, mean + sd * x_max)];
    draw_polyline(&mut grid, &line, (x_min, x_max), (y_min, y_max), '-');

    for &(x, y) in &set.qq {
        let cx = map_x(x, x_min, x_max, width);
        let cy = map_y(y, y_min, y_max, height);
        grid[cy][cx] = 'o';
    }

    let mut out = format!(
        "Normal QQ: theoretical=[{x_min:.2}, {x_max:.2}] | residual=[{y_min:.2}, {y_max:.2}] | r={:.4}\n",
        set.qq_correlation
    );
    push_grid(&mut out, grid);
    out
}

/// Render residuals against fitted values, with the censoring limits.
pub fn render_residual_plot(set: &ResidualSet, width: usize, height: usize) -> String {
    let width = width.max(10);
    let height = height.max(5);
    let Some((x_min, x_max)) = range(set.points.iter().map(|p| p.fitted)) else {
        return "Residual plot: fitted values are constant\n".to_string();
    };
    let Some((y_min, y_max)) = range(set.points.iter().map(|p| p.residual)) else {
        return "Residual plot: residuals are constant\n".to_string();
    };
    let (y_min, y_max) = pad_range(y_min.min(0.0), y_max.max(0.0), 0.05);

    let mut grid = vec![vec![' '; width]; height];
    let xr = (x_min, x_max);
    let yr = (y_min, y_max);

    draw_polyline(&mut grid, &[(x_min, 0.0), (x_max, 0.0)], xr, yr, '.');
    if let Some(p) = set.points.first() {
        // Both limits are `bound - fitted`; recover the bounds from any point.
        let upper = p.upper_limit + p.fitted;
        let lower = p.lower_limit + p.fitted;
        draw_polyline(&mut grid, &[(x_min, upper - x_min), (x_max, upper - x_max)], xr, yr, '=');
        draw_polyline(&mut grid, &[(x_min, lower - x_min), (x_max, lower - x_max)], xr, yr, '=');
    }

    for p in &set.points {
        let cx = map_x(p.fitted, x_min, x_max, width);
        let cy = map_y(p.residual, y_min, y_max, height);
        grid[cy][cx] = 'o';
    }

    let mut out = format!("Residuals vs fitted: fitted=[{x_min:.2}, {x_max:.2}] | residual=[{y_min:.2}, {y_max:.2}]\n");
    push_grid(&mut out, grid);
    out
}

fn push_grid(out: &mut String, grid: Vec<Vec<char>>) {
    for row in grid {
        out.push_str(&row.into_iter().collect::<String>());
        out.push('\n');
    }
}

fn range(values: impl Iterator<Item = f64>) -> Option<(f64, f64)> {
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for v in values.filter(|v| v.is_finite()) {
        min = min.min(v);
        max = max.max(v);
    }
    if min.is_finite() && max.is_finite() && max > min {
        Some((min, max))
    } else {
        None
    }
}

fn mean_sd(values: impl Iterator<Item = f64> + Clone) -> (f64, f64) {
    let n = values.clone().count().max(1) as f64;
    let mean = values.clone().sum::<f64>() / n;
    let var = values.map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0).max(1.0);
    (mean, var.sqrt())
}

fn pad_range(min: f64, max: f64, frac: f64) -> (f64, f64) {
    let span = (max - min).abs();
    let pad = (span * frac).max(1e-12);
    (min - pad, max + pad)
}

fn map_x(x: f64, x_min: f64, x_max: f64, width: usize) -> usize {
    let u = ((x - x_min) / (x_max - x_min)).clamp(0.0, 1.0);
    (u * (width as f64 - 1.0)).round() as usize
}

fn map_y(y: f64, y_min: f64, y_max: f64, height: usize) -> usize {
    let u = ((y - y_min) / (y_max - y_min)).clamp(0.0, 1.0);
    // y=top is max -> row 0
    (height as f64 - 1.0 - (u * (height as f64 - 1.0))).round() as usize
}

/// Draw a polyline, skipping the parts outside the y-range.
fn draw_polyline(grid: &mut [Vec<char>], points: &[(f64, f64)], xr: (f64, f64), yr: (f64, f64), ch: char) {
    let height = grid.len();
    let width = grid[0].len();
    // Sample densely so off-grid segments can simply be dropped.
    let steps = width * 4;
    for pair in points.windows(2) {
        let (x0, y0) = pair[0];
        let (x1, y1) = pair[1];
        for s in 0..=steps {
            let u = s as f64 / steps as f64;
            let x = x0 + u * (x1 - x0);
            let y = y0 + u * (y1 - y0);
            if y < yr.0 || y > yr.1 {
                continue;
            }
            let cx = map_x(x, xr.0, xr.1, width);
            let cy = map_y(y, yr.0, yr.1, height);
            if grid[cy][cx] == ' ' {
                grid[cy][cx] = ch;
            }
        }
    }
}
