use crate::error::{CeilingError, Result};

const MAX_ITERATIONS: usize = 1000;
const LAMBDA_INIT: f64 = 1e-3;
const LAMBDA_MAX: f64 = 1e16;
const TOLERANCE: f64 = 1e-12;
const V0_MIN: f64 = 0.0;
const V0_MAX: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GrowthParams {
    pub v0: f64,
    pub tau0: f64,
}

// y(x) = v0 * (1 - exp(-x / tau0))
pub fn saturating_growth(x: f64, v0: f64, tau0: f64) -> f64 {
    v0 * (1.0 - (-x / tau0).exp())
}

impl GrowthParams {
    pub fn eval(&self, x: f64) -> f64 {
        saturating_growth(x, self.v0, self.tau0)
    }
}

fn sse(xs: &[f64], ys: &[f64], v0: f64, tau0: f64) -> f64 {
    let total = xs
        .iter()
        .zip(ys)
        .map(|(x, y)| {
            let r = y - saturating_growth(*x, v0, tau0);
            r * r
        })
        .sum::<f64>();
    if total.is_finite() { total } else { f64::INFINITY }
}

pub fn fit_growth_curve(xs: &[f64], ys: &[f64]) -> Result<GrowthParams> {
    if xs.len() != ys.len() {
        return Err(CeilingError::FitFailure(format!(
            "{} x values for {} y values",
            xs.len(),
            ys.len()
        )));
    }
    if xs.iter().chain(ys).any(|v| !v.is_finite()) {
        return Err(CeilingError::FitFailure("non-finite input".to_string()));
    }
    let mut distinct = xs.to_vec();
    distinct.sort_by(|a, b| a.total_cmp(b));
    distinct.dedup();
    if distinct.len() < 2 {
        return Err(CeilingError::FitFailure(format!(
            "{} distinct x value(s) cannot determine 2 parameters",
            distinct.len()
        )));
    }

    let y_max = ys.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let mut v0 = y_max.clamp(1e-3, V0_MAX);
    let mut tau0 = (xs.iter().sum::<f64>() / xs.len() as f64 / 2.0).max(1e-3);
    let mut current = sse(xs, ys, v0, tau0);
    let mut lambda = LAMBDA_INIT;

    for _ in 0..MAX_ITERATIONS {
        let mut jtj = [[0.0f64; 2]; 2];
        let mut jtr = [0.0f64; 2];
        for (x, y) in xs.iter().zip(ys) {
            let decay = (-x / tau0).exp();
            let r = y - v0 * (1.0 - decay);
            let j = [1.0 - decay, -v0 * decay * x / (tau0 * tau0)];
            for row in 0..2 {
                jtr[row] += j[row] * r;
                for col in 0..2 {
                    jtj[row][col] += j[row] * j[col];
                }
            }
        }
        if jtr.iter().any(|g| !g.is_finite()) {
            return Err(CeilingError::FitFailure("non-finite gradient".to_string()));
        }

        let mut improved = false;
        while lambda <= LAMBDA_MAX {
            let a00 = jtj[0][0] + lambda * jtj[0][0].max(1e-12);
            let a11 = jtj[1][1] + lambda * jtj[1][1].max(1e-12);
            let a01 = jtj[0][1];
            let det = a00 * a11 - a01 * a01;
            if det.abs() < 1e-300 || !det.is_finite() {
                lambda *= 10.0;
                continue;
            }
            let d_v0 = (jtr[0] * a11 - a01 * jtr[1]) / det;
            let d_tau = (a00 * jtr[1] - a01 * jtr[0]) / det;

            let v0_new = (v0 + d_v0).clamp(V0_MIN, V0_MAX);
            let tau_new = tau0 + d_tau;
            if tau_new.abs() < 1e-12 || !tau_new.is_finite() {
                lambda *= 10.0;
                continue;
            }

            let trial = sse(xs, ys, v0_new, tau_new);
            if trial < current {
                let step = (v0_new - v0).abs() + (tau_new - tau0).abs();
                let scale = v0.abs() + tau0.abs();
                let decrease = current - trial;
                v0 = v0_new;
                tau0 = tau_new;
                lambda = (lambda / 10.0).max(1e-12);
                improved = true;
                if decrease <= TOLERANCE * current.max(TOLERANCE) || step <= TOLERANCE * scale {
                    return Ok(GrowthParams { v0, tau0 });
                }
                current = trial;
                break;
            }
            lambda *= 10.0;
        }

        if !improved {
            // No damped step lowers the residual any further.
            return Ok(GrowthParams { v0, tau0 });
        }
    }

    Err(CeilingError::FitFailure(format!(
        "no convergence after {MAX_ITERATIONS} iterations"
    )))
}

#[cfg(test)]
#[path = "../../tests/src_inline/pipeline/stage4_fit.rs"]
mod tests;
