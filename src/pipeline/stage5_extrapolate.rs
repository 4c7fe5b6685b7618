use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, trace};

use crate::error::{CeilingError, Result};
use crate::model::config::CeilingConfig;
use crate::model::labeled::{Dim, Label, LabeledTensor};
use crate::model::score::{Score, SkipStats};
use crate::pipeline::stage3_collect::NUM_SUBJECTS;
use crate::pipeline::stage4_fit::{GrowthParams, fit_growth_curve};
use crate::report::{mean, median, nan_percentile};

pub const BOOTSTRAP_DIM: &str = "bootstrap";
pub const PARAM_DIM: &str = "param";
pub const PARAM_V0: &str = "v0";
pub const PARAM_TAU0: &str = "tau0";

pub fn ci_error(samples: &[f64], center: f64, confidence: f64) -> (f64, f64) {
    let low = 100.0 * (1.0 - confidence) / 2.0;
    let high = 100.0 - low;
    let below = nan_percentile(samples, low);
    let above = nan_percentile(samples, high);
    ((center - below).abs(), (above - center).abs())
}

fn group_by_num_subjects(unit_table: &LabeledTensor) -> Result<Vec<(f64, Vec<f64>)>> {
    if unit_table.dims().len() != 1 {
        return Err(CeilingError::StructuralMismatch(format!(
            "unit table must be one long axis, got dims {:?}",
            unit_table.dim_names()
        )));
    }
    let levels = unit_table.coord_values(NUM_SUBJECTS)?;
    let mut grouped: BTreeMap<i64, Vec<f64>> = BTreeMap::new();
    for (label, value) in levels.iter().zip(unit_table.data().iter()) {
        let k = label.as_int().ok_or_else(|| {
            CeilingError::StructuralMismatch(format!("non-integer {NUM_SUBJECTS} `{label}`"))
        })?;
        let entry = grouped.entry(k).or_default();
        if value.is_finite() {
            entry.push(*value);
        }
    }
    Ok(grouped
        .into_iter()
        .filter(|(_, values)| !values.is_empty())
        .map(|(k, values)| (k as f64, values))
        .collect())
}

fn resample_mean<R: Rng + ?Sized>(values: &[f64], rng: &mut R) -> f64 {
    let draws = (0..values.len())
        .map(|_| values[rng.gen_range(0..values.len())])
        .collect::<Vec<_>>();
    mean(&draws)
}

pub fn extrapolate_unit(unit_table: &LabeledTensor, config: &CeilingConfig) -> Result<Score> {
    let levels = group_by_num_subjects(unit_table)?;
    let xs = levels.iter().map(|(x, _)| *x).collect::<Vec<_>>();

    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut rounds: Vec<Option<GrowthParams>> = Vec::with_capacity(config.num_bootstraps);
    let mut skips = SkipStats::default();

    for round in 0..config.num_bootstraps {
        let ys = levels
            .iter()
            .map(|(_, values)| resample_mean(values, &mut rng))
            .collect::<Vec<_>>();
        match fit_growth_curve(&xs, &ys) {
            Ok(params) => rounds.push(Some(params)),
            Err(CeilingError::FitFailure(reason)) => {
                trace!("bootstrap round {round}: {reason}");
                skips.bootstrap_rounds += 1;
                rounds.push(None);
            }
            Err(e) => return Err(e),
        }
    }

    let fitted = rounds.iter().flatten().copied().collect::<Vec<_>>();
    if fitted.is_empty() {
        return Err(CeilingError::NoConvergedRounds {
            attempted: config.num_bootstraps,
        });
    }
    if skips.bootstrap_rounds > 0 {
        debug!(
            "extrapolate: {}/{} bootstrap rounds failed to fit",
            skips.bootstrap_rounds, config.num_bootstraps
        );
    }

    let curves = fitted
        .iter()
        .map(|p| {
            (0..config.interpolation_points)
                .map(|x| p.eval(x as f64))
                .collect::<Vec<_>>()
        })
        .collect::<Vec<_>>();
    let median_curve = (0..config.interpolation_points)
        .map(|x| median(&curves.iter().map(|c| c[x]).collect::<Vec<_>>()))
        .collect::<Vec<_>>();
    let endpoint = endpoint_index(&median_curve, config.asymptote_threshold);

    let v0s = fitted.iter().map(|p| p.v0).collect::<Vec<_>>();
    let center = median(&v0s);
    let at_endpoint = curves.iter().map(|c| c[endpoint]).collect::<Vec<_>>();
    let (error_low, error_high) = ci_error(&at_endpoint, center, config.confidence);

    let mut score = Score::center_interval(center, error_low, error_high)?
        .with_raw(Score::new(unit_table.clone()));
    score.provenance.bootstrapped_params = Some(params_table(&rounds)?);
    score.provenance.endpoint_x = Some(LabeledTensor::scalar(endpoint as f64));
    score.provenance.skips = Some(skips);
    Ok(score)
}

pub fn endpoint_index(curve: &[f64], threshold: f64) -> usize {
    curve
        .windows(2)
        .position(|w| w[1] - w[0] < threshold)
        .unwrap_or(curve.len().saturating_sub(1))
}

fn params_table(rounds: &[Option<GrowthParams>]) -> Result<LabeledTensor> {
    let values = rounds
        .iter()
        .flat_map(|r| match r {
            Some(p) => [p.v0, p.tau0],
            None => [f64::NAN, f64::NAN],
        })
        .collect::<Vec<_>>();
    LabeledTensor::from_shape_vec(
        vec![
            Dim::indexed(BOOTSTRAP_DIM, (0..rounds.len()).map(Label::from).collect()),
            Dim::indexed(PARAM_DIM, vec![Label::from(PARAM_V0), Label::from(PARAM_TAU0)]),
        ],
        &[rounds.len(), 2],
        values,
    )
}

#[cfg(test)]
#[path = "../../tests/src_inline/pipeline/stage5_extrapolate.rs"]
mod tests;
