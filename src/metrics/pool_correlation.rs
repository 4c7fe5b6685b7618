use std::collections::HashMap;

use ndarray::IxDyn;

use crate::error::{CeilingError, Result};
use crate::metrics::Metric;
use crate::model::labeled::{Dim, Label, LabeledTensor};
use crate::model::score::Score;
use crate::report::{mean, nan_median, std_dev};

pub const SPLIT_DIM: &str = "split";

#[derive(Debug, Clone)]
pub struct PoolCorrelation {
    pub presentation_dim: String,
    pub unit_dim: String,
    pub n_splits: usize,
}

impl PoolCorrelation {
    pub fn new(presentation_dim: &str, unit_dim: &str, n_splits: usize) -> Self {
        Self {
            presentation_dim: presentation_dim.to_string(),
            unit_dim: unit_dim.to_string(),
            n_splits: n_splits.max(1),
        }
    }

    fn aligned_presentations(
        &self,
        pool: &LabeledTensor,
        heldout: &LabeledTensor,
    ) -> Result<Vec<(usize, usize)>> {
        let p_dim = &pool.dims()[pool.axis_index(&self.presentation_dim)?];
        let h_dim = &heldout.dims()[heldout.axis_index(&self.presentation_dim)?];
        let p_len = pool.len_of(&self.presentation_dim)?;
        let h_len = heldout.len_of(&self.presentation_dim)?;

        let Some(p_coord) = p_dim.coords.first() else {
            if p_len != h_len {
                return Err(CeilingError::NoOverlap(format!(
                    "unlabelled presentations differ in length ({p_len} vs {h_len})"
                )));
            }
            return Ok((0..p_len).map(|i| (i, i)).collect());
        };
        let h_coord = h_dim
            .coords
            .iter()
            .find(|c| c.name == p_coord.name)
            .ok_or_else(|| {
                CeilingError::NoOverlap(format!(
                    "held-out partition lacks presentation coordinate `{}`",
                    p_coord.name
                ))
            })?;

        let index: HashMap<&Label, usize> = p_coord
            .values
            .iter()
            .enumerate()
            .map(|(i, label)| (label, i))
            .collect();
        Ok(h_coord
            .values
            .iter()
            .enumerate()
            .filter_map(|(h, label)| index.get(label).map(|&p| (p, h)))
            .collect())
    }
}

impl Metric for PoolCorrelation {
    fn score(&self, pool: &LabeledTensor, heldout: &LabeledTensor) -> Result<Score> {
        for t in [pool, heldout] {
            if t.dims().len() != 2 {
                return Err(CeilingError::StructuralMismatch(format!(
                    "expected [{}, {}] tensors, got dims {:?}",
                    self.presentation_dim,
                    self.unit_dim,
                    t.dim_names()
                )));
            }
        }
        let n_heldout = heldout.len_of(&self.unit_dim)?;
        let n_pool = pool.len_of(&self.unit_dim)?;
        if n_heldout == 0 {
            return Err(CeilingError::DegenerateInput(
                "held-out partition has no units".to_string(),
            ));
        }
        if n_pool == 0 {
            return Err(CeilingError::DegenerateInput(
                "pool partition has no units".to_string(),
            ));
        }

        let pairs = self.aligned_presentations(pool, heldout)?;
        if pairs.is_empty() {
            return Err(CeilingError::NoOverlap(
                "pool and held-out share no presentations".to_string(),
            ));
        }
        if pairs.len() < 2 * self.n_splits {
            return Err(CeilingError::DegenerateInput(format!(
                "{} shared presentations cannot fill {} splits",
                pairs.len(),
                self.n_splits
            )));
        }

        let p_axis = pool.axis_index(&self.presentation_dim)?;
        let h_axis = heldout.axis_index(&self.presentation_dim)?;

        let predictor = pairs
            .iter()
            .map(|&(p, _)| {
                let row = (0..n_pool)
                    .map(|u| value_at(pool, p_axis, p, u))
                    .filter(|v| v.is_finite())
                    .collect::<Vec<_>>();
                mean(&row)
            })
            .collect::<Vec<_>>();

        let mut raw = vec![f64::NAN; n_heldout * self.n_splits];
        for split in 0..self.n_splits {
            let start = split * pairs.len() / self.n_splits;
            let end = (split + 1) * pairs.len() / self.n_splits;
            for unit in 0..n_heldout {
                let target = pairs[start..end]
                    .iter()
                    .map(|&(_, h)| value_at(heldout, h_axis, h, unit))
                    .collect::<Vec<_>>();
                raw[unit * self.n_splits + split] = pearson(&predictor[start..end], &target);
            }
        }

        let unit_means = (0..n_heldout)
            .map(|u| mean(&raw[u * self.n_splits..(u + 1) * self.n_splits]))
            .collect::<Vec<_>>();
        let split_medians = (0..self.n_splits)
            .map(|s| {
                let column = (0..n_heldout)
                    .map(|u| raw[u * self.n_splits + s])
                    .collect::<Vec<_>>();
                nan_median(&column)
            })
            .collect::<Vec<_>>();

        let unit_dim = heldout.dims()[heldout.axis_index(&self.unit_dim)?].clone();
        let split_dim = Dim::indexed(SPLIT_DIM, (0..self.n_splits).map(Label::from).collect());
        let raw = LabeledTensor::from_shape_vec(
            vec![unit_dim, split_dim],
            &[n_heldout, self.n_splits],
            raw,
        )?;

        Ok(Score::center_error(nan_median(&unit_means), std_dev(&split_medians))?
            .with_raw(Score::new(raw)))
    }
}

fn value_at(t: &LabeledTensor, presentation_axis: usize, presentation: usize, unit: usize) -> f64 {
    if presentation_axis == 0 {
        t.data()[IxDyn(&[presentation, unit])]
    } else {
        t.data()[IxDyn(&[unit, presentation])]
    }
}

pub fn pearson(x: &[f64], y: &[f64]) -> f64 {
    let pairs = x
        .iter()
        .zip(y)
        .filter(|(a, b)| a.is_finite() && b.is_finite())
        .map(|(a, b)| (*a, *b))
        .collect::<Vec<_>>();
    if pairs.len() < 2 {
        return f64::NAN;
    }
    let n = pairs.len() as f64;
    let mx = pairs.iter().map(|p| p.0).sum::<f64>() / n;
    let my = pairs.iter().map(|p| p.1).sum::<f64>() / n;
    let mut sxy = 0.0;
    let mut sxx = 0.0;
    let mut syy = 0.0;
    for (a, b) in &pairs {
        sxy += (a - mx) * (b - my);
        sxx += (a - mx) * (a - mx);
        syy += (b - my) * (b - my);
    }
    if sxx <= 0.0 || syy <= 0.0 {
        return f64::NAN;
    }
    sxy / (sxx * syy).sqrt()
}

#[cfg(test)]
#[path = "../../tests/src_inline/metrics/pool_correlation.rs"]
mod tests;
