use std::collections::HashMap;

use tracing::{debug, info, warn};

use crate::error::{CeilingError, Result};
use crate::model::config::CeilingConfig;
use crate::model::labeled::{Label, LabeledTensor, Reduction, merge};
use crate::model::score::Score;
use crate::pipeline::stage1_holdout::RECORD_DIM;
use crate::pipeline::stage5_extrapolate::extrapolate_unit;

pub fn unit_groups(
    table: &LabeledTensor,
    unit_dim: &str,
) -> Result<(Vec<String>, Vec<(Vec<Label>, Vec<usize>)>)> {
    if table.dim_names() != [RECORD_DIM] {
        return Err(CeilingError::StructuralMismatch(format!(
            "collected table must be one `{RECORD_DIM}` axis, got dims {:?}",
            table.dim_names()
        )));
    }
    let coords = table.level_coords(unit_dim);
    if coords.is_empty() {
        return Err(CeilingError::MissingStructuralKey(unit_dim.to_string()));
    }
    let names = coords.iter().map(|c| c.name.clone()).collect::<Vec<_>>();
    let n_rows = table.len_of(RECORD_DIM)?;

    let mut groups: Vec<(Vec<Label>, Vec<usize>)> = Vec::new();
    let mut index: HashMap<Vec<Label>, usize> = HashMap::new();
    for row in 0..n_rows {
        let key = coords.iter().map(|c| c.values[row].clone()).collect::<Vec<_>>();
        match index.get(&key) {
            Some(&g) => groups[g].1.push(row),
            None => {
                index.insert(key.clone(), groups.len());
                groups.push((key, vec![row]));
            }
        }
    }
    Ok((names, groups))
}

fn add_unit_meta(
    tensor: LabeledTensor,
    unit_dim: &str,
    meta: &[(String, Label)],
) -> Result<LabeledTensor> {
    tensor.expand_dims(unit_dim, meta.to_vec())
}

pub fn extrapolate(collected: &Score, config: &CeilingConfig) -> Result<Score> {
    let unit_dim = config.unit_dim.as_str();
    let table = &collected.values;
    let (names, groups) = unit_groups(table, unit_dim)?;

    let mut skips = collected.skips();
    let mut values = Vec::with_capacity(groups.len());
    let mut params = Vec::with_capacity(groups.len());
    let mut endpoints = Vec::with_capacity(groups.len());

    for (key, rows) in &groups {
        let meta = names
            .iter()
            .cloned()
            .zip(key.iter().cloned())
            .collect::<Vec<_>>();
        let unit_table = table.isel(RECORD_DIM, rows)?;
        let ceiling = match extrapolate_unit(&unit_table, config) {
            Ok(ceiling) => ceiling,
            Err(CeilingError::NoConvergedRounds { attempted }) => {
                debug!(
                    "extrapolate: skipping unit {:?}: none of {attempted} bootstrap rounds converged",
                    meta
                );
                skips.units += 1;
                continue;
            }
            Err(e) => return Err(e),
        };
        skips.absorb(&ceiling.skips());

        let provenance = ceiling.provenance;
        values.push(add_unit_meta(ceiling.values, unit_dim, &meta)?);
        if let Some(p) = provenance.bootstrapped_params {
            params.push(add_unit_meta(p, unit_dim, &meta)?);
        }
        if let Some(e) = provenance.endpoint_x {
            endpoints.push(add_unit_meta(e, unit_dim, &meta)?);
        }
    }

    info!(
        "extrapolate: {} of {} unit(s) extrapolated",
        values.len(),
        groups.len()
    );
    if skips.total() > 0 {
        warn!(
            "ceiling rests on fewer samples than requested: {} subject(s), {} subset(s), {} bootstrap round(s), {} unit(s) skipped",
            skips.subjects, skips.subsets, skips.bootstrap_rounds, skips.units
        );
    }

    if values.is_empty() {
        let mut ceiling = Score::center_interval(f64::NAN, f64::NAN, f64::NAN)?
            .with_raw(collected.clone());
        ceiling.provenance.skips = Some(skips);
        return Ok(ceiling);
    }

    let mut per_unit = Score::new(merge(&values, unit_dim)?).with_raw(collected.clone());
    per_unit.provenance.bootstrapped_params = Some(merge(&params, unit_dim)?);
    per_unit.provenance.endpoint_x = Some(merge(&endpoints, unit_dim)?);

    let mut ceiling = Score::new(per_unit.values.reduce(unit_dim, Reduction::NanMedian)?);
    if let Some(p) = &per_unit.provenance.bootstrapped_params {
        ceiling.provenance.bootstrapped_params = Some(p.reduce(unit_dim, Reduction::NanMedian)?);
    }
    if let Some(e) = &per_unit.provenance.endpoint_x {
        ceiling.provenance.endpoint_x = Some(e.reduce(unit_dim, Reduction::NanMedian)?);
    }
    ceiling.provenance.skips = Some(skips);
    Ok(ceiling.with_raw(per_unit))
}

#[cfg(test)]
#[path = "../../tests/src_inline/pipeline/stage6_aggregate.rs"]
mod tests;
