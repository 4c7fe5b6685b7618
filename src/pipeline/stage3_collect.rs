use rand::Rng;
use tracing::{debug, info};

use crate::error::{CeilingError, Result};
use crate::metrics::Metric;
use crate::model::config::SubsetStrategy;
use crate::model::labeled::{Label, LabeledTensor, merge, unique_sorted};
use crate::model::score::{Score, SkipStats};
use crate::pipeline::stage1_holdout::{HoldoutSubjectCeiling, RECORD_DIM};
use crate::pipeline::stage2_subsample::{Selections, iterate_subsets, subsample_sizes};

pub const NUM_SUBJECTS: &str = "num_subjects";

pub type PostProcess = dyn Fn(Score) -> Result<Score>;

pub struct CollectInputs<'a> {
    pub holdout: &'a HoldoutSubjectCeiling,
    pub strategy: SubsetStrategy,
    pub post_process: Option<&'a PostProcess>,
}

pub fn collect<R: Rng + ?Sized>(
    assembly: &LabeledTensor,
    metric: &dyn Metric,
    inputs: &CollectInputs<'_>,
    rng: &mut R,
) -> Result<Score> {
    let holdout = inputs.holdout;
    let subjects = unique_sorted(assembly.coord_values(&holdout.subject_coord)?);

    let mut tables = Vec::new();
    let mut skips = SkipStats::default();

    for num_subjects in subsample_sizes(subjects.len()) {
        let combos = iterate_subsets(
            assembly,
            &holdout.subject_coord,
            &holdout.unit_dim,
            num_subjects,
            inputs.strategy,
            rng,
        )?;
        let mut n_subsets = 0usize;
        for item in combos {
            let (selections, sub_assembly) = item?;
            n_subsets += 1;
            let ceiling = holdout.run(&sub_assembly, metric)?;
            skips.absorb(&ceiling.skips());
            match tag_subset(&ceiling, &holdout.unit_dim, num_subjects, &selections) {
                Ok(table) => tables.push(table),
                Err(CeilingError::MissingStructuralKey(key)) => {
                    debug!(
                        "collect: skipping subset {:?} of size {num_subjects}: missing `{key}`",
                        selections
                            .iter()
                            .map(|(k, s)| format!("{k}={s}"))
                            .collect::<Vec<_>>()
                    );
                    skips.subsets += 1;
                }
                Err(e) => return Err(e),
            }
        }
        debug!("collect: {n_subsets} subsets of size {num_subjects}");
    }

    info!(
        "collect: {} subject(s), {} table(s), {} subset(s) skipped",
        subjects.len(),
        tables.len(),
        skips.subsets
    );

    let mut collected = Score::new(merge(&tables, RECORD_DIM)?);
    if let Some(post_process) = inputs.post_process {
        collected = post_process(collected)?;
    }
    collected.provenance.skips = Some(skips);
    Ok(collected)
}

fn tag_subset(
    ceiling: &Score,
    unit_dim: &str,
    num_subjects: usize,
    selections: &Selections,
) -> Result<LabeledTensor> {
    let table = match ceiling.raw() {
        Some(raw) => &raw.values,
        None => &ceiling.values,
    };
    if !table.has_level(unit_dim) {
        return Err(CeilingError::MissingStructuralKey(unit_dim.to_string()));
    }
    let mut tagged = table.clone().expand_dims(
        NUM_SUBJECTS,
        vec![(NUM_SUBJECTS.to_string(), Label::from(num_subjects))],
    )?;
    for (key, subset) in selections {
        let dim = format!("sub_{key}");
        tagged = tagged.expand_dims(&dim, vec![(dim.clone(), Label::from(subset.to_string()))])?;
    }
    Ok(tagged.stack(RECORD_DIM))
}

#[cfg(test)]
#[path = "../../tests/src_inline/pipeline/stage3_collect.rs"]
mod tests;
