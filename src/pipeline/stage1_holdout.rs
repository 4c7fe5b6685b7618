use tracing::debug;

use crate::error::Result;
use crate::metrics::Metric;
use crate::model::labeled::{Label, LabeledTensor, Reduction, merge, unique_sorted};
use crate::model::score::{AGGREGATION, CENTER, ERROR, Score, SkipStats};

pub const RECORD_DIM: &str = "record";

#[derive(Debug, Clone)]
pub struct HoldoutSubjectCeiling {
    pub subject_coord: String,
    pub unit_dim: String,
}

impl HoldoutSubjectCeiling {
    pub fn new(subject_coord: &str, unit_dim: &str) -> Self {
        Self {
            subject_coord: subject_coord.to_string(),
            unit_dim: unit_dim.to_string(),
        }
    }

    pub fn subjects(&self, assembly: &LabeledTensor) -> Result<Vec<Label>> {
        Ok(unique_sorted(assembly.coord_values(&self.subject_coord)?))
    }

    pub fn run(&self, assembly: &LabeledTensor, metric: &dyn Metric) -> Result<Score> {
        let subjects = self.subjects(assembly)?;
        self.run_subjects(assembly, metric, &subjects)
    }

    pub fn run_subjects(
        &self,
        assembly: &LabeledTensor,
        metric: &dyn Metric,
        subjects: &[Label],
    ) -> Result<Score> {
        let subject_values = assembly.coord_values(&self.subject_coord)?.to_vec();

        let mut values = Vec::with_capacity(subjects.len());
        let mut raws = Vec::with_capacity(subjects.len());
        let mut skips = SkipStats::default();

        for subject in subjects {
            let heldout_mask = subject_values.iter().map(|s| s == subject).collect::<Vec<_>>();
            let pool_mask = heldout_mask.iter().map(|m| !m).collect::<Vec<_>>();
            let heldout = assembly.filter(&self.unit_dim, &heldout_mask)?;
            let pool = assembly.filter(&self.unit_dim, &pool_mask)?;

            let score = match metric.score(&pool, &heldout) {
                Ok(score) => score,
                Err(e) if e.skips_subject() => {
                    debug!("holdout: skipping subject {subject}: {e}");
                    skips.subjects += 1;
                    continue;
                }
                Err(e) => return Err(e),
            };

            if let Some(raw) = score.raw() {
                raws.push(raw.values.stack(RECORD_DIM));
            }
            values.push(score.values.expand_dims(
                &self.subject_coord,
                vec![(self.subject_coord.clone(), subject.clone())],
            )?);
        }

        let per_subject = merge(&values, &self.subject_coord)?;
        let error = per_subject
            .sel(AGGREGATION, &Label::from(CENTER))?
            .reduce(&self.subject_coord, Reduction::Std)?;
        let mut aggregated = per_subject.reduce(&self.subject_coord, Reduction::Mean)?;
        aggregated.assign_sel(AGGREGATION, &Label::from(ERROR), &error)?;

        let mut score = Score::new(aggregated);
        if !raws.is_empty() {
            score = score.with_raw(Score::new(merge(&raws, RECORD_DIM)?));
        }
        score.provenance.per_subject = Some(per_subject);
        score.provenance.skips = Some(skips);
        Ok(score)
    }
}

#[cfg(test)]
#[path = "../../tests/src_inline/pipeline/stage1_holdout.rs"]
mod tests;
