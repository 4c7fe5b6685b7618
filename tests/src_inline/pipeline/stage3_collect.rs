
use super::*;

use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::model::labeled::Dim;

fn assembly() -> LabeledTensor {
    let subjects = ["A", "B", "C", "D"];
    LabeledTensor::from_shape_vec(
        vec![
            Dim::indexed("presentation", (0..2usize).map(Label::from).collect()),
            Dim::indexed("neuroid", (0..4usize).map(Label::from).collect())
                .with_coord("subject", subjects.iter().map(|s| Label::from(*s)).collect()),
        ],
        &[2, 4],
        vec![0.0; 8],
    )
    .unwrap()
}

fn pool_subjects(pool: &LabeledTensor) -> Result<usize> {
    Ok(unique_sorted(pool.coord_values("subject")?).len())
}

// collected values equal `num_subjects - 1`
fn per_unit_metric(pool: &LabeledTensor, heldout: &LabeledTensor) -> Result<Score> {
    let n_pool = pool_subjects(pool)? as f64;
    let units = heldout.dims()[heldout.axis_index("neuroid")?].clone();
    let n = heldout.len_of("neuroid")?;
    let raw = LabeledTensor::vector(units, vec![n_pool; n])?;
    Ok(Score::center_error(n_pool, 0.0)?.with_raw(Score::new(raw)))
}

fn run(metric: &dyn Metric, post_process: Option<&PostProcess>) -> Result<Score> {
    let holdout = HoldoutSubjectCeiling::new("subject", "neuroid");
    let inputs = CollectInputs {
        holdout: &holdout,
        strategy: SubsetStrategy::Exhaustive,
        post_process,
    };
    let mut rng = StdRng::seed_from_u64(0);
    collect(&assembly(), metric, &inputs, &mut rng)
}

#[test]
fn test_collect_builds_long_table() {
    let collected = run(&per_unit_metric, None).unwrap();
    let table = &collected.values;
    assert_eq!(table.dim_names(), vec![RECORD_DIM]);
    // C(4,2)*2 + C(4,3)*3 + C(4,4)*4
    assert_eq!(table.len(), 28);

    let ks = table.coord_values(NUM_SUBJECTS).unwrap();
    for (k, v) in ks.iter().zip(table.to_vec()) {
        assert_eq!(v, (k.as_int().unwrap() - 1) as f64);
    }
    assert!(table.has_level("neuroid"));
    assert_eq!(
        table.coord("sub_subject").unwrap().1.values[0],
        Label::from("(A, B)")
    );
    assert_eq!(collected.skips(), SkipStats::default());
}

#[test]
fn test_subset_without_unit_axis_is_skipped() {
    let metric = |pool: &LabeledTensor, heldout: &LabeledTensor| -> Result<Score> {
        if pool_subjects(pool)? == 1 {
            return Score::center_error(1.0, 0.0);
        }
        per_unit_metric(pool, heldout)
    };
    let collected = run(&metric, None).unwrap();
    // only sizes 3 and 4 survive
    assert_eq!(collected.values.len(), 16);
    assert_eq!(collected.skips().subsets, 6);
}

#[test]
fn test_structural_mismatch_propagates() {
    let metric = |_: &LabeledTensor, _: &LabeledTensor| -> Result<Score> {
        Err(CeilingError::StructuralMismatch("bad".to_string()))
    };
    assert!(matches!(
        run(&metric, None),
        Err(CeilingError::StructuralMismatch(_))
    ));
}

#[test]
fn test_score_without_aggregation_axis_is_fatal() {
    let metric = |_: &LabeledTensor, _: &LabeledTensor| -> Result<Score> {
        let other = Dim::indexed("other", vec![Label::from(0usize)]);
        Ok(Score::new(LabeledTensor::vector(other, vec![0.5])?))
    };
    assert!(matches!(
        run(&metric, None),
        Err(CeilingError::MissingStructuralKey(key)) if key == "aggregation"
    ));
}

#[test]
fn test_subject_skips_are_counted() {
    let metric = |pool: &LabeledTensor, heldout: &LabeledTensor| -> Result<Score> {
        if heldout.coord_values("subject")?[0] == Label::from("D") {
            return Err(CeilingError::NoOverlap("D".to_string()));
        }
        per_unit_metric(pool, heldout)
    };
    let collected = run(&metric, None).unwrap();
    // D is held out once in each of 3 + 3 + 1 subsets
    assert_eq!(collected.skips().subjects, 7);
}

#[test]
fn test_post_process_runs_on_collected_table() {
    let post = |mut score: Score| -> Result<Score> {
        score.provenance.endpoint_x = Some(LabeledTensor::scalar(-1.0));
        Ok(score)
    };
    let collected = run(&per_unit_metric, Some(&post)).unwrap();
    assert_eq!(
        collected.provenance.endpoint_x.unwrap().item().unwrap(),
        -1.0
    );
}
