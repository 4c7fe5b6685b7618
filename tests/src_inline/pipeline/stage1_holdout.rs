
use super::*;

use crate::error::CeilingError;
use crate::model::labeled::Dim;
use crate::model::score::{AGGREGATION, CENTER, ERROR};

fn four_subjects() -> LabeledTensor {
    let subjects = ["A", "A", "B", "B", "C", "C", "D", "D"];
    LabeledTensor::from_shape_vec(
        vec![
            Dim::indexed("presentation", (0..3usize).map(Label::from).collect()),
            Dim::indexed("neuroid", (0..8usize).map(Label::from).collect())
                .with_coord("subject", subjects.iter().map(|s| Label::from(*s)).collect()),
        ],
        &[3, 8],
        (0..24).map(|v| v as f64).collect(),
    )
    .unwrap()
}

fn constant_metric(pool: &LabeledTensor, heldout: &LabeledTensor) -> Result<Score> {
    assert!(pool.len() > 0 && heldout.len() > 0);
    Score::center_error(0.5, 0.0)
}

#[test]
fn test_constant_metric_four_subjects() {
    let holdout = HoldoutSubjectCeiling::new("subject", "neuroid");
    let score = holdout.run(&four_subjects(), &constant_metric).unwrap();
    assert_eq!(score.center().unwrap(), 0.5);
    assert_eq!(score.aggregation(ERROR).unwrap().item().unwrap(), 0.0);
    assert_eq!(score.skips().subjects, 0);

    let per_subject = score.provenance.per_subject.as_ref().unwrap();
    assert_eq!(per_subject.dim_names(), vec!["subject", AGGREGATION]);
    assert_eq!(
        per_subject.coord_values("subject").unwrap(),
        &["A", "B", "C", "D"].map(Label::from)[..]
    );
    let centers = per_subject.sel(AGGREGATION, &Label::from(CENTER)).unwrap();
    assert_eq!(centers.to_vec(), vec![0.5; 4]);
}

#[test]
fn test_pool_and_heldout_partition_by_subject() {
    let holdout = HoldoutSubjectCeiling::new("subject", "neuroid");
    let metric = |pool: &LabeledTensor, heldout: &LabeledTensor| -> Result<Score> {
        let held = unique_sorted(heldout.coord_values("subject")?);
        assert_eq!(held.len(), 1);
        assert!(!pool.coord_values("subject")?.contains(&held[0]));
        assert_eq!(pool.len_of("neuroid")?, 6);
        Score::center_error(0.5, 0.0)
    };
    holdout.run(&four_subjects(), &metric).unwrap();
}

#[test]
fn test_error_is_std_of_subject_centers() {
    let holdout = HoldoutSubjectCeiling::new("subject", "neuroid");
    let metric = |_: &LabeledTensor, heldout: &LabeledTensor| -> Result<Score> {
        let center = match heldout.coord_values("subject")?[0].to_string().as_str() {
            "A" | "B" => 0.2,
            _ => 0.6,
        };
        Score::center_error(center, 99.0)
    };
    let score = holdout.run(&four_subjects(), &metric).unwrap();
    assert!((score.center().unwrap() - 0.4).abs() < 1e-12);
    assert!((score.aggregation(ERROR).unwrap().item().unwrap() - 0.2).abs() < 1e-12);
}

#[test]
fn test_no_overlap_subject_is_skipped() {
    let holdout = HoldoutSubjectCeiling::new("subject", "neuroid");
    let metric = |_: &LabeledTensor, heldout: &LabeledTensor| -> Result<Score> {
        if heldout.coord_values("subject")?[0] == Label::from("B") {
            return Err(CeilingError::NoOverlap("B".to_string()));
        }
        Score::center_error(0.5, 0.0)
    };
    let score = holdout.run(&four_subjects(), &metric).unwrap();
    assert_eq!(score.center().unwrap(), 0.5);
    assert_eq!(score.skips().subjects, 1);
}

#[test]
fn test_all_subjects_failing_is_fatal() {
    let holdout = HoldoutSubjectCeiling::new("subject", "neuroid");
    let metric = |_: &LabeledTensor, _: &LabeledTensor| -> Result<Score> {
        Err(CeilingError::DegenerateInput("empty".to_string()))
    };
    assert!(matches!(
        holdout.run(&four_subjects(), &metric),
        Err(CeilingError::EmptyMerge(_))
    ));
}

#[test]
fn test_unrecognized_error_propagates() {
    let holdout = HoldoutSubjectCeiling::new("subject", "neuroid");
    let metric = |_: &LabeledTensor, _: &LabeledTensor| -> Result<Score> {
        Err(CeilingError::Metric("boom".to_string()))
    };
    assert!(matches!(
        holdout.run(&four_subjects(), &metric),
        Err(CeilingError::Metric(_))
    ));
}

#[test]
fn test_restricted_subject_iteration() {
    let holdout = HoldoutSubjectCeiling::new("subject", "neuroid");
    let seen = std::cell::RefCell::new(Vec::new());
    let metric = |_: &LabeledTensor, heldout: &LabeledTensor| -> Result<Score> {
        seen.borrow_mut()
            .push(heldout.coord_values("subject")?[0].clone());
        Score::center_error(0.5, 0.0)
    };
    holdout
        .run_subjects(&four_subjects(), &metric, &[Label::from("C")])
        .unwrap();
    assert_eq!(seen.into_inner(), vec![Label::from("C")]);
}

#[test]
fn test_raw_tables_are_stacked_per_subject() {
    let holdout = HoldoutSubjectCeiling::new("subject", "neuroid");
    let metric = |_: &LabeledTensor, heldout: &LabeledTensor| -> Result<Score> {
        let units = heldout.dims()[heldout.axis_index("neuroid")?].clone();
        let n = heldout.len_of("neuroid")?;
        let raw = LabeledTensor::vector(units, vec![0.5; n])?;
        Ok(Score::center_error(0.5, 0.0)?.with_raw(Score::new(raw)))
    };
    let score = holdout.run(&four_subjects(), &metric).unwrap();
    let raw = score.raw().unwrap();
    assert_eq!(raw.values.dim_names(), vec![RECORD_DIM]);
    assert_eq!(raw.values.len(), 8);
    assert!(raw.values.has_level("neuroid"));
}
