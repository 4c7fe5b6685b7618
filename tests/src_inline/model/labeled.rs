
use super::*;

fn grid() -> LabeledTensor {
    // presentation x neuroid, neuroids 0,1 from subject A and 2 from B
    LabeledTensor::from_shape_vec(
        vec![
            Dim::indexed("presentation", vec![Label::from("p0"), Label::from("p1")]),
            Dim::indexed("neuroid", (0..3usize).map(Label::from).collect()).with_coord(
                "subject",
                vec![Label::from("A"), Label::from("A"), Label::from("B")],
            ),
        ],
        &[2, 3],
        vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0],
    )
    .unwrap()
}

#[test]
fn test_new_rejects_bad_coordinate_length() {
    let err = LabeledTensor::from_shape_vec(
        vec![Dim::indexed("x", vec![Label::from(0usize)])],
        &[2],
        vec![1.0, 2.0],
    )
    .unwrap_err();
    assert!(matches!(err, CeilingError::StructuralMismatch(_)));
}

#[test]
fn test_new_rejects_duplicate_dims() {
    let err = LabeledTensor::from_shape_vec(
        vec![Dim::new("x"), Dim::new("x")],
        &[1, 1],
        vec![1.0],
    )
    .unwrap_err();
    assert!(matches!(err, CeilingError::StructuralMismatch(_)));
}

#[test]
fn test_filter_by_mask() {
    let t = grid();
    let mask = t
        .coord_values("subject")
        .unwrap()
        .iter()
        .map(|s| *s == Label::from("A"))
        .collect::<Vec<_>>();
    let a = t.filter("neuroid", &mask).unwrap();
    assert_eq!(a.shape(), &[2, 2]);
    assert_eq!(a.to_vec(), vec![1.0, 2.0, 4.0, 5.0]);
    assert_eq!(
        a.coord_values("neuroid").unwrap(),
        &[Label::from(0usize), Label::from(1usize)]
    );
}

#[test]
fn test_filter_mask_length_mismatch() {
    let t = grid();
    assert!(t.filter("neuroid", &[true]).is_err());
}

#[test]
fn test_missing_axis_is_structural_key() {
    let t = grid();
    assert!(matches!(
        t.axis_index("z"),
        Err(CeilingError::MissingStructuralKey(_))
    ));
}

#[test]
fn test_walk_coords_yields_triples() {
    let t = grid();
    let walked = t
        .walk_coords()
        .map(|(c, d, v)| (c.to_string(), d.to_string(), v.len()))
        .collect::<Vec<_>>();
    assert_eq!(
        walked,
        vec![
            ("presentation".to_string(), "presentation".to_string(), 2),
            ("neuroid".to_string(), "neuroid".to_string(), 3),
            ("subject".to_string(), "neuroid".to_string(), 3),
        ]
    );
}

#[test]
fn test_reduce_mean_and_std() {
    let t = grid();
    let m = t.reduce("presentation", Reduction::Mean).unwrap();
    assert_eq!(m.dim_names(), vec!["neuroid"]);
    assert_eq!(m.to_vec(), vec![2.5, 3.5, 4.5]);
    let s = t.reduce("presentation", Reduction::Std).unwrap();
    assert_eq!(s.to_vec(), vec![1.5, 1.5, 1.5]);
}

#[test]
fn test_reduce_nan_median_skips_nan() {
    let t = LabeledTensor::vector(Dim::new("u"), vec![1.0, f64::NAN, 3.0]).unwrap();
    let m = t.reduce("u", Reduction::NanMedian).unwrap();
    assert_eq!(m.item().unwrap(), 2.0);
    let plain = t.reduce("u", Reduction::Median).unwrap();
    assert!(plain.item().unwrap().is_nan());
}

#[test]
fn test_sel_and_assign_sel() {
    let mut t = grid();
    let row = t.sel("presentation", &Label::from("p1")).unwrap();
    assert_eq!(row.to_vec(), vec![4.0, 5.0, 6.0]);

    let zeros = LabeledTensor::vector(
        t.dims()[1].clone(),
        vec![0.0, 0.0, 0.0],
    )
    .unwrap();
    t.assign_sel("presentation", &Label::from("p0"), &zeros).unwrap();
    assert_eq!(t.to_vec(), vec![0.0, 0.0, 0.0, 4.0, 5.0, 6.0]);
}

#[test]
fn test_sel_unknown_label() {
    let t = grid();
    assert!(matches!(
        t.sel("presentation", &Label::from("p9")),
        Err(CeilingError::MissingStructuralKey(_))
    ));
}

#[test]
fn test_assign_sel_rejects_wrong_dims() {
    let mut t = grid();
    let other = LabeledTensor::vector(Dim::new("other"), vec![0.0, 0.0, 0.0]).unwrap();
    assert!(t.assign_sel("presentation", &Label::from("p0"), &other).is_err());
}

#[test]
fn test_expand_dims_adds_leading_singleton() {
    let t = grid()
        .expand_dims("run", vec![("run".to_string(), Label::from(7i64))])
        .unwrap();
    assert_eq!(t.shape(), &[1, 2, 3]);
    assert_eq!(t.coord_values("run").unwrap(), &[Label::from(7i64)]);
    assert!(
        t.clone()
            .expand_dims("run", Vec::new())
            .is_err()
    );
}

#[test]
fn test_stack_keeps_origin_levels() {
    let stacked = grid().stack("record");
    assert_eq!(stacked.shape(), &[6]);
    assert_eq!(stacked.to_vec(), vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    assert_eq!(
        stacked.coord_values("subject").unwrap(),
        &[
            Label::from("A"),
            Label::from("A"),
            Label::from("B"),
            Label::from("A"),
            Label::from("A"),
            Label::from("B"),
        ]
    );
    assert!(stacked.has_level("neuroid"));
    assert!(stacked.has_level("presentation"));
    let unit_coords = stacked
        .level_coords("neuroid")
        .iter()
        .map(|c| c.name.clone())
        .collect::<Vec<_>>();
    assert_eq!(unit_coords, vec!["neuroid".to_string(), "subject".to_string()]);

    let restacked = stacked
        .expand_dims("k", vec![("k".to_string(), Label::from(2usize))])
        .unwrap()
        .stack("record");
    assert_eq!(
        restacked.coord("subject").unwrap().1.level.as_deref(),
        Some("neuroid")
    );
    assert_eq!(restacked.coord("k").unwrap().1.level.as_deref(), Some("k"));
}

#[test]
fn test_merge_single_element_unchanged() {
    let t = grid();
    let merged = merge(std::slice::from_ref(&t), "neuroid").unwrap();
    assert_eq!(merged, t);
}

#[test]
fn test_merge_concatenates_along_axis() {
    let t = grid();
    let a = t.isel("neuroid", &[0, 1]).unwrap();
    let b = t.isel("neuroid", &[2]).unwrap();
    let merged = merge(&[a, b], "neuroid").unwrap();
    assert_eq!(merged, t);
}

#[test]
fn test_merge_rejects_mismatched_other_axis() {
    let t = grid();
    let a = t.isel("neuroid", &[0]).unwrap();
    let b = t
        .isel("neuroid", &[1])
        .unwrap()
        .isel("presentation", &[1, 0])
        .unwrap();
    assert!(matches!(
        merge(&[a, b], "neuroid"),
        Err(CeilingError::StructuralMismatch(_))
    ));
}

#[test]
fn test_merge_rejects_mismatched_keys() {
    let a = LabeledTensor::vector(Dim::indexed("u", vec![Label::from(0usize)]), vec![1.0]).unwrap();
    let b = LabeledTensor::vector(
        Dim::indexed("u", vec![Label::from(1usize)]).with_coord("extra", vec![Label::from("x")]),
        vec![2.0],
    )
    .unwrap();
    assert!(matches!(
        merge(&[a, b], "u"),
        Err(CeilingError::StructuralMismatch(_))
    ));
}

#[test]
fn test_merge_empty_is_error() {
    assert!(matches!(
        merge(&[], "neuroid"),
        Err(CeilingError::EmptyMerge(_))
    ));
}

#[test]
fn test_json_maps_nan_to_null() {
    let t = LabeledTensor::vector(Dim::new("u"), vec![1.0, f64::NAN]).unwrap();
    let json = serde_json::to_string(&t).unwrap();
    assert!(json.contains("null"));
    let back: LabeledTensor = serde_json::from_str(&json).unwrap();
    assert_eq!(back.to_vec()[0], 1.0);
    assert!(back.to_vec()[1].is_nan());
}

#[test]
fn test_unique_sorted() {
    let values = vec![Label::from("B"), Label::from("A"), Label::from("B")];
    assert_eq!(unique_sorted(&values), vec![Label::from("A"), Label::from("B")]);
}
