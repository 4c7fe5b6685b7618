
use super::*;

use crate::model::config::SubsetStrategy;
use crate::model::labeled::{Dim, Label};

fn assembly() -> LabeledTensor {
    LabeledTensor::from_shape_vec(
        vec![
            Dim::indexed("presentation", vec![Label::from("p0")]),
            Dim::indexed("neuroid", vec![Label::from(0usize), Label::from(1usize)])
                .with_coord("subject", vec![Label::from("A"), Label::from("B")]),
        ],
        &[1, 2],
        vec![0.25, f64::NAN],
    )
    .unwrap()
}

#[test]
fn test_write_then_load_assembly() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("assembly.json");
    write_assembly(&path, &assembly()).unwrap();
    let loaded = load_assembly(&path, &CeilingConfig::default_v1()).unwrap();
    assert_eq!(loaded.dims(), assembly().dims());
    assert_eq!(loaded.to_vec()[0], 0.25);
    assert!(loaded.to_vec()[1].is_nan());
}

#[test]
fn test_load_requires_subject_on_unit_axis() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("assembly.json");
    write_assembly(&path, &assembly()).unwrap();
    let config = CeilingConfig {
        subject_coord: "presentation".to_string(),
        ..CeilingConfig::default_v1()
    };
    assert!(matches!(
        load_assembly(&path, &config),
        Err(CeilingError::StructuralMismatch(_))
    ));
    let config = CeilingConfig {
        unit_dim: "voxel".to_string(),
        ..CeilingConfig::default_v1()
    };
    assert!(matches!(
        load_assembly(&path, &config),
        Err(CeilingError::MissingStructuralKey(_))
    ));
}

#[test]
fn test_missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = load_assembly(&dir.path().join("absent.json"), &CeilingConfig::default_v1())
        .unwrap_err();
    assert!(matches!(err, CeilingError::Io(_)));
}

#[test]
fn test_load_config_fills_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(
        &path,
        r#"{"num_bootstraps": 7, "subset_strategy": {"kind": "random", "max_subsets": 4}}"#,
    )
    .unwrap();
    let config = load_config(&path).unwrap();
    assert_eq!(config.num_bootstraps, 7);
    assert_eq!(config.unit_dim, "neuroid");
    assert_eq!(config.subset_strategy, SubsetStrategy::Random { max_subsets: 4 });
}

#[test]
fn test_load_config_rejects_invalid() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(&path, r#"{"num_bootstraps": 0}"#).unwrap();
    assert!(matches!(load_config(&path), Err(CeilingError::Config(_))));
}
