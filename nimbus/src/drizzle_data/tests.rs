use std::path::Path;

use glam::DVec2;

use super::*;

const SAMPLE_YAML: &str = r#"
source_file_path: /data/registered/light_001_r.tif
reference_width: 8
reference_height: 6
alignment_origin: [0.0, 0.0]
alignment_matrix: [1.0, 0.0, 0.5, 0.0, 1.0, -0.25, 0.0, 0.0]
integration:
  location: [0.1, 0.2, 0.3]
  reference_location: [0.15, 0.25, 0.35]
  scale: [1.0, 1.1, 0.9]
weight: [1.0, 0.8, 1.2]
rejection:
  low_count: [1, 0, 0]
  high_count: [0, 2, 0]
  pixels:
    - [1, 2, 0]
    - [3, 4, 1]
    - [7, 5, 1]
pedestal: 0.001
"#;

fn write_sample(dir: &Path, name: &str, text: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, text).unwrap();
    path
}

#[test]
fn test_load_yaml_metadata() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_sample(dir.path(), "light_001.xdrz.yaml", SAMPLE_YAML);
    let data = DrizzleData::load(&path).unwrap();

    assert_eq!(data.num_channels(), 3);
    assert_eq!((data.reference_width, data.reference_height), (8, 6));
    assert!(data.has_alignment_matrix());
    assert!(!data.has_alignment_splines());
    assert!(!data.has_local_distortion_model());
    assert!(data.has_integration_data());
    assert!(data.has_rejection_data());
    assert!(data.has_image_weights());
    assert!(!data.has_adaptive_normalization_data());
    assert_eq!(data.pedestal, 0.001);
    assert_eq!(
        data.homography().apply(DVec2::new(1.0, 1.0)),
        DVec2::new(1.5, 0.75)
    );

    let g = data.scale_and_zero_offset();
    assert_eq!(g.location, vec![0.1, 0.2, 0.3]);
    assert_eq!(g.reference_location, vec![0.15, 0.25, 0.35]);

    assert_eq!(data.channel_weight(1, true), 0.8);
    assert_eq!(data.channel_weight(1, false), 1.0);
}

#[test]
fn test_rejection_map() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_sample(dir.path(), "light_001.xdrz.yaml", SAMPLE_YAML);
    let data = DrizzleData::load(&path).unwrap();
    let rejection = data.rejection.as_ref().unwrap();
    let map = RejectionMap::new(rejection, 8, 6, 3);

    assert!(map.is_rejected(1, 2, 0));
    assert!(!map.is_rejected(1, 2, 1));
    assert!(map.is_rejected(7, 5, 1));
    assert!(!map.is_rejected(7, 5, 5));
    assert_eq!(map.rejected_count(1), 2);
    assert_eq!(map.rejected_count(2), 0);
    assert_eq!((rejection.low(0), rejection.high(1), rejection.high(9)), (1, 2, 0));
}

#[test]
fn test_json_metadata_and_missing_weights() {
    let dir = tempfile::tempdir().unwrap();
    let json = r#"{
        "reference_width": 4,
        "reference_height": 4,
        "integration": { "location": [0.1], "reference_location": [0.1], "scale": [1.0] }
    }"#;
    let path = write_sample(dir.path(), "frame.json", json);
    let data = DrizzleData::load(&path).unwrap();
    assert!(!data.has_alignment_matrix());
    assert!(!data.has_image_weights());
    assert_eq!(data.channel_weight(0, true), 1.0);
    assert_eq!(data.homography(), Homography::IDENTITY);
    assert_eq!(data.alignment_origin, DVec2::ZERO);
}

#[test]
fn test_validation_errors() {
    let base = DrizzleData {
        reference_width: 4,
        reference_height: 4,
        integration: Some(IntegrationData {
            location: vec![0.1, 0.2],
            reference_location: vec![0.1, 0.2],
            scale: vec![1.0, 1.0],
        }),
        ..Default::default()
    };
    assert!(base.validate().is_ok());

    let mut d = base.clone();
    d.reference_width = 0;
    assert!(matches!(
        d.validate(),
        Err(DrizzleDataError::InvalidReferenceGeometry { width: 0, height: 4 })
    ));

    let mut d = base.clone();
    d.integration.as_mut().unwrap().scale.pop();
    assert!(matches!(
        d.validate(),
        Err(DrizzleDataError::InconsistentIntegrationData)
    ));

    let mut d = base.clone();
    d.weight = vec![1.0];
    assert!(matches!(
        d.validate(),
        Err(DrizzleDataError::InvalidWeights { expected: 2, found: 1 })
    ));

    let mut d = base.clone();
    d.rejection = Some(RejectionData {
        pixels: vec![[0, 4, 0]],
        ..Default::default()
    });
    assert!(matches!(
        d.validate(),
        Err(DrizzleDataError::RejectionPixelOutOfRange { x: 0, y: 4, channel: 0 })
    ));

    let mut d = base;
    d.rejection = Some(RejectionData {
        low_count: vec![1, 2, 3],
        ..Default::default()
    });
    assert!(matches!(
        d.validate(),
        Err(DrizzleDataError::InvalidRejectionCounts { expected: 2, low: 3, high: 0 })
    ));
}

#[test]
fn test_load_errors_carry_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_sample(dir.path(), "broken.yaml", "reference_width: [not a number]");
    let err = DrizzleData::load(&path).unwrap_err();
    assert!(err.to_string().contains("broken.yaml"), "{err}");

    let err = DrizzleData::load(&dir.path().join("frame.xdrz")).unwrap_err();
    assert!(matches!(err, DrizzleDataError::Load { .. }));
}
