use std::sync::Arc;

use glam::DVec2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::local::GlobalNormalization;
use super::*;
use crate::common::Buffer2;
use crate::image::PlanarImage;
use crate::math::statistics::ScaleEstimator;

// ============================================================================
// Helpers
// ============================================================================

fn corner_coordinates() -> Vec<DVec2> {
    vec![
        DVec2::new(16.0, 16.0),
        DVec2::new(48.0, 16.0),
        DVec2::new(16.0, 48.0),
        DVec2::new(48.0, 48.0),
    ]
}

fn constant_local_file(scale: f32, offset: f32) -> LocalNormalizationFile {
    LocalNormalizationFile {
        reference_width: 64,
        reference_height: 32,
        matrix_width: 4,
        matrix_height: 2,
        scale: vec![vec![scale; 8]],
        offset: vec![vec![offset; 8]],
        relative_scale_factors: vec![1.25],
        ..Default::default()
    }
}

fn constant_table() -> AdaptiveNormalizationTable {
    let n = 4;
    AdaptiveNormalizationTable {
        coordinates: corner_coordinates(),
        location: vec![vec![0.5; n]],
        scale_low: vec![vec![2.0; n]],
        scale_high: vec![vec![1.5; n]],
        zero_offset_low: vec![vec![0.1; n]],
        zero_offset_high: vec![vec![-0.2; n]],
    }
}

fn global() -> ScaleAndZeroOffset {
    ScaleAndZeroOffset {
        location: vec![0.2],
        scale: vec![2.0],
        reference_location: vec![0.3],
    }
}

// ============================================================================
// Strategy selection
// ============================================================================

#[test]
fn test_select_priority() {
    let local = Arc::new(LocalNormalizationData::from_file(constant_local_file(1.0, 0.0)).unwrap());
    let adaptive = Arc::new(AdaptiveNormalizationInterpolation::new(64, 64, &constant_table()).unwrap());

    let n = Normalization::select(true, Some(local.clone()), Some(adaptive.clone()), global());
    assert_eq!(n.kind(), NormalizationKind::Local);

    let n = Normalization::select(true, None, Some(adaptive), global());
    assert_eq!(n.kind(), NormalizationKind::Adaptive);

    let n = Normalization::select(true, None, None, global());
    assert_eq!(n.kind(), NormalizationKind::ScaleAndZeroOffset);

    let n = Normalization::select(false, Some(local), None, global());
    assert_eq!(n.kind(), NormalizationKind::None);
}

#[test]
fn test_scale_and_zero_offset_and_none() {
    let n = Normalization::ScaleAndZeroOffset(global());
    assert!((n.apply(0.25, 3, 4, 0) - 0.4).abs() < 1e-12);
    assert_eq!(Normalization::None.apply(0.25, 3, 4, 0), 0.25);
    assert_eq!(NormalizationKind::ScaleAndZeroOffset.to_string(), "ScaleAndZeroOffset");
}

// ============================================================================
// Local normalization
// ============================================================================

#[test]
fn test_local_apply_constant_matrices() {
    let data = LocalNormalizationData::from_file(constant_local_file(2.0, 0.1)).unwrap();
    assert!(data.has_interpolations());
    assert_eq!(data.num_channels(), 1);
    assert_eq!((data.reference_width(), data.reference_height()), (64, 32));
    assert_eq!(data.relative_scale_factors(), &[1.25]);

    let n = Normalization::Local(Arc::new(data));
    assert!((n.apply(0.3, 10, 20, 0) - 0.7).abs() < 1e-6);
}

#[test]
fn test_local_apply_gradient_and_global() {
    let mut file = constant_local_file(1.0, 0.0);
    // Offset grows along x: node i at reference x = 16·i.
    file.offset = vec![vec![0.0, 0.1, 0.2, 0.3, 0.0, 0.1, 0.2, 0.3]];
    file.global = Some(GlobalNormalization {
        reference_center: vec![0.5],
        target_center: vec![0.25],
        scale: vec![1.0],
    });
    let data = LocalNormalizationData::from_file(file).unwrap();

    // x = 24 lies halfway between nodes 1 and 2: offset 0.15.
    let v = data.apply(0.5, 24, 0, 0);
    assert!((v - (0.5 + 0.15 - 0.25 + 0.5)).abs() < 1e-6, "v = {v}");
}

#[test]
fn test_local_rejects_bad_data() {
    let mut file = constant_local_file(1.0, 0.0);
    file.version = 1;
    assert!(matches!(
        LocalNormalizationData::from_file(file),
        Err(LocalNormalizationError::UnsupportedVersion { version: 1 })
    ));

    let mut file = constant_local_file(1.0, 0.0);
    file.invalid = true;
    assert!(matches!(
        LocalNormalizationData::from_file(file),
        Err(LocalNormalizationError::TaggedInvalid)
    ));

    let mut file = constant_local_file(1.0, 0.0);
    file.scale[0].pop();
    assert!(matches!(
        LocalNormalizationData::from_file(file),
        Err(LocalNormalizationError::InvalidMatrix { channel: 0 })
    ));

    let mut file = constant_local_file(1.0, 0.0);
    file.offset.push(vec![0.0; 8]);
    assert!(matches!(
        LocalNormalizationData::from_file(file),
        Err(LocalNormalizationError::InconsistentChannels)
    ));
}

#[test]
fn test_local_load_yaml() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("frame.xnml.yaml");
    common::file_format::save_file(&constant_local_file(3.0, 0.0), &path).unwrap();

    let data = LocalNormalizationData::load(&path).unwrap();
    assert!((data.apply(0.1, 0, 0, 0) - 0.3).abs() < 1e-6);

    let err = LocalNormalizationData::load(&dir.path().join("missing.yaml")).unwrap_err();
    assert!(err.to_string().contains("missing.yaml"));
}

#[test]
fn test_local_version_message() {
    assert_eq!(
        LocalNormalizationError::UnsupportedVersion { version: 1 }.to_string(),
        "Unsupported local normalization data version 1 (minimum 2)"
    );
}

// ============================================================================
// Adaptive normalization
// ============================================================================

#[test]
fn test_grid_elements_formula() {
    assert_eq!(grid_elements(100, 50, 4), (25, 4, 2));
    assert_eq!(grid_elements(101, 50, 4), (25, 5, 2));
    assert_eq!(grid_elements(50, 100, 4), (25, 2, 4));
}

#[test]
#[should_panic(expected = "Grid size must be in [2, 50]")]
fn test_grid_elements_rejects_grid_size() {
    grid_elements(100, 100, 1);
}

#[test]
fn test_adaptive_blank_image_fails_with_first_tile() {
    let image = PlanarImage::new(32, 32, 1);
    let err = AdaptiveNormalizationData::from_image(&image, 4, ScaleEstimator::Mad).unwrap_err();
    assert_eq!(
        err.to_string(),
        "Zero or insignificant signal detected (x0=0 y0=0 x1=8 y1=8 c=0)"
    );
}

#[test]
fn test_adaptive_reports_offending_channel() {
    let mut rng = StdRng::seed_from_u64(7);
    let noisy: Vec<f32> = (0..32 * 32).map(|_| rng.random_range(0.2..0.4)).collect();
    let image = PlanarImage::from_channels(vec![
        Buffer2::new(32, 32, noisy),
        Buffer2::new_default(32, 32),
    ]);
    let err = AdaptiveNormalizationData::from_image(&image, 4, ScaleEstimator::Mad).unwrap_err();
    assert!(matches!(
        err,
        AdaptiveNormalizationError::InsignificantSignal { channel: 1, .. }
    ));
}

#[test]
fn test_adaptive_from_image_measures_every_tile() {
    let mut rng = StdRng::seed_from_u64(11);
    let noisy: Vec<f32> = (0..40 * 24).map(|_| rng.random_range(0.2..0.4)).collect();
    let image = PlanarImage::from_channels(vec![Buffer2::new(40, 24, noisy)]);

    for estimator in [
        ScaleEstimator::AverageDeviation,
        ScaleEstimator::Mad,
        ScaleEstimator::BiweightMidvariance,
    ] {
        let data = AdaptiveNormalizationData::from_image(&image, 5, estimator).unwrap();
        let (_, nx, ny) = grid_elements(40, 24, 5);
        assert_eq!(data.coordinates().len(), nx * ny);
        assert_eq!(data.num_channels(), 1);
        assert_eq!(data.coordinates()[0], DVec2::new(4.0, 4.0));
        for &m in data.location(0) {
            assert!(m > 0.2 && m < 0.4, "median {m}");
        }
        assert!(data.scale_low(0).iter().all(|&s| s > 0.0));
        assert!(data.scale_high(0).iter().all(|&s| s > 0.0));
    }
}

#[test]
fn test_adaptive_normalization_table() {
    let n = 4;
    let target = AdaptiveNormalizationData::from_vectors(
        corner_coordinates(),
        vec![vec![0.2; n]],
        vec![vec![0.01; n]],
        vec![vec![0.02; n]],
    )
    .unwrap();
    let reference = AdaptiveNormalizationData::from_vectors(
        corner_coordinates(),
        vec![vec![0.3; n]],
        vec![vec![0.02; n]],
        vec![vec![0.03; n]],
    )
    .unwrap();

    let table = target.normalization_table(&reference).unwrap();
    assert_eq!(table.num_channels(), 1);
    for k in 0..n {
        assert!((table.scale_low[0][k] - 2.0).abs() < 1e-12);
        assert!((table.scale_high[0][k] - 1.5).abs() < 1e-12);
        assert!((table.zero_offset_low[0][k] - -0.1).abs() < 1e-12);
        assert!(table.zero_offset_high[0][k].abs() < 1e-12);
        assert_eq!(table.location[0][k], 0.2);
    }
}

#[test]
fn test_adaptive_table_incompatible_grids() {
    let a = AdaptiveNormalizationData::from_vectors(
        corner_coordinates(),
        vec![vec![0.2; 4]],
        vec![vec![0.01; 4]],
        vec![vec![0.02; 4]],
    )
    .unwrap();
    let mut coords = corner_coordinates();
    coords[0].x += 1.0;
    let b = AdaptiveNormalizationData::from_vectors(
        coords,
        vec![vec![0.2; 4]],
        vec![vec![0.01; 4]],
        vec![vec![0.02; 4]],
    )
    .unwrap();
    assert!(matches!(
        a.normalization_table(&b),
        Err(AdaptiveNormalizationError::IncompatibleGrids)
    ));
}

#[test]
fn test_adaptive_from_vectors_validation() {
    assert!(matches!(
        AdaptiveNormalizationData::from_vectors(
            corner_coordinates()[..3].to_vec(),
            vec![vec![0.0; 3]],
            vec![vec![0.0; 3]],
            vec![vec![0.0; 3]],
        ),
        Err(AdaptiveNormalizationError::InvalidCoordinates { count: 3 })
    ));
    assert!(matches!(
        AdaptiveNormalizationData::from_vectors(
            corner_coordinates(),
            vec![vec![0.0; 4]],
            vec![vec![0.0; 3]],
            vec![vec![0.0; 4]],
        ),
        Err(AdaptiveNormalizationError::InvalidSampleVectors)
    ));
}

#[test]
fn test_adaptive_interpolation_piecewise_linear() {
    let interp = AdaptiveNormalizationInterpolation::new(64, 64, &constant_table()).unwrap();
    assert_eq!(interp.num_channels(), 1);

    // Below the local median: s0·z + z0.
    assert!((interp.apply(0.3, 5, 5, 0) - 0.7).abs() < 1e-9);
    // Above it: s1·z + z1.
    assert!((interp.apply(0.8, 60, 30, 0) - 1.0).abs() < 1e-9);
    assert!((interp.apply(0.49, 32, 32, 0) - 1.08).abs() < 1e-9);
}

#[test]
fn test_adaptive_interpolation_rejects_mismatched_table() {
    let mut table = constant_table();
    table.zero_offset_high[0].pop();
    assert!(matches!(
        AdaptiveNormalizationInterpolation::new(64, 64, &table),
        Err(AdaptiveNormalizationError::InvalidSampleVectors)
    ));

    let mut table = constant_table();
    table.scale_low.clear();
    assert!(matches!(
        AdaptiveNormalizationInterpolation::new(64, 64, &table),
        Err(AdaptiveNormalizationError::InvalidSampleVectors)
    ));
}

#[test]
fn test_adaptive_table_channel_check() {
    let table = constant_table();
    assert!(table.check_channels(1).is_ok());
    assert!(matches!(
        table.check_channels(3),
        Err(AdaptiveNormalizationError::ChannelCountMismatch {
            expected: 3,
            found: 1
        })
    ));
}
