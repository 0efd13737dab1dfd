use std::hint::black_box;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use criterion::{Criterion, criterion_group, criterion_main};
use glam::DVec2;
use nimbus::geometry::{DRect, area_of_intersection_of_quad_and_rect};
use nimbus::{
    DrizzleData, DrizzleIntegrationConfig, DrizzleIntegrationEngine, DropKernel, FrameLoader,
    ImageError, InputItem, KernelFunction, KernelFunctionKind, PlanarImage,
};

fn quad_rect_benchmarks(c: &mut Criterion) {
    let rect = DRect::new(0.05, 0.05, 0.95, 0.95);
    let (s, co) = (0.3f64.sin(), 0.3f64.cos());
    let quad = [
        DVec2::new(0.2, 0.1),
        DVec2::new(0.2 + co, 0.1 + s),
        DVec2::new(0.2 + co - s, 0.1 + s + co),
        DVec2::new(0.2 - s, 0.1 + co),
    ];
    let mut kernel = DropKernel::new(KernelFunction::Gaussian, 0.9, 16);
    kernel.move_to(rect.x0, rect.y0);

    let mut group = c.benchmark_group("quad_rect_intersection");
    group.bench_function("square", |b| {
        b.iter(|| area_of_intersection_of_quad_and_rect(black_box(&rect), black_box(&quad), None))
    });
    group.bench_function("gaussian_16", |b| {
        b.iter(|| {
            area_of_intersection_of_quad_and_rect(black_box(&rect), black_box(&quad), Some(&kernel))
        })
    });
    group.finish();
}

struct SyntheticLoader {
    image: PlanarImage,
}

impl FrameLoader for SyntheticLoader {
    fn load(&self, _path: &Path) -> Result<PlanarImage, ImageError> {
        Ok(self.image.clone())
    }
}

fn single_file_benchmarks(c: &mut Criterion) {
    let (width, height) = (256, 256);
    let samples: Vec<f32> = (0..width * height)
        .map(|i| 0.1 + 0.8 * ((i % 97) as f32 / 97.0))
        .collect();
    let image = PlanarImage::from_interleaved(width, height, 1, &samples);

    let dir = tempfile::tempdir().unwrap();
    let items: Vec<InputItem> = (0..3)
        .map(|i| {
            let t = i as f64 * 0.33;
            let data = DrizzleData {
                source_file_path: Some(PathBuf::from(format!("light_{i}.tif"))),
                reference_width: width,
                reference_height: height,
                alignment_matrix: Some([1.0, 0.002, t, -0.002, 1.0, -t, 0.0, 0.0]),
                integration: Some(nimbus::drizzle_data::IntegrationData {
                    location: vec![0.5],
                    reference_location: vec![0.5],
                    scale: vec![1.0],
                }),
                weight: vec![1.0],
                ..Default::default()
            };
            let path = dir.path().join(format!("light_{i}.xdrz.yaml"));
            common::file_format::save_file(&data, &path).unwrap();
            InputItem::new(path)
        })
        .collect();

    let loader = Arc::new(SyntheticLoader { image });
    let mut group = c.benchmark_group("drizzle_integration");
    group.sample_size(10);
    for kind in [KernelFunctionKind::Square, KernelFunctionKind::Gaussian] {
        let config = DrizzleIntegrationConfig::new(items.clone())
            .with_scale(2.0)
            .with_kernel(kind);
        let engine = DrizzleIntegrationEngine::new(config).with_loader(loader.clone());
        group.bench_function(format!("3x256x256_{kind}"), |b| {
            b.iter(|| engine.perform().unwrap())
        });
    }
    group.finish();
}

criterion_group!(benches, quad_rect_benchmarks, single_file_benchmarks);
criterion_main!(benches);
