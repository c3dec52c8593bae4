//! Benchmarks for the attribute scoring pipeline.
//!
//! Run with: cargo bench -p pedattr-core

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use image::DynamicImage;
use pedattr_core::config::{AnnotationConfig, PreprocessConfig};
use pedattr_core::preprocess::{to_tensor, Preprocessor};
use pedattr_core::{AttributeModel, BackboneRegistry};

fn benchmark_preprocess(c: &mut Criterion) {
    let img = DynamicImage::new_rgb8(1920, 1080);
    let preprocessor = Preprocessor::new(&PreprocessConfig::default());

    c.bench_function("preprocess_256x192", |b| {
        b.iter(|| {
            let _ = preprocessor.transform(black_box(&img));
        })
    });
}

fn benchmark_to_tensor(c: &mut Criterion) {
    let img = DynamicImage::new_rgb8(640, 480);
    let array = Preprocessor::new(&PreprocessConfig::default()).transform(&img);

    c.bench_function("array_to_tensor", |b| {
        b.iter(|| {
            let _ = to_tensor(black_box(&array), &Device::Cpu);
        })
    });
}

fn benchmark_sigmoid(c: &mut Criterion) {
    let logits: Vec<f32> = (0..105).map(|i| (i as f32 - 52.0) / 4.0).collect();

    c.bench_function("sigmoid_105", |b| {
        b.iter(|| {
            let _ = pedattr_core::math::sigmoid_all(black_box(&logits));
        })
    });
}

fn benchmark_resnet50_forward(c: &mut Criterion) {
    let registry = BackboneRegistry::builtin();
    let vb = VarBuilder::zeros(DType::F32, &Device::Cpu);
    let model = match AttributeModel::new(&registry, "resnet50", 105, vb) {
        Ok(model) => model,
        Err(e) => {
            eprintln!("Skipping forward benchmark: {e}");
            return;
        }
    };
    let input = Tensor::zeros((1, 3, 256, 192), DType::F32, &Device::Cpu).unwrap();

    let mut group = c.benchmark_group("forward");
    group.sample_size(10);
    group.bench_function("resnet50_256x192", |b| {
        b.iter(|| {
            let _ = model.forward(black_box(&input));
        })
    });
    group.finish();
}

fn benchmark_annotation_render(c: &mut Criterion) {
    use pedattr_core::types::AttributeScore;

    let img = DynamicImage::new_rgb8(192, 256);
    let annotator = pedattr_core::Annotator::new(AnnotationConfig::default());
    let entries = (0..105)
        .map(|i| AttributeScore {
            name: format!("attribute{i}"),
            logit: if i % 3 == 0 { 1.0 } else { -1.0 },
            probability: 0.5,
        })
        .collect::<Vec<_>>();
    let scores = pedattr_core::ScoreResult::from_entries(entries);

    c.bench_function("annotation_render", |b| {
        b.iter(|| {
            let _ = annotator.render(black_box(&img), black_box(&scores));
        })
    });
}

criterion_group!(
    benches,
    benchmark_preprocess,
    benchmark_to_tensor,
    benchmark_sigmoid,
    benchmark_resnet50_forward,
    benchmark_annotation_render,
);
criterion_main!(benches);
