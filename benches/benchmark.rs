use criterion::{Criterion, black_box, criterion_group, criterion_main};
use face_motion_dic::aggregator::LandmarkAggregator;
use face_motion_dic::alignment::remove_rigid_motion;
use face_motion_dic::displacement::{FieldParams, compute_field};
use face_motion_dic::grid::Grid;
use face_motion_dic::synthetic::{SyntheticMotion, speckle_image};
use face_motion_dic::tracker::LucasKanadeTracker;
use face_motion_dic::types::{Point2D, Roi};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

fn bench_rigid_alignment(c: &mut Criterion) {
    let mut rng = ChaCha8Rng::seed_from_u64(0);
    let reference: Vec<Point2D> = (0..1000)
        .map(|_| Point2D::new(rng.random_range(0.0..640.0), rng.random_range(0.0..480.0)))
        .collect();
    let motion = SyntheticMotion::rigid(0.05, Point2D::new(320.0, 240.0), Point2D::new(3.0, -2.0));
    let current: Vec<Point2D> = reference.iter().map(|p| motion.apply(p)).collect();

    c.bench_function("remove_rigid_motion_1000", |b| {
        b.iter(|| remove_rigid_motion(black_box(&reference), black_box(&current)))
    });
}

fn bench_landmark_lookup(c: &mut Criterion) {
    let grid = Grid::build([0.0, 640.0], [0.0, 480.0], [5.0, 5.0], [85.0, 85.0]).unwrap();
    let mut rng = ChaCha8Rng::seed_from_u64(1);
    let queries: Vec<Point2D> = (0..468)
        .map(|_| Point2D::new(rng.random_range(0.0..640.0), rng.random_range(0.0..480.0)))
        .collect();

    c.bench_function("aggregator_build", |b| {
        b.iter(|| LandmarkAggregator::from_grid(black_box(&grid)))
    });
    let aggregator = LandmarkAggregator::from_grid(&grid);
    c.bench_function("aggregator_468_queries", |b| {
        b.iter(|| aggregator.values_for(black_box(&queries)))
    });
}

fn bench_compute_field(c: &mut Criterion) {
    let reference = speckle_image(320, 240, 7);
    let motion = SyntheticMotion::rigid(0.01, Point2D::new(160.0, 120.0), Point2D::new(1.5, 0.5));
    let current = motion.warp(&reference);
    let tracker = LucasKanadeTracker::default();
    let params = FieldParams {
        roi: Some(Roi::new(20.0, 300.0, 20.0, 220.0)),
        ..Default::default()
    };

    c.bench_function("compute_field_320x240", |b| {
        b.iter(|| compute_field(&tracker, &reference, &current, None, black_box(&params), &[]))
    });
}

criterion_group!(
    benches,
    bench_rigid_alignment,
    bench_landmark_lookup,
    bench_compute_field
);
criterion_main!(benches);
