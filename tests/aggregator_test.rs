use face_motion_dic::aggregator::LandmarkAggregator;
use face_motion_dic::grid::Grid;
use face_motion_dic::kdtree::KdTree;
use face_motion_dic::types::Point2D;
use nalgebra as na;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

fn valued_grid() -> Grid {
    let grid = Grid::build([0.0, 50.0], [0.0, 40.0], [10.0, 10.0], [85.0, 85.0]).unwrap();
    let values = na::DMatrix::from_fn(grid.size_x(), grid.size_y(), |i, j| (i * 10 + j) as f64);
    grid.with_magnitude(values)
}

#[test]
fn test_coincident_query_returns_its_sample() {
    let grid = valued_grid();
    let aggregator = LandmarkAggregator::from_grid(&grid);
    assert_eq!(aggregator.len(), grid.len());
    for i in 0..grid.size_x() {
        for j in 0..grid.size_y() {
            let p = grid.point(i, j);
            assert_eq!(aggregator.nearest(&p), Some(p));
            assert_eq!(aggregator.value_at(&p), Some((i * 10 + j) as f64));
        }
    }
}

#[test]
fn test_midpoint_resolves_deterministically() {
    let grid = valued_grid();
    let aggregator = LandmarkAggregator::from_grid(&grid);
    // halfway between (0, 0) and (10, 0)
    let q = Point2D::new(5.0, 0.0);
    let first = aggregator.value_at(&q).unwrap();
    assert!(first == 0.0 || first == 10.0);
    for _ in 0..10 {
        assert_eq!(aggregator.value_at(&q), Some(first));
    }
    // ties go to the lower sample index, (0, 0) is sample 0
    assert_eq!(first, 0.0);

    // halfway between (20, 30) and (30, 30)
    let q = Point2D::new(25.0, 30.0);
    let v = aggregator.value_at(&q).unwrap();
    assert!(v == 23.0 || v == 33.0);
}

#[test]
fn test_values_for_maps_missing_data_to_zero() {
    let mut grid = valued_grid();
    grid.disp_magnitude[(1, 1)] = f64::NAN;
    let aggregator = LandmarkAggregator::from_grid(&grid);
    let values = aggregator.values_for(&[
        Point2D::new(10.2, 9.7),
        Point2D::new(41.0, 29.0),
        Point2D::NAN,
    ]);
    assert_eq!(values, vec![0.0, 43.0, 0.0]);

    let empty = LandmarkAggregator::build(&[], &[]);
    assert!(empty.is_empty());
    assert_eq!(empty.values_for(&[Point2D::ZERO]), vec![0.0]);
}

#[test]
fn test_kdtree_matches_brute_force() {
    let mut rng = ChaCha8Rng::seed_from_u64(3);
    let points: Vec<Point2D> = (0..500)
        .map(|_| Point2D::new(rng.random_range(0.0..640.0), rng.random_range(0.0..480.0)))
        .collect();
    let tree = KdTree::build(&points);
    for _ in 0..200 {
        let q = Point2D::new(rng.random_range(-50.0..700.0), rng.random_range(-50.0..500.0));
        let brute = points
            .iter()
            .map(|p| p.distance_squared(q))
            .fold(f64::INFINITY, f64::min);
        let found = tree.nearest(&q).unwrap();
        assert!((found.distance_squared(q) - brute).abs() < 1e-9);
    }
}
