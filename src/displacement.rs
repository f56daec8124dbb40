use image::GrayImage;
use log::{debug, trace};
use serde::{Deserialize, Serialize};

use crate::aggregator::LandmarkAggregator;
use crate::alignment::{RigidTransform, align};
use crate::error::{Error, Result};
use crate::grid::{Grid, remove_points_outside};
use crate::mask::FaceMask;
use crate::tracker::PointTracker;
use crate::types::{Point2D, Roi, is_tracked};

pub const DEFAULT_WINDOW_SIZE: [f64; 2] = [85.0, 85.0];
pub const DEFAULT_GRID_SPACING: [f64; 2] = [20.0, 20.0];

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FieldParams {
    /// Sampling region, the whole image when `None`.
    pub roi: Option<Roi>,
    pub window_size: [f64; 2],
    pub grid_spacing: [f64; 2],
}

impl Default for FieldParams {
    fn default() -> Self {
        Self {
            roi: None,
            window_size: DEFAULT_WINDOW_SIZE,
            grid_spacing: DEFAULT_GRID_SPACING,
        }
    }
}

/// One frame pair worth of displacement data.
#[derive(Debug, Clone)]
pub struct FieldResult {
    pub grid: Grid,
    pub transform: RigidTransform,
    /// Nearest-cell magnitude for every query point, in query order.
    pub landmark_values: Vec<f64>,
    pub tracked_count: usize,
    pub masked_cells: usize,
}

/// Tracks the grid samples of `reference` into `current`, removes the rigid
/// head motion and scatters the residual magnitudes onto the grid.
///
/// Cells whose coordinate lies on a black pixel of `mask` are forced to `0`.
pub fn compute_field<T>(
    tracker: &T,
    reference: &GrayImage,
    current: &GrayImage,
    mask: Option<&FaceMask>,
    params: &FieldParams,
    query_points: &[Point2D],
) -> Result<FieldResult>
where
    T: PointTracker + ?Sized,
{
    let roi = params
        .roi
        .unwrap_or_else(|| Roi::full_image(reference.width(), reference.height()));
    let mut grid = Grid::over_roi(&roi, params.grid_spacing, params.window_size)?;

    let samples = grid.sample_points();
    let reference_points = remove_points_outside(&samples, &roi);
    if reference_points.len() != samples.len() {
        return Err(Error::InvalidRegion(format!(
            "{} of {} grid samples fall outside the roi",
            samples.len() - reference_points.len(),
            samples.len()
        )));
    }
    trace!(
        "grid {}x{} over roi {:?}",
        grid.size_x(),
        grid.size_y(),
        roi
    );

    let tracked = tracker.track(reference, current, &reference_points)?;
    if tracked.len() != reference_points.len() {
        return Err(Error::TrackingUnavailable(format!(
            "tracker returned {} points for {} samples",
            tracked.len(),
            reference_points.len()
        )));
    }
    let tracked_count = tracked.iter().filter(|p| is_tracked(p)).count();

    let (transform, residual) = align(&reference_points, &tracked)?;
    debug!(
        "rigid motion: angle {:.5} rad, translation ({:.3}, {:.3}), {} of {} samples tracked",
        transform.angle(),
        transform.translation.x,
        transform.translation.y,
        tracked_count,
        tracked.len()
    );

    grid.scatter_displacements(&residual)?;
    grid.add_raw_data(reference_points, tracked);

    let masked_cells = match mask {
        Some(mask) => grid.zero_cells_where(|x, y| mask.is_outside(x, y)),
        None => 0,
    };

    let landmark_values = LandmarkAggregator::from_grid(&grid).values_for(query_points);

    Ok(FieldResult {
        grid,
        transform,
        landmark_values,
        tracked_count,
        masked_cells,
    })
}
