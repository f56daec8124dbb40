use log::{debug, warn};
use nalgebra as na;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::grid::Grid;

/// Reference deployment smoothing factor.
pub const DEFAULT_ALPHA: f64 = 0.3;
/// Reference deployment noise floor, in tracker output units.
pub const DEFAULT_MOTION_FLOOR: f64 = 0.015;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeatmapStats {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub mean_abs: f64,
    pub non_zero_count: usize,
    pub total_count: usize,
}

impl HeatmapStats {
    pub fn empty() -> HeatmapStats {
        HeatmapStats {
            min: 0.0,
            max: 0.0,
            mean: 0.0,
            mean_abs: 0.0,
            non_zero_count: 0,
            total_count: 0,
        }
    }
}

fn check_alpha(alpha: f64) -> Result<()> {
    if alpha > 0.0 && alpha <= 1.0 {
        Ok(())
    } else {
        Err(Error::InvalidParameter(format!(
            "smoothing alpha must be in (0, 1], got {}",
            alpha
        )))
    }
}

/// `NaN` cells become `0`. Returns the number of cells replaced.
pub fn sanitize_field(field: &mut na::DMatrix<f64>) -> usize {
    let mut replaced = 0;
    for v in field.iter_mut() {
        if !v.is_finite() {
            *v = 0.0;
            replaced += 1;
        }
    }
    replaced
}

/// `alpha * current + (1 - alpha) * previous`, cells without data read as `0`.
pub fn smooth_field(
    previous: &na::DMatrix<f64>,
    current: &na::DMatrix<f64>,
    alpha: f64,
) -> na::DMatrix<f64> {
    let or_zero = |v: f64| if v.is_finite() { v } else { 0.0 };
    if alpha >= 1.0 {
        return current.map(or_zero);
    }
    previous.zip_map(current, |p, c| {
        let (p, c) = (or_zero(p), or_zero(c));
        p + alpha * (c - p)
    })
}

/// `|v| < floor` becomes exactly `0`, sign kept otherwise.
pub fn floor_field(field: &na::DMatrix<f64>, floor: f64) -> na::DMatrix<f64> {
    field.map(|v| if !v.is_finite() || v.abs() < floor { 0.0 } else { v })
}

/// Summary over cells holding data.
pub fn field_stats(field: &na::DMatrix<f64>) -> HeatmapStats {
    let values: Vec<f64> = field.iter().copied().filter(|v| !v.is_nan()).collect();
    if values.is_empty() {
        return HeatmapStats::empty();
    }
    let n = values.len() as f64;
    HeatmapStats {
        min: values.iter().copied().fold(f64::INFINITY, f64::min),
        max: values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        mean: values.iter().sum::<f64>() / n,
        mean_abs: values.iter().map(|v| v.abs()).sum::<f64>() / n,
        non_zero_count: values.iter().filter(|&&v| v != 0.0).count(),
        total_count: values.len(),
    }
}

/// Exponential smoothing of `current` against `previous`.
///
/// Cold start (no previous) or a resized grid returns `current` unchanged.
pub fn smooth(previous: Option<&Grid>, current: &Grid, alpha: f64) -> Result<Grid> {
    check_alpha(alpha)?;
    match previous {
        Some(prev) if prev.same_shape(current) => Ok(current.with_magnitude(smooth_field(
            &prev.disp_magnitude,
            &current.disp_magnitude,
            alpha,
        ))),
        _ => Ok(current.clone()),
    }
}

pub fn apply_floor(grid: &Grid, floor: f64) -> Grid {
    grid.with_magnitude(floor_field(&grid.disp_magnitude, floor))
}

pub fn stats(grid: &Grid) -> HeatmapStats {
    field_stats(&grid.disp_magnitude)
}

/// Holds the single previous frame needed for smoothing.
///
/// Frames must be fed in order; the stabilizer is the one piece of state that
/// links consecutive frames together.
#[derive(Debug, Clone)]
pub struct TemporalStabilizer {
    alpha: f64,
    motion_floor: f64,
    previous: Option<Grid>,
}

impl Default for TemporalStabilizer {
    fn default() -> Self {
        Self {
            alpha: DEFAULT_ALPHA,
            motion_floor: DEFAULT_MOTION_FLOOR,
            previous: None,
        }
    }
}

impl TemporalStabilizer {
    pub fn new(alpha: f64, motion_floor: f64) -> Result<TemporalStabilizer> {
        check_alpha(alpha)?;
        if !(motion_floor >= 0.0) {
            return Err(Error::InvalidParameter(format!(
                "motion floor must be non-negative, got {}",
                motion_floor
            )));
        }
        Ok(TemporalStabilizer {
            alpha,
            motion_floor,
            previous: None,
        })
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    pub fn motion_floor(&self) -> f64 {
        self.motion_floor
    }

    /// Last stabilized grid, the one a skipped frame keeps on screen.
    pub fn previous(&self) -> Option<&Grid> {
        self.previous.as_ref()
    }

    pub fn reset(&mut self) {
        self.previous = None;
    }

    /// Sanitize, smooth against the previous frame, floor, remember.
    pub fn update(&mut self, current: &Grid) -> Result<Grid> {
        let mut field = current.disp_magnitude.clone();
        let replaced = sanitize_field(&mut field);
        if replaced > 0 {
            warn!("{} non-finite grid cells clamped to 0 before smoothing", replaced);
        }
        let sanitized = current.with_magnitude(field);
        let smoothed = smooth(self.previous.as_ref(), &sanitized, self.alpha)?;
        let floored = apply_floor(&smoothed, self.motion_floor);
        debug!(
            "stabilized frame: {} of {} cells above floor",
            floored.disp_magnitude.iter().filter(|&&v| v != 0.0).count(),
            floored.len()
        );
        self.previous = Some(floored.clone());
        Ok(floored)
    }
}
