use nalgebra as na;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::{Point2D, PointSet, Roi};

/// Everything needed to rebuild one grid axis through [`mgrid`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AxisMeta {
    pub min: f64,
    pub max: f64,
    pub count: usize,
    pub window_size: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridMeta {
    pub x: AxisMeta,
    pub y: AxisMeta,
}

/// Regular sampling grid plus the displacement measured at every sample.
///
/// `grid_x[(i, j)]` varies with `i` only and `grid_y[(i, j)]` with `j` only.
/// Samples are flattened x-major: sample `k` lives at `(k / size_y, k % size_y)`.
/// Cells without data hold `NaN`.
#[derive(Debug, Clone)]
pub struct Grid {
    pub grid_x: na::DMatrix<f64>,
    pub grid_y: na::DMatrix<f64>,
    pub disp_x: na::DMatrix<f64>,
    pub disp_y: na::DMatrix<f64>,
    pub disp_magnitude: na::DMatrix<f64>,
    pub meta: GridMeta,
    pub reference_points: PointSet,
    pub correlated_points: PointSet,
}

fn check_axis(name: &str, min: f64, max: f64, num: usize) -> Result<()> {
    if !(min.is_finite() && max.is_finite()) {
        return Err(Error::InvalidRegion(format!(
            "{} axis must be finite, got [{}, {}]",
            name, min, max
        )));
    }
    if !(max > min) {
        return Err(Error::InvalidRegion(format!(
            "{} axis is empty: max {} <= min {}",
            name, max, min
        )));
    }
    if num < 2 {
        return Err(Error::InvalidRegion(format!(
            "{} axis needs at least 2 samples, got {}",
            name, num
        )));
    }
    Ok(())
}

/// Uniform stride samples `min, min + spacing, ...` strictly below `max`.
///
/// Produces `ceil((max - min) / spacing)` values.
pub fn sample_axis(min: f64, max: f64, spacing: f64) -> Result<Vec<f64>> {
    if !(spacing > 0.0) || !spacing.is_finite() {
        return Err(Error::InvalidParameter(format!(
            "grid spacing must be positive, got {}",
            spacing
        )));
    }
    if !(min.is_finite() && max.is_finite()) {
        return Err(Error::InvalidRegion(format!(
            "axis range must be finite, got [{}, {}]",
            min, max
        )));
    }
    if !(max > min) {
        return Err(Error::InvalidRegion(format!(
            "axis range is empty: max {} <= min {}",
            max, min
        )));
    }
    let count = ((max - min) / spacing).ceil() as usize;
    Ok((0..count).map(|k| min + k as f64 * spacing).collect())
}

/// Endpoint-inclusive coordinate arrays of shape `xnum x ynum`.
pub fn mgrid(
    xmin: f64,
    xmax: f64,
    xnum: usize,
    ymin: f64,
    ymax: f64,
    ynum: usize,
) -> Result<(na::DMatrix<f64>, na::DMatrix<f64>)> {
    check_axis("x", xmin, xmax, xnum)?;
    check_axis("y", ymin, ymax, ynum)?;
    let x_step = (xmax - xmin) / (xnum - 1) as f64;
    let y_step = (ymax - ymin) / (ynum - 1) as f64;
    let grid_x = na::DMatrix::from_fn(xnum, ynum, |i, _| xmin + i as f64 * x_step);
    let grid_y = na::DMatrix::from_fn(xnum, ynum, |_, j| ymin + j as f64 * y_step);
    Ok((grid_x, grid_y))
}

/// Builds the sampling grid for `x_range x y_range` with the given spacing.
pub fn build_grid(
    x_range: [f64; 2],
    y_range: [f64; 2],
    spacing: [f64; 2],
    window_size: [f64; 2],
) -> Result<Grid> {
    Grid::build(x_range, y_range, spacing, window_size)
}

/// Keeps the points inside `roi`, bounds inclusive on both axes.
pub fn remove_points_outside(points: &[Point2D], roi: &Roi) -> PointSet {
    points.iter().filter(|p| roi.contains(p)).copied().collect()
}

impl Grid {
    pub fn build(
        x_range: [f64; 2],
        y_range: [f64; 2],
        spacing: [f64; 2],
        window_size: [f64; 2],
    ) -> Result<Grid> {
        let xs = sample_axis(x_range[0], x_range[1], spacing[0])?;
        let ys = sample_axis(y_range[0], y_range[1], spacing[1])?;
        let axis_meta = |samples: &[f64], window: f64| AxisMeta {
            min: samples.first().copied().unwrap_or(f64::NAN),
            max: samples.last().copied().unwrap_or(f64::NAN),
            count: samples.len(),
            window_size: window,
        };
        let meta = GridMeta {
            x: axis_meta(&xs, window_size[0]),
            y: axis_meta(&ys, window_size[1]),
        };
        Grid::from_meta(&meta)
    }

    pub fn over_roi(roi: &Roi, spacing: [f64; 2], window_size: [f64; 2]) -> Result<Grid> {
        Grid::build(
            [roi.xmin, roi.xmax],
            [roi.ymin, roi.ymax],
            spacing,
            window_size,
        )
    }

    /// Rebuilds a grid from persisted metadata.
    pub fn from_meta(meta: &GridMeta) -> Result<Grid> {
        let (grid_x, grid_y) = mgrid(
            meta.x.min,
            meta.x.max,
            meta.x.count,
            meta.y.min,
            meta.y.max,
            meta.y.count,
        )?;
        let empty = na::DMatrix::from_element(meta.x.count, meta.y.count, f64::NAN);
        Ok(Grid {
            grid_x,
            grid_y,
            disp_x: empty.clone(),
            disp_y: empty.clone(),
            disp_magnitude: empty,
            meta: *meta,
            reference_points: Vec::new(),
            correlated_points: Vec::new(),
        })
    }

    pub fn size_x(&self) -> usize {
        self.grid_x.nrows()
    }

    pub fn size_y(&self) -> usize {
        self.grid_x.ncols()
    }

    pub fn len(&self) -> usize {
        self.size_x() * self.size_y()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn point(&self, i: usize, j: usize) -> Point2D {
        Point2D::new(self.grid_x[(i, j)], self.grid_y[(i, j)])
    }

    /// Sample coordinates in flattened x-major order.
    pub fn sample_points(&self) -> PointSet {
        let (nx, ny) = (self.size_x(), self.size_y());
        (0..nx)
            .flat_map(|i| (0..ny).map(move |j| (i, j)))
            .map(|(i, j)| self.point(i, j))
            .collect()
    }

    pub fn add_raw_data(&mut self, reference_points: PointSet, correlated_points: PointSet) {
        self.reference_points = reference_points;
        self.correlated_points = correlated_points;
    }

    /// Writes one displacement vector per sample, in flattened x-major order.
    ///
    /// Untracked samples leave `NaN` in every displacement matrix.
    pub fn scatter_displacements(&mut self, disp: &[Point2D]) -> Result<()> {
        if disp.len() != self.len() {
            return Err(Error::MismatchedPointSets {
                reference: self.len(),
                current: disp.len(),
            });
        }
        let ny = self.size_y();
        for (k, d) in disp.iter().enumerate() {
            let (i, j) = (k / ny, k % ny);
            self.disp_x[(i, j)] = d.x;
            self.disp_y[(i, j)] = d.y;
            self.disp_magnitude[(i, j)] = (d.x * d.x + d.y * d.y).sqrt();
        }
        Ok(())
    }

    /// Forces `disp_magnitude` to zero wherever `outside(x, y)` holds.
    /// Returns the number of cells zeroed.
    pub fn zero_cells_where<F>(&mut self, outside: F) -> usize
    where
        F: Fn(f64, f64) -> bool,
    {
        let mut zeroed = 0;
        for i in 0..self.size_x() {
            for j in 0..self.size_y() {
                if outside(self.grid_x[(i, j)], self.grid_y[(i, j)]) {
                    self.disp_magnitude[(i, j)] = 0.0;
                    zeroed += 1;
                }
            }
        }
        zeroed
    }

    /// Same coordinates, new scalar field.
    pub fn with_magnitude(&self, disp_magnitude: na::DMatrix<f64>) -> Grid {
        debug_assert_eq!(disp_magnitude.shape(), self.disp_magnitude.shape());
        Grid {
            disp_magnitude,
            ..self.clone()
        }
    }

    pub fn same_shape(&self, other: &Grid) -> bool {
        self.disp_magnitude.shape() == other.disp_magnitude.shape()
    }
}
