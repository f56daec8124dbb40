//! Point-tracker seam and a pyramidal Lucas-Kanade implementation.
//!
//! The displacement pipeline only needs "where did these points of image A
//! end up in image B". Anything implementing [`PointTracker`] can provide it,
//! including plain closures, which is how tests inject known motion.

use image::GrayImage;
use image::imageops::{self, FilterType};
use log::{debug, trace};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::{Point2D, PointSet, UNTRACKED, is_tracked};

pub trait PointTracker: Send + Sync {
    /// For every point of `image_a`, its position in `image_b`.
    ///
    /// Points that could not be followed come back as [`UNTRACKED`].
    fn track(&self, image_a: &GrayImage, image_b: &GrayImage, points: &[Point2D])
    -> Result<PointSet>;
}

impl<F> PointTracker for F
where
    F: Fn(&GrayImage, &GrayImage, &[Point2D]) -> Result<PointSet> + Send + Sync,
{
    fn track(
        &self,
        image_a: &GrayImage,
        image_b: &GrayImage,
        points: &[Point2D],
    ) -> Result<PointSet> {
        self(image_a, image_b, points)
    }
}

/// Intensities scaled to `[0, 1]`.
#[derive(Debug, Clone)]
struct FloatImage {
    width: usize,
    height: usize,
    data: Vec<f32>,
}

impl FloatImage {
    fn from_gray(img: &GrayImage) -> FloatImage {
        FloatImage {
            width: img.width() as usize,
            height: img.height() as usize,
            data: img.as_raw().iter().map(|&v| v as f32 / 255.0).collect(),
        }
    }

    /// Bilinear sample with coordinates clamped to the border.
    fn sample(&self, x: f32, y: f32) -> f32 {
        let x = x.clamp(0.0, (self.width - 1) as f32);
        let y = y.clamp(0.0, (self.height - 1) as f32);
        let x0 = x.floor() as usize;
        let y0 = y.floor() as usize;
        let fx = x - x0 as f32;
        let fy = y - y0 as f32;
        let x1 = (x0 + 1).min(self.width - 1);
        let y1 = (y0 + 1).min(self.height - 1);
        let at = |xx: usize, yy: usize| self.data[yy * self.width + xx];
        (1.0 - fx) * (1.0 - fy) * at(x0, y0)
            + fx * (1.0 - fy) * at(x1, y0)
            + (1.0 - fx) * fy * at(x0, y1)
            + fx * fy * at(x1, y1)
    }
}

/// `levels[0]` is full resolution, each next level half the size.
fn build_pyramid(img: &GrayImage, max_levels: usize, min_size: u32) -> Vec<FloatImage> {
    let mut levels = vec![FloatImage::from_gray(img)];
    let mut current = img.clone();
    while levels.len() < max_levels {
        let (w, h) = (current.width() / 2, current.height() / 2);
        if w < min_size || h < min_size {
            break;
        }
        current = imageops::resize(&current, w, h, FilterType::Triangle);
        levels.push(FloatImage::from_gray(&current));
    }
    levels
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LucasKanadeTracker {
    /// Patch half size, the patch is `(2 * half_window + 1)^2` pixels.
    pub half_window: usize,
    pub levels: usize,
    /// Gauss-Newton iterations per pyramid level.
    pub max_iterations: usize,
    /// Convergence threshold in pixels.
    pub epsilon: f32,
    /// Smallest accepted eigenvalue of the patch structure tensor, per pixel.
    pub min_eigenvalue: f32,
}

impl Default for LucasKanadeTracker {
    fn default() -> Self {
        Self {
            half_window: 7,
            levels: 3,
            max_iterations: 30,
            epsilon: 0.01,
            min_eigenvalue: 1e-4,
        }
    }
}

impl LucasKanadeTracker {
    pub fn new(half_window: usize, levels: usize, max_iterations: usize, epsilon: f32) -> Self {
        LucasKanadeTracker {
            half_window,
            levels: levels.max(1),
            max_iterations,
            epsilon,
            ..Default::default()
        }
    }

    fn track_single(&self, prev: &[FloatImage], curr: &[FloatImage], p: &Point2D) -> Point2D {
        if !is_tracked(p) {
            return UNTRACKED;
        }
        let num_levels = prev.len().min(curr.len());
        let mut dx = 0.0f32;
        let mut dy = 0.0f32;
        for level in (0..num_levels).rev() {
            let scale = 1.0 / (1u32 << level) as f32;
            let fx = p.x as f32 * scale;
            let fy = p.y as f32 * scale;
            match self.refine(&prev[level], &curr[level], fx, fy, dx, dy) {
                Some((ndx, ndy)) => {
                    dx = ndx;
                    dy = ndy;
                }
                None => return UNTRACKED,
            }
            if level > 0 {
                dx *= 2.0;
                dy *= 2.0;
            }
        }

        let nx = p.x + dx as f64;
        let ny = p.y + dy as f64;
        let (w, h) = (prev[0].width as f64, prev[0].height as f64);
        if nx >= 0.0 && nx < w && ny >= 0.0 && ny < h {
            Point2D::new(nx, ny)
        } else {
            UNTRACKED
        }
    }

    /// Forward-additive iterations at one level; `None` when the patch has no texture.
    fn refine(
        &self,
        prev: &FloatImage,
        curr: &FloatImage,
        fx: f32,
        fy: f32,
        mut dx: f32,
        mut dy: f32,
    ) -> Option<(f32, f32)> {
        let half = self.half_window as isize;
        let patch = ((2 * half + 1) * (2 * half + 1)) as f32;
        for _ in 0..self.max_iterations {
            let (mut h00, mut h01, mut h11) = (0.0f32, 0.0f32, 0.0f32);
            let (mut b0, mut b1) = (0.0f32, 0.0f32);
            for py in -half..=half {
                for px in -half..=half {
                    let (ox, oy) = (px as f32, py as f32);
                    let t = prev.sample(fx + ox, fy + oy);
                    let wx = fx + dx + ox;
                    let wy = fy + dy + oy;
                    let e = t - curr.sample(wx, wy);
                    let gx = 0.5 * (curr.sample(wx + 1.0, wy) - curr.sample(wx - 1.0, wy));
                    let gy = 0.5 * (curr.sample(wx, wy + 1.0) - curr.sample(wx, wy - 1.0));
                    h00 += gx * gx;
                    h01 += gx * gy;
                    h11 += gy * gy;
                    b0 += gx * e;
                    b1 += gy * e;
                }
            }

            let trace_half = 0.5 * (h00 + h11);
            let min_eigen = trace_half - ((0.5 * (h00 - h11)).powi(2) + h01 * h01).sqrt();
            if min_eigen / patch < self.min_eigenvalue {
                return None;
            }
            let inv_det = 1.0 / (h00 * h11 - h01 * h01);
            let step_x = inv_det * (h11 * b0 - h01 * b1);
            let step_y = inv_det * (h00 * b1 - h01 * b0);
            dx += step_x;
            dy += step_y;
            if step_x * step_x + step_y * step_y < self.epsilon * self.epsilon {
                break;
            }
        }
        Some((dx, dy))
    }
}

impl PointTracker for LucasKanadeTracker {
    fn track(
        &self,
        image_a: &GrayImage,
        image_b: &GrayImage,
        points: &[Point2D],
    ) -> Result<PointSet> {
        if image_a.dimensions() != image_b.dimensions() {
            return Err(Error::TrackingUnavailable(format!(
                "image sizes differ: {:?} vs {:?}",
                image_a.dimensions(),
                image_b.dimensions()
            )));
        }
        let patch = 2 * self.half_window as u32 + 1;
        if image_a.width() < patch || image_a.height() < patch {
            return Err(Error::TrackingUnavailable(format!(
                "image {:?} smaller than the {}px tracking patch",
                image_a.dimensions(),
                patch
            )));
        }

        let (prev, curr) = rayon::join(
            || build_pyramid(image_a, self.levels, patch),
            || build_pyramid(image_b, self.levels, patch),
        );
        trace!("tracking {} points over {} levels", points.len(), prev.len());

        let tracked: PointSet = points
            .par_iter()
            .map(|p| self.track_single(&prev, &curr, p))
            .collect();

        let lost = tracked.iter().filter(|p| !is_tracked(p)).count();
        debug!("lucas-kanade lost {} of {} points", lost, tracked.len());
        if !points.is_empty() && lost == tracked.len() {
            return Err(Error::TrackingUnavailable(
                "no point could be tracked".to_string(),
            ));
        }
        Ok(tracked)
    }
}
