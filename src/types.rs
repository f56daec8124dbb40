use glam::DVec2;
use serde::{Deserialize, Serialize};

/// Pixel-space sample position. `NaN` in both coordinates marks an untracked sample.
pub type Point2D = DVec2;

/// Ordered samples; the index is the identity of a physical grid sample.
pub type PointSet = Vec<Point2D>;

pub const UNTRACKED: Point2D = DVec2::NAN;

/// A point is usable when neither coordinate is `NaN`.
pub fn is_tracked(p: &Point2D) -> bool {
    !(p.x.is_nan() || p.y.is_nan())
}

/// `NaN`-ness must agree between the two coordinates of a point.
pub fn has_consistent_nan(p: &Point2D) -> bool {
    p.x.is_nan() == p.y.is_nan()
}

/// Axis aligned region of interest in pixel units, bounds inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Roi {
    pub xmin: f64,
    pub xmax: f64,
    pub ymin: f64,
    pub ymax: f64,
}

impl Roi {
    pub fn new(xmin: f64, xmax: f64, ymin: f64, ymax: f64) -> Roi {
        Roi {
            xmin,
            xmax,
            ymin,
            ymax,
        }
    }

    /// The whole image, `(0, 0)` to `(width, height)`.
    pub fn full_image(width: u32, height: u32) -> Roi {
        Roi::new(0.0, width as f64, 0.0, height as f64)
    }

    pub fn contains(&self, p: &Point2D) -> bool {
        p.x >= self.xmin && p.x <= self.xmax && p.y >= self.ymin && p.y <= self.ymax
    }

    pub fn width(&self) -> f64 {
        self.xmax - self.xmin
    }

    pub fn height(&self) -> f64 {
        self.ymax - self.ymin
    }
}
