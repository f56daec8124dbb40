use image::{DynamicImage, GrayImage, Luma};

use crate::error::{Error, Result};
use crate::landmarks::{FACE_OVAL, NormalizedPoint, to_pixel};
use crate::types::Point2D;

const INSIDE: Luma<u8> = Luma([255]);
const OUTSIDE: Luma<u8> = Luma([0]);

/// Pixel raster aligned with the frame; black pixels lie outside the face.
#[derive(Debug, Clone)]
pub struct FaceMask {
    raster: GrayImage,
}

impl FaceMask {
    pub fn from_raster(raster: GrayImage) -> FaceMask {
        FaceMask { raster }
    }

    /// Any pixel with a non-zero colour channel counts as inside.
    pub fn from_image(img: &DynamicImage) -> FaceMask {
        let rgb = img.to_rgb8();
        let raster = GrayImage::from_fn(rgb.width(), rgb.height(), |x, y| {
            if rgb.get_pixel(x, y).0.iter().any(|&c| c != 0) {
                INSIDE
            } else {
                OUTSIDE
            }
        });
        FaceMask { raster }
    }

    pub fn all_inside(width: u32, height: u32) -> FaceMask {
        FaceMask {
            raster: GrayImage::from_pixel(width, height, INSIDE),
        }
    }

    pub fn all_outside(width: u32, height: u32) -> FaceMask {
        FaceMask {
            raster: GrayImage::from_pixel(width, height, OUTSIDE),
        }
    }

    /// Even-odd scanline fill of a closed polygon given in pixel coordinates.
    pub fn from_polygon(width: u32, height: u32, polygon: &[Point2D]) -> FaceMask {
        let mut raster = GrayImage::from_pixel(width, height, OUTSIDE);
        if polygon.len() < 3 {
            return FaceMask { raster };
        }
        let mut crossings: Vec<f64> = Vec::with_capacity(polygon.len());
        for y in 0..height {
            let yc = y as f64 + 0.5;
            crossings.clear();
            for (k, a) in polygon.iter().enumerate() {
                let b = &polygon[(k + 1) % polygon.len()];
                if (a.y <= yc && yc < b.y) || (b.y <= yc && yc < a.y) {
                    crossings.push(a.x + (yc - a.y) * (b.x - a.x) / (b.y - a.y));
                }
            }
            crossings.sort_by(|l, r| l.total_cmp(r));
            for span in crossings.chunks_exact(2) {
                let start = (span[0] - 0.5).ceil().max(0.0) as u32;
                let end = ((span[1] - 0.5).ceil().max(0.0) as u32).min(width);
                for x in start..end {
                    raster.put_pixel(x, y, INSIDE);
                }
            }
        }
        FaceMask { raster }
    }

    /// Fills the face oval of a face-mesh landmark set.
    pub fn from_landmarks(landmarks: &[NormalizedPoint], width: u32, height: u32) -> Result<FaceMask> {
        let needed = FACE_OVAL.iter().max().map_or(0, |m| m + 1);
        if landmarks.len() < needed {
            return Err(Error::InvalidParameter(format!(
                "face oval needs {} landmarks, got {}",
                needed,
                landmarks.len()
            )));
        }
        let polygon: Vec<Point2D> = FACE_OVAL
            .iter()
            .map(|&k| {
                let p = to_pixel(&landmarks[k], width, height);
                Point2D::new(p[0] as f64, p[1] as f64)
            })
            .collect();
        Ok(FaceMask::from_polygon(width, height, &polygon))
    }

    pub fn width(&self) -> u32 {
        self.raster.width()
    }

    pub fn height(&self) -> u32 {
        self.raster.height()
    }

    pub fn raster(&self) -> &GrayImage {
        &self.raster
    }

    /// True when `(x, y)` falls on a black pixel. Coordinates off the raster are never outside.
    pub fn is_outside(&self, x: f64, y: f64) -> bool {
        if !(x >= 0.0 && y >= 0.0) {
            return false;
        }
        let (px, py) = (x as u32, y as u32);
        if px >= self.width() || py >= self.height() {
            return false;
        }
        self.raster.get_pixel(px, py).0[0] == 0
    }

    pub fn inside_fraction(&self) -> f64 {
        let total = self.raster.len();
        if total == 0 {
            return 0.0;
        }
        let inside = self.raster.as_raw().iter().filter(|&&v| v != 0).count();
        inside as f64 / total as f64
    }

    /// Blacks out every pixel outside the face.
    pub fn apply(&self, img: &GrayImage) -> Result<GrayImage> {
        if img.dimensions() != self.raster.dimensions() {
            return Err(Error::InvalidParameter(format!(
                "mask is {:?} but image is {:?}",
                self.raster.dimensions(),
                img.dimensions()
            )));
        }
        Ok(GrayImage::from_fn(img.width(), img.height(), |x, y| {
            if self.raster.get_pixel(x, y).0[0] == 0 {
                OUTSIDE
            } else {
                *img.get_pixel(x, y)
            }
        }))
    }
}
