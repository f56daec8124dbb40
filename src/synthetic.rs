//! Speckle images and known motion fields for testing the pipeline.

use image::{GrayImage, Luma, imageops};
use nalgebra as na;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::types::Point2D;

/// Random speckle pattern, the usual DIC calibration target.
pub fn speckle_image(width: u32, height: u32, seed: u64) -> GrayImage {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let (w, h) = (width as usize, height as usize);
    let mut canvas = vec![30.0f32; w * h];
    let num_dots = (w * h) / 18;
    for _ in 0..num_dots {
        let cx = rng.random_range(0.0..width as f32);
        let cy = rng.random_range(0.0..height as f32);
        let radius = rng.random_range(1.2f32..2.8);
        let intensity = rng.random_range(120.0f32..220.0);
        let reach = (2.0 * radius).ceil() as isize;
        for dy in -reach..=reach {
            for dx in -reach..=reach {
                let x = cx as isize + dx;
                let y = cy as isize + dy;
                if x < 0 || y < 0 || x >= w as isize || y >= h as isize {
                    continue;
                }
                let ddx = x as f32 - cx;
                let ddy = y as f32 - cy;
                let falloff = (-(ddx * ddx + ddy * ddy) / (radius * radius)).exp();
                canvas[y as usize * w + x as usize] += intensity * falloff;
            }
        }
    }
    let img = GrayImage::from_fn(width, height, |x, y| {
        Luma([canvas[y as usize * w + x as usize].clamp(0.0, 255.0) as u8])
    });
    imageops::blur(&img, 0.7)
}

/// Local displacement `amplitude * exp(-|p - center|^2 / (2 sigma^2))`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GaussianBump {
    pub center: Point2D,
    pub amplitude: Point2D,
    pub sigma: f64,
}

impl GaussianBump {
    pub fn displacement_at(&self, p: &Point2D) -> Point2D {
        let d2 = (*p - self.center).length_squared();
        self.amplitude * (-d2 / (2.0 * self.sigma * self.sigma)).exp()
    }
}

/// Rigid head motion about `center` plus local Gaussian deformations.
///
/// A point `p` moves to `R (p - center) + center + translation + sum(bumps(p))`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SyntheticMotion {
    pub rotation: f64,
    pub center: Point2D,
    pub translation: Point2D,
    pub bumps: Vec<GaussianBump>,
}

impl SyntheticMotion {
    pub fn rigid(rotation: f64, center: Point2D, translation: Point2D) -> SyntheticMotion {
        SyntheticMotion {
            rotation,
            center,
            translation,
            bumps: Vec::new(),
        }
    }

    pub fn with_bump(mut self, bump: GaussianBump) -> SyntheticMotion {
        self.bumps.push(bump);
        self
    }

    fn rotate(&self, v: Point2D, angle: f64) -> Point2D {
        let r = na::Rotation2::new(angle);
        let q = r * na::Vector2::new(v.x, v.y);
        Point2D::new(q.x, q.y)
    }

    /// Non-rigid part of the motion at `p`.
    pub fn local_displacement(&self, p: &Point2D) -> Point2D {
        self.bumps
            .iter()
            .fold(Point2D::ZERO, |acc, b| acc + b.displacement_at(p))
    }

    pub fn apply(&self, p: &Point2D) -> Point2D {
        self.rotate(*p - self.center, self.rotation)
            + self.center
            + self.translation
            + self.local_displacement(p)
    }

    /// Source position of the output pixel `q`, by fixed-point iteration.
    pub fn inverse(&self, q: &Point2D) -> Point2D {
        let undo_rigid = |v: Point2D| {
            self.rotate(v - self.center - self.translation, -self.rotation) + self.center
        };
        let mut p = undo_rigid(*q);
        for _ in 0..6 {
            p = undo_rigid(*q - self.local_displacement(&p));
        }
        p
    }

    /// Renders `img` as seen after the motion, bilinear sampling, border clamped.
    pub fn warp(&self, img: &GrayImage) -> GrayImage {
        let (w, h) = img.dimensions();
        let max_x = (w - 1) as f64;
        let max_y = (h - 1) as f64;
        let at = |x: u32, y: u32| img.get_pixel(x, y).0[0] as f64;
        GrayImage::from_fn(w, h, |x, y| {
            let p = self.inverse(&Point2D::new(x as f64, y as f64));
            let sx = p.x.clamp(0.0, max_x);
            let sy = p.y.clamp(0.0, max_y);
            let (x0, y0) = (sx.floor() as u32, sy.floor() as u32);
            let (x1, y1) = ((x0 + 1).min(w - 1), (y0 + 1).min(h - 1));
            let (fx, fy) = (sx - x0 as f64, sy - y0 as f64);
            let v = (1.0 - fx) * (1.0 - fy) * at(x0, y0)
                + fx * (1.0 - fy) * at(x1, y0)
                + (1.0 - fx) * fy * at(x0, y1)
                + fx * fy * at(x1, y1);
            Luma([v.round().clamp(0.0, 255.0) as u8])
        })
    }
}
