use image::imageops::{self, FilterType};
use image::{DynamicImage, Rgba, RgbaImage};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::grid::Grid;

pub const DEFAULT_OVERLAY_ALPHA: f64 = 0.4;

const TRANSPARENT: Rgba<u8> = Rgba([0, 0, 0, 0]);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Colormap {
    #[default]
    Jet,
    Turbo,
    Viridis,
}

/// Piecewise-linear jet ramp for `value` in `[0, 1]`, channels in `[0, 1]`.
pub fn jet_color_map(value: f64) -> [f64; 3] {
    let t = 4.0 * value;
    let red = (t - 1.5).min(-t + 4.5).clamp(0.0, 1.0);
    let green = (t - 0.5).min(-t + 3.5).clamp(0.0, 1.0);
    let blue = (t + 0.5).min(-t + 2.5).clamp(0.0, 1.0);
    [red, green, blue]
}

impl Colormap {
    /// `None` for zero and for cells without data.
    pub fn color(&self, value: f64, alpha: f64) -> Option<Rgba<u8>> {
        if !value.is_finite() || value == 0.0 {
            return None;
        }
        let value = value.clamp(0.0, 1.0);
        let a = (alpha.clamp(0.0, 1.0) * 255.0).round() as u8;
        let rgb = match self {
            Colormap::Jet => {
                let c = jet_color_map(value);
                [
                    (c[0] * 255.0).round() as u8,
                    (c[1] * 255.0).round() as u8,
                    (c[2] * 255.0).round() as u8,
                ]
            }
            Colormap::Turbo => {
                let c = colorous::TURBO.eval_continuous(value);
                [c.r, c.g, c.b]
            }
            Colormap::Viridis => {
                let c = colorous::VIRIDIS.eval_continuous(value);
                [c.r, c.g, c.b]
            }
        };
        Some(Rgba([rgb[0], rgb[1], rgb[2], a]))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeatmapRenderer {
    pub colormap: Colormap,
    pub overlay_alpha: f64,
}

impl Default for HeatmapRenderer {
    fn default() -> Self {
        Self {
            colormap: Colormap::Jet,
            overlay_alpha: DEFAULT_OVERLAY_ALPHA,
        }
    }
}

impl HeatmapRenderer {
    pub fn new(colormap: Colormap, overlay_alpha: f64) -> Result<HeatmapRenderer> {
        if !(0.0..=1.0).contains(&overlay_alpha) {
            return Err(Error::InvalidParameter(format!(
                "overlay alpha must be in [0, 1], got {}",
                overlay_alpha
            )));
        }
        Ok(HeatmapRenderer {
            colormap,
            overlay_alpha,
        })
    }

    /// One pixel per grid cell, pixel `(i, j)` showing cell `(i, j)`.
    ///
    /// Values are normalized by the largest finite magnitude in the grid.
    pub fn render(&self, grid: &Grid) -> RgbaImage {
        let (nx, ny) = (grid.size_x() as u32, grid.size_y() as u32);
        let max = grid
            .disp_magnitude
            .iter()
            .copied()
            .filter(|v| v.is_finite())
            .fold(0.0f64, f64::max);
        if max <= 0.0 {
            return RgbaImage::from_pixel(nx, ny, TRANSPARENT);
        }
        RgbaImage::from_fn(nx, ny, |i, j| {
            let v = grid.disp_magnitude[(i as usize, j as usize)];
            self.colormap
                .color(v / max, self.overlay_alpha)
                .unwrap_or(TRANSPARENT)
        })
    }

    /// Nearest-neighbour upscale of [`render`](Self::render) to `width x height`.
    pub fn render_resized(&self, grid: &Grid, width: u32, height: u32) -> RgbaImage {
        imageops::resize(&self.render(grid), width, height, FilterType::Nearest)
    }

    /// Composites `heatmap`, stretched to the frame size, over `frame`.
    pub fn overlay(&self, frame: &DynamicImage, heatmap: &RgbaImage) -> RgbaImage {
        let mut base = frame.to_rgba8();
        let top = if heatmap.dimensions() == base.dimensions() {
            heatmap.clone()
        } else {
            imageops::resize(heatmap, base.width(), base.height(), FilterType::Nearest)
        };
        imageops::overlay(&mut base, &top, 0, 0);
        base
    }
}
