use image::{DynamicImage, RgbaImage};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use rerun::{RecordingStream, TimeCell};

use crate::session::HeatmapFrame;

pub type RerunResult = Result<(), rerun::RecordingStreamError>;

pub fn id_to_color(id: usize) -> (u8, u8, u8, u8) {
    let mut rng = ChaCha8Rng::seed_from_u64(id as u64);
    let color_num = rng.random_range(0..2u32.pow(24));
    (
        ((color_num >> 16) % 256) as u8,
        ((color_num >> 8) % 256) as u8,
        (color_num % 256) as u8,
        255,
    )
}

/// rerun use top left corner as (0, 0)
pub fn rerun_shift(p2ds: &[(f32, f32)]) -> Vec<(f32, f32)> {
    p2ds.iter().map(|(x, y)| (*x + 0.5, *y + 0.5)).collect()
}

pub fn log_rgba(recording: &RecordingStream, topic: &str, img: &RgbaImage) -> RerunResult {
    recording.log(
        format!("{}/image", topic),
        &rerun::Image::from_rgba32(img.as_raw().clone(), [img.width(), img.height()]),
    )
}

/// Logs the heatmap composited over `frame` and the landmarks coloured by index.
pub fn log_heatmap_frame(
    recording: &RecordingStream,
    topic: &str,
    frame: &DynamicImage,
    heatmap: &HeatmapFrame,
    overlay: &RgbaImage,
) -> RerunResult {
    recording.set_time("frame", TimeCell::from_sequence(heatmap.index as i64));
    log_rgba(recording, topic, overlay)?;
    recording.log(
        format!("{}/raw", topic),
        &rerun::Image::from_rgba32(frame.to_rgba8().into_raw(), [frame.width(), frame.height()]),
    )?;

    let (pts, colors_labels): (Vec<_>, Vec<_>) = heatmap
        .landmark_points
        .iter()
        .zip(&heatmap.landmark_values)
        .enumerate()
        .map(|(id, (p, v))| {
            (
                (p[0] as f32, p[1] as f32),
                (id_to_color(id), format!("{}: {:.4}", id, v)),
            )
        })
        .unzip();
    if pts.is_empty() {
        return Ok(());
    }
    let (colors, labels): (Vec<_>, Vec<_>) = colors_labels.into_iter().unzip();
    let pts = rerun_shift(&pts);
    recording.log(
        format!("{}/landmarks", topic),
        &rerun::Points2D::new(pts)
            .with_colors(colors)
            .with_labels(labels)
            .with_radii([rerun::Radius::new_ui_points(3.0)]),
    )
}
