use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::Point2D;

/// Face-mesh landmarks surrounding both eyes and brows (wide set).
pub const EYE_LANDMARKS: [usize; 158] = [
    168, 193, 245, 128, 121, 120, 119, 118, 117, 111, 143, 139, 71, 68, 104, 69, 108, 151, 337,
    299, 333, 298, 301, 368, 372, 340, 346, 347, 348, 349, 350, 357, 465, 417, 9, 107, 66, 105, 63,
    70, 156, 336, 296, 334, 293, 300, 383, 8, 55, 65, 52, 53, 46, 124, 35, 31, 228, 229, 230, 231,
    232, 233, 244, 189, 285, 295, 282, 283, 276, 353, 265, 221, 222, 223, 224, 225, 113, 226, 25,
    110, 24, 23, 22, 26, 112, 243, 190, 56, 28, 27, 29, 30, 247, 130, 33, 7, 163, 144, 145, 153,
    154, 155, 133, 173, 157, 158, 159, 160, 161, 246, 441, 442, 443, 444, 445, 342, 446, 261, 448,
    449, 450, 451, 452, 453, 464, 413, 286, 258, 257, 259, 260, 467, 359, 255, 339, 254, 253, 252,
    256, 341, 463, 414, 384, 385, 386, 387, 388, 466, 263, 249, 390, 373, 374, 380, 381, 382, 362,
    308,
];

/// Unique face-mesh lip landmarks, sorted.
pub const LIP_LANDMARKS: [usize; 40] = [
    0, 13, 14, 17, 37, 39, 40, 61, 78, 80, 81, 82, 84, 87, 88, 91, 95, 146, 178, 181, 185, 191,
    267, 269, 270, 291, 308, 310, 311, 312, 314, 317, 318, 321, 324, 375, 402, 405, 409, 415,
];

/// Face-mesh face oval in drawing order.
pub const FACE_OVAL: [usize; 36] = [
    10, 338, 297, 332, 284, 251, 389, 356, 454, 323, 361, 288, 397, 365, 379, 378, 400, 377, 152,
    148, 176, 149, 150, 136, 172, 58, 132, 93, 234, 127, 162, 21, 54, 103, 67, 109,
];

/// Facial region whose landmarks are reported per frame.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum RoiKind {
    /// Every landmark the detector returns
    #[default]
    All,
    Eye,
    /// Smile and tongue stimuli share the lip landmarks
    Mouth,
}

impl RoiKind {
    /// Landmark indices for this region, `None` meaning all of them.
    pub fn landmark_indices(&self) -> Option<&'static [usize]> {
        match self {
            RoiKind::All => None,
            RoiKind::Eye => Some(&EYE_LANDMARKS),
            RoiKind::Mouth => Some(&LIP_LANDMARKS),
        }
    }
}

impl FromStr for RoiKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<RoiKind> {
        match s.to_lowercase().as_str() {
            "all" | "" => Ok(RoiKind::All),
            "eye" | "eyes" => Ok(RoiKind::Eye),
            "mouth" | "smile" | "tongue" | "lips" => Ok(RoiKind::Mouth),
            _ => Err(Error::InvalidParameter(format!("unknown roi kind: {}", s))),
        }
    }
}

/// Detector output in `[0, 1]` image-relative coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizedPoint {
    pub x: f64,
    pub y: f64,
}

impl From<[f64; 2]> for NormalizedPoint {
    fn from(v: [f64; 2]) -> Self {
        NormalizedPoint { x: v[0], y: v[1] }
    }
}

fn axis_to_pixel(v: f64, size: u32) -> i32 {
    let px = (v * size as f64).floor();
    let max = size.saturating_sub(1) as f64;
    px.clamp(0.0, max) as i32
}

/// `floor(n * size)` clamped into the image.
pub fn to_pixel(p: &NormalizedPoint, width: u32, height: u32) -> [i32; 2] {
    [axis_to_pixel(p.x, width), axis_to_pixel(p.y, height)]
}

pub fn all_landmarks_to_pixels(
    landmarks: &[NormalizedPoint],
    width: u32,
    height: u32,
) -> Vec<[i32; 2]> {
    landmarks
        .iter()
        .map(|p| to_pixel(p, width, height))
        .collect()
}

/// Pixel positions of the landmarks belonging to `kind`.
///
/// Indices the detector did not return are skipped.
pub fn select_query_points(
    landmarks: &[NormalizedPoint],
    kind: RoiKind,
    width: u32,
    height: u32,
) -> Vec<[i32; 2]> {
    match kind.landmark_indices() {
        None => all_landmarks_to_pixels(landmarks, width, height),
        Some(indices) => indices
            .iter()
            .filter_map(|&k| landmarks.get(k))
            .map(|p| to_pixel(p, width, height))
            .collect(),
    }
}

pub fn pixels_to_points(pixels: &[[i32; 2]]) -> Vec<Point2D> {
    pixels
        .iter()
        .map(|p| Point2D::new(p[0] as f64, p[1] as f64))
        .collect()
}
