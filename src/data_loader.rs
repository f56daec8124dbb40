use std::path::{Path, PathBuf};

use glob::glob;
use image::{GrayImage, ImageReader};
use indicatif::ParallelProgressIterator;
use rayon::prelude::*;

use crate::error::{Error, Result};

/// A decoded frame, not yet part of a session.
#[derive(Debug, Clone)]
pub struct LoadedFrame {
    pub index: usize,
    pub timestamp_ms: i64,
    pub path: PathBuf,
    pub image: GrayImage,
}

/// Parses the timestamp from a file path.
///
/// A numeric file stem is taken as milliseconds, anything else falls back to
/// `index * frame_interval_ms`.
fn path_to_timestamp(path: &Path, index: usize, frame_interval_ms: i64) -> i64 {
    path.file_stem()
        .and_then(|s| s.to_str())
        .and_then(|s| s.parse().ok())
        .unwrap_or(index as i64 * frame_interval_ms)
}

fn img_filter(rp: glob::GlobResult) -> Option<PathBuf> {
    if let Ok(p) = rp {
        for ext in &[".png", ".jpg", ".jpeg"] {
            if p.as_os_str().to_string_lossy().ends_with(ext) {
                return Some(p);
            }
        }
    }
    None
}

/// Image paths of a folder, sorted by file name.
pub fn frame_paths(root_folder: &str) -> Result<Vec<PathBuf>> {
    let pattern = format!("{}/*", root_folder);
    let img_paths =
        glob(&pattern).map_err(|e| Error::InvalidParameter(format!("{}: {}", pattern, e)))?;
    let mut sorted_path: Vec<PathBuf> = img_paths.into_iter().filter_map(img_filter).collect();
    sorted_path.sort();
    Ok(sorted_path)
}

/// Loads every `step`-th frame of a folder from `start_idx` on, decoding in parallel.
///
/// # Arguments
/// * `root_folder` - Folder holding the frames.
/// * `start_idx` - Index of the first frame to keep.
/// * `step` - Step size for sampling frames.
/// * `frame_interval_ms` - Timestamp spacing for files without a numeric name.
pub fn load_frames(
    root_folder: &str,
    start_idx: usize,
    step: usize,
    frame_interval_ms: i64,
) -> Result<Vec<LoadedFrame>> {
    let sorted_path = frame_paths(root_folder)?;
    log::trace!("found {} frames in {}", sorted_path.len(), root_folder);
    let new_paths: Vec<_> = sorted_path
        .into_iter()
        .skip(start_idx)
        .step_by(step.max(1))
        .enumerate()
        .collect();
    let mut frames = new_paths
        .par_iter()
        .progress_count(new_paths.len() as u64)
        .map(|(idx, path)| -> Result<LoadedFrame> {
            let image = ImageReader::open(path)?.decode()?.to_luma8();
            Ok(LoadedFrame {
                index: *idx,
                timestamp_ms: path_to_timestamp(path, *idx, frame_interval_ms),
                path: path.clone(),
                image,
            })
        })
        .collect::<Result<Vec<_>>>()?;
    frames.sort_by_key(|f| f.index);
    Ok(frames)
}
