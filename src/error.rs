//! Error types for the displacement-field pipeline.

use thiserror::Error;

/// Main error type for the library
#[derive(Error, Debug)]
pub enum Error {
    /// Sampling region is empty or too small to hold a 2x2 grid
    #[error("invalid region: {0}")]
    InvalidRegion(String),

    /// Not enough valid point pairs to fit a rotation
    #[error("insufficient correspondences: {valid} valid, at least {required} required")]
    InsufficientCorrespondences { valid: usize, required: usize },

    /// The point tracker could not resolve motion for the image pair
    #[error("tracking unavailable: {0}")]
    TrackingUnavailable(String),

    /// Zero-variance point set, the fitted rotation is meaningless
    #[error("degenerate alignment: {0}")]
    DegenerateAlignment(String),

    /// Reference and current point sets differ in length
    #[error("mismatched point sets: reference has {reference} points, current has {current}")]
    MismatchedPointSets { reference: usize, current: usize },

    /// A configuration or call parameter is out of range
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// File I/O operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Image decoding or encoding failed
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    /// JSON (de)serialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Whether the error only invalidates the current frame.
    ///
    /// Structural errors coming out of the grid, alignment and tracking stages
    /// mean "skip this frame"; I/O and parameter errors are caller mistakes.
    pub fn is_frame_skip(&self) -> bool {
        matches!(
            self,
            Error::InvalidRegion(_)
                | Error::InsufficientCorrespondences { .. }
                | Error::TrackingUnavailable(_)
                | Error::DegenerateAlignment(_)
                | Error::MismatchedPointSets { .. }
        )
    }
}

/// Convenience type alias for Results with our Error type
pub type Result<T> = std::result::Result<T, Error>;
