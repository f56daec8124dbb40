use log::{debug, warn};
use nalgebra as na;

use crate::error::{Error, Result};
use crate::types::{Point2D, PointSet, UNTRACKED, has_consistent_nan, is_tracked};

/// A rotation needs at least two distinct correspondences.
pub const MIN_CORRESPONDENCES: usize = 2;

const DEGENERATE_EPS: f64 = 1e-12;

/// Proper 2D rigid motion `p -> R p + T`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RigidTransform {
    pub rotation: na::Matrix2<f64>,
    pub translation: na::Vector2<f64>,
    /// Set when the point sets had no spread; the rotation is then the identity.
    pub degenerate: bool,
}

fn to_na(p: &Point2D) -> na::Vector2<f64> {
    na::Vector2::new(p.x, p.y)
}

impl RigidTransform {
    pub fn identity() -> RigidTransform {
        RigidTransform {
            rotation: na::Matrix2::identity(),
            translation: na::Vector2::zeros(),
            degenerate: false,
        }
    }

    pub fn from_angle_translation(angle: f64, translation: na::Vector2<f64>) -> RigidTransform {
        RigidTransform {
            rotation: na::Rotation2::new(angle).into_inner(),
            translation,
            degenerate: false,
        }
    }

    pub fn apply(&self, p: &Point2D) -> Point2D {
        let q = self.rotation * to_na(p) + self.translation;
        Point2D::new(q.x, q.y)
    }

    /// Rotation angle in radians.
    pub fn angle(&self) -> f64 {
        self.rotation[(1, 0)].atan2(self.rotation[(0, 0)])
    }

    /// Turns a degenerate fit into an error for callers that cannot use it.
    pub fn ensure_non_degenerate(&self) -> Result<()> {
        if self.degenerate {
            Err(Error::DegenerateAlignment(
                "point sets have zero variance".to_string(),
            ))
        } else {
            Ok(())
        }
    }

    /// Least-squares rigid fit (Kabsch) mapping `reference` onto `current`.
    ///
    /// Only indices tracked in both sets take part in the fit.
    pub fn estimate(reference: &[Point2D], current: &[Point2D]) -> Result<RigidTransform> {
        let valid = valid_indices(reference, current)?;
        if valid.len() < MIN_CORRESPONDENCES {
            return Err(Error::InsufficientCorrespondences {
                valid: valid.len(),
                required: MIN_CORRESPONDENCES,
            });
        }

        let a: Vec<_> = valid.iter().map(|&k| to_na(&reference[k])).collect();
        let b: Vec<_> = valid.iter().map(|&k| to_na(&current[k])).collect();
        let n = valid.len() as f64;
        let centroid_a = a.iter().sum::<na::Vector2<f64>>() / n;
        let centroid_b = b.iter().sum::<na::Vector2<f64>>() / n;

        // H = centered(A)^T * centered(B)
        let h = a
            .iter()
            .zip(&b)
            .fold(na::Matrix2::zeros(), |h, (pa, pb)| {
                h + (pa - centroid_a) * (pb - centroid_b).transpose()
            });

        let spread_a: f64 = a.iter().map(|p| (p - centroid_a).norm_squared()).sum();
        let spread_b: f64 = b.iter().map(|p| (p - centroid_b).norm_squared()).sum();
        let tolerance = DEGENERATE_EPS * (1.0 + (spread_a * spread_b).sqrt());

        let svd = h.svd(true, true);
        let (u, mut v_t) = match (svd.u, svd.v_t) {
            (Some(u), Some(v_t)) => (u, v_t),
            _ => {
                return Err(Error::DegenerateAlignment(
                    "SVD of cross-covariance did not converge".to_string(),
                ));
            }
        };

        let degenerate = svd.singular_values.max() <= tolerance;
        let rotation = if degenerate {
            warn!(
                "degenerate alignment over {} points, using identity rotation",
                valid.len()
            );
            na::Matrix2::identity()
        } else {
            let mut r = v_t.transpose() * u.transpose();
            if r.determinant() < 0.0 {
                debug!("reflection detected, flipping last row of V^T");
                v_t.row_mut(1).neg_mut();
                r = v_t.transpose() * u.transpose();
            }
            r
        };

        let translation = centroid_b - rotation * centroid_a;
        Ok(RigidTransform {
            rotation,
            translation,
            degenerate,
        })
    }
}

/// Indices tracked in both point sets.
pub fn valid_indices(reference: &[Point2D], current: &[Point2D]) -> Result<Vec<usize>> {
    if reference.len() != current.len() {
        return Err(Error::MismatchedPointSets {
            reference: reference.len(),
            current: current.len(),
        });
    }
    Ok(reference
        .iter()
        .zip(current)
        .enumerate()
        .filter_map(|(k, (r, c))| {
            debug_assert!(
                has_consistent_nan(r) && has_consistent_nan(c),
                "mismatched NaN coordinates at index {}",
                k
            );
            (is_tracked(r) && is_tracked(c)).then_some(k)
        })
        .collect())
}

/// `current - (R reference + T)` per index, untracked indices stay untracked.
pub fn residuals(
    transform: &RigidTransform,
    reference: &[Point2D],
    current: &[Point2D],
) -> PointSet {
    reference
        .iter()
        .zip(current)
        .map(|(r, c)| {
            if is_tracked(r) && is_tracked(c) {
                *c - transform.apply(r)
            } else {
                UNTRACKED
            }
        })
        .collect()
}

/// Fits the global rigid motion and returns it with the local residual motion.
pub fn align(reference: &[Point2D], current: &[Point2D]) -> Result<(RigidTransform, PointSet)> {
    let transform = RigidTransform::estimate(reference, current)?;
    let residual = residuals(&transform, reference, current);
    Ok((transform, residual))
}

/// Residual (non-rigid) displacement of `current` relative to `reference`.
pub fn remove_rigid_motion(reference: &[Point2D], current: &[Point2D]) -> Result<PointSet> {
    align(reference, current).map(|(_, residual)| residual)
}
