use glam::Vec3;
use nalgebra::{Matrix3, SymmetricEigen, Vector3};
use serde::{Deserialize, Serialize};
use tractscope_common::{Streamline, flatten_points};

/// Total variance (covariance trace) at or below which a point set is
/// treated as degenerate.
const DEFAULT_MIN_VARIANCE: f64 = 1e-9;

/// Errors from camera observation and smoothing.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CameraError {
    #[error("degenerate geometry: {points} points, total variance {total_variance:e}")]
    Degenerate { points: usize, total_variance: f64 },
    #[error("smoothing weight {0} outside [0, 1]")]
    InvalidWeight(f32),
}

/// Recommended camera target for one set of streamlines.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraObservation {
    /// Center of mass of all points.
    pub focal_point: Vec3,
    /// Unit direction of least spatial spread, sign-normalized.
    pub view_axis: Vec3,
}

/// Computes camera observations from the point distribution of a batch.
#[derive(Debug, Clone, Copy)]
pub struct CameraTracker {
    min_variance: f64,
}

impl Default for CameraTracker {
    fn default() -> Self {
        Self {
            min_variance: DEFAULT_MIN_VARIANCE,
        }
    }
}

impl CameraTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the degenerate-geometry threshold.
    pub fn with_min_variance(min_variance: f64) -> Self {
        Self { min_variance }
    }

    /// Observe the concatenated points of `streamlines`.
    ///
    /// The focal point is the mean of all points. The view axis is the
    /// eigenvector of the sample covariance with the smallest eigenvalue,
    /// flipped so that its first component is non-negative.
    pub fn observe(&self, streamlines: &[Streamline]) -> Result<CameraObservation, CameraError> {
        let (mean, points) = mean(streamlines);
        if points < 2 {
            return Err(CameraError::Degenerate {
                points,
                total_variance: 0.0,
            });
        }

        let cov = covariance(streamlines, &mean, points);
        let total_variance = cov.trace();
        if total_variance.is_nan() || total_variance <= self.min_variance {
            return Err(CameraError::Degenerate {
                points,
                total_variance,
            });
        }

        let axis = least_variance_axis(cov);
        let view_axis = normalize_sign(Vec3::new(axis.x as f32, axis.y as f32, axis.z as f32));
        let focal_point = Vec3::new(mean.x as f32, mean.y as f32, mean.z as f32);

        tracing::trace!(?focal_point, ?view_axis, points, "camera observation");

        Ok(CameraObservation {
            focal_point,
            view_axis,
        })
    }
}

fn mean(streamlines: &[Streamline]) -> (Vector3<f64>, usize) {
    let mut sum = Vector3::zeros();
    let mut count = 0usize;
    for p in flatten_points(streamlines) {
        sum += to_f64(p);
        count += 1;
    }
    if count > 0 {
        sum /= count as f64;
    }
    (sum, count)
}

/// Sample covariance (denominator `n - 1`).
fn covariance(streamlines: &[Streamline], mean: &Vector3<f64>, count: usize) -> Matrix3<f64> {
    let mut acc = Matrix3::zeros();
    for p in flatten_points(streamlines) {
        let d = to_f64(p) - mean;
        acc += d * d.transpose();
    }
    acc / (count as f64 - 1.0)
}

/// Eigenvector of the smallest eigenvalue after sorting eigenvalues in
/// descending order.
fn least_variance_axis(cov: Matrix3<f64>) -> Vector3<f64> {
    let eig = SymmetricEigen::new(cov);
    let mut order = [0usize, 1, 2];
    order.sort_by(|&a, &b| eig.eigenvalues[b].total_cmp(&eig.eigenvalues[a]));
    eig.eigenvectors.column(order[2]).into_owned()
}

/// Flip `axis` so that its first component is non-negative.
///
/// Only component 0 is inspected; axes lying in the Y-Z plane can still flip
/// between frames when their x component hovers around zero.
fn normalize_sign(axis: Vec3) -> Vec3 {
    if axis.x < 0.0 { -axis } else { axis }
}

fn to_f64(p: &Vec3) -> Vector3<f64> {
    Vector3::new(p.x as f64, p.y as f64, p.z as f64)
}
