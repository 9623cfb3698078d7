use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::tracker::{CameraError, CameraObservation};

/// Distance (in data units) between the focal point and the camera along the
/// view axis.
pub const DEFAULT_DISTANCE_FACTOR: f32 = 80.0;

/// Fixed camera up vector. Assumes the data's superior direction is +Z.
pub const VIEW_UP: Vec3 = Vec3::Z;

/// Smoothed camera estimate carried from one frame to the next.
///
/// Starts at zero vectors. Each update blends a fresh observation in with
/// `new = (1 - w) * previous + w * observation`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CameraState {
    pub focal_point: Vec3,
    pub view_axis: Vec3,
}

/// Camera placement handed to a render scene.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraPose {
    pub position: Vec3,
    pub focal_point: Vec3,
    pub up: Vec3,
}

impl CameraState {
    pub fn new(focal_point: Vec3, view_axis: Vec3) -> Self {
        Self {
            focal_point,
            view_axis,
        }
    }

    /// Blend `observation` into this state with weight `w` in `[0, 1]`.
    ///
    /// `w = 1` returns the observation, `w = 0` returns `self` unchanged.
    pub fn update(&self, observation: &CameraObservation, w: f32) -> Result<Self, CameraError> {
        if !(0.0..=1.0).contains(&w) {
            return Err(CameraError::InvalidWeight(w));
        }
        Ok(Self {
            focal_point: blend(self.focal_point, observation.focal_point, w),
            view_axis: blend(self.view_axis, observation.view_axis, w),
        })
    }

    /// Camera pose looking at the focal point from `distance_factor` units
    /// along the view axis.
    pub fn pose(&self, distance_factor: f32) -> CameraPose {
        CameraPose {
            position: self.focal_point + distance_factor * self.view_axis,
            focal_point: self.focal_point,
            up: VIEW_UP,
        }
    }
}

impl From<CameraObservation> for CameraState {
    fn from(obs: CameraObservation) -> Self {
        Self::new(obs.focal_point, obs.view_axis)
    }
}

fn blend(previous: Vec3, observed: Vec3, w: f32) -> Vec3 {
    (1.0 - w) * previous + w * observed
}
