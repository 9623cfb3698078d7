//! Camera tracking: per-batch principal-axis observations blended into a
//! smoothed camera state.
//!
//! # Invariants
//! - Observed view axes always have a non-negative first component.
//! - `CameraState` is a value; updates return a new state.
//! - The up vector is fixed to +Z and never derived from data.

mod state;
mod tracker;

pub use state::{CameraPose, CameraState, DEFAULT_DISTANCE_FACTOR, VIEW_UP};
pub use tracker::{CameraError, CameraObservation, CameraTracker};

pub fn crate_info() -> &'static str {
    "tractscope-camera v0.1.0"
}
