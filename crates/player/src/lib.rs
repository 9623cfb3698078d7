//! Frame-loop orchestration.
//!
//! A [`Player`] walks a tractogram batch by batch. Each step evicts the
//! oldest batch once the window is full, adds the new batch to the scene,
//! smooths the camera toward it and hands the frame to a [`FrameSink`].
//!
//! # Invariants
//! - The scene holds at most `window_size / batch_size` batch actors, plus any
//!   static reference or region actors, at every point within a step.
//! - Evicted actors are removed from the scene in admission order.
//! - Steps run in `Filling` until the window is full, then in `Steady`.
//!   Stepping a finished player is an error.
//! - Degenerate batches leave the camera unchanged; nothing else is skipped.

mod config;
mod error;
mod player;
mod sink;
mod timer;

pub use config::PlayerConfig;
pub use error::PlayerError;
pub use player::{Phase, Player, REFERENCE_OPACITY, REGION_COLOR, RunSummary, StepReport};
pub use sink::{CaptureSink, DisplaySink, FrameSink, sink_for};
pub use timer::StepTimer;

pub fn crate_info() -> &'static str {
    "tractscope-player v0.1.0"
}
