//! Shared data model: streamlines, tractograms, batches and scene handles.
//!
//! # Invariants
//! - Streamlines are immutable once loaded; transforms produce new values.
//! - A batch borrows a contiguous run of streamlines from its tractogram.

mod types;

pub use types::{ActorId, Batch, Streamline, Tractogram, flatten_points};

pub fn crate_info() -> &'static str {
    "tractscope-common v0.1.0"
}
