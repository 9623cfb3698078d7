//! Sliding window: bounded FIFO of visible batches, batch partitioning.
//!
//! # Invariants
//! - The window never holds more than `capacity` entries.
//! - Admission order equals eviction order (strict FIFO).
//! - Zero capacity is a configuration error, never an unbounded window.

mod partition;
mod window;

pub use partition::{Batches, batch_count, partition};
pub use window::{WindowError, WindowManager, WindowStats};

pub fn crate_info() -> &'static str {
    "tractscope-window v0.1.0"
}
