//! Frame encoders for captured renders.
//!
//! # Invariants
//! - The encoded artifact holds exactly one frame per input image, in order.
//! - Every frame is shown for `1000 / fps` milliseconds.
//! - Empty frame lists and a zero frame rate are rejected before anything is
//!   written.

mod encode;

pub use encode::{AnimationManifest, EncodeReport, ExportError, OutputFormat, encode};

pub fn crate_info() -> &'static str {
    "tractscope-export v0.1.0"
}
