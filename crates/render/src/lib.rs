//! Rendering adapter: handle-based scene interface.
//!
//! # Invariants
//! - Actors are owned by the scene and addressed only through `ActorId`.
//! - The scene never decides which batches are visible; callers add and
//!   remove actors explicitly.
//!
//! # Backend
//! `SoftwareScene` projects line geometry on the CPU into an RGBA buffer.
//! It has no window system, so interactive sessions end after the last
//! frame. The trait is the stable seam for a GPU backend.

mod scene;
mod software;
mod view;

pub use scene::{Geometry, RenderError, RenderScene};
pub use software::SoftwareScene;
pub use view::Viewpoint;

pub fn crate_info() -> &'static str {
    "tractscope-render v0.1.0"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_loads() {
        assert!(crate_info().contains("render"));
    }
}
