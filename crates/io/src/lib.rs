//! Geometry and segmentation sources.
//!
//! Tractograms are returned in world (RAS+ mm) space together with their
//! voxel-to-world affine; callers decide which space to render in.
//!
//! - `trk`: TrackVis `.trk` reader and writer.
//! - `region`: binary NIfTI segmentation masks and their boundary surfaces.
//! - `synthetic`: seeded sample bundles for demos and tests.

mod error;
pub mod region;
pub mod synthetic;
pub mod trk;

pub use error::IoError;
pub use region::RegionMask;
pub use synthetic::SyntheticSpec;

pub fn crate_info() -> &'static str {
    "tractscope-io v0.1.0"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_loads() {
        assert!(crate_info().contains("io"));
    }
}
