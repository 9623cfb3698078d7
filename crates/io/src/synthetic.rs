//! Seeded sample tractograms.
//!
//! Two bundles loosely shaped like a cingulum (an anterior-posterior arch on
//! both hemispheres) and a corticospinal tract (two near-vertical fans), laid
//! out in RAS+ mm around the origin of a 1 mm MNI-like grid.

use std::f32::consts::PI;

use glam::{Mat4, Vec3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tractscope_common::{Streamline, Tractogram};

/// World position of voxel (0, 0, 0) on the 1 mm grid the bundles live on.
pub const GRID_ORIGIN: Vec3 = Vec3::new(-90.0, -126.0, -72.0);

#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticSpec {
    pub streamlines_per_bundle: usize,
    pub points_per_streamline: usize,
    /// Spread of each streamline around its bundle centre, in mm.
    pub jitter: f32,
    pub seed: u64,
}

impl Default for SyntheticSpec {
    fn default() -> Self {
        Self {
            streamlines_per_bundle: 200,
            points_per_streamline: 60,
            jitter: 1.5,
            seed: 42,
        }
    }
}

/// Generate both bundles. Identical specs yield identical tractograms.
///
/// Streamlines are interleaved by bundle so that any contiguous batch covers
/// a mix of both.
pub fn bundles(spec: &SyntheticSpec) -> Tractogram {
    let mut rng = StdRng::seed_from_u64(spec.seed);
    let n_points = spec.points_per_streamline.max(2);
    let mut streamlines = Vec::with_capacity(spec.streamlines_per_bundle * 2);

    for i in 0..spec.streamlines_per_bundle {
        let side = if i % 2 == 0 { 1.0 } else { -1.0 };
        streamlines.push(cingulum(&mut rng, spec.jitter, n_points, side));
        streamlines.push(corticospinal(&mut rng, spec.jitter, n_points, side));
    }

    Tractogram::new(streamlines, Mat4::from_translation(GRID_ORIGIN))
}

fn offset(rng: &mut StdRng, spread: f32) -> Vec3 {
    if spread <= 0.0 {
        return Vec3::ZERO;
    }
    Vec3::new(
        rng.gen_range(-spread..spread),
        rng.gen_range(-spread..spread),
        rng.gen_range(-spread..spread),
    )
}

fn cingulum(rng: &mut StdRng, jitter: f32, n_points: usize, side: f32) -> Streamline {
    let shift = offset(rng, jitter);
    let height = 25.0 + rng.gen_range(-2.0..2.0);
    let points = (0..n_points)
        .map(|k| {
            let t = k as f32 / (n_points - 1) as f32;
            let centre = Vec3::new(8.0 * side, -60.0 + 120.0 * t, 20.0 + height * (PI * t).sin());
            centre + shift + offset(rng, jitter * 0.1)
        })
        .collect();
    Streamline::new(points)
}

fn corticospinal(rng: &mut StdRng, jitter: f32, n_points: usize, side: f32) -> Streamline {
    let shift = offset(rng, jitter);
    let fan = rng.gen_range(0.05..0.25);
    let points = (0..n_points)
        .map(|k| {
            let t = k as f32 / (n_points - 1) as f32;
            let z = -40.0 + 100.0 * t;
            let centre = Vec3::new(side * (20.0 + fan * (z + 40.0)), -15.0, z);
            centre + shift + offset(rng, jitter * 0.1)
        })
        .collect();
    Streamline::new(points)
}
