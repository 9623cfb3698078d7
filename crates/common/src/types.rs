use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique handle for an actor (line set or surface) added to a render scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ActorId(pub Uuid);

impl ActorId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Short prefix for log output.
    pub fn short(&self) -> String {
        self.0.to_string()[..8].to_string()
    }
}

impl Default for ActorId {
    fn default() -> Self {
        Self::new()
    }
}

/// One reconstructed fiber path: an ordered polyline of 3D points.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Streamline {
    points: Vec<Vec3>,
}

impl Streamline {
    pub fn new(points: Vec<Vec3>) -> Self {
        Self { points }
    }

    pub fn points(&self) -> &[Vec3] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Apply an affine transform to every point, producing a new streamline.
    pub fn transformed(&self, affine: &Mat4) -> Self {
        Self {
            points: self
                .points
                .iter()
                .map(|p| affine.transform_point3(*p))
                .collect(),
        }
    }

    /// Consecutive point pairs along the polyline.
    pub fn segments(&self) -> impl Iterator<Item = (Vec3, Vec3)> + '_ {
        self.points.windows(2).map(|w| (w[0], w[1]))
    }
}

impl From<Vec<Vec3>> for Streamline {
    fn from(points: Vec<Vec3>) -> Self {
        Self::new(points)
    }
}

/// A loaded tractogram: streamlines in world (RAS+ mm) space and the
/// voxel-to-world affine of the grid they were tracked on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tractogram {
    pub streamlines: Vec<Streamline>,
    pub affine: Mat4,
}

impl Default for Tractogram {
    fn default() -> Self {
        Self {
            streamlines: Vec::new(),
            affine: Mat4::IDENTITY,
        }
    }
}

impl Tractogram {
    pub fn new(streamlines: Vec<Streamline>, affine: Mat4) -> Self {
        Self {
            streamlines,
            affine,
        }
    }

    /// Number of streamlines.
    pub fn len(&self) -> usize {
        self.streamlines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streamlines.is_empty()
    }

    /// Total number of points across all streamlines.
    pub fn point_count(&self) -> usize {
        self.streamlines.iter().map(Streamline::len).sum()
    }

    /// Streamlines mapped into voxel index space (inverse of the affine).
    pub fn to_voxel_space(&self) -> Vec<Streamline> {
        let inverse = self.affine.inverse();
        self.streamlines
            .iter()
            .map(|s| s.transformed(&inverse))
            .collect()
    }

    /// Axis-aligned bounds of all points, or `None` when there are no points.
    pub fn bounds(&self) -> Option<(Vec3, Vec3)> {
        flatten_points(&self.streamlines).fold(None, |acc, p| match acc {
            None => Some((*p, *p)),
            Some((lo, hi)) => Some((lo.min(*p), hi.max(*p))),
        })
    }
}

/// A contiguous group of streamlines admitted to the window as one unit.
#[derive(Debug, Clone, Copy)]
pub struct Batch<'a> {
    /// Ordinal position of this batch in the stream.
    pub index: usize,
    pub streamlines: &'a [Streamline],
}

impl<'a> Batch<'a> {
    pub fn new(index: usize, streamlines: &'a [Streamline]) -> Self {
        Self { index, streamlines }
    }

    pub fn len(&self) -> usize {
        self.streamlines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streamlines.is_empty()
    }

    pub fn point_count(&self) -> usize {
        self.streamlines.iter().map(Streamline::len).sum()
    }

    /// All points of all member streamlines, in order.
    pub fn points(&self) -> impl Iterator<Item = &'a Vec3> + 'a {
        flatten_points(self.streamlines)
    }
}

/// Iterate the concatenated points of a set of streamlines.
pub fn flatten_points(streamlines: &[Streamline]) -> impl Iterator<Item = &Vec3> {
    streamlines.iter().flat_map(|s| s.points().iter())
}
