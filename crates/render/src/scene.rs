use glam::Vec3;
use image::RgbaImage;
use tractscope_camera::CameraPose;
use tractscope_common::{ActorId, Streamline, flatten_points};

/// Errors from render scene operations.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("unknown actor {0:?}")]
    UnknownActor(ActorId),
    #[error("cannot render at {width}x{height}")]
    EmptyResolution { width: u32, height: u32 },
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
}

/// Geometry that can be added to a scene as one actor.
#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    /// Polylines coloured by local direction.
    Lines {
        streamlines: Vec<Streamline>,
        opacity: f32,
    },
    /// Static point-sampled surface, e.g. the boundary of a segmentation.
    Surface {
        points: Vec<Vec3>,
        color: [u8; 3],
        opacity: f32,
    },
}

impl Geometry {
    /// Opaque line set.
    pub fn lines(streamlines: Vec<Streamline>) -> Self {
        Self::Lines {
            streamlines,
            opacity: 1.0,
        }
    }

    pub fn opacity(&self) -> f32 {
        match self {
            Self::Lines { opacity, .. } | Self::Surface { opacity, .. } => *opacity,
        }
    }

    /// Every vertex of the geometry.
    pub fn points(&self) -> Box<dyn Iterator<Item = &Vec3> + '_> {
        match self {
            Self::Lines { streamlines, .. } => Box::new(flatten_points(streamlines)),
            Self::Surface { points, .. } => Box::new(points.iter()),
        }
    }
}

/// Handle-based capability of a 3D render backend.
///
/// The scene owns every actor it was given; callers keep only the returned
/// handles and dispose of actors through `remove`.
pub trait RenderScene {
    /// Add geometry and return its handle.
    fn add(&mut self, geometry: Geometry) -> ActorId;

    /// Remove a previously added actor.
    fn remove(&mut self, id: ActorId) -> Result<(), RenderError>;

    fn set_camera(&mut self, pose: &CameraPose);

    /// Move the camera so that every actor fits in view, keeping the current
    /// view direction.
    fn reset_view(&mut self);

    /// Draw the current scene to the screen.
    fn render_to_screen(&mut self) -> Result<(), RenderError>;

    /// Draw the current scene off-screen and return the image.
    fn capture_image(&mut self, width: u32, height: u32) -> Result<RgbaImage, RenderError>;

    /// Hand control to the backend's interactive event loop. Blocks until the
    /// user closes the view.
    fn interact(&mut self) -> Result<(), RenderError>;

    /// Number of actors currently in the scene.
    fn actor_count(&self) -> usize;
}
