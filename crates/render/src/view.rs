use glam::{Mat4, Vec3, Vec4Swizzles};
use tractscope_camera::CameraPose;

/// Direction the camera looks from when it sits on its focal point.
const FALLBACK_DIRECTION: Vec3 = Vec3::X;

/// Look-at camera with a perspective projection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewpoint {
    pub position: Vec3,
    pub focal_point: Vec3,
    pub up: Vec3,
    /// Vertical field of view in radians.
    pub fov: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for Viewpoint {
    fn default() -> Self {
        Self {
            position: Vec3::new(1.0, 0.0, 0.0),
            focal_point: Vec3::ZERO,
            up: Vec3::Z,
            fov: 30.0_f32.to_radians(),
            near: 0.1,
            far: 10_000.0,
        }
    }
}

impl Viewpoint {
    /// Adopt a pose, keeping the projection parameters.
    pub fn with_pose(self, pose: &CameraPose) -> Self {
        Self {
            position: pose.position,
            focal_point: pose.focal_point,
            up: pose.up,
            ..self
        }
    }

    /// Unit direction from the camera to its focal point.
    pub fn forward(&self) -> Vec3 {
        let d = (self.focal_point - self.position).normalize_or_zero();
        if d == Vec3::ZERO {
            -FALLBACK_DIRECTION
        } else {
            d
        }
    }

    /// Up vector usable with `forward`; swaps to +Y when they are parallel.
    fn effective_up(&self) -> Vec3 {
        let up = self.up.normalize_or_zero();
        if up == Vec3::ZERO || self.forward().cross(up).length_squared() < 1e-8 {
            Vec3::Y
        } else {
            up
        }
    }

    pub fn view_matrix(&self) -> Mat4 {
        let eye = self.focal_point - self.forward() * self.distance().max(1e-3);
        Mat4::look_at_rh(eye, self.focal_point, self.effective_up())
    }

    pub fn projection_matrix(&self, aspect: f32) -> Mat4 {
        Mat4::perspective_rh(self.fov, aspect, self.near, self.far)
    }

    pub fn view_projection(&self, aspect: f32) -> Mat4 {
        self.projection_matrix(aspect) * self.view_matrix()
    }

    pub fn distance(&self) -> f32 {
        self.position.distance(self.focal_point)
    }

    /// Re-center on a bounding sphere and back off until it fits the
    /// vertical field of view. The view direction is preserved.
    pub fn fit_sphere(&self, center: Vec3, radius: f32) -> Self {
        let radius = radius.max(1e-3);
        let distance = radius / (self.fov * 0.5).sin();
        let back = -self.forward();
        Self {
            position: center + back * distance,
            focal_point: center,
            ..*self
        }
    }

    /// Project a world point to pixel coordinates. `None` when the point is
    /// behind the camera.
    pub fn project(&self, view_proj: &Mat4, p: Vec3, width: u32, height: u32) -> Option<(f32, f32)> {
        let clip = *view_proj * p.extend(1.0);
        if clip.w <= self.near {
            return None;
        }
        let ndc = clip.xy() / clip.w;
        let x = (ndc.x * 0.5 + 0.5) * width as f32;
        let y = (0.5 - ndc.y * 0.5) * height as f32;
        Some((x, y))
    }
}
