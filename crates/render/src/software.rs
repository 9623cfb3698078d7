use std::path::PathBuf;

use glam::{Mat4, Vec3};
use image::{Rgba, RgbaImage};
use tractscope_camera::CameraPose;
use tractscope_common::ActorId;

use crate::scene::{Geometry, RenderError, RenderScene};
use crate::view::Viewpoint;

const BACKGROUND: Rgba<u8> = Rgba([0, 0, 0, 255]);

/// Screen-space extent beyond which a segment is skipped rather than walked.
const MAX_SCREEN_EXTENT: f32 = 8.0;

/// CPU render backend: projects line and point geometry into an RGBA buffer.
///
/// Actors are drawn in insertion order with alpha blending and no depth
/// test. Line colour encodes local direction as (|dx|, |dy|, |dz|).
#[derive(Debug)]
pub struct SoftwareScene {
    actors: Vec<(ActorId, Geometry)>,
    view: Viewpoint,
    screen_size: (u32, u32),
    preview_path: Option<PathBuf>,
    frames_rendered: usize,
}

impl SoftwareScene {
    /// Scene whose on-screen frames are `width` x `height` pixels.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            actors: Vec::new(),
            view: Viewpoint::default(),
            screen_size: (width, height),
            preview_path: None,
            frames_rendered: 0,
        }
    }

    /// Write every on-screen frame to this PNG path, overwriting the previous
    /// one. Image viewers that reload on change show the animation live.
    pub fn with_preview(mut self, path: impl Into<PathBuf>) -> Self {
        self.preview_path = Some(path.into());
        self
    }

    pub fn view(&self) -> &Viewpoint {
        &self.view
    }

    pub fn frames_rendered(&self) -> usize {
        self.frames_rendered
    }

    /// Handles of all actors, in draw order.
    pub fn actor_ids(&self) -> Vec<ActorId> {
        self.actors.iter().map(|(id, _)| *id).collect()
    }

    /// Bounding sphere of every actor's vertices.
    fn bounding_sphere(&self) -> Option<(Vec3, f32)> {
        let mut bounds: Option<(Vec3, Vec3)> = None;
        for (_, geometry) in &self.actors {
            for p in geometry.points() {
                bounds = Some(match bounds {
                    None => (*p, *p),
                    Some((lo, hi)) => (lo.min(*p), hi.max(*p)),
                });
            }
        }
        bounds.map(|(lo, hi)| ((lo + hi) * 0.5, (hi - lo).length() * 0.5))
    }

    fn rasterize(&self, width: u32, height: u32) -> Result<RgbaImage, RenderError> {
        if width == 0 || height == 0 {
            return Err(RenderError::EmptyResolution { width, height });
        }
        let _span = tracing::trace_span!("rasterize", width, height).entered();

        let mut image = RgbaImage::from_pixel(width, height, BACKGROUND);
        let view_proj = self.view.view_projection(width as f32 / height as f32);

        for (_, geometry) in &self.actors {
            match geometry {
                Geometry::Lines {
                    streamlines,
                    opacity,
                } => {
                    for (a, b) in streamlines.iter().flat_map(|s| s.segments()) {
                        let color = direction_color(b - a);
                        self.draw_segment(&mut image, &view_proj, a, b, color, *opacity);
                    }
                }
                Geometry::Surface {
                    points,
                    color,
                    opacity,
                } => {
                    for p in points {
                        if let Some((x, y)) = self.view.project(&view_proj, *p, width, height) {
                            let pixel = pixel_at(&image, x, y);
                            blend_pixel(&mut image, pixel, *color, *opacity);
                        }
                    }
                }
            }
        }

        Ok(image)
    }

    fn draw_segment(
        &self,
        image: &mut RgbaImage,
        view_proj: &Mat4,
        a: Vec3,
        b: Vec3,
        color: [u8; 3],
        opacity: f32,
    ) {
        let (width, height) = image.dimensions();
        let (Some(pa), Some(pb)) = (
            self.view.project(view_proj, a, width, height),
            self.view.project(view_proj, b, width, height),
        ) else {
            return;
        };

        let limit = MAX_SCREEN_EXTENT * width.max(height) as f32;
        if [pa.0, pa.1, pb.0, pb.1].iter().any(|v| v.abs() > limit) {
            return;
        }

        let (dx, dy) = (pb.0 - pa.0, pb.1 - pa.1);
        let steps = dx.abs().max(dy.abs()).ceil().max(1.0) as u32;
        let mut last = None;
        for i in 0..=steps {
            let t = i as f32 / steps as f32;
            let pixel = pixel_at(image, pa.0 + dx * t, pa.1 + dy * t);
            // Each pixel is blended once per segment.
            if pixel.is_some() && pixel != last {
                blend_pixel(image, pixel, color, opacity);
            }
            last = pixel;
        }
    }
}

fn direction_color(d: Vec3) -> [u8; 3] {
    let n = d.normalize_or_zero().abs();
    [
        (n.x * 255.0).round() as u8,
        (n.y * 255.0).round() as u8,
        (n.z * 255.0).round() as u8,
    ]
}

fn pixel_at(image: &RgbaImage, x: f32, y: f32) -> Option<(u32, u32)> {
    if x < 0.0 || y < 0.0 {
        return None;
    }
    let (px, py) = (x as u32, y as u32);
    (px < image.width() && py < image.height()).then_some((px, py))
}

fn blend_pixel(image: &mut RgbaImage, pixel: Option<(u32, u32)>, color: [u8; 3], opacity: f32) {
    let Some((px, py)) = pixel else {
        return;
    };
    let alpha = opacity.clamp(0.0, 1.0);
    let dst = image.get_pixel_mut(px, py);
    for (channel, src) in dst.0.iter_mut().zip(color) {
        let mixed = src as f32 * alpha + *channel as f32 * (1.0 - alpha);
        *channel = mixed.round() as u8;
    }
    dst.0[3] = 255;
}

impl RenderScene for SoftwareScene {
    fn add(&mut self, geometry: Geometry) -> ActorId {
        let id = ActorId::new();
        tracing::debug!(actor = %id.short(), "actor added");
        self.actors.push((id, geometry));
        id
    }

    fn remove(&mut self, id: ActorId) -> Result<(), RenderError> {
        let index = self
            .actors
            .iter()
            .position(|(actor, _)| *actor == id)
            .ok_or(RenderError::UnknownActor(id))?;
        self.actors.remove(index);
        tracing::debug!(actor = %id.short(), "actor removed");
        Ok(())
    }

    fn set_camera(&mut self, pose: &CameraPose) {
        self.view = self.view.with_pose(pose);
    }

    fn reset_view(&mut self) {
        if let Some((center, radius)) = self.bounding_sphere() {
            self.view = self.view.fit_sphere(center, radius);
        }
    }

    fn render_to_screen(&mut self) -> Result<(), RenderError> {
        let (width, height) = self.screen_size;
        let image = self.rasterize(width, height)?;
        self.frames_rendered += 1;
        match &self.preview_path {
            Some(path) => image.save(path)?,
            None => tracing::debug!(
                frame = self.frames_rendered,
                actors = self.actors.len(),
                eye = ?self.view.position,
                target = ?self.view.focal_point,
                "frame rendered"
            ),
        }
        Ok(())
    }

    fn capture_image(&mut self, width: u32, height: u32) -> Result<RgbaImage, RenderError> {
        self.rasterize(width, height)
    }

    fn interact(&mut self) -> Result<(), RenderError> {
        tracing::info!(
            frames = self.frames_rendered,
            "software scene has no window system; ending interactive session"
        );
        Ok(())
    }

    fn actor_count(&self) -> usize {
        self.actors.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tractscope_common::Streamline;

    fn horizontal_line() -> Geometry {
        Geometry::lines(vec![Streamline::new(vec![
            Vec3::new(-10.0, 0.0, 0.0),
            Vec3::new(10.0, 0.0, 0.0),
        ])])
    }

    fn looking_from_minus_y() -> CameraPose {
        CameraPose {
            position: Vec3::new(0.0, -80.0, 0.0),
            focal_point: Vec3::ZERO,
            up: Vec3::Z,
        }
    }

    fn lit_pixels(image: &RgbaImage) -> usize {
        image.pixels().filter(|p| p.0[..3] != [0, 0, 0]).count()
    }

    #[test]
    fn add_and_remove_actors() {
        let mut scene = SoftwareScene::new(64, 64);
        let a = scene.add(horizontal_line());
        let b = scene.add(horizontal_line());
        assert_eq!(scene.actor_count(), 2);

        scene.remove(a).unwrap();
        assert_eq!(scene.actor_ids(), vec![b]);
        assert!(matches!(
            scene.remove(a),
            Err(RenderError::UnknownActor(id)) if id == a
        ));
    }

    #[test]
    fn capture_draws_lines_in_direction_color() {
        let mut scene = SoftwareScene::new(64, 64);
        scene.add(horizontal_line());
        scene.set_camera(&looking_from_minus_y());

        let image = scene.capture_image(64, 64).unwrap();
        assert_eq!(image.dimensions(), (64, 64));
        assert!(lit_pixels(&image) > 10);
        // An X-aligned segment is pure red.
        let center = image.get_pixel(32, 32);
        assert_eq!(center.0, [255, 0, 0, 255]);
    }

    #[test]
    fn empty_scene_captures_background() {
        let mut scene = SoftwareScene::new(16, 16);
        let image = scene.capture_image(16, 16).unwrap();
        assert_eq!(lit_pixels(&image), 0);
    }

    #[test]
    fn zero_resolution_is_rejected() {
        let mut scene = SoftwareScene::new(16, 16);
        assert!(matches!(
            scene.capture_image(0, 16),
            Err(RenderError::EmptyResolution { width: 0, height: 16 })
        ));
    }

    #[test]
    fn translucent_actor_blends() {
        let mut scene = SoftwareScene::new(64, 64);
        scene.add(Geometry::Lines {
            streamlines: vec![Streamline::new(vec![
                Vec3::new(-10.0, 0.0, 0.0),
                Vec3::new(10.0, 0.0, 0.0),
            ])],
            opacity: 0.5,
        });
        scene.set_camera(&looking_from_minus_y());
        let image = scene.capture_image(64, 64).unwrap();
        assert_eq!(image.get_pixel(32, 32).0, [128, 0, 0, 255]);
    }

    #[test]
    fn reset_view_fits_all_actors() {
        let mut scene = SoftwareScene::new(64, 64);
        scene.add(Geometry::lines(vec![Streamline::new(vec![
            Vec3::new(100.0, 0.0, 0.0),
            Vec3::new(140.0, 0.0, 0.0),
        ])]));
        scene.set_camera(&looking_from_minus_y());
        scene.reset_view();

        assert!(scene.view().focal_point.abs_diff_eq(Vec3::new(120.0, 0.0, 0.0), 1e-4));
        assert!(scene.view().forward().abs_diff_eq(Vec3::Y, 1e-5));
        let image = scene.capture_image(64, 64).unwrap();
        assert!(lit_pixels(&image) > 20);
    }

    #[test]
    fn reset_view_on_empty_scene_is_noop() {
        let mut scene = SoftwareScene::new(16, 16);
        let before = *scene.view();
        scene.reset_view();
        assert_eq!(*scene.view(), before);
    }

    #[test]
    fn render_to_screen_writes_preview() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("preview.png");
        let mut scene = SoftwareScene::new(32, 24).with_preview(&path);
        scene.add(horizontal_line());
        scene.set_camera(&looking_from_minus_y());
        scene.render_to_screen().unwrap();
        scene.render_to_screen().unwrap();

        assert_eq!(scene.frames_rendered(), 2);
        let written = image::open(&path).unwrap();
        assert_eq!((written.width(), written.height()), (32, 24));
    }

    #[test]
    fn surface_points_are_drawn() {
        let mut scene = SoftwareScene::new(32, 32);
        scene.add(Geometry::Surface {
            points: vec![Vec3::ZERO],
            color: [10, 20, 30],
            opacity: 1.0,
        });
        scene.set_camera(&looking_from_minus_y());
        let image = scene.capture_image(32, 32).unwrap();
        assert_eq!(image.get_pixel(16, 16).0, [10, 20, 30, 255]);
    }
}
