use std::time::{Duration, Instant};

use glam::Mat4;
use tracing::{debug, info, info_span, trace, warn};
use tractscope_camera::{CameraError, CameraState, CameraTracker};
use tractscope_common::{ActorId, Batch, Streamline};
use tractscope_export::EncodeReport;
use tractscope_io::RegionMask;
use tractscope_render::{Geometry, RenderScene};
use tractscope_window::{WindowManager, partition};

use crate::config::PlayerConfig;
use crate::error::PlayerError;
use crate::sink::FrameSink;
use crate::timer::StepTimer;

/// Opacity of the static reference tractogram.
pub const REFERENCE_OPACITY: f32 = 0.3;

/// Colour of region surfaces.
pub const REGION_COLOR: [u8; 3] = [255, 0, 0];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// The window had free slots before this step's admission.
    Filling,
    /// The window was already full; every admission evicts.
    Steady,
    /// All batches have been played.
    Done,
}

/// What one step did.
#[derive(Debug, Clone, PartialEq)]
pub struct StepReport {
    pub batch: usize,
    pub phase: Phase,
    pub weight: f32,
    pub admitted: ActorId,
    pub evicted: Option<ActorId>,
    pub camera_updated: bool,
}

/// Totals for a finished run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub frames: usize,
    pub batches_admitted: usize,
    pub batches_evicted: usize,
    pub degenerate_skips: usize,
    pub mean_step: Duration,
    pub max_step: Duration,
    pub artifact: Option<EncodeReport>,
}

/// Sliding-window batch player.
///
/// Owns the window of visible batch actors and the smoothed camera state. The
/// scene and sink are borrowed per call so callers keep control of both.
#[derive(Debug)]
pub struct Player {
    config: PlayerConfig,
    window: WindowManager<ActorId>,
    tracker: CameraTracker,
    camera: CameraState,
    timer: StepTimer,
    frames: usize,
    degenerate_skips: usize,
    done: bool,
}

impl Player {
    pub fn new(config: PlayerConfig) -> Result<Self, PlayerError> {
        config.validate()?;
        let window = WindowManager::new(config.window_size, config.batch_size)?;
        info!(
            window_size = config.window_size,
            batch_size = config.batch_size,
            capacity = window.capacity(),
            "player created"
        );
        Ok(Self {
            config,
            window,
            tracker: CameraTracker::new(),
            camera: CameraState::default(),
            timer: StepTimer::new(),
            frames: 0,
            degenerate_skips: 0,
            done: false,
        })
    }

    pub fn config(&self) -> &PlayerConfig {
        &self.config
    }

    pub fn camera(&self) -> CameraState {
        self.camera
    }

    /// Phase the next step would run in.
    pub fn phase(&self) -> Phase {
        if self.done {
            Phase::Done
        } else if self.window.is_full() {
            Phase::Steady
        } else {
            Phase::Filling
        }
    }

    /// Handles of the visible batch actors, oldest first.
    pub fn visible(&self) -> impl Iterator<Item = &ActorId> {
        self.window.iter()
    }

    /// Add a reference tractogram as a translucent backdrop and aim the
    /// camera at it, replacing the current camera state outright.
    pub fn seed_from_reference(
        &mut self,
        scene: &mut dyn RenderScene,
        reference: &[Streamline],
    ) -> Result<ActorId, PlayerError> {
        let _span = info_span!("seed_reference", streamlines = reference.len()).entered();
        let id = scene.add(Geometry::Lines {
            streamlines: reference.to_vec(),
            opacity: REFERENCE_OPACITY,
        });
        if self.update_camera(scene, reference, 1.0)? {
            debug!(camera = ?self.camera, "camera seeded from reference");
        }
        scene.reset_view();
        Ok(id)
    }

    /// Add every mask's boundary surface to the scene.
    ///
    /// All masks must share one affine, compared exactly; nothing is added
    /// otherwise. Returns
    /// the shared affine, or `None` for an empty list.
    pub fn load_regions(
        &mut self,
        scene: &mut dyn RenderScene,
        masks: &[RegionMask],
    ) -> Result<Option<Mat4>, PlayerError> {
        let Some(first) = masks.first() else {
            return Ok(None);
        };
        if let Some(index) = masks.iter().position(|m| m.affine != first.affine) {
            return Err(PlayerError::AffineMismatch { index });
        }

        for (i, mask) in masks.iter().enumerate() {
            let points = mask.surface_points();
            debug!(region = i, surface_points = points.len(), "adding region");
            scene.add(Geometry::Surface {
                points,
                color: REGION_COLOR,
                opacity: self.config.region_opacity,
            });
        }
        Ok(Some(first.affine))
    }

    /// Play one batch: evict the oldest batch if the window is full, admit
    /// the new one, update the camera, optionally refit the view, then
    /// present the frame. The scene never holds more batch actors than the
    /// window's capacity.
    ///
    /// Fails with [`PlayerError::Finished`] once the player has run to
    /// completion.
    pub fn step(
        &mut self,
        scene: &mut dyn RenderScene,
        sink: &mut dyn FrameSink,
        batch: Batch<'_>,
    ) -> Result<StepReport, PlayerError> {
        let _span = info_span!("player_step", batch = batch.index).entered();
        let start = Instant::now();

        let phase = self.phase();
        let weight = match phase {
            Phase::Filling => self.config.initial_weight,
            Phase::Steady => self.config.steady_weight,
            Phase::Done => return Err(PlayerError::Finished),
        };

        let evicted = self.window.make_room();
        if let Some(old) = evicted {
            scene.remove(old)?;
            debug!(actor = %old.short(), "batch evicted");
        }
        let admitted = scene.add(Geometry::lines(batch.streamlines.to_vec()));
        self.window.admit(admitted);
        debug!(actor = %admitted.short(), visible = self.window.len(), "batch admitted");

        let camera_updated =
            self.config.update_camera && self.update_camera(scene, batch.streamlines, weight)?;

        if self.config.reset_camera {
            scene.reset_view();
        }

        sink.present(scene, batch.index)?;
        self.frames += 1;

        let elapsed = start.elapsed();
        self.timer.record(elapsed);
        trace!(
            ?phase,
            weight,
            points = batch.point_count(),
            actors = scene.actor_count(),
            elapsed_us = elapsed.as_micros() as u64,
            "step complete"
        );

        Ok(StepReport {
            batch: batch.index,
            phase,
            weight,
            admitted,
            evicted,
            camera_updated,
        })
    }

    /// Play every full batch of `streamlines`, then finish the sink.
    pub fn run(
        &mut self,
        scene: &mut dyn RenderScene,
        mut sink: Box<dyn FrameSink>,
        streamlines: &[Streamline],
    ) -> Result<RunSummary, PlayerError> {
        let batches = partition(streamlines, self.config.batch_size);
        info!(
            streamlines = streamlines.len(),
            batches = batches.len(),
            "starting playback"
        );
        for batch in batches {
            self.step(scene, sink.as_mut(), batch)?;
        }
        self.done = true;

        let artifact = sink.finish(scene)?;
        let stats = self.window.stats();
        let summary = RunSummary {
            frames: self.frames,
            batches_admitted: stats.admitted,
            batches_evicted: stats.evicted,
            degenerate_skips: self.degenerate_skips,
            mean_step: self.timer.mean(),
            max_step: self.timer.max(),
            artifact,
        };
        info!(
            frames = summary.frames,
            evicted = summary.batches_evicted,
            skipped = summary.degenerate_skips,
            "playback complete"
        );
        Ok(summary)
    }

    /// Blend an observation of `streamlines` into the camera and apply it.
    /// Returns `false` when the geometry was degenerate and the camera was
    /// left unchanged.
    fn update_camera(
        &mut self,
        scene: &mut dyn RenderScene,
        streamlines: &[Streamline],
        weight: f32,
    ) -> Result<bool, PlayerError> {
        let observation = match self.tracker.observe(streamlines) {
            Ok(obs) => obs,
            Err(err @ CameraError::Degenerate { .. }) => {
                warn!(%err, "skipping camera update");
                self.degenerate_skips += 1;
                return Ok(false);
            }
            Err(err) => return Err(err.into()),
        };
        self.camera = self.camera.update(&observation, weight)?;
        scene.set_camera(&self.camera.pose(self.config.distance_factor));
        debug!(
            weight,
            focal_point = ?self.camera.focal_point,
            view_axis = ?self.camera.view_axis,
            "camera updated"
        );
        Ok(true)
    }
}
