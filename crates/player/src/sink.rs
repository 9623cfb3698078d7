//! Destinations for produced frames.

use std::path::PathBuf;
use std::time::Duration;

use image::RgbaImage;
use tracing::{debug, info};
use tractscope_export::EncodeReport;
use tractscope_render::RenderScene;

use crate::config::PlayerConfig;
use crate::error::PlayerError;

/// Receives one frame per step and finalizes the run.
pub trait FrameSink {
    /// Deliver the frame for step `frame` from the scene's current state.
    fn present(&mut self, scene: &mut dyn RenderScene, frame: usize) -> Result<(), PlayerError>;

    /// Called once after the last step. Returns the written artifact, if any.
    fn finish(self: Box<Self>, scene: &mut dyn RenderScene) -> Result<Option<EncodeReport>, PlayerError>;
}

/// Live display: paces each frame, draws it on screen and finally hands
/// control to the scene's interactive loop.
#[derive(Debug, Clone)]
pub struct DisplaySink {
    pacing: Duration,
}

impl DisplaySink {
    pub fn new(pacing: Duration) -> Self {
        Self { pacing }
    }
}

impl FrameSink for DisplaySink {
    fn present(&mut self, scene: &mut dyn RenderScene, frame: usize) -> Result<(), PlayerError> {
        if !self.pacing.is_zero() {
            std::thread::sleep(self.pacing);
        }
        scene.render_to_screen()?;
        debug!(frame, "frame displayed");
        Ok(())
    }

    fn finish(self: Box<Self>, scene: &mut dyn RenderScene) -> Result<Option<EncodeReport>, PlayerError> {
        info!("playback finished, entering interactive view");
        scene.interact()?;
        Ok(None)
    }
}

/// Off-screen capture: collects one image per step and encodes them all at
/// the end.
#[derive(Debug)]
pub struct CaptureSink {
    width: u32,
    height: u32,
    fps: u32,
    output: PathBuf,
    frames: Vec<RgbaImage>,
}

impl CaptureSink {
    pub fn new(width: u32, height: u32, fps: u32, output: impl Into<PathBuf>) -> Self {
        Self {
            width,
            height,
            fps,
            output: output.into(),
            frames: Vec::new(),
        }
    }

    pub fn frames(&self) -> &[RgbaImage] {
        &self.frames
    }
}

impl FrameSink for CaptureSink {
    fn present(&mut self, scene: &mut dyn RenderScene, frame: usize) -> Result<(), PlayerError> {
        let image = scene.capture_image(self.width, self.height)?;
        self.frames.push(image);
        debug!(frame, captured = self.frames.len(), "frame captured");
        Ok(())
    }

    fn finish(self: Box<Self>, _scene: &mut dyn RenderScene) -> Result<Option<EncodeReport>, PlayerError> {
        let report = tractscope_export::encode(&self.frames, self.fps, &self.output)?;
        Ok(Some(report))
    }
}

/// Capture when an output path is given, display otherwise.
pub fn sink_for(config: &PlayerConfig, output: Option<PathBuf>) -> Box<dyn FrameSink> {
    match output {
        Some(path) => {
            let [width, height] = config.plot_size;
            Box::new(CaptureSink::new(width, height, config.fps, path))
        }
        None => Box::new(DisplaySink::new(config.pacing())),
    }
}
