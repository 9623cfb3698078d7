//! Output layout chosen by the target path:
//! ```text
//! movie.gif                 - looping animated GIF
//! frames/                   - path without an extension
//!   frame_00000.png
//!   frame_00001.png
//!   animation.json          - fps, frame count, frame size, file list
//! ```

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use image::codecs::gif::{GifEncoder, Repeat};
use image::{Delay, Frame, ImageFormat, RgbaImage};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, info_span};

const MANIFEST_NAME: &str = "animation.json";

/// Errors from encoding captured frames.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("no frames to encode")]
    NoFrames,
    #[error("frame rate must be positive")]
    ZeroFrameRate,
    #[error("unsupported output format {0:?}")]
    UnsupportedFormat(String),
    #[error("frame {index} is {found:?}, expected {expected:?}")]
    MismatchedFrame {
        index: usize,
        expected: (u32, u32),
        found: (u32, u32),
    },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputFormat {
    Gif,
    PngSequence,
}

impl OutputFormat {
    /// Select the format from the path's extension.
    pub fn for_path(path: &Path) -> Result<Self, ExportError> {
        match path.extension().map(|e| e.to_string_lossy().to_ascii_lowercase()) {
            None => Ok(Self::PngSequence),
            Some(ext) if ext == "gif" => Ok(Self::Gif),
            Some(ext) => Err(ExportError::UnsupportedFormat(ext)),
        }
    }
}

/// Contents of `animation.json` next to a PNG sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnimationManifest {
    pub fps: u32,
    pub frame_count: usize,
    pub width: u32,
    pub height: u32,
    pub frames: Vec<String>,
}

/// What `encode` wrote.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodeReport {
    pub path: PathBuf,
    pub format: OutputFormat,
    pub frames: usize,
    pub width: u32,
    pub height: u32,
}

/// Encode `frames` at `fps` to `path`.
///
/// All frames must share the size of the first one.
pub fn encode(frames: &[RgbaImage], fps: u32, path: impl AsRef<Path>) -> Result<EncodeReport, ExportError> {
    let path = path.as_ref();
    let _span = info_span!("encode", path = %path.display(), frames = frames.len(), fps).entered();

    let first = frames.first().ok_or(ExportError::NoFrames)?;
    if fps == 0 {
        return Err(ExportError::ZeroFrameRate);
    }
    let format = OutputFormat::for_path(path)?;
    let expected = first.dimensions();
    for (index, frame) in frames.iter().enumerate() {
        if frame.dimensions() != expected {
            return Err(ExportError::MismatchedFrame {
                index,
                expected,
                found: frame.dimensions(),
            });
        }
    }

    match format {
        OutputFormat::Gif => write_gif(frames, fps, path)?,
        OutputFormat::PngSequence => write_png_sequence(frames, fps, path)?,
    }

    info!(?format, "encoded {} frames", frames.len());
    Ok(EncodeReport {
        path: path.to_path_buf(),
        format,
        frames: frames.len(),
        width: expected.0,
        height: expected.1,
    })
}

fn write_gif(frames: &[RgbaImage], fps: u32, path: &Path) -> Result<(), ExportError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let mut encoder = GifEncoder::new(BufWriter::new(File::create(path)?));
    encoder.set_repeat(Repeat::Infinite)?;
    let delay = Delay::from_numer_denom_ms(1000, fps);
    for (i, image) in frames.iter().enumerate() {
        encoder.encode_frame(Frame::from_parts(image.clone(), 0, 0, delay))?;
        debug!(frame = i, "gif frame written");
    }
    Ok(())
}

fn write_png_sequence(frames: &[RgbaImage], fps: u32, dir: &Path) -> Result<(), ExportError> {
    std::fs::create_dir_all(dir)?;
    let mut names = Vec::with_capacity(frames.len());
    for (i, image) in frames.iter().enumerate() {
        let name = format!("frame_{i:05}.png");
        image.save_with_format(dir.join(&name), ImageFormat::Png)?;
        names.push(name);
    }

    let (width, height) = frames[0].dimensions();
    let manifest = AnimationManifest {
        fps,
        frame_count: frames.len(),
        width,
        height,
        frames: names,
    };
    serde_json::to_writer_pretty(File::create(dir.join(MANIFEST_NAME))?, &manifest)?;
    Ok(())
}
