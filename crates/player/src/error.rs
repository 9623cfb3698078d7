use tractscope_camera::CameraError;
use tractscope_export::ExportError;
use tractscope_render::RenderError;
use tractscope_window::WindowError;

/// Errors that abort a run.
#[derive(Debug, thiserror::Error)]
pub enum PlayerError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("playback already finished")]
    Finished,
    #[error("region {index} has a different affine than region 0")]
    AffineMismatch { index: usize },
    #[error("window error: {0}")]
    Window(#[from] WindowError),
    #[error("camera error: {0}")]
    Camera(#[from] CameraError),
    #[error("render error: {0}")]
    Render(#[from] RenderError),
    #[error("export error: {0}")]
    Export(#[from] ExportError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
