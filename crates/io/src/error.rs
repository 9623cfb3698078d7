/// Errors from reading or writing geometry and segmentation files.
#[derive(Debug, thiserror::Error)]
pub enum IoError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid TrackVis header: {0}")]
    InvalidHeader(String),
    #[error("file truncated at byte {offset}")]
    Truncated { offset: usize },
    #[error("NIfTI error: {0}")]
    Nifti(#[from] nifti::error::NiftiError),
    #[error("expected a 3D volume, found {0} dimensions")]
    Dimensionality(usize),
}
