use thiserror::Error;

#[derive(Error, Debug)]
pub enum MediaError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Unsupported platform: {0}")]
    UnsupportedPlatform(String),

    #[error("Title probe failed: {0}")]
    ProbeFailed(String),

    #[error("Fetch failed: {0}")]
    FetchFailed(String),

    #[error("Watermark failed: {0}")]
    WatermarkFailed(String),

    #[error("Image conversion failed: {0}")]
    Image(#[from] image::ImageError),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl MediaError {
    /// Errors the caller caused; everything else is reported generically.
    pub fn is_client_error(&self) -> bool {
        matches!(self, MediaError::InvalidInput(_) | MediaError::UnsupportedPlatform(_))
    }
}

pub type Result<T> = std::result::Result<T, MediaError>;
