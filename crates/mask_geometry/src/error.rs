use thiserror::Error;

#[derive(Error, Debug)]
pub enum MaskError {
    #[error("Failed to load image: {0}")]
    ImageLoad(#[from] image::ImageError),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Region is empty: {0}")]
    EmptyRegion(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl MaskError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidParameter(message.into())
    }
}

pub type Result<T> = std::result::Result<T, MaskError>;
