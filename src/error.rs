//! Graphics error types.

use thiserror::Error;

use crate::backend::BackendError;

/// Errors that can occur while creating textures, views and volume materials.
#[derive(Error, Debug)]
pub enum GraphicsError {
    /// The backend failed to allocate or describe a native object.
    #[error(transparent)]
    Backend(#[from] BackendError),
    /// Reading a file or stream failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// An image container could not be decoded.
    #[error("image decode failed: {0}")]
    ImageDecode(#[from] image::ImageError),
    /// A DDS container was malformed or uses an unsupported layout.
    #[error("invalid texture container: {0}")]
    InvalidContainer(String),
    /// An invalid parameter was provided.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
}

pub type GraphicsResult<T> = Result<T, GraphicsError>;
