//! Library error types.

use std::path::PathBuf;

/// Malformed input rejected at the record boundary.
///
/// Raised before any detection or recalibration work starts.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("validation error: {0}")]
pub struct ValidationError(pub String);

impl ValidationError {
    pub(crate) fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

/// Errors surfaced by the public API.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The image file is missing or could not be decoded.
    #[error("failed to load image {}: {source}", path.display())]
    ImageLoad {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// The image decoded to a zero-sized raster.
    #[error("image {} has zero width or height", path.display())]
    EmptyImage { path: PathBuf },

    /// A boundary record failed validation.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Reading or writing a threshold or config file failed.
    #[error("storage error on {}: {source}", path.display())]
    Storage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A threshold or config document is not valid JSON for its type.
    #[error("invalid JSON document {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
