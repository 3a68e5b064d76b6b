// THEORY:
// Failures are grouped by the boundary that produces them. Acquisition and
// sprite lookup failures are recoverable and shown to the user; buffer errors
// are contract violations caught before the classifier ever runs. Placement
// exhaustion is deliberately absent: it is an empty result, not an error.

use std::time::Duration;

use thiserror::Error;

/// A raw pixel buffer that violates the width x height x 4 layout.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BufferError {
    #[error("pixel buffer has zero size ({width}x{height})")]
    ZeroSized { width: u32, height: u32 },
    #[error("pixel buffer length mismatch: expected {expected} bytes, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },
}

/// Anything that prevents a segmentation buffer from being obtained.
#[derive(Debug, Error)]
pub enum AcquisitionError {
    #[error("segmentation request failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("segmentation service answered with status {status}: {}", .message.as_deref().unwrap_or("no details"))]
    Status {
        status: reqwest::StatusCode,
        message: Option<String>,
    },
    #[error("segmentation service returned an empty body")]
    EmptyBody,
    #[error("could not decode image: {0}")]
    Decode(#[from] image::ImageError),
    #[error("could not read image: {0}")]
    Io(#[from] std::io::Error),
    #[error("image has invalid dimensions {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },
    #[error("segmentation timed out after {0:?}")]
    Timeout(Duration),
    #[error("image decode task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
    #[error(transparent)]
    Buffer(#[from] BufferError),
}

/// A single sprite lookup failure. The batch skips the item and carries on.
#[derive(Debug, Error)]
pub enum SpriteError {
    #[error("sprite lookup failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("sprite service answered with status {status} for id {id}")]
    Status { id: u32, status: reqwest::StatusCode },
    #[error("malformed sprite record for id {id}: {source}")]
    Malformed {
        id: u32,
        #[source]
        source: serde_json::Error,
    },
    #[error("sprite {id} has no image url")]
    MissingImageUrl { id: u32 },
    #[error("could not read sprite image for id {id}: {source}")]
    Image {
        id: u32,
        #[source]
        source: image::ImageError,
    },
    #[error("sprite {id} has invalid dimensions {width}x{height}")]
    InvalidDimensions { id: u32, width: u32, height: u32 },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{key} has an invalid value {value:?}: {reason}")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: &'static str,
    },
}
