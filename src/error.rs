//! Error types for the sensing and advice collaborators.
//!
//! None of these reach the callers of the public operations: sampling falls
//! back to the time-of-day estimate and advice falls back to the rule-based
//! generator. They exist so the fallback sites can log what went wrong.

use std::time::Duration;

use thiserror::Error;

/// Failures of the camera collaborator.
#[derive(Error, Debug)]
pub enum SensorError {
    /// No capture device is present or it was released.
    #[error("capture device unavailable: {0}")]
    Unavailable(String),

    /// The device is present but did not deliver a frame.
    #[error("frame capture failed: {0}")]
    Capture(String),

    /// The frame could not be decoded.
    #[error("frame decode failed: {0}")]
    Image(#[from] image::ImageError),

    /// The frame decoded to zero pixels.
    #[error("captured frame is empty")]
    EmptyFrame,
}

/// Failures of the remote advice collaborator. Every variant is treated as
/// "remote unavailable" by the advice layer.
#[derive(Error, Debug)]
pub enum AdviceError {
    #[error("no API key configured for the advice provider")]
    MissingCredentials,

    #[error("remote advice is disabled")]
    Disabled,

    #[error("advice request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("advice provider returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("advice provider returned an unusable response: {0}")]
    MalformedResponse(String),

    #[error("advice request timed out after {0:?}")]
    Timeout(Duration),
}
