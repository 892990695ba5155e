//! Source ownership and playback state for the effect pipeline.
//!
//! The controller holds at most one [`PixelSource`] at a time. Every transition
//! into a new state tears down the previous source first (killing decoder
//! processes, joining capture threads) and records the clamped output size so the
//! renderer can rebuild its source texture before the next frame.

mod camera;
mod controller;
mod ffmpeg;
mod source;
mod still;

pub use camera::{Webcam, DEFAULT_CAMERA_DEVICE};
pub use controller::{clamp_dimensions, OutputBounds, PlaybackController, PlaybackState};
pub use ffmpeg::FfmpegStream;
pub use source::{Frame, OutputSize, PixelSource, SourceKind};
pub use still::StillImage;

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("failed to acquire {kind} source '{input}': {reason}")]
    Acquisition {
        kind: SourceKind,
        input: String,
        reason: String,
    },
    #[error("failed to decode image '{path}': {source}")]
    Decode {
        path: String,
        #[source]
        source: image::ImageError,
    },
    #[error("`{0}` was not found on PATH; install ffmpeg to play video files")]
    MissingTool(&'static str),
    #[error("invalid frame buffer: {0}")]
    InvalidFrame(String),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum PlaybackError {
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error("cannot enter {state:?} with a {actual} source")]
    KindMismatch {
        state: PlaybackState,
        actual: SourceKind,
    },
}
