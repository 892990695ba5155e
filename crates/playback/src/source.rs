use std::fmt;

use crate::SourceError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    Image,
    Video,
    Camera,
}

impl SourceKind {
    pub fn is_streaming(self) -> bool {
        !matches!(self, SourceKind::Image)
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Image => f.write_str("image"),
            SourceKind::Video => f.write_str("video"),
            SourceKind::Camera => f.write_str("camera"),
        }
    }
}

/// Pixel dimensions after clamping to the output bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputSize {
    pub width: u32,
    pub height: u32,
}

impl OutputSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// A tightly packed RGBA8 frame.
#[derive(Clone, PartialEq, Eq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl Frame {
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Result<Self, SourceError> {
        let expected = width as usize * height as usize * 4;
        if width == 0 || height == 0 || data.len() != expected {
            return Err(SourceError::InvalidFrame(format!(
                "{width}x{height} RGBA frame needs {expected} bytes, got {}",
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let data = rgba
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * 4)
            .collect();
        Self {
            width,
            height,
            data,
        }
    }

    pub fn size(&self) -> OutputSize {
        OutputSize::new(self.width, self.height)
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.data.len())
            .finish()
    }
}

/// Anything that can feed RGBA frames into the pipeline.
///
/// Sources are created in a probed-but-idle state so acquisition errors surface
/// before the controller tears down whatever is currently playing. `start`
/// begins delivery at the clamped output size; `stop` must release every
/// underlying resource before it returns.
pub trait PixelSource {
    fn kind(&self) -> SourceKind;

    /// Dimensions reported by the underlying media, before clamping.
    fn native_size(&self) -> (u32, u32);

    fn start(&mut self, output: OutputSize) -> Result<(), SourceError>;

    /// Output width once started.
    fn width(&self) -> u32;

    /// Output height once started.
    fn height(&self) -> u32;

    /// Returns the newest frame if one arrived since the previous poll.
    fn poll_frame(&mut self) -> Option<&Frame>;

    /// Latest frame delivered by the source, new or not.
    fn current_frame(&self) -> Option<&Frame>;

    fn stop(&mut self);

    fn is_running(&self) -> bool;
}
