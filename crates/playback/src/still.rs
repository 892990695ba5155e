use std::path::Path;

use image::imageops::{self, FilterType};
use image::RgbaImage;

use crate::source::{Frame, OutputSize, PixelSource, SourceKind};
use crate::SourceError;

/// A decoded still image. Yields a single frame after each `start`.
pub struct StillImage {
    image: RgbaImage,
    frame: Option<Frame>,
    fresh: bool,
}

impl StillImage {
    pub fn open(path: &Path) -> Result<Self, SourceError> {
        let image = image::open(path).map_err(|source| SourceError::Decode {
            path: path.display().to_string(),
            source,
        })?;
        Ok(Self::from_image(image.to_rgba8()))
    }

    pub fn from_rgba(width: u32, height: u32, data: Vec<u8>) -> Result<Self, SourceError> {
        let frame = Frame::new(width, height, data)?;
        let image = RgbaImage::from_raw(frame.width, frame.height, frame.data).ok_or_else(|| {
            SourceError::InvalidFrame(format!("{width}x{height} buffer rejected by decoder"))
        })?;
        Ok(Self::from_image(image))
    }

    fn from_image(image: RgbaImage) -> Self {
        Self {
            image,
            frame: None,
            fresh: false,
        }
    }
}

impl PixelSource for StillImage {
    fn kind(&self) -> SourceKind {
        SourceKind::Image
    }

    fn native_size(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    fn start(&mut self, output: OutputSize) -> Result<(), SourceError> {
        let scaled = if self.image.dimensions() == (output.width, output.height) {
            self.image.clone()
        } else {
            imageops::resize(&self.image, output.width, output.height, FilterType::Triangle)
        };
        self.frame = Some(Frame::new(output.width, output.height, scaled.into_raw())?);
        self.fresh = true;
        Ok(())
    }

    fn width(&self) -> u32 {
        self.frame.as_ref().map_or(0, |frame| frame.width)
    }

    fn height(&self) -> u32 {
        self.frame.as_ref().map_or(0, |frame| frame.height)
    }

    fn poll_frame(&mut self) -> Option<&Frame> {
        if !self.fresh {
            return None;
        }
        self.fresh = false;
        self.frame.as_ref()
    }

    fn current_frame(&self) -> Option<&Frame> {
        self.frame.as_ref()
    }

    fn stop(&mut self) {
        self.frame = None;
        self.fresh = false;
    }

    fn is_running(&self) -> bool {
        self.frame.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yields_one_frame_per_start() {
        let mut image = StillImage::from_rgba(2, 2, vec![255; 16]).unwrap();
        assert!(image.poll_frame().is_none());
        image.start(OutputSize::new(2, 2)).unwrap();
        assert_eq!(image.poll_frame().map(|frame| frame.width), Some(2));
        assert!(image.poll_frame().is_none());
        assert!(image.current_frame().is_some());
    }

    #[test]
    fn resizes_to_output_size() {
        let mut image = StillImage::from_rgba(4, 2, vec![128; 32]).unwrap();
        image.start(OutputSize::new(2, 1)).unwrap();
        let frame = image.poll_frame().unwrap();
        assert_eq!((frame.width, frame.height), (2, 1));
        assert_eq!(frame.data.len(), 8);
        assert!(frame.data.iter().all(|&byte| (127..=129).contains(&byte)));
    }

    #[test]
    fn rejects_short_buffers() {
        assert!(matches!(
            StillImage::from_rgba(2, 2, vec![0; 15]),
            Err(SourceError::InvalidFrame(_))
        ));
    }

    #[test]
    fn missing_file_is_a_decode_error() {
        let err = StillImage::open(Path::new("/nonexistent/picture.png"))
            .err()
            .unwrap();
        assert!(matches!(err, SourceError::Decode { .. }));
    }
}
