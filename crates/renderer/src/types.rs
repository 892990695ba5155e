use std::path::{Path, PathBuf};

use playback::{
    FfmpegStream, OutputBounds, OutputSize, PlaybackController, PlaybackError, StillImage, Webcam,
    DEFAULT_CAMERA_DEVICE,
};

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "gif"];
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "webm", "mkv", "mov", "avi", "m4v", "ogv"];

/// GPU adapter preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GpuPowerPreference {
    Low,
    #[default]
    High,
}

/// A source the host asked for, not yet probed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceRequest {
    Image(PathBuf),
    Video(PathBuf),
    Camera(String),
}

impl SourceRequest {
    pub fn camera(device: Option<String>) -> Self {
        SourceRequest::Camera(device.unwrap_or_else(|| DEFAULT_CAMERA_DEVICE.to_string()))
    }

    /// Classifies a dropped or opened file by extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_str()?.to_ascii_lowercase();
        if IMAGE_EXTENSIONS.contains(&extension.as_str()) {
            Some(SourceRequest::Image(path.to_path_buf()))
        } else if VIDEO_EXTENSIONS.contains(&extension.as_str()) {
            Some(SourceRequest::Video(path.to_path_buf()))
        } else {
            None
        }
    }

    pub fn describe(&self) -> String {
        match self {
            SourceRequest::Image(path) => format!("image {}", path.display()),
            SourceRequest::Video(path) => format!("video {}", path.display()),
            SourceRequest::Camera(device) => format!("camera {device}"),
        }
    }

    /// Probes the source, then hands it to the controller.
    ///
    /// A probe failure returns before the controller is touched, so whatever was
    /// playing keeps playing.
    pub fn activate(
        &self,
        controller: &mut PlaybackController,
    ) -> Result<OutputSize, PlaybackError> {
        match self {
            SourceRequest::Image(path) => controller.load_image(StillImage::open(path)?),
            SourceRequest::Video(path) => controller.play_video(FfmpegStream::video(path)?),
            SourceRequest::Camera(device) => {
                controller.start_camera(Webcam::open(device.as_str())?)
            }
        }
    }
}

/// Immutable configuration passed to the renderer at start-up.
#[derive(Debug, Clone)]
pub struct RendererConfig {
    /// Initial window size in physical pixels, before any source is loaded.
    pub surface_size: (u32, u32),
    /// Largest output a source is scaled down to.
    pub output_bounds: OutputBounds,
    /// Source to load as soon as the window is up.
    pub initial_source: Option<SourceRequest>,
    pub gpu_power: GpuPowerPreference,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            surface_size: (1280, 720),
            output_bounds: OutputBounds::default(),
            initial_source: None,
            gpu_power: GpuPowerPreference::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_files_by_extension() {
        assert_eq!(
            SourceRequest::from_path(Path::new("/tmp/Photo.JPG")),
            Some(SourceRequest::Image(PathBuf::from("/tmp/Photo.JPG")))
        );
        assert_eq!(
            SourceRequest::from_path(Path::new("clip.webm")),
            Some(SourceRequest::Video(PathBuf::from("clip.webm")))
        );
        assert_eq!(SourceRequest::from_path(Path::new("notes.txt")), None);
        assert_eq!(SourceRequest::from_path(Path::new("README")), None);
    }

    #[test]
    fn camera_defaults_to_first_device() {
        assert_eq!(
            SourceRequest::camera(None),
            SourceRequest::Camera("/dev/video0".into())
        );
    }

    #[test]
    fn failed_probe_leaves_controller_untouched() {
        let mut controller = PlaybackController::new(OutputBounds::default());
        let request = SourceRequest::Image(PathBuf::from("/nonexistent/frame.png"));
        assert!(request.activate(&mut controller).is_err());
        assert_eq!(controller.state(), playback::PlaybackState::Idle);
    }
}
