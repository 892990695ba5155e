use tracing::{info, warn};

use crate::source::{Frame, OutputSize, PixelSource, SourceKind};
use crate::PlaybackError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    ImageLoaded,
    Video,
    Camera,
}

impl PlaybackState {
    fn source_kind(self) -> Option<SourceKind> {
        match self {
            PlaybackState::Idle => None,
            PlaybackState::ImageLoaded => Some(SourceKind::Image),
            PlaybackState::Video => Some(SourceKind::Video),
            PlaybackState::Camera => Some(SourceKind::Camera),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputBounds {
    pub max_width: u32,
    pub max_height: u32,
}

impl OutputBounds {
    pub fn new(max_width: u32, max_height: u32) -> Self {
        Self {
            max_width: max_width.max(1),
            max_height: max_height.max(1),
        }
    }
}

impl Default for OutputBounds {
    fn default() -> Self {
        Self::new(1920, 1080)
    }
}

/// Shrinks `width`x`height` to fit `bounds`, keeping the aspect ratio.
///
/// Width is fitted first, then height; fractional pixels are truncated.
pub fn clamp_dimensions(width: u32, height: u32, bounds: OutputBounds) -> OutputSize {
    let width = u64::from(width.max(1));
    let height = u64::from(height.max(1));
    let max_width = u64::from(bounds.max_width);
    let max_height = u64::from(bounds.max_height);

    let mut new_width = width;
    let mut new_height = height;
    if width > max_width {
        new_width = max_width;
        new_height = height * max_width / width;
    }
    if new_height > max_height {
        new_height = max_height;
        new_width = width * max_height / height;
    }

    OutputSize::new(new_width.max(1) as u32, new_height.max(1) as u32)
}

pub struct PlaybackController {
    state: PlaybackState,
    active: Option<Box<dyn PixelSource>>,
    bounds: OutputBounds,
    output: Option<OutputSize>,
    pending_capacity: Option<OutputSize>,
}

impl PlaybackController {
    pub fn new(bounds: OutputBounds) -> Self {
        Self {
            state: PlaybackState::Idle,
            active: None,
            bounds,
            output: None,
            pending_capacity: None,
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn bounds(&self) -> OutputBounds {
        self.bounds
    }

    pub fn output_size(&self) -> Option<OutputSize> {
        self.output
    }

    pub fn active_kind(&self) -> Option<SourceKind> {
        self.active.as_ref().map(|source| source.kind())
    }

    pub fn has_active_source(&self) -> bool {
        self.active.is_some()
    }

    pub fn load_image<S>(&mut self, source: S) -> Result<OutputSize, PlaybackError>
    where
        S: PixelSource + 'static,
    {
        self.enter(PlaybackState::ImageLoaded, Box::new(source))
    }

    pub fn play_video<S>(&mut self, source: S) -> Result<OutputSize, PlaybackError>
    where
        S: PixelSource + 'static,
    {
        self.enter(PlaybackState::Video, Box::new(source))
    }

    pub fn start_camera<S>(&mut self, source: S) -> Result<OutputSize, PlaybackError>
    where
        S: PixelSource + 'static,
    {
        self.enter(PlaybackState::Camera, Box::new(source))
    }

    /// Stops a running video or camera. Returns `false` when there was nothing to stop.
    ///
    /// A loaded still image stays on screen; only streaming sources are stopped.
    pub fn stop(&mut self) -> bool {
        match self.state {
            PlaybackState::Video | PlaybackState::Camera => {
                self.teardown();
                info!("playback stopped");
                true
            }
            PlaybackState::Idle | PlaybackState::ImageLoaded => false,
        }
    }

    /// Releases whatever source is active, regardless of state.
    pub fn shutdown(&mut self) {
        self.teardown();
    }

    /// Size the source texture must be rebuilt to before the next frame, if any.
    pub fn take_pending_capacity(&mut self) -> Option<OutputSize> {
        self.pending_capacity.take()
    }

    /// Tears down the active source if it stopped on its own, such as a decoder
    /// exiting or a camera being unplugged. Returns the kind that was lost.
    pub fn take_ended_source(&mut self) -> Option<SourceKind> {
        let kind = self
            .active
            .as_ref()
            .filter(|source| !source.is_running())?
            .kind();
        warn!(%kind, "source stopped unexpectedly");
        self.teardown();
        Some(kind)
    }

    pub fn poll_frame(&mut self) -> Option<&Frame> {
        self.active.as_mut()?.poll_frame()
    }

    pub fn current_frame(&self) -> Option<&Frame> {
        self.active.as_ref()?.current_frame()
    }

    fn enter(
        &mut self,
        target: PlaybackState,
        mut source: Box<dyn PixelSource>,
    ) -> Result<OutputSize, PlaybackError> {
        let actual = source.kind();
        if target.source_kind() != Some(actual) {
            return Err(PlaybackError::KindMismatch {
                state: target,
                actual,
            });
        }

        self.teardown();

        let (native_width, native_height) = source.native_size();
        let size = clamp_dimensions(native_width, native_height, self.bounds);
        if let Err(err) = source.start(size) {
            source.stop();
            warn!(kind = %actual, error = %err, "source failed to start; staying idle");
            return Err(err.into());
        }

        info!(
            kind = %actual,
            native_width,
            native_height,
            width = size.width,
            height = size.height,
            "source activated"
        );
        self.active = Some(source);
        self.state = target;
        self.output = Some(size);
        self.pending_capacity = Some(size);
        Ok(size)
    }

    fn teardown(&mut self) {
        if let Some(mut previous) = self.active.take() {
            previous.stop();
        }
        self.state = PlaybackState::Idle;
        self.output = None;
        self.pending_capacity = None;
    }
}

impl Drop for PlaybackController {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamps_4k_to_1080p_exactly() {
        let size = clamp_dimensions(3840, 2160, OutputBounds::default());
        assert_eq!(size, OutputSize::new(1920, 1080));
    }

    #[test]
    fn clamps_wide_source_by_width() {
        let size = clamp_dimensions(4000, 1000, OutputBounds::default());
        assert_eq!(size, OutputSize::new(1920, 480));
    }

    #[test]
    fn clamps_tall_source_by_height() {
        let size = clamp_dimensions(1000, 3000, OutputBounds::default());
        assert_eq!(size, OutputSize::new(360, 1080));
    }

    #[test]
    fn leaves_small_sources_untouched() {
        let size = clamp_dimensions(640, 480, OutputBounds::default());
        assert_eq!(size, OutputSize::new(640, 480));
    }

    #[test]
    fn never_produces_zero_dimensions() {
        let size = clamp_dimensions(100_000, 1, OutputBounds::default());
        assert_eq!(size, OutputSize::new(1920, 1));
        let size = clamp_dimensions(0, 0, OutputBounds::default());
        assert_eq!(size, OutputSize::new(1, 1));
    }

    #[test]
    fn preserves_aspect_ratio_within_a_pixel() {
        let bounds = OutputBounds::new(1280, 720);
        for (w, h) in [(1999, 1333), (3000, 2000), (720, 1280), (5000, 700)] {
            let size = clamp_dimensions(w, h, bounds);
            assert!(size.width <= 1280 && size.height <= 720);
            let expected_height = size.width as f64 * h as f64 / w as f64;
            assert!((size.height as f64 - expected_height).abs() <= 1.0 + 1e-9);
        }
    }
}
