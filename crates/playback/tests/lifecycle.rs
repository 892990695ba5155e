use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use playback::{
    Frame, OutputBounds, OutputSize, PixelSource, PlaybackController, PlaybackError,
    PlaybackState, SourceError, SourceKind, StillImage,
};

#[derive(Default)]
struct Tracker {
    stopped: AtomicBool,
    died: AtomicBool,
    starts: AtomicUsize,
}

struct FakeSource {
    kind: SourceKind,
    native: (u32, u32),
    fail_start: bool,
    tracker: Arc<Tracker>,
    frame: Option<Frame>,
    fresh: bool,
}

impl FakeSource {
    fn new(kind: SourceKind, native: (u32, u32)) -> (Self, Arc<Tracker>) {
        let tracker = Arc::new(Tracker::default());
        let source = Self {
            kind,
            native,
            fail_start: false,
            tracker: Arc::clone(&tracker),
            frame: None,
            fresh: false,
        };
        (source, tracker)
    }

    fn failing(kind: SourceKind) -> (Self, Arc<Tracker>) {
        let (mut source, tracker) = Self::new(kind, (640, 480));
        source.fail_start = true;
        (source, tracker)
    }
}

impl PixelSource for FakeSource {
    fn kind(&self) -> SourceKind {
        self.kind
    }

    fn native_size(&self) -> (u32, u32) {
        self.native
    }

    fn start(&mut self, output: OutputSize) -> Result<(), SourceError> {
        self.tracker.starts.fetch_add(1, Ordering::SeqCst);
        if self.fail_start {
            return Err(SourceError::Acquisition {
                kind: self.kind,
                input: "fake".into(),
                reason: "device busy".into(),
            });
        }
        self.frame = Some(Frame::solid(output.width, output.height, [10, 20, 30, 255]));
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
        if self.kind.is_streaming() || std::mem::take(&mut self.fresh) {
            self.frame.as_ref()
        } else {
            None
        }
    }

    fn current_frame(&self) -> Option<&Frame> {
        self.frame.as_ref()
    }

    fn stop(&mut self) {
        self.tracker.stopped.store(true, Ordering::SeqCst);
        self.frame = None;
    }

    fn is_running(&self) -> bool {
        self.frame.is_some() && !self.tracker.died.load(Ordering::SeqCst)
    }
}

#[test]
fn starts_idle() {
    let controller = PlaybackController::new(OutputBounds::default());
    assert_eq!(controller.state(), PlaybackState::Idle);
    assert!(!controller.has_active_source());
    assert!(controller.output_size().is_none());
}

#[test]
fn switching_from_camera_to_video_stops_the_camera() {
    let mut controller = PlaybackController::new(OutputBounds::default());

    let (camera, camera_tracker) = FakeSource::new(SourceKind::Camera, (1280, 720));
    controller.start_camera(camera).unwrap();
    assert_eq!(controller.state(), PlaybackState::Camera);
    assert!(!camera_tracker.stopped.load(Ordering::SeqCst));

    let (video, video_tracker) = FakeSource::new(SourceKind::Video, (3840, 2160));
    let size = controller.play_video(video).unwrap();

    assert_eq!(controller.state(), PlaybackState::Video);
    assert_eq!(controller.active_kind(), Some(SourceKind::Video));
    assert_eq!(size, OutputSize::new(1920, 1080));
    assert!(camera_tracker.stopped.load(Ordering::SeqCst));
    assert!(!video_tracker.stopped.load(Ordering::SeqCst));
}

#[test]
fn loading_an_image_replaces_a_running_video() {
    let mut controller = PlaybackController::new(OutputBounds::default());
    let (video, video_tracker) = FakeSource::new(SourceKind::Video, (640, 360));
    controller.play_video(video).unwrap();

    let image = StillImage::from_rgba(4, 4, vec![200; 64]).unwrap();
    let size = controller.load_image(image).unwrap();

    assert_eq!(size, OutputSize::new(4, 4));
    assert_eq!(controller.state(), PlaybackState::ImageLoaded);
    assert!(video_tracker.stopped.load(Ordering::SeqCst));
}

#[test]
fn rejects_a_source_of_the_wrong_kind_without_teardown() {
    let mut controller = PlaybackController::new(OutputBounds::default());
    let (camera, camera_tracker) = FakeSource::new(SourceKind::Camera, (640, 480));
    controller.start_camera(camera).unwrap();

    let (video, _) = FakeSource::new(SourceKind::Video, (640, 480));
    let err = controller.start_camera(video).unwrap_err();

    assert!(matches!(
        err,
        PlaybackError::KindMismatch {
            state: PlaybackState::Camera,
            actual: SourceKind::Video
        }
    ));
    assert_eq!(controller.state(), PlaybackState::Camera);
    assert!(!camera_tracker.stopped.load(Ordering::SeqCst));
}

#[test]
fn failed_start_leaves_the_controller_idle() {
    let mut controller = PlaybackController::new(OutputBounds::default());
    let (video, video_tracker) = FakeSource::new(SourceKind::Video, (640, 480));
    controller.play_video(video).unwrap();

    let (camera, camera_tracker) = FakeSource::failing(SourceKind::Camera);
    let err = controller.start_camera(camera).unwrap_err();

    assert!(matches!(
        err,
        PlaybackError::Source(SourceError::Acquisition { .. })
    ));
    assert_eq!(controller.state(), PlaybackState::Idle);
    assert!(!controller.has_active_source());
    assert!(video_tracker.stopped.load(Ordering::SeqCst));
    assert!(camera_tracker.stopped.load(Ordering::SeqCst));
    assert_eq!(camera_tracker.starts.load(Ordering::SeqCst), 1);
}

#[test]
fn failed_probe_keeps_the_current_source_playing() {
    let mut controller = PlaybackController::new(OutputBounds::default());
    let (video, video_tracker) = FakeSource::new(SourceKind::Video, (640, 480));
    controller.play_video(video).unwrap();

    // Probing happens while constructing the source, before the controller is involved.
    assert!(playback::Webcam::open("/dev/asciidither-no-such-camera").is_err());
    assert!(playback::FfmpegStream::video("/nonexistent/clip.mp4").is_err());

    assert_eq!(controller.state(), PlaybackState::Video);
    assert!(!video_tracker.stopped.load(Ordering::SeqCst));
}

#[test]
fn stop_only_affects_streaming_sources() {
    let mut controller = PlaybackController::new(OutputBounds::default());
    assert!(!controller.stop());

    let image = StillImage::from_rgba(2, 2, vec![0; 16]).unwrap();
    controller.load_image(image).unwrap();
    assert!(!controller.stop());
    assert_eq!(controller.state(), PlaybackState::ImageLoaded);

    let (camera, camera_tracker) = FakeSource::new(SourceKind::Camera, (640, 480));
    controller.start_camera(camera).unwrap();
    assert!(controller.stop());
    assert_eq!(controller.state(), PlaybackState::Idle);
    assert!(camera_tracker.stopped.load(Ordering::SeqCst));
    assert!(controller.output_size().is_none());
}

#[test]
fn each_activation_requests_one_texture_rebuild() {
    let mut controller = PlaybackController::new(OutputBounds::new(800, 600));
    let (video, _) = FakeSource::new(SourceKind::Video, (1600, 900));
    controller.play_video(video).unwrap();

    assert_eq!(
        controller.take_pending_capacity(),
        Some(OutputSize::new(800, 450))
    );
    assert_eq!(controller.take_pending_capacity(), None);

    let frame = controller.poll_frame().unwrap();
    assert_eq!((frame.width, frame.height), (800, 450));
}

#[test]
fn still_image_frame_is_delivered_once() {
    let mut controller = PlaybackController::new(OutputBounds::default());
    let image = StillImage::from_rgba(3, 2, vec![90; 24]).unwrap();
    controller.load_image(image).unwrap();

    assert!(controller.poll_frame().is_some());
    assert!(controller.poll_frame().is_none());
    assert!(controller.current_frame().is_some());
}

#[test]
fn dropping_the_controller_stops_the_active_source() {
    let (camera, camera_tracker) = FakeSource::new(SourceKind::Camera, (640, 480));
    {
        let mut controller = PlaybackController::new(OutputBounds::default());
        controller.start_camera(camera).unwrap();
    }
    assert!(camera_tracker.stopped.load(Ordering::SeqCst));
}

#[test]
fn a_source_that_dies_is_torn_down() {
    let mut controller = PlaybackController::new(OutputBounds::default());
    let (camera, camera_tracker) = FakeSource::new(SourceKind::Camera, (640, 480));
    controller.start_camera(camera).unwrap();
    assert_eq!(controller.take_ended_source(), None);

    camera_tracker.died.store(true, Ordering::SeqCst);
    for _ in 0..100 {
        controller.poll_frame();
    }
    assert_eq!(controller.state(), PlaybackState::Camera);

    assert_eq!(controller.take_ended_source(), Some(SourceKind::Camera));
    assert_eq!(controller.state(), PlaybackState::Idle);
    assert!(!controller.has_active_source());
    assert!(camera_tracker.stopped.load(Ordering::SeqCst));
    assert_eq!(controller.take_ended_source(), None);
}

#[test]
fn a_loaded_image_never_counts_as_ended() {
    let mut controller = PlaybackController::new(OutputBounds::default());
    let image = StillImage::from_rgba(2, 2, vec![0; 16]).unwrap();
    controller.load_image(image).unwrap();
    controller.poll_frame();
    assert_eq!(controller.take_ended_source(), None);
    assert_eq!(controller.state(), PlaybackState::ImageLoaded);
}
