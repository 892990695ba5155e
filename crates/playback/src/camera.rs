//! Webcam capture through `nokhwa`.
//!
//! `nokhwa::Camera` is `!Send`, so the device is opened twice: once on the
//! calling thread to validate access and read the negotiated resolution, then
//! again on a dedicated capture thread that decodes RGBA frames, scales them to
//! the output size and pushes them through a small bounded channel.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam_channel::{bounded, Receiver};
use tracing::debug;

use crate::source::{Frame, OutputSize, PixelSource, SourceKind};
use crate::SourceError;

pub const DEFAULT_CAMERA_DEVICE: &str = "/dev/video0";

/// Capture size requested from the device before clamping.
const CAMERA_CAPTURE_SIZE: (u32, u32) = (1280, 720);
const FRAME_QUEUE_DEPTH: usize = 2;

/// Maps `/dev/videoN` or a bare `N` to a camera index.
fn parse_camera_index(device: &str) -> Option<u32> {
    let device = device.trim();
    device
        .strip_prefix("/dev/video")
        .unwrap_or(device)
        .parse()
        .ok()
}

struct CaptureWorker {
    frames: Receiver<Frame>,
    shutdown: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl CaptureWorker {
    fn is_alive(&self) -> bool {
        !self.shutdown.load(Ordering::Relaxed)
            && self
                .thread
                .as_ref()
                .is_some_and(|thread| !thread.is_finished())
    }

    fn shutdown(mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::warn!("camera capture thread panicked");
            }
        }
    }
}

pub struct Webcam {
    device: String,
    index: u32,
    native: (u32, u32),
    output: Option<OutputSize>,
    worker: Option<CaptureWorker>,
    current: Option<Frame>,
}

impl Webcam {
    /// Opens the device once to check it is usable and learn its resolution.
    pub fn open(device: impl Into<String>) -> Result<Self, SourceError> {
        let device = device.into();
        let acquisition = |reason: String| SourceError::Acquisition {
            kind: SourceKind::Camera,
            input: device.clone(),
            reason,
        };
        let index = parse_camera_index(&device)
            .ok_or_else(|| acquisition("expected /dev/videoN or a camera index".into()))?;
        let native = capture::probe(index, CAMERA_CAPTURE_SIZE).map_err(acquisition)?;
        debug!(device = %device, index, width = native.0, height = native.1, "camera validated");

        Ok(Self {
            device,
            index,
            native,
            output: None,
            worker: None,
            current: None,
        })
    }

    fn spawn(&self, output: OutputSize) -> Result<CaptureWorker, SourceError> {
        let (sender, frames) = bounded(FRAME_QUEUE_DEPTH);
        let shutdown = Arc::new(AtomicBool::new(false));
        let thread = capture::spawn(
            self.index,
            CAMERA_CAPTURE_SIZE,
            output,
            sender,
            Arc::clone(&shutdown),
        )?;
        Ok(CaptureWorker {
            frames,
            shutdown,
            thread: Some(thread),
        })
    }
}

impl PixelSource for Webcam {
    fn kind(&self) -> SourceKind {
        SourceKind::Camera
    }

    fn native_size(&self) -> (u32, u32) {
        self.native
    }

    fn start(&mut self, output: OutputSize) -> Result<(), SourceError> {
        if let Some(worker) = self.worker.take() {
            worker.shutdown();
        }
        self.worker = Some(self.spawn(output)?);
        self.output = Some(output);
        self.current = None;
        debug!(device = %self.device, width = output.width, height = output.height, "camera capture started");
        Ok(())
    }

    fn width(&self) -> u32 {
        self.output.map_or(0, |size| size.width)
    }

    fn height(&self) -> u32 {
        self.output.map_or(0, |size| size.height)
    }

    fn poll_frame(&mut self) -> Option<&Frame> {
        let frames = &self.worker.as_ref()?.frames;
        let latest = frames.try_iter().last();
        self.current = Some(latest?);
        self.current.as_ref()
    }

    fn current_frame(&self) -> Option<&Frame> {
        self.current.as_ref()
    }

    fn stop(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.shutdown();
            debug!(device = %self.device, "camera capture stopped");
        }
        self.current = None;
    }

    fn is_running(&self) -> bool {
        self.worker.as_ref().is_some_and(CaptureWorker::is_alive)
    }
}

impl Drop for Webcam {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Scales a decoded RGBA buffer to the output size.
#[cfg_attr(not(feature = "camera"), allow(dead_code))]
fn fit_frame(width: u32, height: u32, data: Vec<u8>, output: OutputSize) -> Option<Frame> {
    if (width, height) == (output.width, output.height) {
        return Frame::new(width, height, data).ok();
    }
    let image = image::RgbaImage::from_raw(width, height, data)?;
    let scaled = image::imageops::resize(
        &image,
        output.width,
        output.height,
        image::imageops::FilterType::Triangle,
    );
    Frame::new(output.width, output.height, scaled.into_raw()).ok()
}

#[cfg(feature = "camera")]
mod capture {
    use std::panic::{self, AssertUnwindSafe};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::thread::{self, JoinHandle};
    use std::time::Duration;

    use crossbeam_channel::Sender;
    use nokhwa::pixel_format::RgbAFormat;
    use nokhwa::utils::{
        CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType, Resolution,
    };
    use nokhwa::Camera;
    use tracing::{error, info, warn};

    use super::fit_frame;
    use crate::source::{Frame, OutputSize};
    use crate::SourceError;

    /// Consecutive failed reads or decodes before the capture thread gives up.
    const MAX_CONSECUTIVE_FAILURES: u32 = 30;

    fn requested_format(size: (u32, u32)) -> RequestedFormat<'static> {
        RequestedFormat::new::<RgbAFormat>(RequestedFormatType::Closest(CameraFormat::new(
            Resolution::new(size.0, size.1),
            FrameFormat::MJPEG,
            30,
        )))
    }

    fn describe_error(index: u32, err: &str) -> String {
        if err.contains("Device or resource busy") {
            format!("camera {index} is in use by another application")
        } else {
            format!("failed to open camera {index}: {err}")
        }
    }

    fn open(index: u32, size: (u32, u32)) -> Result<Camera, String> {
        let mut camera = Camera::new(CameraIndex::Index(index), requested_format(size))
            .map_err(|err| describe_error(index, &err.to_string()))?;
        camera
            .open_stream()
            .map_err(|err| describe_error(index, &err.to_string()))?;
        Ok(camera)
    }

    pub(super) fn probe(index: u32, size: (u32, u32)) -> Result<(u32, u32), String> {
        let mut camera = open(index, size)?;
        let resolution = camera.resolution();
        let _ = camera.stop_stream();
        Ok((resolution.width(), resolution.height()))
    }

    pub(super) fn spawn(
        index: u32,
        size: (u32, u32),
        output: OutputSize,
        sender: Sender<Frame>,
        shutdown: Arc<AtomicBool>,
    ) -> Result<JoinHandle<()>, SourceError> {
        thread::Builder::new()
            .name("camera-capture".into())
            .spawn(move || {
                let captured = panic::catch_unwind(AssertUnwindSafe(|| {
                    capture_frames(index, size, output, &sender, &shutdown)
                }));
                if captured.is_err() {
                    error!(index, "camera capture thread panicked");
                }
            })
            .map_err(SourceError::Io)
    }

    fn capture_frames(
        index: u32,
        size: (u32, u32),
        output: OutputSize,
        sender: &Sender<Frame>,
        shutdown: &AtomicBool,
    ) {
        let mut camera = match open(index, size) {
            Ok(camera) => camera,
            Err(err) => {
                error!("{err}");
                return;
            }
        };
        info!(index, "camera stream opened");

        let mut failures = 0;
        while !shutdown.load(Ordering::Relaxed) {
            let decoded = camera.frame().map_err(|err| err.to_string()).and_then(|buffer| {
                let resolution = buffer.resolution();
                // Corrupt MJPEG frames can panic inside the decoder.
                match panic::catch_unwind(AssertUnwindSafe(|| {
                    buffer.decode_image::<RgbAFormat>()
                })) {
                    Ok(Ok(image)) => Ok((resolution.width(), resolution.height(), image.into_raw())),
                    Ok(Err(err)) => Err(err.to_string()),
                    Err(_) => Err("decoder panicked on a corrupt frame".to_string()),
                }
            });

            match decoded {
                Ok((width, height, data)) => {
                    failures = 0;
                    if let Some(frame) = fit_frame(width, height, data, output) {
                        // Drop the frame if the render loop is behind.
                        let _ = sender.try_send(frame);
                    }
                }
                Err(err) => {
                    failures += 1;
                    warn!(index, failures, error = %err, "camera frame failed");
                    if failures >= MAX_CONSECUTIVE_FAILURES {
                        error!(index, "camera keeps failing; stopping capture");
                        break;
                    }
                    thread::sleep(Duration::from_millis(20));
                }
            }
        }

        let _ = camera.stop_stream();
        info!(index, "camera stream closed");
    }
}

#[cfg(not(feature = "camera"))]
mod capture {
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;
    use std::thread::JoinHandle;

    use crossbeam_channel::Sender;

    use crate::source::{Frame, OutputSize};
    use crate::SourceError;

    const UNSUPPORTED: &str = "built without camera support; rebuild with `--features camera`";

    pub(super) fn probe(_index: u32, _size: (u32, u32)) -> Result<(u32, u32), String> {
        Err(UNSUPPORTED.into())
    }

    pub(super) fn spawn(
        _index: u32,
        _size: (u32, u32),
        _output: OutputSize,
        _sender: Sender<Frame>,
        _shutdown: Arc<AtomicBool>,
    ) -> Result<JoinHandle<()>, SourceError> {
        Err(SourceError::Acquisition {
            kind: crate::SourceKind::Camera,
            input: String::new(),
            reason: UNSUPPORTED.into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_device_paths_and_indices() {
        assert_eq!(parse_camera_index("/dev/video0"), Some(0));
        assert_eq!(parse_camera_index("/dev/video12"), Some(12));
        assert_eq!(parse_camera_index(" 3 "), Some(3));
        assert_eq!(parse_camera_index("/dev/sda"), None);
        assert_eq!(parse_camera_index("front"), None);
    }

    #[test]
    fn unknown_device_name_is_an_acquisition_failure() {
        let err = Webcam::open("/dev/asciidither-missing-camera").err().unwrap();
        assert!(matches!(
            err,
            SourceError::Acquisition {
                kind: SourceKind::Camera,
                ..
            }
        ));
    }

    #[test]
    fn frames_are_scaled_to_the_output_size() {
        let frame = fit_frame(4, 2, vec![200; 32], OutputSize::new(2, 1)).unwrap();
        assert_eq!((frame.width, frame.height), (2, 1));
        assert!(frame.data.iter().all(|&byte| (199..=201).contains(&byte)));

        let same = fit_frame(2, 2, vec![7; 16], OutputSize::new(2, 2)).unwrap();
        assert_eq!(same.data, vec![7; 16]);
    }

    #[test]
    fn short_buffers_are_dropped() {
        assert!(fit_frame(2, 2, vec![0; 10], OutputSize::new(1, 1)).is_none());
    }
}
