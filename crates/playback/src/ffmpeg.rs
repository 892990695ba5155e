//! Video files decoded through an `ffmpeg` child process.
//!
//! `ffprobe` reports the native dimensions up front so a missing or unreadable
//! file fails before the controller tears anything down. Once
//! started, `ffmpeg` writes raw RGBA frames at the clamped output size to a pipe;
//! a reader thread slices them into [`Frame`]s and hands them over through a
//! small bounded channel. The render loop only ever keeps the newest frame.

use std::ffi::OsString;
use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, Stdio};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Receiver, Sender, TryRecvError};
use tracing::{debug, warn};

use crate::source::{Frame, OutputSize, PixelSource, SourceKind};
use crate::SourceError;

const FRAME_QUEUE_DEPTH: usize = 2;

fn input_args(path: &Path) -> Vec<OsString> {
    vec![
        "-re".into(),
        "-stream_loop".into(),
        "-1".into(),
        "-i".into(),
        path.as_os_str().to_os_string(),
    ]
}

struct StreamWorker {
    child: Child,
    frames: Option<Receiver<Frame>>,
    reader: Option<JoinHandle<()>>,
}

impl StreamWorker {
    fn shutdown(mut self) {
        if let Err(err) = self.child.kill() {
            if err.kind() != ErrorKind::InvalidInput {
                warn!(error = %err, "failed to kill ffmpeg process");
            }
        }
        let _ = self.child.wait();
        // Dropping the receiver unblocks a reader stuck in `send`.
        drop(self.frames.take());
        if let Some(reader) = self.reader.take() {
            if reader.join().is_err() {
                warn!("ffmpeg reader thread panicked");
            }
        }
    }
}

pub struct FfmpegStream {
    path: PathBuf,
    native: (u32, u32),
    output: Option<OutputSize>,
    worker: Option<StreamWorker>,
    current: Option<Frame>,
    ended: bool,
}

impl FfmpegStream {
    /// Probes a video file. The file loops forever once started, without audio.
    pub fn video(path: impl Into<PathBuf>) -> Result<Self, SourceError> {
        let path = path.into();
        if !path.is_file() {
            return Err(SourceError::Acquisition {
                kind: SourceKind::Video,
                input: path.display().to_string(),
                reason: "file does not exist".into(),
            });
        }
        Self::probe(path)
    }

    fn probe(path: PathBuf) -> Result<Self, SourceError> {
        let kind = SourceKind::Video;
        let output = Command::new("ffprobe")
            .args(["-v", "error", "-print_format", "json", "-show_streams"])
            .arg(&path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .map_err(|err| match err.kind() {
                ErrorKind::NotFound => SourceError::MissingTool("ffprobe"),
                _ => SourceError::Io(err),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SourceError::Acquisition {
                kind,
                input: path.display().to_string(),
                reason: first_line_or(&stderr, "ffprobe exited with an error"),
            });
        }

        let native = parse_probe_output(&output.stdout).map_err(|reason| {
            SourceError::Acquisition {
                kind,
                input: path.display().to_string(),
                reason,
            }
        })?;
        debug!(path = %path.display(), width = native.0, height = native.1, "probed stream");

        Ok(Self {
            path,
            native,
            output: None,
            worker: None,
            current: None,
            ended: false,
        })
    }

    fn spawn(&self, size: OutputSize) -> Result<StreamWorker, SourceError> {
        let mut child = Command::new("ffmpeg")
            .args(["-v", "error", "-nostdin"])
            .args(input_args(&self.path))
            .args(["-an", "-f", "rawvideo", "-pix_fmt", "rgba", "-s"])
            .arg(format!("{}x{}", size.width, size.height))
            .arg("pipe:1")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|err| match err.kind() {
                ErrorKind::NotFound => SourceError::MissingTool("ffmpeg"),
                _ => SourceError::Io(err),
            })?;

        let Some(stdout) = child.stdout.take() else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(SourceError::Acquisition {
                kind: SourceKind::Video,
                input: self.path.display().to_string(),
                reason: "ffmpeg did not expose a stdout pipe".into(),
            });
        };

        let (sender, receiver) = bounded(FRAME_QUEUE_DEPTH);
        let reader = thread::Builder::new()
            .name("ffmpeg-video".into())
            .spawn(move || read_frames(stdout, size, sender));
        let reader = match reader {
            Ok(handle) => handle,
            Err(err) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(SourceError::Io(err));
            }
        };

        Ok(StreamWorker {
            child,
            frames: Some(receiver),
            reader: Some(reader),
        })
    }
}

fn read_frames(mut stdout: ChildStdout, size: OutputSize, sender: Sender<Frame>) {
    let frame_len = size.width as usize * size.height as usize * 4;
    loop {
        let mut data = vec![0u8; frame_len];
        if stdout.read_exact(&mut data).is_err() {
            break;
        }
        let frame = Frame {
            width: size.width,
            height: size.height,
            data,
        };
        if sender.send(frame).is_err() {
            break;
        }
    }
}

fn first_line_or(text: &str, fallback: &str) -> String {
    text.lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or(fallback)
        .to_string()
}

/// Extracts the first video stream's dimensions from `ffprobe -print_format json` output.
pub(crate) fn parse_probe_output(stdout: &[u8]) -> Result<(u32, u32), String> {
    let json: serde_json::Value =
        serde_json::from_slice(stdout).map_err(|err| format!("unreadable ffprobe output: {err}"))?;
    let streams = json["streams"]
        .as_array()
        .ok_or_else(|| "ffprobe reported no streams".to_string())?;
    let video = streams
        .iter()
        .find(|stream| stream["codec_type"].as_str() == Some("video"))
        .ok_or_else(|| "no video stream found".to_string())?;

    let width = video["width"].as_u64().unwrap_or(0);
    let height = video["height"].as_u64().unwrap_or(0);
    if width == 0 || height == 0 || width > u64::from(u32::MAX) || height > u64::from(u32::MAX) {
        return Err(format!("video stream reports invalid size {width}x{height}"));
    }
    Ok((width as u32, height as u32))
}

impl PixelSource for FfmpegStream {
    fn kind(&self) -> SourceKind {
        SourceKind::Video
    }

    fn native_size(&self) -> (u32, u32) {
        self.native
    }

    fn start(&mut self, output: OutputSize) -> Result<(), SourceError> {
        if let Some(worker) = self.worker.take() {
            worker.shutdown();
        }
        let worker = self.spawn(output)?;
        self.worker = Some(worker);
        self.output = Some(output);
        self.current = None;
        self.ended = false;
        debug!(path = %self.path.display(), width = output.width, height = output.height, "ffmpeg stream started");
        Ok(())
    }

    fn width(&self) -> u32 {
        self.output.map_or(0, |size| size.width)
    }

    fn height(&self) -> u32 {
        self.output.map_or(0, |size| size.height)
    }

    fn poll_frame(&mut self) -> Option<&Frame> {
        let frames = self.worker.as_ref()?.frames.as_ref()?;
        let mut latest = None;
        loop {
            match frames.try_recv() {
                Ok(frame) => latest = Some(frame),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    if !self.ended {
                        warn!(path = %self.path.display(), "ffmpeg stream ended");
                        self.ended = true;
                    }
                    break;
                }
            }
        }
        self.current = Some(latest?);
        self.current.as_ref()
    }

    fn current_frame(&self) -> Option<&Frame> {
        self.current.as_ref()
    }

    fn stop(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.shutdown();
            debug!(path = %self.path.display(), "ffmpeg stream stopped");
        }
        self.current = None;
    }

    fn is_running(&self) -> bool {
        self.worker.is_some() && !self.ended
    }
}

impl Drop for FfmpegStream {
    fn drop(&mut self) {
        self.stop();
    }
}
