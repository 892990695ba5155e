use std::fmt::Write as _;

use params::EffectMode;
use tracing::{error, info};

/// Where the pipeline reports user-facing errors and notices.
pub trait StatusSink {
    fn report_error(&mut self, message: &str);
    fn report_info(&mut self, message: &str);
}

/// Forwards status messages to the `tracing` subscriber.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingStatus;

impl StatusSink for TracingStatus {
    fn report_error(&mut self, message: &str) {
        error!("{message}");
    }

    fn report_info(&mut self, message: &str) {
        info!("{message}");
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusMessage {
    Info(String),
    Error(String),
}

/// Keeps the latest status message and fps figure for the window title.
#[derive(Debug, Default)]
pub struct StatusLine {
    message: Option<StatusMessage>,
    fps: Option<u32>,
}

impl StatusLine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn message(&self) -> Option<&StatusMessage> {
        self.message.as_ref()
    }

    pub fn set_fps(&mut self, fps: Option<u32>) {
        self.fps = fps;
    }

    pub fn title(&self, mode: EffectMode) -> String {
        let mut title = format!("asciidither | {mode}");
        if let Some(fps) = self.fps {
            let _ = write!(title, " | {fps} fps");
        }
        match &self.message {
            Some(StatusMessage::Info(text)) => {
                let _ = write!(title, " | {text}");
            }
            Some(StatusMessage::Error(text)) => {
                let _ = write!(title, " | error: {text}");
            }
            None => {}
        }
        title
    }
}

impl StatusSink for StatusLine {
    fn report_error(&mut self, message: &str) {
        TracingStatus.report_error(message);
        self.message = Some(StatusMessage::Error(message.to_string()));
    }

    fn report_info(&mut self, message: &str) {
        TracingStatus.report_info(message);
        self.message = Some(StatusMessage::Info(message.to_string()));
    }
}
