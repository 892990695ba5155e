//! Renderer crate for asciidither.
//!
//! Glues the preview window, the `wgpu` effect pipeline and the playback
//! controller together. The overall flow is:
//!
//! ```text
//!   CLI / asciidither
//!          │ RendererConfig + ParameterChannel
//!          ▼
//!   Renderer::run ──▶ WindowState ──▶ winit event loop ──▶ GpuState::render()
//!                            │                                  │
//!                            └─▶ PlaybackController ──frames──▶ source texture
//!                                                               │
//!   stdin / keys ──▶ ParameterChannel ──snapshot──▶ uniforms ───┘
//! ```
//!
//! `WindowState` owns the GPU resources and the frame loop handle, while
//! `Renderer` is the thin entry point the binary calls. [`effect`] carries a
//! CPU rendition of the shader math that the tests check the WGSL against.

pub mod effect;
mod error;
pub mod frame_loop;
mod gpu;
pub mod stats;
pub mod status;
mod types;
mod window;

use anyhow::Result;
use params::ParameterChannel;

pub use error::PipelineError;
pub use frame_loop::{FrameLoop, FrameTicket};
pub use stats::FrameStats;
pub use status::{StatusLine, StatusSink, TracingStatus};
pub use types::{GpuPowerPreference, RendererConfig, SourceRequest};

/// High-level entry point that owns the start-up configuration and the
/// parameter channel shared with the host.
pub struct Renderer {
    config: RendererConfig,
    params: ParameterChannel,
}

impl Renderer {
    pub fn new(config: RendererConfig, params: ParameterChannel) -> Self {
        Self { config, params }
    }

    /// Handle the host keeps to push parameter changes while the window runs.
    pub fn parameters(&self) -> ParameterChannel {
        self.params.clone()
    }

    /// Opens the preview window and blocks until it closes.
    ///
    /// Initialisation failures (no window system, no adapter, pipeline build)
    /// are reported through the status sink before being returned. A failing
    /// initial source is not fatal: the window stays up, idle.
    pub fn run(self) -> Result<()> {
        let result = window::run(&self.config, self.params);
        if let Err(err) = &result {
            TracingStatus.report_error(&format!("{err:#}"));
        }
        result
    }
}
