use std::sync::Arc;

use anyhow::{anyhow, Result};
use params::{EffectMode, ParamName, ParameterChannel, ValidationError};
use playback::PlaybackController;
use tracing::{debug, info, warn};
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, Event, KeyEvent, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop, EventLoopWindowTarget};
use winit::keyboard::{Key, NamedKey};
use winit::window::{Window, WindowBuilder};

use crate::error::PipelineError;
use crate::frame_loop::{FrameLoop, FrameTicket};
use crate::gpu::GpuState;
use crate::status::{StatusLine, StatusSink};
use crate::types::{RendererConfig, SourceRequest};

const PARAM_STEP: f32 = 0.05;
const CHAR_SIZE_STEP: f32 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum KeyAction {
    SetMode(EffectMode),
    Adjust { param: ParamName, delta: f32 },
    CycleDitherSize,
    StartCamera,
    Stop,
    Exit,
}

impl KeyAction {
    fn repeats(self) -> bool {
        matches!(self, KeyAction::Adjust { .. })
    }
}

pub(crate) fn key_action(key: &Key) -> Option<KeyAction> {
    let adjust = |param, delta| Some(KeyAction::Adjust { param, delta });
    match key {
        Key::Named(NamedKey::Escape) => Some(KeyAction::Exit),
        Key::Named(NamedKey::ArrowUp) => adjust(ParamName::Brightness, PARAM_STEP),
        Key::Named(NamedKey::ArrowDown) => adjust(ParamName::Brightness, -PARAM_STEP),
        Key::Named(NamedKey::ArrowRight) => adjust(ParamName::Contrast, PARAM_STEP),
        Key::Named(NamedKey::ArrowLeft) => adjust(ParamName::Contrast, -PARAM_STEP),
        Key::Character(text) => match text.to_ascii_lowercase().as_str() {
            "1" => Some(KeyAction::SetMode(EffectMode::Ascii)),
            "2" => Some(KeyAction::SetMode(EffectMode::Dither)),
            "3" => Some(KeyAction::SetMode(EffectMode::Combined)),
            "[" => adjust(ParamName::CharSize, -CHAR_SIZE_STEP),
            "]" => adjust(ParamName::CharSize, CHAR_SIZE_STEP),
            "-" => adjust(ParamName::DitherIntensity, -PARAM_STEP),
            "=" | "+" => adjust(ParamName::DitherIntensity, PARAM_STEP),
            "d" => Some(KeyAction::CycleDitherSize),
            "c" => Some(KeyAction::StartCamera),
            "s" => Some(KeyAction::Stop),
            _ => None,
        },
        _ => None,
    }
}

/// Keyboard adjustments stop at the edge of these ranges instead of failing validation.
fn adjustment_bounds(param: ParamName) -> (f32, f32) {
    match param {
        ParamName::CharSize => (1.0, 64.0),
        ParamName::DitherIntensity => (0.0, 1.0),
        ParamName::Brightness | ParamName::Contrast => (0.0, 3.0),
        _ => (f32::MIN, f32::MAX),
    }
}

pub(crate) fn apply_adjustment(
    channel: &ParameterChannel,
    param: ParamName,
    delta: f32,
) -> Result<f32, ValidationError> {
    let (min, max) = adjustment_bounds(param);
    channel.nudge(param, delta, min..=max)
}

/// Aggregates the GPU state, playback and loop handle for the preview window.
///
/// `gpu` is declared before `window` so the surface is dropped first.
pub(crate) struct WindowState {
    gpu: GpuState,
    window: Arc<Window>,
    controller: PlaybackController,
    params: ParameterChannel,
    frame_loop: FrameLoop,
    ticket: Option<FrameTicket>,
    status: StatusLine,
    title: String,
}

impl WindowState {
    fn new(
        window: Arc<Window>,
        config: &RendererConfig,
        params: ParameterChannel,
    ) -> Result<Self, PipelineError> {
        let gpu = GpuState::new(window.as_ref(), window.inner_size(), config.gpu_power)?;
        let mut state = Self {
            gpu,
            window,
            controller: PlaybackController::new(config.output_bounds),
            params,
            frame_loop: FrameLoop::new(),
            ticket: None,
            status: StatusLine::new(),
            title: String::new(),
        };
        state
            .status
            .report_info("ready; drop an image or video onto the window");
        state.refresh_title();
        Ok(state)
    }

    fn window(&self) -> &Window {
        self.window.as_ref()
    }

    fn activate(&mut self, request: &SourceRequest) {
        match request.activate(&mut self.controller) {
            Ok(size) => {
                info!(source = %request.describe(), width = size.width, height = size.height, "source loaded");
                let _ = self
                    .window
                    .request_inner_size(PhysicalSize::new(size.width, size.height));
                self.frame_loop.start();
                self.status.report_info(&format!("playing {}", request.describe()));
            }
            Err(err) => {
                let err = PipelineError::from(err);
                self.status.report_error(&err.to_string());
                if !self.controller.has_active_source() {
                    self.halt_loop();
                }
            }
        }
        self.refresh_title();
        self.window.request_redraw();
    }

    fn stop(&mut self) {
        if self.controller.stop() {
            self.halt_loop();
            self.status.report_info("playback stopped");
            self.refresh_title();
            self.window.request_redraw();
        }
    }

    /// Cancels the loop and waits for in-flight GPU work before releasing the source texture.
    fn halt_loop(&mut self) {
        self.frame_loop.cancel();
        self.ticket = None;
        self.gpu.release_source();
        self.status.set_fps(None);
    }

    fn shutdown(&mut self) {
        self.controller.shutdown();
        self.halt_loop();
    }

    fn handle_key(&mut self, event: &KeyEvent, elwt: &EventLoopWindowTarget<()>) {
        if event.state != ElementState::Pressed {
            return;
        }
        let Some(action) = key_action(&event.logical_key) else {
            return;
        };
        if event.repeat && !action.repeats() {
            return;
        }

        let result = match action {
            KeyAction::SetMode(mode) => self.params.set(ParamName::Mode, mode.as_f32()),
            KeyAction::Adjust { param, delta } => {
                apply_adjustment(&self.params, param, delta).map(|value| {
                    debug!(%param, value, "parameter adjusted");
                })
            }
            KeyAction::CycleDitherSize => {
                let tile = self.params.cycle_dither_size();
                debug!(size = tile.size(), "dither tile size changed");
                Ok(())
            }
            KeyAction::StartCamera => {
                self.activate(&SourceRequest::camera(None));
                Ok(())
            }
            KeyAction::Stop => {
                self.stop();
                Ok(())
            }
            KeyAction::Exit => {
                elwt.exit();
                Ok(())
            }
        };
        if let Err(err) = result {
            self.status.report_error(&err.to_string());
        }
        self.refresh_title();
        if !self.frame_loop.is_running() {
            self.window.request_redraw();
        }
    }

    fn schedule_frame(&mut self) {
        if self.ticket.is_some() {
            return;
        }
        if let Some(ticket) = self.frame_loop.schedule() {
            self.ticket = Some(ticket);
            self.window.request_redraw();
        }
    }

    fn redraw(&mut self) -> Result<(), PipelineError> {
        if let Some(kind) = self.controller.take_ended_source() {
            self.status
                .report_error(&format!("{kind} source stopped unexpectedly"));
            self.halt_loop();
            self.refresh_title();
        }

        let ticket = self.ticket.take().or_else(|| self.frame_loop.schedule());
        match ticket {
            Some(ticket) if self.frame_loop.fire(ticket) => {
                let fps = self
                    .gpu
                    .render(&mut self.controller, self.params.snapshot())?;
                if fps.is_some() {
                    self.status.set_fps(fps);
                    self.refresh_title();
                }
                Ok(())
            }
            _ => self.gpu.render_idle(),
        }
    }

    fn handle_render_error(&mut self, err: PipelineError, elwt: &EventLoopWindowTarget<()>) {
        match err {
            PipelineError::Surface(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                self.gpu.resize(self.gpu.size());
            }
            PipelineError::Surface(wgpu::SurfaceError::OutOfMemory) => {
                self.status.report_error("surface out of memory; exiting");
                elwt.exit();
            }
            PipelineError::Surface(other) => {
                warn!(error = %other, "surface error; retrying next frame");
            }
            err if err.is_fatal() => {
                self.status.report_error(&err.to_string());
                self.controller.shutdown();
                self.halt_loop();
                self.refresh_title();
            }
            err => self.status.report_error(&err.to_string()),
        }
    }

    fn refresh_title(&mut self) {
        let title = self.status.title(self.params.snapshot().mode);
        if title != self.title {
            self.window.set_title(&title);
            self.title = title;
        }
    }
}

pub(crate) fn run(config: &RendererConfig, params: ParameterChannel) -> Result<()> {
    let event_loop = EventLoop::new()
        .map_err(|err| PipelineError::UnsupportedPlatform(format!("no event loop: {err}")))?;
    let window = WindowBuilder::new()
        .with_title("asciidither")
        .with_inner_size(PhysicalSize::new(
            config.surface_size.0.max(1),
            config.surface_size.1.max(1),
        ))
        .build(&event_loop)
        .map_err(|err| PipelineError::UnsupportedPlatform(format!("no window: {err}")))?;
    let window = Arc::new(window);

    let mut state = WindowState::new(window, config, params)?;
    if let Some(request) = &config.initial_source {
        state.activate(request);
    }
    state.window().request_redraw();

    event_loop
        .run(move |event, elwt| {
            elwt.set_control_flow(ControlFlow::Wait);

            match event {
                Event::WindowEvent { window_id, event } if window_id == state.window().id() => {
                    match event {
                        WindowEvent::CloseRequested | WindowEvent::Destroyed => {
                            elwt.exit();
                        }
                        WindowEvent::KeyboardInput { event, .. } => {
                            state.handle_key(&event, elwt);
                        }
                        WindowEvent::DroppedFile(path) => match SourceRequest::from_path(&path) {
                            Some(request) => state.activate(&request),
                            None => {
                                state.status.report_error(&format!(
                                    "unsupported file type: {}",
                                    path.display()
                                ));
                                state.refresh_title();
                            }
                        },
                        WindowEvent::Resized(new_size) => {
                            state.gpu.resize(new_size);
                            state.window().request_redraw();
                        }
                        WindowEvent::ScaleFactorChanged {
                            mut inner_size_writer,
                            ..
                        } => {
                            let _ = inner_size_writer.request_inner_size(state.gpu.size());
                        }
                        WindowEvent::RedrawRequested => {
                            if let Err(err) = state.redraw() {
                                state.handle_render_error(err, elwt);
                            }
                        }
                        _ => {}
                    }
                }
                Event::AboutToWait => state.schedule_frame(),
                Event::LoopExiting => state.shutdown(),
                _ => {}
            }
        })
        .map_err(|err| anyhow!("window event loop error: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use params::EffectParameters;

    #[test]
    fn maps_mode_and_control_keys() {
        assert_eq!(
            key_action(&Key::Character("2".into())),
            Some(KeyAction::SetMode(EffectMode::Dither))
        );
        assert_eq!(
            key_action(&Key::Character("D".into())),
            Some(KeyAction::CycleDitherSize)
        );
        assert_eq!(key_action(&Key::Character("s".into())), Some(KeyAction::Stop));
        assert_eq!(
            key_action(&Key::Character("c".into())),
            Some(KeyAction::StartCamera)
        );
        assert_eq!(
            key_action(&Key::Character("C".into())),
            Some(KeyAction::StartCamera)
        );
        assert_eq!(key_action(&Key::Named(NamedKey::Escape)), Some(KeyAction::Exit));
        assert_eq!(key_action(&Key::Character("x".into())), None);
    }

    #[test]
    fn arrows_adjust_brightness_and_contrast() {
        assert_eq!(
            key_action(&Key::Named(NamedKey::ArrowUp)),
            Some(KeyAction::Adjust {
                param: ParamName::Brightness,
                delta: PARAM_STEP
            })
        );
        assert_eq!(
            key_action(&Key::Named(NamedKey::ArrowLeft)),
            Some(KeyAction::Adjust {
                param: ParamName::Contrast,
                delta: -PARAM_STEP
            })
        );
    }

    #[test]
    fn adjustments_stop_at_range_edges() {
        let channel = ParameterChannel::new(EffectParameters::default()).unwrap();
        for _ in 0..20 {
            apply_adjustment(&channel, ParamName::DitherIntensity, PARAM_STEP).unwrap();
        }
        assert_eq!(channel.snapshot().dither_intensity, 1.0);

        for _ in 0..20 {
            apply_adjustment(&channel, ParamName::CharSize, -CHAR_SIZE_STEP).unwrap();
        }
        assert_eq!(channel.snapshot().char_size, 1.0);
    }

    #[test]
    fn only_adjustments_auto_repeat() {
        assert!(KeyAction::Adjust {
            param: ParamName::Contrast,
            delta: 0.05
        }
        .repeats());
        assert!(!KeyAction::Stop.repeats());
        assert!(!KeyAction::StartCamera.repeats());
        assert!(!KeyAction::SetMode(EffectMode::Ascii).repeats());
    }
}
