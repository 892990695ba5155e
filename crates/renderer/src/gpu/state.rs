use std::time::Instant;

use params::EffectParameters;
use playback::PlaybackController;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use tracing::{debug, warn};
use winit::dpi::PhysicalSize;

use crate::error::PipelineError;
use crate::stats::FrameStats;
use crate::types::GpuPowerPreference;

use super::context::GpuContext;
use super::pipeline::{EffectPipeline, QUAD_VERTICES};
use super::source_texture::{BindingCache, SourceTextureManager};
use super::uniforms::{EffectUniforms, UNIFORM_SIZE};

/// Owns every GPU resource and runs one orchestrated frame per tick.
pub(crate) struct GpuState {
    context: GpuContext,
    pipeline: EffectPipeline,
    uniform_buffer: wgpu::Buffer,
    textures: SourceTextureManager,
    bindings: BindingCache<wgpu::BindGroup>,
    stats: FrameStats,
    start_time: Instant,
}

impl GpuState {
    pub(crate) fn new<T>(
        target: &T,
        initial_size: PhysicalSize<u32>,
        gpu_power: GpuPowerPreference,
    ) -> Result<Self, PipelineError>
    where
        T: HasDisplayHandle + HasWindowHandle,
    {
        let context = GpuContext::new(target, initial_size, gpu_power)?;
        let pipeline = EffectPipeline::new(&context.device, context.surface_format)?;

        let uniform_buffer = context.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("effect uniforms"),
            size: UNIFORM_SIZE,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let now = Instant::now();
        Ok(Self {
            context,
            pipeline,
            uniform_buffer,
            textures: SourceTextureManager::new(),
            bindings: BindingCache::default(),
            stats: FrameStats::new(now),
            start_time: now,
        })
    }

    pub(crate) fn size(&self) -> PhysicalSize<u32> {
        self.context.size
    }

    pub(crate) fn resize(&mut self, new_size: PhysicalSize<u32>) {
        self.context.resize(new_size);
    }

    /// Runs one frame: source sync, parameter push, acquire, draw, present, stats.
    ///
    /// Returns the fps figure when a measurement window closes.
    pub(crate) fn render(
        &mut self,
        controller: &mut PlaybackController,
        params: EffectParameters,
    ) -> Result<Option<u32>, PipelineError> {
        if let Some(size) = controller.take_pending_capacity() {
            self.sync_capacity(size.width, size.height)?;
        }
        if let Some(frame) = controller.poll_frame() {
            self.sync_capacity(frame.width, frame.height)?;
            self.textures.upload(&self.context.queue, frame)?;
        }

        let resolution = [self.context.size.width as f32, self.context.size.height as f32];
        let snapshot = params.with_frame(resolution, self.start_time.elapsed().as_secs_f32());
        self.context.queue.write_buffer(
            &self.uniform_buffer,
            0,
            EffectUniforms::from_parameters(&snapshot).as_bytes(),
        );

        let frame = self.context.surface.get_current_texture()?;
        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder =
            self.context
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("effect encoder"),
                });

        {
            let mut render_pass = begin_pass(&mut encoder, &view);
            if let Some(texture) = self.textures.current() {
                let pipeline = &self.pipeline;
                let device = &self.context.device;
                let uniform_buffer = &self.uniform_buffer;
                let bind_group = self.bindings.get_or_build(texture.generation(), || {
                    pipeline.bind(device, texture.view(), uniform_buffer)
                });
                render_pass.set_pipeline(&self.pipeline.pipeline);
                render_pass.set_bind_group(0, bind_group, &[]);
                render_pass.draw(0..QUAD_VERTICES, 0..1);
            }
        }

        self.context.queue.submit(std::iter::once(encoder.finish()));
        frame.present();

        let fps = self.stats.record(Instant::now());
        if let Some(fps) = fps {
            debug!(
                fps,
                generation = self.bindings.generation(),
                width = self.context.size.width,
                height = self.context.size.height,
                "render stats"
            );
        }
        Ok(fps)
    }

    /// Clears the surface to black while nothing is playing.
    pub(crate) fn render_idle(&mut self) -> Result<(), PipelineError> {
        let frame = self.context.surface.get_current_texture()?;
        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder =
            self.context
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("idle encoder"),
                });
        drop(begin_pass(&mut encoder, &view));
        self.context.queue.submit(std::iter::once(encoder.finish()));
        frame.present();
        Ok(())
    }

    /// Blocks until every submitted command buffer has finished.
    pub(crate) fn wait_idle(&self) {
        if let Err(err) = self.context.device.poll(wgpu::PollType::Wait) {
            warn!(error = %err, "failed to wait for the GPU to go idle");
        }
    }

    /// Drops the source texture and its binding set once the GPU is done with them.
    pub(crate) fn release_source(&mut self) {
        self.wait_idle();
        self.bindings.invalidate();
        self.textures.release();
        self.stats.reset(Instant::now());
    }

    fn sync_capacity(&mut self, width: u32, height: u32) -> Result<(), PipelineError> {
        if self
            .textures
            .ensure_capacity(&self.context.device, width, height)?
        {
            self.bindings.invalidate();
        }
        Ok(())
    }
}

fn begin_pass<'encoder>(
    encoder: &'encoder mut wgpu::CommandEncoder,
    view: &wgpu::TextureView,
) -> wgpu::RenderPass<'encoder> {
    encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
        label: Some("effect pass"),
        color_attachments: &[Some(wgpu::RenderPassColorAttachment {
            view,
            depth_slice: None,
            resolve_target: None,
            ops: wgpu::Operations {
                load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                store: wgpu::StoreOp::Store,
            },
        })],
        depth_stencil_attachment: None,
        occlusion_query_set: None,
        timestamp_writes: None,
    })
}
