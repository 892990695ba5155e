use playback::Frame;
use tracing::debug;

use crate::error::PipelineError;

/// GPU copy of the current source image. Recreated, never resized in place.
pub(crate) struct SourceTexture {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    width: u32,
    height: u32,
    generation: u64,
}

impl SourceTexture {
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }
}

#[derive(Default)]
pub(crate) struct SourceTextureManager {
    current: Option<SourceTexture>,
    generations: u64,
}

impl SourceTextureManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes sure the texture is exactly `width`x`height`. Returns `true` when it was rebuilt,
    /// which invalidates every binding set built against the previous texture.
    pub fn ensure_capacity(
        &mut self,
        device: &wgpu::Device,
        width: u32,
        height: u32,
    ) -> Result<bool, PipelineError> {
        let current = self.current.as_ref().map(SourceTexture::size);
        if !needs_rebuild(current, (width, height)) {
            return Ok(false);
        }

        let rebuild_error = |reason: String| PipelineError::TextureRebuild {
            width,
            height,
            reason,
        };
        if width == 0 || height == 0 {
            return Err(rebuild_error("source has zero area".into()));
        }
        let max_dimension = device.limits().max_texture_dimension_2d;
        if width > max_dimension || height > max_dimension {
            return Err(rebuild_error(format!(
                "exceeds the device limit of {max_dimension} pixels"
            )));
        }

        if let Some(previous) = self.current.take() {
            previous.texture.destroy();
        }

        device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("source texture"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        let validation = pollster::block_on(device.pop_error_scope());
        let out_of_memory = pollster::block_on(device.pop_error_scope());
        if let Some(err) = out_of_memory.or(validation) {
            texture.destroy();
            return Err(rebuild_error(err.to_string()));
        }

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        self.generations += 1;
        self.current = Some(SourceTexture {
            texture,
            view,
            width,
            height,
            generation: self.generations,
        });
        debug!(width, height, generation = self.generations, "rebuilt source texture");
        Ok(true)
    }

    /// Copies `frame` into the texture. The frame must already match the texture size.
    pub fn upload(&self, queue: &wgpu::Queue, frame: &Frame) -> Result<(), PipelineError> {
        let Some(current) = self.current.as_ref() else {
            return Err(PipelineError::TextureRebuild {
                width: frame.width,
                height: frame.height,
                reason: "upload before the texture was allocated".into(),
            });
        };
        if current.size() != (frame.width, frame.height) {
            return Err(PipelineError::TextureRebuild {
                width: frame.width,
                height: frame.height,
                reason: format!(
                    "frame does not match the {}x{} texture",
                    current.width, current.height
                ),
            });
        }

        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &current.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &frame.data,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(frame.width * 4),
                rows_per_image: Some(frame.height),
            },
            wgpu::Extent3d {
                width: frame.width,
                height: frame.height,
                depth_or_array_layers: 1,
            },
        );
        Ok(())
    }

    pub fn current(&self) -> Option<&SourceTexture> {
        self.current.as_ref()
    }

    pub fn release(&mut self) {
        if let Some(previous) = self.current.take() {
            previous.texture.destroy();
        }
    }
}

fn needs_rebuild(current: Option<(u32, u32)>, requested: (u32, u32)) -> bool {
    current != Some(requested)
}

/// Binding set derived from a texture generation, rebuilt lazily when the generation moves.
pub(crate) struct BindingCache<B> {
    entry: Option<(u64, B)>,
}

impl<B> Default for BindingCache<B> {
    fn default() -> Self {
        Self { entry: None }
    }
}

impl<B> BindingCache<B> {
    pub fn get_or_build<F>(&mut self, generation: u64, build: F) -> &B
    where
        F: FnOnce() -> B,
    {
        let stale = !matches!(&self.entry, Some((cached, _)) if *cached == generation);
        if stale {
            self.entry = None;
        }
        &self.entry.get_or_insert_with(|| (generation, build())).1
    }

    pub fn invalidate(&mut self) {
        self.entry = None;
    }

    pub fn generation(&self) -> Option<u64> {
        self.entry.as_ref().map(|(generation, _)| *generation)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;

    #[test]
    fn rebuilds_only_on_size_change() {
        assert!(needs_rebuild(None, (640, 480)));
        assert!(!needs_rebuild(Some((640, 480)), (640, 480)));
        assert!(needs_rebuild(Some((640, 480)), (480, 640)));
    }

    #[test]
    fn binding_cache_reuses_the_same_generation() {
        let builds = Cell::new(0);
        let mut cache = BindingCache::default();
        let build = || {
            builds.set(builds.get() + 1);
            builds.get()
        };
        assert_eq!(*cache.get_or_build(1, build), 1);
        assert_eq!(*cache.get_or_build(1, build), 1);
        assert_eq!(builds.get(), 1);
        assert_eq!(cache.generation(), Some(1));
    }

    #[test]
    fn binding_cache_drops_stale_entries() {
        let mut cache = BindingCache::default();
        assert_eq!(*cache.get_or_build(1, || "first"), "first");
        assert_eq!(*cache.get_or_build(2, || "second"), "second");
        cache.invalidate();
        assert_eq!(cache.generation(), None);
        assert_eq!(*cache.get_or_build(2, || "third"), "third");
    }
}
