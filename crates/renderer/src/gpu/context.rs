use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use winit::dpi::PhysicalSize;

use crate::error::PipelineError;
use crate::types::GpuPowerPreference;

pub(crate) struct GpuContext {
    pub surface: wgpu::Surface<'static>,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub config: wgpu::SurfaceConfiguration,
    pub size: PhysicalSize<u32>,
    pub surface_format: wgpu::TextureFormat,
    pub max_texture_dimension: u32,
    _instance: wgpu::Instance,
}

impl GpuContext {
    pub(crate) fn new<T>(
        target: &T,
        initial_size: PhysicalSize<u32>,
        gpu_power: GpuPowerPreference,
    ) -> Result<Self, PipelineError>
    where
        T: HasDisplayHandle + HasWindowHandle,
    {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            flags: wgpu::InstanceFlags::default(),
            memory_budget_thresholds: wgpu::MemoryBudgetThresholds::default(),
            backend_options: wgpu::BackendOptions::default(),
        });

        let window_handle = target.window_handle().map_err(|err| {
            PipelineError::UnsupportedPlatform(format!("failed to acquire window handle: {err}"))
        })?;
        let display_handle = target.display_handle().map_err(|err| {
            PipelineError::UnsupportedPlatform(format!("failed to acquire display handle: {err}"))
        })?;

        // The window outlives the surface: `GpuState` is dropped before the window it renders into.
        let surface = unsafe {
            instance.create_surface_unsafe(wgpu::SurfaceTargetUnsafe::RawHandle {
                raw_display_handle: display_handle.as_raw(),
                raw_window_handle: window_handle.as_raw(),
            })
        }
        .map_err(|err| {
            PipelineError::UnsupportedPlatform(format!("failed to create rendering surface: {err}"))
        })?;

        let power_preference = match gpu_power {
            GpuPowerPreference::Low => wgpu::PowerPreference::LowPower,
            GpuPowerPreference::High => wgpu::PowerPreference::HighPerformance,
        };
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference,
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        }))
        .map_err(|err| PipelineError::UnsupportedPlatform(err.to_string()))?;

        let adapter_info = adapter.get_info();
        tracing::debug!(
            name = %adapter_info.name,
            backend = ?adapter_info.backend,
            device_type = ?adapter_info.device_type,
            "selected GPU adapter"
        );

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("asciidither device"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::downlevel_defaults().using_resolution(adapter.limits()),
            memory_hints: wgpu::MemoryHints::Performance,
            trace: wgpu::Trace::default(),
        }))
        .map_err(|err| PipelineError::DeviceAcquisition(err.to_string()))?;

        let max_texture_dimension = device.limits().max_texture_dimension_2d;
        let size = PhysicalSize::new(
            initial_size.width.clamp(1, max_texture_dimension),
            initial_size.height.clamp(1, max_texture_dimension),
        );

        let surface_caps = surface.get_capabilities(&adapter);
        // Effect output is already display-encoded, so skip the sRGB conversion when we can.
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|format| !format.is_srgb())
            .or_else(|| surface_caps.formats.first().copied())
            .ok_or_else(|| {
                PipelineError::UnsupportedPlatform(
                    "surface reports no supported texture formats".into(),
                )
            })?;
        if surface_format.is_srgb() {
            tracing::warn!(
                ?surface_format,
                "no linear (non-sRGB) surface format available; colours will be re-encoded"
            );
        }

        let present_mode = if surface_caps.present_modes.contains(&wgpu::PresentMode::Fifo) {
            wgpu::PresentMode::Fifo
        } else {
            surface_caps
                .present_modes
                .first()
                .copied()
                .unwrap_or(wgpu::PresentMode::Fifo)
        };
        let alpha_mode = if surface_caps
            .alpha_modes
            .contains(&wgpu::CompositeAlphaMode::Opaque)
        {
            wgpu::CompositeAlphaMode::Opaque
        } else {
            surface_caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto)
        };
        tracing::debug!(?surface_format, ?present_mode, ?alpha_mode, "configuring surface");

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width,
            height: size.height,
            present_mode,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        Ok(Self {
            surface,
            device,
            queue,
            config,
            size,
            surface_format,
            max_texture_dimension,
            _instance: instance,
        })
    }

    pub(crate) fn resize(&mut self, new_size: PhysicalSize<u32>) {
        if new_size.width == 0 || new_size.height == 0 {
            return;
        }

        self.size = PhysicalSize::new(
            new_size.width.min(self.max_texture_dimension),
            new_size.height.min(self.max_texture_dimension),
        );
        self.config.width = self.size.width;
        self.config.height = self.size.height;
        self.surface.configure(&self.device, &self.config);
    }
}
