//! GPU side of the effect pipeline.
//!
//! - `context` owns the wgpu instance, device and surface, and reconfigures the
//!   swapchain when the window resizes.
//! - `pipeline` compiles `effect.wgsl` into the single render pipeline and
//!   builds binding sets (sampler, source view, uniform buffer).
//! - `source_texture` owns the RGBA source texture, recreating it when the
//!   source dimensions change, plus the generation-keyed binding cache.
//! - `uniforms` is the 64-byte parameter block pushed every frame.
//! - `state` runs the per-frame orchestration used by `window`.

mod context;
mod pipeline;
mod source_texture;
mod state;
mod uniforms;

pub(crate) use state::GpuState;
