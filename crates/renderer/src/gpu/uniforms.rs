use bytemuck::{Pod, Zeroable};
use params::EffectParameters;

/// Bit-exact mirror of `EffectUniforms` in `effect.wgsl`: sixteen packed `f32`s.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub(crate) struct EffectUniforms {
    pub resolution: [f32; 2],
    pub ascii_density: f32,
    pub char_size: f32,
    pub dither_intensity: f32,
    pub dither_size: f32,
    pub brightness: f32,
    pub contrast: f32,
    pub mode: f32,
    pub time: f32,
    reserved: [f32; 6],
}

impl EffectUniforms {
    pub fn from_parameters(params: &EffectParameters) -> Self {
        Self {
            resolution: params.resolution,
            ascii_density: params.ascii_density,
            char_size: params.char_size,
            dither_intensity: params.dither_intensity,
            dither_size: params.dither_size.size() as f32,
            brightness: params.brightness,
            contrast: params.contrast,
            mode: params.mode.as_f32(),
            time: params.time_seconds,
            reserved: [0.0; 6],
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }
}

pub(crate) const UNIFORM_SIZE: u64 = std::mem::size_of::<EffectUniforms>() as u64;

#[cfg(test)]
mod tests {
    use super::*;
    use params::{DitherTile, EffectMode};

    #[test]
    fn block_is_sixty_four_bytes() {
        assert_eq!(UNIFORM_SIZE, 64);
    }

    #[test]
    fn fields_follow_the_wire_order() {
        let params = EffectParameters {
            char_size: 12.0,
            dither_size: DitherTile::Eight,
            mode: EffectMode::Combined,
            ..EffectParameters::default()
        }
        .with_frame([640.0, 480.0], 2.5);

        let uniforms = EffectUniforms::from_parameters(&params);
        let floats: &[f32] = bytemuck::cast_slice(uniforms.as_bytes());
        assert_eq!(
            floats,
            &[
                640.0, 480.0, 16.0, 12.0, 0.5, 8.0, 1.0, 1.0, 2.0, 2.5, 0.0, 0.0, 0.0, 0.0, 0.0,
                0.0
            ]
        );
    }
}
