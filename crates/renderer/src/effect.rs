//! CPU mirror of `shaders/effect.wgsl`.
//!
//! Every function here matches its WGSL counterpart operation for operation so
//! the shading rules can be checked without a GPU. Pixel coordinates are pixel
//! centres (`x + 0.5`), which is what the fragment stage sees after
//! interpolating `tex_coord * resolution`.

use params::{EffectMode, EffectParameters};

/// WGSL source of the effect pipeline.
pub const EFFECT_SHADER: &str = include_str!("shaders/effect.wgsl");

pub const DENSITY_LEVELS: f32 = 12.0;

/// Weight of the inverted pattern on cells whose hash reaches `VARIATION_CUTOFF`.
pub const VARIATION_BLEND: f32 = 0.3;
pub const VARIATION_CUTOFF: f32 = 0.7;

/// Combined mode scales the dither threshold and blend weight down so the
/// stacked effects keep their contrast.
pub const COMBINED_THRESHOLD_SCALE: f32 = 0.5;
pub const COMBINED_BLEND_SCALE: f32 = 0.7;

pub const BAYER_2: [u8; 4] = [
    0, 2, //
    3, 1,
];

pub const BAYER_4: [u8; 16] = [
    0, 8, 2, 10, //
    12, 4, 14, 6, //
    3, 11, 1, 9, //
    15, 7, 13, 5,
];

pub const BAYER_8: [u8; 64] = [
    0, 32, 8, 40, 2, 34, 10, 42, //
    48, 16, 56, 24, 50, 18, 58, 26, //
    12, 44, 4, 36, 14, 46, 6, 38, //
    60, 28, 52, 20, 62, 30, 54, 22, //
    3, 35, 11, 43, 1, 33, 9, 41, //
    51, 19, 59, 27, 49, 17, 57, 25, //
    15, 47, 7, 39, 13, 45, 5, 37, //
    63, 31, 55, 23, 61, 29, 53, 21,
];

/// Tile edge actually used for `tile`; anything other than 2 or 4 uses the 8x8 table.
pub fn effective_tile(tile: u32) -> u32 {
    match tile {
        2 | 4 => tile,
        _ => 8,
    }
}

pub fn bayer_table(tile: u32) -> &'static [u8] {
    match effective_tile(tile) {
        2 => &BAYER_2,
        4 => &BAYER_4,
        _ => &BAYER_8,
    }
}

/// Ordered-dither threshold in `[0, 1)` for pixel `(x, y)`.
pub fn bayer_threshold(x: u32, y: u32, tile: u32) -> f32 {
    let size = effective_tile(tile);
    let index = (y % size) * size + (x % size);
    f32::from(bayer_table(size)[index as usize]) / (size * size) as f32
}

pub fn adjust_color(color: [f32; 3], brightness: f32, contrast: f32) -> [f32; 3] {
    color.map(|channel| ((channel * brightness - 0.5) * contrast + 0.5).clamp(0.0, 1.0))
}

pub fn luminance(color: [f32; 3]) -> f32 {
    color[0] * 0.299 + color[1] * 0.587 + color[2] * 0.114
}

pub fn quantize_density(value: f32) -> f32 {
    (value * DENSITY_LEVELS).floor().clamp(0.0, DENSITY_LEVELS - 1.0) / DENSITY_LEVELS
}

/// Radius (in cell units) of the dark disc for a density level. Pixels outside it are lit.
pub fn pattern_radius(density: f32) -> f32 {
    0.5 - density * 0.4
}

/// Expected lit fraction of a cell for a density level.
pub fn expected_coverage(density: f32) -> f32 {
    let radius = pattern_radius(density);
    1.0 - std::f32::consts::PI * radius * radius
}

pub fn cell_pattern(pos_in_cell: [f32; 2], density: f32) -> f32 {
    let dx = pos_in_cell[0] - 0.5;
    let dy = pos_in_cell[1] - 0.5;
    step(pattern_radius(density), (dx * dx + dy * dy).sqrt())
}

/// Static per-cell hash in `[0, 1)`, keyed on the cell's pixel origin.
pub fn cell_variation(cell_origin: [f32; 2]) -> f32 {
    let dot = cell_origin[0] * 12.9898 + cell_origin[1] * 78.233;
    fract(dot.sin() * 43758.5453)
}

pub fn dither(
    color: [f32; 3],
    pixel: [u32; 2],
    tile: u32,
    threshold_scale: f32,
    blend: f32,
) -> [f32; 3] {
    let threshold = bayer_threshold(pixel[0], pixel[1], tile) * threshold_scale;
    color.map(|channel| mix(channel, step(threshold, channel), blend))
}

/// Shades the output pixel at integer position `pixel`.
///
/// `sample` returns the source colour at a normalised texture coordinate.
pub fn shade<F>(pixel: [u32; 2], params: &EffectParameters, sample: F) -> [f32; 3]
where
    F: Fn([f32; 2]) -> [f32; 3],
{
    let resolution = [params.resolution[0].max(1.0), params.resolution[1].max(1.0)];
    let coord = [pixel[0] as f32 + 0.5, pixel[1] as f32 + 0.5];
    let tile = params.dither_size.size();
    let intensity = params.dither_intensity;

    match params.mode {
        EffectMode::Ascii => ascii_cell(coord, resolution, params, &sample, true),
        EffectMode::Dither => {
            let uv = [coord[0] / resolution[0], coord[1] / resolution[1]];
            let color = adjust_color(sample(uv), params.brightness, params.contrast);
            dither(color, pixel, tile, intensity, intensity)
        }
        EffectMode::Combined => {
            let patterned = ascii_cell(coord, resolution, params, &sample, false);
            dither(
                patterned,
                pixel,
                tile,
                intensity * COMBINED_THRESHOLD_SCALE,
                intensity * COMBINED_BLEND_SCALE,
            )
        }
    }
}

fn ascii_cell<F>(
    coord: [f32; 2],
    resolution: [f32; 2],
    params: &EffectParameters,
    sample: &F,
    vary: bool,
) -> [f32; 3]
where
    F: Fn([f32; 2]) -> [f32; 3],
{
    let cell = params.char_size;
    let origin = [
        (coord[0] / cell).floor() * cell,
        (coord[1] / cell).floor() * cell,
    ];
    let center_uv = [
        (origin[0] + cell * 0.5) / resolution[0],
        (origin[1] + cell * 0.5) / resolution[1],
    ];
    let color = adjust_color(sample(center_uv), params.brightness, params.contrast);

    let density = quantize_density(luminance(color));
    let pos_in_cell = [(coord[0] - origin[0]) / cell, (coord[1] - origin[1]) / cell];
    let pattern = cell_pattern(pos_in_cell, density);
    if !vary {
        return color.map(|channel| channel * pattern);
    }

    let inverted = step(VARIATION_CUTOFF, cell_variation(origin)) * VARIATION_BLEND;
    let weight = mix(pattern, 1.0 - pattern, inverted);
    color.map(|channel| channel * weight)
}

fn step(edge: f32, value: f32) -> f32 {
    if value >= edge {
        1.0
    } else {
        0.0
    }
}

fn mix(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

fn fract(value: f32) -> f32 {
    value - value.floor()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quantizes_into_twelve_buckets() {
        assert_eq!(quantize_density(0.0), 0.0);
        assert_eq!(quantize_density(0.5), 6.0 / 12.0);
        assert_eq!(quantize_density(0.999), 11.0 / 12.0);
        assert_eq!(quantize_density(1.0), 11.0 / 12.0);
    }

    #[test]
    fn adjust_clamps_to_unit_range() {
        assert_eq!(adjust_color([1.0, 0.0, 0.5], 2.0, 1.0), [1.0, 0.0, 1.0]);
        assert_eq!(adjust_color([0.25, 0.5, 0.75], 1.0, 0.0), [0.5, 0.5, 0.5]);
        let identity = adjust_color([0.2, 0.4, 0.6], 1.0, 1.0);
        for (got, want) in identity.iter().zip([0.2, 0.4, 0.6]) {
            assert!((got - want).abs() < 1e-6);
        }
    }

    #[test]
    fn luminance_weights_sum_to_one() {
        assert!((luminance([1.0, 1.0, 1.0]) - 1.0).abs() < 1e-6);
        assert!(luminance([0.0, 1.0, 0.0]) > luminance([1.0, 0.0, 0.0]));
    }

    #[test]
    fn origin_cell_is_never_inverted() {
        assert_eq!(cell_variation([0.0, 0.0]), 0.0);
    }

    #[test]
    fn variation_is_static_and_in_unit_range() {
        for origin in [[8.0, 0.0], [16.0, 24.0], [1912.0, 1072.0]] {
            let first = cell_variation(origin);
            assert_eq!(first, cell_variation(origin));
            assert!((0.0..1.0).contains(&first));
        }
    }

    #[test]
    fn unknown_tile_sizes_use_the_8x8_table() {
        assert_eq!(effective_tile(3), 8);
        assert_eq!(bayer_threshold(1, 0, 16), bayer_threshold(1, 0, 8));
        assert_eq!(bayer_threshold(1, 0, 8), 32.0 / 64.0);
    }

    #[test]
    fn thresholds_tile_across_the_frame() {
        for tile in [2, 4, 8] {
            assert_eq!(bayer_threshold(3, 5, tile), bayer_threshold(3 + tile, 5 + tile, tile));
        }
    }

    #[test]
    fn shader_source_declares_expected_entry_points() {
        assert!(EFFECT_SHADER.contains("fn vs_main"));
        assert!(EFFECT_SHADER.contains("fn fs_main"));
    }

    #[test]
    fn shader_parses_and_validates() {
        let module = naga::front::wgsl::parse_str(EFFECT_SHADER).expect("WGSL parse");
        let mut validator = naga::valid::Validator::new(
            naga::valid::ValidationFlags::all(),
            naga::valid::Capabilities::empty(),
        );
        validator.validate(&module).expect("WGSL validation");

        let entry_points: Vec<&str> = module
            .entry_points
            .iter()
            .map(|entry| entry.name.as_str())
            .collect();
        assert!(entry_points.contains(&"vs_main"));
        assert!(entry_points.contains(&"fs_main"));
    }

    #[test]
    fn uniform_block_is_sixty_four_bytes() {
        let module = naga::front::wgsl::parse_str(EFFECT_SHADER).expect("WGSL parse");
        let uniforms = module
            .types
            .iter()
            .find(|(_, ty)| ty.name.as_deref() == Some("EffectUniforms"))
            .map(|(_, ty)| ty)
            .expect("EffectUniforms struct");
        match &uniforms.inner {
            naga::TypeInner::Struct { members, span } => {
                assert_eq!(*span, 64);
                let offsets: Vec<(&str, u32)> = members
                    .iter()
                    .map(|member| (member.name.as_deref().unwrap_or(""), member.offset))
                    .collect();
                assert_eq!(offsets[0], ("resolution", 0));
                assert_eq!(offsets[2], ("char_size", 12));
                assert_eq!(offsets[4], ("dither_size", 20));
                assert_eq!(offsets[7], ("mode", 32));
                assert_eq!(offsets[8], ("time", 36));
            }
            other => panic!("unexpected type {other:?}"),
        }
    }
}
