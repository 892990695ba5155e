use anyhow::{anyhow, bail, Context, Result};
use params::{EffectConfig, EffectParameters, ParamName};
use playback::OutputBounds;
use renderer::{GpuPowerPreference, RendererConfig, SourceRequest};

use crate::cli::Args;

pub fn parse_surface_size(value: &str) -> Result<(u32, u32)> {
    let trimmed = value.trim();
    let (width, height) = trimmed
        .split_once(['x', 'X', '×'])
        .ok_or_else(|| anyhow!("expected WxH format, e.g. 1280x720"))?;

    let width: u32 = width
        .trim()
        .parse()
        .map_err(|_| anyhow!("invalid width in size"))?;
    let height: u32 = height
        .trim()
        .parse()
        .map_err(|_| anyhow!("invalid height in size"))?;

    if width == 0 || height == 0 {
        bail!("dimensions must be greater than zero");
    }

    Ok((width, height))
}

/// Layers command-line overrides on top of the file configuration.
///
/// Dedicated flags apply first, then `--set` assignments in order, each
/// through the same validation as a runtime `set`.
pub fn resolve_parameters(args: &Args, config: &EffectConfig) -> Result<EffectParameters> {
    let mut params = config.effect;
    let flags = [
        (ParamName::Mode, args.mode.map(|mode| mode.as_f32())),
        (ParamName::CharSize, args.char_size),
        (ParamName::AsciiDensity, args.ascii_density),
        (ParamName::DitherIntensity, args.dither_intensity),
        (ParamName::DitherSize, args.dither_size.map(|size| size as f32)),
        (ParamName::Brightness, args.brightness),
        (ParamName::Contrast, args.contrast),
    ];
    let overrides = flags
        .into_iter()
        .filter_map(|(param, value)| value.map(|value| (param, value)))
        .chain(args.assignments.iter().copied());
    for (param, value) in overrides {
        params
            .set(param, value)
            .with_context(|| format!("invalid value for --{}", flag_name(param)))?;
    }
    Ok(params)
}

fn flag_name(param: ParamName) -> &'static str {
    match param {
        ParamName::AsciiDensity => "ascii-density",
        ParamName::CharSize => "char-size",
        ParamName::DitherIntensity => "dither-intensity",
        ParamName::DitherSize => "dither-size",
        ParamName::Brightness => "brightness",
        ParamName::Contrast => "contrast",
        ParamName::Mode => "mode",
    }
}

pub fn resolve_source(args: &Args) -> Option<SourceRequest> {
    if let Some(path) = &args.image {
        Some(SourceRequest::Image(path.clone()))
    } else if let Some(path) = &args.video {
        Some(SourceRequest::Video(path.clone()))
    } else {
        args.camera
            .as_ref()
            .map(|device| SourceRequest::camera(Some(device.clone())))
    }
}

pub fn build_renderer_config(args: &Args, config: &EffectConfig) -> RendererConfig {
    let (max_width, max_height) = args
        .max_size
        .unwrap_or((config.output.max_width, config.output.max_height));
    let defaults = RendererConfig::default();
    RendererConfig {
        surface_size: args.size.unwrap_or(defaults.surface_size),
        output_bounds: OutputBounds::new(max_width, max_height),
        initial_source: resolve_source(args),
        gpu_power: if args.low_power {
            GpuPowerPreference::Low
        } else {
            GpuPowerPreference::High
        },
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use clap::Parser;
    use params::{DitherTile, EffectMode};

    use super::*;

    fn args(extra: &[&str]) -> Args {
        let mut argv = vec!["asciidither"];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn parses_surface_sizes() {
        assert_eq!(parse_surface_size("1920x1080").unwrap(), (1920, 1080));
        assert_eq!(parse_surface_size(" 640 X 480 ").unwrap(), (640, 480));
        assert!(parse_surface_size("0x480").is_err());
        assert!(parse_surface_size("640").is_err());
    }

    #[test]
    fn flags_override_file_values() {
        let config = EffectConfig::from_toml_str("[effect]\nchar_size = 12\nmode = \"dither\"\n")
            .unwrap();
        let params = resolve_parameters(
            &args(&["--char-size", "6", "--dither-size", "8", "--set", "brightness=1.5"]),
            &config,
        )
        .unwrap();
        assert_eq!(params.char_size, 6.0);
        assert_eq!(params.mode, EffectMode::Dither);
        assert_eq!(params.dither_size, DitherTile::Eight);
        assert_eq!(params.brightness, 1.5);
    }

    #[test]
    fn later_assignments_win() {
        let params = resolve_parameters(
            &args(&["--mode", "ascii", "--set", "mode=combined"]),
            &EffectConfig::default(),
        )
        .unwrap();
        assert_eq!(params.mode, EffectMode::Combined);
    }

    #[test]
    fn rejects_invalid_overrides() {
        let err = resolve_parameters(&args(&["--dither-size", "3"]), &EffectConfig::default())
            .unwrap_err();
        assert!(err.to_string().contains("--dither-size"));
    }

    #[test]
    fn builds_renderer_config_from_flags() {
        let config = build_renderer_config(
            &args(&["--video", "clip.mp4", "--max-size", "800x600", "--low-power"]),
            &EffectConfig::default(),
        );
        assert_eq!(
            config.initial_source,
            Some(SourceRequest::Video(PathBuf::from("clip.mp4")))
        );
        assert_eq!(config.output_bounds, OutputBounds::new(800, 600));
        assert_eq!(config.gpu_power, GpuPowerPreference::Low);
        assert_eq!(config.surface_size, (1280, 720));
    }
}
