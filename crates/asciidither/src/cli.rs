use std::path::PathBuf;

use clap::{ArgGroup, Parser};
use params::{EffectMode, ParamName};
use playback::DEFAULT_CAMERA_DEVICE;

use crate::bootstrap::parse_surface_size;

#[derive(Parser, Debug)]
#[command(
    name = "asciidither",
    author,
    version,
    about = "Real-time ASCII and ordered-dither effects for images, videos and webcams",
    group(ArgGroup::new("source").args(["image", "video", "camera"]))
)]
pub struct Args {
    /// Still image to load at start-up.
    #[arg(long, value_name = "PATH")]
    pub image: Option<PathBuf>,

    /// Video file to play (looped, muted).
    #[arg(long, value_name = "PATH")]
    pub video: Option<PathBuf>,

    /// Capture from a webcam (`/dev/videoN` or an index); defaults to `/dev/video0`.
    #[arg(
        long,
        value_name = "DEVICE",
        num_args = 0..=1,
        default_missing_value = DEFAULT_CAMERA_DEVICE
    )]
    pub camera: Option<String>,

    /// Configuration file; defaults to `<config dir>/asciidither/config.toml` when present.
    #[arg(long, value_name = "PATH", env = "ASCIIDITHER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Effect mode: `ascii`, `dither`, or `combined`.
    #[arg(long, value_name = "MODE", value_parser = parse_mode)]
    pub mode: Option<EffectMode>,

    /// Edge of one ASCII cell in output pixels.
    #[arg(long, value_name = "PIXELS")]
    pub char_size: Option<f32>,

    /// Number of density levels (accepted and stored; the shader keeps twelve).
    #[arg(long, value_name = "LEVELS")]
    pub ascii_density: Option<f32>,

    /// Dither strength between 0.0 and 1.0.
    #[arg(long, value_name = "AMOUNT")]
    pub dither_intensity: Option<f32>,

    /// Bayer tile edge: 2, 4, or 8.
    #[arg(long, value_name = "SIZE")]
    pub dither_size: Option<u32>,

    /// Brightness multiplier applied before the effect; 1.0 leaves colours unchanged.
    #[arg(long, value_name = "FACTOR")]
    pub brightness: Option<f32>,

    /// Contrast around mid-grey; 1.0 leaves colours unchanged.
    #[arg(long, value_name = "FACTOR")]
    pub contrast: Option<f32>,

    /// Set a parameter by name (e.g. `charSize=12` or `mode=dither`); repeatable.
    #[arg(long = "set", value_name = "NAME=VALUE", value_parser = parse_set)]
    pub assignments: Vec<(ParamName, f32)>,

    /// Largest output a source is scaled down to (e.g. `1280x720`).
    #[arg(long, value_name = "WIDTHxHEIGHT", value_parser = parse_size)]
    pub max_size: Option<(u32, u32)>,

    /// Initial window size before a source is loaded.
    #[arg(long, value_name = "WIDTHxHEIGHT", value_parser = parse_size)]
    pub size: Option<(u32, u32)>,

    /// Read `name=value` parameter lines from stdin while the window runs.
    #[arg(long)]
    pub stdin_control: bool,

    /// Prefer the integrated GPU.
    #[arg(long)]
    pub low_power: bool,
}

pub fn parse() -> Args {
    Args::parse()
}

pub fn parse_mode(value: &str) -> Result<EffectMode, String> {
    value.trim().parse().map_err(|err| format!("{err}"))
}

pub fn parse_set(value: &str) -> Result<(ParamName, f32), String> {
    params::parse_assignment(value).map_err(|err| err.to_string())
}

pub fn parse_size(value: &str) -> Result<(u32, u32), String> {
    parse_surface_size(value).map_err(|err| err.to_string())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn every_flag_has_help_text() {
        let command = Args::command();
        for arg in command.get_arguments() {
            assert!(arg.get_help().is_some(), "--{} has no help text", arg.get_id());
        }
    }

    #[test]
    fn camera_flag_without_device_uses_default() {
        let args = Args::try_parse_from(["asciidither", "--camera"]).unwrap();
        assert_eq!(args.camera.as_deref(), Some("/dev/video0"));

        let args = Args::try_parse_from(["asciidither", "--camera", "/dev/video2"]).unwrap();
        assert_eq!(args.camera.as_deref(), Some("/dev/video2"));
    }

    #[test]
    fn sources_are_mutually_exclusive() {
        let result =
            Args::try_parse_from(["asciidither", "--image", "a.png", "--video", "b.mp4"]);
        assert!(result.is_err());
    }

    #[test]
    fn parses_assignments_and_sizes() {
        let args = Args::try_parse_from([
            "asciidither",
            "--set",
            "charSize=12",
            "--set",
            "mode=combined",
            "--max-size",
            "1280x720",
            "--mode",
            "dither",
        ])
        .unwrap();
        assert_eq!(
            args.assignments,
            vec![(ParamName::CharSize, 12.0), (ParamName::Mode, 2.0)]
        );
        assert_eq!(args.max_size, Some((1280, 720)));
        assert_eq!(args.mode, Some(EffectMode::Dither));
    }

    #[test]
    fn rejects_unknown_mode() {
        assert!(parse_mode("sepia").is_err());
        assert!(Args::try_parse_from(["asciidither", "--set", "gamma=2"]).is_err());
    }
}
