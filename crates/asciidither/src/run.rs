use anyhow::{Context, Result};
use params::{EffectConfig, ParameterChannel};
use renderer::Renderer;
use tracing_subscriber::EnvFilter;

use crate::bootstrap::{build_renderer_config, resolve_parameters};
use crate::cli::Args;
use crate::control::spawn_stdin_control;
use crate::paths::AppPaths;

pub fn run(args: Args) -> Result<()> {
    initialise_tracing();

    let config = load_config(&args)?;
    let params = resolve_parameters(&args, &config)?;
    let channel = ParameterChannel::new(params).context("invalid effect parameters")?;
    let renderer_config = build_renderer_config(&args, &config);

    let source = renderer_config
        .initial_source
        .as_ref()
        .map(|source| source.describe())
        .unwrap_or_else(|| "none".into());
    tracing::info!(
        mode = %params.mode,
        char_size = params.char_size,
        dither_size = params.dither_size.size(),
        max_width = renderer_config.output_bounds.max_width,
        max_height = renderer_config.output_bounds.max_height,
        source = %source,
        "starting asciidither"
    );

    if args.stdin_control {
        spawn_stdin_control(channel.clone()).context("failed to start stdin control thread")?;
    }

    Renderer::new(renderer_config, channel).run()
}

fn initialise_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// An explicit `--config` must exist; the default location is optional.
fn load_config(args: &Args) -> Result<EffectConfig> {
    if let Some(path) = &args.config {
        let config = EffectConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?;
        tracing::debug!(path = %path.display(), "loaded configuration");
        return Ok(config);
    }

    let paths = AppPaths::discover()?;
    let path = paths.config_file();
    let config = EffectConfig::load_or_default(&path)
        .with_context(|| format!("failed to load config {}", path.display()))?;
    tracing::debug!(
        path = %path.display(),
        found = path.is_file(),
        "resolved default configuration"
    );
    Ok(config)
}
