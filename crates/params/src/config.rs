use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{EffectParameters, ValidationError};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read configuration {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid effect parameter: {0}")]
    Parameter(#[from] ValidationError),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Upper bound applied to source dimensions before they reach the GPU.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputLimits {
    pub max_width: u32,
    pub max_height: u32,
}

impl Default for OutputLimits {
    fn default() -> Self {
        Self {
            max_width: 1920,
            max_height: 1080,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct EffectConfig {
    pub effect: EffectParameters,
    pub output: OutputLimits,
}

impl EffectConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let raw: EffectConfig = toml::from_str(input)?;
        raw.validate()?;
        Ok(raw)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    /// Loads `path` when it exists, falling back to defaults otherwise.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.is_file() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.effect.validate()?;
        if self.output.max_width == 0 || self.output.max_height == 0 {
            return Err(ConfigError::Invalid(
                "output.max_width and output.max_height must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}
