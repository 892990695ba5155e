use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};

mod config;

pub use config::{ConfigError, EffectConfig, OutputLimits};

pub const ASCII_DENSITY_RANGE: (f32, f32) = (1.0, 64.0);

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("unknown parameter '{0}'")]
    UnknownParameter(String),
    #[error("{param} must be a finite number")]
    NotFinite { param: ParamName },
    #[error("{param} = {value} is out of range ({expected})")]
    OutOfRange {
        param: ParamName,
        value: f32,
        expected: &'static str,
    },
    #[error("dither tile size {0} is unsupported; expected 2, 4, or 8")]
    UnsupportedTileSize(f32),
    #[error("mode {0} is unknown; expected 0 (ascii), 1 (dither), or 2 (combined)")]
    UnknownMode(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EffectMode {
    #[default]
    Ascii,
    Dither,
    Combined,
}

impl EffectMode {
    pub fn from_value(value: f32) -> Result<Self, ValidationError> {
        if value == 0.0 {
            Ok(Self::Ascii)
        } else if value == 1.0 {
            Ok(Self::Dither)
        } else if value == 2.0 {
            Ok(Self::Combined)
        } else {
            Err(ValidationError::UnknownMode(value.to_string()))
        }
    }

    /// Value written into the uniform block; the shader branches on `< 0.5` / `< 1.5`.
    pub fn as_f32(self) -> f32 {
        match self {
            Self::Ascii => 0.0,
            Self::Dither => 1.0,
            Self::Combined => 2.0,
        }
    }
}

impl FromStr for EffectMode {
    type Err = ValidationError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let normalized = raw.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "ascii" | "0" => Ok(Self::Ascii),
            "dither" | "1" => Ok(Self::Dither),
            "combined" | "2" => Ok(Self::Combined),
            _ => Err(ValidationError::UnknownMode(raw.trim().to_string())),
        }
    }
}

impl fmt::Display for EffectMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ascii => f.write_str("ascii"),
            Self::Dither => f.write_str("dither"),
            Self::Combined => f.write_str("combined"),
        }
    }
}

/// Supported Bayer matrix sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum DitherTile {
    Two,
    #[default]
    Four,
    Eight,
}

impl DitherTile {
    pub const ALL: [DitherTile; 3] = [DitherTile::Two, DitherTile::Four, DitherTile::Eight];

    pub fn size(self) -> u32 {
        match self {
            Self::Two => 2,
            Self::Four => 4,
            Self::Eight => 8,
        }
    }

    pub fn from_value(value: f32) -> Result<Self, ValidationError> {
        if value == 2.0 {
            Ok(Self::Two)
        } else if value == 4.0 {
            Ok(Self::Four)
        } else if value == 8.0 {
            Ok(Self::Eight)
        } else {
            Err(ValidationError::UnsupportedTileSize(value))
        }
    }

    pub fn next(self) -> Self {
        match self {
            Self::Two => Self::Four,
            Self::Four => Self::Eight,
            Self::Eight => Self::Two,
        }
    }
}

impl TryFrom<u32> for DitherTile {
    type Error = ValidationError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::from_value(value as f32)
    }
}

impl From<DitherTile> for u32 {
    fn from(tile: DitherTile) -> Self {
        tile.size()
    }
}

/// Host-writable effect parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EffectParameters {
    /// Output resolution in pixels; filled in by the frame loop, never by the host.
    #[serde(skip)]
    pub resolution: [f32; 2],
    /// Legacy density level count. Validated and transmitted, not consumed by the shader.
    pub ascii_density: f32,
    pub char_size: f32,
    pub dither_intensity: f32,
    pub dither_size: DitherTile,
    pub brightness: f32,
    pub contrast: f32,
    pub mode: EffectMode,
    /// Seconds since the pipeline started; filled in by the frame loop.
    #[serde(skip)]
    pub time_seconds: f32,
}

impl Default for EffectParameters {
    fn default() -> Self {
        Self {
            resolution: [0.0, 0.0],
            ascii_density: 16.0,
            char_size: 8.0,
            dither_intensity: 0.5,
            dither_size: DitherTile::Four,
            brightness: 1.0,
            contrast: 1.0,
            mode: EffectMode::Ascii,
            time_seconds: 0.0,
        }
    }
}

/// Parameters the host may address by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamName {
    AsciiDensity,
    CharSize,
    DitherIntensity,
    DitherSize,
    Brightness,
    Contrast,
    Mode,
}

impl ParamName {
    pub const ALL: [ParamName; 7] = [
        ParamName::AsciiDensity,
        ParamName::CharSize,
        ParamName::DitherIntensity,
        ParamName::DitherSize,
        ParamName::Brightness,
        ParamName::Contrast,
        ParamName::Mode,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::AsciiDensity => "asciiDensity",
            Self::CharSize => "charSize",
            Self::DitherIntensity => "ditherIntensity",
            Self::DitherSize => "ditherSize",
            Self::Brightness => "brightness",
            Self::Contrast => "contrast",
            Self::Mode => "mode",
        }
    }
}

impl FromStr for ParamName {
    type Err = ValidationError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let key: String = raw
            .trim()
            .chars()
            .filter(|ch| *ch != '_' && *ch != '-')
            .collect::<String>()
            .to_ascii_lowercase();
        match key.as_str() {
            "asciidensity" => Ok(Self::AsciiDensity),
            "charsize" => Ok(Self::CharSize),
            "ditherintensity" => Ok(Self::DitherIntensity),
            "dithersize" => Ok(Self::DitherSize),
            "brightness" => Ok(Self::Brightness),
            "contrast" => Ok(Self::Contrast),
            "mode" => Ok(Self::Mode),
            _ => Err(ValidationError::UnknownParameter(raw.trim().to_string())),
        }
    }
}

impl fmt::Display for ParamName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl EffectParameters {
    pub fn get(&self, param: ParamName) -> f32 {
        match param {
            ParamName::AsciiDensity => self.ascii_density,
            ParamName::CharSize => self.char_size,
            ParamName::DitherIntensity => self.dither_intensity,
            ParamName::DitherSize => self.dither_size.size() as f32,
            ParamName::Brightness => self.brightness,
            ParamName::Contrast => self.contrast,
            ParamName::Mode => self.mode.as_f32(),
        }
    }

    /// Validates and applies a single parameter. On error the previous value is kept.
    pub fn set(&mut self, param: ParamName, value: f32) -> Result<(), ValidationError> {
        if !value.is_finite() {
            return Err(ValidationError::NotFinite { param });
        }
        match param {
            ParamName::AsciiDensity => {
                let (min, max) = ASCII_DENSITY_RANGE;
                if value.fract() != 0.0 || value < min || value > max {
                    return Err(ValidationError::OutOfRange {
                        param,
                        value,
                        expected: "an integer in 1..=64",
                    });
                }
                self.ascii_density = value;
            }
            ParamName::CharSize => {
                if value <= 0.0 {
                    return Err(ValidationError::OutOfRange {
                        param,
                        value,
                        expected: "> 0",
                    });
                }
                self.char_size = value;
            }
            ParamName::DitherIntensity => {
                if !(0.0..=1.0).contains(&value) {
                    return Err(ValidationError::OutOfRange {
                        param,
                        value,
                        expected: "0.0..=1.0",
                    });
                }
                self.dither_intensity = value;
            }
            ParamName::DitherSize => self.dither_size = DitherTile::from_value(value)?,
            ParamName::Brightness => {
                if value < 0.0 {
                    return Err(ValidationError::OutOfRange {
                        param,
                        value,
                        expected: ">= 0",
                    });
                }
                self.brightness = value;
            }
            ParamName::Contrast => {
                if value < 0.0 {
                    return Err(ValidationError::OutOfRange {
                        param,
                        value,
                        expected: ">= 0",
                    });
                }
                self.contrast = value;
            }
            ParamName::Mode => self.mode = EffectMode::from_value(value)?,
        }
        Ok(())
    }

    /// Re-checks every host parameter, e.g. after deserializing from a file.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut probe = Self::default();
        for param in ParamName::ALL {
            probe.set(param, self.get(param))?;
        }
        Ok(())
    }

    pub fn with_frame(mut self, resolution: [f32; 2], time_seconds: f32) -> Self {
        self.resolution = resolution;
        self.time_seconds = time_seconds;
        self
    }
}

/// Parses a `name=value` host command such as `charSize=12` or `mode=dither`.
pub fn parse_assignment(raw: &str) -> Result<(ParamName, f32), ValidationError> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| ValidationError::UnknownParameter(raw.trim().to_string()))?;
    let param: ParamName = name.parse()?;
    let value = value.trim();
    if param == ParamName::Mode {
        return Ok((param, value.parse::<EffectMode>()?.as_f32()));
    }
    let parsed = value
        .parse::<f32>()
        .map_err(|_| ValidationError::NotFinite { param })?;
    Ok((param, parsed))
}

/// Single-writer/single-reader parameter slot shared between the host and the frame loop.
///
/// Every write replaces the whole record under the lock, so a snapshot is never torn.
#[derive(Debug, Clone, Default)]
pub struct ParameterChannel {
    inner: Arc<Mutex<EffectParameters>>,
}

impl ParameterChannel {
    pub fn new(initial: EffectParameters) -> Result<Self, ValidationError> {
        initial.validate()?;
        Ok(Self {
            inner: Arc::new(Mutex::new(initial)),
        })
    }

    pub fn set(&self, param: ParamName, value: f32) -> Result<(), ValidationError> {
        let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let mut next = *guard;
        next.set(param, value)?;
        *guard = next;
        Ok(())
    }

    /// Adds `delta` to the current value under one lock, snapping to hundredths
    /// and clamping into `range` before validating the result as a `set`.
    pub fn nudge(
        &self,
        param: ParamName,
        delta: f32,
        range: RangeInclusive<f32>,
    ) -> Result<f32, ValidationError> {
        let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let mut next = *guard;
        let stepped = ((next.get(param) + delta) * 100.0).round() / 100.0;
        let value = stepped.clamp(*range.start(), *range.end());
        next.set(param, value)?;
        *guard = next;
        Ok(value)
    }

    pub fn cycle_dither_size(&self) -> DitherTile {
        let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        guard.dither_size = guard.dither_size.next();
        guard.dither_size
    }

    pub fn snapshot(&self) -> EffectParameters {
        *self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
