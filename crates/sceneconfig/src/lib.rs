use std::fs;
use std::path::{Path, PathBuf};

use lensing::{LensingParameters, Parameter};
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};

/// File name looked up inside the configuration directory.
pub const CONFIG_FILE_NAME: &str = "scene.toml";

const MAX_SUPPORTED_PIXEL_RATIO: f32 = 4.0;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read configuration {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to serialise configuration: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
pub enum SceneMode {
    #[serde(rename = "2d", alias = "2D")]
    Flat,
    #[default]
    #[serde(rename = "3d", alias = "3D")]
    Orbit,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SceneConfig {
    pub version: u32,
    #[serde(default)]
    pub mode: SceneMode,
    #[serde(default)]
    pub parameters: ParametersSection,
    #[serde(default)]
    pub pipeline: PipelineSection,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background: Option<BackgroundSection>,
    #[serde(default)]
    pub display: DisplaySection,
}

/// Initial values for the lensing parameters. Missing keys use the defaults.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct ParametersSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deflection_strength: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disk_opacity: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotation_speed: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub playback_speed: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disk_color: Option<[f32; 3]>,
    #[serde(default)]
    pub annotations: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct PipelineSection {
    #[serde(default = "default_true")]
    pub texture_backed: bool,
    #[serde(default = "default_true")]
    pub annotations: bool,
    #[serde(default = "default_true")]
    pub speed_controllable: bool,
}

impl Default for PipelineSection {
    fn default() -> Self {
        Self {
            texture_backed: true,
            annotations: true,
            speed_controllable: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct BackgroundSection {
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct DisplaySection {
    #[serde(default = "default_max_pixel_ratio")]
    pub max_pixel_ratio: f32,
    #[serde(
        default,
        deserialize_with = "deserialize_antialias_opt",
        serialize_with = "serialize_antialias_opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub antialias: Option<AntialiasSetting>,
    /// Frame cap for the preview window; `0` or absent renders every vsync.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fps: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
}

impl Default for DisplaySection {
    fn default() -> Self {
        Self {
            max_pixel_ratio: default_max_pixel_ratio(),
            antialias: None,
            fps: None,
            width: None,
            height: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AntialiasSetting {
    Auto,
    Off,
    Samples2,
    Samples4,
    Samples8,
}

impl AntialiasSetting {
    pub fn from_samples(samples: u32) -> Option<Self> {
        match samples {
            0 | 1 => Some(Self::Off),
            2 => Some(Self::Samples2),
            4 => Some(Self::Samples4),
            8 => Some(Self::Samples8),
            _ => None,
        }
    }

    /// Requested sample count, `None` for `Auto`.
    pub fn samples(self) -> Option<u32> {
        match self {
            Self::Auto => None,
            Self::Off => Some(1),
            Self::Samples2 => Some(2),
            Self::Samples4 => Some(4),
            Self::Samples8 => Some(8),
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Off => "off",
            Self::Samples2 => "2",
            Self::Samples4 => "4",
            Self::Samples8 => "8",
        }
    }
}

impl std::str::FromStr for AntialiasSetting {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        parse_antialias(raw)
    }
}

fn default_true() -> bool {
    true
}

fn default_max_pixel_ratio() -> f32 {
    2.0
}

fn deserialize_antialias_opt<'de, D>(deserializer: D) -> Result<Option<AntialiasSetting>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Helper {
        Str(String),
        Num(i64),
    }

    let helper: Option<Helper> = Option::deserialize(deserializer)?;
    let result = match helper {
        None => None,
        Some(Helper::Str(raw)) => Some(parse_antialias(&raw).map_err(de::Error::custom)?),
        Some(Helper::Num(value)) => {
            if value < 0 {
                return Err(de::Error::custom("antialias value must be non-negative"));
            }
            Some(parse_antialias(&value.to_string()).map_err(de::Error::custom)?)
        }
    };
    Ok(result)
}

fn serialize_antialias_opt<S>(value: &Option<AntialiasSetting>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match value {
        Some(setting) => serializer.serialize_str(setting.as_str()),
        None => serializer.serialize_none(),
    }
}

fn parse_antialias(raw: &str) -> Result<AntialiasSetting, String> {
    let normalized = raw.trim().to_ascii_lowercase();
    match normalized.as_str() {
        "auto" | "max" | "default" => Ok(AntialiasSetting::Auto),
        "off" | "none" | "disable" | "disabled" | "0" | "1" => Ok(AntialiasSetting::Off),
        "2" => Ok(AntialiasSetting::Samples2),
        "4" => Ok(AntialiasSetting::Samples4),
        "8" => Ok(AntialiasSetting::Samples8),
        other => Err(format!("invalid antialias setting '{other}'")),
    }
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            version: 1,
            mode: SceneMode::default(),
            parameters: ParametersSection::default(),
            pipeline: PipelineSection::default(),
            background: None,
            display: DisplaySection::default(),
        }
    }
}

impl SceneConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let raw: SceneConfig = toml::from_str(input)?;
        raw.validate()?;
        Ok(raw)
    }

    /// Reads and validates `path`. A relative background path is resolved
    /// against the directory holding the file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_toml_str(&contents)?;
        if let Some(base) = path.parent() {
            config.resolve_relative_paths(base);
        }
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn resolve_relative_paths(&mut self, base: &Path) {
        if let Some(background) = self.background.as_mut() {
            if background.path.is_relative() {
                background.path = base.join(&background.path);
            }
        }
    }

    pub fn background_path(&self) -> Option<&Path> {
        self.background.as_ref().map(|section| section.path.as_path())
    }

    /// Parameters to start the session with.
    pub fn lensing_parameters(&self) -> LensingParameters {
        let mut params = LensingParameters::default();
        let section = &self.parameters;
        let scalars = [
            (Parameter::DeflectionStrength, section.deflection_strength),
            (Parameter::DiskOpacity, section.disk_opacity),
            (Parameter::RotationSpeed, section.rotation_speed),
            (Parameter::PlaybackSpeed, section.playback_speed),
        ];
        for (parameter, value) in scalars {
            if let Some(value) = value {
                // Validated values are finite; clamping covers the rest.
                let _ = params.set(parameter, value);
            }
        }
        if let Some(color) = section.disk_color {
            let _ = params.set_disk_color(color);
        }
        params.set_annotations_visible(section.annotations);
        params
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version != 1 {
            return Err(ConfigError::Invalid(format!(
                "unsupported config version {}; expected 1",
                self.version
            )));
        }

        let section = &self.parameters;
        let scalars = [
            (Parameter::DeflectionStrength, section.deflection_strength),
            (Parameter::DiskOpacity, section.disk_opacity),
            (Parameter::RotationSpeed, section.rotation_speed),
            (Parameter::PlaybackSpeed, section.playback_speed),
        ];
        for (parameter, value) in scalars {
            let Some(value) = value else { continue };
            let range = parameter.range();
            if !value.is_finite() || !range.contains(value) {
                return Err(ConfigError::Invalid(format!(
                    "parameters.{parameter} must be within {}..={}, got {value}",
                    range.min, range.max
                )));
            }
        }

        if let Some(color) = section.disk_color {
            if color.iter().any(|c| !c.is_finite() || !(0.0..=1.0).contains(c)) {
                return Err(ConfigError::Invalid(format!(
                    "parameters.disk_color channels must be within 0..=1, got {color:?}"
                )));
            }
        }

        if let Some(background) = &self.background {
            if background.path.as_os_str().is_empty() {
                return Err(ConfigError::Invalid(
                    "background.path may not be empty".into(),
                ));
            }
        }

        let ratio = self.display.max_pixel_ratio;
        if !ratio.is_finite() || ratio <= 0.0 || ratio > MAX_SUPPORTED_PIXEL_RATIO {
            return Err(ConfigError::Invalid(format!(
                "display.max_pixel_ratio must be within (0, {MAX_SUPPORTED_PIXEL_RATIO}], got {ratio}"
            )));
        }

        if let Some(fps) = self.display.fps {
            if !fps.is_finite() || fps < 0.0 {
                return Err(ConfigError::Invalid("display.fps must be >= 0".into()));
            }
        }

        for (name, value) in [("width", self.display.width), ("height", self.display.height)] {
            if value == Some(0) {
                return Err(ConfigError::Invalid(format!(
                    "display.{name} must be greater than zero"
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
version = 1
mode = "2D"

[parameters]
deflection_strength = 3.5
disk_opacity = 0.4
rotation_speed = 1.2
disk_color = [0.9, 0.5, 0.1]
annotations = true

[pipeline]
texture_backed = false
speed_controllable = false

[background]
path = "space_8k.jpg"

[display]
max_pixel_ratio = 1.5
antialias = 4
fps = 30
width = 1280
height = 720
"#;

    #[test]
    fn parses_sample_config() {
        let config = SceneConfig::from_toml_str(SAMPLE).expect("parse config");
        assert_eq!(config.mode, SceneMode::Flat);
        assert_eq!(config.parameters.deflection_strength, Some(3.5));
        assert!(!config.pipeline.texture_backed);
        assert!(config.pipeline.annotations);
        assert!(!config.pipeline.speed_controllable);
        assert_eq!(config.display.antialias, Some(AntialiasSetting::Samples4));
        assert_eq!(config.display.width, Some(1280));
        assert_eq!(
            config.background_path(),
            Some(Path::new("space_8k.jpg"))
        );
    }

    #[test]
    fn empty_config_uses_defaults() {
        let config = SceneConfig::from_toml_str("version = 1").unwrap();
        assert_eq!(config.mode, SceneMode::Orbit);
        assert_eq!(config.display.max_pixel_ratio, 2.0);
        assert_eq!(config.pipeline, PipelineSection::default());
        assert!(config.background.is_none());
        assert_eq!(config.lensing_parameters(), LensingParameters::default());
    }

    #[test]
    fn builds_lensing_parameters() {
        let config = SceneConfig::from_toml_str(SAMPLE).unwrap();
        let params = config.lensing_parameters();
        assert_eq!(params.deflection_strength(), 3.5);
        assert_eq!(params.disk_opacity(), 0.4);
        assert_eq!(params.rotation_speed(), 1.2);
        assert!(params.annotations_visible());
    }

    #[test]
    fn rejects_unknown_version() {
        let err = SceneConfig::from_toml_str("version = 2").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_out_of_range_parameters() {
        let config = r#"
version = 1

[parameters]
deflection_strength = 7.0
"#;
        let err = SceneConfig::from_toml_str(config).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(ref msg) if msg.contains("deflection_strength")));
    }

    #[test]
    fn rejects_empty_background_path() {
        let config = r#"
version = 1

[background]
path = ""
"#;
        let err = SceneConfig::from_toml_str(config).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_bad_antialias() {
        let config = r#"
version = 1

[display]
antialias = "lots"
"#;
        let err = SceneConfig::from_toml_str(config).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn serialised_config_parses_back() {
        let config = SceneConfig::from_toml_str(SAMPLE).unwrap();
        let text = config.to_toml_string().unwrap();
        let reparsed = SceneConfig::from_toml_str(&text).unwrap();
        assert_eq!(reparsed, config);
    }

    #[test]
    fn load_resolves_background_relative_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(&path, "version = 1\n[background]\npath = \"sky.png\"\n").unwrap();
        let config = SceneConfig::load(&path).unwrap();
        assert_eq!(config.background_path(), Some(dir.path().join("sky.png").as_path()));
    }

    #[test]
    fn load_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = SceneConfig::load(&dir.path().join("missing.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
