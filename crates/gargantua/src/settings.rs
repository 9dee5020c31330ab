//! Scene file discovery and the merge of file values with CLI overrides.

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use lensing::{LensingParameters, ViewportConfig};
use renderer::{Antialiasing, BackgroundSource, PipelineOptions, RenderMode};
use sceneconfig::{AntialiasSetting, BackgroundSection, SceneConfig, SceneMode};

use crate::cli::Overrides;
use crate::paths::AppPaths;

const DEFAULT_WINDOW_SIZE: (u32, u32) = (1280, 720);

/// Where the scene configuration came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    File(PathBuf),
    Defaults,
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigSource::File(path) => write!(f, "{}", path.display()),
            ConfigSource::Defaults => f.write_str("built-in defaults"),
        }
    }
}

/// Loads `explicit` if given (it must exist), otherwise the scene file in the
/// config directory when present, otherwise the defaults.
pub fn load_scene(explicit: Option<&Path>, paths: &AppPaths) -> Result<(SceneConfig, ConfigSource)> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => {
            let discovered = paths.scene_file();
            if !discovered.is_file() {
                tracing::debug!(path = %discovered.display(), "no scene file; using defaults");
                return Ok((SceneConfig::default(), ConfigSource::Defaults));
            }
            discovered
        }
    };
    let config = SceneConfig::load(&path)
        .with_context(|| format!("failed to load scene configuration {}", path.display()))?;
    Ok((config, ConfigSource::File(path)))
}

/// Applies command-line flags on top of the file values and revalidates.
pub fn apply_overrides(config: &mut SceneConfig, overrides: &Overrides) -> Result<()> {
    if let Some(mode) = overrides.mode {
        config.mode = match mode {
            RenderMode::Flat => SceneMode::Flat,
            RenderMode::Orbit => SceneMode::Orbit,
        };
    }
    if let Some((width, height)) = overrides.size {
        config.display.width = Some(width);
        config.display.height = Some(height);
    }
    if let Some(fps) = overrides.fps {
        config.display.fps = Some(fps);
    }
    if let Some(antialias) = overrides.antialias {
        config.display.antialias = Some(antialias);
    }
    if let Some(ratio) = overrides.max_pixel_ratio {
        config.display.max_pixel_ratio = ratio;
    }
    if let Some(path) = overrides.background.as_ref() {
        config.background = Some(BackgroundSection { path: path.clone() });
        config.pipeline.texture_backed = true;
    }
    if overrides.procedural {
        config.background = None;
        config.pipeline.texture_backed = false;
    }
    config.validate().context("invalid command-line override")?;
    Ok(())
}

/// Renderer-facing view of a resolved [`SceneConfig`].
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub mode: RenderMode,
    pub params: LensingParameters,
    pub options: PipelineOptions,
    pub background: Option<PathBuf>,
    pub antialiasing: Antialiasing,
    pub size: (u32, u32),
    pub target_fps: Option<f32>,
    pub viewport: ViewportConfig,
}

impl Settings {
    pub fn from_scene(config: &SceneConfig) -> Self {
        let display = &config.display;
        let background = config.background_path().map(Path::to_path_buf);
        let options = PipelineOptions {
            // Without a file there is nothing to sample.
            texture_backed: config.pipeline.texture_backed && background.is_some(),
            annotations: config.pipeline.annotations,
            speed_controllable: config.pipeline.speed_controllable,
        };
        Self {
            mode: match config.mode {
                SceneMode::Flat => RenderMode::Flat,
                SceneMode::Orbit => RenderMode::Orbit,
            },
            params: config.lensing_parameters(),
            options,
            background,
            antialiasing: map_antialias(display.antialias),
            size: (
                display.width.unwrap_or(DEFAULT_WINDOW_SIZE.0),
                display.height.unwrap_or(DEFAULT_WINDOW_SIZE.1),
            ),
            target_fps: display.fps.filter(|fps| *fps > 0.0),
            viewport: ViewportConfig::default().with_max_pixel_ratio(display.max_pixel_ratio),
        }
    }

    pub fn background_source(&self) -> BackgroundSource {
        match (&self.background, self.options.texture_backed) {
            (Some(path), true) => BackgroundSource::File(path.clone()),
            _ => BackgroundSource::Procedural,
        }
    }
}

fn map_antialias(setting: Option<AntialiasSetting>) -> Antialiasing {
    match setting {
        None | Some(AntialiasSetting::Auto) => Antialiasing::Auto,
        Some(AntialiasSetting::Off) => Antialiasing::Off,
        Some(other) => other
            .samples()
            .map(Antialiasing::Samples)
            .unwrap_or(Antialiasing::Auto),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn overrides_replace_file_values() {
        let mut config = SceneConfig::from_toml_str(
            r#"
version = 1
mode = "3d"

[background]
path = "sky.png"

[display]
antialias = 4
"#,
        )
        .unwrap();
        let overrides = Overrides {
            mode: Some(RenderMode::Flat),
            size: Some((800, 600)),
            procedural: true,
            ..Overrides::default()
        };
        apply_overrides(&mut config, &overrides).unwrap();
        let settings = Settings::from_scene(&config);
        assert_eq!(settings.mode, RenderMode::Flat);
        assert_eq!(settings.size, (800, 600));
        assert_eq!(settings.antialiasing, Antialiasing::Samples(4));
        assert!(!settings.options.texture_backed);
        assert!(matches!(settings.background_source(), BackgroundSource::Procedural));
    }

    #[test]
    fn invalid_override_is_rejected() {
        let mut config = SceneConfig::default();
        let overrides = Overrides {
            max_pixel_ratio: Some(-1.0),
            ..Overrides::default()
        };
        assert!(apply_overrides(&mut config, &overrides).is_err());
    }

    #[test]
    fn missing_background_falls_back_to_procedural() {
        let settings = Settings::from_scene(&SceneConfig::default());
        assert!(!settings.options.texture_backed);
        assert_eq!(settings.mode, RenderMode::Orbit);
        assert_eq!(settings.size, DEFAULT_WINDOW_SIZE);
        assert_eq!(settings.target_fps, None);
    }

    #[test]
    fn explicit_config_must_exist() {
        let root = TempDir::new().unwrap();
        let paths = AppPaths::from_config_dir(root.path().to_path_buf());
        assert!(load_scene(Some(&root.path().join("missing.toml")), &paths).is_err());

        let (config, source) = load_scene(None, &paths).unwrap();
        assert_eq!(source, ConfigSource::Defaults);
        assert_eq!(config, SceneConfig::default());

        fs::write(paths.scene_file(), "version = 1\nmode = \"2d\"\n").unwrap();
        let (config, source) = load_scene(None, &paths).unwrap();
        assert_eq!(source, ConfigSource::File(paths.scene_file()));
        assert_eq!(config.mode, SceneMode::Flat);
    }
}
