use std::path::PathBuf;

use clap::{Parser, Subcommand};
use renderer::RenderMode;
use sceneconfig::AntialiasSetting;

#[derive(Parser, Debug)]
#[command(
    name = "gargantua",
    author,
    version,
    about = "Real-time gravitational lensing renderer",
    arg_required_else_help = false
)]
pub struct Cli {
    /// Scene configuration file (defaults to `scene.toml` in the config directory).
    #[arg(long, global = true, value_name = "PATH", env = "GARGANTUA_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(flatten)]
    pub overrides: Overrides,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Flags that override values from the scene file.
#[derive(Parser, Debug, Default, Clone)]
pub struct Overrides {
    /// Initial view: `2d` (lensed background) or `3d` (orbiting scene).
    #[arg(long, global = true, value_name = "MODE", value_parser = parse_mode)]
    pub mode: Option<RenderMode>,

    /// Window size (e.g. `1280x720`).
    #[arg(long, global = true, value_name = "WIDTHxHEIGHT", value_parser = parse_size)]
    pub size: Option<(u32, u32)>,

    /// Frame cap for the preview window (0 = every vsync).
    #[arg(long, global = true, value_name = "FPS")]
    pub fps: Option<f32>,

    /// Anti-aliasing policy: `auto`, `off`, or an MSAA sample count (2, 4, 8).
    #[arg(long, global = true, value_name = "MODE")]
    pub antialias: Option<AntialiasSetting>,

    /// Background panorama for the 2D view.
    #[arg(long, global = true, value_name = "PATH", conflicts_with = "procedural")]
    pub background: Option<PathBuf>,

    /// Draw the procedural star field instead of a background image.
    #[arg(long, global = true)]
    pub procedural: bool,

    /// Upper bound on the device pixel ratio used for rendering.
    #[arg(long, global = true, value_name = "RATIO")]
    pub max_pixel_ratio: Option<f32>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Open the interactive window (default).
    Run,
    /// Drive the frame loop on a headless device and print a summary.
    Simulate(SimulateArgs),
    /// Print the resolved configuration as TOML.
    Config,
}

#[derive(Parser, Debug, Clone)]
pub struct SimulateArgs {
    /// Number of frames to run.
    #[arg(long, value_name = "N", default_value_t = 120)]
    pub frames: u64,

    /// Switch between 2D and 3D every K frames.
    #[arg(long, value_name = "K")]
    pub toggle_every: Option<u64>,

    /// Simulated seconds per frame.
    #[arg(long, value_name = "SECONDS", default_value_t = 1.0 / 60.0)]
    pub step: f64,
}

pub fn parse() -> Cli {
    Cli::parse()
}

pub fn parse_mode(value: &str) -> Result<RenderMode, String> {
    value.parse()
}

pub fn parse_size(value: &str) -> Result<(u32, u32), String> {
    let trimmed = value.trim();
    let (width, height) = trimmed
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("invalid size '{trimmed}'; expected WIDTHxHEIGHT"))?;
    let width: u32 = width
        .trim()
        .parse()
        .map_err(|_| format!("invalid width in '{trimmed}'"))?;
    let height: u32 = height
        .trim()
        .parse()
        .map_err(|_| format!("invalid height in '{trimmed}'"))?;
    if width == 0 || height == 0 {
        return Err(format!("size must be non-zero, got {width}x{height}"));
    }
    Ok((width, height))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_parses_width_and_height() {
        assert_eq!(parse_size("1280x720"), Ok((1280, 720)));
        assert_eq!(parse_size(" 800X600 "), Ok((800, 600)));
        assert!(parse_size("1280").is_err());
        assert!(parse_size("0x720").is_err());
    }

    #[test]
    fn simulate_flags_parse() {
        let cli = Cli::try_parse_from([
            "gargantua",
            "simulate",
            "--frames",
            "30",
            "--mode",
            "2d",
            "--toggle-every",
            "10",
        ])
        .unwrap();
        assert_eq!(cli.overrides.mode, Some(RenderMode::Flat));
        match cli.command {
            Some(Command::Simulate(args)) => {
                assert_eq!(args.frames, 30);
                assert_eq!(args.toggle_every, Some(10));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn background_conflicts_with_procedural() {
        let result = Cli::try_parse_from(["gargantua", "--background", "sky.png", "--procedural"]);
        assert!(result.is_err());
    }
}
