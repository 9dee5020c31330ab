use anyhow::{Context, Result};
use lensing::PlaybackClock;
use renderer::{run_window, WindowConfig};
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command};
use crate::paths::AppPaths;
use crate::settings::{apply_overrides, load_scene, Settings};
use crate::simulate;

pub fn run(args: Cli) -> Result<()> {
    initialise_tracing();

    let paths = AppPaths::discover()?;
    tracing::debug!(config = %paths.config_dir().display(), "resolved gargantua paths");
    let (mut scene, source) = load_scene(args.config.as_deref(), &paths)?;
    apply_overrides(&mut scene, &args.overrides)?;
    tracing::debug!(%source, "scene configuration loaded");

    match args.command.unwrap_or(Command::Run) {
        Command::Config => {
            let rendered = scene
                .to_toml_string()
                .context("failed to render configuration")?;
            println!("# source: {source}");
            print!("{rendered}");
            Ok(())
        }
        Command::Simulate(simulate_args) => {
            let settings = Settings::from_scene(&scene);
            let summary = simulate::run(&settings, &simulate_args)?;
            print!("{summary}");
            Ok(())
        }
        Command::Run => run_interactive(Settings::from_scene(&scene)),
    }
}

fn initialise_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn run_interactive(settings: Settings) -> Result<()> {
    tracing::info!(
        mode = %settings.mode,
        width = settings.size.0,
        height = settings.size.1,
        background = ?settings.background,
        "starting gargantua"
    );
    let background = settings.background_source();
    let config = WindowConfig {
        size: settings.size,
        mode: settings.mode,
        target_fps: settings.target_fps,
        antialiasing: settings.antialiasing,
        viewport: settings.viewport,
        params: settings.params,
        options: settings.options,
        background,
        ..WindowConfig::default()
    };
    run_window(config, PlaybackClock::system())
}
