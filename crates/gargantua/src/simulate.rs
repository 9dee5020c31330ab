//! `gargantua simulate`: the full frame loop against the recording device.

use std::fmt;

use anyhow::{Context, Result};
use lensing::{ManualTimeSource, PlaybackClock};
use renderer::{FrameOutcome, HeadlessDevice, ModeCoordinator, RenderContext, RenderDevice, RenderMode};

use crate::cli::SimulateArgs;
use crate::settings::Settings;

#[derive(Debug, Clone, PartialEq)]
pub struct SimulationSummary {
    pub frames: u64,
    pub presented: u64,
    pub draws: usize,
    pub switches: u64,
    pub final_mode: Option<RenderMode>,
    pub live_resources: Vec<String>,
    pub leaked_after_shutdown: usize,
}

impl fmt::Display for SimulationSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "frames: {}", self.frames)?;
        writeln!(f, "presented: {}", self.presented)?;
        writeln!(f, "draws: {}", self.draws)?;
        writeln!(f, "mode switches: {}", self.switches)?;
        match self.final_mode {
            Some(mode) => writeln!(f, "final mode: {mode}")?,
            None => writeln!(f, "final mode: inactive")?,
        }
        writeln!(f, "live resources: {}", self.live_resources.len())?;
        for label in &self.live_resources {
            writeln!(f, "  {label}")?;
        }
        writeln!(f, "leaked after shutdown: {}", self.leaked_after_shutdown)
    }
}

pub fn run(settings: &Settings, args: &SimulateArgs) -> Result<SimulationSummary> {
    let (width, height) = settings.size;
    let clock = PlaybackClock::new(Box::new(ManualTimeSource::new(args.step)));
    let context = RenderContext::new(HeadlessDevice::new(width, height), clock, settings.viewport)
        .with_parameters(settings.params.clone())
        .with_options(settings.options)
        .with_background(settings.background_source());
    let mut coordinator = ModeCoordinator::new(context);
    coordinator
        .resize(width, height, 1.0)
        .context("failed to size the headless device")?;
    coordinator
        .activate(settings.mode)
        .context("failed to activate the initial mode")?;

    let mut draws = 0;
    let mut switches = 0;
    for frame in 0..args.frames {
        if let Some(every) = args.toggle_every.filter(|every| *every > 0) {
            if frame > 0 && frame % every == 0 {
                coordinator.toggle().context("mode switch failed")?;
                switches += 1;
            }
        }
        if let FrameOutcome::Presented { drawn } = coordinator.tick().context("frame failed")? {
            draws += drawn;
        }
    }

    let final_mode = coordinator.mode();
    let live_resources = coordinator
        .device()
        .live_inventory()
        .into_iter()
        .map(|(kind, label)| format!("{kind:?} {label}"))
        .collect();
    let presented = coordinator.device().presented_frames();
    coordinator.shutdown();
    let leaked_after_shutdown = coordinator.device().live_count();
    tracing::info!(frames = args.frames, presented, switches, "simulation finished");

    Ok(SimulationSummary {
        frames: args.frames,
        presented,
        draws,
        switches,
        final_mode,
        live_resources,
        leaked_after_shutdown,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use sceneconfig::SceneConfig;

    fn settings(mode: RenderMode) -> Settings {
        let mut settings = Settings::from_scene(&SceneConfig::default());
        settings.mode = mode;
        settings.size = (320, 180);
        settings
    }

    fn args(frames: u64, toggle_every: Option<u64>) -> SimulateArgs {
        SimulateArgs {
            frames,
            toggle_every,
            step: 1.0 / 60.0,
        }
    }

    #[test]
    fn orbit_simulation_draws_all_layers() {
        let summary = run(&settings(RenderMode::Orbit), &args(10, None)).unwrap();
        assert_eq!(summary.presented, 10);
        assert_eq!(summary.draws, 40);
        assert_eq!(summary.final_mode, Some(RenderMode::Orbit));
        assert_eq!(summary.leaked_after_shutdown, 0);
    }

    #[test]
    fn toggling_alternates_modes_without_leaks() {
        let summary = run(&settings(RenderMode::Flat), &args(9, Some(3))).unwrap();
        assert_eq!(summary.switches, 2);
        assert_eq!(summary.final_mode, Some(RenderMode::Flat));
        assert!(summary.live_resources.iter().all(|label| label.contains("lens-quad")));
        assert_eq!(summary.leaked_after_shutdown, 0);
    }
}
