mod camera;
mod outline;
mod render;
mod selection;
mod ui;

use std::path::{Path, PathBuf};
use std::time::Duration;

use bevy::app::ScheduleRunnerPlugin;
use bevy::log::LogPlugin;
use bevy::prelude::*;
use bevy_egui::EguiPlugin;
use clap::{Parser, ValueEnum};
use goopies::archive::Archive;
use goopies::checkpoint::read_archive;
use goopies::{Arena, RunSettings, SimulationConfig, SimulationError, SimulationPlugin, VisionKind};

use camera::{CameraState, camera_follow, camera_pan, camera_zoom, setup_camera};
use outline::{manage_vision_rings, update_ring_positions};
use render::{setup_sprites, sync_food, sync_goopies};
use selection::{SelectedGoopie, clear_dead_selection, handle_selection};
use ui::ui_system;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum VisionArg {
    Wide,
    Closest,
}

impl From<VisionArg> for VisionKind {
    fn from(arg: VisionArg) -> Self {
        match arg {
            VisionArg::Wide => VisionKind::Wide,
            VisionArg::Closest => VisionKind::Closest,
        }
    }
}

/// Evolving goopies in a bounded arena.
#[derive(Debug, Parser)]
#[command(name = "goopies", version)]
struct Cli {
    /// Run without a window
    #[arg(long)]
    headless: bool,
    /// Seed for a reproducible run
    #[arg(long)]
    seed: Option<u64>,
    /// Initial population, also used as the population floor
    #[arg(long)]
    goopies: Option<usize>,
    /// Initial food items
    #[arg(long)]
    food: Option<usize>,
    /// Half extent of the arena
    #[arg(long)]
    space_size: Option<f32>,
    /// Stop after this many ticks (0 runs forever)
    #[arg(long, default_value_t = 0)]
    ticks: u64,
    /// Simulation ticks per rendered frame
    #[arg(long, default_value_t = 1)]
    steps_per_frame: u32,
    /// JSON file with simulation settings
    #[arg(long)]
    config: Option<PathBuf>,
    /// Directory the archive is written to
    #[arg(long)]
    checkpoint_dir: Option<PathBuf>,
    /// Ticks between checkpoints (0 writes only on exit)
    #[arg(long, default_value_t = 0)]
    checkpoint_interval: u64,
    /// Seed the archive from a checkpoint directory
    #[arg(long)]
    resume: Option<PathBuf>,
    #[arg(long, value_enum)]
    vision: Option<VisionArg>,
}

fn read_config_file(path: &Path) -> Result<SimulationConfig, SimulationError> {
    let text = std::fs::read_to_string(path).map_err(|source| SimulationError::ReadConfig {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| SimulationError::ParseConfig {
        path: path.to_path_buf(),
        source,
    })
}

/// Defaults, then the config file, then command line flags.
fn load_config(cli: &Cli) -> Result<SimulationConfig, SimulationError> {
    let mut config = match &cli.config {
        Some(path) => read_config_file(path)?,
        None => SimulationConfig::default(),
    };
    if let Some(seed) = cli.seed {
        config.seed = Some(seed);
    }
    if let Some(goopies) = cli.goopies {
        config.initial_goopies = goopies;
        config.min_population = goopies;
    }
    if let Some(food) = cli.food {
        config.initial_food = food;
    }
    if let Some(space_size) = cli.space_size {
        config.space_size = space_size;
    }
    if let Some(vision) = cli.vision {
        config.vision = vision.into();
    }
    config.validate()?;
    Ok(config)
}

fn build_app(cli: &Cli) -> Result<App, SimulationError> {
    let config = load_config(cli)?;

    let mut app = App::new();
    if cli.headless {
        app.add_plugins((
            MinimalPlugins.set(ScheduleRunnerPlugin::run_loop(Duration::ZERO)),
            LogPlugin::default(),
        ));
    } else {
        app.add_plugins(DefaultPlugins.set(WindowPlugin {
            primary_window: Some(Window {
                title: "Goopies".to_string(),
                resolution: (1280.0, 720.0).into(),
                ..default()
            }),
            ..default()
        }))
        .add_plugins(EguiPlugin)
        .init_resource::<CameraState>()
        .init_resource::<SelectedGoopie>()
        .add_systems(Startup, (setup_camera, setup_sprites))
        .add_systems(
            Update,
            (
                // Viewer systems run even while paused.
                camera_zoom,
                camera_pan,
                (sync_goopies, sync_food, handle_selection, clear_dead_selection).chain(),
                manage_vision_rings,
                update_ring_positions,
                camera_follow,
                ui_system,
            )
                .after(goopies::plugin::step_arena),
        );
    }

    // Built after the log plugin so construction is logged.
    let archive = match &cli.resume {
        Some(dir) => read_archive(dir, config.archive_capacity)?,
        None => Archive::new(config.archive_capacity),
    };
    let arena = Arena::with_archive(config, archive)?;

    app.insert_resource(arena)
        .insert_resource(RunSettings {
            max_ticks: cli.ticks,
            steps_per_frame: cli.steps_per_frame,
            checkpoint_dir: cli.checkpoint_dir.clone(),
            checkpoint_interval: cli.checkpoint_interval,
        })
        .add_plugins(SimulationPlugin);
    Ok(app)
}

fn main() -> AppExit {
    let cli = Cli::parse();
    match build_app(&cli) {
        Ok(mut app) => app.run(),
        Err(err) => {
            eprintln!("goopies: {err}");
            AppExit::error()
        }
    }
}
