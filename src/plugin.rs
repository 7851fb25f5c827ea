//! Bevy glue: steps the [`Arena`] resource every frame and writes checkpoints.

use std::path::PathBuf;

use bevy::log::{error, info};
use bevy::prelude::*;

use crate::arena::{Arena, TickReport};
use crate::checkpoint::write_archive;

/// Resource to control simulation state
#[derive(Resource, Debug, PartialEq, Eq, Clone, Copy, Default)]
pub enum SimulationState {
    #[default]
    Running,
    Paused,
}

/// How the runner drives the arena.
#[derive(Resource, Debug, Clone)]
pub struct RunSettings {
    /// Stop after this many ticks; 0 runs until the app is closed.
    pub max_ticks: u64,
    pub steps_per_frame: u32,
    pub checkpoint_dir: Option<PathBuf>,
    /// Ticks between checkpoint writes; 0 only writes on exit.
    pub checkpoint_interval: u64,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            max_ticks: 0,
            steps_per_frame: 1,
            checkpoint_dir: None,
            checkpoint_interval: 0,
        }
    }
}

/// Report of the most recent tick, for display.
#[derive(Resource, Debug, Default, Clone, Copy)]
pub struct LastReport(pub TickReport);

/// Runs the simulation inside a bevy app. Expects an [`Arena`] resource to be inserted.
pub struct SimulationPlugin;

impl Plugin for SimulationPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<SimulationState>()
            .init_resource::<RunSettings>()
            .init_resource::<LastReport>()
            .add_systems(
                Update,
                (step_arena, checkpoint_arena)
                    .chain()
                    .run_if(|state: Res<SimulationState>| *state == SimulationState::Running),
            )
            .add_systems(Last, checkpoint_on_exit);
    }
}

fn tick_limit_reached(arena: &Arena, settings: &RunSettings) -> bool {
    settings.max_ticks > 0 && arena.stats().tick >= settings.max_ticks
}

pub fn step_arena(
    mut arena: ResMut<Arena>,
    settings: Res<RunSettings>,
    mut last: ResMut<LastReport>,
    mut exit: EventWriter<AppExit>,
) {
    for _ in 0..settings.steps_per_frame.max(1) {
        if tick_limit_reached(&arena, &settings) {
            return;
        }
        match arena.step() {
            Ok(report) => last.0 = report,
            Err(err) => {
                error!("simulation aborted: {err}");
                exit.send(AppExit::error());
                return;
            }
        }
        if tick_limit_reached(&arena, &settings) {
            info!("reached {} ticks, stopping", settings.max_ticks);
            exit.send(AppExit::Success);
            return;
        }
    }
}

pub fn checkpoint_arena(
    arena: Res<Arena>,
    settings: Res<RunSettings>,
    mut written: Local<u64>,
    mut exit: EventWriter<AppExit>,
) {
    let Some(dir) = &settings.checkpoint_dir else {
        return;
    };
    let interval = settings.checkpoint_interval;
    if interval == 0 {
        return;
    }
    let period = arena.stats().tick / interval;
    if period <= *written {
        return;
    }
    *written = period;
    if let Err(err) = write_archive(dir, arena.archive()) {
        error!("checkpoint failed: {err}");
        exit.send(AppExit::error());
    }
}

pub fn checkpoint_on_exit(
    mut exits: EventReader<AppExit>,
    arena: Option<Res<Arena>>,
    settings: Res<RunSettings>,
) {
    if exits.read().next().is_none() {
        return;
    }
    let (Some(dir), Some(arena)) = (&settings.checkpoint_dir, arena) else {
        return;
    };
    if let Err(err) = write_archive(dir, arena.archive()) {
        error!("final checkpoint failed: {err}");
    }
}
