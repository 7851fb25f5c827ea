use bevy::prelude::*;
use bevy_egui::{EguiContexts, egui};
use goopies::Arena;
use goopies::plugin::{LastReport, SimulationState};
use goopies::vision::{Channel, Vision};

use crate::camera::CameraState;
use crate::selection::SelectedGoopie;

fn channel_color(channel: Channel, value: f32) -> egui::Color32 {
    let level = (value.clamp(0.0, 1.0) * 255.0) as u8;
    match channel {
        Channel::Wall => egui::Color32::from_rgb(level, level, level),
        Channel::Goopie => egui::Color32::from_rgb(level / 3, level / 2, level),
        Channel::Food => egui::Color32::from_rgb(level / 4, level, level / 4),
    }
}

pub fn ui_system(
    mut contexts: EguiContexts,
    arena: Res<Arena>,
    last: Res<LastReport>,
    camera_state: Res<CameraState>,
    mut simulation_state: ResMut<SimulationState>,
    selected: Res<SelectedGoopie>,
) {
    let stats = arena.stats();
    egui::Window::new("Simulation Info")
        .default_pos(egui::pos2(10.0, 10.0))
        .show(contexts.ctx_mut(), |ui| {
            ui.horizontal(|ui| {
                let running = *simulation_state == SimulationState::Running;
                if ui.button(if running { "⏸ Pause" } else { "▶ Resume" }).clicked() {
                    *simulation_state = if running {
                        SimulationState::Paused
                    } else {
                        SimulationState::Running
                    };
                }
                ui.label(format!("State: {}", if running { "Running" } else { "Paused" }));
            });

            ui.separator();
            ui.heading("Population");
            ui.label(format!("Tick: {}", stats.tick));
            ui.label(format!("Goopies: {}", stats.population));
            ui.label(format!("Food: {}", stats.food));
            ui.label(format!("Biomass: {:.2}", arena.biomass()));
            ui.label(format!("Births: {}  Deaths: {}", stats.births, stats.deaths));
            ui.label(format!(
                "Last tick: +{} born, {} died, {} eaten, {} respawned",
                last.0.births, last.0.deaths, last.0.eaten, last.0.respawned
            ));

            ui.separator();
            ui.heading("Archive");
            ui.label(format!("Entries: {} / {}", stats.archive_len, arena.archive().capacity()));
            ui.label(format!("Best fitness: {:.3}", stats.best_fitness));
            ui.label(format!("Mean fitness: {:.3}", stats.mean_archive_fitness));
            ui.label(format!("Threshold: {:.3}", stats.fitness_threshold));

            ui.separator();
            ui.label(format!("Zoom: {:.2}x", camera_state.zoom));
            ui.label("Mouse wheel: zoom, middle drag: pan");
            ui.label("Left click: select, F: follow selection");
        });

    let Some(goopie) = selected.key.and_then(|key| arena.goopies().get(key)) else {
        return;
    };
    egui::Window::new("Selected Goopie")
        .default_pos(egui::pos2(10.0, 420.0))
        .show(contexts.ctx_mut(), |ui| {
            ui.add(
                egui::ProgressBar::new(goopie.energy.clamp(0.0, 1.0))
                    .text(format!("Energy {:.3}", goopie.energy)),
            );
            ui.label(format!("Age: {:.2}s", goopie.age));
            ui.label(format!("Fitness: {:.3}", goopie.fitness));
            ui.label(format!("Generation: {}", goopie.generation));
            if let Some(body) = arena.body(goopie.body) {
                ui.label(format!("Position: ({:.1}, {:.1})", body.position.x, body.position.y));
                ui.label(format!("Heading: {:.1}°", body.angle.to_degrees()));
                ui.label(format!("Speed: {:.1}", body.velocity.length()));
            }
            let command = goopie.last_command();
            ui.label(format!("Turn {:+.2}  Thrust {:+.2}", command.turn, command.thrust));

            ui.separator();
            ui.heading("Perception");
            if let Vision::Closest(closest) = &goopie.vision {
                for channel in Channel::ALL {
                    match closest.nearest(channel) {
                        Some(sighting) => ui.label(format!(
                            "{channel:?}: {:.1} away at {:+.1}°",
                            sighting.distance,
                            sighting.bearing.to_degrees()
                        )),
                        None => ui.label(format!("{channel:?}: none")),
                    };
                }
            }
            let perception = goopie.perception();
            for channel in Channel::ALL {
                ui.horizontal(|ui| {
                    ui.monospace(format!("{:<6}", format!("{channel:?}")));
                    for value in perception.channel(channel) {
                        let (rect, _) =
                            ui.allocate_exact_size(egui::vec2(16.0, 16.0), egui::Sense::hover());
                        ui.painter().rect_filled(rect, 2.0, channel_color(channel, *value));
                    }
                });
            }
        });
}
