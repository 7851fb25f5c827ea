use bevy::prelude::*;
use bevy::window::PrimaryWindow;
use goopies::Arena;
use goopies::config::SELECTION_MARGIN;
use goopies::goopie::GoopieKey;

use crate::render::GoopieSprite;

/// Marker component for the currently selected goopie sprite
#[derive(Component)]
pub struct Selected;

/// Resource to track the currently selected goopie
#[derive(Resource, Default)]
pub struct SelectedGoopie {
    pub entity: Option<Entity>,
    pub key: Option<GoopieKey>,
}

/// Left click selects the goopie under the cursor, or clears the selection.
pub fn handle_selection(
    mouse_button: Res<ButtonInput<MouseButton>>,
    windows: Query<&Window, With<PrimaryWindow>>,
    camera_query: Query<(&Camera, &GlobalTransform)>,
    arena: Res<Arena>,
    mut selected: ResMut<SelectedGoopie>,
    mut commands: Commands,
    sprites: Query<(Entity, &GoopieSprite, &Transform)>,
    currently_selected: Query<Entity, With<Selected>>,
) {
    if !mouse_button.just_pressed(MouseButton::Left) {
        return;
    }
    let (Ok(window), Ok((camera, camera_transform))) =
        (windows.get_single(), camera_query.get_single())
    else {
        return;
    };
    let Some(cursor_pos) = window.cursor_position() else {
        return;
    };
    let Ok(world_pos) = camera.viewport_to_world_2d(camera_transform, cursor_pos) else {
        return;
    };

    let reach = arena.config().goopie_radius + SELECTION_MARGIN;
    let closest = sprites
        .iter()
        .map(|(entity, sprite, transform)| {
            (entity, sprite.0, world_pos.distance(transform.translation.truncate()))
        })
        .filter(|(_, _, distance)| *distance <= reach)
        .min_by(|a, b| a.2.total_cmp(&b.2));

    for entity in currently_selected.iter() {
        commands.entity(entity).remove::<Selected>();
    }

    match closest {
        Some((entity, key, _)) => {
            commands.entity(entity).insert(Selected);
            selected.entity = Some(entity);
            selected.key = Some(key);
        }
        None => {
            selected.entity = None;
            selected.key = None;
        }
    }
}

/// Drop the selection once its goopie has died.
pub fn clear_dead_selection(arena: Res<Arena>, mut selected: ResMut<SelectedGoopie>) {
    if selected.key.is_some_and(|key| !arena.goopies().contains_key(key)) {
        selected.entity = None;
        selected.key = None;
    }
}
