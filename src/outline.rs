use bevy::prelude::*;
use goopies::Arena;

use crate::selection::Selected;

/// Vision ring drawn around a selected goopie
#[derive(Component)]
pub struct VisionRing {
    pub parent: Entity,
}

/// Add a ring at the sensor radius to newly selected goopies and remove rings whose
/// goopie was deselected or despawned.
pub fn manage_vision_rings(
    mut commands: Commands,
    arena: Res<Arena>,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<ColorMaterial>>,
    added_selection: Query<(Entity, &Transform), Added<Selected>>,
    mut removed_selection: RemovedComponents<Selected>,
    rings: Query<(Entity, &VisionRing)>,
) {
    let vision_radius = arena.config().vision_radius;
    for (entity, transform) in added_selection.iter() {
        commands.spawn((
            VisionRing { parent: entity },
            Mesh2d(meshes.add(Annulus::new(vision_radius - 2.0, vision_radius))),
            MeshMaterial2d(materials.add(ColorMaterial::from_color(Color::srgba(1.0, 1.0, 0.0, 0.6)))),
            Transform::from_xyz(transform.translation.x, transform.translation.y, 2.0),
        ));
    }

    for removed_entity in removed_selection.read() {
        for (ring_entity, ring) in rings.iter() {
            if ring.parent == removed_entity {
                commands.entity(ring_entity).despawn();
            }
        }
    }
}

pub fn update_ring_positions(
    selected_entities: Query<&Transform, With<Selected>>,
    mut rings: Query<(&VisionRing, &mut Transform), Without<Selected>>,
) {
    for (ring, mut ring_transform) in rings.iter_mut() {
        if let Ok(parent_transform) = selected_entities.get(ring.parent) {
            ring_transform.translation.x = parent_transform.translation.x;
            ring_transform.translation.y = parent_transform.translation.y;
        }
    }
}
