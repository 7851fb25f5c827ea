//! Mirrors arena state into sprites. Never writes to the arena.

use std::collections::HashSet;

use bevy::prelude::*;
use goopies::Arena;
use goopies::food::FoodKey;
use goopies::goopie::GoopieKey;

#[derive(Component)]
pub struct GoopieSprite(pub GoopieKey);

#[derive(Component)]
pub struct FoodSprite(pub FoodKey);

#[derive(Resource)]
pub struct SpriteAssets {
    goopie_mesh: Handle<Mesh>,
    goopie_material: Handle<ColorMaterial>,
    eye_mesh: Handle<Mesh>,
    eye_material: Handle<ColorMaterial>,
    food_mesh: Handle<Mesh>,
    food_material: Handle<ColorMaterial>,
}

pub fn setup_sprites(
    mut commands: Commands,
    arena: Res<Arena>,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<ColorMaterial>>,
) {
    let config = arena.config();
    let goopie_radius = config.goopie_radius;
    commands.insert_resource(SpriteAssets {
        goopie_mesh: meshes.add(Circle::new(goopie_radius)),
        goopie_material: materials.add(ColorMaterial::from_color(Color::srgb(0.3, 0.6, 1.0))),
        eye_mesh: meshes.add(Circle::new(goopie_radius * 0.25)),
        eye_material: materials.add(ColorMaterial::from_color(Color::srgb(0.05, 0.05, 0.15))),
        food_mesh: meshes.add(Circle::new(config.food_radius)),
        food_material: materials.add(ColorMaterial::from_color(Color::srgb(0.2, 0.8, 0.2))),
    });

    let wall_material = materials.add(ColorMaterial::from_color(Color::srgb(0.6, 0.6, 0.6)));
    for wall in arena.walls() {
        let span = wall.b - wall.a;
        let centre = (wall.a + wall.b) / 2.0;
        commands.spawn((
            Mesh2d(meshes.add(Rectangle::new(span.length(), wall.thickness * 2.0))),
            MeshMaterial2d(wall_material.clone()),
            Transform::from_translation(centre.extend(-1.0))
                .with_rotation(Quat::from_rotation_z(span.to_angle())),
        ));
    }
}

/// Spawn sprites for new goopies, move existing ones and drop the dead.
pub fn sync_goopies(
    mut commands: Commands,
    arena: Res<Arena>,
    assets: Res<SpriteAssets>,
    mut sprites: Query<(Entity, &GoopieSprite, &mut Transform)>,
) {
    let mut shown = HashSet::new();
    for (entity, sprite, mut transform) in sprites.iter_mut() {
        let body = arena
            .goopies()
            .get(sprite.0)
            .and_then(|goopie| arena.body(goopie.body));
        match body {
            Some(body) => {
                transform.translation = body.position.extend(1.0);
                transform.rotation = Quat::from_rotation_z(body.angle);
                shown.insert(sprite.0);
            }
            None => commands.entity(entity).despawn_recursive(),
        }
    }

    for (key, goopie) in arena.goopies() {
        if shown.contains(&key) {
            continue;
        }
        let Some(body) = arena.body(goopie.body) else {
            continue;
        };
        let eye_offset = goopie.radius * 0.6;
        commands
            .spawn((
                GoopieSprite(key),
                Mesh2d(assets.goopie_mesh.clone()),
                MeshMaterial2d(assets.goopie_material.clone()),
                Transform::from_translation(body.position.extend(1.0))
                    .with_rotation(Quat::from_rotation_z(body.angle)),
            ))
            .with_children(|parent| {
                // Marks the heading.
                parent.spawn((
                    Mesh2d(assets.eye_mesh.clone()),
                    MeshMaterial2d(assets.eye_material.clone()),
                    Transform::from_xyz(eye_offset, 0.0, 0.1),
                ));
            });
    }
}

/// Food never moves, so only spawn and despawn.
pub fn sync_food(
    mut commands: Commands,
    arena: Res<Arena>,
    assets: Res<SpriteAssets>,
    sprites: Query<(Entity, &FoodSprite)>,
) {
    let mut shown = HashSet::new();
    for (entity, sprite) in sprites.iter() {
        if arena.foods().contains_key(sprite.0) {
            shown.insert(sprite.0);
        } else {
            commands.entity(entity).despawn();
        }
    }

    for (key, food) in arena.foods() {
        if shown.contains(&key) {
            continue;
        }
        let Some(body) = arena.body(food.body) else {
            continue;
        };
        commands.spawn((
            FoodSprite(key),
            Mesh2d(assets.food_mesh.clone()),
            MeshMaterial2d(assets.food_material.clone()),
            Transform::from_translation(body.position.extend(0.0)),
        ));
    }
}
