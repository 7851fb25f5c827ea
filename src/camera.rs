use bevy::input::mouse::{MouseMotion, MouseWheel};
use bevy::prelude::*;
use bevy::window::PrimaryWindow;
use goopies::Arena;
use goopies::config::{MAX_ZOOM, MIN_ZOOM, ZOOM_STEP};

use crate::render::GoopieSprite;
use crate::selection::Selected;

#[derive(Component)]
pub struct MainCamera;

#[derive(Resource)]
pub struct CameraState {
    pub zoom: f32,
    pub position: Vec2,
    pub is_panning: bool,
    /// Keep the selected goopie centred.
    pub follow: bool,
}

impl Default for CameraState {
    fn default() -> Self {
        Self {
            zoom: 1.0,
            position: Vec2::ZERO,
            is_panning: false,
            follow: false,
        }
    }
}

/// Spawn the camera zoomed out far enough to show the whole arena.
pub fn setup_camera(
    mut commands: Commands,
    arena: Res<Arena>,
    windows: Query<&Window, With<PrimaryWindow>>,
    mut camera_state: ResMut<CameraState>,
) {
    let extent = arena.config().space_size + arena.config().wall_thickness;
    let height = windows.get_single().map_or(720.0, |window| window.height());
    camera_state.zoom = (2.2 * extent / height).clamp(MIN_ZOOM, MAX_ZOOM);

    commands.spawn((
        Camera2d,
        MainCamera,
        Transform::from_xyz(0.0, 0.0, 0.0),
        OrthographicProjection {
            scale: camera_state.zoom,
            ..OrthographicProjection::default_2d()
        },
    ));
}

pub fn camera_zoom(
    mut scroll_events: EventReader<MouseWheel>,
    mut camera_state: ResMut<CameraState>,
    mut query: Query<&mut OrthographicProjection, With<MainCamera>>,
) {
    for event in scroll_events.read() {
        let factor = 1.0 - event.y.clamp(-3.0, 3.0) * ZOOM_STEP;
        camera_state.zoom = (camera_state.zoom * factor).clamp(MIN_ZOOM, MAX_ZOOM);

        if let Ok(mut projection) = query.get_single_mut() {
            projection.scale = camera_state.zoom;
        }
    }
}

pub fn camera_pan(
    mouse_button: Res<ButtonInput<MouseButton>>,
    mut motion_events: EventReader<MouseMotion>,
    mut camera_state: ResMut<CameraState>,
    mut query: Query<&mut Transform, With<MainCamera>>,
) {
    if mouse_button.just_pressed(MouseButton::Middle) {
        camera_state.is_panning = true;
        camera_state.follow = false;
    }
    if mouse_button.just_released(MouseButton::Middle) {
        camera_state.is_panning = false;
    }

    if !camera_state.is_panning {
        motion_events.clear();
        return;
    }
    for event in motion_events.read() {
        if let Ok(mut transform) = query.get_single_mut() {
            // Screen y grows downward, world y upward.
            let pan_delta = Vec2::new(-event.delta.x, event.delta.y) * camera_state.zoom;
            camera_state.position += pan_delta;
            transform.translation.x = camera_state.position.x;
            transform.translation.y = camera_state.position.y;
        }
    }
}

/// `F` toggles following the selected goopie.
pub fn camera_follow(
    keys: Res<ButtonInput<KeyCode>>,
    mut camera_state: ResMut<CameraState>,
    selected: Query<&Transform, (With<Selected>, With<GoopieSprite>)>,
    mut camera: Query<&mut Transform, (With<MainCamera>, Without<GoopieSprite>)>,
) {
    if keys.just_pressed(KeyCode::KeyF) {
        camera_state.follow = !camera_state.follow;
    }
    if !camera_state.follow {
        return;
    }
    let (Ok(target), Ok(mut transform)) = (selected.get_single(), camera.get_single_mut()) else {
        return;
    };
    camera_state.position = target.translation.truncate();
    transform.translation.x = camera_state.position.x;
    transform.translation.y = camera_state.position.y;
}
