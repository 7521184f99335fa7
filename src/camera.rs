//! Camera follow system. Keeps the main 2D camera slightly ahead of the player while
//! respecting the level bounds.

use bevy::prelude::*;
use bevy::window::PrimaryWindow;

use crate::level::LevelGeometry;
use crate::player::Player;
use crate::state::GameSet;

/// Fraction of the viewport the camera leads the player by, so more of the upcoming stage
/// stays visible in the direction of travel.
const LOOK_AHEAD_FRACTION: f32 = 0.12;

pub struct CameraPlugin;

impl Plugin for CameraPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(
            Update,
            follow_player_camera
                .after(GameSet::Movement) // run after movement so the camera sees the latest transform
                .run_if(has_player_and_camera),
        );
    }
}

/// Marker component so the follow system can locate the camera entity without relying on names.
#[derive(Component)]
pub struct FollowCamera;

/// Run condition that only schedules the follow system when both a player and camera exist,
/// preventing `get_single` misses during startup.
fn has_player_and_camera(
    player_query: Query<Entity, With<Player>>,
    camera_query: Query<Entity, With<FollowCamera>>,
) -> bool {
    !player_query.is_empty() && !camera_query.is_empty()
}

/// Smoothly interpolates the camera toward a point ahead of the player, vertically centered
/// on the stage, clamped so the view never leaves the playable area.
fn follow_player_camera(
    mut camera_query: Query<(&mut Transform, &OrthographicProjection), With<FollowCamera>>,
    player_query: Query<&Transform, (With<Player>, Without<FollowCamera>)>,
    geometry: Res<LevelGeometry>,
    window_query: Query<&Window, With<PrimaryWindow>>,
    time: Res<Time>,
) {
    let Ok(player_transform) = player_query.get_single() else {
        return;
    };

    let Ok((mut camera_transform, projection)) = camera_query.get_single_mut() else {
        return;
    };

    let target_z = camera_transform.translation.z;
    let mut desired = Vec3::new(
        player_transform.translation.x,
        geometry.size_px.y * 0.5,
        target_z,
    );

    if let Ok(window) = window_query.get_single() {
        let half_width = window.resolution.width() * 0.5 * projection.scale;
        let half_height = window.resolution.height() * 0.5 * projection.scale;
        desired.x += window.resolution.width() * LOOK_AHEAD_FRACTION * projection.scale;

        if geometry.size_px.x > half_width * 2.0 {
            desired.x = desired.x.clamp(half_width, geometry.size_px.x - half_width);
        }
        if geometry.size_px.y > half_height * 2.0 {
            desired.y = desired.y.clamp(half_height, geometry.size_px.y - half_height);
        }
    }

    let follow_speed = 6.0;
    let lerp_t = 1.0 - f32::exp(-follow_speed * time.delta_seconds());
    camera_transform.translation = camera_transform.translation.lerp(desired, lerp_t);
}
