//! High-level plugin composition.
//!
//! The `TilePlatformerPlugin` glues together all domain-specific plugins (level, player,
//! enemies, camera, effects, HUD, audio) and sets up system ordering. Each subsystem is
//! responsible for its own state; this orchestrator merely registers them with the Bevy
//! application.

use bevy::prelude::*;

use crate::audio::GameAudioPlugin;
use crate::camera::{CameraPlugin, FollowCamera};
use crate::effects::EffectsPlugin;
use crate::enemy::EnemyPlugin;
use crate::level::LevelPlugin;
use crate::movement::MovementPlugin;
use crate::player::PlayerPlugin;
use crate::state::{
    apply_reset, log_run_end, request_reset, CoinCollected, EnemyStomped, GameSet, GameState,
    GoalReached, PlayerDied, PlayerJumped, ResetRequested, Session,
};
use crate::ui::UiPlugin;

/// Bundles every gameplay-centric plugin into a single unit that can be added to the Bevy
/// `App`.
pub struct TilePlatformerPlugin;

impl Plugin for TilePlatformerPlugin {
    fn build(&self, app: &mut App) {
        app.init_state::<GameState>()
            .init_resource::<Session>()
            .add_event::<CoinCollected>()
            .add_event::<EnemyStomped>()
            .add_event::<PlayerDied>()
            .add_event::<GoalReached>()
            .add_event::<PlayerJumped>()
            .add_event::<ResetRequested>()
            .add_plugins((
                LevelPlugin,     // Stage parsing + tile visuals.
                MovementPlugin,  // Shared kinematics settings.
                PlayerPlugin,    // Input, control, interactions.
                EnemyPlugin,     // Patrol steering + movement.
                CameraPlugin,    // Camera follow behaviour.
                EffectsPlugin,   // Coin pops.
                UiPlugin,        // HUD + end-of-run overlays.
                GameAudioPlugin, // Audio handle preloading.
            ))
            // One simulation tick is the fixed sequence input → steering → integration and
            // collision → interaction checks → cosmetic effects. Chaining the sets keeps
            // every tick's writes in that order, and the `Playing` gate stops all physics
            // work in terminal states.
            .configure_sets(
                Update,
                (
                    GameSet::Input,
                    GameSet::Control,
                    GameSet::Movement,
                    GameSet::Interaction,
                    GameSet::Effects,
                )
                    .chain()
                    .run_if(in_state(GameState::Playing)),
            )
            .add_systems(Startup, setup_camera)
            // Reset handling and end-of-run logging run in every state, after the tick's
            // simulation work (when any ran).
            .add_systems(
                Update,
                (request_reset, apply_reset, log_run_end)
                    .chain()
                    .after(GameSet::Effects),
            );
    }
}

/// Spawns the primary 2D camera tagged with `FollowCamera` so the follow system can locate it.
fn setup_camera(mut commands: Commands) {
    commands.spawn((
        Name::new("MainCamera"),
        Camera2dBundle::default(),
        FollowCamera,
    ));
}
