//! Session state machine and counters. States are stored by Bevy in a stack; switching states
//! simply updates an enum value and triggers on-enter/on-exit schedules.

use bevy::input::keyboard::KeyCode;
use bevy::prelude::*;

use crate::effects::CoinPop;
use crate::enemy::{enemy_spawn_center, Alive, Enemy, EnemyRng, EnemySettings};
use crate::movement::{Collider, MovementState, Velocity};
use crate::player::{player_spawn_center, Player, PlayerController};

/// High-level state machine for the session. `Loading` only exists between app start and the
/// first playable frame; `Dead` and `Cleared` are terminal until a reset.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Hash, States)]
pub enum GameState {
    #[default]
    Loading,
    Playing,
    Dead,
    Cleared,
}

/// Named system sets to structure the Update schedule. Chained in `app.rs` so each tick runs
/// input sampling, steering, integration/collision, interaction checks, and cosmetic effects
/// in that order.
#[derive(SystemSet, Debug, Clone, PartialEq, Eq, Hash)]
pub enum GameSet {
    Input,
    Control,
    Movement,
    Interaction,
    Effects,
}

/// Coin and score counters for the current run. Monotonically non-decreasing while playing;
/// zeroed only by [`apply_reset`].
#[derive(Resource, Default)]
pub struct Session {
    pub coins: u32,
    pub score: u32,
}

impl Session {
    pub fn reset(&mut self) {
        self.coins = 0;
        self.score = 0;
    }
}

/// What killed the player.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeathCause {
    Hazard,
    EnemyContact,
    FellOut,
}

/// A coin block was struck from below and paid out.
#[derive(Event)]
pub struct CoinCollected {
    pub cell: IVec2,
    /// World position for the cosmetic coin pop, just above the block's top edge.
    pub pop_at: Vec2,
}

/// A living enemy was flattened by a stomp.
#[derive(Event)]
pub struct EnemyStomped {
    pub enemy: Entity,
}

/// The player left the `Playing` state feet-first.
#[derive(Event, Debug)]
pub struct PlayerDied {
    pub cause: DeathCause,
}

/// The player reached the goal flag.
#[derive(Event)]
pub struct GoalReached;

/// The player left the ground under their own power.
#[derive(Event)]
pub struct PlayerJumped;

/// External command: restore the session to its initial state. Emitted by the `R` key binding
/// here, but any system may send it.
#[derive(Event)]
pub struct ResetRequested;

/// Maps the reset key to a [`ResetRequested`] event. Runs in every state, so a stuck or
/// finished run can always be restarted.
pub fn request_reset(keyboard: Res<ButtonInput<KeyCode>>, mut resets: EventWriter<ResetRequested>) {
    if keyboard.just_pressed(KeyCode::KeyR) {
        resets.send(ResetRequested);
    }
}

/// Applies a pending reset in a single system so no observer can see a half-restored world:
/// counters, coin-block used flags, player transform, and the enemy roster all change in the
/// same command flush, and the session re-enters `Playing`.
#[allow(clippy::too_many_arguments)]
pub fn apply_reset(
    mut commands: Commands,
    mut resets: EventReader<ResetRequested>,
    mut session: ResMut<Session>,
    mut map: ResMut<crate::collision::TileMap>,
    level: Res<crate::level::LevelGeometry>,
    mut rng: ResMut<EnemyRng>,
    enemy_settings: Res<EnemySettings>,
    mut next_state: ResMut<NextState<GameState>>,
    mut player_query: Query<
        (
            &mut Transform,
            &mut Velocity,
            &mut MovementState,
            &mut Collider,
            &mut Player,
            &PlayerController,
        ),
        With<Player>,
    >,
    mut enemy_query: Query<
        (
            &Enemy,
            &mut Transform,
            &mut Velocity,
            &mut MovementState,
            &mut Alive,
        ),
        (With<Enemy>, Without<Player>),
    >,
    pops: Query<Entity, With<CoinPop>>,
) {
    if resets.is_empty() {
        return;
    }
    resets.clear();

    session.reset();
    map.reset_blocks();

    let tile_size = map.tile_size;

    if let Ok((mut transform, mut velocity, mut state, mut collider, mut player, controller)) =
        player_query.get_single_mut()
    {
        let spawn = player_spawn_center(level.player_spawn_cell, tile_size, controller.stand_size);
        transform.translation.x = spawn.x;
        transform.translation.y = spawn.y;
        velocity.0 = Vec2::ZERO;
        state.on_ground = false;
        collider.half_extents = controller.stand_size * 0.5;
        player.facing = 1.0;
        player.crouch = false;
        player.anim_clock = 0.0;
    }

    for (enemy, mut transform, mut velocity, mut state, mut alive) in &mut enemy_query {
        let spawn = enemy_spawn_center(enemy.spawn_cell, tile_size, enemy_settings.size);
        transform.translation.x = spawn.x;
        transform.translation.y = spawn.y;
        velocity.0 = Vec2::new(rng.walk_direction(enemy_settings.walk_speed), 0.0);
        state.on_ground = false;
        alive.0 = true;
    }

    for pop in &pops {
        commands.entity(pop).despawn_recursive();
    }

    next_state.set(GameState::Playing);
}

/// Terminal transitions land in the log, which is all the feedback a headless run gets.
pub fn log_run_end(
    mut deaths: EventReader<PlayerDied>,
    mut goals: EventReader<GoalReached>,
    session: Res<Session>,
) {
    for death in deaths.read() {
        info!(
            "run over ({:?}): {} coins, {} points",
            death.cause, session.coins, session.score
        );
    }
    if !goals.is_empty() {
        goals.clear();
        info!(
            "stage clear: {} coins, {} points",
            session.coins, session.score
        );
    }
}
