//! Player avatar: input sampling, run/crouch/jump control, movement, and the interaction
//! rules that end or clear a run.

use bevy::input::keyboard::KeyCode;
use bevy::prelude::*;

use crate::collision::TileMap;
use crate::enemy::{Alive, Enemy};
use crate::level::LevelGeometry;
use crate::movement::{
    integrate_gravity, resolve_horizontal, resolve_vertical, Collider, MovementSettings,
    MovementState, Velocity,
};
use crate::state::{
    CoinCollected, DeathCause, EnemyStomped, GameSet, GameState, GoalReached, PlayerDied,
    PlayerJumped, Session,
};

const COIN_SCORE: u32 = 100;
const STOMP_SCORE: u32 = 200;
/// Downward speed below which a contact can never count as a stomp.
const STOMP_FALL_SPEED: f32 = 120.0;
/// How far the player's feet may sink past an enemy's crown and still be "on top".
const STOMP_TOLERANCE: f32 = 18.0;
const STOMP_BOUNCE: f32 = 420.0;
/// How far below the level floor the player may fall before the run ends.
const FALL_OUT_MARGIN: f32 = 300.0;

const BODY_COLOR: Color = Color::srgb(0.93, 0.55, 0.72);
const CROUCH_COLOR: Color = Color::srgb(0.78, 0.42, 0.6);
const RUN_FLASH_COLOR: Color = Color::srgb(0.99, 0.68, 0.82);

pub struct PlayerPlugin;

impl Plugin for PlayerPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<InputState>()
            .add_systems(OnEnter(GameState::Playing), spawn_player)
            .add_systems(
                Update,
                (
                    sample_input.in_set(GameSet::Input),
                    apply_player_control.in_set(GameSet::Control),
                    move_player.in_set(GameSet::Movement),
                    player_interactions.in_set(GameSet::Interaction),
                    animate_player.in_set(GameSet::Effects),
                ),
            );
    }
}

/// The per-tick input vector the controller consumes. Written by [`sample_input`] from the
/// keyboard; the simulation never looks at the input device itself.
#[derive(Resource, Default)]
pub struct InputState {
    pub left: bool,
    pub right: bool,
    pub down: bool,
    pub jump: bool,
}

#[derive(Component)]
pub struct Player {
    pub facing: f32,
    pub crouch: bool,
    pub anim_clock: f32,
}

impl Default for Player {
    fn default() -> Self {
        Self {
            facing: 1.0,
            crouch: false,
            anim_clock: 0.0,
        }
    }
}

#[derive(Component)]
pub struct PlayerController {
    pub move_accel: f32,
    pub ground_max_speed: f32,
    pub air_max_speed: f32,
    pub friction: f32,
    pub jump_velocity: f32,
    pub stand_size: Vec2,
    pub crouch_height: f32,
}

impl Default for PlayerController {
    fn default() -> Self {
        Self {
            move_accel: 3200.0,
            ground_max_speed: 320.0,
            air_max_speed: 340.0,
            friction: 2200.0,
            jump_velocity: 720.0,
            stand_size: Vec2::new(54.0, 86.0),
            crouch_height: 62.0,
        }
    }
}

/// World-space center for a player standing with their top-left corner on the spawn cell's
/// top-left corner.
pub fn player_spawn_center(cell: IVec2, tile_size: f32, size: Vec2) -> Vec2 {
    Vec2::new(
        cell.x as f32 * tile_size + size.x * 0.5,
        (cell.y as f32 + 1.0) * tile_size - size.y * 0.5,
    )
}

fn spawn_player(
    mut commands: Commands,
    existing: Query<(), With<Player>>,
    geometry: Res<LevelGeometry>,
    map: Res<TileMap>,
) {
    // Re-entering `Playing` after a reset keeps the original avatar; the reset system has
    // already moved it back to the spawn cell.
    if !existing.is_empty() {
        return;
    }

    let controller = PlayerController::default();
    let spawn = player_spawn_center(geometry.player_spawn_cell, map.tile_size, controller.stand_size);
    commands.spawn((
        Name::new("Player"),
        Player::default(),
        SpriteBundle {
            sprite: Sprite {
                color: BODY_COLOR,
                custom_size: Some(controller.stand_size),
                ..default()
            },
            transform: Transform::from_translation(spawn.extend(1.0)),
            ..default()
        },
        Velocity::default(),
        MovementState::default(),
        Collider::from_size(controller.stand_size),
        controller,
    ));
}

fn sample_input(keyboard: Res<ButtonInput<KeyCode>>, mut input: ResMut<InputState>) {
    input.left = keyboard.pressed(KeyCode::ArrowLeft) || keyboard.pressed(KeyCode::KeyA);
    input.right = keyboard.pressed(KeyCode::ArrowRight) || keyboard.pressed(KeyCode::KeyD);
    input.down = keyboard.pressed(KeyCode::ArrowDown) || keyboard.pressed(KeyCode::KeyS);
    input.jump = keyboard.pressed(KeyCode::Space) || keyboard.pressed(KeyCode::ArrowUp);
}

/// Damps toward zero without crossing it within one tick.
pub(crate) fn friction_toward_zero(vx: f32, amount: f32) -> f32 {
    if vx > 0.0 {
        (vx - amount).max(0.0)
    } else {
        (vx + amount).min(0.0)
    }
}

/// One tick of player control. Returns `true` when a jump impulse was applied this tick.
#[allow(clippy::too_many_arguments)]
pub(crate) fn apply_controls(
    input: &InputState,
    dt: f32,
    map: &TileMap,
    transform: &mut Transform,
    velocity: &mut Vec2,
    state: &mut MovementState,
    collider: &mut Collider,
    player: &mut Player,
    controller: &PlayerController,
) -> bool {
    let height_delta = controller.stand_size.y - controller.crouch_height;

    // Crouch keeps the feet anchored: the box shrinks from the top, so the center drops by
    // half the height delta. Standing back up is only allowed when the full-height box has
    // headroom; until then the crouch persists.
    if input.down && !player.crouch && state.on_ground {
        player.crouch = true;
        collider.half_extents.y = controller.crouch_height * 0.5;
        transform.translation.y -= height_delta * 0.5;
    } else if !input.down && player.crouch {
        let stand_center =
            transform.translation.truncate() + Vec2::new(0.0, height_delta * 0.5);
        if !map.box_intersects_solid(stand_center, controller.stand_size * 0.5) {
            player.crouch = false;
            collider.half_extents.y = controller.stand_size.y * 0.5;
            transform.translation.y += height_delta * 0.5;
        }
    }

    let max_speed = if state.on_ground {
        controller.ground_max_speed
    } else {
        controller.air_max_speed
    };
    if input.left && !input.right {
        velocity.x -= controller.move_accel * dt;
        player.facing = -1.0;
    } else if input.right && !input.left {
        velocity.x += controller.move_accel * dt;
        player.facing = 1.0;
    } else {
        velocity.x = friction_toward_zero(velocity.x, controller.friction * dt);
    }
    velocity.x = velocity.x.clamp(-max_speed, max_speed);

    if input.jump && state.on_ground && !player.crouch {
        velocity.y = controller.jump_velocity;
        state.on_ground = false;
        return true;
    }
    false
}

fn apply_player_control(
    time: Res<Time>,
    settings: Res<MovementSettings>,
    input: Res<InputState>,
    map: Res<TileMap>,
    mut query: Query<(
        &mut Transform,
        &mut Velocity,
        &mut MovementState,
        &mut Collider,
        &mut Player,
        &PlayerController,
    )>,
    mut jumps: EventWriter<PlayerJumped>,
) {
    let dt = time.delta_seconds().min(settings.max_step);
    let Ok((mut transform, mut velocity, mut state, mut collider, mut player, controller)) =
        query.get_single_mut()
    else {
        return;
    };

    if apply_controls(
        &input,
        dt,
        &map,
        &mut transform,
        &mut velocity,
        &mut state,
        &mut collider,
        &mut player,
        controller,
    ) {
        jumps.send(PlayerJumped);
    }
}

pub(crate) fn move_player(
    time: Res<Time>,
    settings: Res<MovementSettings>,
    mut map: ResMut<TileMap>,
    mut session: ResMut<Session>,
    mut query: Query<(&mut Transform, &mut Velocity, &mut MovementState, &Collider), With<Player>>,
    mut coins: EventWriter<CoinCollected>,
) {
    let dt = time.delta_seconds().min(settings.max_step);
    let Ok((mut transform, mut velocity, mut state, collider)) = query.get_single_mut() else {
        return;
    };

    velocity.y =
        integrate_gravity(velocity.y, dt, settings.gravity).max(settings.terminal_velocity);

    let half = collider.half_extents;
    resolve_horizontal(&mut transform.translation, &mut velocity.x, half, dt, &map);
    let contact = resolve_vertical(&mut transform.translation, &mut velocity.y, half, dt, &map);
    state.on_ground = contact.landed;

    // A head bump pays out at most one coin block: the cell under the player's center in
    // the struck row, and only the first time it is hit.
    if let Some(row) = contact.bumped_row {
        let column = (transform.translation.x / map.tile_size).floor() as i32;
        let cell = IVec2::new(column, row);
        if map.mark_block_used(cell) {
            session.coins += 1;
            session.score += COIN_SCORE;
            let pop_at = Vec2::new(
                (cell.x as f32 + 0.5) * map.tile_size,
                (cell.y as f32 + 1.0) * map.tile_size + 8.0,
            );
            coins.send(CoinCollected { cell, pop_at });
        }
    }
}

fn rects_overlap(a: Rect, b: Rect) -> bool {
    !a.intersect(b).is_empty()
}

/// The contact is a stomp when the player is falling fast and their feet are still within
/// tolerance of the enemy's crown. Judged on current positions only, so a fast shallow side
/// hit right at a corner also counts — kept that way deliberately.
pub(crate) fn is_stomp(player_bottom: f32, player_vy: f32, enemy_top: f32) -> bool {
    player_vy < -STOMP_FALL_SPEED && enemy_top - player_bottom < STOMP_TOLERANCE
}

#[allow(clippy::too_many_arguments)]
fn player_interactions(
    geometry: Res<LevelGeometry>,
    mut session: ResMut<Session>,
    mut next_state: ResMut<NextState<GameState>>,
    mut player_query: Query<(&Transform, &Collider, &mut Velocity), With<Player>>,
    mut enemy_query: Query<(Entity, &Enemy, &Transform, &Collider, &mut Alive), Without<Player>>,
    mut stomps: EventWriter<EnemyStomped>,
    mut deaths: EventWriter<PlayerDied>,
    mut goals: EventWriter<GoalReached>,
) {
    let Ok((transform, collider, mut velocity)) = player_query.get_single_mut() else {
        return;
    };
    let player_box =
        Rect::from_center_half_size(transform.translation.truncate(), collider.half_extents);

    for hazard in &geometry.hazards {
        if rects_overlap(player_box, *hazard) {
            deaths.send(PlayerDied {
                cause: DeathCause::Hazard,
            });
            next_state.set(GameState::Dead);
            return;
        }
    }

    if player_box.max.y < -FALL_OUT_MARGIN {
        deaths.send(PlayerDied {
            cause: DeathCause::FellOut,
        });
        next_state.set(GameState::Dead);
        return;
    }

    // Stomp or die is settled per enemy, in spawn order, before the goal check.
    let mut enemies: Vec<_> = enemy_query.iter_mut().collect();
    enemies.sort_by_key(|(_, enemy, ..)| enemy.id);
    for (entity, _, enemy_transform, enemy_collider, mut alive) in enemies {
        if !alive.0 {
            continue;
        }
        let enemy_box = Rect::from_center_half_size(
            enemy_transform.translation.truncate(),
            enemy_collider.half_extents,
        );
        if !rects_overlap(player_box, enemy_box) {
            continue;
        }
        if is_stomp(player_box.min.y, velocity.y, enemy_box.max.y) {
            alive.0 = false;
            velocity.y = STOMP_BOUNCE;
            session.score += STOMP_SCORE;
            stomps.send(EnemyStomped { enemy: entity });
        } else {
            deaths.send(PlayerDied {
                cause: DeathCause::EnemyContact,
            });
            next_state.set(GameState::Dead);
            return;
        }
    }

    if rects_overlap(player_box, geometry.goal) {
        goals.send(GoalReached);
        next_state.set(GameState::Cleared);
    }
}

/// Cosmetic sync: sprite faces travel, tracks the crouch box, and flashes through a simple
/// two-phase run cycle while moving on the ground.
fn animate_player(
    time: Res<Time>,
    mut query: Query<(
        &mut Sprite,
        &Collider,
        &Velocity,
        &MovementState,
        &mut Player,
    )>,
) {
    let Ok((mut sprite, collider, velocity, state, mut player)) = query.get_single_mut() else {
        return;
    };
    player.anim_clock += time.delta_seconds();
    sprite.flip_x = player.facing < 0.0;
    sprite.custom_size = Some(collider.half_extents * 2.0);
    sprite.color = if player.crouch {
        CROUCH_COLOR
    } else if state.on_ground
        && velocity.x.abs() > 30.0
        && (player.anim_clock * 10.0) as i32 % 2 == 1
    {
        RUN_FLASH_COLOR
    } else {
        BODY_COLOR
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::TILE_SIZE;

    fn resting_transform(controller: &PlayerController, x: f32) -> Transform {
        Transform::from_xyz(
            x,
            TILE_SIZE + controller.stand_size.y * 0.5 + crate::movement::SKIN,
            0.0,
        )
    }

    fn open_map() -> TileMap {
        TileMap::from_ascii(&[
            "......", //
            "......", //
            "......", //
            "......", //
            "######",
        ])
    }

    #[test]
    fn friction_never_crosses_zero() {
        assert_eq!(friction_toward_zero(100.0, 40.0), 60.0);
        assert_eq!(friction_toward_zero(30.0, 40.0), 0.0);
        assert_eq!(friction_toward_zero(-100.0, 40.0), -60.0);
        assert_eq!(friction_toward_zero(-30.0, 40.0), 0.0);
        assert_eq!(friction_toward_zero(0.0, 40.0), 0.0);
    }

    #[test]
    fn standing_still_is_stable() {
        let map = open_map();
        let controller = PlayerController::default();
        let half = controller.stand_size * 0.5;
        let dt = 1.0 / 60.0;
        let mut transform = resting_transform(&controller, 100.0);
        let start = transform.translation;

        let mut vx = friction_toward_zero(0.0, controller.friction * dt);
        let mut vy = integrate_gravity(0.0, dt, 1900.0).max(-1800.0);
        resolve_horizontal(&mut transform.translation, &mut vx, half, dt, &map);
        let contact = resolve_vertical(&mut transform.translation, &mut vy, half, dt, &map);

        assert!(contact.landed);
        assert_eq!(transform.translation, start);
        assert_eq!(vx, 0.0);
        assert_eq!(vy, 0.0);
    }

    #[test]
    fn jump_only_from_the_ground_and_standing() {
        let map = open_map();
        let controller = PlayerController::default();
        let input = InputState {
            jump: true,
            ..default()
        };
        let mut transform = resting_transform(&controller, 100.0);
        let mut velocity = Vec2::ZERO;
        let mut state = MovementState { on_ground: true };
        let mut collider = Collider::from_size(controller.stand_size);
        let mut player = Player::default();

        let jumped = apply_controls(
            &input,
            1.0 / 60.0,
            &map,
            &mut transform,
            &mut velocity,
            &mut state,
            &mut collider,
            &mut player,
            &controller,
        );
        assert!(jumped);
        // The impulse is the configured jump velocity, before any gravity is added, and the
        // ground flag clears the same tick.
        assert_eq!(velocity.y, controller.jump_velocity);
        assert!(!state.on_ground);

        // Airborne now: holding jump does nothing further.
        let jumped_again = apply_controls(
            &input,
            1.0 / 60.0,
            &map,
            &mut transform,
            &mut velocity,
            &mut state,
            &mut collider,
            &mut player,
            &controller,
        );
        assert!(!jumped_again);
    }

    #[test]
    fn crouch_anchors_feet_and_blocks_jumping() {
        let map = open_map();
        let controller = PlayerController::default();
        let mut transform = resting_transform(&controller, 100.0);
        let feet = transform.translation.y - controller.stand_size.y * 0.5;
        let mut velocity = Vec2::ZERO;
        let mut state = MovementState { on_ground: true };
        let mut collider = Collider::from_size(controller.stand_size);
        let mut player = Player::default();

        let input = InputState {
            down: true,
            jump: true,
            ..default()
        };
        let jumped = apply_controls(
            &input,
            1.0 / 60.0,
            &map,
            &mut transform,
            &mut velocity,
            &mut state,
            &mut collider,
            &mut player,
            &controller,
        );
        assert!(player.crouch);
        assert!(!jumped);
        assert_eq!(collider.half_extents.y * 2.0, controller.crouch_height);
        let crouch_feet = transform.translation.y - collider.half_extents.y;
        assert!((crouch_feet - feet).abs() < 1e-4);

        // Release down in the open: the full-height box fits, so the crouch ends with the
        // feet still planted.
        let input = InputState::default();
        apply_controls(
            &input,
            1.0 / 60.0,
            &map,
            &mut transform,
            &mut velocity,
            &mut state,
            &mut collider,
            &mut player,
            &controller,
        );
        assert!(!player.crouch);
        let stand_feet = transform.translation.y - collider.half_extents.y;
        assert!((stand_feet - feet).abs() < 1e-4);
    }

    #[test]
    fn crouch_persists_under_a_low_ceiling() {
        // A crouched player drifting under a ceiling: feet at 70 leave room for the 62 px
        // crouch box below the ceiling at 144, but not for the 86 px standing box.
        let map = TileMap::from_ascii(&[
            "####", //
            "....", //
            "....", //
            "####",
        ]);
        let controller = PlayerController::default();
        let mut transform = Transform::from_xyz(96.0, 70.0 + controller.crouch_height * 0.5, 0.0);
        let mut velocity = Vec2::ZERO;
        let mut state = MovementState { on_ground: false };
        let mut collider = Collider {
            half_extents: Vec2::new(
                controller.stand_size.x * 0.5,
                controller.crouch_height * 0.5,
            ),
        };
        let mut player = Player {
            crouch: true,
            ..default()
        };

        let input = InputState::default();
        apply_controls(
            &input,
            1.0 / 60.0,
            &map,
            &mut transform,
            &mut velocity,
            &mut state,
            &mut collider,
            &mut player,
            &controller,
        );
        assert!(player.crouch, "no headroom, crouch must persist");
        assert_eq!(collider.half_extents.y * 2.0, controller.crouch_height);
    }

    #[test]
    fn air_control_uses_the_airborne_speed_cap() {
        let map = open_map();
        let controller = PlayerController::default();
        let mut transform = resting_transform(&controller, 100.0);
        let mut velocity = Vec2::new(controller.ground_max_speed, 0.0);
        let mut state = MovementState { on_ground: false };
        let mut collider = Collider::from_size(controller.stand_size);
        let mut player = Player::default();

        let input = InputState {
            right: true,
            ..default()
        };
        // A long acceleration burst saturates at the air cap, not the ground cap.
        for _ in 0..30 {
            apply_controls(
                &input,
                1.0 / 60.0,
                &map,
                &mut transform,
                &mut velocity,
                &mut state,
                &mut collider,
                &mut player,
                &controller,
            );
        }
        assert_eq!(velocity.x, controller.air_max_speed);
        assert_eq!(player.facing, 1.0);
    }

    #[test]
    fn stomp_requires_fast_fall_and_shallow_contact() {
        // Clean stomp: falling fast, feet just past the crown.
        assert!(is_stomp(110.0, -300.0, 120.0));
        // Too slow.
        assert!(!is_stomp(110.0, -100.0, 120.0));
        // Too deep.
        assert!(!is_stomp(90.0, -300.0, 120.0));
        // Exactly at the tolerance boundary is not a stomp.
        assert!(!is_stomp(102.0, -300.0, 120.0));
    }

    #[test]
    fn near_corner_side_hit_counts_as_stomp() {
        // A fast-falling contact that clips an enemy's top corner from the side still
        // classifies as a stomp: the check only sees vertical speed and crown depth.
        assert!(is_stomp(115.0, -500.0, 120.0));
    }

    #[test]
    fn spawn_center_anchors_top_left_to_cell() {
        let size = Vec2::new(54.0, 86.0);
        let center = player_spawn_center(IVec2::new(2, 5), TILE_SIZE, size);
        assert_eq!(center.x, 2.0 * TILE_SIZE + 27.0);
        assert_eq!(center.y, 6.0 * TILE_SIZE - 43.0);
    }
}
