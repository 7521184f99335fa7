//! Patrolling enemies. Each one walks its platform, turns at ledges and walls, climbs small
//! steps, and dies to a stomp. Steering runs before integration; dead enemies are skipped by
//! every system until a reset revives them.

use bevy::prelude::*;
use rand::rngs::SmallRng;
use rand::{Rng as _, SeedableRng};

use crate::collision::TileMap;
use crate::level::LevelGeometry;
use crate::movement::{
    integrate_gravity, resolve_horizontal, resolve_vertical, Collider, MovementSettings,
    MovementState, Velocity,
};
use crate::state::{GameSet, GameState};

const ENEMY_COLOR: Color = Color::srgb(0.95, 0.6, 0.3);

pub struct EnemyPlugin;

impl Plugin for EnemyPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<EnemySettings>()
            .init_resource::<EnemyRng>()
            .add_systems(OnEnter(GameState::Playing), spawn_enemies)
            .add_systems(
                Update,
                (
                    steer_enemies.in_set(GameSet::Control),
                    // The player resolves first each tick; enemies follow in spawn order.
                    move_enemies
                        .in_set(GameSet::Movement)
                        .after(crate::player::move_player),
                ),
            )
            .add_systems(Update, sync_enemy_visibility);
    }
}

#[derive(Resource)]
pub struct EnemySettings {
    pub walk_speed: f32,
    /// Hard cap applied after steering and integration.
    pub max_speed: f32,
    /// Vertical lift used to walk over low obstacles. A position nudge, not an impulse.
    pub step_height: f32,
    pub size: Vec2,
    /// Lookahead past the collider edge for ledge and wall samples.
    pub sample_margin: f32,
}

impl Default for EnemySettings {
    fn default() -> Self {
        Self {
            walk_speed: 110.0,
            max_speed: 140.0,
            step_height: 12.0,
            size: Vec2::splat(44.0),
            sample_margin: 2.0,
        }
    }
}

/// Shared direction die for patrol decisions. Entropy-seeded in the app; tests seed it.
#[derive(Resource)]
pub struct EnemyRng(SmallRng);

impl Default for EnemyRng {
    fn default() -> Self {
        Self(SmallRng::from_entropy())
    }
}

impl EnemyRng {
    /// A nonzero patrol velocity at the given speed, either direction equally likely.
    pub fn walk_direction(&mut self, speed: f32) -> f32 {
        if self.0.gen_bool(0.5) {
            -speed
        } else {
            speed
        }
    }

    #[cfg(test)]
    pub(crate) fn seeded(seed: u64) -> Self {
        Self(SmallRng::seed_from_u64(seed))
    }
}

#[derive(Component)]
pub struct Enemy {
    /// Stable tick ordering and reset bookkeeping.
    pub id: usize,
    pub spawn_cell: IVec2,
}

/// Dead enemies stay spawned but inert and invisible until the session resets.
#[derive(Component)]
pub struct Alive(pub bool);

/// World-space center for an enemy standing on its marker cell's floor, nudged off the
/// cell's left edge.
pub fn enemy_spawn_center(cell: IVec2, tile_size: f32, size: Vec2) -> Vec2 {
    Vec2::new(
        cell.x as f32 * tile_size + 2.0 + size.x * 0.5,
        cell.y as f32 * tile_size + size.y * 0.5,
    )
}

fn spawn_enemies(
    mut commands: Commands,
    existing: Query<(), With<Enemy>>,
    geometry: Res<LevelGeometry>,
    map: Res<TileMap>,
    settings: Res<EnemySettings>,
    mut rng: ResMut<EnemyRng>,
) {
    if !existing.is_empty() {
        return;
    }

    for (id, cell) in geometry.enemy_spawn_cells.iter().enumerate() {
        let center = enemy_spawn_center(*cell, map.tile_size, settings.size);
        commands.spawn((
            Name::new(format!("Enemy{id}")),
            Enemy {
                id,
                spawn_cell: *cell,
            },
            Alive(true),
            SpriteBundle {
                sprite: Sprite {
                    color: ENEMY_COLOR,
                    custom_size: Some(settings.size),
                    ..default()
                },
                transform: Transform::from_translation(center.extend(0.9)),
                ..default()
            },
            Velocity(Vec2::new(rng.walk_direction(settings.walk_speed), 0.0)),
            MovementState::default(),
            Collider::from_size(settings.size),
        ));
    }
}

/// One steering decision for a patroller, taken from tile samples around the collider:
/// reverse at ledges, climb one step when the cell past the wall top is open, reverse at
/// full walls, and re-roll the direction when squeezed to a stop.
pub(crate) fn steer(
    map: &TileMap,
    settings: &EnemySettings,
    position: &mut Vec3,
    velocity: &mut Vec2,
    on_ground: bool,
    rng: &mut EnemyRng,
) {
    let half = settings.size * 0.5;
    let mut dir = if velocity.x >= 0.0 { 1.0 } else { -1.0 };

    if on_ground {
        let ahead = position.x + dir * (half.x + settings.sample_margin);
        let below_feet = position.y - half.y - settings.sample_margin;
        if !map.is_solid(map.cell_at(Vec2::new(ahead, below_feet))) {
            velocity.x = -velocity.x;
            dir = -dir;
        }
    }

    let ahead = position.x + dir * (half.x + settings.sample_margin);
    let head = position.y + half.y - settings.sample_margin;
    let ahead_cell = map.cell_at(Vec2::new(ahead, head));
    if map.is_solid(ahead_cell) {
        let lifted = Vec2::new(position.x, position.y + settings.step_height);
        if !map.is_solid(ahead_cell + IVec2::Y) && !map.box_intersects_solid(lifted, half) {
            position.y += settings.step_height;
        } else if map.is_solid(ahead_cell + IVec2::Y) {
            velocity.x = -velocity.x;
        }
    }

    if velocity.x.abs() < 1.0 {
        velocity.x = rng.walk_direction(settings.walk_speed);
    }
}

fn steer_enemies(
    map: Res<TileMap>,
    settings: Res<EnemySettings>,
    mut rng: ResMut<EnemyRng>,
    mut query: Query<(
        &Enemy,
        &mut Transform,
        &mut Velocity,
        &MovementState,
        &Alive,
    )>,
) {
    let mut enemies: Vec<_> = query.iter_mut().collect();
    enemies.sort_by_key(|(enemy, ..)| enemy.id);
    for (_, mut transform, mut velocity, state, alive) in enemies {
        if !alive.0 {
            continue;
        }
        steer(
            &map,
            &settings,
            &mut transform.translation,
            &mut velocity,
            state.on_ground,
            &mut rng,
        );
    }
}

pub(crate) fn move_enemies(
    time: Res<Time>,
    settings: Res<MovementSettings>,
    enemy_settings: Res<EnemySettings>,
    map: Res<TileMap>,
    mut query: Query<(
        &Enemy,
        &mut Transform,
        &mut Velocity,
        &mut MovementState,
        &Collider,
        &Alive,
    )>,
) {
    let dt = time.delta_seconds().min(settings.max_step);
    let mut enemies: Vec<_> = query.iter_mut().collect();
    enemies.sort_by_key(|(enemy, ..)| enemy.id);

    for (_, mut transform, mut velocity, mut state, collider, alive) in enemies {
        if !alive.0 {
            continue;
        }
        velocity.y =
            integrate_gravity(velocity.y, dt, settings.gravity).max(settings.terminal_velocity);

        let half = collider.half_extents;
        resolve_horizontal(&mut transform.translation, &mut velocity.x, half, dt, &map);
        let contact = resolve_vertical(&mut transform.translation, &mut velocity.y, half, dt, &map);
        state.on_ground = contact.landed;

        velocity.x = velocity
            .x
            .clamp(-enemy_settings.max_speed, enemy_settings.max_speed);
    }
}

fn sync_enemy_visibility(
    mut query: Query<(&Alive, &mut Visibility), (With<Enemy>, Changed<Alive>)>,
) {
    for (alive, mut visibility) in &mut query {
        *visibility = if alive.0 {
            Visibility::Inherited
        } else {
            Visibility::Hidden
        };
    }
}
