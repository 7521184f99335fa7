//! Shared kinematics: gravity integration and axis-separated tile collision.
//!
//! Both the player and the enemies move through the same two-pass resolution. Order is
//! load-bearing: the horizontal pass runs first and the vertical pass assumes x is already
//! legal. Each pass is a full stop — the first overlapped solid cell clamps the entity flush
//! against the cell face and zeroes that axis of velocity.

use bevy::prelude::*;

use crate::collision::TileMap;

pub struct MovementPlugin;

impl Plugin for MovementPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<MovementSettings>();
    }
}

#[derive(Resource)]
pub struct MovementSettings {
    /// Downward acceleration in px/s^2.
    pub gravity: f32,
    /// Fall speed floor (negative, px/s). Never reachable inside the shipped level; kept as
    /// a stability guard for long drops.
    pub terminal_velocity: f32,
    /// Upper bound on a simulation step in seconds. Long wall-clock gaps (background tabs,
    /// debugger stalls) are clamped to this instead of integrating one huge step.
    pub max_step: f32,
}

impl Default for MovementSettings {
    fn default() -> Self {
        Self {
            gravity: 1900.0,
            terminal_velocity: -1800.0,
            max_step: 1.0 / 30.0,
        }
    }
}

#[derive(Component, Default, Deref, DerefMut)]
pub struct Velocity(pub Vec2);

/// Recomputed by the vertical pass every tick; never sticky across frames.
#[derive(Component, Default)]
pub struct MovementState {
    pub on_ground: bool,
}

#[derive(Component, Copy, Clone)]
pub struct Collider {
    pub half_extents: Vec2,
}

impl Collider {
    pub fn from_size(size: Vec2) -> Self {
        Self {
            half_extents: size * 0.5,
        }
    }
}

/// Gravity as a pure velocity increment. Callers clamp the result (terminal speed, enemy
/// speed caps) after integrating.
pub fn integrate_gravity(vy: f32, dt: f32, gravity: f32) -> f32 {
    vy - gravity * dt
}

pub(crate) const SKIN: f32 = 0.001;

/// Outcome of the vertical pass.
pub struct VerticalContact {
    /// A downward contact was resolved this tick.
    pub landed: bool,
    /// Row index of a cell struck from below, if any. The player controller turns this into
    /// coin-block triggers.
    pub bumped_row: Option<i32>,
}

/// Moves the entity by `vx * dt` and clamps against the first overlapped solid cell,
/// scanning columns in the direction of travel so the clamp always lands on the nearest
/// face even when a step crosses a whole cell.
pub fn resolve_horizontal(
    position: &mut Vec3,
    velocity: &mut f32,
    half: Vec2,
    dt: f32,
    map: &TileMap,
) {
    debug_assert!(
        position.x.is_finite() && position.y.is_finite() && velocity.is_finite(),
        "non-finite kinematic state entering horizontal pass"
    );

    if velocity.abs() < f32::EPSILON {
        return;
    }

    let new_x = position.x + *velocity * dt;
    let rows = map.tile_span(position.y - half.y + SKIN, position.y + half.y - SKIN);
    let cols = map.tile_span(new_x - half.x, new_x + half.x);
    let tile_size = map.tile_size;

    if *velocity > 0.0 {
        for tx in cols {
            for ty in rows.clone() {
                if map.is_solid(IVec2::new(tx, ty)) {
                    position.x = tx as f32 * tile_size - half.x - SKIN;
                    *velocity = 0.0;
                    return;
                }
            }
        }
    } else {
        for tx in cols.rev() {
            for ty in rows.clone() {
                if map.is_solid(IVec2::new(tx, ty)) {
                    position.x = (tx + 1) as f32 * tile_size + half.x + SKIN;
                    *velocity = 0.0;
                    return;
                }
            }
        }
    }

    position.x = new_x;
}

/// Moves the entity by `vy * dt` and clamps against the first overlapped solid cell. A
/// downward contact sets `landed`; an upward contact reports the struck row. Rows scan away
/// from the direction of travel so the clamp lands on the nearest face.
pub fn resolve_vertical(
    position: &mut Vec3,
    velocity: &mut f32,
    half: Vec2,
    dt: f32,
    map: &TileMap,
) -> VerticalContact {
    debug_assert!(
        position.x.is_finite() && position.y.is_finite() && velocity.is_finite(),
        "non-finite kinematic state entering vertical pass"
    );

    let mut contact = VerticalContact {
        landed: false,
        bumped_row: None,
    };

    if velocity.abs() < f32::EPSILON {
        return contact;
    }

    let new_y = position.y + *velocity * dt;
    let cols = map.tile_span(position.x - half.x + SKIN, position.x + half.x - SKIN);
    let rows = map.tile_span(new_y - half.y, new_y + half.y);
    let tile_size = map.tile_size;

    if *velocity < 0.0 {
        for ty in rows.rev() {
            for tx in cols.clone() {
                if map.is_solid(IVec2::new(tx, ty)) {
                    position.y = (ty + 1) as f32 * tile_size + half.y + SKIN;
                    *velocity = 0.0;
                    contact.landed = true;
                    return contact;
                }
            }
        }
    } else {
        for ty in rows {
            for tx in cols.clone() {
                if map.is_solid(IVec2::new(tx, ty)) {
                    position.y = ty as f32 * tile_size - half.y - SKIN;
                    *velocity = 0.0;
                    contact.bumped_row = Some(ty);
                    return contact;
                }
            }
        }
    }

    position.y = new_y;
    contact
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::TILE_SIZE;

    fn map() -> TileMap {
        TileMap::from_ascii(&[
            "......", //
            "....#.", //
            "....#.", //
            "######",
        ])
    }

    const HALF: Vec2 = Vec2::new(20.0, 20.0);

    fn resting_y() -> f32 {
        TILE_SIZE + HALF.y + SKIN
    }

    #[test]
    fn gravity_is_a_pure_increment() {
        assert_eq!(integrate_gravity(0.0, 0.5, 1900.0), -950.0);
        assert_eq!(integrate_gravity(100.0, 0.0, 1900.0), 100.0);
    }

    #[test]
    fn horizontal_free_move() {
        let map = map();
        let mut position = Vec3::new(60.0, resting_y(), 0.0);
        let mut vx = 120.0;
        resolve_horizontal(&mut position, &mut vx, HALF, 0.1, &map);
        assert_eq!(position.x, 72.0);
        assert_eq!(vx, 120.0);
    }

    #[test]
    fn horizontal_clamp_against_wall() {
        let map = map();
        // Wall occupies column 4 (x in [192, 240)) for the two rows above the floor.
        let mut position = Vec3::new(160.0, resting_y(), 0.0);
        let mut vx = 300.0;
        resolve_horizontal(&mut position, &mut vx, HALF, 0.1, &map);
        assert_eq!(vx, 0.0);
        assert!((position.x - (192.0 - HALF.x - SKIN)).abs() < 1e-3);
        // Post-condition: the resolved box no longer overlaps the wall.
        assert!(!map.box_intersects_solid(position.truncate(), HALF));
    }

    #[test]
    fn horizontal_clamp_from_the_right() {
        let map = map();
        let mut position = Vec3::new(266.0, resting_y(), 0.0);
        let mut vx = -300.0;
        resolve_horizontal(&mut position, &mut vx, HALF, 0.1, &map);
        assert_eq!(vx, 0.0);
        assert!((position.x - (240.0 + HALF.x + SKIN)).abs() < 1e-3);
        assert!(!map.box_intersects_solid(position.truncate(), HALF));
    }

    #[test]
    fn landing_sets_on_ground_and_clamps_to_tile_top() {
        let map = map();
        let mut position = Vec3::new(60.0, 120.0, 0.0);
        let mut vy = -600.0;
        let contact = resolve_vertical(&mut position, &mut vy, HALF, 0.1, &map);
        assert!(contact.landed);
        assert!(contact.bumped_row.is_none());
        assert_eq!(vy, 0.0);
        assert!((position.y - resting_y()).abs() < 1e-3);
        assert!(!map.box_intersects_solid(position.truncate(), HALF));
    }

    #[test]
    fn leaving_a_ledge_clears_on_ground() {
        let map = map();
        // Over column 0 there is only the floor; hover above it and integrate a tiny step
        // that does not reach the floor yet.
        let mut position = Vec3::new(60.0, 160.0, 0.0);
        let mut vy = -10.0;
        let contact = resolve_vertical(&mut position, &mut vy, HALF, 0.01, &map);
        assert!(!contact.landed);
        assert_eq!(position.y, 159.9);
    }

    #[test]
    fn head_bump_reports_struck_row() {
        let map = TileMap::from_ascii(&[
            "####", //
            "....", //
            "####",
        ]);
        let mut position = Vec3::new(96.0, TILE_SIZE + 24.0, 0.0);
        let mut vy = 400.0;
        let contact = resolve_vertical(&mut position, &mut vy, HALF, 0.1, &map);
        assert!(!contact.landed);
        assert_eq!(contact.bumped_row, Some(2));
        assert_eq!(vy, 0.0);
        // Top edge flush against the ceiling row's bottom face.
        assert!((position.y - (2.0 * TILE_SIZE - HALF.y - SKIN)).abs() < 1e-3);
    }

    #[test]
    fn fast_fall_lands_on_the_first_row_crossed() {
        // A single platform row with open space above and below it.
        let map = TileMap::from_ascii(&[
            "....", //
            "....", //
            "####", //
            "....", //
            "....",
        ]);
        // Platform row is ty=2 (y in [96, 144)). Start just above it and fall 60 px in one
        // step, far enough to cross the row entirely.
        let mut position = Vec3::new(96.0, 144.0 + HALF.y + 1.0, 0.0);
        let mut vy = -1800.0;
        let contact = resolve_vertical(&mut position, &mut vy, HALF, 1.0 / 30.0, &map);
        assert!(contact.landed);
        assert!((position.y - (144.0 + HALF.y + SKIN)).abs() < 1e-3);
    }

    #[test]
    fn zero_velocity_is_a_no_op() {
        let map = map();
        let mut position = Vec3::new(60.0, resting_y(), 0.0);
        let mut vx = 0.0;
        let mut vy = 0.0;
        resolve_horizontal(&mut position, &mut vx, HALF, 0.1, &map);
        let contact = resolve_vertical(&mut position, &mut vy, HALF, 0.1, &map);
        assert_eq!(position, Vec3::new(60.0, resting_y(), 0.0));
        assert!(!contact.landed);
    }
}
