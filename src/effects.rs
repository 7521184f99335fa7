//! Cosmetic transients. Coin pops rise from a struck block, arc back down under their own
//! gravity, and vanish; nothing here feeds back into the simulation.

use bevy::prelude::*;

use crate::movement::MovementSettings;
use crate::state::{CoinCollected, GameSet};

const POP_LAUNCH_SPEED: f32 = 220.0;
const POP_GRAVITY: f32 = 600.0;
const POP_LIFETIME: f32 = 0.7;
const POP_SIZE: f32 = 14.0;
const POP_COLOR: Color = Color::srgb(0.98, 0.85, 0.45);

pub struct EffectsPlugin;

impl Plugin for EffectsPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(
            Update,
            (spawn_coin_pops, update_coin_pops)
                .chain()
                .in_set(GameSet::Effects),
        );
    }
}

#[derive(Component)]
pub struct CoinPop {
    velocity_y: f32,
    age: f32,
}

fn spawn_coin_pops(mut commands: Commands, mut events: EventReader<CoinCollected>) {
    for event in events.read() {
        commands.spawn((
            CoinPop {
                velocity_y: POP_LAUNCH_SPEED,
                age: 0.0,
            },
            SpriteBundle {
                sprite: Sprite {
                    color: POP_COLOR,
                    custom_size: Some(Vec2::splat(POP_SIZE)),
                    ..default()
                },
                transform: Transform::from_translation(event.pop_at.extend(1.5)),
                ..default()
            },
        ));
    }
}

fn update_coin_pops(
    time: Res<Time>,
    settings: Res<MovementSettings>,
    mut commands: Commands,
    mut pops: Query<(Entity, &mut CoinPop, &mut Transform)>,
) {
    let dt = time.delta_seconds().min(settings.max_step);
    for (entity, mut pop, mut transform) in &mut pops {
        pop.age += dt;
        if pop.age > POP_LIFETIME {
            commands.entity(entity).despawn_recursive();
            continue;
        }
        transform.translation.y += pop.velocity_y * dt;
        pop.velocity_y -= POP_GRAVITY * dt;
    }
}
