//! HUD text and terminal-state overlays.
//!
//! The HUD mirrors the session counters; the overlays appear when a run ends either way and
//! name the retry binding.

use bevy::prelude::*;

use crate::state::{GameState, Session};

pub struct UiPlugin;

impl Plugin for UiPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Startup, spawn_hud)
            .add_systems(Update, update_hud)
            .add_systems(OnEnter(GameState::Dead), spawn_game_over_overlay)
            .add_systems(OnExit(GameState::Dead), despawn_overlay)
            .add_systems(OnEnter(GameState::Cleared), spawn_clear_overlay)
            .add_systems(OnExit(GameState::Cleared), despawn_overlay);
    }
}

#[derive(Component)]
struct HudText;

#[derive(Component)]
struct StateOverlay;

fn spawn_hud(mut commands: Commands) {
    commands.spawn((
        HudText,
        Name::new("Hud"),
        TextBundle::from_section(
            "COINS 000  SCORE 000000",
            TextStyle {
                font_size: 28.0,
                color: Color::srgba(0.95, 0.95, 0.95, 1.0),
                ..default()
            },
        )
        .with_style(Style {
            position_type: PositionType::Absolute,
            left: Val::Px(16.0),
            top: Val::Px(12.0),
            ..default()
        }),
    ));
}

fn update_hud(session: Res<Session>, mut query: Query<&mut Text, With<HudText>>) {
    if !session.is_changed() {
        return;
    }
    for mut text in &mut query {
        text.sections[0].value =
            format!("COINS {:03}  SCORE {:06}", session.coins, session.score);
    }
}

fn spawn_overlay(commands: &mut Commands, headline: &str) {
    commands
        .spawn((
            StateOverlay,
            Name::new("StateOverlay"),
            NodeBundle {
                background_color: BackgroundColor(Color::srgba(0.0, 0.0, 0.0, 0.55)),
                style: Style {
                    width: Val::Percent(100.0),
                    height: Val::Percent(100.0),
                    align_items: AlignItems::Center,
                    justify_content: JustifyContent::Center,
                    ..default()
                },
                ..default()
            },
        ))
        .with_children(|parent| {
            parent.spawn(TextBundle::from_section(
                format!("{headline}\nPress R to retry"),
                TextStyle {
                    font_size: 42.0,
                    color: Color::srgba(0.95, 0.95, 0.95, 1.0),
                    ..default()
                },
            ));
        });
}

fn spawn_game_over_overlay(mut commands: Commands) {
    spawn_overlay(&mut commands, "GAME OVER");
}

fn spawn_clear_overlay(mut commands: Commands) {
    spawn_overlay(&mut commands, "CLEAR!");
}

fn despawn_overlay(mut commands: Commands, query: Query<Entity, With<StateOverlay>>) {
    for entity in &query {
        commands.entity(entity).despawn_recursive();
    }
}
