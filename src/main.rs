//! Application entry point: composes the Bevy runtime, core plugins, and window configuration.
//!
//! The simulation itself lives behind the `TilePlatformerPlugin` defined in `app.rs`; this
//! file only wires it to a window.

mod app;
mod audio;
mod camera;
mod collision;
mod effects;
mod enemy;
mod level;
mod movement;
mod player;
mod state;
mod ui;

#[cfg(all(target_arch = "wasm32", feature = "web"))]
mod wasm;

use app::TilePlatformerPlugin;
use bevy::asset::AssetPlugin;
use bevy::prelude::*;
use bevy::render::texture::ImagePlugin;
use bevy::window::{Window, WindowResizeConstraints, WindowResolution};

fn main() {
    #[cfg(all(target_arch = "wasm32", feature = "web"))]
    wasm::set_panic_hook();

    // Logical resolution matches the stage's intended framing: 960×540 shows roughly twenty
    // tiles across. Resizing is enabled, but constraints prevent collapsing the window to
    // unusable sizes.
    let primary_window = Window {
        title: "Tile Platformer".to_string(),
        resolution: WindowResolution::new(960.0, 540.0),
        resizable: true,
        resize_constraints: WindowResizeConstraints {
            min_width: 480.0,
            min_height: 270.0,
            max_width: f32::INFINITY,
            max_height: f32::INFINITY,
        },
        canvas: cfg!(all(target_arch = "wasm32", feature = "web"))
            .then(|| "#bevy-canvas".to_owned()),
        ..default()
    };

    // `DefaultPlugins` spins up rendering, input, audio, etc. Nearest-neighbor sampling keeps
    // the flat-color tiles crisp at any zoom.
    let mut default_plugins = DefaultPlugins
        .set(WindowPlugin {
            primary_window: Some(primary_window),
            ..default()
        })
        .set(ImagePlugin::default_nearest());

    #[cfg(not(target_arch = "wasm32"))]
    {
        default_plugins = default_plugins.set(AssetPlugin {
            file_path: "assets".to_owned(),
            watch_for_changes_override: Some(true),
            ..default()
        });
    }

    #[cfg(all(target_arch = "wasm32", feature = "web"))]
    {
        default_plugins = default_plugins.set(AssetPlugin {
            file_path: "assets".to_owned(),
            watch_for_changes_override: Some(false),
            ..default()
        });
    }

    App::new()
        .insert_resource(ClearColor(Color::srgb(0.07, 0.09, 0.16)))
        // A custom stage can be supplied as a JSON file; the built-in stage is the default.
        .insert_resource(level::LevelConfig {
            level_path: std::env::var("STAGE_FILE").ok(),
        })
        .add_plugins(default_plugins)
        .add_plugins(TilePlatformerPlugin)
        .run();
}
