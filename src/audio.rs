//! Audio preloading and one-shot playback on game events.
//!
//! Bevy's asset system reference-counts handles; the `AudioHandles` resource keeps the clips
//! alive for the whole session. Until real files are provided under `assets/audio/`, playback
//! requests act as no-ops.

use bevy::prelude::*;

use crate::state::{CoinCollected, EnemyStomped, GameState, PlayerJumped};

pub struct GameAudioPlugin;

impl Plugin for GameAudioPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<AudioHandles>()
            .add_systems(OnEnter(GameState::Loading), load_audio_handles)
            .add_systems(Update, play_event_sounds);
    }
}

/// Optional handles to the session's sound effects. Each `Handle` is a cheap cloneable
/// pointer into Bevy's asset storage.
#[derive(Resource, Default)]
pub struct AudioHandles {
    pub jump: Option<Handle<AudioSource>>,
    pub coin: Option<Handle<AudioSource>>,
    pub stomp: Option<Handle<AudioSource>>,
}

fn load_audio_handles(asset_server: Res<AssetServer>, mut handles: ResMut<AudioHandles>) {
    handles.jump = Some(asset_server.load("audio/jump.ogg"));
    handles.coin = Some(asset_server.load("audio/coin.ogg"));
    handles.stomp = Some(asset_server.load("audio/stomp.ogg"));

    info!("Queued audio placeholders. Add files under assets/audio/ to enable playback.");
}

/// Spawns a despawn-on-finish audio player for each game event with a loaded clip.
fn play_event_sounds(
    mut commands: Commands,
    handles: Res<AudioHandles>,
    mut jumps: EventReader<PlayerJumped>,
    mut coins: EventReader<CoinCollected>,
    mut stomps: EventReader<EnemyStomped>,
) {
    let mut play = |source: &Option<Handle<AudioSource>>| {
        if let Some(source) = source {
            commands.spawn(AudioBundle {
                source: source.clone(),
                settings: PlaybackSettings::DESPAWN,
            });
        }
    };

    if !jumps.is_empty() {
        jumps.clear();
        play(&handles.jump);
    }
    if !coins.is_empty() {
        coins.clear();
        play(&handles.coin);
    }
    if !stomps.is_empty() {
        stomps.clear();
        play(&handles.stomp);
    }
}
