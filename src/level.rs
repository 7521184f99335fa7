//! Level loading: parses a character-grid stage into the tile map, the entity spawn lists,
//! and the static interaction rectangles, then spawns the flat-color tile visuals.
//!
//! Stage legend:
//! `.` empty, `#` solid ground, `=` solid platform, `?` coin block, `^` spike,
//! `E` enemy spawn, `P` player spawn, `F` goal flag. The three markers are consumed at load
//! time; the grid itself never stores them.

use std::fmt;

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::collision::{Tile, TileMap, TILE_SIZE};
use crate::state::GameState;

const HAZARD_INSET: f32 = 8.0;
const HAZARD_HEIGHT: f32 = 22.0;
const GOAL_WIDTH: f32 = 26.0;
const GOAL_HEIGHT: f32 = 120.0;

/// Registers level resources and the load-time world build.
pub struct LevelPlugin;

impl Plugin for LevelPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<LevelConfig>()
            .init_resource::<TileMap>()
            .init_resource::<LevelGeometry>()
            .add_systems(OnEnter(GameState::Loading), build_world)
            .add_systems(Update, sync_block_sprites);
    }
}

/// Which stage to load. When `level_path` names a JSON [`LevelSource`] file it is read at
/// startup; otherwise (or when the file is unreadable) the built-in stage is used.
#[derive(Resource, Clone, Default)]
pub struct LevelConfig {
    pub level_path: Option<String>,
}

/// A stage as authored: one string per row, top row first.
#[derive(Clone, Serialize, Deserialize)]
pub struct LevelSource {
    pub name: String,
    pub rows: Vec<String>,
}

impl Default for LevelSource {
    fn default() -> Self {
        Self {
            name: "meadow run".to_owned(),
            rows: BUILTIN_STAGE.iter().map(|row| (*row).to_owned()).collect(),
        }
    }
}

#[rustfmt::skip]
const BUILTIN_STAGE: &[&str] = &[
    "....................................................................................................",
    "....................................................................................................",
    "....................................................................................................",
    "..................................................??................................................",
    "..................................................==................................................",
    ".............................E.....................==.............E.................................",
    "..P...................??...........................==...............................................",
    "......................==....................^^.....==............................??.................",
    "..........??..........==.............==............==.............==..............==................",
    "..........==..........==.....==......==....==......==......==.....==.......==......==.............F.",
    "#######..#######..########..####..##########..########..#######..####..########..#######..##########",
    "#######..#######..########..####..##########..########..#######..####..########..#######..##########",
];

/// Why a stage was rejected at load time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LevelParseError {
    EmptyMap,
    RaggedRow {
        row: usize,
        expected: usize,
        found: usize,
    },
    UnknownTile {
        row: usize,
        col: usize,
        code: char,
    },
    MissingGoal,
}

impl fmt::Display for LevelParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LevelParseError::EmptyMap => write!(f, "stage has no rows or no columns"),
            LevelParseError::RaggedRow {
                row,
                expected,
                found,
            } => write!(
                f,
                "row {row} is {found} tiles wide, expected {expected}; all rows must match"
            ),
            LevelParseError::UnknownTile { row, col, code } => {
                write!(f, "unknown tile code {code:?} at row {row}, column {col}")
            }
            LevelParseError::MissingGoal => write!(f, "stage has no goal flag (`F`)"),
        }
    }
}

impl std::error::Error for LevelParseError {}

/// Static world geometry derived from the markers: spawn cells, the goal rectangle, hazard
/// rectangles, and the level extent in world units.
#[derive(Resource, Default)]
pub struct LevelGeometry {
    pub player_spawn_cell: IVec2,
    pub enemy_spawn_cells: Vec<IVec2>,
    pub goal: Rect,
    pub hazards: Vec<Rect>,
    pub size_px: Vec2,
}

/// Parses and validates a stage. Rows are authored top-first; cell coordinates in the
/// returned map and geometry are bottom-up world cells.
pub fn build_level(
    source: &LevelSource,
    tile_size: f32,
) -> Result<(TileMap, LevelGeometry), LevelParseError> {
    let height = source.rows.len();
    let width = source.rows.first().map_or(0, |row| row.chars().count());
    if height == 0 || width == 0 {
        return Err(LevelParseError::EmptyMap);
    }

    let mut tiles = vec![Tile::Empty; width * height];
    let mut enemy_spawn_cells = Vec::new();
    let mut hazards = Vec::new();
    let mut goal_cell = None;
    let mut player_cell = None;

    for (r, row) in source.rows.iter().enumerate() {
        let found = row.chars().count();
        if found != width {
            return Err(LevelParseError::RaggedRow {
                row: r,
                expected: width,
                found,
            });
        }
        let ty = (height - 1 - r) as i32;
        for (c, code) in row.chars().enumerate() {
            let cell = IVec2::new(c as i32, ty);
            let tile = match code {
                '.' => Tile::Empty,
                '#' => Tile::Ground,
                '=' => Tile::Platform,
                '?' => Tile::CoinBlock,
                '^' => {
                    hazards.push(hazard_rect(cell, tile_size));
                    Tile::Hazard
                }
                'E' => {
                    enemy_spawn_cells.push(cell);
                    Tile::Empty
                }
                'F' => {
                    goal_cell = Some(cell);
                    Tile::Empty
                }
                'P' => {
                    player_cell = Some(cell);
                    Tile::Empty
                }
                other => {
                    return Err(LevelParseError::UnknownTile {
                        row: r,
                        col: c,
                        code: other,
                    })
                }
            };
            tiles[ty as usize * width + c] = tile;
        }
    }

    let goal_cell = goal_cell.ok_or(LevelParseError::MissingGoal)?;
    // Without a `P` marker the spawn falls back to the classic spot: column 2, six rows
    // down from the top of the stage.
    let player_spawn_cell =
        player_cell.unwrap_or_else(|| IVec2::new(2, (height as i32 - 7).max(0)));

    let geometry = LevelGeometry {
        player_spawn_cell,
        enemy_spawn_cells,
        goal: goal_rect(goal_cell, tile_size),
        hazards,
        size_px: Vec2::new(width as f32, height as f32) * tile_size,
    };
    Ok((TileMap::new(width as i32, height as i32, tile_size, tiles), geometry))
}

/// Spike collision box: inset from the cell sides, sitting on the cell floor.
fn hazard_rect(cell: IVec2, tile_size: f32) -> Rect {
    let x0 = cell.x as f32 * tile_size + HAZARD_INSET;
    let y0 = cell.y as f32 * tile_size;
    Rect::new(x0, y0, x0 + tile_size - 2.0 * HAZARD_INSET, y0 + HAZARD_HEIGHT)
}

/// Goal flag trigger: a tall thin pole standing on the marker cell's floor, centered
/// horizontally in the cell.
fn goal_rect(cell: IVec2, tile_size: f32) -> Rect {
    let x0 = cell.x as f32 * tile_size + (tile_size - GOAL_WIDTH) * 0.5;
    let y0 = cell.y as f32 * tile_size;
    Rect::new(x0, y0, x0 + GOAL_WIDTH, y0 + GOAL_HEIGHT)
}

/// Marker for every level visual, so a rebuild can sweep the previous stage.
#[derive(Component)]
pub struct LevelTile;

/// Marker carried by coin-block sprites; lets the visual track the used flag.
#[derive(Component)]
pub struct BlockSprite {
    pub cell: IVec2,
}

fn tile_color(tile: Tile, used: bool) -> Color {
    match tile {
        Tile::Ground => Color::srgb(0.35, 0.35, 0.42),
        Tile::Platform => Color::srgb(0.45, 0.45, 0.52),
        Tile::CoinBlock if used => Color::srgb(0.4, 0.4, 0.44),
        Tile::CoinBlock => Color::srgb(0.95, 0.8, 0.3),
        Tile::Hazard => Color::srgb(0.9, 0.25, 0.35),
        Tile::Empty => Color::NONE,
    }
}

/// Loads the configured stage, fills the map and geometry resources, spawns the tile
/// visuals, and hands the session over to `Playing`. A rejected stage is a configuration
/// error; it is logged and the session stays in `Loading`.
fn build_world(
    mut commands: Commands,
    previous: Query<Entity, With<LevelTile>>,
    config: Res<LevelConfig>,
    mut map: ResMut<TileMap>,
    mut geometry: ResMut<LevelGeometry>,
    mut next_state: ResMut<NextState<GameState>>,
) {
    for entity in &previous {
        commands.entity(entity).despawn_recursive();
    }

    let source = resolve_source(&config);
    let (loaded_map, loaded_geometry) = match build_level(&source, TILE_SIZE) {
        Ok(loaded) => loaded,
        Err(err) => {
            error!("rejecting stage '{}': {err}", source.name);
            return;
        }
    };

    info!(
        "stage '{}' loaded: {}x{} tiles, {} enemies, {} hazards",
        source.name,
        loaded_map.width,
        loaded_map.height,
        loaded_geometry.enemy_spawn_cells.len(),
        loaded_geometry.hazards.len()
    );

    let tile_size = loaded_map.tile_size;
    for (cell, tile) in loaded_map.cells() {
        if tile == Tile::Empty {
            continue;
        }
        let center = (cell.as_vec2() + 0.5) * tile_size;
        let (size, translation) = if tile == Tile::Hazard {
            // Spikes render as their trigger box, not the full cell.
            let rect = hazard_rect(cell, tile_size);
            (rect.size(), rect.center().extend(0.1))
        } else {
            (Vec2::splat(tile_size), center.extend(0.0))
        };
        let mut entity = commands.spawn((
            LevelTile,
            SpriteBundle {
                sprite: Sprite {
                    color: tile_color(tile, false),
                    custom_size: Some(size),
                    ..default()
                },
                transform: Transform::from_translation(translation),
                ..default()
            },
        ));
        if tile == Tile::CoinBlock {
            entity.insert(BlockSprite { cell });
        }
    }

    // Goal flag: a white pole with a pennant-colored band, matching the trigger rectangle.
    let goal = loaded_geometry.goal;
    commands.spawn((
        LevelTile,
        Name::new("GoalFlag"),
        SpriteBundle {
            sprite: Sprite {
                color: Color::srgb(0.9, 0.95, 1.0),
                custom_size: Some(Vec2::new(4.0, goal.height())),
                ..default()
            },
            transform: Transform::from_translation(goal.center().extend(0.1)),
            ..default()
        },
    ));
    commands.spawn((
        LevelTile,
        SpriteBundle {
            sprite: Sprite {
                color: Color::srgb(0.45, 0.85, 0.95),
                custom_size: Some(Vec2::new(30.0, 18.0)),
                ..default()
            },
            transform: Transform::from_translation(
                Vec2::new(goal.center().x + 17.0, goal.max.y - 14.0).extend(0.1),
            ),
            ..default()
        },
    ));

    *map = loaded_map;
    *geometry = loaded_geometry;
    next_state.set(GameState::Playing);
}

fn resolve_source(config: &LevelConfig) -> LevelSource {
    #[cfg(not(target_arch = "wasm32"))]
    if let Some(path) = &config.level_path {
        match std::fs::read_to_string(path) {
            Ok(text) => match serde_json::from_str::<LevelSource>(&text) {
                Ok(source) => return source,
                Err(err) => warn!("ignoring stage file '{path}': {err}; using built-in stage"),
            },
            Err(err) => warn!("cannot read stage file '{path}': {err}; using built-in stage"),
        }
    }
    #[cfg(target_arch = "wasm32")]
    if config.level_path.is_some() {
        warn!("stage files are not available on the web build; using built-in stage");
    }
    LevelSource::default()
}

/// Dims coin-block sprites whose block has paid out, and restores them after a reset.
fn sync_block_sprites(map: Res<TileMap>, mut blocks: Query<(&BlockSprite, &mut Sprite)>) {
    if !map.is_changed() {
        return;
    }
    for (block, mut sprite) in &mut blocks {
        sprite.color = tile_color(Tile::CoinBlock, map.is_block_used(block.cell));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(rows: &[&str]) -> LevelSource {
        LevelSource {
            name: "test".to_owned(),
            rows: rows.iter().map(|row| (*row).to_owned()).collect(),
        }
    }

    #[test]
    fn parses_markers_and_dimensions() {
        let (map, geometry) = build_level(
            &source(&[
                ".P..F", //
                ".E.^.", //
                "#####",
            ]),
            TILE_SIZE,
        )
        .expect("valid stage");

        assert_eq!(map.width, 5);
        assert_eq!(map.height, 3);
        assert_eq!(geometry.size_px, Vec2::new(240.0, 144.0));

        // Markers are consumed into geometry and leave empty cells behind.
        assert_eq!(map.tile_at(IVec2::new(1, 2)), Tile::Empty);
        assert_eq!(geometry.player_spawn_cell, IVec2::new(1, 2));
        assert_eq!(geometry.enemy_spawn_cells, vec![IVec2::new(1, 1)]);

        // Goal stands on the marker cell's floor.
        assert_eq!(geometry.goal.min.y, 2.0 * TILE_SIZE);
        assert_eq!(geometry.goal.height(), GOAL_HEIGHT);

        // Hazard box is inset and sits on the cell floor.
        let hazard = geometry.hazards[0];
        assert_eq!(hazard.min, Vec2::new(3.0 * TILE_SIZE + HAZARD_INSET, TILE_SIZE));
        assert_eq!(hazard.height(), HAZARD_HEIGHT);
    }

    #[test]
    fn rejects_ragged_rows() {
        let err = build_level(&source(&["....F", "###"]), TILE_SIZE).unwrap_err();
        assert_eq!(
            err,
            LevelParseError::RaggedRow {
                row: 1,
                expected: 5,
                found: 3
            }
        );
    }

    #[test]
    fn rejects_unknown_codes() {
        let err = build_level(&source(&["..X.F"]), TILE_SIZE).unwrap_err();
        assert_eq!(
            err,
            LevelParseError::UnknownTile {
                row: 0,
                col: 2,
                code: 'X'
            }
        );
    }

    #[test]
    fn rejects_missing_goal() {
        let err = build_level(&source(&["....", "####"]), TILE_SIZE).unwrap_err();
        assert_eq!(err, LevelParseError::MissingGoal);
    }

    #[test]
    fn rejects_empty_stage() {
        assert_eq!(
            build_level(&source(&[]), TILE_SIZE).unwrap_err(),
            LevelParseError::EmptyMap
        );
    }

    #[test]
    fn spawn_falls_back_without_marker() {
        let rows: Vec<&str> = std::iter::repeat("....F")
            .take(1)
            .chain(std::iter::repeat(".....").take(8))
            .chain(std::iter::repeat("#####").take(1))
            .collect();
        let (_, geometry) = build_level(&source(&rows), TILE_SIZE).expect("valid stage");
        // Ten rows tall: the classic spawn sits six rows down from the top.
        assert_eq!(geometry.player_spawn_cell, IVec2::new(2, 3));
    }

    #[test]
    fn builtin_stage_is_valid() {
        let (map, geometry) = build_level(&LevelSource::default(), TILE_SIZE).expect("built-in");
        assert_eq!(map.width, 100);
        assert_eq!(map.height, 12);
        assert_eq!(geometry.enemy_spawn_cells.len(), 2);
        assert!(geometry.goal.min.x > 0.0);
        assert_eq!(geometry.player_spawn_cell, IVec2::new(2, 5));
    }
}
