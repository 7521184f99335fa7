//! Tile map queries backing the collision pass.
//!
//! The grid is stored row-major with row 0 at the bottom of the level (world space grows
//! upward). Cell shape is immutable after load; the only mutable per-cell state is the
//! coin-block used flag, which resets with the session.

use std::collections::HashSet;
use std::ops::RangeInclusive;

use bevy::math::IVec2;
use bevy::prelude::*;

/// Side length of a map cell in world units.
pub const TILE_SIZE: f32 = 48.0;

const EDGE_EPSILON: f32 = 0.001;

/// Classification of a single map cell. Spawn markers never reach this type; the level
/// parser consumes them into entity lists before the grid is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tile {
    #[default]
    Empty,
    Ground,
    Platform,
    CoinBlock,
    Hazard,
}

impl Tile {
    pub fn is_solid(self) -> bool {
        matches!(self, Tile::Ground | Tile::Platform | Tile::CoinBlock)
    }

    pub fn is_hazard(self) -> bool {
        self == Tile::Hazard
    }
}

#[derive(Resource, Debug)]
pub struct TileMap {
    pub tile_size: f32,
    pub width: i32,
    pub height: i32,
    tiles: Vec<Tile>,
    used_blocks: HashSet<IVec2>,
}

impl Default for TileMap {
    fn default() -> Self {
        Self {
            tile_size: TILE_SIZE,
            width: 0,
            height: 0,
            tiles: Vec::new(),
            used_blocks: HashSet::new(),
        }
    }
}

impl TileMap {
    /// `tiles` is row-major, bottom row first; length must be `width * height`.
    pub fn new(width: i32, height: i32, tile_size: f32, tiles: Vec<Tile>) -> Self {
        debug_assert_eq!(tiles.len(), (width * height) as usize);
        Self {
            tile_size,
            width,
            height,
            tiles,
            used_blocks: HashSet::new(),
        }
    }

    /// Cell lookup with the boundary rule: columns past either edge and rows above the
    /// ceiling read as solid ground so nothing can leave the defined play space sideways
    /// or upward. Rows below the floor read as empty — the fall-out check needs entities
    /// to actually fall there.
    pub fn tile_at(&self, cell: IVec2) -> Tile {
        if cell.y < 0 {
            return Tile::Empty;
        }
        if cell.x < 0 || cell.x >= self.width || cell.y >= self.height {
            return Tile::Ground;
        }
        self.tiles[(cell.y * self.width + cell.x) as usize]
    }

    pub fn is_solid(&self, cell: IVec2) -> bool {
        self.tile_at(cell).is_solid()
    }

    /// Cell containing a world-space point.
    pub fn cell_at(&self, point: Vec2) -> IVec2 {
        IVec2::new(
            (point.x / self.tile_size).floor() as i32,
            (point.y / self.tile_size).floor() as i32,
        )
    }

    /// Inclusive range of cell indices overlapped by the interval `[lo, hi)` on one axis.
    /// The upper bound backs off by an epsilon so a box whose edge sits exactly on a grid
    /// line does not count the next cell over.
    pub fn tile_span(&self, lo: f32, hi: f32) -> RangeInclusive<i32> {
        let a = (lo / self.tile_size).floor() as i32;
        let b = ((hi - EDGE_EPSILON) / self.tile_size).floor() as i32;
        a..=b
    }

    /// True if an axis-aligned box (center + half extents) overlaps any solid cell. The box
    /// is inset by an epsilon on every side, so resting contact with a surface does not
    /// count as overlap.
    pub fn box_intersects_solid(&self, center: Vec2, half: Vec2) -> bool {
        for ty in self.tile_span(center.y - half.y + EDGE_EPSILON, center.y + half.y) {
            for tx in self.tile_span(center.x - half.x + EDGE_EPSILON, center.x + half.x) {
                if self.is_solid(IVec2::new(tx, ty)) {
                    return true;
                }
            }
        }
        false
    }

    /// Marks a coin block as spent. Returns `true` only the first time a given coin-block
    /// cell is marked; non-coin-block cells are never marked.
    pub fn mark_block_used(&mut self, cell: IVec2) -> bool {
        if self.tile_at(cell) != Tile::CoinBlock {
            return false;
        }
        self.used_blocks.insert(cell)
    }

    /// Iterates every cell with its classification, bottom row first.
    pub fn cells(&self) -> impl Iterator<Item = (IVec2, Tile)> + '_ {
        self.tiles
            .iter()
            .enumerate()
            .map(move |(i, tile)| (IVec2::new(i as i32 % self.width, i as i32 / self.width), *tile))
    }

    pub fn is_block_used(&self, cell: IVec2) -> bool {
        self.used_blocks.contains(&cell)
    }

    pub fn reset_blocks(&mut self) {
        self.used_blocks.clear();
    }
}

#[cfg(test)]
impl TileMap {
    /// Builds a map from ascii art, top row first, using the level legend's tile codes
    /// (markers excluded).
    pub(crate) fn from_ascii(rows: &[&str]) -> TileMap {
        let height = rows.len() as i32;
        let width = rows[0].len() as i32;
        let mut tiles = vec![Tile::Empty; (width * height) as usize];
        for (r, row) in rows.iter().enumerate() {
            assert_eq!(row.len() as i32, width, "ragged test map");
            let ty = height - 1 - r as i32;
            for (tx, code) in row.chars().enumerate() {
                tiles[(ty * width) as usize + tx] = match code {
                    '.' => Tile::Empty,
                    '#' => Tile::Ground,
                    '=' => Tile::Platform,
                    '?' => Tile::CoinBlock,
                    '^' => Tile::Hazard,
                    other => panic!("unexpected tile code {other:?}"),
                };
            }
        }
        TileMap::new(width, height, TILE_SIZE, tiles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map() -> TileMap {
        TileMap::from_ascii(&[
            "....", //
            ".?..", //
            "..^.", //
            "####",
        ])
    }

    #[test]
    fn classification_predicates() {
        assert!(Tile::Ground.is_solid());
        assert!(Tile::Platform.is_solid());
        assert!(Tile::CoinBlock.is_solid());
        assert!(!Tile::Hazard.is_solid());
        assert!(!Tile::Empty.is_solid());
        assert!(Tile::Hazard.is_hazard());
        assert!(!Tile::Ground.is_hazard());
    }

    #[test]
    fn lookup_uses_bottom_up_rows() {
        let map = map();
        assert_eq!(map.tile_at(IVec2::new(0, 0)), Tile::Ground);
        assert_eq!(map.tile_at(IVec2::new(1, 2)), Tile::CoinBlock);
        assert_eq!(map.tile_at(IVec2::new(2, 1)), Tile::Hazard);
        assert_eq!(map.tile_at(IVec2::new(0, 3)), Tile::Empty);
    }

    #[test]
    fn out_of_range_is_solid_except_below() {
        let map = map();
        assert_eq!(map.tile_at(IVec2::new(-1, 0)), Tile::Ground);
        assert_eq!(map.tile_at(IVec2::new(4, 0)), Tile::Ground);
        assert_eq!(map.tile_at(IVec2::new(0, 4)), Tile::Ground);
        // Below the floor stays open so entities can fall out of the world.
        assert_eq!(map.tile_at(IVec2::new(0, -1)), Tile::Empty);
    }

    #[test]
    fn tile_span_excludes_touching_edge() {
        let map = map();
        // A box spanning [0, 48) covers only cell 0 even though its upper edge sits
        // exactly on the grid line.
        assert_eq!(map.tile_span(0.0, 48.0), 0..=0);
        assert_eq!(map.tile_span(0.0, 48.5), 0..=1);
        assert_eq!(map.tile_span(47.0, 96.0), 0..=1);
    }

    #[test]
    fn resting_contact_is_not_overlap() {
        let map = map();
        // Box sitting exactly on top of the ground row.
        let center = Vec2::new(96.0, TILE_SIZE + 20.0);
        assert!(!map.box_intersects_solid(center, Vec2::new(20.0, 20.0)));
        // Push it one unit down and it overlaps.
        assert!(map.box_intersects_solid(center - Vec2::new(0.0, 1.0), Vec2::new(20.0, 20.0)));
    }

    #[test]
    fn coin_block_marking_is_idempotent() {
        let mut map = map();
        let block = IVec2::new(1, 2);
        assert!(map.mark_block_used(block));
        assert!(map.is_block_used(block));
        assert!(!map.mark_block_used(block));

        // Only coin blocks can be marked.
        assert!(!map.mark_block_used(IVec2::new(0, 0)));
        assert!(!map.is_block_used(IVec2::new(0, 0)));

        map.reset_blocks();
        assert!(!map.is_block_used(block));
    }
}
