//! Hex Board Geometry
//!
//! The board is a 52-tile hexagon laid out as rows of 4..8..4 tiles. Tile
//! centres are computed in screen space and the 6-neighbour adjacency graph
//! is derived from centre distances, so it is built once and shared by every
//! room.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, OnceLock};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::core::vec2::Vec2;

// =============================================================================
// LAYOUT CONSTANTS
// =============================================================================

/// Row labels and tile counts, top (seat 2 home) to bottom (seat 1 home).
pub const ROW_LAYOUT: [(char, u8); 9] = [
    ('A', 4),
    ('B', 5),
    ('C', 6),
    ('D', 7),
    ('E', 8),
    ('F', 7),
    ('G', 6),
    ('H', 5),
    ('I', 4),
];

/// Hex radius in pixels.
pub const HEX_RADIUS: f64 = 58.0;

/// Vertical distance between row centres.
pub const ROW_SPACING: f64 = 0.75 * 2.0 * HEX_RADIUS;

/// Board centre in screen space.
pub const BOARD_CENTER: Vec2 = Vec2::new(960.0, 490.0);

/// Relative tolerance when classifying a centre distance as adjacent.
const NEIGHBOR_TOLERANCE: f64 = 0.18;

/// Maximum neighbours kept per tile.
const MAX_NEIGHBORS: usize = 6;

/// Horizontal distance between tile centres in the same row.
#[inline]
pub fn hex_width() -> f64 {
    3f64.sqrt() * HEX_RADIUS
}

// =============================================================================
// TILE ID
// =============================================================================

/// Tile identifier: row letter plus 1-based index within the row (`"E5"`).
///
/// Ordered row-major, which is also the order tiles are generated in.
/// Parsing accepts any well-formed id; membership is checked against the
/// [`Board`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TileId {
    row: u8,
    index: u8,
}

impl TileId {
    /// Create from a row letter and 1-based index.
    pub fn new(row: char, index: u8) -> Option<Self> {
        if !row.is_ascii_uppercase() || index == 0 {
            return None;
        }
        Some(Self {
            row: row as u8 - b'A',
            index,
        })
    }

    /// Row letter.
    pub fn row_label(&self) -> char {
        (b'A' + self.row) as char
    }

    /// 1-based index within the row.
    pub fn index(&self) -> u8 {
        self.index
    }
}

impl fmt::Display for TileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.row_label(), self.index)
    }
}

/// Error returned when a tile id string is malformed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed tile id: {0:?}")]
pub struct ParseTileIdError(pub String);

impl FromStr for TileId {
    type Err = ParseTileIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.chars();
        let row = chars.next().ok_or_else(|| ParseTileIdError(s.to_string()))?;
        let index: u8 = chars
            .as_str()
            .parse()
            .map_err(|_| ParseTileIdError(s.to_string()))?;
        TileId::new(row, index).ok_or_else(|| ParseTileIdError(s.to_string()))
    }
}

impl Serialize for TileId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TileId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

// =============================================================================
// BOARD
// =============================================================================

/// Tile positions plus the cached adjacency graph.
#[derive(Clone, Debug)]
pub struct Board {
    positions: BTreeMap<TileId, Vec2>,
    adjacency: BTreeMap<TileId, Vec<TileId>>,
}

impl Board {
    /// Build the standard 52-tile board.
    pub fn new() -> Self {
        let hex_w = hex_width();
        let center_row = (ROW_LAYOUT.len() / 2) as f64;

        let mut positions = BTreeMap::new();
        for (ri, (label, count)) in ROW_LAYOUT.iter().enumerate() {
            let y = BOARD_CENTER.y + (ri as f64 - center_row) * ROW_SPACING;
            let half = (*count as f64 - 1.0) * hex_w / 2.0;
            for i in 0..*count {
                let x = BOARD_CENTER.x - half + i as f64 * hex_w;
                if let Some(id) = TileId::new(*label, i + 1) {
                    positions.insert(id, Vec2::new(x, y));
                }
            }
        }

        let adjacency = build_adjacency(&positions, hex_w);
        Self { positions, adjacency }
    }

    /// Process-wide shared board. Topology never changes, so every room
    /// holds a handle to the same instance.
    pub fn shared() -> Arc<Board> {
        static BOARD: OnceLock<Arc<Board>> = OnceLock::new();
        BOARD.get_or_init(|| Arc::new(Board::new())).clone()
    }

    /// Number of tiles.
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Is this tile on the board?
    #[inline]
    pub fn contains(&self, tile: TileId) -> bool {
        self.positions.contains_key(&tile)
    }

    /// Screen-space centre of a tile.
    pub fn position(&self, tile: TileId) -> Option<Vec2> {
        self.positions.get(&tile).copied()
    }

    /// All tile ids in row-major order.
    pub fn tiles(&self) -> impl Iterator<Item = TileId> + '_ {
        self.positions.keys().copied()
    }

    /// Neighbours of a tile, nearest first. Unknown tiles have none.
    pub fn neighbors(&self, tile: TileId) -> &[TileId] {
        self.adjacency.get(&tile).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Breadth-first step distance from `start` to `goal`.
    ///
    /// Tiles in `blocked` are never entered, including the goal itself.
    /// Returns `None` when the goal is unreachable.
    pub fn shortest_distance(
        &self,
        start: TileId,
        goal: TileId,
        blocked: Option<&BTreeSet<TileId>>,
    ) -> Option<u32> {
        if start == goal {
            return Some(0);
        }

        let mut seen = BTreeSet::from([start]);
        let mut queue = VecDeque::from([(start, 0u32)]);

        while let Some((current, dist)) = queue.pop_front() {
            for &next in self.neighbors(current) {
                if blocked.is_some_and(|b| b.contains(&next)) {
                    continue;
                }
                if !seen.insert(next) {
                    continue;
                }
                if next == goal {
                    return Some(dist + 1);
                }
                queue.push_back((next, dist + 1));
            }
        }

        None
    }

    /// Every tile within `radius` steps of `center`, ignoring blockers.
    ///
    /// The centre comes first, then tiles in discovery order.
    pub fn tiles_within(&self, center: TileId, radius: u32) -> Vec<TileId> {
        if !self.contains(center) {
            return Vec::new();
        }

        let mut out = vec![center];
        let mut seen = BTreeSet::from([center]);
        let mut queue = VecDeque::from([(center, 0u32)]);

        while let Some((current, dist)) = queue.pop_front() {
            if dist >= radius {
                continue;
            }
            for &next in self.neighbors(current) {
                if seen.insert(next) {
                    out.push(next);
                    queue.push_back((next, dist + 1));
                }
            }
        }

        out
    }

    /// Tiles whose centres lie on the straight segment between two tiles.
    ///
    /// A tile is on the line when its projection parameter falls within
    /// `[-0.05, 1.05]` and its centre is at most 30px from the segment.
    /// Results are ordered from `from` towards `to`.
    pub fn tiles_on_segment(&self, from: TileId, to: TileId) -> Vec<TileId> {
        const T_SLACK: f64 = 0.05;
        const MAX_OFFSET: f64 = 30.0;

        let (Some(a), Some(b)) = (self.position(from), self.position(to)) else {
            return Vec::new();
        };

        let mut hits: Vec<(TileId, f64)> = self
            .positions
            .iter()
            .filter_map(|(&id, &p)| {
                let (t, offset) = p.project_onto_segment(a, b);
                let on_line = (-T_SLACK..=1.0 + T_SLACK).contains(&t) && offset <= MAX_OFFSET;
                on_line.then_some((id, t))
            })
            .collect();

        hits.sort_by(|x, y| x.1.total_cmp(&y.1));
        hits.into_iter().map(|(id, _)| id).collect()
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}

/// Classify every tile pair by centre distance and keep the nearest six.
fn build_adjacency(
    positions: &BTreeMap<TileId, Vec2>,
    hex_w: f64,
) -> BTreeMap<TileId, Vec<TileId>> {
    let horizontal = hex_w;
    let vertical = ROW_SPACING;
    let diagonal = (hex_w / 2.0).hypot(ROW_SPACING);
    let targets = [horizontal, vertical, diagonal];

    let mut adjacency = BTreeMap::new();
    for (&id, &a) in positions {
        let mut near: Vec<(TileId, f64)> = positions
            .iter()
            .filter(|(other, _)| **other != id)
            .filter_map(|(&other, &b)| {
                let dist = a.distance(b);
                targets
                    .iter()
                    .any(|t| (dist - t).abs() <= t * NEIGHBOR_TOLERANCE)
                    .then_some((other, dist))
            })
            .collect();

        // Stable sort keeps row-major order between equidistant tiles
        near.sort_by(|x, y| x.1.total_cmp(&y.1));
        near.truncate(MAX_NEIGHBORS);
        adjacency.insert(id, near.into_iter().map(|(t, _)| t).collect());
    }
    adjacency
}

// =============================================================================
// TESTS
// =============================================================================
