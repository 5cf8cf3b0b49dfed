//! Sparse, chunked storage over the infinite Go board's coordinate plane.
//!
//! The plane is addressed by signed 64-bit `(x, y)` pairs. Cells are grouped
//! into fixed 512x512 chunks identified by signed 32-bit `(cx, cy)`; a chunk
//! exists only while it holds at least one occupied cell.

use rustc_hash::FxHashMap;
use thiserror::Error;

/// Bits of chunk-local coordinate; chunks are `2^CHUNK_BITS` cells wide.
pub const CHUNK_BITS: u32 = 9;
/// Width/height of a chunk in cells (512).
pub const CHUNK_SIZE: i64 = 1 << CHUNK_BITS;
const LOCAL_MASK: i64 = CHUNK_SIZE - 1;

/// A stone color. The wire format carries this as an integer; only `Black`
/// and `White` are recognized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(into = "u8", try_from = "u8"))]
pub enum Color {
    Black,
    White,
}

impl Color {
    /// Opposite stone color.
    #[must_use]
    pub fn opposite(self) -> Color {
        match self {
            Color::Black => Color::White,
            Color::White => Color::Black,
        }
    }
}

impl From<Color> for u8 {
    fn from(c: Color) -> Self {
        match c {
            Color::Black => 0,
            Color::White => 1,
        }
    }
}

/// The error returned when a wire value does not name a recognized color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid color value {0}")]
pub struct InvalidColor(pub u8);

impl TryFrom<u8> for Color {
    type Error = InvalidColor;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Color::Black),
            1 => Ok(Color::White),
            other => Err(InvalidColor(other)),
        }
    }
}

/// An occupied cell: its coordinates and the stone occupying it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Cell {
    pub x: i64,
    pub y: i64,
    pub color: Color,
}

/// Identifies a 512x512 chunk of the plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChunkId {
    pub cx: i32,
    pub cy: i32,
}

/// A coordinate could not be mapped onto a chunk because the resulting chunk
/// identifier does not fit in a signed 32-bit integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("coordinate ({x}, {y}) is out of the representable chunk range")]
pub struct OutOfBounds {
    pub x: i64,
    pub y: i64,
}

fn chunk_id_for(x: i64, y: i64) -> Result<ChunkId, OutOfBounds> {
    let cx = x >> CHUNK_BITS;
    let cy = y >> CHUNK_BITS;
    if cx < i64::from(i32::MIN) || cx > i64::from(i32::MAX) {
        return Err(OutOfBounds { x, y });
    }
    if cy < i64::from(i32::MIN) || cy > i64::from(i32::MAX) {
        return Err(OutOfBounds { x, y });
    }
    #[allow(clippy::cast_possible_truncation)]
    Ok(ChunkId {
        cx: cx as i32,
        cy: cy as i32,
    })
}

/// Packs the low `CHUNK_BITS` of `x` and `y` into an 18-bit local index,
/// using the unsigned reinterpretation of the low bits so the mapping stays
/// correct for negative coordinates.
fn local_index(x: i64, y: i64) -> u32 {
    #[allow(clippy::cast_sign_loss)]
    let lx = (x & LOCAL_MASK) as u32;
    #[allow(clippy::cast_sign_loss)]
    let ly = (y & LOCAL_MASK) as u32;
    (lx << CHUNK_BITS) | ly
}

fn unpack_local(chunk: ChunkId, index: u32) -> (i64, i64) {
    let lx = i64::from(index >> CHUNK_BITS);
    let ly = i64::from(index & (CHUNK_SIZE as u32 - 1));
    let base_x = i64::from(chunk.cx) << CHUNK_BITS;
    let base_y = i64::from(chunk.cy) << CHUNK_BITS;
    (base_x + lx, base_y + ly)
}

/// A single resident chunk: a sparse map from local index to stone color.
/// Never present in a [`ChunkStore`] while empty.
#[derive(Debug, Default)]
struct Chunk {
    cells: FxHashMap<u32, Color>,
}

/// Sparse, chunked cell storage for one room's board.
///
/// No chunk is ever resident with an empty cell map: [`ChunkStore::set`]
/// creates a chunk lazily on first occupancy, and [`ChunkStore::remove`]
/// deletes it as soon as its last cell is cleared.
#[derive(Debug, Default)]
pub struct ChunkStore {
    chunks: FxHashMap<ChunkId, Chunk>,
}

impl ChunkStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates that a coordinate maps onto a representable chunk, without
    /// touching any chunk's residency.
    pub fn validate(x: i64, y: i64) -> Result<(), OutOfBounds> {
        chunk_id_for(x, y).map(|_| ())
    }

    /// Looks up a cell without creating its chunk.
    #[must_use]
    pub fn get(&self, x: i64, y: i64) -> Option<Color> {
        let id = chunk_id_for(x, y).ok()?;
        let chunk = self.chunks.get(&id)?;
        chunk.cells.get(&local_index(x, y)).copied()
    }

    #[must_use]
    pub fn has(&self, x: i64, y: i64) -> bool {
        self.get(x, y).is_some()
    }

    /// Places a stone, creating the containing chunk if necessary and
    /// overwriting any existing occupant.
    pub fn set(&mut self, x: i64, y: i64, color: Color) -> Result<(), OutOfBounds> {
        let id = chunk_id_for(x, y)?;
        let chunk = self.chunks.entry(id).or_default();
        chunk.cells.insert(local_index(x, y), color);
        Ok(())
    }

    /// Removes a cell if present, deleting its chunk if it becomes empty.
    /// A no-op for unoccupied cells or out-of-range coordinates.
    pub fn remove(&mut self, x: i64, y: i64) {
        let Ok(id) = chunk_id_for(x, y) else {
            return;
        };
        let Some(chunk) = self.chunks.get_mut(&id) else {
            return;
        };
        chunk.cells.remove(&local_index(x, y));
        if chunk.cells.is_empty() {
            self.chunks.remove(&id);
        }
    }

    /// Clears every chunk, returning the cells that were present beforehand.
    pub fn clear(&mut self) -> Vec<Cell> {
        let cells = self.snapshot();
        self.chunks.clear();
        cells
    }

    /// Enumerates every occupied cell. Order is unspecified but stable
    /// within a single call.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Cell> {
        let mut out = Vec::new();
        for (&id, chunk) in &self.chunks {
            for (&index, &color) in &chunk.cells {
                let (x, y) = unpack_local(id, index);
                out.push(Cell { x, y, color });
            }
        }
        out
    }

    /// Number of resident (non-empty) chunks.
    #[must_use]
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }
}
