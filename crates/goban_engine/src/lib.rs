//! Pure liberty-and-capture rule resolution over a [`ChunkStore`].
//!
//! [`resolve`] leaves the store untouched on rejection. On acceptance it
//! places the stone and applies captures itself, so the store reflects the
//! move's full outcome by the time [`resolve`] returns.

use goban_core::{Cell, ChunkStore, Color};
use rustc_hash::FxHashSet;
use std::collections::VecDeque;

/// Why a move was rejected. Carries no wire formatting; that lives in
/// `goban_protocol`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    OutOfBounds,
    Occupied,
}

/// The result of resolving one candidate move against a board.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub accepted: bool,
    pub reason: Option<Rejection>,
    /// Cells removed by this move, in removal order (opponent groups first,
    /// self-capture last; within a BFS, discovery order).
    pub removed: Vec<Cell>,
    /// The placed stone, if it still occupies the board afterwards.
    pub added: Option<Cell>,
}

impl Outcome {
    fn rejected(reason: Rejection) -> Self {
        Self {
            accepted: false,
            reason: Some(reason),
            removed: Vec::new(),
            added: None,
        }
    }
}

/// Four orthogonal neighbors in the fixed scan order east, west, north,
/// south. This order determines both BFS seeding order and (transitively)
/// the order cells appear in [`Outcome::removed`].
fn neighbors4(x: i64, y: i64) -> [(i64, i64); 4] {
    [(x + 1, y), (x - 1, y), (x, y + 1), (x, y - 1)]
}

/// Breadth-first expansion of the same-color group containing `seed`.
/// Returns the group's members (in BFS discovery order) and whether the
/// group touches at least one empty cell. Cells already present in
/// `visited` are never re-expanded, letting callers share one visited set
/// across multiple seeds.
fn bfs_group(
    store: &ChunkStore,
    seed: (i64, i64),
    color: Color,
    visited: &mut FxHashSet<(i64, i64)>,
) -> (Vec<(i64, i64)>, bool) {
    let mut queue = VecDeque::from([seed]);
    let mut member_of_this_call = FxHashSet::default();
    let mut group = Vec::new();
    let mut has_liberty = false;

    while let Some(cur) = queue.pop_front() {
        if !member_of_this_call.insert(cur) {
            continue;
        }
        visited.insert(cur);
        group.push(cur);

        for (nx, ny) in neighbors4(cur.0, cur.1) {
            match store.get(nx, ny) {
                None => has_liberty = true,
                Some(c) if c == color => {
                    if !member_of_this_call.contains(&(nx, ny)) {
                        queue.push_back((nx, ny));
                    }
                }
                Some(_) => {}
            }
        }
    }

    (group, has_liberty)
}

/// Resolves a candidate move.
///
/// Rejection conditions, checked in order: coordinate out of the
/// representable chunk range, then the target cell already occupied.
///
/// Otherwise the stone is tentatively placed, opponent groups adjacent to it
/// that lost their last liberty are captured, then the placed stone's own
/// group is captured too if it still lacks a liberty (suicide, permitted).
pub fn resolve(store: &mut ChunkStore, x: i64, y: i64, color: Color) -> Outcome {
    if ChunkStore::validate(x, y).is_err() {
        return Outcome::rejected(Rejection::OutOfBounds);
    }
    if store.has(x, y) {
        return Outcome::rejected(Rejection::Occupied);
    }

    // Placement cannot fail now: the coordinate already validated above.
    store.set(x, y, color).expect("validated coordinate");

    let mut removed = Vec::new();
    let mut visited_opponents = FxHashSet::default();

    for (nx, ny) in neighbors4(x, y) {
        let Some(opp_color) = store.get(nx, ny) else {
            continue;
        };
        if opp_color == color || visited_opponents.contains(&(nx, ny)) {
            continue;
        }
        let (group, has_liberty) = bfs_group(store, (nx, ny), opp_color, &mut visited_opponents);
        if !has_liberty {
            for (gx, gy) in group {
                store.remove(gx, gy);
                removed.push(Cell {
                    x: gx,
                    y: gy,
                    color: opp_color,
                });
            }
        }
    }

    let mut visited_self = FxHashSet::default();
    let (self_group, self_liberty) = bfs_group(store, (x, y), color, &mut visited_self);
    if !self_liberty {
        for (gx, gy) in self_group {
            store.remove(gx, gy);
            removed.push(Cell {
                x: gx,
                y: gy,
                color,
            });
        }
    }

    let added = store.has(x, y).then_some(Cell { x, y, color });

    Outcome {
        accepted: true,
        reason: None,
        removed,
        added,
    }
}
