//! Dependency bookkeeping between cells.
//!
//! Each cell stores its *dependents*: the positions of formula cells that read
//! it. The reverse direction (what a formula reads) is derived from the
//! formula itself via `Cell::referenced_cells`.
//!
//! # Edge Direction
//!
//! ```text
//! A → B  means  "B depends on A"  (B ∈ dependents(A))
//! ```
//!
//! # Invariants
//!
//! 1. **Inverse consistency:** B ∈ dependents(A) iff A ∈ referenced_cells(B).
//! 2. **Acyclic:** edits that would close a loop are rejected by
//!    `would_create_cycle` before anything is mutated.
//! 3. **Resolvable:** every referenced position has a stored cell (possibly Empty).

use std::fmt;

use log::trace;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::cell::Cell;
use crate::position::Position;

/// Storage the graph operates on. Owned by `Sheet`.
pub type CellStore = FxHashMap<Position, Cell>;

/// Check whether giving `cell` the references `new_refs` would close a loop.
///
/// Does not modify the store. Returns `Some(CycleReport)` if a cycle would be
/// introduced, `None` otherwise.
///
/// # Algorithm
///
/// A cycle appears if any of `new_refs` already depends on `cell`, directly or
/// transitively (or is `cell` itself). We DFS from `cell` along dependent
/// edges and stop at the first visited cell that is one of `new_refs`. Every
/// cell is visited at most once.
pub fn would_create_cycle(
    cells: &CellStore,
    cell: Position,
    new_refs: &[Position],
) -> Option<CycleReport> {
    if new_refs.is_empty() {
        return None;
    }

    let new_refs_set: FxHashSet<Position> = new_refs.iter().copied().collect();
    // Parent in the DFS tree, used to rebuild the loop for the report
    let mut came_from: FxHashMap<Position, Position> = FxHashMap::default();
    let mut visited = FxHashSet::default();
    let mut stack = vec![cell];

    while let Some(current) = stack.pop() {
        if !visited.insert(current) {
            continue;
        }

        if new_refs_set.contains(&current) {
            if current == cell {
                return Some(CycleReport::self_reference(cell));
            }
            return Some(CycleReport::cycle(loop_path(cell, current, &came_from)));
        }

        if let Some(node) = cells.get(&current) {
            for dep in node.dependents() {
                if !visited.contains(&dep) {
                    came_from.entry(dep).or_insert(current);
                    stack.push(dep);
                }
            }
        }
    }

    None
}

/// Rebuild the loop in "reads" order: `cell` would read `hit`, `hit` reads
/// ... reads `cell`.
fn loop_path(
    cell: Position,
    hit: Position,
    came_from: &FxHashMap<Position, Position>,
) -> Vec<Position> {
    let mut path = vec![cell];
    let mut current = hit;
    while current != cell {
        path.push(current);
        match came_from.get(&current) {
            Some(&parent) => current = parent,
            None => break,
        }
    }
    path.push(cell);
    path
}

/// Drop the back-edges `formula_cell` registered on the cells it used to read.
pub(crate) fn unlink(cells: &mut CellStore, formula_cell: Position, old_refs: &[Position]) {
    for pred in old_refs {
        if let Some(node) = cells.get_mut(pred) {
            node.remove_dependent(formula_cell);
        }
    }
}

/// Register `formula_cell` as a dependent of every cell it reads, creating
/// Empty placeholders for positions that have no cell yet. A cleared cell
/// that gets referenced again counts as a placeholder from then on.
pub(crate) fn link(cells: &mut CellStore, formula_cell: Position, new_refs: &[Position]) {
    for pred in new_refs {
        let node = cells.entry(*pred).or_insert_with(|| {
            trace!("creating placeholder cell {}", pred);
            Cell::new()
        });
        if node.is_cleared() {
            trace!("reviving cleared cell {}", pred);
            node.revive();
        }
        node.add_dependent(formula_cell);
    }
}

/// Clear the cached result of `start` and of every cell that depends on it,
/// transitively. Returns the number of cells visited.
///
/// Values are not recomputed here; the next read of each cell does that.
pub(crate) fn invalidate(cells: &mut CellStore, start: Position) -> usize {
    let mut visited = FxHashSet::default();
    let mut stack = vec![start];

    while let Some(current) = stack.pop() {
        if !visited.insert(current) {
            continue;
        }
        if let Some(node) = cells.get_mut(&current) {
            node.invalidate_cache();
            stack.extend(node.dependents().filter(|dep| !visited.contains(dep)));
        }
    }

    visited.len()
}

/// Report when an edit would introduce a circular reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    /// The loop, starting and ending at the edited cell. Each cell reads the
    /// next one.
    pub cells: Vec<Position>,

    /// Human-readable description of the cycle.
    pub message: String,
}

impl CycleReport {
    /// Create a cycle report for a self-referencing cell.
    pub fn self_reference(cell: Position) -> Self {
        Self {
            cells: vec![cell, cell],
            message: format!("Cell {} references itself", cell),
        }
    }

    /// Create a cycle report for a multi-cell loop.
    pub fn cycle(cells: Vec<Position>) -> Self {
        let cell_list: Vec<String> = cells.iter().map(|c| c.to_string()).collect();
        let message = if cells.len() <= 6 {
            format!("Circular reference: {}", cell_list.join(" → "))
        } else {
            format!(
                "Circular reference involving {} cells: {} → {} → ... → {}",
                cells.len() - 1,
                cell_list[0],
                cell_list[1],
                cell_list[cell_list.len() - 1]
            )
        };
        Self { cells, message }
    }

    /// The cell whose edit was rejected.
    pub fn cell(&self) -> Option<Position> {
        self.cells.first().copied()
    }
}

impl fmt::Display for CycleReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CycleReport {}
