use std::io::{self, Write};

use log::debug;
use rustc_hash::FxHashSet;
use serde::Serialize;

use crate::cell::{Cell, CellContent};
use crate::dep_graph::{self, CellStore};
use crate::error::SheetError;
use crate::formula::CellLookup;
use crate::position::{Position, Size};
use crate::value::{FormulaError, Value};

/// Sparse grid of cells.
///
/// The sheet owns every cell. Cells refer to each other only by `Position`,
/// and a stored cell is never removed, so a dependent edge can always be
/// resolved through `cells`.
#[derive(Debug, Default)]
pub struct Sheet {
    cells: CellStore,
}

impl CellLookup for Sheet {
    fn lookup(&self, pos: Position) -> Result<f64, FormulaError> {
        if !pos.is_valid() {
            return Err(FormulaError::Ref);
        }

        let Some(cell) = self.cells.get(&pos) else {
            return Ok(0.0);
        };

        // Keeps formula-to-formula reads one level deep
        if cell.needs_evaluation() {
            self.warm_caches(pos);
        }

        match cell.value(self) {
            Value::Number(n) => Ok(n),
            Value::Text(text) => text_to_number(&text),
            Value::Error(e) => Err(e),
        }
    }
}

/// Strict numeric reading of a text value: the whole trimmed text must be a
/// finite number. Empty text reads as zero.
fn text_to_number(text: &str) -> Result<f64, FormulaError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Ok(0.0);
    }
    match trimmed.parse::<f64>() {
        Ok(n) if n.is_finite() => Ok(n),
        _ => Err(FormulaError::Value),
    }
}

fn check_position(pos: Position) -> Result<(), SheetError> {
    if pos.is_valid() {
        Ok(())
    } else {
        Err(SheetError::InvalidPosition(pos))
    }
}

impl Sheet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Evaluate every uncached formula that `start` reads, directly or
    /// transitively, deepest first, using an explicit stack.
    ///
    /// When a cell is evaluated all of its references already hold a value,
    /// so evaluation depth does not grow with the length of a reference chain.
    fn warm_caches(&self, start: Position) {
        let mut expanded = FxHashSet::default();
        // (position, references already pushed)
        let mut stack = vec![(start, false)];

        while let Some((pos, ready)) = stack.pop() {
            let Some(cell) = self.cells.get(&pos) else {
                continue;
            };
            if !cell.needs_evaluation() {
                continue;
            }
            if ready {
                cell.value(self);
                continue;
            }
            if !expanded.insert(pos) {
                continue;
            }

            stack.push((pos, true));
            for target in cell.referenced_cells() {
                let pending = self
                    .cells
                    .get(&target)
                    .is_some_and(Cell::needs_evaluation);
                if pending && !expanded.contains(&target) {
                    stack.push((target, false));
                }
            }
        }
    }

    /// Set a cell from user input.
    ///
    /// The edit is checked completely before anything changes: an invalid
    /// position, a formula syntax error or a circular reference leaves the
    /// sheet untouched. On success the cell's cached value and those of all
    /// its dependents are invalidated.
    pub fn set_cell(&mut self, pos: Position, text: &str) -> Result<(), SheetError> {
        check_position(pos)?;

        let content = CellContent::from_input(text)?;
        let new_refs = content.referenced_cells();

        if let Some(report) = dep_graph::would_create_cycle(&self.cells, pos, &new_refs) {
            debug!("rejected edit of {}: {}", pos, report);
            return Err(report.into());
        }

        let old_refs = self
            .cells
            .get(&pos)
            .map(Cell::referenced_cells)
            .unwrap_or_default();
        dep_graph::unlink(&mut self.cells, pos, &old_refs);

        self.cells.entry(pos).or_default().set_content(content);
        dep_graph::link(&mut self.cells, pos, &new_refs);

        let invalidated = dep_graph::invalidate(&mut self.cells, pos);
        debug!(
            "set {} ({} refs), invalidated {} cells",
            pos,
            new_refs.len(),
            invalidated
        );
        Ok(())
    }

    /// The cell at `pos`, if one is stored. Never creates a cell.
    pub fn cell(&self, pos: Position) -> Result<Option<&Cell>, SheetError> {
        check_position(pos)?;
        Ok(self.cells.get(&pos))
    }

    /// Reset the cell at `pos` to Empty and drop it from the print area. A
    /// missing or already cleared cell is left alone.
    ///
    /// The cell stays stored so cells that read it resolve to an Empty cell;
    /// their cached values are invalidated.
    pub fn clear_cell(&mut self, pos: Position) -> Result<(), SheetError> {
        check_position(pos)?;

        let Some(cell) = self.cells.get_mut(&pos) else {
            return Ok(());
        };
        if cell.is_cleared() {
            return Ok(());
        }

        let old_refs = cell.referenced_cells();
        cell.clear();
        dep_graph::unlink(&mut self.cells, pos, &old_refs);

        let invalidated = dep_graph::invalidate(&mut self.cells, pos);
        debug!("cleared {}, invalidated {} cells", pos, invalidated);
        Ok(())
    }

    /// Value of the cell at `pos`; an absent cell reads as empty text.
    pub fn value(&self, pos: Position) -> Result<Value, SheetError> {
        let Some(cell) = self.cell(pos)? else {
            return Ok(Value::default());
        };
        if cell.needs_evaluation() {
            self.warm_caches(pos);
        }
        Ok(cell.value(self))
    }

    /// Text of the cell at `pos`; an absent cell has empty text.
    pub fn text(&self, pos: Position) -> Result<String, SheetError> {
        Ok(self.cell(pos)?.map(Cell::text).unwrap_or_default())
    }

    pub fn cells_iter(&self) -> impl Iterator<Item = (&Position, &Cell)> {
        self.cells.iter()
    }

    /// Number of stored cells, including Empty placeholders.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    // =========================================================================
    // Print area
    // =========================================================================

    /// Every stored cell takes part in the print area, including Empty ones
    /// set explicitly or created as placeholders. A cleared cell drops out
    /// unless some formula still reads it.
    fn is_printable(cell: &Cell) -> bool {
        !cell.is_cleared() || cell.has_dependents()
    }

    /// Top-left and bottom-right corners of the print area.
    fn print_area(&self) -> Option<(Position, Position)> {
        let mut printable = self
            .cells
            .iter()
            .filter(|(_, cell)| Self::is_printable(cell))
            .map(|(pos, _)| *pos);

        let first = printable.next()?;
        let (min, max) = printable.fold((first, first), |(min, max), pos| {
            (
                Position::new(min.row.min(pos.row), min.col.min(pos.col)),
                Position::new(max.row.max(pos.row), max.col.max(pos.col)),
            )
        });
        Some((min, max))
    }

    pub fn printable_size(&self) -> Size {
        match self.print_area() {
            Some((min, max)) => Size::new(max.row - min.row + 1, max.col - min.col + 1),
            None => Size::default(),
        }
    }

    /// Write every row of the print area, cells separated by tabs.
    pub fn print_values<W: Write>(&self, out: &mut W) -> io::Result<()> {
        self.print_with(out, |cell| cell.value(self).to_string())
    }

    pub fn print_texts<W: Write>(&self, out: &mut W) -> io::Result<()> {
        self.print_with(out, Cell::text)
    }

    fn print_with<W, F>(&self, out: &mut W, render: F) -> io::Result<()>
    where
        W: Write,
        F: Fn(&Cell) -> String,
    {
        let Some((min, max)) = self.print_area() else {
            return Ok(());
        };

        for row in min.row..=max.row {
            let line: Vec<String> = (min.col..=max.col)
                .map(|col| {
                    self.cells
                        .get(&Position::new(row, col))
                        .map(&render)
                        .unwrap_or_default()
                })
                .collect();
            writeln!(out, "{}", line.join("\t"))?;
        }
        Ok(())
    }

    /// Serialisable view of the print area, for machine-readable output.
    pub fn snapshot(&self) -> SheetSnapshot {
        let mut cells: Vec<CellSnapshot> = self
            .cells
            .iter()
            .filter(|(_, cell)| !cell.is_empty())
            .map(|(pos, cell)| CellSnapshot {
                position: pos.to_string(),
                row: pos.row,
                col: pos.col,
                text: cell.text(),
                value: cell.value(self),
            })
            .collect();
        cells.sort_by_key(|c| (c.row, c.col));

        SheetSnapshot {
            size: self.printable_size(),
            origin: self.print_area().map(|(min, _)| min.to_string()),
            cells,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SheetSnapshot {
    pub size: Size,
    /// Top-left cell of the print area, absent for an empty sheet.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
    pub cells: Vec<CellSnapshot>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CellSnapshot {
    pub position: String,
    pub row: i32,
    pub col: i32,
    pub text: String,
    pub value: Value,
}
