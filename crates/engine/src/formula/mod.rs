//! Formula parsing and evaluation.
//!
//! `Formula` is what a formula cell holds: a parsed expression that can be
//! evaluated against a [`CellLookup`], list the cells it reads, and print
//! itself back in canonical form.

pub mod eval;
pub mod parser;

use std::fmt;

use crate::position::Position;
use crate::value::FormulaError;

pub use eval::CellLookup;
use parser::Expr;

/// The formula text could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormulaSyntaxError {
    pub message: String,
}

impl FormulaSyntaxError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for FormulaSyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "formula syntax error: {}", self.message)
    }
}

impl std::error::Error for FormulaSyntaxError {}

#[derive(Debug, Clone, PartialEq)]
pub struct Formula {
    expr: Expr,
}

impl Formula {
    /// Parse an expression (the formula text without its leading '=').
    pub fn parse(expression: &str) -> Result<Self, FormulaSyntaxError> {
        parser::parse(expression).map(|expr| Self { expr })
    }

    pub fn evaluate<L: CellLookup + ?Sized>(&self, lookup: &L) -> Result<f64, FormulaError> {
        eval::evaluate(&self.expr, lookup)
    }

    /// Valid positions this formula reads, sorted and without duplicates.
    pub fn referenced_cells(&self) -> Vec<Position> {
        let mut cells: Vec<Position> = parser::extract_cell_refs(&self.expr)
            .into_iter()
            .filter(Position::is_valid)
            .collect();
        cells.sort_unstable();
        cells.dedup();
        cells
    }

    /// Canonical text of the expression, without the leading '='.
    pub fn expression(&self) -> String {
        parser::format_expr(&self.expr)
    }
}
