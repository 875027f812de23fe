use std::fmt;

use crate::dep_graph::CycleReport;
use crate::formula::FormulaSyntaxError;
use crate::position::Position;

/// Reasons a sheet operation is rejected. A rejected operation leaves the
/// sheet exactly as it was.
#[derive(Debug, Clone, PartialEq)]
pub enum SheetError {
    /// Position outside the grid (or unparseable A1 text).
    InvalidPosition(Position),
    /// The new content would make a cell depend on itself.
    CircularDependency(CycleReport),
    /// Formula text failed to parse.
    FormulaSyntax(FormulaSyntaxError),
}

impl fmt::Display for SheetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidPosition(pos) => {
                write!(f, "invalid position: ({}, {})", pos.row, pos.col)
            }
            Self::CircularDependency(report) => write!(f, "{report}"),
            Self::FormulaSyntax(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for SheetError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::InvalidPosition(_) => None,
            Self::CircularDependency(report) => Some(report),
            Self::FormulaSyntax(err) => Some(err),
        }
    }
}

impl From<CycleReport> for SheetError {
    fn from(report: CycleReport) -> Self {
        Self::CircularDependency(report)
    }
}

impl From<FormulaSyntaxError> for SheetError {
    fn from(err: FormulaSyntaxError) -> Self {
        Self::FormulaSyntax(err)
    }
}
