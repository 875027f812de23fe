pub mod cell;
pub mod dep_graph;
pub mod error;
pub mod formula;
pub mod position;
pub mod sheet;
pub mod value;

pub use cell::{Cell, CellContent};
pub use dep_graph::CycleReport;
pub use error::SheetError;
pub use formula::{Formula, FormulaSyntaxError};
pub use position::{Position, Size};
pub use sheet::{Sheet, SheetSnapshot};
pub use value::{FormulaError, Value};
