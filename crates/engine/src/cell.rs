use std::cell::OnceCell;

use rustc_hash::FxHashSet;

use crate::formula::{CellLookup, Formula, FormulaSyntaxError};
use crate::position::Position;
use crate::value::Value;

/// Leading character that marks the rest of the input as a formula.
pub const FORMULA_SIGN: char = '=';
/// Leading character that is kept in a text cell's text but dropped from its value.
pub const ESCAPE_SIGN: char = '\'';

/// What a cell holds. The set of kinds is closed.
#[derive(Debug, Clone, Default)]
pub enum CellContent {
    #[default]
    Empty,
    /// Literal text, never empty.
    Text(String),
    Formula(FormulaCell),
}

/// A parsed formula plus its lazily computed result.
#[derive(Debug, Clone)]
pub struct FormulaCell {
    formula: Formula,
    /// Filled on first read, emptied by invalidation.
    cache: OnceCell<Value>,
}

impl FormulaCell {
    fn new(formula: Formula) -> Self {
        Self {
            formula,
            cache: OnceCell::new(),
        }
    }

    pub fn formula(&self) -> &Formula {
        &self.formula
    }
}

impl CellContent {
    /// Classify raw input:
    /// - `""` is Empty
    /// - `=` followed by at least one character is a Formula
    /// - anything else is Text, stored verbatim
    pub fn from_input(text: &str) -> Result<Self, FormulaSyntaxError> {
        if text.is_empty() {
            return Ok(CellContent::Empty);
        }

        if text.len() > 1 {
            if let Some(expression) = text.strip_prefix(FORMULA_SIGN) {
                let formula = Formula::parse(expression)?;
                return Ok(CellContent::Formula(FormulaCell::new(formula)));
            }
        }

        Ok(CellContent::Text(text.to_string()))
    }

    pub fn text(&self) -> String {
        match self {
            CellContent::Empty => String::new(),
            CellContent::Text(s) => s.clone(),
            CellContent::Formula(f) => format!("{}{}", FORMULA_SIGN, f.formula.expression()),
        }
    }

    pub fn referenced_cells(&self) -> Vec<Position> {
        match self {
            CellContent::Empty | CellContent::Text(_) => Vec::new(),
            CellContent::Formula(f) => f.formula.referenced_cells(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Cell {
    content: CellContent,
    /// Cells whose formulas read this one. Keyed by position, never owning.
    dependents: FxHashSet<Position>,
    /// Set by `clear`, reset by the next `set_content` or new dependent.
    cleared: bool,
}

impl Cell {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn content(&self) -> &CellContent {
        &self.content
    }

    /// Current value.
    ///
    /// For a formula this evaluates on a cache miss and stores the result, so
    /// the first read after an edit does the work and later reads are free.
    pub fn value<L: CellLookup + ?Sized>(&self, lookup: &L) -> Value {
        match &self.content {
            CellContent::Empty => Value::Text(String::new()),
            CellContent::Text(s) => match s.strip_prefix(ESCAPE_SIGN) {
                Some(rest) => Value::Text(rest.to_string()),
                None => Value::Text(s.clone()),
            },
            CellContent::Formula(f) => f
                .cache
                .get_or_init(|| Value::from(f.formula.evaluate(lookup)))
                .clone(),
        }
    }

    /// Text as the user would re-enter it. Formulas come back in canonical form.
    pub fn text(&self) -> String {
        self.content.text()
    }

    pub fn referenced_cells(&self) -> Vec<Position> {
        self.content.referenced_cells()
    }

    pub fn dependents(&self) -> impl Iterator<Item = Position> + '_ {
        self.dependents.iter().copied()
    }

    pub fn has_dependents(&self) -> bool {
        !self.dependents.is_empty()
    }

    /// True if the cell was erased by a clear and nothing has set or
    /// referenced it since.
    pub fn is_cleared(&self) -> bool {
        self.cleared
    }

    pub fn is_empty(&self) -> bool {
        matches!(self.content, CellContent::Empty)
    }

    /// True if this is a formula cell holding a computed result.
    pub fn has_cached_value(&self) -> bool {
        match &self.content {
            CellContent::Formula(f) => f.cache.get().is_some(),
            _ => false,
        }
    }

    /// True if reading the value would run an evaluation.
    pub fn needs_evaluation(&self) -> bool {
        matches!(&self.content, CellContent::Formula(f) if f.cache.get().is_none())
    }

    pub(crate) fn set_content(&mut self, content: CellContent) {
        self.content = content;
        self.cleared = false;
    }

    pub(crate) fn clear(&mut self) {
        self.content = CellContent::Empty;
        self.cleared = true;
    }

    /// Bring a cleared cell back as an Empty placeholder.
    pub(crate) fn revive(&mut self) {
        self.cleared = false;
    }

    pub(crate) fn invalidate_cache(&mut self) {
        if let CellContent::Formula(f) = &mut self.content {
            f.cache.take();
        }
    }

    pub(crate) fn add_dependent(&mut self, pos: Position) {
        self.dependents.insert(pos);
    }

    pub(crate) fn remove_dependent(&mut self, pos: Position) {
        self.dependents.remove(&pos);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::FormulaError;

    fn no_cells(_: Position) -> Result<f64, FormulaError> {
        Ok(0.0)
    }

    fn cell_with(text: &str) -> Cell {
        let mut cell = Cell::new();
        cell.set_content(CellContent::from_input(text).unwrap());
        cell
    }

    #[test]
    fn test_classify_empty() {
        assert!(matches!(CellContent::from_input("").unwrap(), CellContent::Empty));
    }

    #[test]
    fn test_classify_lone_formula_sign_is_text() {
        match CellContent::from_input("=").unwrap() {
            CellContent::Text(s) => assert_eq!(s, "="),
            other => panic!("Expected Text, got {:?}", other),
        }
    }

    #[test]
    fn test_classify_formula() {
        assert!(matches!(
            CellContent::from_input("=1+2").unwrap(),
            CellContent::Formula(_)
        ));
    }

    #[test]
    fn test_classify_syntax_error() {
        assert!(CellContent::from_input("=1+").is_err());
    }

    #[test]
    fn test_empty_cell() {
        let cell = Cell::new();
        assert!(cell.is_empty());
        assert_eq!(cell.text(), "");
        assert_eq!(cell.value(&no_cells), Value::Text(String::new()));
        assert!(cell.referenced_cells().is_empty());
    }

    #[test]
    fn test_plain_text() {
        let cell = cell_with("hello");
        assert_eq!(cell.text(), "hello");
        assert_eq!(cell.value(&no_cells), Value::Text("hello".to_string()));
    }

    #[test]
    fn test_escaped_text() {
        let cell = cell_with("'123");
        assert_eq!(cell.text(), "'123");
        assert_eq!(cell.value(&no_cells), Value::Text("123".to_string()));
    }

    #[test]
    fn test_escaped_formula_sign() {
        let cell = cell_with("'=1+2");
        assert_eq!(cell.text(), "'=1+2");
        assert_eq!(cell.value(&no_cells), Value::Text("=1+2".to_string()));
    }

    #[test]
    fn test_formula_text_is_canonical() {
        let cell = cell_with("=(1 + 2) * (3)");
        assert_eq!(cell.text(), "=(1+2)*3");
    }

    #[test]
    fn test_formula_value_is_cached() {
        let cell = cell_with("=A1*2");
        assert!(!cell.has_cached_value());

        let first = |_: Position| -> Result<f64, FormulaError> { Ok(21.0) };
        assert_eq!(cell.value(&first), Value::Number(42.0));
        assert!(cell.has_cached_value());

        // A different lookup is not consulted while the cache is warm
        let second = |_: Position| -> Result<f64, FormulaError> { Ok(1.0) };
        assert_eq!(cell.value(&second), Value::Number(42.0));
    }

    #[test]
    fn test_invalidate_cache() {
        let mut cell = cell_with("=A1*2");
        let lookup = |_: Position| -> Result<f64, FormulaError> { Ok(5.0) };
        assert_eq!(cell.value(&lookup), Value::Number(10.0));

        cell.invalidate_cache();
        assert!(!cell.has_cached_value());

        let lookup = |_: Position| -> Result<f64, FormulaError> { Ok(6.0) };
        assert_eq!(cell.value(&lookup), Value::Number(12.0));
    }

    #[test]
    fn test_formula_error_is_a_value() {
        let cell = cell_with("=1/0");
        assert_eq!(cell.value(&no_cells), Value::Error(FormulaError::Div0));
    }

    #[test]
    fn test_clear_keeps_dependents() {
        let mut cell = cell_with("x");
        cell.add_dependent(Position::new(3, 3));
        cell.clear();
        assert!(cell.is_empty());
        assert!(cell.is_cleared());
        assert!(cell.has_dependents());
    }

    #[test]
    fn test_set_after_clear_is_not_cleared() {
        let mut cell = cell_with("x");
        cell.clear();
        cell.set_content(CellContent::from_input("").unwrap());
        assert!(cell.is_empty());
        assert!(!cell.is_cleared());
    }

    #[test]
    fn test_content_exposes_formula() {
        let cell = cell_with("=A1+ 2");
        match cell.content() {
            CellContent::Formula(f) => {
                assert_eq!(f.formula().expression(), "A1+2");
                assert_eq!(f.formula().referenced_cells(), vec![Position::new(0, 0)]);
            }
            other => panic!("Expected Formula, got {:?}", other),
        }
        assert!(matches!(cell_with("hi").content(), CellContent::Text(s) if s == "hi"));
    }

    #[test]
    fn test_needs_evaluation() {
        assert!(!Cell::new().needs_evaluation());
        assert!(!cell_with("text").needs_evaluation());

        let cell = cell_with("=1+1");
        assert!(cell.needs_evaluation());
        cell.value(&no_cells);
        assert!(!cell.needs_evaluation());
    }
}
