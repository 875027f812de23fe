//! Cell coordinates.
//!
//! A `Position` is a 0-based `(row, col)` pair. Positions are compared and
//! hashed by value and are the keys under which a `Sheet` stores its cells.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::SheetError;

const LETTERS: i32 = 26;
const MAX_POSITION_LENGTH: usize = 17;
const MAX_POS_LETTER_COUNT: usize = 3;

/// Row/column coordinate of a cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Position {
    /// Row index (0-based)
    pub row: i32,
    /// Column index (0-based)
    pub col: i32,
}

impl Position {
    pub const MAX_ROWS: i32 = 16384;
    pub const MAX_COLS: i32 = 16384;

    /// Sentinel for "no such position". Never valid.
    pub const NONE: Position = Position { row: -1, col: -1 };

    #[inline]
    pub const fn new(row: i32, col: i32) -> Self {
        Self { row, col }
    }

    /// True if both coordinates are inside the grid.
    pub fn is_valid(&self) -> bool {
        self.row >= 0 && self.col >= 0 && self.row < Self::MAX_ROWS && self.col < Self::MAX_COLS
    }

    /// Parse A1 notation (`"A1"`, `"AB12"`). Returns `Position::NONE` when the
    /// text is malformed or names a cell outside the grid.
    pub fn from_a1(s: &str) -> Position {
        parse_a1(s).unwrap_or(Position::NONE)
    }
}

fn parse_a1(s: &str) -> Option<Position> {
    if s.is_empty() || s.len() > MAX_POSITION_LENGTH {
        return None;
    }

    let letter_count = s.bytes().take_while(|b| b.is_ascii_uppercase()).count();
    if letter_count == 0 || letter_count > MAX_POS_LETTER_COUNT {
        return None;
    }

    let (letters, digits) = s.split_at(letter_count);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let row: i32 = digits.parse().ok()?;
    if row < 1 {
        return None;
    }

    let col = letters
        .bytes()
        .fold(0i32, |acc, b| acc * LETTERS + i32::from(b - b'A') + 1);

    let pos = Position::new(row - 1, col - 1);
    pos.is_valid().then_some(pos)
}

/// Convert a 0-based column index to letters: 0 -> A, 25 -> Z, 26 -> AA.
pub(crate) fn col_to_letters(col: i32) -> String {
    let mut result = String::new();
    let mut n = col + 1;
    while n > 0 {
        n -= 1;
        result.insert(0, char::from(b'A' + (n % LETTERS) as u8));
        n /= LETTERS;
    }
    result
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.is_valid() {
            return Ok(());
        }
        write!(f, "{}{}", col_to_letters(self.col), self.row + 1)
    }
}

impl FromStr for Position {
    type Err = SheetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_a1(s).ok_or(SheetError::InvalidPosition(Position::NONE))
    }
}

/// Dimensions of a rectangular area of the sheet.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Size {
    pub rows: i32,
    pub cols: i32,
}

impl Size {
    pub const fn new(rows: i32, cols: i32) -> Self {
        Self { rows, cols }
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.rows, self.cols)
    }
}
