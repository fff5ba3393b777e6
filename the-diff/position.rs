use std::ops::{
  Add,
  AddAssign,
};

use crate::LineEnding;

/// A single point in a document.
/// 0-indexed; `col` counts chars (Unicode scalar values), not bytes.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Position {
  pub row: usize,
  pub col: usize,
}

impl AddAssign for Position {
  fn add_assign(&mut self, rhs: Self) {
    self.row += rhs.row;
    self.col += rhs.col;
  }
}

impl Add for Position {
  type Output = Position;

  fn add(mut self, rhs: Self) -> Self::Output {
    self += rhs;
    self
  }
}

impl Position {
  pub const fn new(row: usize, col: usize) -> Self {
    Self { row, col }
  }

  pub const fn zero() -> Self {
    Self { row: 0, col: 0 }
  }

  /// Position reached after writing `text` starting at `self`.
  pub fn traverse(self, text: &str, eol: LineEnding) -> Self {
    let Self { mut row, mut col } = self;
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
      let line_break = match eol {
        LineEnding::LF => ch == '\n',
        LineEnding::Crlf => ch == '\r' && chars.next_if_eq(&'\n').is_some(),
      };
      if line_break {
        row += 1;
        col = 0;
      } else {
        col += 1;
      }
    }

    Self { row, col }
  }
}

impl From<(usize, usize)> for Position {
  fn from(value: (usize, usize)) -> Self {
    Position::new(value.0, value.1)
  }
}
