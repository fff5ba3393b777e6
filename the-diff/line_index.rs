use crate::{
  LineEnding,
  Position,
};

/// Prefix sums of line start offsets (in chars) for a text.
///
/// Line breaks are recognized according to the document's [`LineEnding`]
/// only, so the rows reported here always agree with the rows obtained by
/// splitting the text on that line ending.
#[derive(Debug, Clone)]
pub struct LineIndex {
  starts:    Vec<usize>,
  len_chars: usize,
  eol:       LineEnding,
}

impl LineIndex {
  pub fn new(text: &str, eol: LineEnding) -> Self {
    Self::from_chars(text.chars(), eol)
  }

  pub fn from_chars(chars: impl IntoIterator<Item = char>, eol: LineEnding) -> Self {
    let mut starts = vec![0];
    let mut offset = 0;
    let mut prev_cr = false;
    for ch in chars {
      offset += 1;
      let line_break = match eol {
        LineEnding::LF => ch == '\n',
        LineEnding::Crlf => ch == '\n' && prev_cr,
      };
      if line_break {
        starts.push(offset);
      }
      prev_cr = ch == '\r';
    }

    Self {
      starts,
      len_chars: offset,
      eol,
    }
  }

  pub fn len_lines(&self) -> usize {
    self.starts.len()
  }

  pub fn len_chars(&self) -> usize {
    self.len_chars
  }

  pub fn line_ending(&self) -> LineEnding {
    self.eol
  }

  /// Char offset of the first char of `row`. Rows past the end clamp to the
  /// end of the text.
  pub fn line_start(&self, row: usize) -> usize {
    self.starts.get(row).copied().unwrap_or(self.len_chars)
  }

  /// Char offset just before the line break that terminates `row`.
  pub fn line_end(&self, row: usize) -> usize {
    match self.starts.get(row + 1) {
      Some(next) => next - self.eol.len_chars(),
      None => self.len_chars,
    }
  }

  pub fn line_len(&self, row: usize) -> usize {
    self.line_end(row).saturating_sub(self.line_start(row))
  }

  /// Char offset of `pos`, clamped to the line it names.
  pub fn offset(&self, pos: Position) -> usize {
    let row = pos.row.min(self.starts.len() - 1);
    self.line_start(row) + pos.col.min(self.line_len(row))
  }

  pub fn position(&self, offset: usize) -> Position {
    self.position_from(offset, 0)
  }

  /// Converts a char offset into a [`Position`], searching only rows at or
  /// after `hint`. Scanning a sorted sequence of offsets with the previous
  /// result's row as the hint keeps every lookup close to the last one.
  ///
  /// An offset that falls between the two chars of a CRLF pair yields a
  /// column one past the end of the line.
  pub fn position_from(&self, offset: usize, hint: usize) -> Position {
    let offset = offset.min(self.len_chars);
    let hint = hint.min(self.starts.len() - 1);
    let row = if self.starts[hint] <= offset {
      hint + self.starts[hint..].partition_point(|&start| start <= offset) - 1
    } else {
      self.starts.partition_point(|&start| start <= offset) - 1
    };
    Position::new(row, offset - self.starts[row])
  }
}
