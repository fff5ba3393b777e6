//! Character-accurate diff used to forward host edits to the external engine.

use std::vec;

use imara_diff::{
  Algorithm,
  Diff,
  Hunk,
  InternedInput,
};

use crate::{
  LineEnding,
  LineIndex,
  Position,
  SENTINEL,
  columns::char_to_byte_col,
  replay::split_lines,
};

/// Replace chars `start..end` of the old text with `text`.
///
/// Offsets count chars of the old text; `start_pos`/`end_pos` are the same
/// bounds as rows and char columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextPatch {
  pub start:     usize,
  pub end:       usize,
  pub start_pos: Position,
  pub end_pos:   Position,
  pub text:      String,
}

/// Lazily yields the [`TextPatch`]es of a char diff in ascending order.
pub struct CharPatches {
  hunks:  vec::IntoIter<Hunk>,
  before: Vec<char>,
  after:  Vec<char>,
  index:  LineIndex,
  /// Row of the previous patch's end, anchors the next position lookup.
  hint:   usize,
  /// Length difference introduced by the patches yielded so far.
  delta:  isize,
  done:   bool,
}

fn sentinel_suffix(eol: LineEnding) -> Vec<char> {
  let mut suffix = String::new();
  for marker in SENTINEL {
    suffix.push_str(eol.as_str());
    suffix.push_str(marker);
  }
  suffix.chars().collect()
}

/// Computes the char-level patches turning `before` into `after`.
pub fn diff_chars(before: &str, after: &str, eol: LineEnding) -> CharPatches {
  let before: Vec<char> = before.chars().collect();
  let after: Vec<char> = after.chars().collect();
  let suffix = sentinel_suffix(eol);

  let mut input = InternedInput::default();
  input.update_before(before.iter().chain(&suffix).copied());
  input.update_after(after.iter().chain(&suffix).copied());
  // the histogram heuristic does not work well for chars since the same
  // chars reoccur constantly
  let mut diff = Diff::default();
  diff.compute_with(
    Algorithm::Myers,
    &input.before,
    &input.after,
    input.interner.num_tokens(),
  );
  let hunks: Vec<Hunk> = diff.hunks().collect();
  let index = LineIndex::from_chars(before.iter().copied(), eol);

  CharPatches {
    hunks: hunks.into_iter(),
    before,
    after,
    index,
    hint: 0,
    delta: 0,
    done: false,
  }
}

impl CharPatches {
  fn is_line_break_split(&self, offset: usize) -> bool {
    self.index.line_ending() == LineEnding::Crlf
      && offset > 0
      && self.before.get(offset - 1) == Some(&'\r')
      && self.before.get(offset) == Some(&'\n')
  }
}

impl Iterator for CharPatches {
  type Item = TextPatch;

  fn next(&mut self) -> Option<TextPatch> {
    if self.done {
      return None;
    }
    let hunk = self.hunks.next()?;
    let len_before = self.before.len();
    let len_after = self.after.len();

    let mut start = hunk.before.start as usize;
    let mut end = hunk.before.end as usize;
    let mut text: String;

    if end > len_before || hunk.after.end as usize > len_after {
      // The hunk reaches into the shared sentinel suffix. Everything from
      // here to the end of the real text is rewritten in one patch, and any
      // remaining hunks lie entirely inside the suffix.
      self.done = true;
      start = start.min(len_before);
      end = len_before;
      let mut from = (start as isize + self.delta).max(0) as usize;
      // the unchanged run in front of the hunk may already overlap the
      // suffix on the new side; those chars are common to both texts
      let overlap = from.saturating_sub(len_after);
      start -= overlap.min(start);
      from -= overlap;
      text = self.after[from..].iter().collect();
      if start == end && text.is_empty() {
        return None;
      }
    } else {
      text = self.after[hunk.after.start as usize..hunk.after.end as usize]
        .iter()
        .collect();
      self.delta += hunk.after.len() as isize - hunk.before.len() as isize;
    }

    // never split a CRLF pair: widen the patch to cover the whole break
    if self.is_line_break_split(start) {
      start -= 1;
      text.insert(0, '\r');
    }
    if end < len_before && self.is_line_break_split(end) {
      end += 1;
      text.push('\n');
    }

    let start_pos = self.index.position_from(start, self.hint);
    let end_pos = self.index.position_from(end, start_pos.row);
    self.hint = end_pos.row;

    Some(TextPatch {
      start,
      end,
      start_pos,
      end_pos,
      text,
    })
  }
}

/// Applies patches produced by [`diff_chars`] to `text`.
pub fn apply_patches(text: &str, patches: &[TextPatch]) -> String {
  let chars: Vec<char> = text.chars().collect();
  let mut out = String::with_capacity(text.len());
  let mut cursor = 0;
  for patch in patches {
    out.extend(&chars[cursor..patch.start]);
    out.push_str(&patch.text);
    cursor = patch.end;
  }
  out.extend(&chars[cursor..]);
  out
}

/// One line-replacement call for the external engine.
///
/// Replaces lines `start_line..end_line` with `lines`. `start_line` and
/// `end_line` already account for every earlier call in the same batch, so
/// calls must be applied in order. `start_byte` and `end_byte` are the UTF-8
/// byte columns of the changed span inside the first and last replaced line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineReplace {
  pub start_line: usize,
  pub end_line:   usize,
  pub exclusive:  bool,
  pub lines:      Vec<String>,
  pub start_byte: usize,
  pub end_byte:   usize,
}

/// Folds `patches` (computed against `before`) into line-replacement calls.
///
/// Patches touching the same line share a call, so no call ever overwrites
/// the effect of another.
pub fn line_replacements(before: &str, patches: &[TextPatch], eol: LineEnding) -> Vec<LineReplace> {
  let chars: Vec<char> = before.chars().collect();
  let index = LineIndex::new(before, eol);
  let line_text = |row: usize| -> String {
    chars[index.line_start(row)..index.line_end(row)]
      .iter()
      .collect()
  };

  let mut calls = Vec::new();
  let mut shift: isize = 0;
  let mut rest = patches;
  while let Some(first) = rest.first() {
    let first_row = first.start_pos.row;
    let mut last_row = first.end_pos.row;
    let mut len = 1;
    while let Some(next) = rest.get(len) {
      if next.start_pos.row > last_row {
        break;
      }
      last_row = last_row.max(next.end_pos.row);
      len += 1;
    }
    let (group, tail) = rest.split_at(len);
    rest = tail;

    let mut region = String::new();
    let mut cursor = index.line_start(first_row);
    for patch in group {
      region.extend(&chars[cursor..patch.start]);
      region.push_str(&patch.text);
      cursor = patch.end;
    }
    region.extend(&chars[cursor..index.line_end(last_row).max(cursor)]);
    let lines = split_lines(&region, eol);

    let last = &group[group.len() - 1];
    let replaced = last_row + 1 - first_row;
    let start_line = (first_row as isize + shift) as usize;
    shift += lines.len() as isize - replaced as isize;

    calls.push(LineReplace {
      start_line,
      end_line: start_line + replaced,
      exclusive: true,
      start_byte: char_to_byte_col(&line_text(first_row), first.start_pos.col),
      end_byte: char_to_byte_col(&line_text(last_row), last.end_pos.col),
      lines,
    });
  }
  calls
}

/// Applies line-replacement calls in order.
pub fn apply_line_replacements(lines: &mut Vec<String>, calls: &[LineReplace]) {
  for call in calls {
    let end = call.end_line.min(lines.len());
    let start = call.start_line.min(end);
    lines.splice(start..end, call.lines.iter().cloned());
  }
}
