//! Line-level diff between the host text and a replayed external buffer.

use std::ops::Range;

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
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
  Added,
  Removed,
  Changed,
}

/// A contiguous run of lines that differs between `before` and `after`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineChange {
  pub kind:   ChangeKind,
  pub before: Range<u32>,
  pub after:  Range<u32>,
}

impl LineChange {
  pub fn new(before: Range<u32>, after: Range<u32>) -> Self {
    let kind = match (before.is_empty(), after.is_empty()) {
      (true, _) => ChangeKind::Added,
      (false, true) => ChangeKind::Removed,
      (false, false) => ChangeKind::Changed,
    };
    Self {
      kind,
      before,
      after,
    }
  }
}

impl From<Hunk> for LineChange {
  fn from(hunk: Hunk) -> Self {
    LineChange::new(hunk.before, hunk.after)
  }
}

fn as_str<S: AsRef<str>>(line: &S) -> &str {
  line.as_ref()
}

/// Computes the line changes turning `before` into `after`.
///
/// Lines are interned so the diff runs over one token per distinct line.
pub fn diff_lines<S: AsRef<str>>(before: &[S], after: &[S]) -> Vec<LineChange> {
  let mut input = InternedInput::default();
  input.update_before(before.iter().map(as_str).chain(SENTINEL));
  input.update_after(after.iter().map(as_str).chain(SENTINEL));

  let mut diff = Diff::default();
  diff.compute_with(
    Algorithm::Histogram,
    &input.before,
    &input.after,
    input.interner.num_tokens(),
  );

  let len_before = u32::try_from(before.len()).unwrap_or(u32::MAX);
  let len_after = u32::try_from(after.len()).unwrap_or(u32::MAX);
  let changes = diff
    .hunks()
    .filter_map(|hunk| {
      // sentinel lines are unique and shared, so they should never land in a
      // hunk; trim them anyway rather than emit edits past the document end
      let before = hunk.before.start.min(len_before)..hunk.before.end.min(len_before);
      let after = hunk.after.start.min(len_after)..hunk.after.end.min(len_after);
      (!before.is_empty() || !after.is_empty()).then(|| LineChange::new(before, after))
    })
    .collect();
  coalesce(changes)
}

/// Merges changes that touch each other in both coordinate spaces, so a
/// removal immediately followed by an addition becomes a single
/// [`ChangeKind::Changed`] range instead of two edits.
pub fn coalesce(changes: Vec<LineChange>) -> Vec<LineChange> {
  let mut merged: Vec<LineChange> = Vec::with_capacity(changes.len());
  for change in changes {
    match merged.last_mut() {
      Some(prev) if prev.before.end == change.before.start && prev.after.end == change.after.start => {
        *prev = LineChange::new(
          prev.before.start..change.before.end,
          prev.after.start..change.after.end,
        );
      },
      _ => merged.push(change),
    }
  }
  merged
}

/// A single replacement in host coordinates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostEdit {
  pub start: Position,
  pub end:   Position,
  pub text:  String,
}

impl HostEdit {
  pub fn new(start: Position, end: Position, text: impl Into<String>) -> Self {
    Self {
      start,
      end,
      text: text.into(),
    }
  }

  /// Net number of rows this edit adds (negative when it removes rows).
  pub fn row_delta(&self, eol: LineEnding) -> isize {
    let added = self.text.matches(eol.as_str()).count() as isize;
    added - (self.end.row - self.start.row) as isize
  }
}

fn char_len(line: &str) -> usize {
  line.chars().count()
}

/// Edits that narrow a changed line down to the chars that actually differ.
fn narrow_line(row: usize, before: &str, after: &str) -> Option<HostEdit> {
  if before == after {
    return None;
  }
  let old: Vec<char> = before.chars().collect();
  let new: Vec<char> = after.chars().collect();
  let prefix = old.iter().zip(&new).take_while(|(a, b)| a == b).count();
  let max_suffix = old.len().min(new.len()) - prefix;
  let suffix = old
    .iter()
    .rev()
    .zip(new.iter().rev())
    .take(max_suffix)
    .take_while(|(a, b)| a == b)
    .count();

  Some(HostEdit::new(
    Position::new(row, prefix),
    Position::new(row, old.len() - suffix),
    new[prefix..new.len() - suffix].iter().collect::<String>(),
  ))
}

/// Converts line changes into host edits.
///
/// All edits are expressed in the coordinates of the unmodified `before`
/// document, ascending and non-overlapping, the way a host applies a batch
/// of edits as one transaction. Changed ranges that keep their line count
/// are narrowed to the differing chars of each line.
pub fn host_edits<S: AsRef<str>>(
  before: &[S],
  after: &[S],
  changes: &[LineChange],
  eol: LineEnding,
) -> Vec<HostEdit> {
  let len_before = before.len();
  let mut edits = Vec::with_capacity(changes.len());

  for change in changes {
    let start_row = change.before.start as usize;
    let end_row = change.before.end as usize;
    let new_lines = &after[change.after.start as usize..change.after.end as usize];

    if change.kind == ChangeKind::Changed && end_row - start_row == new_lines.len() {
      edits.extend(
        before[start_row..end_row]
          .iter()
          .zip(new_lines)
          .enumerate()
          .filter_map(|(idx, (old, new))| narrow_line(start_row + idx, old.as_ref(), new.as_ref())),
      );
      continue;
    }

    let mut text = String::new();
    for line in new_lines {
      text.push_str(line.as_ref());
      text.push_str(eol.as_str());
    }
    let mut start = Position::new(start_row, 0);
    let mut end = Position::new(end_row, 0);

    if end_row == len_before && len_before > 0 {
      // the range runs up to the line break before the sentinel, which does
      // not exist in the host document
      let last_row = len_before - 1;
      end = Position::new(last_row, char_len(before[last_row].as_ref()));
      if start_row == len_before {
        start = end;
        text.truncate(text.len() - eol.as_str().len());
        text.insert_str(0, eol.as_str());
      } else if !text.is_empty() {
        text.truncate(text.len() - eol.as_str().len());
      } else if start_row > 0 {
        start = Position::new(start_row - 1, char_len(before[start_row - 1].as_ref()));
      } else {
        start = Position::zero();
      }
    }
    edits.push(HostEdit::new(start, end, text));
  }
  edits
}

/// Applies edits produced by [`host_edits`] to `text`.
pub fn apply_host_edits(text: &str, edits: &[HostEdit], eol: LineEnding) -> String {
  let chars: Vec<char> = text.chars().collect();
  let index = LineIndex::new(text, eol);
  let mut out = String::with_capacity(text.len());
  let mut cursor = 0;
  for edit in edits {
    let start = index.offset(edit.start).max(cursor);
    let end = index.offset(edit.end).max(start);
    out.extend(&chars[cursor..start]);
    out.push_str(&edit.text);
    cursor = end;
  }
  out.extend(&chars[cursor..]);
  out
}
