//! Replaying external line-replacement notifications.
//!
//! The external engine reports every buffer change as "replace lines
//! `first_line..last_line` with `lines`". Several distinct edits share that
//! shape, and the engine relies on a few payload conventions to tell them
//! apart; [`LineEventKind`] names each of them.

use crate::LineEnding;

/// A single line-replacement notification.
///
/// `last_line` is exclusive. A negative `last_line` means "through the end
/// of the buffer"; indices past the end of the buffer are clamped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineEvent {
  pub first_line: i64,
  pub last_line:  i64,
  pub lines:      Vec<String>,
}

impl LineEvent {
  pub fn new(first_line: i64, last_line: i64, lines: Vec<String>) -> Self {
    Self {
      first_line,
      last_line,
      lines,
    }
  }
}

/// How a [`LineEvent`] is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineEventKind {
  /// One line replaced by a single empty string: the line is cleared, not
  /// removed.
  StringChange,
  /// Several lines replaced by a single empty string: all but one are
  /// removed and the remaining line is cleared.
  ///
  /// The engine uses the same payload for "these lines became one empty
  /// line", so the two readings cannot be told apart; both produce the same
  /// buffer.
  ClearLines,
  /// A span replaced by nothing.
  Deletion,
  /// An empty span replaced by lines.
  Insertion,
  /// Anything else: the span is replaced by a payload of any length.
  Replace,
}

/// Classifies an event whose bounds were already clamped to the buffer.
pub fn classify(first: usize, last: usize, lines: &[String]) -> LineEventKind {
  let single_empty = matches!(lines, [line] if line.is_empty());
  if first == last {
    LineEventKind::Insertion
  } else if lines.is_empty() {
    LineEventKind::Deletion
  } else if single_empty && last == first + 1 {
    LineEventKind::StringChange
  } else if single_empty {
    LineEventKind::ClearLines
  } else {
    LineEventKind::Replace
  }
}

fn clamp_line(line: i64, len: usize) -> usize {
  if line < 0 {
    len
  } else {
    usize::try_from(line).map_or(len, |line| line.min(len))
  }
}

/// Applies `event` to `lines` and reports how it was interpreted.
pub fn apply_line_event(lines: &mut Vec<String>, event: &LineEvent) -> LineEventKind {
  let len = lines.len();
  let first = clamp_line(event.first_line, len);
  let last = clamp_line(event.last_line, len).max(first);
  let kind = classify(first, last, &event.lines);

  match kind {
    LineEventKind::StringChange => lines[first].clear(),
    LineEventKind::ClearLines => {
      lines.drain(first + 1..last);
      lines[first].clear();
    },
    LineEventKind::Deletion => {
      lines.drain(first..last);
    },
    LineEventKind::Insertion | LineEventKind::Replace => {
      lines.splice(first..last, event.lines.iter().cloned());
    },
  }
  kind
}

/// Replays `events` in order on top of `lines`.
///
/// A buffer always holds at least one line; a deletion of every line leaves
/// a single empty line behind before the next event is replayed, as the
/// external engine does.
pub fn replay<'a>(lines: &mut Vec<String>, events: impl IntoIterator<Item = &'a LineEvent>) {
  for event in events {
    let kind = apply_line_event(lines, event);
    log::trace!(
      "replayed {kind:?} {}..{} ({} lines)",
      event.first_line,
      event.last_line,
      event.lines.len()
    );
    if lines.is_empty() {
      lines.push(String::new());
    }
  }
}

/// Splits a document into the lines the external engine holds for it.
/// A trailing line break yields a trailing empty line.
pub fn split_lines(text: &str, eol: LineEnding) -> Vec<String> {
  text.split(eol.as_str()).map(str::to_owned).collect()
}

/// Inverse of [`split_lines`].
pub fn join_lines<S: AsRef<str>>(lines: &[S], eol: LineEnding) -> String {
  let mut text = String::new();
  for (idx, line) in lines.iter().enumerate() {
    if idx > 0 {
      text.push_str(eol.as_str());
    }
    text.push_str(line.as_ref());
  }
  text
}

#[cfg(test)]
mod tests {
  use super::*;

  fn lines(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
  }

  fn apply(buffer: &[&str], first: i64, last: i64, data: &[&str]) -> (Vec<String>, LineEventKind) {
    let mut buffer = lines(buffer);
    let kind = apply_line_event(&mut buffer, &LineEvent::new(first, last, lines(data)));
    (buffer, kind)
  }

  #[test]
  fn string_change_clears_line() {
    let (result, kind) = apply(&["a", "b", "c", "d"], 2, 3, &[""]);
    assert_eq!(kind, LineEventKind::StringChange);
    assert_eq!(result, lines(&["a", "b", "", "d"]));
  }

  #[test]
  fn multiple_empty_lines_collapse_to_one() {
    let (result, kind) = apply(&["a", "b", "c", "d"], 1, 3, &[""]);
    assert_eq!(kind, LineEventKind::ClearLines);
    assert_eq!(result, lines(&["a", "", "d"]));
  }

  #[test]
  fn empty_payload_deletes_span() {
    let (result, kind) = apply(&["a", "b", "c", "d"], 1, 3, &[]);
    assert_eq!(kind, LineEventKind::Deletion);
    assert_eq!(result, lines(&["a", "d"]));
  }

  #[test]
  fn equal_bounds_insert() {
    let (result, kind) = apply(&["a", "b"], 1, 1, &["x", "y"]);
    assert_eq!(kind, LineEventKind::Insertion);
    assert_eq!(result, lines(&["a", "x", "y", "b"]));
  }

  #[test]
  fn general_replace_changes_line_count() {
    let (result, kind) = apply(&["a", "b", "c"], 0, 2, &["x", "y", "z"]);
    assert_eq!(kind, LineEventKind::Replace);
    assert_eq!(result, lines(&["x", "y", "z", "c"]));

    let (result, kind) = apply(&["a", "b", "c"], 0, 3, &["x"]);
    assert_eq!(kind, LineEventKind::Replace);
    assert_eq!(result, lines(&["x"]));
  }

  #[test]
  fn bounds_past_end_are_clamped() {
    let (result, kind) = apply(&["a", "b"], 1, 7, &[""]);
    assert_eq!(kind, LineEventKind::StringChange);
    assert_eq!(result, lines(&["a", ""]));

    let (result, kind) = apply(&["a", "b"], 0, -1, &["z"]);
    assert_eq!(kind, LineEventKind::Replace);
    assert_eq!(result, lines(&["z"]));

    let (result, kind) = apply(&["a"], 5, 9, &["z"]);
    assert_eq!(kind, LineEventKind::Insertion);
    assert_eq!(result, lines(&["a", "z"]));
  }

  #[test]
  fn replay_never_leaves_buffer_empty() {
    let mut buffer = lines(&["a", "b"]);
    replay(&mut buffer, &[LineEvent::new(0, -1, vec![])]);
    assert_eq!(buffer, lines(&[""]));

    // the empty line is there for the event that follows the deletion
    let mut buffer = lines(&["a"]);
    replay(&mut buffer, &[
      LineEvent::new(0, 1, vec![]),
      LineEvent::new(0, 0, lines(&["x"])),
    ]);
    assert_eq!(buffer, lines(&["x", ""]));
  }

  #[test]
  fn replay_applies_in_order() {
    let mut buffer = lines(&["one", "two"]);
    let events = [
      LineEvent::new(1, 1, lines(&["inserted"])),
      LineEvent::new(0, 1, lines(&["ONE"])),
      LineEvent::new(2, 3, vec![]),
    ];
    replay(&mut buffer, &events);
    assert_eq!(buffer, lines(&["ONE", "inserted"]));
  }

  #[test]
  fn split_and_join_round_trip_trailing_newline() {
    let split = split_lines("a\r\nb\r\n", LineEnding::Crlf);
    assert_eq!(split, lines(&["a", "b", ""]));
    assert_eq!(join_lines(&split, LineEnding::Crlf), "a\r\nb\r\n");
    assert_eq!(split_lines("", LineEnding::LF), lines(&[""]));
  }
}
