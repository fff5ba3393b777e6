//! Events crossing the sync boundary.

use the_bridge_diff::{
  LineEvent,
  Position,
};

use crate::handle::{
  ExternalHandle,
  HostHandle,
};

/// A line-replacement notification from the external engine.
///
/// Replaces lines `first_line..last_line` (exclusive, `-1` meaning the end
/// of the buffer) with `lines`. `more` is set when the engine split one
/// logical change over several notifications and the rest is on its way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalLinesEvent {
  pub buffer:     ExternalHandle,
  pub tick:       u64,
  pub first_line: i64,
  pub last_line:  i64,
  pub lines:      Vec<String>,
  pub more:       bool,
}

impl ExternalLinesEvent {
  pub fn line_event(&self) -> LineEvent {
    LineEvent::new(self.first_line, self.last_line, self.lines.clone())
  }
}

/// One content change inside a host change event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostContentChange {
  pub range_start:  Position,
  pub range_end:    Position,
  pub range_length: usize,
  pub text:         String,
}

/// A host document change notification.
///
/// The changes are informational: the reconciler always diffs the full
/// host text against the last content the external engine is known to
/// hold, so changes the host coalesced or reordered cannot desync the two.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostChangeEvent {
  pub document: HostHandle,
  pub version:  u64,
  pub changes:  Vec<HostContentChange>,
}
