//! Diffing primitives for keeping a host document and an external
//! line-grid buffer in sync.
//!
//! Two directions are covered:
//!
//! - [`replay`] + [`lines`]: an external engine reports line-replacement
//!   notifications, which are replayed against a working copy and then
//!   compared line-by-line with the current host text to produce
//!   [`HostEdit`]s.
//! - [`chars`]: a host edit is compared character-by-character with the last
//!   text the external engine is known to hold, producing [`TextPatch`]es that
//!   are folded into [`LineReplace`] calls.
//!
//! Nothing in here performs I/O or keeps state between calls.

pub mod chars;
pub mod columns;
pub mod line_ending;
pub mod line_index;
pub mod lines;
pub mod position;
pub mod replay;

pub use chars::{
  CharPatches,
  LineReplace,
  TextPatch,
  apply_line_replacements,
  apply_patches,
  diff_chars,
  line_replacements,
};
pub use line_ending::LineEnding;
pub use line_index::LineIndex;
pub use lines::{
  ChangeKind,
  HostEdit,
  LineChange,
  apply_host_edits,
  diff_lines,
  host_edits,
};
pub use position::Position;
pub use replay::{
  LineEvent,
  LineEventKind,
  apply_line_event,
  join_lines,
  replay,
  split_lines,
};

/// Marker lines appended to both sides of every diff. Without a common
/// suffix, a change that only adds or removes the final line break can be
/// swallowed by the unchanged tail of the diff.
pub(crate) const SENTINEL: [&str; 2] = [
  "\u{e000}the-bridge:sentinel:1\u{e000}",
  "\u{e000}the-bridge:sentinel:2\u{e000}",
];
