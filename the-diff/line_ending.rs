use serde::{
  Deserialize,
  Serialize,
};

#[cfg(target_os = "windows")]
pub const NATIVE_LINE_ENDING: LineEnding = LineEnding::Crlf;

#[cfg(not(target_os = "windows"))]
pub const NATIVE_LINE_ENDING: LineEnding = LineEnding::LF;

/// Line break convention of a synchronized document.
///
/// Only the two conventions a host document can be saved with are
/// supported; a lone `\r` is ordinary line content under both.
#[derive(PartialEq, Eq, Copy, Clone, Debug, Default, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineEnding {
  /// CarriageReturn followed by LineFeed.
  Crlf,

  /// U+000A -- LineFeed
  #[default]
  LF,
}

impl LineEnding {
  #[inline]
  pub const fn len_chars(&self) -> usize {
    match self {
      Self::Crlf => 2,
      Self::LF => 1,
    }
  }

  #[inline]
  pub const fn as_str(&self) -> &'static str {
    match self {
      Self::Crlf => "\u{000D}\u{000A}",
      Self::LF => "\u{000A}",
    }
  }

  /// Picks the convention used by the first line break in `text`, falling
  /// back to the platform default for single-line text.
  pub fn detect(text: &str) -> LineEnding {
    match text.find('\n') {
      Some(idx) if idx > 0 && text.as_bytes()[idx - 1] == b'\r' => LineEnding::Crlf,
      Some(_) => LineEnding::LF,
      None => NATIVE_LINE_ENDING,
    }
  }
}
