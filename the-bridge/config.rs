use std::time::Duration;

use serde::{
  Deserialize,
  Serialize,
};
use the_bridge_diff::LineEnding;

use crate::error::Result;

/// Reconciler-wide settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct SyncConfig {
  /// How long external line events are accumulated before they are applied
  /// to the host, in milliseconds.
  pub batch_window_ms: u64,
  /// Defaults for documents attached without explicit options.
  pub document:        DocumentOptions,
}

impl Default for SyncConfig {
  fn default() -> Self {
    Self {
      batch_window_ms: 20,
      document:        DocumentOptions::default(),
    }
  }
}

impl SyncConfig {
  pub fn from_toml(source: &str) -> Result<Self> {
    Ok(toml::from_str(source)?)
  }

  pub fn batch_window(&self) -> Duration {
    Duration::from_millis(self.batch_window_ms)
  }
}

/// Per-document settings, fixed at association time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct DocumentOptions {
  pub line_ending:            LineEnding,
  /// Hold host edits made in insert mode and send them as one batch when
  /// insert mode ends.
  pub accumulate_insert_mode: bool,
  /// Indentation the host applies to the document. See
  /// [`DocumentOptions::indentation`].
  pub tab_size:               u8,
  pub insert_spaces:          bool,
}

/// Indentation settings handed to the host when a document is attached, so
/// indentation typed on either side looks the same.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Indentation {
  pub tab_size:      u8,
  pub insert_spaces: bool,
}

impl Default for DocumentOptions {
  fn default() -> Self {
    Self {
      line_ending:            LineEnding::LF,
      accumulate_insert_mode: true,
      tab_size:               4,
      insert_spaces:          true,
    }
  }
}

impl DocumentOptions {
  pub fn indentation(&self) -> Indentation {
    Indentation {
      tab_size:      self.tab_size,
      insert_spaces: self.insert_spaces,
    }
  }
}
