use std::{
  collections::HashMap,
  sync::Arc,
};

use the_bridge_event::{
  AsyncHook,
  BatchWindow,
};
use tokio::time::Instant;

use super::Shared;
use crate::handle::DocumentKey;

/// How many extra windows a document announcing more events can be held
/// back before it is applied anyway.
pub(super) const MAX_MORE_WINDOWS: usize = 4;

/// Collects the documents that received line events and applies them once
/// the batch window closes.
///
/// The host cannot run two edits on the same document concurrently, so
/// instead of applying every event as it arrives the hook waits for the
/// window to close and then issues one transaction per document.
pub(super) struct BatchHook {
  shared:  Arc<Shared>,
  window:  BatchWindow,
  /// Dirty documents in the order their first event arrived.
  dirty:   Vec<DocumentKey>,
  carried: HashMap<DocumentKey, usize>,
}

impl BatchHook {
  pub fn new(shared: Arc<Shared>) -> Self {
    let window = BatchWindow::new(shared.config.batch_window());
    Self {
      shared,
      window,
      dirty: Vec::new(),
      carried: HashMap::new(),
    }
  }

  /// Whether `key` should wait for the rest of a multi-part change.
  fn carry(&mut self, key: DocumentKey, more: bool) -> bool {
    let windows = self.carried.entry(key).or_default();
    if more && *windows < MAX_MORE_WINDOWS {
      *windows += 1;
      return true;
    }
    self.carried.remove(&key);
    false
  }
}

impl AsyncHook for BatchHook {
  type Event = DocumentKey;

  fn handle_event(&mut self, key: DocumentKey, _timeout: Option<Instant>) -> Option<Instant> {
    if !self.dirty.contains(&key) {
      self.dirty.push(key);
    }
    Some(self.window.open(Instant::now()))
  }

  fn finish_debounce(&mut self) -> Option<Instant> {
    self.window.close();
    let mut held = Vec::new();
    let mut applied = 0;
    for key in std::mem::take(&mut self.dirty) {
      let Some(doc) = self.shared.registry.lookup(key) else {
        self.carried.remove(&key);
        continue;
      };
      if self.carry(key, doc.more_coming()) {
        log::trace!("holding {} for the rest of a change", doc.external());
        held.push(key);
        continue;
      }
      let shared = self.shared.clone();
      tokio::spawn(async move { shared.apply_in_background(&doc).await });
      applied += 1;
    }
    log::debug!(
      "batch window of {:?} closed: applying {applied} documents",
      self.window.length()
    );

    if held.is_empty() {
      return None;
    }
    self.dirty = held;
    Some(self.window.open(Instant::now()))
  }
}
