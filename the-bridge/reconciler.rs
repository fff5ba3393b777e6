//! Keeps host documents and external buffers converging.
//!
//! External → host: line events are queued per document and applied in
//! batches once the batch window closes (see [`batch`]). Every queued event
//! is replayed against the last content the external engine is known to
//! hold, the result is diffed line-by-line with the host text, and only the
//! changed ranges are sent to the host as one transaction.
//!
//! Host → external: each host change is diffed char-by-char against the
//! same snapshot and forwarded as line-replacement calls. External edits
//! that arrived but are still waiting for their batch already sit in the
//! engine's buffer, so the calls land on top of them; the snapshot is
//! advanced to that merged content and the host is brought up to it.
//!
//! Both directions record a skip value before issuing an edit so the echo
//! the other side produces for it is dropped instead of bounced back.

mod batch;

use std::{
  borrow::Cow,
  sync::Arc,
};

use parking_lot::Mutex;
use ropey::Rope;
use the_bridge_diff::{
  HostEdit,
  LineEnding,
  LineEvent,
  Position,
  TextPatch,
  apply_line_replacements,
  diff_chars,
  diff_lines,
  host_edits,
  join_lines,
  line_replacements,
  replay,
  split_lines,
};
use the_bridge_event::AsyncHook;
use tokio::sync::mpsc::{
  self,
  UnboundedReceiver,
  UnboundedSender,
};

use crate::{
  completion::CompletionLock,
  config::{
    DocumentOptions,
    SyncConfig,
  },
  document::{
    Document,
    DocumentState,
    QueuedEvent,
  },
  error::{
    Result,
    SyncError,
  },
  event::{
    ExternalLinesEvent,
    HostChangeEvent,
  },
  external::ExternalEngine,
  handle::{
    DocumentKey,
    ExternalHandle,
    Handle,
    HostHandle,
  },
  host::{
    EditTransaction,
    HostEditor,
  },
  registry::SyncRegistry,
};

/// Why an event was dropped without doing anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
  /// The event echoes an edit this reconciler issued itself.
  Stale,
  NoDocument,
  /// Both sides already agree.
  EmptyDiff,
}

/// What handling an event or applying a batch amounted to.
#[derive(Debug, Clone)]
pub enum Outcome {
  /// A host transaction with this many edits landed.
  Applied { edits: usize },
  /// This many line-replacement calls were sent to the external engine.
  Sent { calls: usize },
  /// The event joined a batch; the lock settles once the batch lands.
  Queued(CompletionLock),
  /// The host change was held back until insert mode ends.
  Deferred,
  Skipped(SkipReason),
}

impl Outcome {
  pub fn is_skipped(&self) -> bool {
    matches!(self, Outcome::Skipped(_))
  }
}

/// What a push to the external engine amounted to.
struct Pushed {
  calls:    usize,
  /// Arrived external events the new snapshot already includes.
  absorbed: usize,
}

pub(crate) struct Shared {
  pub registry: SyncRegistry,
  host:         Arc<dyn HostEditor>,
  external:     Arc<dyn ExternalEngine>,
  pub config:   SyncConfig,
  fatal:        UnboundedSender<SyncError>,
}

/// Drives synchronization for every associated document.
///
/// Must be created inside a tokio runtime for the batch window to run; a
/// reconciler created elsewhere only applies batches on
/// [`Reconciler::flush_external`] and [`Reconciler::apply_pending`].
pub struct Reconciler {
  shared:  Arc<Shared>,
  batches: UnboundedSender<DocumentKey>,
  fatal:   Mutex<UnboundedReceiver<SyncError>>,
}

impl Reconciler {
  pub fn new(host: Arc<dyn HostEditor>, external: Arc<dyn ExternalEngine>, config: SyncConfig) -> Self {
    let (fatal_tx, fatal_rx) = mpsc::unbounded_channel();
    let shared = Arc::new(Shared {
      registry: SyncRegistry::new(),
      host,
      external,
      config,
      fatal: fatal_tx,
    });
    let batches = batch::BatchHook::new(shared.clone()).spawn();
    Self {
      shared,
      batches,
      fatal: Mutex::new(fatal_rx),
    }
  }

  pub fn registry(&self) -> &SyncRegistry {
    &self.shared.registry
  }

  pub fn config(&self) -> &SyncConfig {
    &self.shared.config
  }

  /// Associates a host document with an external buffer that currently
  /// holds `text`. Documents attached without options use the configured
  /// defaults; their indentation settings are handed to the host.
  pub fn attach(
    &self,
    host: HostHandle,
    external: ExternalHandle,
    text: Rope,
    options: Option<DocumentOptions>,
  ) -> Result<Arc<Document>> {
    let options = options.unwrap_or_else(|| self.shared.config.document.clone());
    let indentation = options.indentation();
    let doc = self.shared.registry.associate(host, external, text, options)?;
    self.shared.host.set_indentation(host, indentation);
    Ok(doc)
  }

  /// Ends an association. Pending completion locks settle as cancelled.
  pub fn detach(&self, handle: impl Into<Handle>) -> bool {
    match self.shared.registry.release(handle) {
      Ok(_) => true,
      Err(err) => {
        log::debug!("detach: {err}");
        false
      },
    }
  }

  /// Queues an external line event for the next batch.
  pub async fn on_external_lines(&self, event: ExternalLinesEvent) -> Result<Outcome> {
    let Some(doc) = self.shared.registry.lookup_by_external(event.buffer) else {
      return absorb(Err(SyncError::NoAssociatedDocument(event.buffer.into())));
    };
    if doc.is_released() {
      return absorb(Err(SyncError::NoAssociatedDocument(event.buffer.into())));
    }

    // echoes usually arrive while nothing holds the document; drop them
    // right away instead of opening a batch for them
    if let Ok(state) = doc.state.try_lock()
      && event.tick <= state.skip_external_tick
    {
      let skip = state.skip_external_tick;
      drop(state);
      doc.observe_tick(event.tick);
      return absorb(Err(SyncError::StaleEvent {
        seen: event.tick,
        skip,
      }));
    }

    let lock = doc.enqueue(event.tick, event.line_event(), event.more);
    if self.batches.send(doc.key()).is_err() {
      log::trace!("batch window is not running, {} waits for a flush", doc.external());
    }
    Ok(Outcome::Queued(lock))
  }

  /// Applies everything queued for `doc` right away.
  pub async fn apply_pending(&self, doc: &Document) -> Result<Outcome> {
    absorb(self.shared.apply_pending(doc).await)
  }

  /// Applies every document's queued events without waiting for the batch
  /// window. A failing document does not stop the others; only invariant
  /// violations are returned.
  pub async fn flush_external(&self) -> Result<()> {
    for doc in self.shared.registry.documents() {
      match self.apply_pending(&doc).await {
        Err(err @ SyncError::InvariantViolation(_)) => return Err(err),
        Ok(_) | Err(_) => {},
      }
    }
    Ok(())
  }

  /// Forwards a host change to the external engine.
  pub async fn on_host_change(&self, event: HostChangeEvent) -> Result<Outcome> {
    let Some(doc) = self.shared.registry.lookup_by_host(event.document) else {
      return absorb(Err(SyncError::NoAssociatedDocument(event.document.into())));
    };
    absorb(self.shared.host_change(&doc, event.version).await)
  }

  /// Starts holding back host changes for `host` (when its options allow).
  pub async fn begin_insert_mode(&self, host: HostHandle) -> bool {
    let Some(doc) = self.shared.registry.lookup_by_host(host) else {
      log::debug!("begin_insert_mode: {host} is not associated");
      return false;
    };
    doc.state.lock().await.insert_mode = true;
    true
  }

  /// Stops holding back host changes and sends the accumulated ones as a
  /// single batch.
  pub async fn end_insert_mode(&self, host: HostHandle) -> Result<Outcome> {
    let Some(doc) = self.shared.registry.lookup_by_host(host) else {
      return absorb(Err(SyncError::NoAssociatedDocument(host.into())));
    };
    let mut state = doc.state.lock().await;
    state.insert_mode = false;
    let result = match state.deferred_host_text.take() {
      Some(text) => self.shared.forward(&doc, &mut state, text).await,
      None => Err(SyncError::EmptyDiff),
    };
    absorb(result)
  }

  /// Invariant violations raised by background batch tasks.
  pub fn take_fatal_errors(&self) -> Vec<SyncError> {
    let mut rx = self.fatal.lock();
    let mut errors = Vec::new();
    while let Ok(err) = rx.try_recv() {
      errors.push(err);
    }
    errors
  }
}

/// Turns transient errors into skips, logging each kind at its level.
fn absorb(result: Result<Outcome>) -> Result<Outcome> {
  match result {
    Ok(outcome) => Ok(outcome),
    Err(SyncError::StaleEvent { seen, skip }) => {
      log::trace!("dropping echo {seen} (skip {skip})");
      Ok(Outcome::Skipped(SkipReason::Stale))
    },
    Err(SyncError::NoAssociatedDocument(handle)) => {
      log::debug!("dropping event for {handle}: no associated document");
      Ok(Outcome::Skipped(SkipReason::NoDocument))
    },
    Err(SyncError::EmptyDiff) => {
      log::trace!("nothing to sync");
      Ok(Outcome::Skipped(SkipReason::EmptyDiff))
    },
    Err(err @ SyncError::InvariantViolation(_)) => {
      log::error!("{err}");
      Err(err)
    },
    Err(err) => {
      log::warn!("{err}");
      Err(err)
    },
  }
}

impl Shared {
  /// Background variant of [`Reconciler::apply_pending`]: invariant
  /// violations go to the fatal channel since nobody awaits the task.
  pub(crate) async fn apply_in_background(&self, doc: &Document) {
    if let Err(err @ SyncError::InvariantViolation(_)) = absorb(self.apply_pending(doc).await) {
      let _ = self.fatal.send(err);
    }
  }

  pub(crate) async fn apply_pending(&self, doc: &Document) -> Result<Outcome> {
    let mut state = doc.state.lock().await;
    if doc.is_released() {
      return Err(SyncError::NoAssociatedDocument(doc.host().into()));
    }
    let Some(batch) = doc.begin_apply()? else {
      return Err(SyncError::EmptyDiff);
    };

    let result = self.apply_batch(doc, &mut state, &batch.events).await;
    let failed = matches!(
      result,
      Err(SyncError::ApplyFailed(_) | SyncError::InvariantViolation(_))
    );
    if failed {
      // replay these again on top of the unchanged snapshot next time
      doc.requeue(batch.events.clone());
    }
    doc.finish_apply();

    match &result {
      Ok(_) | Err(SyncError::StaleEvent { .. } | SyncError::EmptyDiff) => batch.resolve(),
      Err(SyncError::NoAssociatedDocument(_)) => batch.cancel(),
      Err(err) => batch.reject(&err.to_string()),
    }
    result
  }

  async fn apply_batch(
    &self,
    doc: &Document,
    state: &mut DocumentState,
    events: &[QueuedEvent],
  ) -> Result<Outcome> {
    // host wins: edits held back in insert mode go out first and absorb
    // every event of this batch into the snapshot
    if let Some(text) = state.deferred_host_text.take() {
      log::debug!("flushing insert-mode edits of {} before applying", doc.host());
      match self.push(doc, state, &text, events).await {
        Ok(_) | Err(SyncError::EmptyDiff) => {},
        Err(err) => {
          state.deferred_host_text = Some(text);
          return Err(err);
        },
      }
    }

    let skip = state.skip_external_tick;
    let fresh: Vec<&LineEvent> = events
      .iter()
      .filter(|queued| queued.tick > skip)
      .map(|queued| &queued.event)
      .collect();
    if fresh.len() < events.len() {
      log::trace!("dropped {} echoed line events", events.len() - fresh.len());
    }

    let mut lines = split_lines(&state.last_known_external, doc.options().line_ending);
    replay(&mut lines, fresh.iter().copied());
    match self.sync_host(doc, state, lines).await {
      Err(SyncError::EmptyDiff) if fresh.is_empty() => {
        let seen = events.iter().map(|queued| queued.tick).max().unwrap_or_default();
        Err(SyncError::StaleEvent { seen, skip })
      },
      result => result,
    }
  }

  /// Makes the host text match `lines` and records them as the external
  /// snapshot.
  async fn sync_host(
    &self,
    doc: &Document,
    state: &mut DocumentState,
    lines: Vec<String>,
  ) -> Result<Outcome> {
    let eol = doc.options().line_ending;
    let target = join_lines(&lines, eol);

    let host = doc.host();
    let current = self
      .host
      .text(host)
      .ok_or(SyncError::NoAssociatedDocument(host.into()))?;
    let current = split_lines(&Cow::from(&current), eol);
    let changes = diff_lines(&current, &lines);
    if changes.is_empty() {
      state.last_known_external = target;
      return Err(SyncError::EmptyDiff);
    }
    let edits = host_edits(&current, &lines, &changes, eol);
    let version = self
      .host
      .version(host)
      .ok_or(SyncError::NoAssociatedDocument(host.into()))?;
    let cursor = self.host.cursor(host);

    // the host reports the version this edit produces; it must never be
    // forwarded back
    let prev_skip = state.skip_host_version;
    state.skip_host_version = prev_skip.max(version + 1);
    let count = edits.len();
    let result = self
      .host
      .apply_edits(host, EditTransaction::new(edits.clone()))
      .await;

    if doc.is_released() {
      return Err(SyncError::NoAssociatedDocument(host.into()));
    }
    if let Err(err) = result {
      state.skip_host_version = prev_skip;
      return Err(SyncError::ApplyFailed(err));
    }
    state.last_known_external = target;
    if let Some(cursor) = cursor {
      self.host.set_cursor(host, restore_cursor(cursor, &edits, eol));
    }
    log::debug!("applied {count} edits to {host}");
    Ok(Outcome::Applied { edits: count })
  }

  async fn host_change(&self, doc: &Document, version: u64) -> Result<Outcome> {
    let mut state = doc.state.lock().await;
    if doc.is_released() {
      return Err(SyncError::NoAssociatedDocument(doc.host().into()));
    }
    if version <= state.skip_host_version {
      return Err(SyncError::StaleEvent {
        seen: version,
        skip: state.skip_host_version,
      });
    }
    let text = self
      .host
      .text(doc.host())
      .ok_or(SyncError::NoAssociatedDocument(doc.host().into()))?;

    if state.insert_mode && doc.options().accumulate_insert_mode {
      state.deferred_host_text = Some(text);
      return Ok(Outcome::Deferred);
    }
    self.forward(doc, &mut state, text).await
  }

  /// Sends the host text `text` to the external engine.
  ///
  /// The latest host text replaces anything deferred earlier. When the push
  /// fails the text is kept deferred, so the next batch sends it before
  /// applying external edits on top of it.
  async fn forward(
    &self,
    doc: &Document,
    state: &mut DocumentState,
    text: Rope,
  ) -> Result<Outcome> {
    state.deferred_host_text = None;
    let pushed = match self.push(doc, state, &text, &[]).await {
      Ok(pushed) => pushed,
      Err(err) => {
        if !err.is_transient() {
          state.deferred_host_text = Some(text);
        }
        return Err(err);
      },
    };

    if pushed.absorbed > 0 {
      let lines = split_lines(&state.last_known_external, doc.options().line_ending);
      if let Err(err) = self.sync_host(doc, state, lines).await
        && !err.is_transient()
      {
        log::warn!("{} catches up with the next batch: {err}", doc.host());
      }
    }
    Ok(Outcome::Sent { calls: pushed.calls })
  }

  /// Sends the difference between the external snapshot and `target` to
  /// the external engine.
  ///
  /// External events that arrived after the snapshot are already applied
  /// in the engine, so the calls land on top of them. The snapshot becomes
  /// what the engine ends up holding: those events replayed, then the
  /// calls. `in_flight` are events a running batch took out of the queue.
  async fn push(
    &self,
    doc: &Document,
    state: &mut DocumentState,
    target: &Rope,
    in_flight: &[QueuedEvent],
  ) -> Result<Pushed> {
    let eol = doc.options().line_ending;
    let after = Cow::from(target);
    let patches: Vec<TextPatch> = diff_chars(&state.last_known_external, &after, eol).collect();
    if patches.is_empty() {
      return Err(SyncError::EmptyDiff);
    }
    let calls = line_replacements(&state.last_known_external, &patches, eol);
    let count = calls.len();

    let prev_skip = state.skip_external_tick;
    let (queued, latest) = doc.queued();
    let arrived: Vec<&LineEvent> = in_flight
      .iter()
      .chain(&queued)
      .filter(|waiting| waiting.tick > prev_skip)
      .map(|waiting| &waiting.event)
      .collect();
    let absorbed = arrived.len();
    let merged = if arrived.is_empty() {
      after.into_owned()
    } else {
      let mut lines = split_lines(&state.last_known_external, eol);
      replay(&mut lines, arrived);
      apply_line_replacements(&mut lines, &calls);
      join_lines(&lines, eol)
    };

    // every call comes back as one line event with a tick past everything
    // seen so far
    state.skip_external_tick = prev_skip.max(latest) + count as u64;
    let result = self.external.replace_lines(doc.external(), calls).await;

    if doc.is_released() {
      return Err(SyncError::NoAssociatedDocument(doc.external().into()));
    }
    if let Err(err) = result {
      state.skip_external_tick = prev_skip;
      return Err(SyncError::ApplyFailed(err));
    }
    state.last_known_external = merged;
    if absorbed > 0 {
      log::debug!("merged {absorbed} arrived external edits into the push");
    }
    log::debug!("sent {count} line replacements to {}", doc.external());
    Ok(Pushed {
      calls: count,
      absorbed,
    })
  }
}

fn shift_row(row: usize, delta: isize) -> usize {
  row.saturating_add_signed(delta)
}

/// Where the host cursor belongs after `edits` were applied.
///
/// A cursor on a line an edit touched moves to that edit's start, otherwise
/// it keeps its column and follows the lines added or removed above it.
pub(crate) fn restore_cursor(cursor: Position, edits: &[HostEdit], eol: LineEnding) -> Position {
  let mut delta = 0;
  for edit in edits {
    if edit.start.row > cursor.row {
      break;
    }
    // an edit ending at the start of the cursor line replaced whole lines
    // above it and left the cursor line alone
    let touches = edit.end.row > cursor.row
      || (edit.end.row == cursor.row && (edit.end.col > 0 || edit.start.row == cursor.row));
    if touches {
      return Position::new(shift_row(edit.start.row, delta), edit.start.col);
    }
    delta += edit.row_delta(eol);
  }
  Position::new(shift_row(cursor.row, delta), cursor.col)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn cursor_below_edits_follows_line_delta() {
    let edits = [HostEdit::new(
      Position::new(0, 0),
      Position::new(0, 0),
      "new\nlines\n",
    )];
    assert_eq!(
      restore_cursor(Position::new(3, 2), &edits, LineEnding::LF),
      Position::new(5, 2)
    );

    let edits = [HostEdit::new(Position::new(1, 0), Position::new(3, 0), "")];
    assert_eq!(
      restore_cursor(Position::new(3, 4), &edits, LineEnding::LF),
      Position::new(1, 4)
    );
  }

  #[test]
  fn cursor_on_edited_line_moves_to_edit_start() {
    let edits = [
      HostEdit::new(Position::new(0, 0), Position::new(0, 0), "x\n"),
      HostEdit::new(Position::new(2, 3), Position::new(2, 5), "yy"),
    ];
    assert_eq!(
      restore_cursor(Position::new(2, 9), &edits, LineEnding::LF),
      Position::new(3, 3)
    );
  }

  #[test]
  fn cursor_above_edits_is_unchanged() {
    let edits = [HostEdit::new(Position::new(4, 0), Position::new(6, 0), "")];
    assert_eq!(
      restore_cursor(Position::new(1, 7), &edits, LineEnding::LF),
      Position::new(1, 7)
    );
  }

  #[test]
  fn outcome_skips() {
    assert!(matches!(
      absorb(Err(SyncError::EmptyDiff)),
      Ok(Outcome::Skipped(SkipReason::EmptyDiff))
    ));
    assert!(matches!(
      absorb(Err(SyncError::StaleEvent { seen: 1, skip: 1 })),
      Ok(Outcome::Skipped(SkipReason::Stale))
    ));
    assert!(absorb(Err(SyncError::InvariantViolation("x".into()))).is_err());
    assert!(absorb(Ok(Outcome::Deferred)).is_ok_and(|outcome| !outcome.is_skipped()));
  }
}
