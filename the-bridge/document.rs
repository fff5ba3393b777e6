use std::collections::VecDeque;

use parking_lot::Mutex;
use ropey::Rope;
use the_bridge_diff::LineEvent;
use tokio_util::sync::CancellationToken;

use crate::{
  completion::CompletionLock,
  config::DocumentOptions,
  error::{
    CompletionError,
    Result,
    SyncError,
  },
  handle::{
    DocumentKey,
    ExternalHandle,
    HostHandle,
  },
};

/// Where a document is in the external → host apply cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BatchPhase {
  #[default]
  Idle,
  /// Line events are accumulating until the batch window closes.
  Batching,
  /// A host edit is in flight. `queued` is set once events for the next
  /// batch have arrived.
  Applying { queued: bool },
}

#[derive(Debug, Clone)]
pub(crate) struct QueuedEvent {
  pub tick:  u64,
  pub event: LineEvent,
}

/// Events and completion locks taken out of the queue for one apply.
#[derive(Debug)]
pub(crate) struct Batch {
  pub events: Vec<QueuedEvent>,
  pub locks:  Vec<CompletionLock>,
}

impl Batch {
  pub fn resolve(&self) {
    for lock in &self.locks {
      lock.resolve();
    }
  }

  pub fn reject(&self, msg: &str) {
    for lock in &self.locks {
      lock.reject(msg);
    }
  }

  pub fn cancel(&self) {
    for lock in &self.locks {
      lock.cancel();
    }
  }
}

#[derive(Debug, Default)]
struct BatchQueue {
  phase:       BatchPhase,
  events:      Vec<QueuedEvent>,
  /// One lock per batch, oldest first; the last one belongs to the batch
  /// currently accumulating.
  locks:       VecDeque<CompletionLock>,
  /// Whether the most recent event announced that more are coming.
  more:        bool,
  latest_tick: u64,
}

/// Sync state guarded by the per-document async lock. Holding it serializes
/// every diff and every edit issued for the document, in both directions.
#[derive(Debug)]
pub(crate) struct DocumentState {
  /// The text the external engine is known to hold.
  pub last_known_external: String,
  pub skip_external_tick:  u64,
  pub skip_host_version:   u64,
  pub insert_mode:         bool,
  /// Host text captured during insert mode that has not been sent yet.
  pub deferred_host_text:  Option<Rope>,
}

/// A host document associated with an external buffer.
#[derive(Debug)]
pub struct Document {
  key:              DocumentKey,
  host:             HostHandle,
  external:         ExternalHandle,
  options:          DocumentOptions,
  pub(crate) state: tokio::sync::Mutex<DocumentState>,
  queue:            Mutex<BatchQueue>,
  cancel:           CancellationToken,
}

impl Document {
  pub(crate) fn new(
    key: DocumentKey,
    host: HostHandle,
    external: ExternalHandle,
    text: Rope,
    options: DocumentOptions,
  ) -> Self {
    Self {
      key,
      host,
      external,
      options,
      state: tokio::sync::Mutex::new(DocumentState {
        last_known_external: text.to_string(),
        skip_external_tick:  0,
        skip_host_version:   0,
        insert_mode:         false,
        deferred_host_text:  None,
      }),
      queue: Mutex::new(BatchQueue::default()),
      cancel: CancellationToken::new(),
    }
  }

  pub fn key(&self) -> DocumentKey {
    self.key
  }

  pub fn host(&self) -> HostHandle {
    self.host
  }

  pub fn external(&self) -> ExternalHandle {
    self.external
  }

  pub fn options(&self) -> &DocumentOptions {
    &self.options
  }

  pub fn phase(&self) -> BatchPhase {
    self.queue.lock().phase
  }

  /// The completion lock of the newest batch that has not landed yet.
  pub fn pending_completion(&self) -> Option<CompletionLock> {
    self.queue.lock().locks.back().cloned()
  }

  /// Waits until every external edit received so far has been applied to
  /// the host. Returns immediately when nothing is pending.
  pub async fn wait_for_pending_edits(&self) -> std::result::Result<(), CompletionError> {
    match self.pending_completion() {
      Some(lock) => lock.wait().await,
      None => Ok(()),
    }
  }

  pub async fn last_known_external(&self) -> String {
    self.state.lock().await.last_known_external.clone()
  }

  pub fn is_released(&self) -> bool {
    self.cancel.is_cancelled()
  }

  pub(crate) fn cancelled(&self) -> &CancellationToken {
    &self.cancel
  }

  /// Records `tick` as seen without queueing its event.
  pub(crate) fn observe_tick(&self, tick: u64) {
    let mut queue = self.queue.lock();
    queue.latest_tick = queue.latest_tick.max(tick);
  }

  /// Events waiting for the next batch, with the highest tick seen so far.
  /// Both are read together so no event can slip in between.
  pub(crate) fn queued(&self) -> (Vec<QueuedEvent>, u64) {
    let queue = self.queue.lock();
    (queue.events.clone(), queue.latest_tick)
  }

  pub(crate) fn more_coming(&self) -> bool {
    self.queue.lock().more
  }

  /// Queues a line event and returns the lock of the batch it joined.
  pub(crate) fn enqueue(&self, tick: u64, event: LineEvent, more: bool) -> CompletionLock {
    let mut queue = self.queue.lock();
    queue.latest_tick = queue.latest_tick.max(tick);
    queue.more = more;
    queue.events.push(QueuedEvent { tick, event });

    let opens_batch = match queue.phase {
      BatchPhase::Idle => {
        queue.phase = BatchPhase::Batching;
        true
      },
      BatchPhase::Batching => queue.locks.is_empty(),
      BatchPhase::Applying { queued } => {
        queue.phase = BatchPhase::Applying { queued: true };
        !queued
      },
    };
    if !opens_batch && let Some(lock) = queue.locks.back() {
      return lock.clone();
    }
    let lock = CompletionLock::new();
    queue.locks.push_back(lock.clone());
    lock
  }

  /// Takes every queued event out for applying.
  ///
  /// Returns `Ok(None)` when nothing is queued. Starting a second apply
  /// while one is in flight is an invariant violation: the per-document
  /// state lock is supposed to make that impossible.
  pub(crate) fn begin_apply(&self) -> Result<Option<Batch>> {
    let mut queue = self.queue.lock();
    if let BatchPhase::Applying { .. } = queue.phase {
      return Err(SyncError::InvariantViolation(format!(
        "{} entered applying twice",
        self.host
      )));
    }
    if queue.events.is_empty() {
      return Ok(None);
    }
    queue.phase = BatchPhase::Applying { queued: false };
    queue.more = false;
    let events = std::mem::take(&mut queue.events);
    let locks = queue.locks.drain(..).collect();
    Ok(Some(Batch { events, locks }))
  }

  /// Puts the events of a failed apply back in front of the queue.
  pub(crate) fn requeue(&self, mut events: Vec<QueuedEvent>) {
    let mut queue = self.queue.lock();
    events.append(&mut queue.events);
    queue.events = events;
  }

  pub(crate) fn finish_apply(&self) {
    let mut queue = self.queue.lock();
    queue.phase = if queue.events.is_empty() {
      BatchPhase::Idle
    } else {
      BatchPhase::Batching
    };
  }

  /// Cancels all pending work. Waiters observe [`CompletionError::Cancelled`].
  pub(crate) fn teardown(&self) {
    self.cancel.cancel();
    let mut queue = self.queue.lock();
    queue.events.clear();
    queue.phase = BatchPhase::Idle;
    for lock in queue.locks.drain(..) {
      lock.cancel();
    }
  }

  #[cfg(test)]
  pub(crate) fn force_phase(&self, phase: BatchPhase) {
    self.queue.lock().phase = phase;
  }
}

#[cfg(test)]
mod tests {
  use slotmap::SlotMap;

  use super::*;

  fn document() -> Document {
    let mut keys: SlotMap<DocumentKey, ()> = SlotMap::with_key();
    Document::new(
      keys.insert(()),
      HostHandle(1),
      ExternalHandle(1),
      Rope::from("a\nb"),
      DocumentOptions::default(),
    )
  }

  fn line(text: &str) -> LineEvent {
    LineEvent::new(0, 1, vec![text.to_string()])
  }

  #[test]
  fn events_in_one_window_share_a_lock() {
    let doc = document();
    assert_eq!(doc.phase(), BatchPhase::Idle);
    let first = doc.enqueue(1, line("x"), false);
    let second = doc.enqueue(2, line("y"), true);
    assert_eq!(doc.phase(), BatchPhase::Batching);
    assert!(doc.more_coming());
    let (queued, latest) = doc.queued();
    assert_eq!(queued.iter().map(|q| q.tick).collect::<Vec<_>>(), [1, 2]);
    assert_eq!(latest, 2);

    let batch = doc.begin_apply().unwrap().unwrap();
    assert_eq!(batch.events.len(), 2);
    assert_eq!(batch.locks.len(), 1);
    batch.resolve();
    assert!(first.is_settled());
    assert!(second.is_settled());
  }

  #[test]
  fn events_during_apply_start_the_next_batch() {
    let doc = document();
    let applied = doc.enqueue(1, line("x"), false);
    let batch = doc.begin_apply().unwrap().unwrap();
    assert_eq!(doc.phase(), BatchPhase::Applying { queued: false });

    let next = doc.enqueue(2, line("y"), false);
    assert_eq!(doc.phase(), BatchPhase::Applying { queued: true });
    assert_eq!(doc.enqueue(3, line("z"), false).outcome(), None);
    assert!(doc.begin_apply().is_err());

    batch.resolve();
    doc.finish_apply();
    assert!(applied.is_settled());
    assert!(!next.is_settled());
    assert_eq!(doc.phase(), BatchPhase::Batching);
    assert_eq!(doc.begin_apply().unwrap().unwrap().events.len(), 2);
  }

  #[test]
  fn empty_queue_has_nothing_to_apply() {
    let doc = document();
    assert!(doc.begin_apply().unwrap().is_none());
    assert!(doc.pending_completion().is_none());
  }

  #[tokio::test(flavor = "current_thread")]
  async fn teardown_cancels_waiters() {
    let doc = document();
    doc.enqueue(1, line("x"), false);
    doc.teardown();
    assert!(doc.is_released());
    assert_eq!(doc.phase(), BatchPhase::Idle);
    assert_eq!(doc.wait_for_pending_edits().await, Ok(()));
  }

  #[tokio::test(flavor = "current_thread")]
  async fn teardown_settles_held_locks() {
    let doc = document();
    let lock = doc.enqueue(1, line("x"), false);
    doc.teardown();
    assert_eq!(lock.wait().await, Err(CompletionError::Cancelled));
  }
}
