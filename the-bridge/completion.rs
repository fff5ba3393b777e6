//! One-shot completion signals for edit batches.

use std::sync::Arc;

use tokio::sync::watch;

use crate::error::CompletionError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionOutcome {
  Resolved,
  Rejected(String),
  Cancelled,
}

impl CompletionOutcome {
  fn into_result(self) -> Result<(), CompletionError> {
    match self {
      CompletionOutcome::Resolved => Ok(()),
      CompletionOutcome::Rejected(msg) => Err(CompletionError::Failed(msg)),
      CompletionOutcome::Cancelled => Err(CompletionError::Cancelled),
    }
  }
}

/// Settles exactly once when the batch of edits it was handed out for has
/// landed (or failed to). Clones share the same signal; any number of tasks
/// may wait on it, including after it settled.
#[derive(Debug, Clone)]
pub struct CompletionLock {
  state: Arc<watch::Sender<Option<CompletionOutcome>>>,
}

impl Default for CompletionLock {
  fn default() -> Self {
    Self::new()
  }
}

impl CompletionLock {
  pub fn new() -> Self {
    let (state, _) = watch::channel(None);
    Self {
      state: Arc::new(state),
    }
  }

  /// Returns `false` when the lock had already settled; the first outcome
  /// always wins.
  fn settle(&self, outcome: CompletionOutcome) -> bool {
    self.state.send_if_modified(|state| {
      if state.is_some() {
        return false;
      }
      *state = Some(outcome);
      true
    })
  }

  pub fn resolve(&self) -> bool {
    self.settle(CompletionOutcome::Resolved)
  }

  pub fn reject(&self, msg: impl Into<String>) -> bool {
    self.settle(CompletionOutcome::Rejected(msg.into()))
  }

  pub fn cancel(&self) -> bool {
    self.settle(CompletionOutcome::Cancelled)
  }

  pub fn is_settled(&self) -> bool {
    self.state.borrow().is_some()
  }

  pub fn outcome(&self) -> Option<CompletionOutcome> {
    self.state.borrow().clone()
  }

  pub async fn wait(&self) -> Result<(), CompletionError> {
    let mut rx = self.state.subscribe();
    // the sender lives in `self`, so the channel cannot close while waiting
    let outcome = match rx.wait_for(Option::is_some).await {
      Ok(outcome) => outcome.clone(),
      Err(_) => None,
    };
    outcome.map_or(Err(CompletionError::Cancelled), CompletionOutcome::into_result)
  }
}
