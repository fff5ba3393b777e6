use thiserror::Error;

use crate::handle::Handle;

#[derive(Debug, Error)]
pub enum SyncError {
  /// The event's tick or version is not newer than the recorded skip value.
  #[error("stale event: {seen} <= {skip}")]
  StaleEvent { seen: u64, skip: u64 },
  #[error("no document is associated with {0}")]
  NoAssociatedDocument(Handle),
  #[error("diff produced no edits")]
  EmptyDiff,
  #[error("failed to apply edits: {0:#}")]
  ApplyFailed(anyhow::Error),
  #[error("internal invariant violated: {0}")]
  InvariantViolation(String),
  #[error("{0} is already associated with a document")]
  AlreadyAssociated(Handle),
  #[error("invalid sync configuration: {0}")]
  Config(#[from] toml::de::Error),
}

impl SyncError {
  /// Transient errors are absorbed by the reconciler: the event is dropped
  /// and syncing continues.
  pub fn is_transient(&self) -> bool {
    matches!(
      self,
      SyncError::StaleEvent { .. } | SyncError::NoAssociatedDocument(_) | SyncError::EmptyDiff
    )
  }
}

pub type Result<T> = std::result::Result<T, SyncError>;

/// What a waiter on a completion lock observes when the edits it waited
/// for never landed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompletionError {
  #[error("edit batch failed: {0}")]
  Failed(String),
  #[error("edit batch was cancelled")]
  Cancelled,
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::handle::HostHandle;

  #[test]
  fn transient_kinds() {
    assert!(SyncError::StaleEvent { seen: 1, skip: 2 }.is_transient());
    assert!(SyncError::NoAssociatedDocument(HostHandle(3).into()).is_transient());
    assert!(SyncError::EmptyDiff.is_transient());
    assert!(!SyncError::ApplyFailed(anyhow::anyhow!("closed")).is_transient());
    assert!(!SyncError::InvariantViolation("double apply".into()).is_transient());
  }

  #[test]
  fn apply_failed_keeps_context() {
    let err = anyhow::anyhow!("rpc timed out").context("replace_lines");
    let message = SyncError::ApplyFailed(err).to_string();
    assert_eq!(message, "failed to apply edits: replace_lines: rpc timed out");
  }
}
