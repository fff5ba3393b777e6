use async_trait::async_trait;
use ropey::Rope;
use the_bridge_diff::{
  HostEdit,
  Position,
};

use crate::{
  config::Indentation,
  handle::HostHandle,
};

/// A batch of edits applied to one host document as a single operation.
///
/// Edits are ascending, non-overlapping and expressed in the coordinates of
/// the document before any of them is applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditTransaction {
  pub edits:            Vec<HostEdit>,
  pub undo_stop_before: bool,
  pub undo_stop_after:  bool,
}

impl EditTransaction {
  /// A transaction that does not split the host's undo history, so the
  /// external engine stays in charge of undo grouping.
  pub fn new(edits: Vec<HostEdit>) -> Self {
    Self {
      edits,
      undo_stop_before: false,
      undo_stop_after: false,
    }
  }
}

/// The host editor side of a sync association.
#[async_trait]
pub trait HostEditor: Send + Sync + 'static {
  /// Current text of `doc`, or `None` once the host closed it.
  fn text(&self, doc: HostHandle) -> Option<Rope>;

  fn version(&self, doc: HostHandle) -> Option<u64>;

  fn cursor(&self, doc: HostHandle) -> Option<Position>;

  fn set_cursor(&self, doc: HostHandle, pos: Position);

  /// Called once when `doc` is attached.
  fn set_indentation(&self, doc: HostHandle, indentation: Indentation);

  /// Applies `transaction` and bumps the document version once.
  async fn apply_edits(&self, doc: HostHandle, transaction: EditTransaction) -> anyhow::Result<()>;
}
