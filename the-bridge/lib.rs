//! Bidirectional synchronization between host editor documents and the
//! buffers of an external line-grid editing engine.
//!
//! A [`Reconciler`] owns the [`SyncRegistry`] of associated documents and
//! reconciles change events from both sides. Host and engine are reached
//! through the [`HostEditor`] and [`ExternalEngine`] traits; the transport
//! behind them is up to the embedder.

pub mod completion;
pub mod config;
pub mod document;
pub mod error;
pub mod event;
pub mod external;
pub mod handle;
pub mod host;
pub mod reconciler;
pub mod registry;

#[cfg(test)]
mod test_support;

pub use completion::{
  CompletionLock,
  CompletionOutcome,
};
pub use config::{
  DocumentOptions,
  Indentation,
  SyncConfig,
};
pub use document::{
  BatchPhase,
  Document,
};
pub use error::{
  CompletionError,
  Result,
  SyncError,
};
pub use event::{
  ExternalLinesEvent,
  HostChangeEvent,
  HostContentChange,
};
pub use external::ExternalEngine;
pub use handle::{
  DocumentKey,
  ExternalHandle,
  Handle,
  HostHandle,
};
pub use host::{
  EditTransaction,
  HostEditor,
};
pub use reconciler::{
  Outcome,
  Reconciler,
  SkipReason,
};
pub use registry::SyncRegistry;
pub use the_bridge_diff as diff;
