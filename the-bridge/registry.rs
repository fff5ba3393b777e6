use std::{
  collections::HashMap,
  sync::Arc,
};

use parking_lot::Mutex;
use ropey::Rope;
use slotmap::SlotMap;

use crate::{
  config::DocumentOptions,
  document::Document,
  error::{
    Result,
    SyncError,
  },
  handle::{
    DocumentKey,
    ExternalHandle,
    Handle,
    HostHandle,
  },
};

#[derive(Default)]
struct Documents {
  slots:       SlotMap<DocumentKey, Arc<Document>>,
  by_host:     HashMap<HostHandle, DocumentKey>,
  by_external: HashMap<ExternalHandle, DocumentKey>,
}

/// Bidirectional map between host documents and external buffers.
///
/// Lookups return shared handles, so a document stays usable by in-flight
/// tasks after it was released; those tasks check
/// [`Document::is_released`] before touching either side.
#[derive(Default)]
pub struct SyncRegistry {
  inner: Mutex<Documents>,
}

impl SyncRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  /// Associates `host` with `external`, seeding the external snapshot with
  /// `text`. Fails when either handle is already part of an association.
  pub fn associate(
    &self,
    host: HostHandle,
    external: ExternalHandle,
    text: Rope,
    options: DocumentOptions,
  ) -> Result<Arc<Document>> {
    let mut inner = self.inner.lock();
    if inner.by_host.contains_key(&host) {
      return Err(SyncError::AlreadyAssociated(host.into()));
    }
    if inner.by_external.contains_key(&external) {
      return Err(SyncError::AlreadyAssociated(external.into()));
    }

    let key = inner
      .slots
      .insert_with_key(|key| Arc::new(Document::new(key, host, external, text, options)));
    inner.by_host.insert(host, key);
    inner.by_external.insert(external, key);
    log::debug!("associated {host} with {external}");
    Ok(inner.slots[key].clone())
  }

  pub fn lookup_by_host(&self, host: HostHandle) -> Option<Arc<Document>> {
    let inner = self.inner.lock();
    let key = inner.by_host.get(&host)?;
    inner.slots.get(*key).cloned()
  }

  pub fn lookup_by_external(&self, external: ExternalHandle) -> Option<Arc<Document>> {
    let inner = self.inner.lock();
    let key = inner.by_external.get(&external)?;
    inner.slots.get(*key).cloned()
  }

  pub fn lookup(&self, key: DocumentKey) -> Option<Arc<Document>> {
    self.inner.lock().slots.get(key).cloned()
  }

  pub fn get(&self, handle: Handle) -> Option<Arc<Document>> {
    match handle {
      Handle::Host(host) => self.lookup_by_host(host),
      Handle::External(external) => self.lookup_by_external(external),
    }
  }

  /// Removes the association `handle` belongs to and cancels its pending
  /// work. Both handles become free for a new association.
  pub fn release(&self, handle: impl Into<Handle>) -> Result<Arc<Document>> {
    let handle = handle.into();
    let doc = {
      let mut inner = self.inner.lock();
      let key = match handle {
        Handle::Host(host) => inner.by_host.get(&host).copied(),
        Handle::External(external) => inner.by_external.get(&external).copied(),
      }
      .ok_or(SyncError::NoAssociatedDocument(handle))?;
      let doc = inner
        .slots
        .remove(key)
        .ok_or(SyncError::NoAssociatedDocument(handle))?;
      inner.by_host.remove(&doc.host());
      inner.by_external.remove(&doc.external());
      doc
    };
    doc.teardown();
    log::debug!("released {} / {}", doc.host(), doc.external());
    Ok(doc)
  }

  pub fn len(&self) -> usize {
    self.inner.lock().slots.len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// Snapshot of every live association.
  pub fn documents(&self) -> Vec<Arc<Document>> {
    self.inner.lock().slots.values().cloned().collect()
  }
}
