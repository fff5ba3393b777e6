use std::fmt;

slotmap::new_key_type! {
  /// Stable identity of an associated document.
  pub struct DocumentKey;
}

/// Host editor document identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HostHandle(pub u64);

/// External engine buffer identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExternalHandle(pub i64);

/// Either side's identity, for operations that accept both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Handle {
  Host(HostHandle),
  External(ExternalHandle),
}

impl From<HostHandle> for Handle {
  fn from(handle: HostHandle) -> Self {
    Handle::Host(handle)
  }
}

impl From<ExternalHandle> for Handle {
  fn from(handle: ExternalHandle) -> Self {
    Handle::External(handle)
  }
}

impl fmt::Display for HostHandle {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "host document {}", self.0)
  }
}

impl fmt::Display for ExternalHandle {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "external buffer {}", self.0)
  }
}

impl fmt::Display for Handle {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Handle::Host(handle) => handle.fmt(f),
      Handle::External(handle) => handle.fmt(f),
    }
  }
}
