use async_trait::async_trait;
use the_bridge_diff::LineReplace;

use crate::handle::ExternalHandle;

/// The external engine side of a sync association.
#[async_trait]
pub trait ExternalEngine: Send + Sync + 'static {
  /// Sends `calls` as one atomic batch. The engine answers every call with
  /// a line event carrying a fresh tick, which the reconciler recognizes as
  /// an echo.
  async fn replace_lines(&self, buffer: ExternalHandle, calls: Vec<LineReplace>) -> anyhow::Result<()>;
}
