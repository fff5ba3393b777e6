//! Utilities for declaring an async (usually debounced) hook

mod window;

use tokio::{
  sync::mpsc::{
    self,
    UnboundedReceiver,
    UnboundedSender,
  },
  time::Instant,
};
pub use window::BatchWindow;

/// Async hooks provide a convenient framework for implementing (debounced)
/// async event handlers. The hook runs as a background tokio task that waits
/// for events to be sent through a channel and owns whatever state it needs
/// to coordinate them.
pub trait AsyncHook: Sync + Send + 'static + Sized {
  type Event: Sync + Send + 'static;
  /// Called immediately whenever an event is received, this function can
  /// consume the event immediately or debounce it. In case of debouncing,
  /// it can either define a new debounce timeout or continue the current one
  fn handle_event(&mut self, event: Self::Event, timeout: Option<Instant>) -> Option<Instant>;

  /// Called whenever the debounce timeline is reached. Returning a deadline
  /// arms the hook again without waiting for another event.
  fn finish_debounce(&mut self) -> Option<Instant>;

  fn spawn(self) -> UnboundedSender<Self::Event> {
    let (tx, rx) = mpsc::unbounded_channel();
    // only spawn worker if we are inside runtime to avoid having to spawn a runtime
    // for unrelated unit tests
    if tokio::runtime::Handle::try_current().is_ok() {
      tokio::spawn(run(self, rx));
    }
    tx
  }
}

async fn run<Hook: AsyncHook>(mut hook: Hook, mut rx: UnboundedReceiver<Hook::Event>) {
  let mut deadline = None;
  loop {
    let event = match deadline {
      Some(deadline_) => {
        let res = tokio::time::timeout_at(deadline_, rx.recv()).await;
        match res {
          Ok(event) => event,
          Err(_) => {
            deadline = hook.finish_debounce();
            continue;
          },
        }
      },
      None => rx.recv().await,
    };
    let Some(event) = event else {
      break;
    };
    deadline = hook.handle_event(event, deadline);
  }

  // every sender is gone, but work that was already debounced still runs
  while let Some(deadline_) = deadline {
    tokio::time::sleep_until(deadline_).await;
    deadline = hook.finish_debounce();
  }
  log::trace!("async hook stopped");
}
