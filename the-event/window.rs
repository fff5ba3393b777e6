use std::time::Duration;

use tokio::time::Instant;

/// A fixed-length window that opens on the first event and closes once its
/// deadline passes. Unlike a debounce, later events never push the deadline
/// back, so a steady stream of events still gets flushed periodically.
#[derive(Debug, Clone)]
pub struct BatchWindow {
  length:   Duration,
  deadline: Option<Instant>,
}

impl BatchWindow {
  pub fn new(length: Duration) -> Self {
    Self {
      length,
      deadline: None,
    }
  }

  pub fn length(&self) -> Duration {
    self.length
  }

  /// Opens the window if it is closed and returns its deadline.
  pub fn open(&mut self, now: Instant) -> Instant {
    *self.deadline.get_or_insert(now + self.length)
  }

  pub fn close(&mut self) -> Option<Instant> {
    self.deadline.take()
  }

  pub fn deadline(&self) -> Option<Instant> {
    self.deadline
  }

  pub fn is_open(&self) -> bool {
    self.deadline.is_some()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn open_does_not_extend_deadline() {
    let start = Instant::now();
    let mut window = BatchWindow::new(Duration::from_millis(20));
    assert!(!window.is_open());

    let deadline = window.open(start);
    assert_eq!(deadline, start + Duration::from_millis(20));
    assert_eq!(window.open(start + Duration::from_millis(15)), deadline);
    assert_eq!(window.deadline(), Some(deadline));

    assert_eq!(window.close(), Some(deadline));
    assert!(!window.is_open());
    let reopened = window.open(start + Duration::from_millis(30));
    assert_eq!(reopened, start + Duration::from_millis(50));
  }
}
