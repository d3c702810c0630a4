use std::fmt::{Debug, Formatter};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;

/// A latch released once `count_down` has been called `count` times.
///
/// `count_down` never blocks or awaits, so it can be called from timer callbacks
/// running on the scheduler thread; waiters are async.
#[derive(Clone)]
pub struct CountDownLatch {
  inner: Arc<State>,
}

struct State {
  count: AtomicUsize,
  notify: Notify,
}

impl Debug for CountDownLatch {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("CountDownLatch").field("count", &self.count()).finish()
  }
}

impl Eq for CountDownLatch {}

impl PartialEq for CountDownLatch {
  fn eq(&self, other: &Self) -> bool {
    Arc::ptr_eq(&self.inner, &other.inner)
  }
}

impl Default for CountDownLatch {
  fn default() -> Self {
    Self::new(0)
  }
}

impl CountDownLatch {
  pub fn new(count: usize) -> Self {
    Self {
      inner: Arc::new(State {
        count: AtomicUsize::new(count),
        notify: Notify::new(),
      }),
    }
  }

  pub fn count(&self) -> usize {
    self.inner.count.load(Ordering::SeqCst)
  }

  /// Decrements the count, releasing every waiter when it reaches zero.
  /// Calls made after the latch is open are ignored.
  pub fn count_down(&self) {
    let updated = self
      .inner
      .count
      .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |count| count.checked_sub(1));
    match updated {
      Ok(1) => self.inner.notify.notify_waiters(),
      Ok(_) => {}
      Err(_) => tracing::warn!("CountDownLatch::count_down called on an open latch"),
    }
  }

  pub async fn wait(&self) {
    loop {
      let notified = self.inner.notify.notified();
      if self.count() == 0 {
        break;
      }
      notified.await;
    }
  }

  /// Waits for the latch, giving up after `timeout`.
  ///
  /// Returns `true` when the latch opened in time.
  pub async fn wait_timeout(&self, timeout: Duration) -> bool {
    tokio::time::timeout(timeout, self.wait()).await.is_ok()
  }
}

#[cfg(test)]
mod tests {
  use super::CountDownLatch;
  use std::time::Duration;

  #[tokio::test]
  async fn latch_reaches_zero() {
    let latch = CountDownLatch::new(2);
    let latch_clone = latch.clone();
    let worker = tokio::spawn(async move {
      latch_clone.count_down();
      latch_clone.count_down();
    });

    assert!(latch.wait_timeout(Duration::from_secs(5)).await);
    worker.await.unwrap();
    assert_eq!(latch.count(), 0);
  }

  #[tokio::test]
  async fn latch_counted_down_from_plain_thread() {
    let latch = CountDownLatch::new(3);
    let latch_clone = latch.clone();
    let handle = std::thread::spawn(move || {
      for _ in 0..3 {
        latch_clone.count_down();
      }
    });

    assert!(latch.wait_timeout(Duration::from_secs(5)).await);
    handle.join().unwrap();
  }

  #[tokio::test]
  async fn wait_times_out_while_closed() {
    let latch = CountDownLatch::new(1);
    assert!(!latch.wait_timeout(Duration::from_millis(20)).await);
    assert_eq!(latch.count(), 1);
  }

  #[tokio::test]
  async fn extra_count_down_is_ignored() {
    let latch = CountDownLatch::new(1);
    latch.count_down();
    latch.count_down();
    assert_eq!(latch.count(), 0);
    latch.wait().await;
  }
}
