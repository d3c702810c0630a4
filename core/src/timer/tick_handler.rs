use std::fmt::{Debug, Formatter};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::Semaphore;

/// State shared between the tick context and the scheduler thread.
///
/// Only atomics and the wake semaphore live here: the tick side never takes a lock.
pub(crate) struct TickState {
  elapsed: AtomicU64,
  schedule: AtomicBool,
  stop: AtomicBool,
  wake: Semaphore,
}

impl TickState {
  pub(crate) fn new() -> Self {
    Self {
      elapsed: AtomicU64::new(0),
      schedule: AtomicBool::new(false),
      stop: AtomicBool::new(false),
      wake: Semaphore::new(0),
    }
  }

  pub(crate) fn record_tick(&self) {
    self.elapsed.fetch_add(1, Ordering::AcqRel);
    self.schedule.store(true, Ordering::Release);
    self.wake.add_permits(1);
  }

  /// Takes every tick observed since the previous call. Called under the queue mutex.
  pub(crate) fn take_elapsed(&self) -> u64 {
    self.elapsed.swap(0, Ordering::AcqRel)
  }

  pub(crate) fn elapsed(&self) -> u64 {
    self.elapsed.load(Ordering::Acquire)
  }

  pub(crate) fn take_schedule(&self) -> bool {
    self.schedule.swap(false, Ordering::AcqRel)
  }

  pub(crate) fn is_schedule_pending(&self) -> bool {
    self.schedule.load(Ordering::Acquire)
  }

  pub(crate) fn request_stop(&self) {
    self.stop.store(true, Ordering::Release);
    self.wake.add_permits(1);
  }

  pub(crate) fn is_stop_requested(&self) -> bool {
    self.stop.load(Ordering::Acquire)
  }

  pub(crate) fn wake(&self) -> &Semaphore {
    &self.wake
  }
}

impl Debug for TickState {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("TickState")
      .field("elapsed", &self.elapsed())
      .field("schedule", &self.is_schedule_pending())
      .field("stop", &self.is_stop_requested())
      .field("wake_permits", &self.wake.available_permits())
      .finish()
  }
}

/// The routine a [`TickSource`](crate::timer::TickSource) invokes once per tick.
///
/// `on_tick` counts the tick, marks a check as due and posts the scheduler's wake
/// semaphore once. It does not allocate, block or lock, and never runs user callbacks,
/// so it may be called from an interrupt-like context.
#[derive(Clone)]
pub struct TickHandler {
  state: Arc<TickState>,
}

impl TickHandler {
  pub(crate) fn new(state: Arc<TickState>) -> Self {
    Self { state }
  }

  pub fn on_tick(&self) {
    self.state.record_tick();
  }

  /// Ticks recorded but not yet folded into the queue.
  pub fn pending_ticks(&self) -> u64 {
    self.state.elapsed()
  }
}

impl Debug for TickHandler {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("TickHandler").field("state", &self.state).finish()
  }
}
