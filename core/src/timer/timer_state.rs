use std::fmt::{Debug, Formatter};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use delta_timer_utils_rs::collections::DeltaQueue;

use crate::timer::tick_handler::TickState;
use crate::timer::{SchedulerState, TimerError, TimerHandle};

pub type TimerCallback<C> = Arc<dyn Fn(&C) + Send + Sync + 'static>;

pub(crate) struct TimerEntry<C> {
  pub(crate) callback: TimerCallback<C>,
  pub(crate) context: Arc<C>,
}

impl<C> TimerEntry<C> {
  pub(crate) fn new(callback: TimerCallback<C>, context: Arc<C>) -> Self {
    Self { callback, context }
  }

  pub(crate) fn fire(&self) {
    (self.callback)(&self.context);
  }
}

/// One slot of the delta queue as seen by [`TimerService::snapshot`](crate::timer::TimerService::snapshot).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerSnapshot {
  /// 1-based position from the head.
  pub slot: usize,
  pub handle: TimerHandle,
  pub interval: u64,
  /// Ticks from the previous slot's expiry to this slot's expiry.
  pub remaining: i64,
  /// Ticks until this slot expires.
  pub deadline: i64,
}

/// The queue state of one running service instance.
///
/// The chain is only touched under `queue`; the tick counters are atomics that are
/// consumed while that mutex is held so that a fold and a mutation are never interleaved.
pub(crate) struct TimerState<C> {
  queue: Mutex<DeltaQueue<TimerHandle, TimerEntry<C>>>,
  tick: Arc<TickState>,
  scheduler_state: AtomicU8,
  max_timers: Option<usize>,
}

impl<C> TimerState<C> {
  pub(crate) fn new(tick: Arc<TickState>, max_timers: Option<usize>) -> Self {
    Self {
      queue: Mutex::new(DeltaQueue::new()),
      tick,
      scheduler_state: AtomicU8::new(SchedulerState::Waiting.into()),
      max_timers,
    }
  }

  pub(crate) fn tick(&self) -> &Arc<TickState> {
    &self.tick
  }

  fn lock_queue(&self) -> MutexGuard<'_, DeltaQueue<TimerHandle, TimerEntry<C>>> {
    let mut queue = self.queue.lock().unwrap_or_else(PoisonError::into_inner);
    queue.advance(self.tick.take_elapsed());
    queue
  }

  pub(crate) fn insert(&self, handle: TimerHandle, interval: u64, entry: TimerEntry<C>) -> Result<usize, TimerError> {
    let mut queue = self.lock_queue();
    if self.tick.is_stop_requested() {
      return Err(TimerError::NotInitialized);
    }
    if let Some(max_timers) = self.max_timers {
      if queue.len() >= max_timers {
        return Err(TimerError::AllocationError(format!(
          "timer capacity of {} exhausted",
          max_timers
        )));
      }
    }
    let position = queue.insert(handle, interval, entry);
    tracing::debug!(
      "TimerState::insert: handle = {}, interval = {}, position = {}, len = {}",
      handle,
      interval,
      position,
      queue.len()
    );
    Ok(position)
  }

  /// Unlinks a pending timer. The entry is handed back so that it is dropped after the lock is released.
  pub(crate) fn remove(&self, handle: TimerHandle) -> Result<TimerEntry<C>, TimerError> {
    let mut queue = self.lock_queue();
    let entry = queue.remove(&handle).ok_or(TimerError::NotFound(handle))?;
    tracing::debug!("TimerState::remove: handle = {}, len = {}", handle, queue.len());
    Ok(entry)
  }

  /// Folds pending ticks into the head and unlinks it if it is due.
  pub(crate) fn next_expired(&self) -> Option<(TimerHandle, TimerEntry<C>)> {
    self.lock_queue().pop_expired()
  }

  pub(crate) fn drain(&self) -> Vec<TimerEntry<C>> {
    let mut queue = self.lock_queue();
    queue.drain().into_iter().map(|(_, entry)| entry).collect()
  }

  pub(crate) fn len(&self) -> usize {
    self.lock_queue().len()
  }

  pub(crate) fn snapshot(&self) -> Vec<TimerSnapshot> {
    let queue = self.lock_queue();
    queue
      .iter()
      .enumerate()
      .map(|(index, entry)| TimerSnapshot {
        slot: index + 1,
        handle: *entry.key,
        interval: entry.interval,
        remaining: entry.remaining,
        deadline: entry.deadline,
      })
      .collect()
  }

  pub(crate) fn scheduler_state(&self) -> SchedulerState {
    SchedulerState::try_from(self.scheduler_state.load(Ordering::Acquire)).unwrap_or(SchedulerState::Stopped)
  }

  pub(crate) fn set_scheduler_state(&self, state: SchedulerState) {
    self.scheduler_state.store(state.into(), Ordering::Release);
  }
}

impl<C> Debug for TimerState<C> {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("TimerState")
      .field("tick", &self.tick)
      .field("scheduler_state", &self.scheduler_state())
      .field("max_timers", &self.max_timers)
      .finish()
  }
}
