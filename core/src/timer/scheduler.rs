use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{JoinHandle, ThreadId};

use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::timer::timer_state::{TimerEntry, TimerState};
use crate::timer::{TimerError, TimerHandle};


#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum SchedulerState {
  /// Blocked on the wake semaphore.
  Waiting,
  /// Folding elapsed ticks into the head.
  Checking,
  /// Running a callback; the queue lock is not held.
  Firing,
  /// Terminal.
  Stopped,
}

/// The single consumer of ticks. It is the only place user callbacks run.
pub(crate) struct Scheduler<C> {
  state: Arc<TimerState<C>>,
}

impl<C> Scheduler<C>
where
  C: Send + Sync + 'static,
{
  pub(crate) fn new(state: Arc<TimerState<C>>) -> Self {
    Self { state }
  }

  /// Performs one check if a tick marked it as due, firing every timer whose deadline has passed.
  ///
  /// Returns the number of callbacks invoked.
  pub(crate) fn run_pending(&self) -> usize {
    let tick = self.state.tick();
    if !tick.take_schedule() {
      return 0;
    }
    self.state.set_scheduler_state(SchedulerState::Checking);
    let mut fired = 0;
    while !tick.is_stop_requested() {
      let Some((handle, entry)) = self.state.next_expired() else {
        break;
      };
      self.state.set_scheduler_state(SchedulerState::Firing);
      self.fire(handle, entry);
      fired += 1;
      self.state.set_scheduler_state(SchedulerState::Checking);
    }
    self.state.set_scheduler_state(SchedulerState::Waiting);
    fired
  }

  fn fire(&self, handle: TimerHandle, entry: TimerEntry<C>) {
    tracing::debug!("Scheduler::fire: handle = {}", handle);
    if let Err(panic) = catch_unwind(AssertUnwindSafe(|| entry.fire())) {
      tracing::error!(
        "Scheduler::fire: callback of {} panicked: {}",
        handle,
        panic_message(&*panic)
      );
    }
  }

  pub(crate) async fn run(self) {
    let tick = self.state.tick().clone();
    tracing::debug!("Scheduler::run: started");
    while !tick.is_stop_requested() {
      match tick.wake().acquire().await {
        Ok(permit) => permit.forget(),
        Err(_) => {
          tracing::error!("Scheduler::run: wake semaphore closed, pending timers will never fire");
          break;
        }
      }
      // Ticks that piled up while we were busy are covered by a single check.
      let surplus = u32::try_from(tick.wake().available_permits()).unwrap_or(u32::MAX);
      if surplus > 0 {
        if let Ok(permits) = tick.wake().try_acquire_many(surplus) {
          permits.forget();
        }
      }
      if tick.is_stop_requested() {
        break;
      }
      self.run_pending();
    }
    self.state.set_scheduler_state(SchedulerState::Stopped);
    tracing::debug!("Scheduler::run: stopped");
  }
}

/// The dedicated OS thread driving a [`Scheduler`] on a current-thread runtime.
///
/// Shared so that a service can keep a thread it could not join yet and join it later.
#[derive(Debug)]
pub(crate) struct SchedulerThread {
  handle: Mutex<Option<JoinHandle<()>>>,
  thread_id: ThreadId,
}

impl SchedulerThread {
  pub(crate) fn spawn<C>(state: Arc<TimerState<C>>, thread_name: &str) -> Result<Self, TimerError>
  where
    C: Send + Sync + 'static, {
    let runtime = tokio::runtime::Builder::new_current_thread()
      .build()
      .map_err(TimerError::thread_error)?;
    let scheduler = Scheduler::new(state);
    let handle = std::thread::Builder::new()
      .name(thread_name.to_string())
      .spawn(move || runtime.block_on(scheduler.run()))
      .map_err(TimerError::thread_error)?;
    let thread_id = handle.thread().id();
    Ok(Self {
      handle: Mutex::new(Some(handle)),
      thread_id,
    })
  }

  pub(crate) fn is_current(&self) -> bool {
    std::thread::current().id() == self.thread_id
  }

  /// Waits for the thread to finish. Concurrent callers all return once it has exited.
  ///
  /// # Errors
  /// - `ThreadError` when called from the scheduler thread itself or when the thread panicked.
  pub(crate) fn join(&self) -> Result<(), TimerError> {
    if self.is_current() {
      return Err(TimerError::thread_error("the scheduler thread cannot join itself"));
    }
    let mut handle = self.handle.lock().unwrap_or_else(PoisonError::into_inner);
    match handle.take() {
      Some(handle) => handle
        .join()
        .map_err(|panic| TimerError::ThreadError(format!("scheduler thread panicked: {}", panic_message(&*panic)))),
      None => Ok(()),
    }
  }

  pub(crate) fn is_finished(&self) -> bool {
    self
      .handle
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .as_ref()
      .map_or(true, JoinHandle::is_finished)
  }
}

pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
  if let Some(message) = panic.downcast_ref::<&str>() {
    message.to_string()
  } else if let Some(message) = panic.downcast_ref::<String>() {
    message.clone()
  } else {
    "unknown panic".to_string()
  }
}
