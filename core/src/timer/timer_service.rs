use std::fmt::{Debug, Formatter};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use crate::timer::scheduler::SchedulerThread;
use crate::timer::tick_handler::{TickHandler, TickState};
use crate::timer::timer_handle::TimerHandleAllocator;
use crate::timer::timer_state::{TimerCallback, TimerEntry, TimerState};
use crate::timer::{
  Config, IntervalTickSource, SchedulerState, TickSource, TimerError, TimerHandle, TimerSnapshot,
};


/// Software timers multiplexed onto one tick source.
///
/// A service is created uninitialized, started with [`init`](Self::init) and stopped with
/// [`deinit`](Self::deinit); it may be initialized again afterwards. Clones share the same
/// instance.
///
/// Callbacks receive the context they were created with. They run one at a time on the
/// scheduler thread and never while the queue lock is held.
///
/// Dropping the last clone deinitializes a running service. A pending callback that owns a
/// clone keeps the service alive until it fires, is deleted or `deinit` is called; callbacks
/// that reach back into the service should capture a [`WeakTimerService`] instead.
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use std::time::Duration;
/// use delta_timer_core_rs::timer::{Config, TimerService};
///
/// # fn main() -> Result<(), delta_timer_core_rs::timer::TimerError> {
/// let service = TimerService::start(Config::with_resolution(Duration::from_millis(1)))?;
/// service.create(100, |name: &String| println!("{} expired", name), Arc::new("probe".to_string()))?;
/// std::thread::sleep(Duration::from_millis(150));
/// service.deinit()?;
/// # Ok(())
/// # }
/// ```
pub struct TimerService<C = ()>
where
  C: Send + Sync + 'static, {
  inner: Arc<ServiceInner<C>>,
}

struct ServiceInner<C> {
  config: Config,
  handles: TimerHandleAllocator,
  lifecycle: Mutex<Lifecycle<C>>,
}

struct Lifecycle<C> {
  tick_source: Box<dyn TickSource>,
  running: Option<Running<C>>,
  // Scheduler of the previous run; `init` waits for it before starting another one.
  retired: Option<Arc<SchedulerThread>>,
}

struct Running<C> {
  state: Arc<TimerState<C>>,
  scheduler: Arc<SchedulerThread>,
}

impl<C> Lifecycle<C> {
  // Stops ticking and takes the running instance, remembering its scheduler thread.
  fn retire(&mut self) -> Option<Running<C>> {
    let running = self.running.take()?;
    self.tick_source.stop();
    self.retired = Some(running.scheduler.clone());
    Some(running)
  }
}

impl<C> Running<C> {
  fn shutdown(self) -> Result<(), TimerError> {
    self.state.tick().request_stop();
    let drained = self.state.drain();
    tracing::info!(
      "TimerService::deinit: discarded {} pending timers without firing",
      drained.len()
    );
    drop(drained);
    if self.scheduler.is_current() {
      tracing::debug!("TimerService::deinit: called from a callback, the scheduler thread exits once it returns");
      return Ok(());
    }
    self.scheduler.join()
  }
}

impl<C> ServiceInner<C> {
  fn lock_lifecycle(&self) -> MutexGuard<'_, Lifecycle<C>> {
    self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner)
  }
}

impl<C> Drop for ServiceInner<C> {
  fn drop(&mut self) {
    let lifecycle = self.lifecycle.get_mut().unwrap_or_else(PoisonError::into_inner);
    if let Some(running) = lifecycle.retire() {
      if let Err(error) = running.shutdown() {
        tracing::warn!("TimerService::drop: {}", error);
      }
    }
  }
}

impl<C> TimerService<C>
where
  C: Send + Sync + 'static,
{
  /// Creates an uninitialized service ticking from an [`IntervalTickSource`].
  pub fn new(config: Config) -> Self {
    let tick_source = IntervalTickSource::with_thread_name(config.tick_thread_name.clone());
    Self::with_tick_source(config, tick_source)
  }

  /// Creates an uninitialized service ticking from `tick_source`.
  pub fn with_tick_source(config: Config, tick_source: impl TickSource) -> Self {
    Self {
      inner: Arc::new(ServiceInner {
        config,
        handles: TimerHandleAllocator::new(),
        lifecycle: Mutex::new(Lifecycle {
          tick_source: Box::new(tick_source),
          running: None,
          retired: None,
        }),
      }),
    }
  }

  /// Creates and initializes a service.
  pub fn start(config: Config) -> Result<Self, TimerError> {
    let service = Self::new(config);
    service.init()?;
    Ok(service)
  }

  pub fn start_with_tick_source(config: Config, tick_source: impl TickSource) -> Result<Self, TimerError> {
    let service = Self::with_tick_source(config, tick_source);
    service.init()?;
    Ok(service)
  }

  pub fn config(&self) -> &Config {
    &self.inner.config
  }

  pub fn resolution(&self) -> Duration {
    self.inner.config.resolution
  }

  /// Allocates the queue, starts the scheduler thread, then starts the tick source.
  ///
  /// When a previous run was stopped from one of its own callbacks, this waits for that
  /// callback to return first so that callbacks of two runs never overlap.
  ///
  /// # Errors
  /// - `InvalidArgument` when the configuration is invalid.
  /// - `AlreadyInitialized` when the service is running.
  /// - `ThreadError` when called from a callback of the stopped run, or a thread fails.
  pub fn init(&self) -> Result<(), TimerError> {
    self.inner.config.validate()?;
    loop {
      let retired = {
        let mut lifecycle = self.inner.lock_lifecycle();
        if lifecycle.running.is_some() {
          return Err(TimerError::AlreadyInitialized);
        }
        match lifecycle.retired.clone() {
          Some(retired) => retired,
          None => return self.start_running(&mut lifecycle),
        }
      };
      if retired.is_current() {
        return Err(TimerError::thread_error(
          "cannot initialize from a callback of the stopped scheduler",
        ));
      }
      let joined = retired.join();
      let mut lifecycle = self.inner.lock_lifecycle();
      if lifecycle
        .retired
        .as_ref()
        .is_some_and(|current| Arc::ptr_eq(current, &retired))
      {
        lifecycle.retired = None;
      }
      if let Err(error) = joined {
        tracing::warn!("TimerService::init: previous scheduler: {}", error);
      }
    }
  }

  fn start_running(&self, lifecycle: &mut Lifecycle<C>) -> Result<(), TimerError> {
    let config = &self.inner.config;
    let tick = Arc::new(TickState::new());
    let state = Arc::new(TimerState::new(tick.clone(), config.max_timers));
    let scheduler = Arc::new(SchedulerThread::spawn(state.clone(), &config.scheduler_thread_name)?);

    if let Err(error) = lifecycle.tick_source.start(config.resolution, TickHandler::new(tick.clone())) {
      tick.request_stop();
      if let Err(join_error) = scheduler.join() {
        tracing::warn!("TimerService::init: {}", join_error);
      }
      return Err(error);
    }

    lifecycle.running = Some(Running { state, scheduler });
    tracing::info!(
      "TimerService::init: resolution = {:?}, max_timers = {:?}",
      config.resolution,
      config.max_timers
    );
    Ok(())
  }

  pub fn is_initialized(&self) -> bool {
    self.inner.lock_lifecycle().running.is_some()
  }

  fn running_state(&self) -> Result<Arc<TimerState<C>>, TimerError> {
    self
      .inner
      .lock_lifecycle()
      .running
      .as_ref()
      .map(|running| running.state.clone())
      .ok_or(TimerError::NotInitialized)
  }

  /// Schedules `callback(&context)` to run once, `interval` ticks from now.
  ///
  /// # Errors
  /// - `InvalidArgument` when `interval` is zero or does not fit in an `i64`.
  /// - `NotInitialized` before `init` or after `deinit`.
  /// - `AllocationError` when the configured `max_timers` are already pending.
  pub fn create<F>(&self, interval: u64, callback: F, context: Arc<C>) -> Result<TimerHandle, TimerError>
  where
    F: Fn(&C) + Send + Sync + 'static, {
    self.create_with_callback(interval, Arc::new(callback), context)
  }

  /// Like [`create`](Self::create), for a callback shared between several timers.
  pub fn create_with_callback(
    &self,
    interval: u64,
    callback: TimerCallback<C>,
    context: Arc<C>,
  ) -> Result<TimerHandle, TimerError> {
    if interval == 0 {
      return Err(TimerError::invalid_argument("interval must be greater than zero"));
    }
    if i64::try_from(interval).is_err() {
      return Err(TimerError::invalid_argument(format!(
        "interval {} exceeds the maximum of {} ticks",
        interval,
        i64::MAX
      )));
    }
    let state = self.running_state()?;
    let handle = self
      .inner
      .handles
      .allocate()
      .ok_or_else(|| TimerError::AllocationError("timer handle space exhausted".to_string()))?;
    state.insert(handle, interval, TimerEntry::new(callback, context))?;
    Ok(handle)
  }

  /// Schedules a timer expiring after `delay`, rounded up to whole ticks (at least one).
  pub fn create_after<F>(&self, delay: Duration, callback: F, context: Arc<C>) -> Result<TimerHandle, TimerError>
  where
    F: Fn(&C) + Send + Sync + 'static, {
    let interval = self.inner.config.ticks_for(delay).max(1);
    self.create(interval, callback, context)
  }

  /// Removes a timer that has not fired yet; its callback will never run.
  ///
  /// # Errors
  /// - `NotFound` when the handle is stale, already fired or was never issued.
  /// - `NotInitialized` before `init` or after `deinit`.
  pub fn delete(&self, handle: TimerHandle) -> Result<(), TimerError> {
    let state = self.running_state()?;
    let entry = state.remove(handle)?;
    drop(entry);
    Ok(())
  }

  /// Stops the tick source and the scheduler, discarding pending timers without firing them.
  ///
  /// A callback already running when this is called completes before `deinit` returns, and
  /// no callback starts afterwards. Calling it on a service that is not running is a no-op.
  /// When called from a callback the scheduler thread is not waited for; it exits once the
  /// callback returns.
  pub fn deinit(&self) -> Result<(), TimerError> {
    let running = self.inner.lock_lifecycle().retire();
    match running {
      Some(running) => {
        let result = running.shutdown();
        tracing::info!("TimerService::deinit: stopped");
        result
      }
      None => Ok(()),
    }
  }

  /// Number of pending timers.
  pub fn len(&self) -> Result<usize, TimerError> {
    Ok(self.running_state()?.len())
  }

  pub fn is_empty(&self) -> Result<bool, TimerError> {
    Ok(self.len()? == 0)
  }

  /// Ticks delivered by the tick source that the queue has not consumed yet.
  pub fn pending_ticks(&self) -> Result<u64, TimerError> {
    Ok(self.running_state()?.tick().elapsed())
  }

  /// The pending timers in expiry order.
  pub fn snapshot(&self) -> Result<Vec<TimerSnapshot>, TimerError> {
    Ok(self.running_state()?.snapshot())
  }

  /// Logs every pending timer at debug level.
  pub fn dump(&self) -> Result<(), TimerError> {
    let snapshot = self.snapshot()?;
    tracing::debug!("TimerService::dump: {} pending timers", snapshot.len());
    for slot in snapshot {
      tracing::debug!(
        "Slot {} timer is {}, Interval = {}, Delta time (remaining) = {}, Deadline = {}",
        slot.slot,
        slot.handle,
        slot.interval,
        slot.remaining,
        slot.deadline
      );
    }
    Ok(())
  }

  /// Creates a handle that does not keep the service alive.
  pub fn downgrade(&self) -> WeakTimerService<C> {
    WeakTimerService {
      inner: Arc::downgrade(&self.inner),
    }
  }

  /// State of the scheduler thread; `Stopped` when the service is not running or the
  /// scheduler terminated on a fatal wait failure.
  pub fn scheduler_state(&self) -> SchedulerState {
    match self.running_state() {
      Ok(state) => state.scheduler_state(),
      Err(_) => SchedulerState::Stopped,
    }
  }
}

impl<C> Clone for TimerService<C>
where
  C: Send + Sync + 'static,
{
  fn clone(&self) -> Self {
    Self {
      inner: self.inner.clone(),
    }
  }
}

impl<C> PartialEq for TimerService<C>
where
  C: Send + Sync + 'static,
{
  fn eq(&self, other: &Self) -> bool {
    Arc::ptr_eq(&self.inner, &other.inner)
  }
}

impl<C> Debug for TimerService<C>
where
  C: Send + Sync + 'static,
{
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    let lifecycle = self.inner.lock_lifecycle();
    f.debug_struct("TimerService")
      .field("config", &self.inner.config)
      .field("tick_source", &lifecycle.tick_source)
      .field("state", &lifecycle.running.as_ref().map(|running| &running.state))
      .field(
        "retired_scheduler_finished",
        &lifecycle.retired.as_ref().map(|retired| retired.is_finished()),
      )
      .finish()
  }
}

/// A non-owning reference to a [`TimerService`], for callbacks that create or delete timers.
pub struct WeakTimerService<C = ()>
where
  C: Send + Sync + 'static, {
  inner: Weak<ServiceInner<C>>,
}

impl<C> WeakTimerService<C>
where
  C: Send + Sync + 'static,
{
  pub fn upgrade(&self) -> Option<TimerService<C>> {
    self.inner.upgrade().map(|inner| TimerService { inner })
  }

  pub fn is_alive(&self) -> bool {
    self.inner.strong_count() > 0
  }
}

impl<C> Clone for WeakTimerService<C>
where
  C: Send + Sync + 'static,
{
  fn clone(&self) -> Self {
    Self {
      inner: self.inner.clone(),
    }
  }
}

impl<C> Debug for WeakTimerService<C>
where
  C: Send + Sync + 'static,
{
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    write!(f, "WeakTimerService(strong={})", self.inner.strong_count())
  }
}

static_assertions::assert_impl_all!(TimerService<()>: Send, Sync, Clone);
static_assertions::assert_impl_all!(WeakTimerService<()>: Send, Sync, Clone);
