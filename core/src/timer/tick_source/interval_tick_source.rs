use std::thread::JoinHandle;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::timer::{TickHandler, TickSource, TimerError, DEFAULT_TICK_THREAD_NAME};

/// Tick source backed by a tokio interval on a dedicated thread.
///
/// Missed periods are delivered as a burst, so a stalled thread never drops ticks.
#[derive(Debug)]
pub struct IntervalTickSource {
  thread_name: String,
  worker: Option<Worker>,
}

#[derive(Debug)]
struct Worker {
  shutdown: oneshot::Sender<()>,
  handle: JoinHandle<()>,
}

impl IntervalTickSource {
  pub fn new() -> Self {
    Self::with_thread_name(DEFAULT_TICK_THREAD_NAME)
  }

  pub fn with_thread_name(thread_name: impl Into<String>) -> Self {
    Self {
      thread_name: thread_name.into(),
      worker: None,
    }
  }

  pub fn is_running(&self) -> bool {
    self.worker.is_some()
  }
}

impl Default for IntervalTickSource {
  fn default() -> Self {
    Self::new()
  }
}

impl TickSource for IntervalTickSource {
  fn start(&mut self, resolution: Duration, handler: TickHandler) -> Result<(), TimerError> {
    if self.worker.is_some() {
      return Err(TimerError::AlreadyInitialized);
    }
    if resolution.is_zero() {
      return Err(TimerError::invalid_argument("tick resolution must be greater than zero"));
    }
    let runtime = tokio::runtime::Builder::new_current_thread()
      .enable_time()
      .build()
      .map_err(TimerError::thread_error)?;
    let (shutdown, mut shutdown_rx) = oneshot::channel::<()>();
    let handle = std::thread::Builder::new()
      .name(self.thread_name.clone())
      .spawn(move || {
        runtime.block_on(async move {
          let mut interval = interval_at(Instant::now() + resolution, resolution);
          interval.set_missed_tick_behavior(MissedTickBehavior::Burst);
          loop {
            tokio::select! {
              _ = interval.tick() => handler.on_tick(),
              _ = &mut shutdown_rx => break,
            }
          }
        })
      })
      .map_err(TimerError::thread_error)?;
    tracing::debug!(
      "IntervalTickSource::start: thread = {}, resolution = {:?}",
      self.thread_name,
      resolution
    );
    self.worker = Some(Worker { shutdown, handle });
    Ok(())
  }

  fn stop(&mut self) {
    if let Some(worker) = self.worker.take() {
      let _ = worker.shutdown.send(());
      if worker.handle.join().is_err() {
        tracing::warn!("IntervalTickSource::stop: tick thread {} panicked", self.thread_name);
      }
      tracing::debug!("IntervalTickSource::stop: thread = {}", self.thread_name);
    }
  }
}

impl Drop for IntervalTickSource {
  fn drop(&mut self) {
    self.stop();
  }
}

#[cfg(test)]
mod tests {
  use std::sync::Arc;

  use super::*;
  use crate::timer::tick_handler::TickState;

  #[test]
  fn test_interval_tick_source_delivers_ticks_until_stopped() {
    let state = Arc::new(TickState::new());
    let handler = TickHandler::new(state.clone());
    let mut source = IntervalTickSource::with_thread_name("tick-test");

    source.start(Duration::from_millis(1), handler.clone()).unwrap();
    assert!(source.is_running());
    std::thread::sleep(Duration::from_millis(50));
    source.stop();

    let delivered = handler.pending_ticks();
    assert!(delivered > 0);
    std::thread::sleep(Duration::from_millis(20));
    assert_eq!(handler.pending_ticks(), delivered);
    assert!(!source.is_running());
  }

  #[test]
  fn test_interval_tick_source_rejects_double_start() {
    let handler = TickHandler::new(Arc::new(TickState::new()));
    let mut source = IntervalTickSource::new();

    source.start(Duration::from_millis(5), handler.clone()).unwrap();
    assert_eq!(
      source.start(Duration::from_millis(5), handler),
      Err(TimerError::AlreadyInitialized)
    );
    source.stop();
    source.stop();
  }

  #[test]
  fn test_interval_tick_source_rejects_zero_resolution() {
    let handler = TickHandler::new(Arc::new(TickState::new()));
    let mut source = IntervalTickSource::new();
    assert!(matches!(
      source.start(Duration::ZERO, handler),
      Err(TimerError::InvalidArgument(_))
    ));
  }
}
