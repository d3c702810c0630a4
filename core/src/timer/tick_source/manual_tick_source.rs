use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use crate::timer::{TickHandler, TickSource, TimerError};

/// A tick source driven by hand, for simulations and deterministic tests.
///
/// Clones share the same slot, so a test can keep one clone and hand the other to the service.
#[derive(Debug, Clone, Default)]
pub struct ManualTickSource {
  handler: Arc<Mutex<Option<TickHandler>>>,
}

impl ManualTickSource {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn is_running(&self) -> bool {
    self.current().is_some()
  }

  /// Delivers one tick. Returns `false` when the source is not started.
  pub fn tick(&self) -> bool {
    self.advance(1) == 1
  }

  /// Delivers `ticks` ticks back to back and returns how many were delivered.
  pub fn advance(&self, ticks: u64) -> u64 {
    match self.current() {
      Some(handler) => {
        for _ in 0..ticks {
          handler.on_tick();
        }
        ticks
      }
      None => 0,
    }
  }

  fn current(&self) -> Option<TickHandler> {
    self.handler.lock().unwrap_or_else(PoisonError::into_inner).clone()
  }
}

impl TickSource for ManualTickSource {
  fn start(&mut self, resolution: Duration, handler: TickHandler) -> Result<(), TimerError> {
    let mut slot = self.handler.lock().unwrap_or_else(PoisonError::into_inner);
    if slot.is_some() {
      return Err(TimerError::AlreadyInitialized);
    }
    tracing::debug!("ManualTickSource::start: resolution = {:?}", resolution);
    *slot = Some(handler);
    Ok(())
  }

  fn stop(&mut self) {
    self.handler.lock().unwrap_or_else(PoisonError::into_inner).take();
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::timer::tick_handler::TickState;

  #[test]
  fn test_manual_tick_source_only_ticks_while_started() {
    let handler = TickHandler::new(Arc::new(TickState::new()));
    let source = ManualTickSource::new();
    let mut driver = source.clone();

    assert!(!source.tick());

    driver.start(Duration::from_millis(1), handler.clone()).unwrap();
    assert!(source.is_running());
    assert!(source.tick());
    assert_eq!(source.advance(4), 4);
    assert_eq!(handler.pending_ticks(), 5);

    driver.stop();
    assert_eq!(source.advance(3), 0);
    assert_eq!(handler.pending_ticks(), 5);
  }
}
