use std::fmt::Debug;
use std::time::Duration;

use crate::timer::{TickHandler, TimerError};

mod interval_tick_source;
mod manual_tick_source;

pub use self::{interval_tick_source::*, manual_tick_source::*};

/// A periodic signal generator driving one timer service.
///
/// Implementations call [`TickHandler::on_tick`] once per `resolution` until stopped.
/// How ticks are produced (an OS timer, an interrupt, a test driver) is up to the implementation.
pub trait TickSource: Debug + Send + 'static {
  fn start(&mut self, resolution: Duration, handler: TickHandler) -> Result<(), TimerError>;

  /// Stops delivering ticks. Must be idempotent.
  fn stop(&mut self);
}

impl<T: TickSource + ?Sized> TickSource for Box<T> {
  fn start(&mut self, resolution: Duration, handler: TickHandler) -> Result<(), TimerError> {
    (**self).start(resolution, handler)
  }

  fn stop(&mut self) {
    (**self).stop()
  }
}
