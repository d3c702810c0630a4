//! Delta list software timers.

pub mod timer;

pub use timer::{
  Config, ConfigOption, IntervalTickSource, ManualTickSource, SchedulerState, TickHandler, TickSource, TimerCallback,
  TimerError, TimerHandle, TimerService, TimerSnapshot, WeakTimerService,
};
