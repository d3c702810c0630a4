//! Software timers multiplexed onto a single periodic tick source.
//!
//! A [`TickSource`] calls the [`TickHandler`] once per resolution period. The handler only
//! counts the tick and wakes the scheduler thread, which folds the elapsed ticks into the
//! head of a delta queue and runs the callbacks of every timer that became due.

mod config;
mod config_option;
mod scheduler;
mod tick_handler;
mod tick_source;
mod timer_error;
mod timer_handle;
mod timer_service;
mod timer_state;

pub use self::{
  config::*, config_option::*, scheduler::SchedulerState, tick_handler::TickHandler, tick_source::*, timer_error::*,
  timer_handle::TimerHandle, timer_service::*, timer_state::TimerCallback, timer_state::TimerSnapshot,
};
