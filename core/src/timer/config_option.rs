use std::time::Duration;

use crate::timer::Config;

#[derive(Debug, Clone)]
pub enum ConfigOption {
  SetResolution(Duration),
  SetMaxTimers(usize),
  SetSchedulerThreadName(String),
  SetTickThreadName(String),
}

impl ConfigOption {
  pub fn apply(&self, config: &mut Config) {
    match self {
      ConfigOption::SetResolution(resolution) => {
        config.resolution = *resolution;
      }
      ConfigOption::SetMaxTimers(max_timers) => {
        config.max_timers = Some(*max_timers);
      }
      ConfigOption::SetSchedulerThreadName(name) => {
        config.scheduler_thread_name = name.clone();
      }
      ConfigOption::SetTickThreadName(name) => {
        config.tick_thread_name = name.clone();
      }
    }
  }

  pub fn with_resolution(resolution: Duration) -> ConfigOption {
    ConfigOption::SetResolution(resolution)
  }

  pub fn with_max_timers(max_timers: usize) -> ConfigOption {
    ConfigOption::SetMaxTimers(max_timers)
  }

  pub fn with_scheduler_thread_name(name: String) -> ConfigOption {
    ConfigOption::SetSchedulerThreadName(name)
  }

  pub fn with_tick_thread_name(name: String) -> ConfigOption {
    ConfigOption::SetTickThreadName(name)
  }
}
