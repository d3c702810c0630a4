use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::timer::{ConfigOption, TimerError};

pub const DEFAULT_RESOLUTION: Duration = Duration::from_millis(1);
pub const DEFAULT_SCHEDULER_THREAD_NAME: &str = "delta-timer-scheduler";
pub const DEFAULT_TICK_THREAD_NAME: &str = "delta-timer-tick";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
  /// Period between two ticks. Every timer interval is expressed in multiples of it.
  pub resolution: Duration,
  /// Upper bound on pending timers; `None` means unbounded.
  pub max_timers: Option<usize>,
  pub scheduler_thread_name: String,
  pub tick_thread_name: String,
}

impl Default for Config {
  fn default() -> Self {
    Config {
      resolution: DEFAULT_RESOLUTION,
      max_timers: None,
      scheduler_thread_name: DEFAULT_SCHEDULER_THREAD_NAME.to_string(),
      tick_thread_name: DEFAULT_TICK_THREAD_NAME.to_string(),
    }
  }
}

impl Config {
  pub fn from(options: impl IntoIterator<Item = ConfigOption>) -> Config {
    let mut config = Config::default();
    for option in options {
      option.apply(&mut config);
    }
    config
  }

  pub fn with_resolution(resolution: Duration) -> Config {
    Config::from([ConfigOption::with_resolution(resolution)])
  }

  pub(crate) fn validate(&self) -> Result<(), TimerError> {
    if self.resolution.is_zero() {
      return Err(TimerError::invalid_argument("resolution must be greater than zero"));
    }
    if self.max_timers == Some(0) {
      return Err(TimerError::invalid_argument("max_timers must be greater than zero"));
    }
    Ok(())
  }

  /// Converts a duration into the number of ticks it spans, rounding up.
  pub fn ticks_for(&self, duration: Duration) -> u64 {
    let resolution = self.resolution.as_nanos().max(1);
    let ticks = duration.as_nanos().div_ceil(resolution);
    u64::try_from(ticks).unwrap_or(u64::MAX)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use rstest::rstest;

  #[test]
  fn test_config_from_options() {
    let config = Config::from([
      ConfigOption::with_resolution(Duration::from_micros(500)),
      ConfigOption::with_max_timers(16),
      ConfigOption::with_scheduler_thread_name("sched".to_string()),
    ]);

    assert_eq!(config.resolution, Duration::from_micros(500));
    assert_eq!(config.max_timers, Some(16));
    assert_eq!(config.scheduler_thread_name, "sched");
    assert_eq!(config.tick_thread_name, DEFAULT_TICK_THREAD_NAME);
  }

  #[test]
  fn test_config_validate_rejects_zero_resolution() {
    let config = Config::with_resolution(Duration::ZERO);
    assert!(matches!(config.validate(), Err(TimerError::InvalidArgument(_))));
    assert!(Config::default().validate().is_ok());
  }

  #[test]
  fn test_config_from_json_fills_defaults() {
    let config: Config = serde_json::from_str(r#"{"resolution":{"secs":0,"nanos":250000},"max_timers":8}"#).unwrap();

    assert_eq!(config.resolution, Duration::from_micros(250));
    assert_eq!(config.max_timers, Some(8));
    assert_eq!(config.scheduler_thread_name, DEFAULT_SCHEDULER_THREAD_NAME);
  }

  #[rstest]
  #[case(Duration::from_millis(100), 100)]
  #[case(Duration::from_micros(1500), 2)]
  #[case(Duration::ZERO, 0)]
  fn test_ticks_for(#[case] duration: Duration, #[case] expected: u64) {
    let config = Config::default();
    assert_eq!(config.ticks_for(duration), expected);
  }
}
