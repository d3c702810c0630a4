use crate::timer::TimerHandle;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimerError {
  #[error("Invalid argument: {0}")]
  InvalidArgument(String),
  #[error("Timer service is not initialized")]
  NotInitialized,
  #[error("Timer service is already initialized")]
  AlreadyInitialized,
  #[error("Allocation error: {0}")]
  AllocationError(String),
  #[error("Timer not found: {0}")]
  NotFound(TimerHandle),
  #[error("Scheduler thread error: {0}")]
  ThreadError(String),
}

impl TimerError {
  pub fn invalid_argument(reason: impl Into<String>) -> Self {
    TimerError::InvalidArgument(reason.into())
  }

  pub fn thread_error(reason: impl ToString) -> Self {
    TimerError::ThreadError(reason.to_string())
  }

  /// Whether the error reflects the service lifecycle rather than the arguments of the call.
  pub fn is_lifecycle_error(&self) -> bool {
    matches!(
      self,
      TimerError::NotInitialized | TimerError::AlreadyInitialized | TimerError::ThreadError(_)
    )
  }
}

static_assertions::assert_impl_all!(TimerError: Send, Sync);
