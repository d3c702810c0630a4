use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicU64, Ordering};

/// Opaque reference to a pending timer, returned by `create` and consumed by `delete`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct TimerHandle(u64);

impl TimerHandle {
  #[inline]
  pub const fn into_raw(self) -> u64 {
    self.0
  }

  #[inline]
  pub const fn from_raw(raw: u64) -> Self {
    Self(raw)
  }
}

impl Display for TimerHandle {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    write!(f, "timer#{}", self.0)
  }
}

/// Hands out handles that are never reused for the lifetime of a service,
/// so a handle kept past its timer's expiry can only ever be stale.
#[derive(Debug)]
pub(crate) struct TimerHandleAllocator {
  counter: AtomicU64,
}

impl TimerHandleAllocator {
  pub(crate) const fn new() -> Self {
    Self {
      counter: AtomicU64::new(1),
    }
  }

  pub(crate) fn allocate(&self) -> Option<TimerHandle> {
    let raw = self.counter.fetch_add(1, Ordering::Relaxed);
    (raw != 0).then_some(TimerHandle(raw))
  }
}

impl Default for TimerHandleAllocator {
  fn default() -> Self {
    Self::new()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::collections::HashSet;

  #[test]
  fn allocate_provides_unique_handles() {
    let allocator = TimerHandleAllocator::new();
    let mut handles = HashSet::new();

    for _ in 0..1024 {
      let handle = allocator.allocate().unwrap();
      assert_ne!(handle.into_raw(), 0);
      assert!(handles.insert(handle));
    }
  }

  #[test]
  fn handle_display() {
    assert_eq!(TimerHandle::from_raw(7).to_string(), "timer#7");
  }
}
