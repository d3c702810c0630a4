//! Collections and concurrency helpers shared by the delta timer crates.

pub mod collections;
pub mod concurrent;

pub use collections::{DeltaEntry, DeltaQueue};
pub use concurrent::CountDownLatch;
