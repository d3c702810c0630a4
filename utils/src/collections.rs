mod delta_queue;

pub use self::delta_queue::*;
