use std::time::Instant;

use crate::core::ports::Clock;

/// Monotonic clock measured from construction, so cache ages never go backwards.
#[derive(Debug)]
pub struct SystemClock {
    origin: Instant,
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> u128 {
        self.origin.elapsed().as_millis()
    }
}
