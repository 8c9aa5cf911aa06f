//! Capped exponential backoff for polling a container's TCP port.

use std::time::Duration;

const INITIAL: Duration = Duration::from_millis(5);
const CAP: Duration = Duration::from_millis(100);

/// Stateful backoff schedule: 5ms, 10ms, 20ms, 40ms, 80ms, 100ms, 100ms, ...
///
/// A fresh `Waiter` is created per dial loop — it is not meant to be
/// reused across unrelated wait loops.
pub struct Waiter {
    next: Duration,
}

impl Waiter {
    pub fn new() -> Self {
        Self { next: INITIAL }
    }

    /// Sleep for the current interval, then double it (saturating at
    /// [`CAP`]) for the next call.
    pub async fn wait(&mut self) {
        tokio::time::sleep(self.next).await;
        self.next = (self.next * 2).min(CAP);
    }
}

impl Default for Waiter {
    fn default() -> Self {
        Self::new()
    }
}
