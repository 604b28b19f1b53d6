//! Bounded exponential backoff for dependency polling.

use std::time::Duration;

/// Doubling delay from `base` up to `cap`, reset on progress.
#[derive(Debug, Clone)]
pub(crate) struct Backoff {
    base: Duration,
    cap: Duration,
    next: Duration,
}

impl Backoff {
    pub(crate) const fn new(base: Duration, cap: Duration) -> Self {
        Self {
            base,
            cap,
            next: base,
        }
    }

    /// Delay to wait now; the following call returns twice as much.
    pub(crate) fn next_delay(&mut self) -> Duration {
        let delay = self.next;
        self.next = self.next.saturating_mul(2).min(self.cap);
        delay
    }

    pub(crate) fn reset(&mut self) {
        self.next = self.base;
    }
}
