//! Reconnect delays following the Fibonacci sequence.

use std::time::Duration;

/// Yields `unit`, `unit`, `2*unit`, `3*unit`, `5*unit`, ... capped at `max`.
#[derive(Debug, Clone)]
pub struct FibonacciBackoff {
    unit: Duration,
    max: Duration,
    current: u32,
    next: u32,
}

impl FibonacciBackoff {
    pub fn new(unit: Duration, max: Duration) -> Self {
        Self {
            unit,
            max: max.max(unit),
            current: 1,
            next: 1,
        }
    }

    pub fn next_delay(&mut self) -> Duration {
        let delay = self.unit.saturating_mul(self.current).min(self.max);
        if delay < self.max {
            let following = self.current.saturating_add(self.next);
            self.current = self.next;
            self.next = following;
        }
        delay
    }

    /// Called after a connection was established.
    pub fn reset(&mut self) {
        self.current = 1;
        self.next = 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(backoff: &mut FibonacciBackoff, n: usize) -> Vec<u64> {
        (0..n).map(|_| backoff.next_delay().as_secs()).collect()
    }

    #[test]
    fn test_sequence_and_cap() {
        let mut b = FibonacciBackoff::new(Duration::from_secs(1), Duration::from_secs(10));
        assert_eq!(secs(&mut b, 9), vec![1, 1, 2, 3, 5, 8, 10, 10, 10]);
    }

    #[test]
    fn test_reset_restarts_sequence() {
        let mut b = FibonacciBackoff::new(Duration::from_secs(1), Duration::from_secs(30));
        secs(&mut b, 5);
        b.reset();
        assert_eq!(secs(&mut b, 3), vec![1, 1, 2]);
    }
}
