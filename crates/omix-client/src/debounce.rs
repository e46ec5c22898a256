//! Keyed trailing-edge debounce.
//!
//! Each key holds at most one deadline. Triggering a key again pushes its
//! deadline out, so a burst fires once, after the quiet period.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::Duration;

use tokio::time::Instant;

#[derive(Debug)]
pub struct Debouncer<K> {
    quiet: Duration,
    deadlines: HashMap<K, Instant>,
}

impl<K: Eq + Hash + Clone> Debouncer<K> {
    pub fn new(quiet: Duration) -> Self {
        Self {
            quiet,
            deadlines: HashMap::new(),
        }
    }

    pub fn trigger(&mut self, key: K, now: Instant) {
        self.deadlines.insert(key, now + self.quiet);
    }

    pub fn cancel(&mut self, key: &K) -> bool {
        self.deadlines.remove(key).is_some()
    }

    pub fn is_pending(&self, key: &K) -> bool {
        self.deadlines.contains_key(key)
    }

    /// Earliest pending deadline.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.deadlines.values().min().copied()
    }

    /// Removes and returns every key whose deadline has passed.
    pub fn take_due(&mut self, now: Instant) -> Vec<K> {
        let due: Vec<K> = self
            .deadlines
            .iter()
            .filter(|(_, at)| **at <= now)
            .map(|(k, _)| k.clone())
            .collect();
        for key in &due {
            self.deadlines.remove(key);
        }
        due
    }
}

/// Sleeps until `deadline`, or forever when there is none.
pub async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending::<()>().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_burst_collapses_to_last_deadline() {
        let start = Instant::now();
        let mut d = Debouncer::new(Duration::from_millis(300));
        d.trigger("refresh", start);
        d.trigger("refresh", start + Duration::from_millis(100));
        d.trigger("refresh", start + Duration::from_millis(200));

        assert_eq!(d.next_deadline(), Some(start + Duration::from_millis(500)));
        assert!(d.take_due(start + Duration::from_millis(499)).is_empty());
        assert_eq!(d.take_due(start + Duration::from_millis(500)), vec!["refresh"]);
        assert!(!d.is_pending(&"refresh"));
    }

    #[test]
    fn test_keys_are_independent() {
        let start = Instant::now();
        let mut d = Debouncer::new(Duration::from_millis(300));
        d.trigger(1u64, start);
        d.trigger(2u64, start + Duration::from_millis(200));
        assert_eq!(d.take_due(start + Duration::from_millis(300)), vec![1]);
        assert!(d.is_pending(&2));
        assert!(d.cancel(&2));
        assert_eq!(d.next_deadline(), None);
    }
}
