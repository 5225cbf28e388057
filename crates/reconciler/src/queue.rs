//! Work queue with per-key serialization and failure backoff.

use std::collections::{HashMap, HashSet, VecDeque};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use topology_api::ObjectKey;

use crate::config::duration_ms;

/// Exponential backoff for failed passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffConfig {
    /// Delay after the first failure.
    #[serde(rename = "initial_ms", with = "duration_ms")]
    pub initial: Duration,
    /// Upper bound on any delay.
    #[serde(rename = "max_ms", with = "duration_ms")]
    pub max: Duration,
    /// Growth factor per consecutive failure.
    pub factor: u32,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial: Duration::from_millis(100),
            max: Duration::from_secs(30),
            factor: 2,
        }
    }
}

impl BackoffConfig {
    /// Delay before the retry following `failures` consecutive failures.
    ///
    /// `failures` counts from 1; zero is treated as one.
    pub fn delay(&self, failures: u32) -> Duration {
        let exponent = failures.saturating_sub(1);
        let multiplier = self.factor.max(1).checked_pow(exponent).unwrap_or(u32::MAX);
        self.initial
            .checked_mul(multiplier)
            .map_or(self.max, |delay| delay.min(self.max))
    }
}

/// Pending keys for one controller.
///
/// A key is never handed out twice at once: adding a key that is in flight
/// marks it dirty, and [`WorkQueue::done`] puts it back so the change is not
/// lost. Queued keys are deduplicated.
#[derive(Debug, Default)]
pub struct WorkQueue {
    queue: VecDeque<ObjectKey>,
    queued: HashSet<ObjectKey>,
    in_flight: HashSet<ObjectKey>,
    dirty: HashSet<ObjectKey>,
    failures: HashMap<ObjectKey, u32>,
}

impl WorkQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a pass for `key`.
    pub fn add(&mut self, key: ObjectKey) {
        if self.in_flight.contains(&key) {
            self.dirty.insert(key);
        } else if self.queued.insert(key.clone()) {
            self.queue.push_back(key);
        }
    }

    /// Take the next key and mark it in flight.
    pub fn pop(&mut self) -> Option<ObjectKey> {
        let key = self.queue.pop_front()?;
        self.queued.remove(&key);
        self.in_flight.insert(key.clone());
        Some(key)
    }

    /// Mark a pass for `key` finished, requeueing it if it changed meanwhile.
    pub fn done(&mut self, key: &ObjectKey) {
        self.in_flight.remove(key);
        if self.dirty.remove(key) {
            self.add(key.clone());
        }
    }

    /// Count a failure for `key` and return the new consecutive total.
    pub fn record_failure(&mut self, key: &ObjectKey) -> u32 {
        let count = self.failures.entry(key.clone()).or_insert(0);
        *count = count.saturating_add(1);
        *count
    }

    /// Reset the failure count for `key`.
    pub fn forget(&mut self, key: &ObjectKey) {
        self.failures.remove(key);
    }

    /// Keys waiting to be handed out.
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn in_flight_len(&self) -> usize {
        self.in_flight.len()
    }

    /// Nothing queued and nothing running.
    pub fn is_idle(&self) -> bool {
        self.queue.is_empty() && self.in_flight.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(name: &str) -> ObjectKey {
        ObjectKey::named(name)
    }

    #[test]
    fn test_add_deduplicates() {
        let mut queue = WorkQueue::new();
        queue.add(key("a"));
        queue.add(key("a"));
        queue.add(key("b"));
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.pop(), Some(key("a")));
        assert_eq!(queue.pop(), Some(key("b")));
        assert_eq!(queue.pop(), None);
    }

    #[test]
    fn test_in_flight_key_is_not_handed_out_twice() {
        let mut queue = WorkQueue::new();
        queue.add(key("a"));
        assert_eq!(queue.pop(), Some(key("a")));

        queue.add(key("a"));
        assert!(queue.is_empty());
        assert_eq!(queue.pop(), None);

        queue.done(&key("a"));
        assert_eq!(queue.pop(), Some(key("a")));
    }

    #[test]
    fn test_done_without_changes_goes_idle() {
        let mut queue = WorkQueue::new();
        queue.add(key("a"));
        let popped = queue.pop();
        assert_eq!(queue.in_flight_len(), 1);
        assert!(!queue.is_idle());

        if let Some(k) = popped {
            queue.done(&k);
        }
        assert!(queue.is_idle());
    }

    #[test]
    fn test_failures_accumulate_until_forgotten() {
        let mut queue = WorkQueue::new();
        assert_eq!(queue.record_failure(&key("a")), 1);
        assert_eq!(queue.record_failure(&key("a")), 2);
        queue.forget(&key("a"));
        assert_eq!(queue.record_failure(&key("a")), 1);
    }

    #[test]
    fn test_backoff_grows_and_caps() {
        let backoff = BackoffConfig {
            initial: Duration::from_millis(100),
            max: Duration::from_secs(1),
            factor: 2,
        };
        assert_eq!(backoff.delay(0), Duration::from_millis(100));
        assert_eq!(backoff.delay(1), Duration::from_millis(100));
        assert_eq!(backoff.delay(2), Duration::from_millis(200));
        assert_eq!(backoff.delay(4), Duration::from_millis(800));
        assert_eq!(backoff.delay(5), Duration::from_secs(1));
        assert_eq!(backoff.delay(u32::MAX), Duration::from_secs(1));
    }

    #[test]
    fn test_backoff_factor_one_is_constant() {
        let backoff = BackoffConfig {
            initial: Duration::from_millis(50),
            max: Duration::from_secs(1),
            factor: 1,
        };
        assert_eq!(backoff.delay(10), Duration::from_millis(50));
    }
}
