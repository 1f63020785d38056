//! Retry bookkeeping for failed sync events.
//!
//! The scheduler keeps at most one [`RetryEntry`] per event id. The first
//! failure creates the entry with `attempts = 1`; each further failure bumps
//! `attempts` and pushes `next_attempt_at` out by the policy delay.
//!
//! The backoff is linear and capped: `min(base_delay * attempts, max_delay)`,
//! which with the defaults is 60 s per attempt up to one hour. Nothing here
//! executes retries; hosts read the queue and call
//! [`RetryScheduler::acknowledge_retry`] once an event goes through.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::clock::Clock;
use crate::domain::{MedsyncError, Result};
use crate::metrics::METRICS;
use crate::obs::{emit_retry_acknowledged, emit_retry_scheduled};

/// Linear, capped backoff.
///
/// `base_delay` is never zero, so every scheduled attempt lies strictly after
/// the failure that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    base_delay: Duration,
    max_delay: Duration,
}

impl RetryPolicy {
    pub fn new(base_delay: Duration, max_delay: Duration) -> Result<Self> {
        if base_delay.is_zero() {
            return Err(MedsyncError::Config(
                "retry base delay must be greater than zero".to_string(),
            ));
        }
        if max_delay < base_delay {
            return Err(MedsyncError::Config(
                "retry max delay must not be below the base delay".to_string(),
            ));
        }
        Ok(Self {
            base_delay,
            max_delay,
        })
    }

    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }

    /// Delay to wait after the failure that brought the entry to `attempts`.
    pub fn delay_for_attempt(&self, attempts: u32) -> Duration {
        self.base_delay
            .saturating_mul(attempts.max(1))
            .min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(60),
            max_delay: Duration::from_secs(3600),
        }
    }
}

/// Backoff state for one failed event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryEntry {
    pub event_id: String,
    /// Number of failures recorded, always `>= 1`.
    pub attempts: u32,
    pub next_attempt_at: DateTime<Utc>,
}

/// Queue of pending retries, keyed by event id, in first-failure order.
pub struct RetryScheduler {
    policy: RetryPolicy,
    clock: Arc<dyn Clock>,
    entries: Vec<RetryEntry>,
}

impl std::fmt::Debug for RetryScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryScheduler")
            .field("policy", &self.policy)
            .field("entries", &self.entries)
            .finish()
    }
}

impl RetryScheduler {
    pub fn new(policy: RetryPolicy, clock: Arc<dyn Clock>) -> Self {
        Self {
            policy,
            clock,
            entries: Vec::new(),
        }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Record a failure of `event_id` and return the updated entry.
    pub fn schedule_retry(&mut self, event_id: &str) -> RetryEntry {
        let now = self.clock.now();
        let entry = match self.entries.iter_mut().find(|e| e.event_id == event_id) {
            Some(existing) => {
                existing.attempts = existing.attempts.saturating_add(1);
                existing.next_attempt_at =
                    deadline(now, self.policy.delay_for_attempt(existing.attempts));
                existing.clone()
            }
            None => {
                let created = RetryEntry {
                    event_id: event_id.to_string(),
                    attempts: 1,
                    next_attempt_at: deadline(now, self.policy.delay_for_attempt(1)),
                };
                self.entries.push(created.clone());
                created
            }
        };

        METRICS.inc_retries_scheduled();
        emit_retry_scheduled(
            &entry.event_id,
            entry.attempts,
            (entry.next_attempt_at - now).num_seconds(),
        );
        entry
    }

    /// Drop the entry for `event_id` after a successful retry.
    pub fn acknowledge_retry(&mut self, event_id: &str) -> Option<RetryEntry> {
        let idx = self.entries.iter().position(|e| e.event_id == event_id)?;
        let entry = self.entries.remove(idx);
        emit_retry_acknowledged(&entry.event_id, entry.attempts);
        Some(entry)
    }

    pub fn entries(&self) -> &[RetryEntry] {
        &self.entries
    }

    pub fn get(&self, event_id: &str) -> Option<&RetryEntry> {
        self.entries.iter().find(|e| e.event_id == event_id)
    }

    /// Entries whose `next_attempt_at` has passed.
    pub fn due(&self) -> Vec<RetryEntry> {
        let now = self.clock.now();
        self.entries
            .iter()
            .filter(|e| e.next_attempt_at <= now)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn deadline(now: DateTime<Utc>, delay: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(delay)
        .ok()
        .and_then(|d| now.checked_add_signed(d))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
