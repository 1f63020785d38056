//! Runtime configuration.
//!
//! [`MedsyncConfig::from_env`] reads `MEDSYNC_*` variables; every variable is
//! optional and falls back to the defaults below.

use std::time::Duration;

use tracing::warn;

use crate::domain::{MedsyncError, Result};
use crate::retry::RetryPolicy;

/// Signing secret used when `MEDSYNC_TOKEN_SECRET` is unset. Development only.
pub const DEV_TOKEN_SECRET: &str = "dev-insecure-secret-change";

#[derive(Clone)]
pub struct MedsyncConfig {
    /// HMAC key for session tokens.
    pub token_secret: Vec<u8>,
    pub token_ttl: Duration,
    pub retry: RetryPolicy,
    /// Maximum number of sync events kept, newest first.
    pub event_capacity: usize,
    /// Maximum number of integration jobs kept, newest first.
    pub job_capacity: usize,
    /// Simulated round trip of a manual EHR pull.
    pub manual_sync_latency: Duration,
    /// Allow password-less role sessions.
    pub allow_dev_sessions: bool,
    pub pbkdf2_rounds: u32,
}

impl std::fmt::Debug for MedsyncConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MedsyncConfig")
            .field("token_secret", &"<redacted>")
            .field("token_ttl", &self.token_ttl)
            .field("retry", &self.retry)
            .field("event_capacity", &self.event_capacity)
            .field("job_capacity", &self.job_capacity)
            .field("manual_sync_latency", &self.manual_sync_latency)
            .field("allow_dev_sessions", &self.allow_dev_sessions)
            .field("pbkdf2_rounds", &self.pbkdf2_rounds)
            .finish()
    }
}

impl Default for MedsyncConfig {
    fn default() -> Self {
        Self {
            token_secret: DEV_TOKEN_SECRET.as_bytes().to_vec(),
            token_ttl: Duration::from_secs(60 * 60),
            retry: RetryPolicy::default(),
            event_capacity: 200,
            job_capacity: 50,
            manual_sync_latency: Duration::from_millis(400),
            allow_dev_sessions: false,
            pbkdf2_rounds: 100_000,
        }
    }
}

impl MedsyncConfig {
    pub fn with_token_secret(mut self, secret: impl Into<Vec<u8>>) -> Self {
        self.token_secret = secret.into();
        self
    }

    pub fn with_token_ttl(mut self, ttl: Duration) -> Self {
        self.token_ttl = ttl;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    pub fn with_job_capacity(mut self, capacity: usize) -> Self {
        self.job_capacity = capacity;
        self
    }

    pub fn with_manual_sync_latency(mut self, latency: Duration) -> Self {
        self.manual_sync_latency = latency;
        self
    }

    pub fn with_dev_sessions(mut self, allow: bool) -> Self {
        self.allow_dev_sessions = allow;
        self
    }

    pub fn with_pbkdf2_rounds(mut self, rounds: u32) -> Self {
        self.pbkdf2_rounds = rounds;
        self
    }

    /// Create from environment variables
    ///
    /// Reads (all optional):
    /// - MEDSYNC_TOKEN_SECRET (default: development secret, logged as a warning)
    /// - MEDSYNC_TOKEN_TTL_SECS (default: 3600)
    /// - MEDSYNC_RETRY_BASE_SECS (default: 60)
    /// - MEDSYNC_RETRY_MAX_SECS (default: 3600)
    /// - MEDSYNC_EVENT_CAPACITY (default: 200)
    /// - MEDSYNC_JOB_CAPACITY (default: 50)
    /// - MEDSYNC_MANUAL_SYNC_LATENCY_MS (default: 400)
    /// - MEDSYNC_ALLOW_DEV_SESSIONS (default: "false")
    /// - MEDSYNC_PBKDF2_ROUNDS (default: 100000)
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let token_secret = match lookup("MEDSYNC_TOKEN_SECRET") {
            Some(secret) if !secret.is_empty() => secret.into_bytes(),
            _ => {
                warn!(
                    event = "config.dev_secret",
                    "MEDSYNC_TOKEN_SECRET not set, using development secret"
                );
                defaults.token_secret
            }
        };

        let base_secs: u64 = parse_or(
            &lookup,
            "MEDSYNC_RETRY_BASE_SECS",
            defaults.retry.base_delay().as_secs(),
        )?;
        let max_secs: u64 = parse_or(
            &lookup,
            "MEDSYNC_RETRY_MAX_SECS",
            defaults.retry.max_delay().as_secs(),
        )?;
        if base_secs == 0 {
            return Err(MedsyncError::Config(
                "MEDSYNC_RETRY_BASE_SECS must be at least 1".to_string(),
            ));
        }
        if max_secs < base_secs {
            return Err(MedsyncError::Config(
                "MEDSYNC_RETRY_MAX_SECS must not be below MEDSYNC_RETRY_BASE_SECS".to_string(),
            ));
        }
        let retry = RetryPolicy::new(Duration::from_secs(base_secs), Duration::from_secs(max_secs))?;

        let allow_dev_sessions = lookup("MEDSYNC_ALLOW_DEV_SESSIONS")
            .map(|v| matches!(v.trim().to_lowercase().as_str(), "true" | "1" | "yes"))
            .unwrap_or(defaults.allow_dev_sessions);

        Ok(Self {
            token_secret,
            token_ttl: Duration::from_secs(parse_or(
                &lookup,
                "MEDSYNC_TOKEN_TTL_SECS",
                defaults.token_ttl.as_secs(),
            )?),
            retry,
            event_capacity: parse_or(&lookup, "MEDSYNC_EVENT_CAPACITY", defaults.event_capacity)?,
            job_capacity: parse_or(&lookup, "MEDSYNC_JOB_CAPACITY", defaults.job_capacity)?,
            manual_sync_latency: Duration::from_millis(parse_or(
                &lookup,
                "MEDSYNC_MANUAL_SYNC_LATENCY_MS",
                defaults.manual_sync_latency.as_millis() as u64,
            )?),
            allow_dev_sessions,
            pbkdf2_rounds: parse_or(&lookup, "MEDSYNC_PBKDF2_ROUNDS", defaults.pbkdf2_rounds)?,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| MedsyncError::Config(format!("{} = {:?}: {}", key, raw, e))),
    }
}
