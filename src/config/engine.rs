//! Worker counts, retry limits and timeouts.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Prefix of the environment variables read by `EngineConfig::from_env`.
pub const ENV_PREFIX: &str = "TXN_ENGINE_";

/// Engine configuration. Missing fields take their defaults when deserialized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Workers draining the main queue.
    pub main_workers: usize,
    /// Workers draining the retry queue.
    pub retry_workers: usize,
    /// Retries allowed after the first attempt.
    pub max_retry: u32,
    /// Pause before every retry attempt, in milliseconds.
    pub retry_delay_ms: u64,
    /// Time in-flight attempts get to finish on shutdown, in milliseconds.
    pub shutdown_grace_ms: u64,
    /// Worker pause after a store failure, in milliseconds.
    pub store_error_backoff_ms: u64,
    /// Stack size for worker threads, in bytes.
    pub thread_stack_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            main_workers: 5,
            retry_workers: 2,
            max_retry: 3,
            retry_delay_ms: 5000,
            shutdown_grace_ms: 2000,
            store_error_backoff_ms: 1000,
            thread_stack_size: 2 * 1024 * 1024,
        }
    }
}

impl EngineConfig {
    /// Configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the main pool size.
    #[must_use]
    pub const fn with_main_workers(mut self, count: usize) -> Self {
        self.main_workers = count;
        self
    }

    /// Set the retry pool size.
    #[must_use]
    pub const fn with_retry_workers(mut self, count: usize) -> Self {
        self.retry_workers = count;
        self
    }

    /// Set the retry limit.
    #[must_use]
    pub const fn with_max_retry(mut self, max_retry: u32) -> Self {
        self.max_retry = max_retry;
        self
    }

    /// Set the retry delay.
    #[must_use]
    pub const fn with_retry_delay_ms(mut self, millis: u64) -> Self {
        self.retry_delay_ms = millis;
        self
    }

    /// Set the shutdown grace period.
    #[must_use]
    pub const fn with_shutdown_grace_ms(mut self, millis: u64) -> Self {
        self.shutdown_grace_ms = millis;
        self
    }

    /// Set the store-failure backoff.
    #[must_use]
    pub const fn with_store_error_backoff_ms(mut self, millis: u64) -> Self {
        self.store_error_backoff_ms = millis;
        self
    }

    /// Set the worker thread stack size.
    #[must_use]
    pub const fn with_thread_stack_size(mut self, bytes: usize) -> Self {
        self.thread_stack_size = bytes;
        self
    }

    /// Retry delay as a `Duration`.
    #[must_use]
    pub const fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    /// Shutdown grace period as a `Duration`.
    #[must_use]
    pub const fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }

    /// Store-failure backoff as a `Duration`.
    #[must_use]
    pub const fn store_error_backoff(&self) -> Duration {
        Duration::from_millis(self.store_error_backoff_ms)
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        if self.main_workers == 0 {
            return Err("main_workers must be greater than 0".into());
        }
        if self.retry_workers == 0 && self.max_retry > 0 {
            return Err("retry_workers must be greater than 0 when max_retry > 0".into());
        }
        if self.thread_stack_size < 64 * 1024 {
            return Err("thread_stack_size must be at least 64 KiB".into());
        }
        Ok(())
    }

    /// Parse configuration from a JSON string and validate.
    ///
    /// # Errors
    ///
    /// Returns a parse or validation message.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Build configuration from `TXN_ENGINE_*` environment variables, loading
    /// a `.env` file first if present. Unset variables keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns a message naming the variable that failed to parse, or a
    /// validation message.
    pub fn from_env() -> Result<Self, String> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup using the
    /// `TXN_ENGINE_*` names.
    ///
    /// # Errors
    ///
    /// Same as `from_env`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        fn read<T: std::str::FromStr>(
            lookup: &dyn Fn(&str) -> Option<String>,
            name: &str,
            target: &mut T,
        ) -> Result<(), String>
        where
            T::Err: std::fmt::Display,
        {
            let key = format!("{ENV_PREFIX}{name}");
            if let Some(raw) = lookup(&key) {
                *target = raw.trim().parse().map_err(|e| format!("{key}: {e}"))?;
            }
            Ok(())
        }

        let mut cfg = Self::default();
        read(&lookup, "MAIN_WORKERS", &mut cfg.main_workers)?;
        read(&lookup, "RETRY_WORKERS", &mut cfg.retry_workers)?;
        read(&lookup, "MAX_RETRY", &mut cfg.max_retry)?;
        read(&lookup, "RETRY_DELAY_MS", &mut cfg.retry_delay_ms)?;
        read(&lookup, "SHUTDOWN_GRACE_MS", &mut cfg.shutdown_grace_ms)?;
        read(&lookup, "STORE_ERROR_BACKOFF_MS", &mut cfg.store_error_backoff_ms)?;
        read(&lookup, "THREAD_STACK_SIZE", &mut cfg.thread_stack_size)?;
        cfg.validate()?;
        Ok(cfg)
    }
}
