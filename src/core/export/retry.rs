//! Retry policy layered over an [`ObjectReader`]
//!
//! The fetch coordinator never retries. When an export is configured with
//! `max_retries > 0` the orchestrator wraps its reader in a
//! [`RetryingReader`], which retries transient failures (`Timeout`, `Io`)
//! with exponential backoff. `NotFound` is returned immediately.

use crate::adapters::traits::ObjectReader;
use crate::domain::{ObjectReadError, StorageKey};
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;

/// Reader decorator that retries transient failures
#[derive(Clone)]
pub struct RetryingReader {
    inner: Arc<dyn ObjectReader>,
    max_retries: u32,
    initial_backoff: Duration,
    attempt_timeout: Duration,
}

impl RetryingReader {
    /// Wrap `inner`; each attempt is bounded by `attempt_timeout`
    pub fn new(
        inner: Arc<dyn ObjectReader>,
        max_retries: u32,
        initial_backoff: Duration,
        attempt_timeout: Duration,
    ) -> Self {
        Self {
            inner,
            max_retries,
            initial_backoff,
            attempt_timeout,
        }
    }

    /// Backoff before retry number `retry` (1-based), doubling each time
    pub fn backoff_for(&self, retry: u32) -> Duration {
        backoff_for(self.initial_backoff, retry)
    }

    /// Worst-case wall time for one read including every retry
    pub fn worst_case(&self) -> Duration {
        worst_case(self.attempt_timeout, self.max_retries, self.initial_backoff)
    }

    async fn attempt(&self, key: &StorageKey) -> Result<Bytes, ObjectReadError> {
        match tokio::time::timeout(self.attempt_timeout, self.inner.read(key)).await {
            Ok(result) => result,
            Err(_) => Err(ObjectReadError::Timeout(self.attempt_timeout)),
        }
    }
}

fn backoff_for(initial: Duration, retry: u32) -> Duration {
    let factor = 2u32.saturating_pow(retry.saturating_sub(1));
    initial.saturating_mul(factor)
}

/// Worst-case wall time of a read retried `max_retries` times
pub fn worst_case(attempt_timeout: Duration, max_retries: u32, initial_backoff: Duration) -> Duration {
    let attempts = max_retries.saturating_add(1);
    let backoff: Duration = (1..=max_retries)
        .map(|r| backoff_for(initial_backoff, r))
        .sum();
    attempt_timeout.saturating_mul(attempts) + backoff
}

#[async_trait]
impl ObjectReader for RetryingReader {
    async fn read(&self, key: &StorageKey) -> Result<Bytes, ObjectReadError> {
        let mut retry = 0;

        loop {
            match self.attempt(key).await {
                Ok(data) => return Ok(data),
                Err(e) if e.is_transient() && retry < self.max_retries => {
                    retry += 1;
                    let delay = self.backoff_for(retry);
                    tracing::debug!(
                        storage_key = %key,
                        attempt = retry,
                        max_retries = self.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Retrying object read after error"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
