//! Bounded retries for terminal status writes
//!
//! Delays come from `backoff`'s exponential schedule; the attempt count is
//! capped here so a paused or skewed clock cannot stretch the retry window.

use crate::ports::ReservationStore;
use crate::types::{ReservationId, ReservationStatus, ReservationUpdate};
use crate::Result;
use backoff::backoff::Backoff;
use backoff::{ExponentialBackoff, ExponentialBackoffBuilder};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Retry configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 200,
            max_delay_ms: 5000,
            backoff_multiplier: 2.0,
            jitter_factor: 0.1,
        }
    }
}

/// Exponential schedule that yields at most `remaining` delays
struct WriteSchedule {
    delays: ExponentialBackoff,
    remaining: u32,
}

impl Backoff for WriteSchedule {
    fn next_backoff(&mut self) -> Option<Duration> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        self.delays.next_backoff()
    }

    fn reset(&mut self) {
        self.delays.reset();
    }
}

/// Persists terminal statuses, retrying errors that report `is_retryable()`
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    pub fn with_defaults() -> Self {
        Self::new(RetryConfig::default())
    }

    /// Single attempt, no retries
    pub fn none() -> Self {
        Self::new(RetryConfig {
            max_retries: 0,
            ..RetryConfig::default()
        })
    }

    fn schedule(&self) -> WriteSchedule {
        let delays = ExponentialBackoffBuilder::new()
            .with_initial_interval(Duration::from_millis(self.config.initial_delay_ms))
            .with_max_interval(Duration::from_millis(self.config.max_delay_ms))
            .with_multiplier(self.config.backoff_multiplier)
            .with_randomization_factor(self.config.jitter_factor)
            .with_max_elapsed_time(None)
            .build();

        WriteSchedule {
            delays,
            remaining: self.config.max_retries,
        }
    }

    /// Write `status` for `id`
    ///
    /// `Ok(false)` means the store has no record for `id`.
    pub async fn record_status(
        &self,
        store: &dyn ReservationStore,
        id: ReservationId,
        status: ReservationStatus,
    ) -> Result<bool> {
        let update = ReservationUpdate::status(status);

        backoff::future::retry_notify(
            self.schedule(),
            || async move {
                store.update(id, update).await.map_err(|e| {
                    if e.is_retryable() {
                        backoff::Error::transient(e)
                    } else {
                        backoff::Error::permanent(e)
                    }
                })
            },
            |e: crate::Error, delay: Duration| {
                tracing::warn!(
                    reservation_id = %id,
                    status = %status,
                    error = %e,
                    retry_in_ms = delay.as_millis() as u64,
                    "Status write failed, retrying"
                );
            },
        )
        .await
    }
}
