//! Per-reservation state machine
//!
//! ```text
//!            tick, elapsed > expiry
//!   PENDING ─────────────────────────▶ EXPIRED
//!      │ ▲
//!      │ │ outcome = failed
//!      ▼ │
//!   (payment window) ── outcome = succeeded ──▶ ORDERED
//! ```
//!
//! While a payment window is open the ticker is not polled, so a
//! reservation never expires between an accepted start and its outcome.
//! Missed ticks are delayed, and the first tick after the window closes
//! re-evaluates expiry.

use crate::handshake::HandshakeReceiver;
use crate::metrics::ReservationMetrics;
use crate::ports::ReservationStore;
use crate::registry::RegistryHandle;
use crate::retry::RetryPolicy;
use crate::types::{PaymentOutcome, ReservationId, ReservationStatus};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Duration, Instant, MissedTickBehavior};

/// Timing for one supervisor
#[derive(Debug, Clone, Copy)]
pub struct SupervisorSettings {
    pub expiry: Duration,
    pub tick_interval: Duration,
}

impl Default for SupervisorSettings {
    fn default() -> Self {
        Self {
            expiry: Duration::from_secs(30),
            tick_interval: Duration::from_secs(1),
        }
    }
}

/// Shared collaborators of every supervisor
#[derive(Clone)]
pub struct SupervisorContext {
    pub registry: RegistryHandle,
    pub store: Arc<dyn ReservationStore>,
    pub retry: RetryPolicy,
    pub metrics: ReservationMetrics,
    pub settings: SupervisorSettings,
}

/// Owns one reservation's transition out of PENDING
pub struct ReservationSupervisor {
    id: ReservationId,
    placed: Instant,
    handshake: HandshakeReceiver,
    ctx: SupervisorContext,
}

impl ReservationSupervisor {
    /// `placed` is when the reservation was accepted; expiry counts from it
    pub fn new(
        id: ReservationId,
        placed: Instant,
        handshake: HandshakeReceiver,
        ctx: SupervisorContext,
    ) -> Self {
        Self {
            id,
            placed,
            handshake,
            ctx,
        }
    }

    /// Spawn onto the runtime
    pub fn spawn(self) -> JoinHandle<ReservationStatus> {
        self.ctx.metrics.active.inc();
        tokio::spawn(self.run())
    }

    /// Drive the reservation to a terminal status
    pub async fn run(mut self) -> ReservationStatus {
        let tick_interval = self.ctx.settings.tick_interval;
        let mut ticker = interval_at(self.placed + tick_interval, tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::debug!(reservation_id = %self.id, "Supervisor started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if self.placed.elapsed() > self.ctx.settings.expiry {
                        tracing::info!(reservation_id = %self.id, "Reservation expired");
                        self.finalize(ReservationStatus::Expired).await;
                        return ReservationStatus::Expired;
                    }
                }

                Some(pending) = self.handshake.next_start() => {
                    self.ctx.metrics.payment_attempts.inc();
                    tracing::debug!(reservation_id = %self.id, "Payment window opened");

                    let settlement = pending.wait().await;
                    match settlement.outcome {
                        PaymentOutcome::Succeeded => {
                            tracing::info!(reservation_id = %self.id, "Reservation ordered");
                            self.finalize(ReservationStatus::Ordered).await;
                            settlement.reply(ReservationStatus::Ordered);
                            return ReservationStatus::Ordered;
                        }
                        PaymentOutcome::Failed => {
                            self.ctx.metrics.payment_failures.inc();
                            tracing::info!(reservation_id = %self.id, "Payment failed, reservation still pending");
                            settlement.reply(ReservationStatus::Pending);
                        }
                    }
                }
            }
        }
    }

    /// Leave the registry, then record the terminal status
    ///
    /// A failed write never keeps the entry in the registry.
    async fn finalize(&self, status: ReservationStatus) {
        match self.ctx.registry.remove(self.id).await {
            Ok(true) => {}
            Ok(false) => {
                tracing::warn!(reservation_id = %self.id, "Registry entry already gone");
            }
            Err(e) => {
                tracing::error!(reservation_id = %self.id, error = %e, "Failed to remove registry entry");
            }
        }

        self.ctx.metrics.active.dec();
        match status {
            ReservationStatus::Ordered => self.ctx.metrics.ordered.inc(),
            ReservationStatus::Expired => self.ctx.metrics.expired.inc(),
            ReservationStatus::Pending => {}
        }

        let written = self
            .ctx
            .retry
            .record_status(self.ctx.store.as_ref(), self.id, status)
            .await;

        match written {
            Ok(true) => {
                tracing::debug!(reservation_id = %self.id, status = %status, "Terminal status recorded");
            }
            Ok(false) => {
                tracing::warn!(reservation_id = %self.id, status = %status, "No stored record to update");
            }
            Err(e) => {
                self.ctx.metrics.persistence_failures.inc();
                tracing::error!(
                    reservation_id = %self.id,
                    status = %status,
                    error = %e,
                    "Failed to record terminal status"
                );
            }
        }
    }
}
