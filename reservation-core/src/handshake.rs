//! Two-step payment handshake between a payer and a reservation supervisor
//!
//! ```text
//!   payer                                supervisor
//!     │ start ─────────────────────────────▶ │  (stops evaluating expiry)
//!     │ ◀──────────────────────────── accept │
//!     │ charge()                             │
//!     │ outcome ───────────────────────────▶ │
//!     │ ◀─────────────────────────── settled │  (status after the outcome)
//! ```
//!
//! Only one attempt per reservation may hold the handshake. A second
//! `start` while one is outstanding is rejected with `PaymentInProgress`.
//! Dropping a `PaymentAttempt` without calling `finish` counts as a
//! failed outcome.

use crate::types::{PaymentOutcome, ReservationStatus};
use crate::{Error, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

/// Start message delivered to the supervisor
pub(crate) struct PaymentStart {
    accepted: oneshot::Sender<()>,
    outcome: oneshot::Receiver<OutcomeSignal>,
}

/// Outcome message delivered to the supervisor
#[derive(Debug)]
struct OutcomeSignal {
    outcome: PaymentOutcome,
    settled: oneshot::Sender<ReservationStatus>,
}

/// Create a handshake pair for one reservation
pub fn channel() -> (HandshakeSender, HandshakeReceiver) {
    // One slot: exclusivity is enforced before sending.
    let (tx, rx) = mpsc::channel(1);
    (
        HandshakeSender {
            starts: tx,
            in_flight: Arc::new(AtomicBool::new(false)),
        },
        HandshakeReceiver { starts: rx },
    )
}

/// Payer side, stored in the registry entry
#[derive(Clone, Debug)]
pub struct HandshakeSender {
    starts: mpsc::Sender<PaymentStart>,
    in_flight: Arc<AtomicBool>,
}

impl HandshakeSender {
    /// Begin a payment attempt
    ///
    /// Resolves once the supervisor has acknowledged the start, so the
    /// reservation cannot expire while the charge is being made.
    pub async fn start(&self) -> Result<PaymentAttempt> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(Error::PaymentInProgress(
                "Another payment attempt is outstanding".to_string(),
            ));
        }
        let guard = InFlightGuard {
            flag: Arc::clone(&self.in_flight),
        };

        let (accepted_tx, accepted_rx) = oneshot::channel();
        let (outcome_tx, outcome_rx) = oneshot::channel();

        self.starts
            .send(PaymentStart {
                accepted: accepted_tx,
                outcome: outcome_rx,
            })
            .await
            .map_err(|_| Error::NotFoundOrExpired("Reservation is no longer pending".to_string()))?;

        accepted_rx
            .await
            .map_err(|_| Error::NotFoundOrExpired("Reservation is no longer pending".to_string()))?;

        Ok(PaymentAttempt {
            outcome: outcome_tx,
            _guard: guard,
        })
    }

    /// Whether an attempt currently holds the handshake
    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }
}

/// Releases the in-flight flag when the attempt ends, however it ends
#[derive(Debug)]
struct InFlightGuard {
    flag: Arc<AtomicBool>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// An acknowledged payment attempt awaiting its outcome
#[derive(Debug)]
pub struct PaymentAttempt {
    outcome: oneshot::Sender<OutcomeSignal>,
    _guard: InFlightGuard,
}

impl PaymentAttempt {
    /// Report the charge outcome and wait for the supervisor to settle
    ///
    /// Returns the reservation status after the outcome was applied:
    /// `Ordered` on success, `Pending` after a failure.
    pub async fn finish(self, outcome: PaymentOutcome) -> Result<ReservationStatus> {
        let (settled_tx, settled_rx) = oneshot::channel();
        self.outcome
            .send(OutcomeSignal {
                outcome,
                settled: settled_tx,
            })
            .map_err(|_| Error::Concurrency("Supervisor dropped the payment attempt".to_string()))?;

        settled_rx
            .await
            .map_err(|_| Error::Concurrency("Supervisor did not settle the payment".to_string()))
    }
}

/// Supervisor side
#[derive(Debug)]
pub struct HandshakeReceiver {
    starts: mpsc::Receiver<PaymentStart>,
}

impl HandshakeReceiver {
    /// Wait for the next acknowledged start
    ///
    /// Cancel safe: the only await point is the mailbox receive.
    /// Returns `None` once every sender is gone.
    pub(crate) async fn next_start(&mut self) -> Option<PendingPayment> {
        loop {
            let start = self.starts.recv().await?;
            // Payer gave up before the acknowledgement; nothing to wait for.
            if start.accepted.send(()).is_ok() {
                return Some(PendingPayment {
                    outcome: start.outcome,
                });
            }
        }
    }
}

/// Started payment, as seen by the supervisor
pub(crate) struct PendingPayment {
    outcome: oneshot::Receiver<OutcomeSignal>,
}

impl PendingPayment {
    /// Wait for the payer's outcome; an abandoned attempt is a failure
    pub(crate) async fn wait(self) -> Settlement {
        match self.outcome.await {
            Ok(signal) => Settlement {
                outcome: signal.outcome,
                reply: Some(signal.settled),
            },
            Err(_) => Settlement {
                outcome: PaymentOutcome::Failed,
                reply: None,
            },
        }
    }
}

/// Outcome received by the supervisor plus the channel to answer on
pub(crate) struct Settlement {
    pub(crate) outcome: PaymentOutcome,
    reply: Option<oneshot::Sender<ReservationStatus>>,
}

impl Settlement {
    /// Tell the payer which status the outcome produced
    pub(crate) fn reply(self, status: ReservationStatus) {
        if let Some(reply) = self.reply {
            let _ = reply.send(status);
        }
    }
}
