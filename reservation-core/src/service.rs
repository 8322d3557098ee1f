//! Order service facade
//!
//! Ties together the signer, the registry actor, per-reservation
//! supervisors, and the store/payment/quoting collaborators.
//!
//! # Example
//!
//! ```no_run
//! use reservation_core::{Config, OrderService, PaymentGateway};
//! use std::sync::Arc;
//!
//! async fn run(payments: Arc<dyn PaymentGateway>) -> reservation_core::Result<()> {
//!     let service = OrderService::open(Config::default(), payments)?;
//!     // let offers = service.quote(query).await?;
//!     // let reservation = service.place_order(offers[0].clone(), subject).await?;
//!     service.shutdown().await
//! }
//! ```

use crate::{
    config::StorageBackend,
    handshake,
    metrics::ReservationMetrics,
    ports::{PaymentGateway, ReservationStore, SolutionProvider},
    quoting::FixedSolutionProvider,
    registry::{spawn_registry, RegistryHandle},
    retry::RetryPolicy,
    signer::{KeyPair, SolutionSigner},
    storage::{InMemoryReservationStore, RocksDbReservationStore},
    supervisor::{ReservationSupervisor, SupervisorContext, SupervisorSettings},
    types::{
        ChargeRequest, MachineId, PaymentInstrument, PaymentOutcome, PaymentReceipt, Query,
        Reservation, ReservationDraft, ReservationId, SignedSolution, SubjectId,
    },
    Config, Error, Result,
};
use chrono::Utc;
use std::sync::Arc;
use tokio::time::{Duration, Instant};

/// Reservation lifecycle entry point
pub struct OrderService {
    signer: Arc<SolutionSigner>,
    registry: RegistryHandle,
    supervisors: SupervisorContext,
    payments: Arc<dyn PaymentGateway>,
    solutions: Arc<dyn SolutionProvider>,
    config: Config,
}

impl OrderService {
    /// Build a service over an explicit store
    ///
    /// Spawns the registry actor, so it must be called inside a Tokio runtime.
    pub fn new(
        config: Config,
        store: Arc<dyn ReservationStore>,
        payments: Arc<dyn PaymentGateway>,
    ) -> Result<Self> {
        config.validate()?;

        let keypair = match &config.signing.seed_hex {
            Some(seed) => KeyPair::from_hex_seed(seed)?,
            None => {
                tracing::warn!("No signing seed configured, generating an ephemeral key");
                KeyPair::generate()
            }
        };

        let metrics = ReservationMetrics::new()
            .map_err(|e| Error::Config(format!("Failed to create metrics: {}", e)))?;

        let registry = spawn_registry(config.reservation.registry_mailbox_capacity);

        let supervisors = SupervisorContext {
            registry: registry.clone(),
            store,
            retry: RetryPolicy::new(config.persistence.retry.clone()),
            metrics,
            settings: SupervisorSettings {
                expiry: Duration::from_secs(config.reservation.expiry_seconds),
                tick_interval: Duration::from_millis(config.reservation.tick_interval_ms),
            },
        };

        Ok(Self {
            signer: Arc::new(SolutionSigner::new(keypair)),
            registry,
            supervisors,
            payments,
            solutions: Arc::new(FixedSolutionProvider::new()),
            config,
        })
    }

    /// Build a service with the store selected by `config.persistence.backend`
    pub fn open(config: Config, payments: Arc<dyn PaymentGateway>) -> Result<Self> {
        let store: Arc<dyn ReservationStore> = match config.persistence.backend {
            StorageBackend::Memory => Arc::new(InMemoryReservationStore::new()),
            StorageBackend::RocksDb => Arc::new(RocksDbReservationStore::open(&config)?),
        };

        tracing::info!(
            service = %config.service_name,
            version = %config.service_version,
            backend = ?config.persistence.backend,
            "Order service opened"
        );

        Self::new(config, store, payments)
    }

    /// Replace the signing key pair
    pub fn with_keypair(mut self, keypair: KeyPair) -> Self {
        self.signer = Arc::new(SolutionSigner::new(keypair));
        self
    }

    /// Replace the quoting collaborator
    pub fn with_solution_provider(mut self, provider: Arc<dyn SolutionProvider>) -> Self {
        self.solutions = provider;
        self
    }

    /// Produce signed solutions for a query
    pub async fn quote(&self, mut query: Query) -> Result<Vec<SignedSolution>> {
        validate_query(&query)?;
        query.time = Utc::now();

        let solutions = self.solutions.produce_solutions(&query).await?;

        let signed: Vec<SignedSolution> = solutions
            .into_iter()
            .map(|solution| {
                let signature = self.signer.sign(&solution);
                SignedSolution {
                    solution,
                    signature,
                }
            })
            .collect();

        tracing::debug!(offers = signed.len(), "Quoted solutions");
        Ok(signed)
    }

    /// Reserve capacity for a signed solution
    ///
    /// On success the reservation is pending, durably recorded, and owned
    /// by a running supervisor.
    pub async fn place_order(
        &self,
        signed: SignedSolution,
        subject: SubjectId,
    ) -> Result<Reservation> {
        let SignedSolution {
            solution,
            signature,
        } = signed;

        solution.validate()?;

        if !self.signer.verify(&solution, &signature) {
            tracing::warn!(subject = %subject, "Rejected order with invalid solution signature");
            return Err(Error::Integrity(
                "Solution signature does not match".to_string(),
            ));
        }

        self.check_quote_age(&solution)?;

        let placed = Instant::now();
        let draft = ReservationDraft {
            user_id: subject,
            solution_digest: self.signer.digest(&solution),
            solution,
            placed_at: Utc::now(),
            machine_id: MachineId::unassigned(),
        };

        // Detached: once the registry entry exists its supervisor must be
        // spawned (or the entry rolled back) even if this caller goes away.
        tokio::spawn(admit(self.supervisors.clone(), draft, placed))
            .await
            .map_err(|e| Error::Concurrency(format!("Order admission task failed: {}", e)))?
    }

    /// Pay for a pending reservation
    pub async fn submit_payment(
        &self,
        id: ReservationId,
        subject: SubjectId,
        instrument: PaymentInstrument,
    ) -> Result<PaymentReceipt> {
        if instrument.source_token.trim().is_empty() {
            return Err(Error::Validation("Payment source is required".to_string()));
        }

        let entry = self
            .registry
            .get(id)
            .await?
            .ok_or_else(|| Error::NotFoundOrExpired(format!("Reservation {}", id)))?;

        if !entry.reservation.is_owned_by(&subject) {
            tracing::warn!(reservation_id = %id, subject = %subject, "Payment by non-owner rejected");
            return Err(Error::Ownership(format!(
                "Reservation {} belongs to another user",
                id
            )));
        }

        let request = ChargeRequest {
            amount_cents: entry.reservation.solution.amount_cents()?,
            currency: self.config.payment.currency.clone(),
            source_token: instrument.source_token,
            description: self.config.payment.description.clone(),
            reservation_id: id,
        };

        let attempt = entry.handshake.start().await?;
        tracing::debug!(reservation_id = %id, amount_cents = request.amount_cents, "Charging");

        match self.payments.charge(&request).await {
            Ok(charge) => {
                let status = attempt.finish(PaymentOutcome::Succeeded).await?;
                tracing::info!(reservation_id = %id, charge_id = %charge.charge_id, "Payment captured");
                Ok(PaymentReceipt {
                    reservation_id: id,
                    status,
                    charge,
                })
            }
            Err(e) => {
                if let Err(settle_err) = attempt.finish(PaymentOutcome::Failed).await {
                    tracing::warn!(reservation_id = %id, error = %settle_err, "Failed outcome not settled");
                }
                tracing::info!(reservation_id = %id, error = %e, "Payment declined");
                Err(match e {
                    Error::Payment(_) => e,
                    other => Error::Payment(other.to_string()),
                })
            }
        }
    }

    /// Current view of a reservation
    ///
    /// Pending reservations come from the registry; terminal ones from the store.
    pub async fn reservation(&self, id: ReservationId) -> Result<Option<Reservation>> {
        if let Some(entry) = self.registry.get(id).await? {
            return Ok(Some(entry.reservation));
        }
        self.supervisors.store.read(id).await
    }

    /// Number of pending reservations
    pub async fn active_reservations(&self) -> Result<usize> {
        self.registry.len().await
    }

    /// Public half of the signing key
    pub fn public_key(&self) -> [u8; 32] {
        self.signer.public_key()
    }

    /// Metrics collector
    pub fn metrics(&self) -> &ReservationMetrics {
        &self.supervisors.metrics
    }

    /// Configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Stop the registry actor; running supervisors are abandoned
    pub async fn shutdown(&self) -> Result<()> {
        self.registry.shutdown().await
    }

    fn check_quote_age(&self, solution: &crate::types::Solution) -> Result<()> {
        let max_age = self.config.quote.max_age_seconds;
        if max_age == 0 {
            return Ok(());
        }

        let age = Utc::now().signed_duration_since(solution.quoted_at);
        if age.num_seconds() > max_age as i64 {
            return Err(Error::SolutionExpired(format!(
                "Solution quoted {}s ago, maximum is {}s",
                age.num_seconds(),
                max_age
            )));
        }
        Ok(())
    }
}

/// Register, persist, and hand the reservation to its supervisor
async fn admit(
    ctx: SupervisorContext,
    draft: ReservationDraft,
    placed: Instant,
) -> Result<Reservation> {
    let (handshake_tx, handshake_rx) = handshake::channel();
    let reservation = ctx.registry.create(draft, handshake_tx).await?;
    let id = reservation.id;

    let created = ctx
        .store
        .create_with_id(id, &reservation)
        .await
        .and_then(|created| {
            if created {
                Ok(())
            } else {
                Err(Error::Persistence(format!("Record {} already exists", id)))
            }
        });

    if let Err(e) = created {
        // No supervisor will ever own this entry
        if let Err(remove_err) = ctx.registry.remove(id).await {
            tracing::error!(reservation_id = %id, error = %remove_err, "Rollback failed");
        }
        tracing::error!(reservation_id = %id, error = %e, "Failed to persist reservation");
        return Err(match e {
            Error::Persistence(_) => e,
            other => Error::Persistence(other.to_string()),
        });
    }

    ctx.metrics.created.inc();
    ReservationSupervisor::new(id, placed, handshake_rx, ctx.clone()).spawn();

    tracing::info!(
        reservation_id = %id,
        user_id = %reservation.user_id,
        price = %reservation.solution.price,
        "Reservation placed"
    );

    Ok(reservation)
}

fn validate_query(query: &Query) -> Result<()> {
    for location in [&query.starting_point, &query.destination] {
        if !location.coordinate.lat.is_finite() || !location.coordinate.lon.is_finite() {
            return Err(Error::Validation("Coordinates must be finite".to_string()));
        }
    }
    if !query.weight.is_finite() || query.weight < 0.0 {
        return Err(Error::Validation(
            "Weight must be a non-negative number".to_string(),
        ));
    }
    Ok(())
}
