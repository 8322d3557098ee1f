//! Collaborator boundaries
//!
//! The core depends on these traits only. Implementations live in
//! `storage`, `quoting`, and the HTTP gateway.

use crate::types::{
    ChargeReceipt, ChargeRequest, Query, Reservation, ReservationId, ReservationUpdate, Solution,
    SubjectId,
};
use crate::Result;
use async_trait::async_trait;

/// Durable record of reservations
#[async_trait]
pub trait ReservationStore: Send + Sync {
    /// Insert a record; `false` if the id already exists
    async fn create_with_id(&self, id: ReservationId, record: &Reservation) -> Result<bool>;

    /// Apply a partial update; `false` if the id does not exist
    async fn update(&self, id: ReservationId, update: ReservationUpdate) -> Result<bool>;

    /// Read a record
    async fn read(&self, id: ReservationId) -> Result<Option<Reservation>>;
}

/// Maps a bearer token to a subject
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    /// Verify `token`, returning its subject or `Error::Auth`
    async fn verify(&self, token: &str) -> Result<SubjectId>;
}

/// Captures payments
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Charge the request; `Error::Payment` when declined
    async fn charge(&self, request: &ChargeRequest) -> Result<ChargeReceipt>;
}

/// Produces candidate solutions for a query
#[async_trait]
pub trait SolutionProvider: Send + Sync {
    async fn produce_solutions(&self, query: &Query) -> Result<Vec<Solution>>;
}
