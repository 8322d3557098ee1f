//! Humming Reservation Core
//!
//! Time-bounded order reservations with signed quotes and a two-step
//! payment handshake.
//!
//! # Architecture
//!
//! - **Attestation**: solutions are signed at quote time (Ed25519 over a
//!   canonical encoding) and verified when a client orders them
//! - **Single Owner Registry**: one actor task owns every pending reservation
//! - **Supervisor per Reservation**: races an expiry ticker against payment
//! - **Ports**: storage, identity, payment, and quoting sit behind traits
//!
//! # Invariants
//!
//! - Status only moves PENDING → ORDERED or PENDING → EXPIRED, once
//! - A registry entry lives exactly as long as its supervisor
//! - No reservation expires between an accepted payment start and its outcome

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms, clippy::all)]

pub mod canonical;
pub mod config;
pub mod error;
pub mod handshake;
pub mod metrics;
pub mod ports;
pub mod quoting;
pub mod registry;
pub mod retry;
pub mod service;
pub mod signer;
pub mod storage;
pub mod supervisor;
pub mod types;

// Re-exports
pub use config::Config;
pub use error::{Error, Result};
pub use metrics::ReservationMetrics;
pub use ports::{IdentityVerifier, PaymentGateway, ReservationStore, SolutionProvider};
pub use quoting::FixedSolutionProvider;
pub use service::OrderService;
pub use signer::{KeyPair, SolutionSigner};
pub use storage::{InMemoryReservationStore, RocksDbReservationStore};
pub use types::{
    ChargeReceipt, ChargeRequest, Coordinate, Location, MachineId, MachineType,
    PaymentInstrument, PaymentReceipt, Query, Reservation, ReservationId, ReservationStatus,
    Signature, SignedSolution, Solution, Station, SubjectId,
};
