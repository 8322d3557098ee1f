//! Error types for the reservation core

use thiserror::Error;

/// Result type for reservation operations
pub type Result<T> = std::result::Result<T, Error>;

/// Reservation errors
///
/// The first group is surfaced to the caller as a rejection and never
/// retried. `Payment` fails the handshake outcome but leaves the
/// reservation pending. `Persistence` is retried by the supervisor.
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed payload
    #[error("Validation error: {0}")]
    Validation(String),

    /// Identity verification failed
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Signature does not match the solution
    #[error("Integrity check failed: {0}")]
    Integrity(String),

    /// Quoted solution is older than the configured maximum age
    #[error("Solution expired: {0}")]
    SolutionExpired(String),

    /// Subject does not own the reservation
    #[error("Operation is unauthorized: {0}")]
    Ownership(String),

    /// Unknown or already terminal reservation
    #[error("Reservation is nonexistent or expired: {0}")]
    NotFoundOrExpired(String),

    /// Another payment attempt holds the handshake
    #[error("Payment already in progress: {0}")]
    PaymentInProgress(String),

    /// Charge rejected by the payment collaborator
    #[error("Payment failed: {0}")]
    Payment(String),

    /// Storage write or read failed
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Actor mailbox or supervisor channel closed
    #[error("Concurrency error: {0}")]
    Concurrency(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Stable machine-readable reason, distinct for every rejection
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Validation(_) => "ValidationError",
            Error::Auth(_) => "AuthError",
            Error::Integrity(_) => "IntegrityError",
            Error::SolutionExpired(_) => "SolutionExpired",
            Error::Ownership(_) => "OwnershipError",
            Error::NotFoundOrExpired(_) => "NotFoundOrExpired",
            Error::PaymentInProgress(_) => "PaymentInProgress",
            Error::Payment(_) => "PaymentError",
            Error::Persistence(_) => "PersistenceError",
            Error::Concurrency(_) => "ConcurrencyError",
            Error::Config(_) => "ConfigurationError",
            Error::Serialization(_) => "SerializationError",
            Error::Io(_) => "IoError",
        }
    }

    /// Whether a retry of the same operation could succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Persistence(_) | Error::Io(_))
    }
}

impl From<rocksdb::Error> for Error {
    fn from(err: rocksdb::Error) -> Self {
        Error::Persistence(err.to_string())
    }
}
