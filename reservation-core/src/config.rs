//! Configuration for the reservation core

use crate::retry::RetryConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

/// Reservation core configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Data directory for RocksDB
    pub data_dir: PathBuf,

    /// Service name
    pub service_name: String,

    /// Service version
    pub service_version: String,

    /// Signing key configuration
    pub signing: SigningConfig,

    /// Reservation lifecycle configuration
    pub reservation: ReservationConfig,

    /// Persistence configuration
    pub persistence: PersistenceConfig,

    /// Payment configuration
    pub payment: PaymentConfig,

    /// Quote configuration
    pub quote: QuoteConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data/reservations"),
            service_name: "reservation-core".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            signing: SigningConfig::default(),
            reservation: ReservationConfig::default(),
            persistence: PersistenceConfig::default(),
            payment: PaymentConfig::default(),
            quote: QuoteConfig::default(),
        }
    }
}

/// Signing key configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SigningConfig {
    /// 32-byte Ed25519 seed, hex encoded; a fresh key is generated if unset
    pub seed_hex: Option<String>,
}

/// Reservation lifecycle configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReservationConfig {
    /// Time allowed for payment after placement
    pub expiry_seconds: u64,

    /// Expiry evaluation interval (milliseconds)
    pub tick_interval_ms: u64,

    /// Registry actor mailbox capacity
    pub registry_mailbox_capacity: usize,
}

impl Default for ReservationConfig {
    fn default() -> Self {
        Self {
            expiry_seconds: 30,
            tick_interval_ms: 1000,
            registry_mailbox_capacity: 1000,
        }
    }
}

/// Storage backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Process-local map
    #[default]
    Memory,
    /// RocksDB under `data_dir`
    RocksDb,
}

impl FromStr for StorageBackend {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "memory" => Ok(StorageBackend::Memory),
            "rocksdb" => Ok(StorageBackend::RocksDb),
            other => Err(crate::Error::Config(format!("Unknown storage backend: {}", other))),
        }
    }
}

/// Persistence configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistenceConfig {
    /// Storage backend
    pub backend: StorageBackend,

    /// Retry policy for terminal status writes
    pub retry: RetryConfig,
}

/// Payment configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PaymentConfig {
    /// ISO 4217 currency code
    pub currency: String,

    /// Statement description sent with each charge
    pub description: String,
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            currency: "usd".to_string(),
            description: "Humming Product".to_string(),
        }
    }
}

/// Quote configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QuoteConfig {
    /// Maximum age of a solution at order time; 0 disables the check
    pub max_age_seconds: u64,
}

impl Default for QuoteConfig {
    fn default() -> Self {
        Self {
            max_age_seconds: 600, // 10 minutes
        }
    }
}

impl Config {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from environment variables
    pub fn from_env() -> crate::Result<Self> {
        let mut config = Config::default();

        if let Ok(data_dir) = std::env::var("RESERVATION_DATA_DIR") {
            config.data_dir = PathBuf::from(data_dir);
        }

        if let Ok(seed) = std::env::var("RESERVATION_SIGNING_SEED") {
            config.signing.seed_hex = Some(seed);
        }

        if let Ok(value) = std::env::var("RESERVATION_EXPIRY_SECONDS") {
            config.reservation.expiry_seconds = parse_var("RESERVATION_EXPIRY_SECONDS", &value)?;
        }

        if let Ok(value) = std::env::var("RESERVATION_TICK_INTERVAL_MS") {
            config.reservation.tick_interval_ms =
                parse_var("RESERVATION_TICK_INTERVAL_MS", &value)?;
        }

        if let Ok(value) = std::env::var("RESERVATION_STORAGE_BACKEND") {
            config.persistence.backend = value.parse()?;
        }

        if let Ok(value) = std::env::var("RESERVATION_QUOTE_MAX_AGE_SECONDS") {
            config.quote.max_age_seconds = parse_var("RESERVATION_QUOTE_MAX_AGE_SECONDS", &value)?;
        }

        if let Ok(currency) = std::env::var("RESERVATION_PAYMENT_CURRENCY") {
            config.payment.currency = currency.to_ascii_lowercase();
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject settings the supervisor cannot run with
    pub fn validate(&self) -> crate::Result<()> {
        if self.reservation.tick_interval_ms == 0 {
            return Err(crate::Error::Config(
                "reservation.tick_interval_ms must be positive".to_string(),
            ));
        }
        if self.payment.currency.len() != 3 {
            return Err(crate::Error::Config(format!(
                "payment.currency must be a 3-letter code, got {:?}",
                self.payment.currency
            )));
        }
        Ok(())
    }
}

fn parse_var<T: FromStr>(name: &str, value: &str) -> crate::Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| crate::Error::Config(format!("Invalid value for {}: {:?}", name, value)))
}
