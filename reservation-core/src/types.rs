//! Core types for reservations
//!
//! All types are designed for:
//! - Stable JSON shape at the HTTP boundary (serde)
//! - Deterministic canonical bytes for signing (see `canonical`)
//! - Exact arithmetic for prices (Decimal)

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Reservation identifier (UUIDv7 for time-ordering)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReservationId(Uuid);

impl ReservationId {
    /// Generate a fresh id
    pub fn generate() -> Self {
        Self(Uuid::now_v7())
    }

    /// Raw UUID
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    /// Key bytes for storage backends
    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }
}

impl From<Uuid> for ReservationId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl FromStr for ReservationId {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| crate::Error::Validation(format!("Invalid reservation id {:?}: {}", s, e)))
    }
}

impl fmt::Display for ReservationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Verified identity of a caller (token subject)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubjectId(String);

impl SubjectId {
    /// Create new subject ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque identifier of the machine assigned to a reservation
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MachineId(String);

impl MachineId {
    /// Create new machine ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Placeholder used until machine assignment exists
    pub fn unassigned() -> Self {
        Self("unassigned".to_string())
    }

    /// Get as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Geographic coordinate (degrees)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    /// Latitude
    pub lat: f64,
    /// Longitude
    pub lon: f64,
}

/// A pickup or dropoff point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    /// Position
    pub coordinate: Coordinate,
    /// Human-readable address
    pub address: String,
}

/// Class of machine able to fulfil a solution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum MachineType {
    /// Drones only
    DroneOnly = 0,
    /// Ground robots only
    RobotOnly = 1,
    /// Either
    Both = 2,
}

impl MachineType {
    /// Wire code
    pub fn code(&self) -> u8 {
        *self as u8
    }
}

/// Station a solution departs from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum Station {
    /// Machine is not parked at a station
    #[default]
    NotInStation = 0,
    /// Station 0
    Station0 = 1,
    /// Station 1
    Station1 = 2,
    /// Station 2
    Station2 = 3,
}

impl Station {
    /// Wire code
    pub fn code(&self) -> u8 {
        *self as u8
    }
}

/// Request for solutions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Query {
    /// Pickup location
    pub starting_point: Location,
    /// Dropoff location
    pub destination: Location,
    /// Requested machine class
    pub machine_type: MachineType,
    /// Parcel weight (kg)
    pub weight: f64,
    /// Receive time, stamped by the server
    #[serde(default = "Utc::now")]
    pub time: DateTime<Utc>,
}

/// Immutable quote: fulfilment plan and price
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Solution {
    /// Pickup location
    pub starting_point: Location,
    /// Dropoff location
    pub destination: Location,
    /// When the quote was produced
    pub quoted_at: DateTime<Utc>,
    /// Machine departure
    pub start_time: DateTime<Utc>,
    /// Estimated pickup
    #[serde(rename = "estimated_pickup_time")]
    pub pickup_time: DateTime<Utc>,
    /// Estimated dropoff
    #[serde(rename = "estimated_dropoff_time")]
    pub dropoff_time: DateTime<Utc>,
    /// Machine back at rest
    pub end_time: DateTime<Utc>,
    /// Departure station
    pub station: Station,
    /// Machine class
    pub machine_type: MachineType,
    /// Price in major currency units
    pub price: Decimal,
    /// Parcel weight (kg)
    pub weight: f64,
}

impl Solution {
    /// Check the payload is well-formed
    pub fn validate(&self) -> crate::Result<()> {
        for location in [&self.starting_point, &self.destination] {
            let Coordinate { lat, lon } = location.coordinate;
            if !lat.is_finite() || !lon.is_finite() {
                return Err(crate::Error::Validation(
                    "Coordinates must be finite".to_string(),
                ));
            }
        }

        if !self.weight.is_finite() || self.weight < 0.0 {
            return Err(crate::Error::Validation(
                "Weight must be a non-negative number".to_string(),
            ));
        }

        if self.price.is_sign_negative() {
            return Err(crate::Error::Validation(
                "Price must not be negative".to_string(),
            ));
        }

        if self.price.normalize().scale() > 2 {
            return Err(crate::Error::Validation(
                "Price has more than two fractional digits".to_string(),
            ));
        }

        let timeline = [
            self.start_time,
            self.pickup_time,
            self.dropoff_time,
            self.end_time,
        ];
        if timeline.windows(2).any(|pair| pair[0] > pair[1]) {
            return Err(crate::Error::Validation(
                "Solution times are out of order".to_string(),
            ));
        }

        Ok(())
    }

    /// Price in minor units (cents)
    pub fn amount_cents(&self) -> crate::Result<u64> {
        (self.price * Decimal::ONE_HUNDRED)
            .round()
            .to_u64()
            .ok_or_else(|| crate::Error::Validation(format!("Price {} out of range", self.price)))
    }
}

/// Ed25519 signature over a solution's canonical bytes
///
/// Transported as lowercase hex.
#[derive(Clone, PartialEq, Eq)]
pub struct Signature {
    bytes: [u8; 64],
}

impl Signature {
    /// Create from bytes
    pub fn from_bytes(bytes: [u8; 64]) -> Self {
        Self { bytes }
    }

    /// Get bytes
    pub fn as_bytes(&self) -> &[u8; 64] {
        &self.bytes
    }

    /// Hex encoding
    pub fn to_hex(&self) -> String {
        hex::encode(self.bytes)
    }

    /// Parse from hex
    pub fn from_hex(s: &str) -> crate::Result<Self> {
        let raw = hex::decode(s)
            .map_err(|e| crate::Error::Validation(format!("Signature is not hex: {}", e)))?;
        let bytes: [u8; 64] = raw.try_into().map_err(|raw: Vec<u8>| {
            crate::Error::Validation(format!("Signature must be 64 bytes, got {}", raw.len()))
        })?;
        Ok(Self { bytes })
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({}..)", &self.to_hex()[..16])
    }
}

impl Serialize for Signature {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Signature {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Signature::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// A solution together with the server's signature
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignedSolution {
    /// The quote
    pub solution: Solution,
    /// Server signature
    pub signature: Signature,
}

/// Reservation status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum ReservationStatus {
    /// Initial state, awaiting payment
    Pending = 0,
    /// Paid (terminal)
    Ordered = 1,
    /// Timed out (terminal)
    Expired = 5,
}

impl ReservationStatus {
    /// Check if status is terminal
    pub fn is_terminal(&self) -> bool {
        matches!(self, ReservationStatus::Ordered | ReservationStatus::Expired)
    }

    /// Whether `next` is a legal successor
    pub fn can_transition_to(&self, next: ReservationStatus) -> bool {
        matches!(
            (self, next),
            (ReservationStatus::Pending, ReservationStatus::Ordered)
                | (ReservationStatus::Pending, ReservationStatus::Expired)
        )
    }
}

impl fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ReservationStatus::Pending => "PENDING",
            ReservationStatus::Ordered => "ORDERED",
            ReservationStatus::Expired => "EXPIRED",
        };
        f.write_str(name)
    }
}

/// Fields of a reservation known before an id is allocated
#[derive(Debug, Clone, PartialEq)]
pub struct ReservationDraft {
    /// Owner
    pub user_id: SubjectId,
    /// Solution snapshot
    pub solution: Solution,
    /// SHA-256 of the solution's canonical bytes (hex)
    pub solution_digest: String,
    /// When the order was placed
    pub placed_at: DateTime<Utc>,
    /// Assigned machine
    pub machine_id: MachineId,
}

/// Time-bounded claim against a solution pending payment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reservation {
    /// Reservation ID
    pub id: ReservationId,
    /// Owner
    pub user_id: SubjectId,
    /// Solution snapshot
    pub solution: Solution,
    /// SHA-256 of the solution's canonical bytes (hex)
    pub solution_digest: String,
    /// When the order was placed
    pub placed_at: DateTime<Utc>,
    /// Assigned machine
    pub machine_id: MachineId,
    /// Current status
    pub status: ReservationStatus,
    /// Last status change
    pub updated_at: DateTime<Utc>,
}

impl Reservation {
    /// Materialize a draft under a freshly allocated id
    pub fn pending(id: ReservationId, draft: ReservationDraft) -> Self {
        Self {
            id,
            user_id: draft.user_id,
            solution: draft.solution,
            solution_digest: draft.solution_digest,
            placed_at: draft.placed_at,
            machine_id: draft.machine_id,
            status: ReservationStatus::Pending,
            updated_at: draft.placed_at,
        }
    }

    /// Whether `subject` owns this reservation
    pub fn is_owned_by(&self, subject: &SubjectId) -> bool {
        &self.user_id == subject
    }
}

/// Partial update applied to a stored reservation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReservationUpdate {
    /// New status
    pub status: ReservationStatus,
    /// When the status changed
    pub updated_at: DateTime<Utc>,
}

impl ReservationUpdate {
    /// Status change stamped now
    pub fn status(status: ReservationStatus) -> Self {
        Self {
            status,
            updated_at: Utc::now(),
        }
    }
}

/// Result of a charge attempt, as reported to the supervisor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentOutcome {
    /// Charge captured
    Succeeded,
    /// Charge rejected or abandoned
    Failed,
}

/// Client-supplied payment source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentInstrument {
    /// Opaque token issued by the payment provider
    pub source_token: String,
}

/// Charge sent to the payment collaborator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChargeRequest {
    /// Amount in minor units
    pub amount_cents: u64,
    /// ISO 4217 code, lowercase
    pub currency: String,
    /// Payment source token
    pub source_token: String,
    /// Statement description
    pub description: String,
    /// Reservation being paid (idempotency key)
    pub reservation_id: ReservationId,
}

/// Successful charge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChargeReceipt {
    /// Provider's charge reference
    pub charge_id: String,
    /// Amount captured
    pub amount_cents: u64,
    /// Currency
    pub currency: String,
    /// Capture time
    pub charged_at: DateTime<Utc>,
}

/// Result of a completed payment handshake
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentReceipt {
    /// Reservation paid
    pub reservation_id: ReservationId,
    /// Status recorded by the supervisor
    pub status: ReservationStatus,
    /// Charge details
    pub charge: ChargeReceipt,
}
