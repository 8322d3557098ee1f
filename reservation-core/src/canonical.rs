//! Canonical serialization for solution signing
//!
//! Ensures deterministic byte representation for signing and verification.
//! Uses fixed field order, normalized decimals, and bit-exact floats.

use crate::types::{Coordinate, Location, Solution};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sha2::{Digest, Sha256};

/// Domain-separation tag prefixed to every signed solution
pub const SOLUTION_DOMAIN_TAG: &str = "humming.solution.v1";

/// Canonical serializer
pub struct CanonicalSerializer {
    buffer: Vec<u8>,
}

impl CanonicalSerializer {
    /// Create new serializer
    pub fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    /// Serializer that starts with a domain tag
    pub fn with_domain(tag: &str) -> Self {
        let mut ser = Self::new();
        ser.write_string(tag);
        ser
    }

    fn write_bytes(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Write string (length-prefixed)
    fn write_string(&mut self, s: &str) {
        let bytes = s.as_bytes();
        self.write_u32(bytes.len() as u32);
        self.write_bytes(bytes);
    }

    fn write_u8(&mut self, n: u8) {
        self.write_bytes(&[n]);
    }

    /// Write u32 (big-endian)
    fn write_u32(&mut self, n: u32) {
        self.write_bytes(&n.to_be_bytes());
    }

    /// Write i64 (big-endian)
    fn write_i64(&mut self, n: i64) {
        self.write_bytes(&n.to_be_bytes());
    }

    /// Write f64 by its IEEE-754 bit pattern
    fn write_f64(&mut self, n: f64) {
        self.write_bytes(&n.to_bits().to_be_bytes());
    }

    /// Write decimal (normalized string, so 1.0 and 1.00 agree)
    fn write_decimal(&mut self, d: &Decimal) {
        self.write_string(&d.normalize().to_string());
    }

    /// Write timestamp as seconds plus subsecond nanos
    fn write_time(&mut self, t: &DateTime<Utc>) {
        self.write_i64(t.timestamp());
        self.write_u32(t.timestamp_subsec_nanos());
    }

    fn write_coordinate(&mut self, c: &Coordinate) {
        self.write_f64(c.lat);
        self.write_f64(c.lon);
    }

    fn write_location(&mut self, l: &Location) {
        self.write_coordinate(&l.coordinate);
        self.write_string(&l.address);
    }

    /// Finalize and return bytes
    pub fn finalize(self) -> Vec<u8> {
        self.buffer
    }
}

impl Default for CanonicalSerializer {
    fn default() -> Self {
        Self::new()
    }
}

impl Solution {
    /// Serialize to canonical bytes (for signing)
    pub fn canonical_bytes(&self) -> Vec<u8> {
        let mut ser = CanonicalSerializer::with_domain(SOLUTION_DOMAIN_TAG);

        ser.write_location(&self.starting_point);
        ser.write_location(&self.destination);
        ser.write_time(&self.quoted_at);
        ser.write_time(&self.start_time);
        ser.write_time(&self.pickup_time);
        ser.write_time(&self.dropoff_time);
        ser.write_time(&self.end_time);
        ser.write_u8(self.station.code());
        ser.write_u8(self.machine_type.code());
        ser.write_decimal(&self.price);
        ser.write_f64(self.weight);

        ser.finalize()
    }

    /// SHA-256 over the canonical bytes
    pub fn canonical_hash(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(self.canonical_bytes());
        hasher.finalize().into()
    }
}
