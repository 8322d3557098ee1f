//! Solution attestation
//!
//! This module provides:
//! - Ed25519 key pair generation and seeding from configuration
//! - Signing of a solution's canonical bytes at quote time
//! - Verification of client-submitted solutions at order time
//! - SHA-256 digests recorded on reservations

use crate::types::{Signature, Solution};
use crate::{Error, Result};
use ed25519_dalek::{Signature as DalekSignature, Signer, SigningKey, Verifier, VerifyingKey};

/// Ed25519 key pair for signing
pub struct KeyPair {
    signing_key: SigningKey,
    verifying_key: VerifyingKey,
}

impl KeyPair {
    /// Generate a new random key pair
    pub fn generate() -> Self {
        Self::from_seed(&rand::random::<[u8; 32]>())
    }

    /// Create from seed (32 bytes) - deterministic generation
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        let signing_key = SigningKey::from_bytes(seed);
        let verifying_key = signing_key.verifying_key();

        Self {
            signing_key,
            verifying_key,
        }
    }

    /// Create from a 64-character hex seed
    pub fn from_hex_seed(seed_hex: &str) -> Result<Self> {
        let raw = hex::decode(seed_hex.trim())
            .map_err(|e| Error::Config(format!("Signing seed is not hex: {}", e)))?;
        let seed: [u8; 32] = raw
            .try_into()
            .map_err(|_| Error::Config("Signing seed must be 32 bytes".to_string()))?;
        Ok(Self::from_seed(&seed))
    }

    /// Get public key bytes
    pub fn public_key(&self) -> [u8; 32] {
        self.verifying_key.to_bytes()
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key", &hex::encode(self.public_key()))
            .finish_non_exhaustive()
    }
}

/// Signs and verifies solutions with a server-held key
#[derive(Debug)]
pub struct SolutionSigner {
    keypair: KeyPair,
}

impl SolutionSigner {
    /// Create a signer around an injected key pair
    pub fn new(keypair: KeyPair) -> Self {
        Self { keypair }
    }

    /// Sign a solution
    ///
    /// Ed25519 is deterministic, so the same solution always yields the
    /// same signature under the same key.
    pub fn sign(&self, solution: &Solution) -> Signature {
        let signature = self.keypair.signing_key.sign(&solution.canonical_bytes());
        Signature::from_bytes(signature.to_bytes())
    }

    /// Check `signature` was produced by `sign(solution)` with this key
    pub fn verify(&self, solution: &Solution, signature: &Signature) -> bool {
        let dalek_sig = DalekSignature::from_bytes(signature.as_bytes());
        self.keypair
            .verifying_key
            .verify(&solution.canonical_bytes(), &dalek_sig)
            .is_ok()
    }

    /// Hex SHA-256 of the solution's canonical bytes
    pub fn digest(&self, solution: &Solution) -> String {
        hex::encode(solution.canonical_hash())
    }

    /// Public half of the signing key
    pub fn public_key(&self) -> [u8; 32] {
        self.keypair.public_key()
    }
}

/// Verify a solution signature with a public key
pub fn verify_with_public_key(
    solution: &Solution,
    signature: &Signature,
    public_key: &[u8; 32],
) -> bool {
    let dalek_sig = DalekSignature::from_bytes(signature.as_bytes());

    let verifying_key = match VerifyingKey::from_bytes(public_key) {
        Ok(key) => key,
        Err(_) => return false,
    };

    verifying_key
        .verify(&solution.canonical_bytes(), &dalek_sig)
        .is_ok()
}
