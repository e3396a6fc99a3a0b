//! Ed25519 signing for the in-memory backend's key slots.
//!
//! The real secure element signs with whatever ECC engine the silicon
//! exposes (out of scope, AVP v0.1.0 §1); the in-memory fake standardizes
//! on `ring::signature::Ed25519KeyPair` so `HW_SIGN`/`HW_ATTEST` responses
//! are independently verifiable in tests rather than placeholder strings.

use rand::rngs::OsRng;
use rand::RngCore;
use ring::signature::{Ed25519KeyPair, KeyPair};
use zeroize::Zeroize;

use crate::error::BackendError;
use crate::memory::SecretBuffer;

/// Seed length for Ed25519 key generation.
pub const ED25519_SEED_LEN: usize = 32;

/// Ed25519 signature length in bytes.
pub const ED25519_SIGNATURE_LEN: usize = 64;

/// A key-slot signing identity: the seed (kept in locked, zeroized memory)
/// plus the derived `Ed25519KeyPair` used to sign.
pub struct SigningKey {
    seed: SecretBuffer,
    public_key: [u8; 32],
}

impl SigningKey {
    /// Generate a new signing key from fresh CSPRNG randomness.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::Crypto`] if key derivation fails.
    pub fn generate() -> Result<Self, BackendError> {
        let mut seed_bytes = [0u8; ED25519_SEED_LEN];
        OsRng.fill_bytes(&mut seed_bytes);
        let key = Self::from_seed_bytes(&seed_bytes);
        seed_bytes.zeroize();
        key
    }

    /// Derive a signing key from an explicit seed (used by the deterministic
    /// test backend so key material is reproducible within a test run).
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::Crypto`] if the seed does not yield a valid
    /// Ed25519 key pair.
    pub fn from_seed_bytes(seed: &[u8; ED25519_SEED_LEN]) -> Result<Self, BackendError> {
        let pair = Ed25519KeyPair::from_seed_unchecked(seed)
            .map_err(|e| BackendError::Crypto(format!("Ed25519 key generation failed: {e}")))?;
        let mut public_key = [0u8; 32];
        public_key.copy_from_slice(pair.public_key().as_ref());
        let seed_buf = SecretBuffer::new(seed)
            .map_err(|e| BackendError::Crypto(format!("secure memory allocation failed: {e}")))?;
        Ok(Self {
            seed: seed_buf,
            public_key,
        })
    }

    /// The 32-byte Ed25519 public key, safe to share.
    #[must_use]
    pub const fn public_key(&self) -> &[u8; 32] {
        &self.public_key
    }

    /// Sign `data`, returning a 64-byte Ed25519 signature.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::Crypto`] if the stored seed no longer yields
    /// a valid key pair (it was validated at construction, so this should
    /// not happen in practice).
    pub fn sign(&self, data: &[u8]) -> Result<Vec<u8>, BackendError> {
        let seed: &[u8; ED25519_SEED_LEN] = self
            .seed
            .expose()
            .try_into()
            .map_err(|_| BackendError::Crypto("corrupted signing seed".into()))?;
        let pair = Ed25519KeyPair::from_seed_unchecked(seed)
            .map_err(|e| BackendError::Crypto(format!("Ed25519 key generation failed: {e}")))?;
        Ok(pair.sign(data).as_ref().to_vec())
    }
}

impl std::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SigningKey(public={})", data_encoding::HEXLOWER.encode(&self.public_key))
    }
}
