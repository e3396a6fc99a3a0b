//! Backend error types for `nexusclaw-backend`.

use thiserror::Error;

/// Errors produced by a [`crate::Backend`] implementation.
///
/// These map onto the wire-level `HARDWARE_ERROR` / `CRYPTO_ERROR` codes
/// one level up, in `nexusclaw-protocol`'s dispatcher; this crate only
/// distinguishes storage/IO failures from cryptographic ones.
#[derive(Debug, Error)]
pub enum BackendError {
    /// Slot read/write/erase failed (capacity, corruption, I/O).
    #[error("slot I/O error: {0}")]
    SlotIo(String),

    /// Requested slot index is outside the valid range for its pool.
    #[error("invalid slot: {0}")]
    InvalidSlot(u8),

    /// Signing or attestation failed at the cryptographic layer.
    #[error("cryptographic operation failed: {0}")]
    Crypto(String),

    /// CSPRNG or secure-memory allocation failed.
    #[error("secure memory error: {0}")]
    SecureMemory(String),
}
