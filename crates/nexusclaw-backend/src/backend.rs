//! The `Backend` trait — the abstraction boundary between the AVP protocol
//! engine and the secure element.
//!
//! A real implementation maps these calls onto secure-element memory
//! regions and an ECC signing engine (out of scope for this workspace,
//! AVP v0.1.0 §1). [`crate::in_memory::InMemoryBackend`] is the only
//! implementation shipped here, and is the one every test and the
//! reference simulator (`nexusclaw-sim`) use.

use crate::error::BackendError;

/// Result of a PIN verification attempt against the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinOutcome {
    /// The PIN matched.
    Ok,
    /// The PIN did not match, but further attempts are still permitted.
    Invalid,
    /// The backend has independently locked out PIN verification
    /// (e.g. its own attempt counter reached its ceiling).
    Locked,
}

/// Static device-identity fields returned by `DISCOVER`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    /// Device model name.
    pub model: String,
    /// Per-device serial, stable for the process lifetime.
    pub serial: String,
    /// Firmware version string.
    pub firmware: String,
}

/// Capability set the AVP protocol engine consumes from the secure element.
///
/// Every method is a potential hardware I/O suspension point (AVP v0.1.0
/// §5); none of the protocol engine's own components (codec, dispatcher,
/// session manager, secret index) call out to hardware directly — only
/// handlers invoked through this trait do.
pub trait Backend {
    /// Monotonic seconds since an implementation-defined epoch.
    fn now_seconds(&self) -> u64;

    /// Produce `n` cryptographically random bytes.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::SecureMemory`] if the CSPRNG fails.
    fn random(&self, n: usize) -> Result<Vec<u8>, BackendError>;

    /// Write `bytes` to `slot`, replacing any prior contents.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::InvalidSlot`] if `slot` is outside the
    /// data-slot pool, or [`BackendError::SlotIo`] on a storage failure.
    fn slot_write(&self, slot: u8, bytes: &[u8]) -> Result<(), BackendError>;

    /// Read the current contents of `slot`.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::InvalidSlot`] if `slot` is outside the
    /// data-slot pool, or [`BackendError::SlotIo`] if the slot has never
    /// been written or the read fails.
    fn slot_read(&self, slot: u8) -> Result<Vec<u8>, BackendError>;

    /// Erase `slot`, releasing it for reuse.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::InvalidSlot`] if `slot` is outside the
    /// data-slot pool, or [`BackendError::SlotIo`] on a storage failure.
    fn slot_erase(&self, slot: u8) -> Result<(), BackendError>;

    /// Verify a PIN against the backend's stored credential.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::Crypto`] only on an internal failure of the
    /// verification primitive itself — a wrong PIN is `Ok(PinOutcome::Invalid)`,
    /// not an `Err`.
    fn pin_verify(&self, pin: &str) -> Result<PinOutcome, BackendError>;

    /// Sign `data` with the key held in `key_slot`.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::InvalidSlot`] if `key_slot` is outside the
    /// key-slot pool, or [`BackendError::Crypto`] if signing fails.
    fn sign(&self, key_slot: u8, data: &[u8]) -> Result<Vec<u8>, BackendError>;

    /// Produce a device-authenticity signature over `challenge`.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::Crypto`] if attestation signing fails.
    fn attest(&self, challenge: &[u8]) -> Result<Vec<u8>, BackendError>;

    /// Static device-identity fields for `DISCOVER`.
    fn device_info(&self) -> DeviceInfo;
}
