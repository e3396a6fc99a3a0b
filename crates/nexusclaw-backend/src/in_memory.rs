//! The in-memory fake backend — the only `Backend` implementation shipped
//! in this workspace (a real secure-element driver is out of scope,
//! AVP v0.1.0 §1).
//!
//! Keeps slots in a `Mutex<HashMap>`, uses a seeded deterministic PRNG, and
//! advances a virtual clock only on explicit `advance_seconds` calls so
//! session-expiry behavior is reproducible under test.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};

use crate::backend::{Backend, DeviceInfo, PinOutcome};
use crate::error::BackendError;
use crate::signing::{SigningKey, ED25519_SEED_LEN};
use crate::slots::{is_data_slot, is_key_slot};

/// Default test PIN used by the reference simulator and fixtures.
pub const DEFAULT_TEST_PIN: &str = "123456";

/// In-memory, deterministic secure-element fake.
pub struct InMemoryBackend {
    data_slots: Mutex<HashMap<u8, Vec<u8>>>,
    key_slots: Mutex<HashMap<u8, SigningKey>>,
    clock: AtomicU64,
    rng: Mutex<StdRng>,
    pin: String,
    device: DeviceInfo,
}

impl InMemoryBackend {
    /// Build a backend seeded for deterministic tests.
    ///
    /// - `rng_seed` drives `random()` output.
    /// - `epoch` is the starting value of the virtual clock.
    /// - `pin` is the credential `pin_verify` checks against.
    #[must_use]
    pub fn new_seeded(rng_seed: u64, epoch: u64, pin: impl Into<String>) -> Self {
        let serial = data_encoding::HEXLOWER.encode(&blake3::hash(&rng_seed.to_le_bytes()).as_bytes()[..8]);
        Self {
            data_slots: Mutex::new(HashMap::new()),
            key_slots: Mutex::new(HashMap::new()),
            clock: AtomicU64::new(epoch),
            rng: Mutex::new(StdRng::seed_from_u64(rng_seed)),
            pin: pin.into(),
            device: DeviceInfo {
                model: "NexusClaw".to_string(),
                serial,
                firmware: env!("CARGO_PKG_VERSION").to_string(),
            },
        }
    }

    /// Build a backend with the default test PIN (`"123456"`), seed `0`,
    /// and epoch `0`.
    #[must_use]
    pub fn new() -> Self {
        Self::new_seeded(0, 0, DEFAULT_TEST_PIN)
    }

    /// Advance the virtual clock by `seconds` — the only way time moves
    /// for this backend. Used to deterministically drive session expiry.
    pub fn advance_seconds(&self, seconds: u64) {
        self.clock.fetch_add(seconds, Ordering::SeqCst);
    }

    /// Override the generated serial with a caller-chosen one.
    #[must_use]
    pub fn with_serial(mut self, serial: impl Into<String>) -> Self {
        self.device.serial = serial.into();
        self
    }

    fn key_for(&self, key_slot: u8) -> Result<(), BackendError> {
        let mut slots = self
            .key_slots
            .lock()
            .map_err(|_| BackendError::SlotIo("key-slot lock poisoned".into()))?;
        if !slots.contains_key(&key_slot) {
            let mut seed_bytes = [0u8; ED25519_SEED_LEN];
            self.rng
                .lock()
                .map_err(|_| BackendError::SecureMemory("rng lock poisoned".into()))?
                .fill_bytes(&mut seed_bytes);
            let key = SigningKey::from_seed_bytes(&seed_bytes)?;
            slots.insert(key_slot, key);
        }
        Ok(())
    }
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Backend for InMemoryBackend {
    fn now_seconds(&self) -> u64 {
        self.clock.load(Ordering::SeqCst)
    }

    fn random(&self, n: usize) -> Result<Vec<u8>, BackendError> {
        let mut buf = vec![0u8; n];
        self.rng
            .lock()
            .map_err(|_| BackendError::SecureMemory("rng lock poisoned".into()))?
            .fill_bytes(&mut buf);
        Ok(buf)
    }

    fn slot_write(&self, slot: u8, bytes: &[u8]) -> Result<(), BackendError> {
        if !is_data_slot(slot) {
            return Err(BackendError::InvalidSlot(slot));
        }
        self.data_slots
            .lock()
            .map_err(|_| BackendError::SlotIo("data-slot lock poisoned".into()))?
            .insert(slot, bytes.to_vec());
        Ok(())
    }

    fn slot_read(&self, slot: u8) -> Result<Vec<u8>, BackendError> {
        if !is_data_slot(slot) {
            return Err(BackendError::InvalidSlot(slot));
        }
        self.data_slots
            .lock()
            .map_err(|_| BackendError::SlotIo("data-slot lock poisoned".into()))?
            .get(&slot)
            .cloned()
            .ok_or_else(|| BackendError::SlotIo(format!("slot {slot} has never been written")))
    }

    fn slot_erase(&self, slot: u8) -> Result<(), BackendError> {
        if !is_data_slot(slot) {
            return Err(BackendError::InvalidSlot(slot));
        }
        self.data_slots
            .lock()
            .map_err(|_| BackendError::SlotIo("data-slot lock poisoned".into()))?
            .remove(&slot);
        Ok(())
    }

    fn pin_verify(&self, pin: &str) -> Result<PinOutcome, BackendError> {
        let matches = ring::constant_time::verify_slices_eq(pin.as_bytes(), self.pin.as_bytes());
        Ok(if matches.is_ok() {
            PinOutcome::Ok
        } else {
            PinOutcome::Invalid
        })
    }

    fn sign(&self, key_slot: u8, data: &[u8]) -> Result<Vec<u8>, BackendError> {
        if !is_key_slot(key_slot) {
            return Err(BackendError::InvalidSlot(key_slot));
        }
        self.key_for(key_slot)?;
        self.key_slots
            .lock()
            .map_err(|_| BackendError::SlotIo("key-slot lock poisoned".into()))?
            .get(&key_slot)
            .expect("key_for just inserted this slot")
            .sign(data)
    }

    fn attest(&self, challenge: &[u8]) -> Result<Vec<u8>, BackendError> {
        const ATTESTATION_KEY_SLOT: u8 = 0;
        let mut preamble = format!("nexusclaw-attest:{}:", self.device.serial).into_bytes();
        preamble.extend_from_slice(challenge);
        self.sign(ATTESTATION_KEY_SLOT, &preamble)
    }

    fn device_info(&self) -> DeviceInfo {
        self.device.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_only_advances_explicitly() {
        let backend = InMemoryBackend::new_seeded(1, 100, "1234");
        assert_eq!(backend.now_seconds(), 100);
        backend.advance_seconds(61);
        assert_eq!(backend.now_seconds(), 161);
    }

    #[test]
    fn same_seed_is_deterministic() {
        let a = InMemoryBackend::new_seeded(7, 0, "1234");
        let b = InMemoryBackend::new_seeded(7, 0, "1234");
        assert_eq!(a.random(16).unwrap(), b.random(16).unwrap());
    }

    #[test]
    fn different_seeds_diverge() {
        let a = InMemoryBackend::new_seeded(1, 0, "1234");
        let b = InMemoryBackend::new_seeded(2, 0, "1234");
        assert_ne!(a.random(16).unwrap(), b.random(16).unwrap());
    }

    #[test]
    fn slot_write_read_erase_roundtrip() {
        let backend = InMemoryBackend::new();
        backend.slot_write(96, b"sk-ant-abc").unwrap();
        assert_eq!(backend.slot_read(96).unwrap(), b"sk-ant-abc");
        backend.slot_erase(96).unwrap();
        assert!(backend.slot_read(96).is_err());
    }

    #[test]
    fn slot_outside_data_range_is_rejected() {
        let backend = InMemoryBackend::new();
        assert!(matches!(
            backend.slot_write(5, b"x"),
            Err(BackendError::InvalidSlot(5))
        ));
    }

    #[test]
    fn pin_verify_matches_configured_pin() {
        let backend = InMemoryBackend::new_seeded(0, 0, "987654");
        assert_eq!(backend.pin_verify("987654").unwrap(), PinOutcome::Ok);
        assert_eq!(backend.pin_verify("000000").unwrap(), PinOutcome::Invalid);
    }

    #[test]
    fn sign_is_verifiable_and_stable_per_slot() {
        let backend = InMemoryBackend::new();
        let sig1 = backend.sign(0, b"data").unwrap();
        let sig2 = backend.sign(0, b"data").unwrap();
        assert_eq!(sig1, sig2, "same key slot should sign deterministically for the same message");
    }

    #[test]
    fn sign_rejects_non_key_slot() {
        let backend = InMemoryBackend::new();
        assert!(matches!(
            backend.sign(200, b"data"),
            Err(BackendError::InvalidSlot(200))
        ));
    }

    #[test]
    fn attest_produces_bytes() {
        let backend = InMemoryBackend::new();
        let sig = backend.attest(b"challenge").unwrap();
        assert_eq!(sig.len(), crate::signing::ED25519_SIGNATURE_LEN);
    }

    #[test]
    fn device_info_reports_model() {
        let backend = InMemoryBackend::new();
        let info = backend.device_info();
        assert_eq!(info.model, "NexusClaw");
        assert!(!info.serial.is_empty());
    }
}
