//! `nexusclaw-backend` — secure-element backend abstraction for the AVP
//! protocol engine.
//!
//! This crate is the audit target for everything that touches key material:
//! zero network, zero async. It defines the [`Backend`] trait the protocol
//! engine consumes and ships exactly one implementation, [`InMemoryBackend`],
//! since the real secure-element driver is out of scope (AVP v0.1.0 §1).

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::arithmetic_side_effects))]

pub mod backend;
pub mod error;
pub mod in_memory;
pub mod memory;
pub mod signing;
pub mod slots;

pub use backend::{Backend, DeviceInfo, PinOutcome};
pub use error::BackendError;
pub use in_memory::{InMemoryBackend, DEFAULT_TEST_PIN};
pub use memory::{disable_core_dumps, LockedRegion, SecretBuffer, SecretBytes};
pub use signing::SigningKey;
pub use slots::{is_data_slot, is_key_slot, DATA_SLOT_COUNT, DATA_SLOT_RANGE, KEY_SLOT_RANGE};
