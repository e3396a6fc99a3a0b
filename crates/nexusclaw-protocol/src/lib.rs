//! `nexusclaw-protocol` — the AVP protocol engine: request parsing,
//! session lifecycle, secret-metadata bookkeeping, operation dispatch,
//! and response formatting, over a [`nexusclaw_backend::Backend`].
//!
//! This crate owns every externally observable behavior of the device
//! except the secure element itself: it depends only on the `Backend`
//! trait, never on a concrete implementation, so the real firmware and
//! `nexusclaw-sim` share the exact same dispatch logic.

#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod codec;
pub mod command;
pub mod dispatcher;
pub mod error;
pub mod limits;
pub mod response;
pub mod secret_index;
pub mod session;

pub use command::{Command, Opcode};
pub use dispatcher::Dispatcher;
pub use error::DispatchError;
pub use response::{Capabilities, Response, SecretSummary, CAPABILITIES};
pub use secret_index::SecretIndex;
pub use session::{SessionDescriptor, SessionManager};
