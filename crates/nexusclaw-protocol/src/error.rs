//! The closed error taxonomy for the AVP protocol engine.
//!
//! Every variant here is also a wire code (`kind()`); the encoder maps a
//! [`DispatchError`] straight onto `{"ok":false,"error":"<CODE>","message":"..."}`
//! with no second translation layer. No error is recovered locally — every
//! error reaches the host in a single failure response (AVP v0.1.0 §7).

use nexusclaw_backend::BackendError;
use thiserror::Error;

/// Errors that can flow out of request decoding or dispatch.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The request was not valid JSON, or `op` was missing/non-string.
    #[error("failed to parse request: {0}")]
    ParseError(String),

    /// `op` named a value outside the closed opcode set.
    #[error("unknown operation: {0}")]
    InvalidOperation(String),

    /// A field was malformed, oversize, or missing for the given operation.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// The operation requires a session and none is live.
    #[error("no active session")]
    NotAuthenticated,

    /// A session exists but `now >= created_at + ttl`.
    #[error("session has expired")]
    SessionExpired,

    /// No secret exists under the requested name.
    #[error("secret not found")]
    SecretNotFound,

    /// The secret index is already at `MAX_SECRETS`.
    #[error("secret capacity exceeded")]
    CapacityExceeded,

    /// The backend failed a storage operation.
    #[error("hardware error: {0}")]
    HardwareError(String),

    /// The backend failed a cryptographic operation.
    #[error("crypto error: {0}")]
    CryptoError(String),

    /// `pin_verify` reported the PIN did not match.
    #[error("invalid PIN")]
    PinInvalid,

    /// `pin_attempts` has reached `MAX_PIN_ATTEMPTS`.
    #[error("PIN locked")]
    PinLocked,

    /// An invariant was violated that none of the above codes describe
    /// (e.g. response encoding overflow).
    #[error("internal error")]
    InternalError,
}

impl DispatchError {
    /// The wire code this error renders as in a failure response.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::ParseError(_) => "PARSE_ERROR",
            Self::InvalidOperation(_) => "INVALID_OPERATION",
            Self::InvalidParameter(_) => "INVALID_PARAMETER",
            Self::NotAuthenticated => "NOT_AUTHENTICATED",
            Self::SessionExpired => "SESSION_EXPIRED",
            Self::SecretNotFound => "SECRET_NOT_FOUND",
            Self::CapacityExceeded => "CAPACITY_EXCEEDED",
            Self::HardwareError(_) => "HARDWARE_ERROR",
            Self::CryptoError(_) => "CRYPTO_ERROR",
            Self::PinInvalid => "PIN_INVALID",
            Self::PinLocked => "PIN_LOCKED",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }
}

impl From<BackendError> for DispatchError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Crypto(msg) => Self::CryptoError(msg),
            BackendError::SlotIo(msg) => Self::HardwareError(msg),
            BackendError::InvalidSlot(slot) => Self::HardwareError(format!("invalid slot {slot}")),
            BackendError::SecureMemory(msg) => Self::HardwareError(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_variant_has_a_stable_wire_code() {
        assert_eq!(DispatchError::ParseError("x".into()).kind(), "PARSE_ERROR");
        assert_eq!(DispatchError::NotAuthenticated.kind(), "NOT_AUTHENTICATED");
        assert_eq!(DispatchError::SessionExpired.kind(), "SESSION_EXPIRED");
        assert_eq!(DispatchError::PinLocked.kind(), "PIN_LOCKED");
        assert_eq!(DispatchError::InternalError.kind(), "INTERNAL_ERROR");
    }

    #[test]
    fn backend_crypto_error_maps_to_crypto_error_kind() {
        let err: DispatchError = BackendError::Crypto("boom".into()).into();
        assert_eq!(err.kind(), "CRYPTO_ERROR");
    }

    #[test]
    fn backend_slot_io_error_maps_to_hardware_error_kind() {
        let err: DispatchError = BackendError::SlotIo("boom".into()).into();
        assert_eq!(err.kind(), "HARDWARE_ERROR");
    }
}
