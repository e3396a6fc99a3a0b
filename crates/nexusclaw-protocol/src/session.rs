//! Session manager (AVP v0.1.0 §4.2): at most one active session, TTL-bounded,
//! with a PIN-attempt counter that survives across authentication attempts.

use data_encoding::HEXLOWER;
use nexusclaw_backend::{Backend, PinOutcome};
use zeroize::Zeroize;

use crate::error::DispatchError;
use crate::limits::{clamp_ttl, MAX_PIN_ATTEMPTS};

const SESSION_ID_BYTES: usize = 16;
const DEFAULT_WORKSPACE: &str = "default";

/// Fields returned to the host on a successful `AUTHENTICATE`.
#[derive(Debug, Clone)]
pub struct SessionDescriptor {
    pub id: String,
    pub expires_in: u64,
    pub workspace: String,
}

#[derive(Debug, Clone)]
struct Session {
    id: String,
    workspace: String,
    created_at: u64,
    ttl: u64,
}

/// Tracks at most one active session plus a PIN-attempt counter that
/// outlives any individual session (AVP v0.1.0 §3).
#[derive(Debug, Default)]
pub struct SessionManager {
    session: Option<Session>,
    pin_attempts: u32,
}

impl SessionManager {
    /// Construct a manager with no active session and a zeroed attempt
    /// counter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Run the PIN-verification and session-creation sequence
    /// (AVP v0.1.0 §4.2).
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::PinLocked`] if the attempt ceiling has
    /// already been reached, [`DispatchError::PinInvalid`] on a wrong PIN,
    /// or a backend-derived error if the RNG or PIN check itself fails.
    pub fn authenticate(
        &mut self,
        backend: &impl Backend,
        pin: &str,
        workspace: Option<String>,
        requested_ttl: Option<u64>,
    ) -> Result<SessionDescriptor, DispatchError> {
        if self.pin_attempts >= MAX_PIN_ATTEMPTS {
            return Err(DispatchError::PinLocked);
        }

        match backend.pin_verify(pin)? {
            PinOutcome::Invalid => {
                self.pin_attempts = self.pin_attempts.saturating_add(1);
                return Err(DispatchError::PinInvalid);
            }
            PinOutcome::Locked => {
                self.pin_attempts = MAX_PIN_ATTEMPTS;
                return Err(DispatchError::PinLocked);
            }
            PinOutcome::Ok => {
                self.pin_attempts = 0;
            }
        }

        let mut raw_id = backend.random(SESSION_ID_BYTES)?;
        let id = HEXLOWER.encode(&raw_id);
        raw_id.zeroize();

        let workspace = workspace.unwrap_or_else(|| DEFAULT_WORKSPACE.to_string());
        let ttl = clamp_ttl(requested_ttl);
        let created_at = backend.now_seconds();

        self.session = Some(Session {
            id: id.clone(),
            workspace: workspace.clone(),
            created_at,
            ttl,
        });

        Ok(SessionDescriptor {
            id,
            expires_in: ttl,
            workspace,
        })
    }

    /// Whether a session is currently live at `now`.
    ///
    /// The first observation of expiry drops the session so a later call
    /// reports `false` without needing to recompute the comparison.
    pub fn is_valid(&mut self, now: u64) -> bool {
        let Some(session) = &self.session else {
            return false;
        };
        if now < session.created_at.saturating_add(session.ttl) {
            true
        } else {
            self.session = None;
            false
        }
    }

    /// Whether a session exists at all, independent of liveness — used to
    /// distinguish `NOT_AUTHENTICATED` (never authenticated) from
    /// `SESSION_EXPIRED` (was live, is not anymore).
    #[must_use]
    pub const fn has_session(&self) -> bool {
        self.session.is_some()
    }

    /// Invalidate the current session unconditionally. `pin_attempts` is
    /// left untouched (AVP v0.1.0 §4.2).
    pub fn invalidate(&mut self) {
        self.session = None;
    }

    /// Current PIN-attempt counter, for diagnostics and tests.
    #[must_use]
    pub const fn pin_attempts(&self) -> u32 {
        self.pin_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nexusclaw_backend::InMemoryBackend;

    #[test]
    fn happy_path_authenticate() {
        let backend = InMemoryBackend::new_seeded(1, 0, "123456");
        let mut mgr = SessionManager::new();
        let desc = mgr.authenticate(&backend, "123456", None, Some(300)).unwrap();
        assert_eq!(desc.id.len(), 32);
        assert_eq!(desc.expires_in, 300);
        assert_eq!(desc.workspace, "default");
        assert!(mgr.is_valid(0));
    }

    #[test]
    fn wrong_pin_increments_attempts_and_returns_pin_invalid() {
        let backend = InMemoryBackend::new_seeded(1, 0, "123456");
        let mut mgr = SessionManager::new();
        let err = mgr.authenticate(&backend, "000000", None, None).unwrap_err();
        assert_eq!(err.kind(), "PIN_INVALID");
        assert_eq!(mgr.pin_attempts(), 1);
    }

    #[test]
    fn five_failures_lock_out_subsequent_attempts() {
        let backend = InMemoryBackend::new_seeded(1, 0, "123456");
        let mut mgr = SessionManager::new();
        for _ in 0..5 {
            let _ = mgr.authenticate(&backend, "1", None, None);
        }
        let err = mgr.authenticate(&backend, "123456", None, None).unwrap_err();
        assert_eq!(err.kind(), "PIN_LOCKED");
    }

    #[test]
    fn expiry_is_observed_on_is_valid() {
        let backend = InMemoryBackend::new_seeded(1, 0, "123456");
        let mut mgr = SessionManager::new();
        mgr.authenticate(&backend, "123456", None, Some(60)).unwrap();
        assert!(mgr.is_valid(59));
        assert!(!mgr.is_valid(61));
        assert!(!mgr.has_session());
    }

    #[test]
    fn ttl_is_clamped() {
        let backend = InMemoryBackend::new_seeded(1, 0, "123456");
        let mut mgr = SessionManager::new();
        let desc = mgr.authenticate(&backend, "123456", None, Some(5)).unwrap();
        assert_eq!(desc.expires_in, 60);
    }

    #[test]
    fn invalidate_clears_session_but_not_attempts() {
        let backend = InMemoryBackend::new_seeded(1, 0, "123456");
        let mut mgr = SessionManager::new();
        let _ = mgr.authenticate(&backend, "000000", None, None);
        mgr.authenticate(&backend, "123456", None, None).unwrap();
        mgr.invalidate();
        assert!(!mgr.has_session());
        assert_eq!(mgr.pin_attempts(), 0);
    }
}
