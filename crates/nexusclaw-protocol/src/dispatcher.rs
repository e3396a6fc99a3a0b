//! Dispatcher (AVP v0.1.0 §4.4): decode → verify precondition → execute →
//! encode. The dispatcher is the sole authority for session-precondition
//! enforcement; handlers assume preconditions already hold.

use data_encoding::HEXLOWER;
use nexusclaw_backend::Backend;

use crate::codec::{decode_request, encode_response};
use crate::command::{Command, Opcode};
use crate::error::DispatchError;
use crate::limits::MAX_SECRET_SIZE;
use crate::response::{Response, CAPABILITIES};
use crate::secret_index::SecretIndex;
use crate::session::SessionManager;

const HW_CHALLENGE_LEN: usize = 32;
const ATTESTATION_KEY_SLOT: u8 = 0;

/// The single owned aggregate driving one device's protocol state:
/// session manager, secret index, and the backend they both act through.
///
/// Not `Sync` by design — AVP v0.1.0 §5 requires a linearizable sequence of
/// operations; a multi-threaded host must serialize calls into
/// [`Dispatcher::handle_line`] behind one mutex rather than share this
/// type across threads without one.
pub struct Dispatcher<B: Backend> {
    backend: B,
    sessions: SessionManager,
    secrets: SecretIndex,
}

impl<B: Backend> Dispatcher<B> {
    /// Build a dispatcher over `backend`, with no active session and an
    /// empty secret index.
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            sessions: SessionManager::new(),
            secrets: SecretIndex::new(),
        }
    }

    /// Decode, dispatch, and encode one request line. Never panics on
    /// malformed input — every failure path produces a canonical failure
    /// response line instead.
    #[must_use]
    pub fn handle_line(&mut self, line: &str) -> String {
        let result = decode_request(line).and_then(|cmd| self.dispatch(cmd));
        encode_response(&result)
    }

    fn dispatch(&mut self, cmd: Command) -> Result<Response, DispatchError> {
        let op = cmd.op.expect("decode_request always sets op on success");

        if op.requires_session() {
            self.check_session()?;
        }

        match op {
            Opcode::Discover => self.handle_discover(),
            Opcode::Authenticate => self.handle_authenticate(&cmd),
            Opcode::Store | Opcode::Rotate => self.handle_store(&cmd),
            Opcode::Retrieve => self.handle_retrieve(&cmd),
            Opcode::Delete => self.handle_delete(&cmd),
            Opcode::List => Ok(self.handle_list()),
            Opcode::HwChallenge => self.handle_hw_challenge(),
            Opcode::HwSign => self.handle_hw_sign(&cmd),
            Opcode::HwAttest => self.handle_hw_attest(),
        }
    }

    /// Map "no live session" onto the two distinct wire codes required by
    /// AVP v0.1.0 §4.4: `SESSION_EXPIRED` if one existed and lapsed,
    /// `NOT_AUTHENTICATED` if none was ever established.
    fn check_session(&mut self) -> Result<(), DispatchError> {
        let now = self.backend.now_seconds();
        let had_session = self.sessions.has_session();
        if self.sessions.is_valid(now) {
            Ok(())
        } else if had_session {
            Err(DispatchError::SessionExpired)
        } else {
            Err(DispatchError::NotAuthenticated)
        }
    }

    fn handle_discover(&self) -> Result<Response, DispatchError> {
        let info = self.backend.device_info();
        Ok(Response::Discover {
            version: "0.1.0",
            backend_type: "hardware",
            manufacturer: "AVP Protocol",
            model: info.model,
            serial: info.serial,
            capabilities: CAPABILITIES,
        })
    }

    fn handle_authenticate(&mut self, cmd: &Command) -> Result<Response, DispatchError> {
        if cmd.auth_method.as_deref() != Some("pin") {
            return Err(DispatchError::InvalidParameter(
                "`auth_method` must be \"pin\"".into(),
            ));
        }
        let pin = cmd
            .pin
            .as_deref()
            .ok_or_else(|| DispatchError::InvalidParameter("`pin` is required".into()))?;

        let descriptor = self.sessions.authenticate(
            &self.backend,
            pin,
            cmd.workspace.clone(),
            cmd.requested_ttl,
        )?;
        Ok(Response::Authenticate {
            session_id: descriptor.id,
            expires_in: descriptor.expires_in,
            workspace: descriptor.workspace,
        })
    }

    fn handle_store(&mut self, cmd: &Command) -> Result<Response, DispatchError> {
        let name = require_field(&cmd.name, "name")?;
        let value = require_field(&cmd.value, "value")?;
        if value.len() > MAX_SECRET_SIZE {
            return Err(DispatchError::InvalidParameter(format!(
                "`value` exceeds {MAX_SECRET_SIZE} bytes"
            )));
        }
        self.secrets.put(&self.backend, name, value.as_bytes())?;
        Ok(Response::Store)
    }

    fn handle_retrieve(&self, cmd: &Command) -> Result<Response, DispatchError> {
        let name = require_field(&cmd.name, "name")?;
        let bytes = self.secrets.get(&self.backend, name)?;
        let value = String::from_utf8(bytes)
            .map_err(|_| DispatchError::InternalError)?;
        Ok(Response::Retrieve { value })
    }

    fn handle_delete(&mut self, cmd: &Command) -> Result<Response, DispatchError> {
        let name = require_field(&cmd.name, "name")?;
        self.secrets.remove(&self.backend, name)?;
        Ok(Response::Delete)
    }

    fn handle_list(&self) -> Response {
        Response::List {
            secrets: self.secrets.list(),
        }
    }

    fn handle_hw_challenge(&self) -> Result<Response, DispatchError> {
        let info = self.backend.device_info();
        Ok(Response::HwChallenge {
            verified: true,
            model: info.model,
            serial: info.serial,
        })
    }

    fn handle_hw_sign(&self, cmd: &Command) -> Result<Response, DispatchError> {
        let key_name = require_field(&cmd.key_name, "key_name")?;
        let data = cmd
            .data
            .as_ref()
            .ok_or_else(|| DispatchError::InvalidParameter("`data` is required".into()))?;
        let key_slot = key_slot_for(key_name);
        let signature = self.backend.sign(key_slot, data)?;
        Ok(Response::HwSign {
            signature: HEXLOWER.encode(&signature),
        })
    }

    fn handle_hw_attest(&self) -> Result<Response, DispatchError> {
        let challenge = self.backend.random(HW_CHALLENGE_LEN)?;
        let signature = self.backend.attest(&challenge)?;
        Ok(Response::HwAttest {
            attestation: HEXLOWER.encode(&signature),
        })
    }
}

fn require_field<'a>(field: &'a Option<String>, name: &str) -> Result<&'a str, DispatchError> {
    field
        .as_deref()
        .ok_or_else(|| DispatchError::InvalidParameter(format!("`{name}` is required")))
}

/// Deterministically map a `key_name` onto a key slot (AVP v0.1.0's
/// `key_slot(key_name)`). Every name below the attestation slot is
/// reserved; ordinary signing keys live at slot 1 and above.
#[allow(clippy::arithmetic_side_effects)] // bounded by a fixed-size range, never overflows
fn key_slot_for(key_name: &str) -> u8 {
    const USABLE_KEY_SLOTS: u8 = 31; // KEY_SLOT_RANGE minus the reserved attestation slot
    let digest = blake3::hash(key_name.as_bytes());
    let raw = digest.as_bytes()[0] % USABLE_KEY_SLOTS;
    ATTESTATION_KEY_SLOT + 1 + raw
}

#[cfg(test)]
mod tests {
    use super::*;
    use nexusclaw_backend::InMemoryBackend;

    fn dispatcher() -> Dispatcher<InMemoryBackend> {
        Dispatcher::new(InMemoryBackend::new_seeded(1, 0, "123456"))
    }

    fn authenticate(d: &mut Dispatcher<InMemoryBackend>) -> String {
        let resp = d.handle_line(r#"{"op":"AUTHENTICATE","auth_method":"pin","pin":"123456","requested_ttl":300}"#);
        let value: serde_json::Value = serde_json::from_str(&resp).unwrap();
        value["session_id"].as_str().unwrap().to_string()
    }

    #[test]
    fn discover_requires_no_session() {
        let mut d = dispatcher();
        let resp = d.handle_line(r#"{"op":"DISCOVER"}"#);
        assert!(resp.contains(r#""ok":true"#));
        assert!(resp.contains(r#""version":"0.1.0""#));
        assert!(resp.contains(r#""max_secrets":32"#));
    }

    #[test]
    fn store_without_session_is_not_authenticated() {
        let mut d = dispatcher();
        let resp = d.handle_line(r#"{"op":"STORE","name":"k","value":"v"}"#);
        assert!(resp.contains(r#""error":"NOT_AUTHENTICATED""#));
    }

    #[test]
    fn store_then_retrieve_round_trips_the_value() {
        let mut d = dispatcher();
        let id = authenticate(&mut d);
        let store = d.handle_line(&format!(
            r#"{{"op":"STORE","session_id":"{id}","name":"anthropic","value":"sk-ant-abc"}}"#
        ));
        assert_eq!(store, r#"{"ok":true}"#);
        let retrieve = d.handle_line(&format!(
            r#"{{"op":"RETRIEVE","session_id":"{id}","name":"anthropic"}}"#
        ));
        assert_eq!(retrieve, r#"{"ok":true,"value":"sk-ant-abc"}"#);
    }

    #[test]
    fn store_past_capacity_is_rejected() {
        let mut d = dispatcher();
        let id = authenticate(&mut d);
        for i in 0..32 {
            let resp = d.handle_line(&format!(
                r#"{{"op":"STORE","session_id":"{id}","name":"k{i}","value":"v"}}"#
            ));
            assert_eq!(resp, r#"{"ok":true}"#);
        }
        let resp = d.handle_line(&format!(
            r#"{{"op":"STORE","session_id":"{id}","name":"overflow","value":"v"}}"#
        ));
        assert!(resp.contains(r#""error":"CAPACITY_EXCEEDED""#));
        let list = d.handle_line(&format!(r#"{{"op":"LIST","session_id":"{id}"}}"#));
        assert_eq!(list.matches(r#""name":"#).count(), 32);
    }

    #[test]
    fn session_past_ttl_is_expired() {
        let backend = InMemoryBackend::new_seeded(1, 0, "123456");
        let mut d = Dispatcher::new(backend);
        let resp = d.handle_line(r#"{"op":"AUTHENTICATE","auth_method":"pin","pin":"123456","requested_ttl":60}"#);
        let value: serde_json::Value = serde_json::from_str(&resp).unwrap();
        let id = value["session_id"].as_str().unwrap();
        d.backend.advance_seconds(61);
        let resp = d.handle_line(&format!(r#"{{"op":"LIST","session_id":"{id}"}}"#));
        assert!(resp.contains(r#""error":"SESSION_EXPIRED""#));
    }

    #[test]
    fn five_wrong_pins_lock_out_the_correct_one() {
        let mut d = dispatcher();
        for _ in 0..5 {
            let resp = d.handle_line(r#"{"op":"AUTHENTICATE","auth_method":"pin","pin":"1"}"#);
            assert!(resp.contains(r#""error":"PIN_INVALID""#));
        }
        let resp = d.handle_line(r#"{"op":"AUTHENTICATE","auth_method":"pin","pin":"123456"}"#);
        assert!(resp.contains(r#""error":"PIN_LOCKED""#));
    }

    #[test]
    fn delete_is_idempotent_from_outside() {
        let mut d = dispatcher();
        let id = authenticate(&mut d);
        d.handle_line(&format!(r#"{{"op":"STORE","session_id":"{id}","name":"k","value":"v"}}"#));
        let first = d.handle_line(&format!(r#"{{"op":"DELETE","session_id":"{id}","name":"k"}}"#));
        assert_eq!(first, r#"{"ok":true}"#);
        let second = d.handle_line(&format!(r#"{{"op":"DELETE","session_id":"{id}","name":"k"}}"#));
        assert!(second.contains(r#""error":"SECRET_NOT_FOUND""#));
    }

    #[test]
    fn session_id_is_advisory_only() {
        let mut d = dispatcher();
        let _real_id = authenticate(&mut d);
        let resp = d.handle_line(r#"{"op":"LIST","session_id":"not-the-real-id"}"#);
        assert!(resp.contains(r#""ok":true"#));
    }

    #[test]
    fn hw_challenge_needs_no_session() {
        let mut d = dispatcher();
        let resp = d.handle_line(r#"{"op":"HW_CHALLENGE"}"#);
        assert!(resp.contains(r#""verified":true"#));
    }

    #[test]
    fn hw_sign_and_attest_round_trip_hex() {
        let mut d = dispatcher();
        let id = authenticate(&mut d);
        let sign = d.handle_line(&format!(
            r#"{{"op":"HW_SIGN","session_id":"{id}","key_name":"k","data":"aabbcc"}}"#
        ));
        assert!(sign.contains(r#""signature":""#));
        let attest = d.handle_line(&format!(r#"{{"op":"HW_ATTEST","session_id":"{id}"}}"#));
        assert!(attest.contains(r#""attestation":""#));
    }

    #[test]
    fn unknown_opcode_never_mutates_state() {
        let mut d = dispatcher();
        let before = d.secrets.len();
        let resp = d.handle_line(r#"{"op":"FROB"}"#);
        assert!(resp.contains(r#""error":"INVALID_OPERATION""#));
        assert_eq!(d.secrets.len(), before);
    }
}
