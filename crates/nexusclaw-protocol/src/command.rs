//! Decoded request representation: [`Opcode`] and [`Command`].

use std::fmt;

use zeroize::Zeroize;

/// The closed set of operations the dispatcher recognizes (AVP v0.1.0 §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    Discover,
    Authenticate,
    Store,
    Retrieve,
    Delete,
    List,
    Rotate,
    HwChallenge,
    HwSign,
    HwAttest,
}

impl Opcode {
    /// Parse the wire spelling of an opcode (e.g. `"STORE"`).
    #[must_use]
    pub fn from_wire(s: &str) -> Option<Self> {
        Some(match s {
            "DISCOVER" => Self::Discover,
            "AUTHENTICATE" => Self::Authenticate,
            "STORE" => Self::Store,
            "RETRIEVE" => Self::Retrieve,
            "DELETE" => Self::Delete,
            "LIST" => Self::List,
            "ROTATE" => Self::Rotate,
            "HW_CHALLENGE" => Self::HwChallenge,
            "HW_SIGN" => Self::HwSign,
            "HW_ATTEST" => Self::HwAttest,
            _ => return None,
        })
    }

    /// Whether this operation requires a live session (AVP v0.1.0 §4.4).
    #[must_use]
    pub const fn requires_session(self) -> bool {
        !matches!(self, Self::Discover | Self::Authenticate | Self::HwChallenge)
    }
}

/// A decoded request: an opcode plus the subset of fields relevant to it.
///
/// Every field is optional at this layer — per-operation requiredness is
/// enforced by the handler, not the decoder (AVP v0.1.0 §4.1).
///
/// `pin` and `value` may carry credential or secret material off the wire.
/// Neither is ever printed in full (see the masked [`fmt::Debug`] impl
/// below) and both are zeroized when the command is dropped, once dispatch
/// has finished with it — the same zeroize-on-drop discipline
/// `nexusclaw-backend` applies to key material. `Command` is deliberately
/// not `Clone`: cloning it would leave a second, un-zeroized copy of
/// whatever secret it carries.
#[derive(Default)]
pub struct Command {
    pub op: Option<Opcode>,
    pub session_id: Option<String>,
    pub workspace: Option<String>,
    pub name: Option<String>,
    pub value: Option<String>,
    pub auth_method: Option<String>,
    pub pin: Option<String>,
    pub requested_ttl: Option<u64>,
    pub key_name: Option<String>,
    pub data: Option<Vec<u8>>,
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("op", &self.op)
            .field("session_id", &self.session_id)
            .field("workspace", &self.workspace)
            .field("name", &self.name)
            .field("value", &self.value.as_ref().map(|_| "***"))
            .field("auth_method", &self.auth_method)
            .field("pin", &self.pin.as_ref().map(|_| "***"))
            .field("requested_ttl", &self.requested_ttl)
            .field("key_name", &self.key_name)
            .field("data", &self.data.as_ref().map(|d| format!("{} bytes", d.len())))
            .finish()
    }
}

impl Drop for Command {
    fn drop(&mut self) {
        if let Some(pin) = self.pin.as_mut() {
            pin.zeroize();
        }
        if let Some(value) = self.value.as_mut() {
            value.zeroize();
        }
    }
}
