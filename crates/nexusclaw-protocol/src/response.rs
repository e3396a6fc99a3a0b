//! Tagged response variant and its projection to canonical JSON
//! (AVP v0.1.0 §4.1, §6).

use serde::Serialize;

/// One secret's metadata as rendered by `LIST` (AVP v0.1.0 §6).
#[derive(Debug, Clone, Serialize)]
pub struct SecretSummary {
    pub name: String,
    pub created_at: u64,
    pub updated_at: u64,
}

/// Static capability descriptor returned by `DISCOVER`.
#[derive(Debug, Clone, Serialize)]
pub struct Capabilities {
    pub hw_sign: bool,
    pub hw_attest: bool,
    pub max_secrets: usize,
    pub max_secret_size: usize,
}

/// The fixed capability descriptor every device reports (AVP v0.1.0 §6).
pub const CAPABILITIES: Capabilities = Capabilities {
    hw_sign: true,
    hw_attest: true,
    max_secrets: crate::limits::MAX_SECRETS,
    max_secret_size: crate::limits::MAX_SECRET_SIZE,
};

/// A successfully dispatched operation's opcode-specific payload.
///
/// Variant names match their opcode; the encoder flattens whichever
/// variant is present into `{"ok":true,...}` with a fixed field order.
#[derive(Debug, Clone)]
pub enum Response {
    Discover {
        version: &'static str,
        backend_type: &'static str,
        manufacturer: &'static str,
        model: String,
        serial: String,
        capabilities: Capabilities,
    },
    Authenticate {
        session_id: String,
        expires_in: u64,
        workspace: String,
    },
    Store,
    Retrieve {
        value: String,
    },
    Delete,
    List {
        secrets: Vec<SecretSummary>,
    },
    HwChallenge {
        verified: bool,
        model: String,
        serial: String,
    },
    HwSign {
        signature: String,
    },
    HwAttest {
        attestation: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capabilities_match_fixed_descriptor() {
        assert!(CAPABILITIES.hw_sign);
        assert!(CAPABILITIES.hw_attest);
        assert_eq!(CAPABILITIES.max_secrets, 32);
        assert_eq!(CAPABILITIES.max_secret_size, 256);
    }
}
