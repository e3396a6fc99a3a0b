//! JSON codec: a tolerant decoder and a strict, byte-stable encoder
//! (AVP v0.1.0 §4.1).
//!
//! The decoder extracts only the fields a [`Command`](crate::command::Command)
//! carries and ignores everything else; the encoder hand-writes each
//! response shape with a fixed field order rather than going through a
//! generic serializer, so wire output is stable across runs.

use std::fmt::Write as _;

use data_encoding::HEXLOWER;
use serde_json::Value;

use crate::command::{Command, Opcode};
use crate::error::DispatchError;
use crate::limits::{MAX_JSON_LEN, MAX_NAME_LEN, MAX_SECRET_SIZE};
use crate::response::Response;

const MAX_SESSION_ID_FIELD_LEN: usize = 32;
const MAX_WORKSPACE_LEN: usize = 63;
const MAX_VALUE_LEN: usize = 511;

/// Decode one newline-terminated request line into a [`Command`].
///
/// # Errors
///
/// Returns [`DispatchError::ParseError`] if `line` is not a JSON object or
/// `op` is missing/non-string, [`DispatchError::InvalidOperation`] if `op`
/// names something outside the closed opcode set, and
/// [`DispatchError::InvalidParameter`] if a recognized field is malformed
/// or exceeds its size bound.
pub fn decode_request(line: &str) -> Result<Command, DispatchError> {
    let trimmed = line.trim_start();
    if trimmed.len() > MAX_JSON_LEN {
        return Err(DispatchError::InvalidParameter(format!(
            "request exceeds {MAX_JSON_LEN} bytes"
        )));
    }

    let value: Value =
        serde_json::from_str(trimmed).map_err(|e| DispatchError::ParseError(e.to_string()))?;
    let object = value
        .as_object()
        .ok_or_else(|| DispatchError::ParseError("request is not a JSON object".to_string()))?;

    let op_str = object
        .get("op")
        .and_then(Value::as_str)
        .ok_or_else(|| DispatchError::ParseError("missing or non-string `op`".to_string()))?;
    let op = Opcode::from_wire(op_str)
        .ok_or_else(|| DispatchError::InvalidOperation(op_str.to_string()))?;

    let session_id = string_field(object, "session_id", MAX_SESSION_ID_FIELD_LEN)?;
    let workspace = string_field(object, "workspace", MAX_WORKSPACE_LEN)?;
    let name = string_field(object, "name", MAX_NAME_LEN)?;
    let value_field = string_field(object, "value", MAX_VALUE_LEN)?;
    let auth_method = string_field(object, "auth_method", MAX_WORKSPACE_LEN)?;
    let key_name = string_field(object, "key_name", MAX_NAME_LEN)?;

    // `pin` is intentionally unbounded here: an undersized PIN (e.g. "1")
    // is a semantic mismatch the backend reports as PIN_INVALID, not a
    // decode-time INVALID_PARAMETER.
    let pin = match object.get("pin") {
        None => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(_) => return Err(DispatchError::InvalidParameter("`pin` must be a string".into())),
    };

    let requested_ttl = object
        .get("requested_ttl")
        .or_else(|| object.get("ttl"))
        .map(|v| {
            v.as_u64()
                .ok_or_else(|| DispatchError::InvalidParameter("`requested_ttl` must be an unsigned integer".into()))
        })
        .transpose()?;

    let data = match object.get("data") {
        None => None,
        Some(Value::String(s)) => Some(decode_hex_data(s)?),
        Some(_) => return Err(DispatchError::InvalidParameter("`data` must be a string".into())),
    };

    Ok(Command {
        op: Some(op),
        session_id,
        workspace,
        name,
        value: value_field,
        auth_method,
        pin,
        requested_ttl,
        key_name,
        data,
    })
}

fn string_field(
    object: &serde_json::Map<String, Value>,
    key: &str,
    max_len: usize,
) -> Result<Option<String>, DispatchError> {
    match object.get(key) {
        None => Ok(None),
        Some(Value::String(s)) => {
            if s.len() > max_len {
                Err(DispatchError::InvalidParameter(format!(
                    "`{key}` exceeds {max_len} bytes"
                )))
            } else {
                Ok(Some(s.clone()))
            }
        }
        Some(_) => Err(DispatchError::InvalidParameter(format!("`{key}` must be a string"))),
    }
}

fn decode_hex_data(s: &str) -> Result<Vec<u8>, DispatchError> {
    if s.len() % 2 != 0 || !s.bytes().all(|b| b.is_ascii_hexdigit() && !b.is_ascii_uppercase()) {
        return Err(DispatchError::InvalidParameter(
            "`data` must be lowercase, even-length hex".into(),
        ));
    }
    let bytes = HEXLOWER
        .decode(s.as_bytes())
        .map_err(|_| DispatchError::InvalidParameter("`data` is not valid hex".into()))?;
    if bytes.len() > MAX_SECRET_SIZE {
        return Err(DispatchError::InvalidParameter(format!(
            "`data` decodes to more than {MAX_SECRET_SIZE} bytes"
        )));
    }
    Ok(bytes)
}

/// Encode the dispatcher's outcome into one canonical JSON response line
/// (no trailing newline).
///
/// Encoding itself cannot fail on a well-formed [`Response`]; the
/// `INTERNAL_ERROR` collapse described in AVP v0.1.0 §4.1 is only reachable
/// if `write!` to a `String` fails, which does not happen in practice, so
/// this function is infallible by construction.
#[must_use]
pub fn encode_response(result: &Result<Response, DispatchError>) -> String {
    let mut out = String::new();
    match result {
        Ok(response) => encode_success(&mut out, response),
        Err(err) => encode_failure(&mut out, err),
    }
    out
}

fn encode_failure(out: &mut String, err: &DispatchError) {
    out.clear();
    let _ = write!(
        out,
        r#"{{"ok":false,"error":"{}","message":{}}}"#,
        err.kind(),
        json_string(&err.to_string())
    );
}

fn encode_success(out: &mut String, response: &Response) {
    match response {
        Response::Discover {
            version,
            backend_type,
            manufacturer,
            model,
            serial,
            capabilities,
        } => {
            let _ = write!(
                out,
                r#"{{"ok":true,"version":"{version}","backend_type":"{backend_type}","manufacturer":"{manufacturer}","model":{model},"serial":{serial},"capabilities":{{"hw_sign":{hw_sign},"hw_attest":{hw_attest},"max_secrets":{max_secrets},"max_secret_size":{max_secret_size}}}}}"#,
                model = json_string(model),
                serial = json_string(serial),
                hw_sign = capabilities.hw_sign,
                hw_attest = capabilities.hw_attest,
                max_secrets = capabilities.max_secrets,
                max_secret_size = capabilities.max_secret_size,
            );
        }
        Response::Authenticate {
            session_id,
            expires_in,
            workspace,
        } => {
            let _ = write!(
                out,
                r#"{{"ok":true,"session_id":{session_id},"expires_in":{expires_in},"workspace":{workspace}}}"#,
                session_id = json_string(session_id),
                workspace = json_string(workspace),
            );
        }
        Response::Store | Response::Delete => {
            out.push_str(r#"{"ok":true}"#);
        }
        Response::Retrieve { value } => {
            let _ = write!(out, r#"{{"ok":true,"value":{}}}"#, json_string(value));
        }
        Response::List { secrets } => {
            out.push_str(r#"{"ok":true,"secrets":["#);
            for (i, s) in secrets.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                let _ = write!(
                    out,
                    r#"{{"name":{name},"created_at":{created_at},"updated_at":{updated_at}}}"#,
                    name = json_string(&s.name),
                    created_at = s.created_at,
                    updated_at = s.updated_at,
                );
            }
            out.push_str("]}");
        }
        Response::HwChallenge { verified, model, serial } => {
            let _ = write!(
                out,
                r#"{{"ok":true,"verified":{verified},"model":{model},"serial":{serial}}}"#,
                model = json_string(model),
                serial = json_string(serial),
            );
        }
        Response::HwSign { signature } => {
            let _ = write!(out, r#"{{"ok":true,"signature":{}}}"#, json_string(signature));
        }
        Response::HwAttest { attestation } => {
            let _ = write!(out, r#"{{"ok":true,"attestation":{}}}"#, json_string(attestation));
        }
    }
}

/// Render `s` as a JSON string literal (quotes included), reusing
/// `serde_json`'s escaping rather than hand-rolling it.
fn json_string(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| "\"\"".to_string())
}
