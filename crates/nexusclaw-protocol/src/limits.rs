//! Compile-time protocol limits (AVP v0.1.0 §6).

/// Maximum number of live secrets the index can hold.
pub const MAX_SECRETS: usize = 32;

/// Maximum length, in bytes, of a secret value.
pub const MAX_SECRET_SIZE: usize = 256;

/// Maximum length, in bytes, of a secret or key name.
pub const MAX_NAME_LEN: usize = 63;

/// Maximum length, in bytes, of one newline-terminated request line.
pub const MAX_JSON_LEN: usize = 1024;

/// Rendered length, in hex characters, of a session id.
pub const SESSION_ID_LEN: usize = 32;

/// Default session TTL, used when a request omits `requested_ttl`.
pub const DEFAULT_TTL: u64 = 300;

/// Lower clamp bound for session TTL.
pub const MIN_TTL: u64 = 60;

/// Upper clamp bound for session TTL.
pub const MAX_TTL: u64 = 3600;

/// Number of consecutive invalid PINs that locks authentication.
pub const MAX_PIN_ATTEMPTS: u32 = 5;

/// Clamp a requested TTL (or the default) into `[MIN_TTL, MAX_TTL]`.
#[must_use]
pub const fn clamp_ttl(requested: Option<u64>) -> u64 {
    let ttl = match requested {
        Some(t) => t,
        None => DEFAULT_TTL,
    };
    if ttl < MIN_TTL {
        MIN_TTL
    } else if ttl > MAX_TTL {
        MAX_TTL
    } else {
        ttl
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_below_minimum() {
        assert_eq!(clamp_ttl(Some(10)), MIN_TTL);
    }

    #[test]
    fn clamp_above_maximum() {
        assert_eq!(clamp_ttl(Some(999_999)), MAX_TTL);
    }

    #[test]
    fn missing_uses_default() {
        assert_eq!(clamp_ttl(None), DEFAULT_TTL);
    }

    #[test]
    fn in_range_passes_through() {
        assert_eq!(clamp_ttl(Some(120)), 120);
    }
}
