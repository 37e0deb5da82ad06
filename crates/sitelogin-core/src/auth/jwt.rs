//! JWT payload decoding.
//!
//! Tokens reach us through a session the scraped login already authenticated,
//! so the signature is NOT verified here. Reusing this decoder on tokens from
//! an untrusted source requires adding signature verification first.

use base64::engine::general_purpose::URL_SAFE;
use base64::Engine;
use serde_json::{Map, Value};

use super::error::DecodeError;
use super::models::Claims;

/// Decode the claims in the middle segment of `token`.
pub fn decode(token: &str) -> Result<Claims, DecodeError> {
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return Err(DecodeError::SegmentCount(parts.len()));
    }

    let bytes = URL_SAFE
        .decode(pad_segment(parts[1]))
        .map_err(|e| DecodeError::Base64(e.to_string()))?;

    let value: Value =
        serde_json::from_slice(&bytes).map_err(|e| DecodeError::Payload(e.to_string()))?;
    let map = match value {
        Value::Object(map) => map,
        other => {
            return Err(DecodeError::Payload(format!(
                "expected an object, found {}",
                json_kind(&other)
            )))
        }
    };

    Ok(Claims {
        exp: numeric_claim(&map, "exp"),
        iat: numeric_claim(&map, "iat"),
        sub: string_claim(&map, "sub"),
        email: string_claim(&map, "email"),
    })
}

/// The `exp` claim, if the token decodes and carries one.
pub fn expiration(token: &str) -> Option<i64> {
    decode(token).ok().and_then(|claims| claims.exp)
}

/// True iff the token decodes, has an `exp`, and `exp` is strictly after `now`.
pub fn is_valid_at(token: &str, now: i64) -> bool {
    matches!(expiration(token), Some(exp) if exp > now)
}

/// `is_valid_at` against the current wall clock.
pub fn is_valid(token: &str) -> bool {
    is_valid_at(token, chrono::Utc::now().timestamp())
}

/// Pad an unpadded base64 segment with `=` to a multiple of 4.
fn pad_segment(segment: &str) -> String {
    let mut padded = segment.to_string();
    let rem = padded.len() % 4;
    if rem != 0 {
        padded.push_str(&"=".repeat(4 - rem));
    }
    padded
}

// NumericDate may legally be fractional.
fn numeric_claim(map: &Map<String, Value>, key: &str) -> Option<i64> {
    let value = map.get(key)?;
    value
        .as_i64()
        .or_else(|| value.as_f64().map(|f| f.floor() as i64))
}

fn string_claim(map: &Map<String, Value>, key: &str) -> Option<String> {
    map.get(key).and_then(Value::as_str).map(str::to_string)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Build an unsigned token carrying `claims`. Test helper for this crate and
/// for integration tests.
#[doc(hidden)]
pub fn encode_unsigned(claims: &Value) -> String {
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{}.{}.sig", header, payload)
}
