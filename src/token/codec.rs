//! Token codec - best-effort decoding of a bearer credential's claims
//!
//! Bearer credentials are frequently, but not always, three-part
//! `header.payload.signature` structures. Only the payload is decoded here
//! and the signature is never checked. Anything that doesn't look like a
//! structured token simply yields no claims.

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;
use serde_json::{Map, Value};

/// Decoded claims payload (claim name to value)
pub type Claims = Map<String, Value>;

/// Standard alphabet, tolerant of missing or present padding.
///
/// Payloads arrive in the URL-safe alphabet without padding; the characters
/// are mapped back to the standard alphabet before decoding.
const PAYLOAD_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Attempts to decode the claims payload of a raw bearer credential
///
/// Returns `None` when the credential doesn't have exactly three
/// dot-separated parts, when the middle part isn't valid base64 after the
/// URL-safe substitution is reversed, or when it doesn't decode to a JSON
/// object. Never panics.
///
/// # Examples
///
/// ```
/// use token_extractor_lib::token::decode_claims;
///
/// // {"sub":"42"}
/// let claims = decode_claims("eyJhbGciOiJub25lIn0.eyJzdWIiOiI0MiJ9.sig").unwrap();
/// assert_eq!(claims["sub"], "42");
///
/// assert!(decode_claims("opaque-token").is_none());
/// ```
pub fn decode_claims(raw: &str) -> Option<Claims> {
    let parts: Vec<&str> = raw.split('.').collect();
    if parts.len() != 3 {
        return None;
    }

    let payload: String = parts[1]
        .chars()
        .map(|c| match c {
            '-' => '+',
            '_' => '/',
            other => other,
        })
        .collect();

    let bytes = PAYLOAD_ENGINE.decode(payload.as_bytes()).ok()?;

    match serde_json::from_slice::<Value>(&bytes).ok()? {
        Value::Object(claims) => Some(claims),
        _ => None,
    }
}
