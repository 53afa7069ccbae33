//! Expiry evaluation from decoded claims

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use super::codec::Claims;

/// Expiration status computed once at capture time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpiryStatus {
    /// Whether the token had already expired when evaluated
    pub is_expired: bool,
    /// `exp` minus evaluation time, negative once expired
    pub expires_in_seconds: Option<i64>,
    /// Absolute expiry instant taken from `exp`
    pub expires_at: Option<DateTime<Utc>>,
}

/// Evaluates expiry against the current time
pub fn evaluate(claims: Option<&Claims>) -> ExpiryStatus {
    evaluate_at(claims, Utc::now())
}

/// Evaluates expiry against a fixed instant
///
/// Missing claims or a missing/non-numeric `exp` leave expiry undetermined,
/// which is reported as not expired.
pub fn evaluate_at(claims: Option<&Claims>, now: DateTime<Utc>) -> ExpiryStatus {
    let Some(exp) = claims.and_then(|c| c.get("exp")).and_then(exp_seconds) else {
        return ExpiryStatus::default();
    };

    let expires_in = exp.saturating_sub(now.timestamp());

    ExpiryStatus {
        is_expired: expires_in < 0,
        expires_in_seconds: Some(expires_in),
        expires_at: Utc.timestamp_opt(exp, 0).single(),
    }
}

// `exp` is NumericDate: integral seconds, but some issuers emit floats.
fn exp_seconds(value: &serde_json::Value) -> Option<i64> {
    value
        .as_i64()
        .or_else(|| value.as_f64().filter(|f| f.is_finite()).map(|f| f as i64))
}
