//! Token module - Decoding, classification and expiry of bearer credentials
//!
//! All functions here are pure: no state, no I/O, no errors surfaced to
//! callers.

mod classifier;
mod codec;
mod expiry;

pub use classifier::{
    classify, TokenCategory, IDENTITY_HOSTS, PORTAL_PKCE_CLIENT_ID, USER_ACCESS_CLIENT_ID,
};
pub use codec::{decode_claims, Claims};
pub use expiry::{evaluate, evaluate_at, ExpiryStatus};
