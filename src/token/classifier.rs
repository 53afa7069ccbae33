//! Token classification
//!
//! Maps a captured credential to a closed set of semantic categories using
//! its origin URL and decoded claims. The category only drives display
//! ordering; it is never used for access decisions.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::codec::Claims;

/// Identity provider hosts. A credential sent to any of these is an ID token.
pub const IDENTITY_HOSTS: [&str; 3] = [
    "id.uipath.com",
    "id-alpha.uipath.com",
    "id-staging.uipath.com",
];

/// `client_id` issued to the portal's PKCE flow
pub const PORTAL_PKCE_CLIENT_ID: &str = "73ba6224-d591-4a4f-b3ab-508e646f2932";

/// `client_id` of the user access flow
///
/// Placeholder: the real value differs per deployment and must be set here
/// before release, otherwise user access tokens classify as `Unknown`.
pub const USER_ACCESS_CLIENT_ID: &str = "1119a927-10ab-4543-bd1a-ad6bfbbc27f4";

/// Semantic category of a captured token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenCategory {
    /// Token presented to an identity provider
    IdToken,
    /// Access token minted for the portal PKCE client
    PortalPkceToken,
    /// Access token minted for the user access client
    UserAccessToken,
    /// Anything else
    Unknown,
}

impl fmt::Display for TokenCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenCategory::IdToken => write!(f, "id_token"),
            TokenCategory::PortalPkceToken => write!(f, "portal_pkce_token"),
            TokenCategory::UserAccessToken => write!(f, "user_access_token"),
            TokenCategory::Unknown => write!(f, "unknown"),
        }
    }
}

/// Classifies a credential by where it was sent and what it claims
///
/// Rules are evaluated in order and the first match wins:
/// 1. the source URL contains an identity host
/// 2. the `client_id` claim equals a known client
/// 3. otherwise `Unknown`
pub fn classify(source_url: &str, claims: Option<&Claims>) -> TokenCategory {
    if IDENTITY_HOSTS.iter().any(|host| source_url.contains(host)) {
        return TokenCategory::IdToken;
    }

    let client_id = claims
        .and_then(|c| c.get("client_id"))
        .and_then(|v| v.as_str());

    match client_id {
        Some(PORTAL_PKCE_CLIENT_ID) => TokenCategory::PortalPkceToken,
        Some(USER_ACCESS_CLIENT_ID) => TokenCategory::UserAccessToken,
        _ => TokenCategory::Unknown,
    }
}
