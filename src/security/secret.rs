//! Zeroizing holder for captured credential values
//!
//! Captured tokens live only as long as their tab session. When a session is
//! destroyed the raw values are wiped from memory rather than left for the
//! allocator.

use std::borrow::Borrow;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Deref;

use serde::{Serialize, Serializer};
use zeroize::Zeroize;

/// A raw token value that zeroes its memory when dropped
///
/// `Debug` is redacted so a token can't leak through `{:?}` in logs.
/// `Serialize` writes the real value because the control interface must hand
/// it to the display surface.
///
/// # Example
///
/// ```
/// use token_extractor_lib::security::TokenSecret;
///
/// let secret = TokenSecret::from("eyJhbGciOi.payload.sig");
/// assert_eq!(secret.expose(), "eyJhbGciOi.payload.sig");
/// assert!(!format!("{:?}", secret).contains("payload"));
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct TokenSecret {
    inner: String,
}

impl TokenSecret {
    /// Wraps an owned value without copying it
    pub fn new(value: String) -> Self {
        Self { inner: value }
    }

    /// Returns the raw value
    pub fn expose(&self) -> &str {
        &self.inner
    }

    /// Returns the length in bytes
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Returns true if the value is empty
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl Drop for TokenSecret {
    fn drop(&mut self) {
        self.inner.zeroize();
    }
}

impl Zeroize for TokenSecret {
    fn zeroize(&mut self) {
        self.inner.zeroize();
    }
}

impl Deref for TokenSecret {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl AsRef<str> for TokenSecret {
    fn as_ref(&self) -> &str {
        &self.inner
    }
}

// Lets a `HashSet<TokenSecret>` be looked up by a plain `&str`.
impl Borrow<str> for TokenSecret {
    fn borrow(&self) -> &str {
        &self.inner
    }
}

impl Hash for TokenSecret {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.hash(state);
    }
}

impl From<String> for TokenSecret {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for TokenSecret {
    fn from(s: &str) -> Self {
        Self::new(s.to_string())
    }
}

impl fmt::Debug for TokenSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenSecret")
            .field("len", &self.inner.len())
            .field("value", &"[REDACTED]")
            .finish()
    }
}

impl Serialize for TokenSecret {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.inner)
    }
}
