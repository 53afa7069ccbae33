//! Security module - Sanitization and secret handling
//!
//! This module provides security primitives for:
//! - Sanitizing captured tokens and URLs for logs
//! - Masked display of token values
//! - Validating navigation targets
//! - Zeroizing storage of raw token values

mod sanitizer;
mod secret;

pub use sanitizer::{Sanitizer, SanitizerError};
pub use secret::TokenSecret;
