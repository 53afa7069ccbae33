//! Capture module - Interception, storage and notification of bearer tokens
//!
//! Data flow:
//! request → [`InterceptionHook`] → [`CaptureStore`] → cleanup re-arm → [`CaptureEvent`]

mod events;
mod hook;
mod store;

pub use events::{CaptureEvent, EventBus};
pub use hook::{extract_bearer, HttpHeader, InterceptionHook, RequestDetails};
pub use store::{CaptureStore, CapturedToken, TabId};
