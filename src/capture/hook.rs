//! Interception hook - Extracts bearer credentials from outbound requests
//!
//! Called by the host once per outbound request. It only touches in-memory
//! state and never performs I/O, so the request it observes is never held
//! up.

use std::sync::Arc;

use serde::Deserialize;

use super::events::{CaptureEvent, EventBus};
use super::store::{CaptureStore, TabId};
use crate::agents::CleanupScheduler;

const AUTHORIZATION: &str = "authorization";
const BEARER_PREFIX: &str = "bearer ";

/// A single request header as reported by the host
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HttpHeader {
    /// Header name, any case
    pub name: String,
    /// Header value, absent for binary values
    #[serde(default)]
    pub value: Option<String>,
}

impl HttpHeader {
    /// Creates a header with a text value
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: Some(value.into()),
        }
    }
}

/// Details of an outbound request about to be sent
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestDetails {
    /// Originating tab; negative for requests not tied to a tab
    pub tab_id: TabId,
    /// Request URL
    pub url: String,
    /// Headers as they will be sent
    #[serde(default)]
    pub request_headers: Vec<HttpHeader>,
}

/// Strips a case-insensitive `Bearer ` prefix, returning the credential
///
/// Returns `None` for other schemes and for an empty credential.
pub fn extract_bearer(value: &str) -> Option<&str> {
    let prefix = value.get(..BEARER_PREFIX.len())?;
    if !prefix.eq_ignore_ascii_case(BEARER_PREFIX) {
        return None;
    }

    let credential = &value[BEARER_PREFIX.len()..];
    if credential.is_empty() {
        None
    } else {
        Some(credential)
    }
}

/// Feeds intercepted credentials into the capture store
pub struct InterceptionHook {
    store: Arc<CaptureStore>,
    scheduler: Arc<CleanupScheduler>,
    events: EventBus,
}

impl InterceptionHook {
    /// Creates a hook writing into `store`
    pub fn new(store: Arc<CaptureStore>, scheduler: Arc<CleanupScheduler>, events: EventBus) -> Self {
        Self {
            store,
            scheduler,
            events,
        }
    }

    /// Handles one outbound request, returning how many new tokens it yielded
    pub async fn on_before_send_headers(&self, details: &RequestDetails) -> usize {
        if details.tab_id < 0 {
            return 0;
        }

        let mut captured = 0;
        for header in &details.request_headers {
            if !header.name.eq_ignore_ascii_case(AUTHORIZATION) {
                continue;
            }

            let Some(credential) = header.value.as_deref().and_then(extract_bearer) else {
                continue;
            };

            if let Some(token_count) = self.store.capture(details.tab_id, credential, &details.url).await {
                captured += 1;
                self.scheduler.arm(details.tab_id).await;
                self.events.publish(CaptureEvent::TokenCaptured {
                    tab_id: details.tab_id,
                    token_count,
                });
            }
        }

        captured
    }

    /// Handles a closed tab
    pub async fn on_tab_removed(&self, tab_id: TabId) {
        if self.store.on_tab_closed(tab_id).await {
            tracing::debug!(tab_id, "Tab closed, session destroyed");
        }
    }
}
