//! Token Extractor - Passive bearer token capture for browser tabs
//!
//! Background component of a browser extension that watches outbound
//! requests, pulls bearer credentials out of `Authorization` headers and
//! keeps them per tab for a display surface.
//!
//! ## Features
//!
//! - Case-insensitive `Authorization: Bearer` extraction
//! - Best-effort claims decoding (no signature validation)
//! - Classification into ID / portal PKCE / user access / unknown tokens
//! - Expiry evaluation at capture time
//! - Per-tab deduplication in capture order
//! - Idle auto-cleanup, masked display, authenticated control protocol
//!
//! ## Architecture
//!
//! - **Token**: pure decode, classify and expiry functions
//! - **Capture**: the per-tab store, the interception hook and capture events
//! - **Agents**: auto-cleanup timers
//! - **Commands**: the control interface for collaborators
//! - **Config**: persisted settings
//! - **Host**: the narrow capability interface to the browser
//! - **Security**: sanitization, masking and zeroizing secrets
//!
//! Nothing but settings is ever persisted.

pub mod agents;
pub mod capture;
pub mod commands;
pub mod config;
pub mod host;
pub mod security;
pub mod token;

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::broadcast;

use agents::CleanupScheduler;
use capture::{CaptureEvent, CaptureStore, EventBus, InterceptionHook, RequestDetails, TabId};
use commands::{ControlRequest, ControlResponse, ControlService, MessageSender, TrustPolicy};
use config::{SettingsManager, SettingsStore};
use host::BrowserHost;

/// Background service owning all capture state
///
/// Lives as long as the extension's background context. The hook and the
/// control interface share the same store, settings and scheduler.
pub struct ExtensionBackground {
    store: Arc<CaptureStore>,
    scheduler: Arc<CleanupScheduler>,
    events: EventBus,
    hook: InterceptionHook,
    control: ControlService,
}

impl ExtensionBackground {
    /// Wires the background for the extension `extension_id`
    pub async fn new(
        extension_id: &str,
        host: Arc<dyn BrowserHost>,
        settings_store: Arc<dyn SettingsStore>,
    ) -> Self {
        let store = Arc::new(CaptureStore::new());
        let settings = Arc::new(SettingsManager::load(settings_store).await);
        let scheduler = Arc::new(CleanupScheduler::new(store.clone(), settings.clone()));
        let events = EventBus::default();

        let hook = InterceptionHook::new(store.clone(), scheduler.clone(), events.clone());
        let control = ControlService::new(
            store.clone(),
            settings,
            scheduler.clone(),
            host,
            TrustPolicy::new(extension_id),
        );

        tracing::info!(extension_id, "Token extractor background started");

        Self {
            store,
            scheduler,
            events,
            hook,
            control,
        }
    }

    /// Host callback: request headers are about to be sent
    pub async fn on_before_send_headers(&self, details: &RequestDetails) -> usize {
        self.hook.on_before_send_headers(details).await
    }

    /// Host callback: a tab was closed
    pub async fn on_tab_removed(&self, tab_id: TabId) {
        self.hook.on_tab_removed(tab_id).await;
    }

    /// Host callback: a runtime message arrived
    pub async fn on_message(&self, sender: &MessageSender, message: Value) -> ControlResponse {
        self.control.handle_json(sender, message).await
    }

    /// Host callback: an already parsed control request arrived
    pub async fn on_request(
        &self,
        sender: &MessageSender,
        request: ControlRequest,
    ) -> ControlResponse {
        self.control.handle(sender, request).await
    }

    /// Subscribes to capture notifications
    pub fn subscribe(&self) -> broadcast::Receiver<CaptureEvent> {
        self.events.subscribe()
    }

    /// Capture store
    pub fn store(&self) -> &Arc<CaptureStore> {
        &self.store
    }

    /// Stops all pending cleanup timers
    pub fn shutdown(&self) {
        self.scheduler.shutdown();
        tracing::info!("Token extractor background stopped");
    }
}

/// Initializes logging
///
/// `RUST_LOG` overrides the default filter. Safe to call more than once.
pub fn init_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new("token_extractor_lib=debug,token_extractor=debug,info")
    });

    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
