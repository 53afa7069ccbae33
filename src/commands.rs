//! Control interface
//!
//! Action-tagged request/response protocol used by the display surface and
//! the navigation helper. Every request is authenticated against the
//! sender before anything else happens.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::agents::CleanupScheduler;
use crate::capture::{CaptureStore, CapturedToken, TabId};
use crate::config::{Settings, SettingsError, SettingsManager};
use crate::host::{BrowserHost, HostError, PageProbe};
use crate::security::{Sanitizer, SanitizerError};

/// Errors surfaced to control-interface callers
#[derive(Debug, Error)]
pub enum ControlError {
    /// Sender is not the extension's own trusted context
    #[error("Unauthorized sender")]
    Unauthorized,

    /// Message could not be parsed as a known request
    #[error("Malformed request: {0}")]
    MalformedRequest(String),

    /// Navigation target rejected
    #[error(transparent)]
    InvalidUrl(#[from] SanitizerError),

    /// Host capability failed
    #[error(transparent)]
    Host(#[from] HostError),

    /// Settings could not be saved
    #[error(transparent)]
    Settings(#[from] SettingsError),

    /// In-page probe returned something other than a tenant list
    #[error("Unexpected tenant data: {0}")]
    UnexpectedTenantData(String),
}

/// Identity of a message sender as reported by the host
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct MessageSender {
    /// Extension id of the sending context
    #[serde(default)]
    pub id: Option<String>,
    /// URL of the sending document
    #[serde(default)]
    pub url: Option<String>,
}

impl MessageSender {
    /// Sender for a page served from the extension itself
    pub fn extension_page(extension_id: &str, path: &str) -> Self {
        Self {
            id: Some(extension_id.to_string()),
            url: Some(format!(
                "chrome-extension://{}/{}",
                extension_id,
                path.trim_start_matches('/')
            )),
        }
    }
}

/// Decides which senders may use the control interface
#[derive(Debug, Clone)]
pub struct TrustPolicy {
    extension_id: String,
    origin: String,
}

impl TrustPolicy {
    /// Trusts only pages of the given extension
    pub fn new(extension_id: impl Into<String>) -> Self {
        let extension_id = extension_id.into();
        let origin = format!("chrome-extension://{}/", extension_id);
        Self {
            extension_id,
            origin,
        }
    }

    /// Returns true if the sender is one of the extension's own pages
    ///
    /// Content scripts share the extension id but run on web page URLs, so
    /// both the id and the document origin must match.
    pub fn is_trusted(&self, sender: &MessageSender) -> bool {
        let id_matches = !self.extension_id.is_empty()
            && sender.id.as_deref() == Some(self.extension_id.as_str());
        let origin_matches = sender
            .url
            .as_deref()
            .is_some_and(|url| url.starts_with(&self.origin));

        id_matches && origin_matches
    }
}

/// Inbound control request
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum ControlRequest {
    /// Snapshot of a tab's tokens
    #[serde(rename_all = "camelCase")]
    GetTokens { tab_id: TabId },
    /// Destroy a tab's session
    #[serde(rename_all = "camelCase")]
    ClearTokens { tab_id: TabId },
    /// Navigate a tab to an http(s) URL
    #[serde(rename_all = "camelCase")]
    NavigateToUrl { tab_id: TabId, url: String },
    /// Read settings
    GetSettings,
    /// Replace settings
    SaveSettings { settings: Settings },
    /// Read the cached tenant list from a tab's page
    #[serde(rename_all = "camelCase")]
    FetchTenants { tab_id: TabId },
}

/// Tenant entry read from a page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tenant {
    /// Display name
    #[serde(alias = "name")]
    pub tenant_name: String,
    /// Identifier
    #[serde(alias = "id")]
    pub tenant_id: String,
}

/// Response to a control request
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ControlResponse {
    /// `getTokens`
    #[serde(rename_all = "camelCase")]
    Tokens {
        tokens: Vec<CapturedToken>,
        token_count: usize,
    },
    /// `getSettings`
    Settings(Settings),
    /// `fetchTenants` success
    Tenants { success: bool, tenants: Vec<Tenant> },
    /// Plain acknowledgement
    Ack { success: bool },
    /// Any failure
    Failure { success: bool, error: String },
}

impl ControlResponse {
    /// Successful acknowledgement
    pub fn ok() -> Self {
        ControlResponse::Ack { success: true }
    }

    /// Failure carrying the error message
    pub fn failure(error: &ControlError) -> Self {
        ControlResponse::Failure {
            success: false,
            error: error.to_string(),
        }
    }

    /// Whether the request succeeded
    pub fn is_success(&self) -> bool {
        match self {
            ControlResponse::Tokens { .. } | ControlResponse::Settings(_) => true,
            ControlResponse::Tenants { success, .. }
            | ControlResponse::Ack { success }
            | ControlResponse::Failure { success, .. } => *success,
        }
    }
}

/// Services control requests against the shared background state
///
/// `handle` and `handle_json` are the only entry points; both authenticate
/// the sender before any operation runs.
pub struct ControlService {
    store: Arc<CaptureStore>,
    settings: Arc<SettingsManager>,
    scheduler: Arc<CleanupScheduler>,
    host: Arc<dyn BrowserHost>,
    trust: TrustPolicy,
}

impl ControlService {
    /// Creates the service
    pub fn new(
        store: Arc<CaptureStore>,
        settings: Arc<SettingsManager>,
        scheduler: Arc<CleanupScheduler>,
        host: Arc<dyn BrowserHost>,
        trust: TrustPolicy,
    ) -> Self {
        Self {
            store,
            settings,
            scheduler,
            host,
            trust,
        }
    }

    /// Handles a raw JSON message
    ///
    /// The sender is authenticated before the message is even parsed.
    pub async fn handle_json(&self, sender: &MessageSender, message: Value) -> ControlResponse {
        if let Err(e) = self.authorize(sender) {
            return ControlResponse::failure(&e);
        }

        match serde_json::from_value::<ControlRequest>(message) {
            Ok(request) => self.dispatch(request).await,
            Err(e) => {
                let error = ControlError::MalformedRequest(e.to_string());
                tracing::warn!("{}", error);
                ControlResponse::failure(&error)
            }
        }
    }

    /// Handles a parsed request
    pub async fn handle(&self, sender: &MessageSender, request: ControlRequest) -> ControlResponse {
        if let Err(e) = self.authorize(sender) {
            return ControlResponse::failure(&e);
        }
        self.dispatch(request).await
    }

    fn authorize(&self, sender: &MessageSender) -> Result<(), ControlError> {
        if self.trust.is_trusted(sender) {
            return Ok(());
        }

        tracing::warn!(
            sender_id = sender.id.as_deref().unwrap_or("<none>"),
            sender_url = %sender.url.as_deref().map(Sanitizer::sanitize_url).unwrap_or_default(),
            "Rejected control request from untrusted sender"
        );
        Err(ControlError::Unauthorized)
    }

    async fn dispatch(&self, request: ControlRequest) -> ControlResponse {
        let result = match request {
            ControlRequest::GetTokens { tab_id } => Ok(self.get_tokens(tab_id).await),
            ControlRequest::ClearTokens { tab_id } => {
                self.clear_tokens(tab_id).await;
                Ok(ControlResponse::ok())
            }
            ControlRequest::NavigateToUrl { tab_id, url } => self
                .navigate_to_url(tab_id, &url)
                .await
                .map(|_| ControlResponse::ok()),
            ControlRequest::GetSettings => Ok(ControlResponse::Settings(self.get_settings().await)),
            ControlRequest::SaveSettings { settings } => self
                .save_settings(settings)
                .await
                .map(|_| ControlResponse::ok()),
            ControlRequest::FetchTenants { tab_id } => {
                self.fetch_tenants(tab_id)
                    .await
                    .map(|tenants| ControlResponse::Tenants {
                        success: true,
                        tenants,
                    })
            }
        };

        result.unwrap_or_else(|e| {
            tracing::warn!("Control request failed: {}", e);
            ControlResponse::failure(&e)
        })
    }

    /// Gets the tokens captured for a tab
    async fn get_tokens(&self, tab_id: TabId) -> ControlResponse {
        let tokens = self.store.get_all(tab_id).await;
        ControlResponse::Tokens {
            token_count: tokens.len(),
            tokens,
        }
    }

    /// Clears the tokens captured for a tab
    async fn clear_tokens(&self, tab_id: TabId) {
        self.store.clear(tab_id).await;
    }

    /// Navigates a tab after validating the target scheme
    async fn navigate_to_url(&self, tab_id: TabId, url: &str) -> Result<(), ControlError> {
        let target = Sanitizer::validate_navigation_url(url)?;
        tracing::info!(tab_id, url = %Sanitizer::sanitize_url(target.as_str()), "Navigating tab");
        self.host.navigate(tab_id, target).await?;
        Ok(())
    }

    /// Gets the current settings
    async fn get_settings(&self) -> Settings {
        self.settings.current().await
    }

    /// Saves settings; turning auto-cleanup off cancels pending timers
    async fn save_settings(&self, settings: Settings) -> Result<(), ControlError> {
        self.settings.save(settings).await?;
        if !settings.auto_cleanup_enabled {
            self.scheduler.disarm_all().await;
        }
        Ok(())
    }

    /// Reads the tenant list cached by the page in a tab
    async fn fetch_tenants(&self, tab_id: TabId) -> Result<Vec<Tenant>, ControlError> {
        let result = self
            .host
            .execute_in_page(tab_id, PageProbe::CachedTenants)
            .await?;
        parse_tenants(result)
    }
}

/// Accepts either a bare tenant array or `{ "tenants": [...] }`
fn parse_tenants(value: Value) -> Result<Vec<Tenant>, ControlError> {
    let list = match value {
        Value::Object(mut map) => map
            .remove("tenants")
            .ok_or_else(|| ControlError::UnexpectedTenantData("missing tenants".into()))?,
        other => other,
    };

    serde_json::from_value(list).map_err(|e| ControlError::UnexpectedTenantData(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MemorySettingsStore;
    use crate::host::MockBrowserHost;
    use mockall::predicate::eq;
    use serde_json::json;

    const EXTENSION_ID: &str = "abcdefghijklmnopabcdefghijklmnop";

    fn popup() -> MessageSender {
        MessageSender::extension_page(EXTENSION_ID, "popup.html")
    }

    async fn service(host: MockBrowserHost) -> (ControlService, Arc<CaptureStore>) {
        let settings = Arc::new(SettingsManager::load(Arc::new(MemorySettingsStore::new())).await);
        let store = Arc::new(CaptureStore::new());
        let scheduler = Arc::new(CleanupScheduler::new(store.clone(), settings.clone()));
        let service = ControlService::new(
            store.clone(),
            settings,
            scheduler,
            Arc::new(host),
            TrustPolicy::new(EXTENSION_ID),
        );
        (service, store)
    }

    #[test]
    fn test_trust_policy() {
        let policy = TrustPolicy::new(EXTENSION_ID);

        assert!(policy.is_trusted(&popup()));
        assert!(!policy.is_trusted(&MessageSender::default()));
        assert!(!policy.is_trusted(&MessageSender {
            id: Some(EXTENSION_ID.into()),
            url: Some("https://evil.example/page".into()),
        }));
        assert!(!policy.is_trusted(&MessageSender::extension_page("otherextension", "popup.html")));
        assert!(!policy.is_trusted(&MessageSender {
            id: Some("otherextension".into()),
            url: Some(format!("chrome-extension://{}/popup.html", EXTENSION_ID)),
        }));
        // Prefix tricks on the origin don't match
        assert!(!policy.is_trusted(&MessageSender {
            id: Some(EXTENSION_ID.into()),
            url: Some(format!("chrome-extension://{}.evil/", EXTENSION_ID)),
        }));
    }

    #[test]
    fn test_request_wire_shapes() {
        let get: ControlRequest = serde_json::from_value(json!({"action":"getTokens","tabId":4})).unwrap();
        assert_eq!(get, ControlRequest::GetTokens { tab_id: 4 });

        let nav: ControlRequest =
            serde_json::from_value(json!({"action":"navigateToUrl","tabId":1,"url":"https://x"})).unwrap();
        assert_eq!(
            nav,
            ControlRequest::NavigateToUrl {
                tab_id: 1,
                url: "https://x".into()
            }
        );

        let settings: ControlRequest = serde_json::from_value(json!({"action":"getSettings"})).unwrap();
        assert_eq!(settings, ControlRequest::GetSettings);

        let save: ControlRequest = serde_json::from_value(json!({
            "action": "saveSettings",
            "settings": {"autoCleanupEnabled": true, "autoCleanupMinutes": 5}
        }))
        .unwrap();
        assert!(matches!(
            save,
            ControlRequest::SaveSettings { settings } if settings.auto_cleanup_minutes == 5
        ));
    }

    #[tokio::test]
    async fn test_get_and_clear_tokens() {
        let (service, store) = service(MockBrowserHost::new()).await;
        store.upsert(1, "a", "https://example.com").await;
        store.upsert(1, "b", "https://example.com").await;

        let response = service.handle(&popup(), ControlRequest::GetTokens { tab_id: 1 }).await;
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["tokens"].as_array().unwrap().len(), 2);
        assert_eq!(json["tokenCount"], 2);
        assert_eq!(json["tokens"][0]["rawValue"], "a");

        let response = service.handle(&popup(), ControlRequest::ClearTokens { tab_id: 1 }).await;
        assert_eq!(serde_json::to_value(&response).unwrap(), json!({"success": true}));
        assert!(store.get_all(1).await.is_empty());
    }

    #[tokio::test]
    async fn test_unauthorized_request_has_no_side_effect() {
        let (service, store) = service(MockBrowserHost::new()).await;
        store.upsert(1, "a", "u").await;

        let attacker = MessageSender {
            id: Some(EXTENSION_ID.into()),
            url: Some("https://evil.example".into()),
        };
        let response = service.handle(&attacker, ControlRequest::ClearTokens { tab_id: 1 }).await;

        assert!(!response.is_success());
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "Unauthorized sender");
        assert_eq!(store.count(1).await, 1);
    }

    #[tokio::test]
    async fn test_unauthorized_mutations_are_all_rejected() {
        let mut host = MockBrowserHost::new();
        host.expect_navigate().never();
        let (service, store) = service(host).await;
        store.upsert(1, "a", "u").await;
        let before = service.get_settings().await;

        let senders = [
            MessageSender::default(),
            MessageSender {
                id: None,
                url: Some(format!("chrome-extension://{}/popup.html", EXTENSION_ID)),
            },
            MessageSender::extension_page("otherextension", "popup.html"),
        ];
        for sender in &senders {
            let requests = [
                ControlRequest::ClearTokens { tab_id: 1 },
                ControlRequest::NavigateToUrl {
                    tab_id: 1,
                    url: "https://evil.example".into(),
                },
                ControlRequest::SaveSettings {
                    settings: Settings {
                        auto_cleanup_enabled: true,
                        auto_cleanup_minutes: 1,
                        token_masking_enabled: true,
                    },
                },
            ];
            for request in requests {
                let response = service.handle(sender, request).await;
                assert!(!response.is_success());
            }
        }

        assert_eq!(store.count(1).await, 1);
        assert_eq!(service.get_settings().await, before);
    }

    #[tokio::test]
    async fn test_unauthorized_json_is_not_parsed() {
        let (service, _) = service(MockBrowserHost::new()).await;
        let response = service
            .handle_json(&MessageSender::default(), json!({"garbage": true}))
            .await;

        assert_eq!(
            serde_json::to_value(&response).unwrap()["error"],
            "Unauthorized sender"
        );
    }

    #[tokio::test]
    async fn test_malformed_json_request() {
        let (service, _) = service(MockBrowserHost::new()).await;
        let response = service
            .handle_json(&popup(), json!({"action": "launchMissiles"}))
            .await;

        assert!(!response.is_success());
    }

    #[tokio::test]
    async fn test_navigate_rejects_javascript_scheme() {
        let mut host = MockBrowserHost::new();
        host.expect_navigate().never();
        let (service, _) = service(host).await;

        let response = service
            .handle_json(
                &popup(),
                json!({"action": "navigateToUrl", "tabId": 1, "url": "javascript:alert(1)"}),
            )
            .await;

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["success"], false);
        assert!(json["error"].as_str().unwrap().contains("javascript"));
    }

    #[tokio::test]
    async fn test_navigate_valid_url() {
        let mut host = MockBrowserHost::new();
        host.expect_navigate()
            .withf(|tab_id, url| *tab_id == 3 && url.as_str() == "https://cloud.uipath.com/portal_")
            .times(1)
            .returning(|_, _| Ok(()));
        let (service, _) = service(host).await;

        let response = service
            .handle(
                &popup(),
                ControlRequest::NavigateToUrl {
                    tab_id: 3,
                    url: "https://cloud.uipath.com/portal_".into(),
                },
            )
            .await;

        assert!(response.is_success());
    }

    #[tokio::test]
    async fn test_navigate_host_failure_is_reported() {
        let mut host = MockBrowserHost::new();
        host.expect_navigate()
            .returning(|tab_id, _| Err(HostError::TabNotFound(tab_id)));
        let (service, _) = service(host).await;

        let response = service
            .handle(
                &popup(),
                ControlRequest::NavigateToUrl {
                    tab_id: 8,
                    url: "http://example.com".into(),
                },
            )
            .await;

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json, json!({"success": false, "error": "Tab 8 not found"}));
    }

    #[tokio::test]
    async fn test_settings_round_trip() {
        let (service, _) = service(MockBrowserHost::new()).await;

        let response = service.handle(&popup(), ControlRequest::GetSettings).await;
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({"autoCleanupEnabled": false, "autoCleanupMinutes": 15, "tokenMaskingEnabled": false})
        );

        let updated = Settings {
            auto_cleanup_enabled: true,
            auto_cleanup_minutes: 2,
            token_masking_enabled: true,
        };
        let response = service
            .handle(&popup(), ControlRequest::SaveSettings { settings: updated })
            .await;
        assert!(response.is_success());
        assert_eq!(service.get_settings().await, updated);
    }

    #[tokio::test]
    async fn test_save_invalid_settings() {
        let (service, _) = service(MockBrowserHost::new()).await;
        let response = service
            .handle_json(
                &popup(),
                json!({"action": "saveSettings", "settings": {"autoCleanupMinutes": 0}}),
            )
            .await;

        assert!(!response.is_success());
        assert_eq!(service.get_settings().await, Settings::default());
    }

    #[tokio::test]
    async fn test_disabling_cleanup_disarms_timers() {
        let (service, store) = service(MockBrowserHost::new()).await;
        service
            .save_settings(Settings {
                auto_cleanup_enabled: true,
                auto_cleanup_minutes: 1,
                token_masking_enabled: false,
            })
            .await
            .unwrap();
        store.upsert(1, "a", "u").await;
        service.scheduler.arm(1).await;
        assert!(store.has_pending_cleanup(1).await);

        service.save_settings(Settings::default()).await.unwrap();
        assert!(!store.has_pending_cleanup(1).await);
        assert_eq!(store.count(1).await, 1);
    }

    #[tokio::test]
    async fn test_fetch_tenants() {
        let mut host = MockBrowserHost::new();
        host.expect_execute_in_page()
            .with(eq(2), eq(PageProbe::CachedTenants))
            .returning(|_, _| {
                Ok(json!({"tenants": [
                    {"tenantName": "DefaultTenant", "tenantId": "t-1"},
                    {"name": "Other", "id": "t-2"}
                ]}))
            });
        let (service, _) = service(host).await;

        let response = service.handle(&popup(), ControlRequest::FetchTenants { tab_id: 2 }).await;
        let json = serde_json::to_value(&response).unwrap();

        assert_eq!(json["success"], true);
        assert_eq!(json["tenants"][0], json!({"tenantName": "DefaultTenant", "tenantId": "t-1"}));
        assert_eq!(json["tenants"][1]["tenantName"], "Other");
    }

    #[tokio::test]
    async fn test_fetch_tenants_script_error() {
        let mut host = MockBrowserHost::new();
        host.expect_execute_in_page()
            .returning(|_, _| Err(HostError::Script("page not ready".into())));
        let (service, _) = service(host).await;

        let response = service.handle(&popup(), ControlRequest::FetchTenants { tab_id: 2 }).await;
        let json = serde_json::to_value(&response).unwrap();

        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "Script execution failed: page not ready");
    }

    #[test]
    fn test_parse_tenants_shapes() {
        assert_eq!(
            parse_tenants(json!([{"tenantName": "A", "tenantId": "1"}])).unwrap(),
            vec![Tenant {
                tenant_name: "A".into(),
                tenant_id: "1".into()
            }]
        );
        assert!(parse_tenants(json!({"accounts": []})).is_err());
        assert!(parse_tenants(json!("nope")).is_err());
        assert!(parse_tenants(json!([{"tenantName": "A"}])).is_err());
    }
}
