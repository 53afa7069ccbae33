//! Browser host capabilities
//!
//! The core never talks to the browser directly. Everything it needs from
//! the host beyond delivering events goes through [`BrowserHost`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use url::Url;

use crate::capture::TabId;

/// Errors reported by the browser host
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HostError {
    /// The tab no longer exists
    #[error("Tab {0} not found")]
    TabNotFound(TabId),

    /// The host refused or failed to navigate
    #[error("Navigation failed: {0}")]
    Navigation(String),

    /// In-page script failed or its result couldn't be read
    #[error("Script execution failed: {0}")]
    Script(String),
}

/// Read-only probes the core can run inside a page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PageProbe {
    /// Read the page's already-cached account/tenant list
    CachedTenants,
}

/// Narrow interface to the host browser
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BrowserHost: Send + Sync {
    /// Navigates a tab to an already validated URL
    async fn navigate(&self, tab_id: TabId, url: Url) -> Result<(), HostError>;

    /// Runs a read-only probe in the tab's page context and returns its JSON result
    async fn execute_in_page(&self, tab_id: TabId, probe: PageProbe) -> Result<Value, HostError>;
}
