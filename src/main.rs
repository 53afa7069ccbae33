//! Replay driver
//!
//! Feeds host events from stdin (one JSON object per line) through the
//! capture pipeline and prints each tab's token snapshot at the end.
//!
//! Accepted lines:
//! - request details: `{"tabId":1,"url":"...","requestHeaders":[{"name":"...","value":"..."}]}`
//! - tab closed: `{"tabRemoved":1}`

use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, BufReader};
use url::Url;

use token_extractor_lib::capture::{RequestDetails, TabId};
use token_extractor_lib::commands::MessageSender;
use token_extractor_lib::config::{JsonFileSettingsStore, MemorySettingsStore, SettingsStore};
use token_extractor_lib::host::{BrowserHost, HostError, PageProbe};
use token_extractor_lib::{init_logging, ExtensionBackground};

const REPLAY_EXTENSION_ID: &str = "replay";

/// Host with no browser behind it
struct OfflineHost;

#[async_trait]
impl BrowserHost for OfflineHost {
    async fn navigate(&self, _tab_id: TabId, _url: Url) -> Result<(), HostError> {
        Err(HostError::Navigation("no browser attached".into()))
    }

    async fn execute_in_page(&self, _tab_id: TabId, _probe: PageProbe) -> Result<Value, HostError> {
        Err(HostError::Script("no browser attached".into()))
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ReplayEvent {
    #[serde(rename_all = "camelCase")]
    TabRemoved { tab_removed: TabId },
    Request(RequestDetails),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();

    let settings_store: Arc<dyn SettingsStore> = match JsonFileSettingsStore::new() {
        Ok(store) => Arc::new(store),
        Err(e) => {
            tracing::warn!("Using in-memory settings: {}", e);
            Arc::new(MemorySettingsStore::new())
        }
    };

    let background =
        ExtensionBackground::new(REPLAY_EXTENSION_ID, Arc::new(OfflineHost), settings_store).await;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut line_no = 0usize;
    while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
        line_no += 1;
        if line.trim().is_empty() {
            continue;
        }

        match serde_json::from_str::<ReplayEvent>(&line) {
            Ok(ReplayEvent::Request(details)) => {
                background.on_before_send_headers(&details).await;
            }
            Ok(ReplayEvent::TabRemoved { tab_removed }) => {
                background.on_tab_removed(tab_removed).await;
            }
            Err(e) => tracing::warn!("Skipping line {}: {}", line_no, e),
        }
    }

    let sender = MessageSender::extension_page(REPLAY_EXTENSION_ID, "replay.html");
    let mut snapshot = serde_json::Map::new();
    for tab_id in background.store().tab_ids().await {
        let response = background
            .on_message(&sender, serde_json::json!({ "action": "getTokens", "tabId": tab_id }))
            .await;
        snapshot.insert(tab_id.to_string(), serde_json::to_value(&response)?);
    }

    println!("{}", serde_json::to_string_pretty(&Value::Object(snapshot))?);
    background.shutdown();
    Ok(())
}
