//! Capture store - Per-tab registry of deduplicated captured tokens
//!
//! One `TabSession` per browser tab, created lazily on the first captured
//! token and destroyed on explicit clear, tab close or auto-cleanup. Tokens
//! are kept in capture order and identified by their exact raw value.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::config::SettingsManager;
use crate::security::{Sanitizer, TokenSecret};
use crate::token::{self, Claims, TokenCategory};

/// Browser-assigned tab identifier
pub type TabId = i64;

/// One observed bearer credential
///
/// Every derived field is computed once at first observation and never
/// updated afterwards.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CapturedToken {
    /// The credential exactly as presented
    pub raw_value: TokenSecret,
    /// URL of the request that carried it
    pub source_url: String,
    /// First observation time
    pub captured_at: DateTime<Utc>,
    /// Semantic category
    pub category: TokenCategory,
    /// Decoded claims, absent if the credential isn't a decodable token
    pub claims: Option<Claims>,
    /// Whether it had already expired at capture time
    pub is_expired: bool,
    /// `exp` minus capture time
    pub expires_in_seconds: Option<i64>,
    /// Absolute expiry instant
    pub expires_at: Option<DateTime<Utc>>,
}

impl CapturedToken {
    /// Runs a raw credential through decode, classify and expiry evaluation
    pub fn capture(raw_value: &str, source_url: &str) -> Self {
        Self::capture_at(raw_value, source_url, Utc::now())
    }

    /// Same as [`CapturedToken::capture`] with an explicit capture time
    pub fn capture_at(raw_value: &str, source_url: &str, now: DateTime<Utc>) -> Self {
        let claims = token::decode_claims(raw_value);
        let category = token::classify(source_url, claims.as_ref());
        let expiry = token::evaluate_at(claims.as_ref(), now);

        Self {
            raw_value: TokenSecret::from(raw_value),
            source_url: source_url.to_string(),
            captured_at: now,
            category,
            claims,
            is_expired: expiry.is_expired,
            expires_in_seconds: expiry.expires_in_seconds,
            expires_at: expiry.expires_at,
        }
    }

    /// Live countdown from the absolute expiry instant
    pub fn seconds_remaining(&self, now: DateTime<Utc>) -> Option<i64> {
        self.expires_at.map(|at| (at - now).num_seconds())
    }

    /// Value to show on the display surface
    pub fn display_value(&self, masked: bool) -> String {
        if masked {
            Sanitizer::mask_token(self.raw_value.expose())
        } else {
            self.raw_value.expose().to_string()
        }
    }
}

/// Pending auto-purge for a tab
#[derive(Debug)]
struct CleanupTimer {
    generation: u64,
    cancel: CancellationToken,
}

/// Capture state of a single tab
#[derive(Debug, Default)]
struct TabSession {
    tokens: Vec<CapturedToken>,
    seen: HashSet<TokenSecret>,
    cleanup: Option<CleanupTimer>,
}

impl TabSession {
    fn contains(&self, raw_value: &str) -> bool {
        self.seen.contains(raw_value)
    }

    fn push(&mut self, token: CapturedToken) {
        self.seen.insert(token.raw_value.clone());
        self.tokens.push(token);
    }

    fn cancel_cleanup(&mut self) -> bool {
        match self.cleanup.take() {
            Some(timer) => {
                timer.cancel.cancel();
                true
            }
            None => false,
        }
    }
}

impl Drop for TabSession {
    fn drop(&mut self) {
        self.cancel_cleanup();
    }
}

/// In-memory registry of tab sessions
///
/// Tabs are independent; every mutation holds the write lock for its whole
/// (synchronous) duration, so reads always observe a complete upsert or
/// clear.
#[derive(Debug, Default)]
pub struct CaptureStore {
    sessions: RwLock<HashMap<TabId, TabSession>>,
    next_generation: AtomicU64,
}

impl CaptureStore {
    /// Creates an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a credential for a tab unless the tab already has it
    ///
    /// Returns true if a new token was inserted.
    pub async fn upsert(&self, tab_id: TabId, raw_value: &str, source_url: &str) -> bool {
        self.capture(tab_id, raw_value, source_url).await.is_some()
    }

    /// Like [`CaptureStore::upsert`], returning the tab's new token count on insert
    pub async fn capture(&self, tab_id: TabId, raw_value: &str, source_url: &str) -> Option<usize> {
        let mut sessions = self.sessions.write().await;
        let session = sessions.entry(tab_id).or_default();

        if session.contains(raw_value) {
            return None;
        }

        let token = CapturedToken::capture(raw_value, source_url);
        tracing::debug!(
            tab_id,
            token = %Sanitizer::sanitize_token(raw_value),
            url = %Sanitizer::sanitize_url(source_url),
            category = %token.category,
            expired = token.is_expired,
            "Captured bearer token"
        );
        session.push(token);

        Some(session.tokens.len())
    }

    /// Returns the tab's tokens in capture order
    pub async fn get_all(&self, tab_id: TabId) -> Vec<CapturedToken> {
        self.sessions
            .read()
            .await
            .get(&tab_id)
            .map(|s| s.tokens.clone())
            .unwrap_or_default()
    }

    /// Returns the number of tokens captured for a tab
    pub async fn count(&self, tab_id: TabId) -> usize {
        self.sessions
            .read()
            .await
            .get(&tab_id)
            .map_or(0, |s| s.tokens.len())
    }

    /// Returns the ids of tabs with a live session
    pub async fn tab_ids(&self) -> Vec<TabId> {
        let mut ids: Vec<TabId> = self.sessions.read().await.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Destroys a tab's session and cancels its pending cleanup
    ///
    /// Idempotent. Returns true if a session existed.
    pub async fn clear(&self, tab_id: TabId) -> bool {
        let removed = self.sessions.write().await.remove(&tab_id);
        if let Some(session) = &removed {
            tracing::debug!(tab_id, tokens = session.tokens.len(), "Cleared tab session");
        }
        removed.is_some()
    }

    /// Tab was closed by the host
    pub async fn on_tab_closed(&self, tab_id: TabId) -> bool {
        self.clear(tab_id).await
    }

    /// Returns true if the tab has a pending cleanup timer
    pub async fn has_pending_cleanup(&self, tab_id: TabId) -> bool {
        self.sessions
            .read()
            .await
            .get(&tab_id)
            .is_some_and(|s| s.cleanup.is_some())
    }

    /// Installs a cleanup timer for a tab, cancelling any previous one
    ///
    /// Returns the timer's generation, or `None` (with `cancel` already
    /// cancelled) if the tab has no session.
    pub(crate) async fn install_cleanup(
        &self,
        tab_id: TabId,
        cancel: CancellationToken,
    ) -> Option<u64> {
        let mut sessions = self.sessions.write().await;
        let Some(session) = sessions.get_mut(&tab_id) else {
            cancel.cancel();
            return None;
        };

        session.cancel_cleanup();
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        session.cleanup = Some(CleanupTimer { generation, cancel });
        Some(generation)
    }

    /// Purges a tab if its current cleanup timer is still `generation`
    /// and auto-cleanup is still enabled
    ///
    /// A timer that lost a race with a re-arm or clear finds a different (or
    /// no) generation and leaves the session alone. Settings are read under
    /// the sessions lock, so a timer installed just after auto-cleanup was
    /// switched off never purges.
    pub(crate) async fn expire(
        &self,
        tab_id: TabId,
        generation: u64,
        settings: &SettingsManager,
    ) -> bool {
        let mut sessions = self.sessions.write().await;
        let Some(session) = sessions.get_mut(&tab_id) else {
            return false;
        };
        if session.cleanup.as_ref().map(|t| t.generation) != Some(generation) {
            return false;
        }

        if !settings.current().await.auto_cleanup_enabled {
            session.cleanup = None;
            tracing::debug!(tab_id, "Auto-cleanup disabled, keeping tab");
            return false;
        }

        if let Some(mut session) = sessions.remove(&tab_id) {
            session.cleanup = None;
            tracing::info!(tab_id, tokens = session.tokens.len(), "Auto-cleanup purged tab");
        }
        true
    }

    /// Cancels every pending cleanup timer, returning how many were cancelled
    pub(crate) async fn cancel_all_cleanups(&self) -> usize {
        let mut sessions = self.sessions.write().await;
        sessions
            .values_mut()
            .map(|s| s.cancel_cleanup())
            .filter(|cancelled| *cancelled)
            .count()
    }
}
