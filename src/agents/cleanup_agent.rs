//! Cleanup agent - Purges idle tab sessions
//!
//! Each tab with a live session can have one pending one-shot timer. Every
//! newly captured token re-arms the tab's timer, so the purge happens after
//! a period of inactivity rather than a fixed time after first capture.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::capture::{CaptureStore, TabId};
use crate::config::SettingsManager;

/// Schedules per-tab auto-cleanup timers
pub struct CleanupScheduler {
    store: Arc<CaptureStore>,
    settings: Arc<SettingsManager>,
    shutdown: CancellationToken,
}

impl CleanupScheduler {
    /// Creates a scheduler purging sessions from `store`
    pub fn new(store: Arc<CaptureStore>, settings: Arc<SettingsManager>) -> Self {
        Self {
            store,
            settings,
            shutdown: CancellationToken::new(),
        }
    }

    /// (Re)starts the cleanup timer for a tab
    ///
    /// No-op when auto-cleanup is disabled or the tab has no session.
    /// Any previous timer for the tab is cancelled first. Returns true if a
    /// timer was started.
    pub async fn arm(&self, tab_id: TabId) -> bool {
        let settings = self.settings.current().await;
        if !settings.auto_cleanup_enabled {
            return false;
        }

        let delay = settings.cleanup_delay();
        let cancel = self.shutdown.child_token();

        let Some(generation) = self.store.install_cleanup(tab_id, cancel.clone()).await else {
            return false;
        };

        let store = Arc::clone(&self.store);
        let settings_manager = Arc::clone(&self.settings);
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {
                    store.expire(tab_id, generation, &settings_manager).await;
                }
                _ = cancel.cancelled() => {
                    tracing::trace!(tab_id, generation, "Cleanup timer cancelled");
                }
            }
        });

        tracing::debug!(tab_id, minutes = settings.auto_cleanup_minutes, "Armed cleanup timer");
        true
    }

    /// Cancels every pending timer without touching stored tokens
    pub async fn disarm_all(&self) -> usize {
        let cancelled = self.store.cancel_all_cleanups().await;
        if cancelled > 0 {
            tracing::info!(cancelled, "Disarmed cleanup timers");
        }
        cancelled
    }

    /// Stops all timers permanently
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }
}

impl Drop for CleanupScheduler {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
