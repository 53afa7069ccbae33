//! Agent module - Background tasks
//!
//! Provides the per-tab auto-cleanup timers.

mod cleanup_agent;

pub use cleanup_agent::CleanupScheduler;
