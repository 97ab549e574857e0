//! Image Studio
//!
//! Batched, sequential multi-image generation against a remote image API with
//! progressive results, classified errors and prompt enhancement, plus a small
//! backend serving usage counters and admin endpoints.

pub mod api;
pub mod config;
pub mod error;
pub mod generation;
pub mod stats;

pub use error::{AppError, Result};

use std::sync::Arc;
use tokio::sync::RwLock;

use api::auth::AdminSessions;
use stats::StatsStore;

/// Application state shared across all handlers
pub struct AppState {
    pub settings: Arc<RwLock<config::Settings>>,
    pub stats: Arc<dyn StatsStore>,
    pub sessions: Arc<AdminSessions>,
}

impl AppState {
    pub fn new(settings: config::Settings, stats: Arc<dyn StatsStore>) -> Self {
        let sessions = Arc::new(AdminSessions::new(settings.admin.session_ttl_secs));
        Self {
            settings: Arc::new(RwLock::new(settings)),
            stats,
            sessions,
        }
    }
}
