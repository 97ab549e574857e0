//! Flat counter record for page views and generated images

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::error;
use utoipa::ToSchema;

use crate::error::{AppError, Result};

/// Persisted counters
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UsageStats {
    pub page_views: u64,
    pub images_generated: u64,
    pub last_updated: DateTime<Utc>,
}

impl Default for UsageStats {
    fn default() -> Self {
        Self {
            page_views: 0,
            images_generated: 0,
            last_updated: Utc::now(),
        }
    }
}

/// Storage for the usage counters
pub trait StatsStore: Send + Sync {
    /// Current counters
    fn read(&self) -> UsageStats;

    /// Add one page view and persist
    fn record_page_view(&self) -> Result<UsageStats>;

    /// Add one generated image and persist
    fn record_image(&self) -> Result<UsageStats>;
}

/// In-memory counters
#[derive(Debug, Default)]
pub struct MemoryStatsStore {
    stats: Mutex<UsageStats>,
}

impl MemoryStatsStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StatsStore for MemoryStatsStore {
    fn read(&self) -> UsageStats {
        self.stats.lock().clone()
    }

    fn record_page_view(&self) -> Result<UsageStats> {
        let mut stats = self.stats.lock();
        stats.page_views += 1;
        stats.last_updated = Utc::now();
        Ok(stats.clone())
    }

    fn record_image(&self) -> Result<UsageStats> {
        let mut stats = self.stats.lock();
        stats.images_generated += 1;
        stats.last_updated = Utc::now();
        Ok(stats.clone())
    }
}

/// Counters kept in a pretty-printed JSON file, read-modify-write per increment
#[derive(Debug)]
pub struct FileStatsStore {
    path: PathBuf,
    // serializes writers inside this process only
    lock: Mutex<()>,
}

impl FileStatsStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> UsageStats {
        if !self.path.exists() {
            return UsageStats::default();
        }

        match std::fs::read_to_string(&self.path)
            .map_err(AppError::from)
            .and_then(|content| serde_json::from_str(&content).map_err(AppError::from))
        {
            Ok(stats) => stats,
            Err(e) => {
                error!(path = %self.path.display(), error = %e, "Error reading stats");
                UsageStats::default()
            }
        }
    }

    fn save(&self, stats: &mut UsageStats) -> Result<()> {
        stats.last_updated = Utc::now();
        let content = serde_json::to_string_pretty(stats)?;
        std::fs::write(&self.path, content).map_err(|e| {
            error!(path = %self.path.display(), error = %e, "Error saving stats");
            AppError::Storage(format!("Failed to write {}: {}", self.path.display(), e))
        })
    }

    fn update(&self, apply: impl FnOnce(&mut UsageStats)) -> Result<UsageStats> {
        let _guard = self.lock.lock();
        let mut stats = self.load();
        apply(&mut stats);
        self.save(&mut stats)?;
        Ok(stats)
    }
}

impl StatsStore for FileStatsStore {
    fn read(&self) -> UsageStats {
        self.load()
    }

    fn record_page_view(&self) -> Result<UsageStats> {
        self.update(|stats| stats.page_views += 1)
    }

    fn record_image(&self) -> Result<UsageStats> {
        self.update(|stats| stats.images_generated += 1)
    }
}
