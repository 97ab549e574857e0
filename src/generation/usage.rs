//! Fire-and-forget usage reporting to the statistics service

use parking_lot::Mutex;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::{AppError, Result};

/// Receives usage events. Implementations must never block or fail the caller.
pub trait UsageReporter: Send + Sync {
    /// A page/session was opened
    fn page_viewed(&self);

    /// A generation call succeeded
    fn image_generated(&self);
}

/// Discards all events
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopUsageReporter;

impl UsageReporter for NoopUsageReporter {
    fn page_viewed(&self) {}

    fn image_generated(&self) {}
}

/// Reports events to the counter endpoints of the backend server.
///
/// Events are sent in the background. Short-lived callers should await
/// [`HttpUsageReporter::flush`] before their runtime shuts down, otherwise
/// events still in flight are cancelled with it.
#[derive(Debug, Clone)]
pub struct HttpUsageReporter {
    client: Client,
    base_url: String,
    pending: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl HttpUsageReporter {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            pending: Arc::new(Mutex::new(Vec::new())),
        })
    }

    /// Events sent but not yet answered
    pub fn pending(&self) -> usize {
        let mut pending = self.pending.lock();
        pending.retain(|task| !task.is_finished());
        pending.len()
    }

    /// Wait up to `timeout` for in-flight events. Returns false if some were still running.
    pub async fn flush(&self, timeout: Duration) -> bool {
        let tasks = std::mem::take(&mut *self.pending.lock());
        if tasks.is_empty() {
            return true;
        }

        let count = tasks.len();
        let drained = tokio::time::timeout(timeout, async move {
            for task in tasks {
                if let Err(e) = task.await {
                    warn!(error = %e, "Usage event task failed");
                }
            }
        })
        .await
        .is_ok();

        if drained {
            debug!(count, "Usage events flushed");
        } else {
            warn!(count, "Timed out flushing usage events");
        }
        drained
    }

    fn dispatch(&self, request: reqwest::RequestBuilder, event: &'static str) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            debug!(event, "No runtime available, usage event dropped");
            return;
        };

        let task = handle.spawn(async move {
            match request.send().await.and_then(|r| r.error_for_status()) {
                Ok(_) => debug!(event, "Usage event recorded"),
                Err(e) => warn!(event, error = %e, "Failed to record usage event"),
            }
        });

        let mut pending = self.pending.lock();
        pending.retain(|task| !task.is_finished());
        pending.push(task);
    }
}

impl UsageReporter for HttpUsageReporter {
    fn page_viewed(&self) {
        let url = format!("{}/api/stats/view", self.base_url);
        self.dispatch(self.client.get(url), "page_view");
    }

    fn image_generated(&self) {
        let url = format!("{}/api/stats/image", self.base_url);
        self.dispatch(self.client.post(url), "image_generated");
    }
}
