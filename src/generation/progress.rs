//! Result aggregation and progress publishing for the generation in flight

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

use crate::generation::classify::GenerationError;
use crate::generation::models::{GeneratedImage, GenerationProgress};

/// Snapshot of everything the presentation layer renders
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerationView {
    pub images: Vec<GeneratedImage>,
    pub progress: Option<GenerationProgress>,
    pub is_loading: bool,
    pub is_enhancing: bool,
    pub error: Option<GenerationError>,
}

/// Monotonic operation counter. A new value invalidates every older token.
#[derive(Debug, Clone, Default)]
pub struct Epoch(Arc<AtomicU64>);

impl Epoch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new operation, invalidating all outstanding tokens
    pub fn advance(&self) -> EpochToken {
        let value = self.0.fetch_add(1, Ordering::SeqCst) + 1;
        EpochToken {
            epoch: self.clone(),
            value,
        }
    }

    pub fn current(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }
}

/// Identity of one operation
#[derive(Debug, Clone)]
pub struct EpochToken {
    epoch: Epoch,
    value: u64,
}

impl EpochToken {
    pub fn is_current(&self) -> bool {
        self.epoch.current() == self.value
    }

    pub fn value(&self) -> u64 {
        self.value
    }
}

/// Collects batch results of one operation and publishes them.
///
/// Every write checks the operation's token inside the view lock, so a stale
/// operation can never touch the state of a newer one.
pub struct Aggregator {
    view: Arc<watch::Sender<GenerationView>>,
    token: EpochToken,
    collected: Vec<GeneratedImage>,
    progress: GenerationProgress,
}

impl Aggregator {
    /// Claim the view for a new operation of `total` images.
    ///
    /// Returns `None` while another operation is still loading. On success the
    /// previous results, progress and error are cleared.
    pub fn begin(
        view: Arc<watch::Sender<GenerationView>>,
        epoch: &Epoch,
        total: u32,
    ) -> Option<Self> {
        let mut token = None;
        view.send_if_modified(|v| {
            if v.is_loading {
                return false;
            }
            token = Some(epoch.advance());
            v.images.clear();
            v.progress = Some(GenerationProgress {
                completed: 0,
                total,
            });
            v.is_loading = true;
            v.error = None;
            true
        });

        token.map(|token| Self {
            view,
            token,
            collected: Vec::new(),
            progress: GenerationProgress {
                completed: 0,
                total,
            },
        })
    }

    pub fn is_current(&self) -> bool {
        self.token.is_current()
    }

    pub fn token(&self) -> &EpochToken {
        &self.token
    }

    /// Images collected so far, in arrival order
    pub fn images(&self) -> &[GeneratedImage] {
        &self.collected
    }

    pub fn progress(&self) -> GenerationProgress {
        self.progress
    }

    /// Append one batch's images and publish. Returns false if the operation is stale.
    pub fn append(&mut self, batch_size: u32, images: Vec<GeneratedImage>) -> bool {
        if !self.is_current() {
            return false;
        }

        self.collected.extend(images);
        self.progress.completed += batch_size;

        let token = &self.token;
        let collected = &self.collected;
        let progress = self.progress;
        self.view.send_if_modified(|v| {
            if !token.is_current() {
                return false;
            }
            v.images = collected.clone();
            v.progress = Some(progress);
            true
        })
    }

    /// End the operation: progress cleared, loading lowered, error (if any) shown.
    /// Published images are kept. Returns false if the operation is stale.
    pub fn finish(self, error: Option<GenerationError>) -> bool {
        let token = &self.token;
        self.view.send_if_modified(|v| {
            if !token.is_current() {
                return false;
            }
            v.progress = None;
            v.is_loading = false;
            v.error = error;
            true
        })
    }
}
