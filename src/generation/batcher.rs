//! Batch planning and the sequential, paced batch loop

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::GenerationConfig;
use crate::generation::client::{ClientFailure, GenerationClient};
use crate::generation::models::{GenerationMode, GenerationRequest, MAX_IMAGES_PER_REQUEST};
use crate::generation::progress::Aggregator;

/// Pause between two consecutive batches
pub const DEFAULT_BATCH_DELAY: Duration = Duration::from_millis(5000);

/// One API call's worth of images
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Batch {
    pub size: u32,
}

/// Split `total` greedily into batches of at most `max_per_request`
pub fn plan_batches(total: u32, max_per_request: u32) -> Vec<Batch> {
    let max = max_per_request.max(1);
    let mut batches = Vec::with_capacity(total.div_ceil(max) as usize);
    let mut remaining = total;
    while remaining > 0 {
        let size = remaining.min(max);
        batches.push(Batch { size });
        remaining -= size;
    }
    batches
}

/// Queue of batches still to run
#[derive(Debug, Clone)]
pub struct BatchPlan {
    queue: VecDeque<Batch>,
    total: u32,
}

impl BatchPlan {
    pub fn new(total: u32, max_per_request: u32) -> Self {
        Self {
            queue: plan_batches(total, max_per_request).into(),
            total,
        }
    }

    pub fn next_batch(&mut self) -> Option<Batch> {
        self.queue.pop_front()
    }

    pub fn remaining(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn total(&self) -> u32 {
        self.total
    }
}

/// Suspends the batch loop between batches
#[async_trait]
pub trait Pacer: Send + Sync {
    async fn pause(&self, duration: Duration);
}

/// Pacer backed by the tokio timer
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioPacer;

#[async_trait]
impl Pacer for TokioPacer {
    async fn pause(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// How a batch run ended without failing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every batch completed
    Completed,
    /// A newer operation took over; nothing further was published
    Superseded,
}

/// Drives a request's batches one at a time
#[derive(Clone)]
pub struct BatchRunner {
    pacer: Arc<dyn Pacer>,
    delay: Duration,
    max_per_request: u32,
}

impl BatchRunner {
    pub fn new(pacer: Arc<dyn Pacer>, delay: Duration, max_per_request: u32) -> Self {
        Self {
            pacer,
            delay,
            max_per_request: max_per_request.max(1),
        }
    }

    pub fn from_config(config: &GenerationConfig) -> Self {
        Self::new(
            Arc::new(TokioPacer),
            Duration::from_millis(config.batch_delay_ms),
            config.max_per_request,
        )
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn max_per_request(&self) -> u32 {
        self.max_per_request
    }

    /// Run every batch of `request` in order, appending results to `aggregator`.
    ///
    /// Stops at the first failure; batches that already completed stay published.
    pub async fn run(
        &self,
        client: &dyn GenerationClient,
        request: &GenerationRequest,
        aggregator: &mut Aggregator,
    ) -> Result<RunOutcome, ClientFailure> {
        let mut plan = BatchPlan::new(request.count, self.max_per_request);
        let batch_count = plan.remaining();

        info!(
            total = request.count,
            batches = batch_count,
            mode = request.mode.as_str(),
            "Starting batched generation"
        );

        let mut index = 0;
        while let Some(batch) = plan.next_batch() {
            index += 1;
            let params = request.batch(batch.size);

            let images = match request.mode {
                GenerationMode::TextToImage => client.generate_text(&params).await?,
                GenerationMode::ImageToImage => {
                    client.edit_images(&params, &request.source_images).await?
                }
            };

            debug!(batch = index, of = batch_count, received = images.len(), "Batch completed");

            if !aggregator.append(batch.size, images) {
                debug!(batch = index, "Operation superseded, dropping batch results");
                return Ok(RunOutcome::Superseded);
            }

            if !plan.is_empty() {
                self.pacer.pause(self.delay).await;
                if !aggregator.is_current() {
                    return Ok(RunOutcome::Superseded);
                }
            }
        }

        info!(total = request.count, "Batched generation completed");
        Ok(RunOutcome::Completed)
    }
}

impl Default for BatchRunner {
    fn default() -> Self {
        Self::new(Arc::new(TokioPacer), DEFAULT_BATCH_DELAY, MAX_IMAGES_PER_REQUEST)
    }
}
