//! Unit tests for batch planning and the sequential batch runner

use async_trait::async_trait;
use image_studio::generation::{
    plan_batches, Aggregator, BatchPlan, BatchRequest, BatchRunner, ClientFailure, Epoch,
    GeneratedImage, GenerationClient, GenerationMode, GenerationRequest, GenerationView, Pacer,
    RunOutcome, UploadedImage,
};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Records the `n` of every call and fails the call with the given (1-based) index
#[derive(Default)]
struct RecordingClient {
    calls: Mutex<Vec<(&'static str, u32)>>,
    fail_on: Option<usize>,
}

impl RecordingClient {
    fn failing_on(call: usize) -> Self {
        Self {
            fail_on: Some(call),
            ..Self::default()
        }
    }

    fn sizes(&self) -> Vec<u32> {
        self.calls.lock().iter().map(|(_, n)| *n).collect()
    }

    fn respond(&self, endpoint: &'static str, n: u32) -> Result<Vec<GeneratedImage>, ClientFailure> {
        let mut calls = self.calls.lock();
        calls.push((endpoint, n));
        if self.fail_on == Some(calls.len()) {
            return Err(ClientFailure::Status {
                status: 500,
                message: "API request failed with status 500".to_string(),
            });
        }
        let call = calls.len();
        Ok((0..n)
            .map(|i| GeneratedImage {
                image_data: format!("call{}-img{}", call, i),
                revised_prompt: String::new(),
            })
            .collect())
    }
}

#[async_trait]
impl GenerationClient for RecordingClient {
    async fn generate_text(&self, batch: &BatchRequest) -> Result<Vec<GeneratedImage>, ClientFailure> {
        self.respond("generations", batch.n)
    }

    async fn edit_images(
        &self,
        batch: &BatchRequest,
        _sources: &[UploadedImage],
    ) -> Result<Vec<GeneratedImage>, ClientFailure> {
        self.respond("image-edit", batch.n)
    }
}

#[derive(Default)]
struct RecordingPacer {
    pauses: Mutex<Vec<Duration>>,
}

#[async_trait]
impl Pacer for RecordingPacer {
    async fn pause(&self, duration: Duration) {
        self.pauses.lock().push(duration);
    }
}

fn runner(pacer: Arc<RecordingPacer>) -> BatchRunner {
    BatchRunner::new(pacer, Duration::from_millis(5000), 4)
}

fn aggregator(total: u32) -> (Aggregator, watch::Receiver<GenerationView>, Epoch) {
    let (tx, rx) = watch::channel(GenerationView::default());
    let epoch = Epoch::new();
    let aggregator = Aggregator::begin(Arc::new(tx), &epoch, total).unwrap();
    (aggregator, rx, epoch)
}

#[test]
fn test_plan_covers_every_total() {
    for total in 1..=100u32 {
        let batches = plan_batches(total, 4);
        let sizes: Vec<u32> = batches.iter().map(|b| b.size).collect();

        assert_eq!(sizes.iter().sum::<u32>(), total, "total {}", total);
        assert_eq!(sizes.len() as u32, (total + 3) / 4, "total {}", total);
        assert!(sizes.iter().all(|size| (1..=4).contains(size)));
        assert!(sizes[..sizes.len() - 1].iter().all(|size| *size == 4));
    }
}

#[test]
fn test_plan_zero_max_is_one_per_batch() {
    assert_eq!(plan_batches(3, 0).len(), 3);
}

#[test]
fn test_batch_plan_queue() {
    let mut plan = BatchPlan::new(7, 4);
    assert_eq!(plan.total(), 7);
    assert_eq!(plan.remaining(), 2);
    assert_eq!(plan.next_batch().map(|b| b.size), Some(4));
    assert_eq!(plan.next_batch().map(|b| b.size), Some(3));
    assert!(plan.is_empty());
    assert!(plan.next_batch().is_none());
}

#[tokio::test]
async fn test_batches_run_in_order_with_one_pause() {
    let client = RecordingClient::default();
    let pacer = Arc::new(RecordingPacer::default());
    let request = GenerationRequest::new("a lighthouse at dusk", 7);
    let (mut aggregator, rx, _epoch) = aggregator(7);

    let outcome = runner(pacer.clone())
        .run(&client, &request, &mut aggregator)
        .await
        .unwrap();

    assert_eq!(outcome, RunOutcome::Completed);
    assert_eq!(client.sizes(), vec![4, 3]);
    assert_eq!(*pacer.pauses.lock(), vec![Duration::from_millis(5000)]);

    let view = rx.borrow().clone();
    let published: Vec<&str> = view.images.iter().map(|i| i.image_data.as_str()).collect();
    assert_eq!(
        published,
        vec![
            "call1-img0",
            "call1-img1",
            "call1-img2",
            "call1-img3",
            "call2-img0",
            "call2-img1",
            "call2-img2",
        ]
    );
    assert_eq!(view.progress.map(|p| p.completed), Some(7));
}

#[tokio::test]
async fn test_single_batch_has_no_pause() {
    let client = RecordingClient::default();
    let pacer = Arc::new(RecordingPacer::default());
    let request = GenerationRequest::new("a lighthouse", 3);
    let (mut aggregator, _rx, _epoch) = aggregator(3);

    runner(pacer.clone())
        .run(&client, &request, &mut aggregator)
        .await
        .unwrap();

    assert_eq!(client.sizes(), vec![3]);
    assert!(pacer.pauses.lock().is_empty());
}

#[tokio::test]
async fn test_failure_keeps_earlier_batches() {
    let client = RecordingClient::failing_on(2);
    let pacer = Arc::new(RecordingPacer::default());
    let request = GenerationRequest::new("a forest", 12);
    let (mut aggregator, rx, _epoch) = aggregator(12);

    let result = runner(pacer.clone())
        .run(&client, &request, &mut aggregator)
        .await;

    assert!(matches!(result, Err(ClientFailure::Status { status: 500, .. })));
    // batch 3 is never attempted
    assert_eq!(client.sizes(), vec![4, 4]);
    assert_eq!(pacer.pauses.lock().len(), 1);
    assert_eq!(aggregator.images().len(), 4);
    assert_eq!(rx.borrow().images.len(), 4);
}

#[tokio::test]
async fn test_progress_is_monotonic() {
    let client = RecordingClient::default();
    let pacer = Arc::new(RecordingPacer::default());
    let request = GenerationRequest::new("mountains", 9);
    let (tx, mut rx) = watch::channel(GenerationView::default());
    let tx = Arc::new(tx);
    let epoch = Epoch::new();
    let mut aggregator = Aggregator::begin(tx.clone(), &epoch, 9).unwrap();

    let observed = Arc::new(Mutex::new(Vec::new()));
    let sink = observed.clone();
    let watcher = tokio::spawn(async move {
        while rx.changed().await.is_ok() {
            if let Some(progress) = rx.borrow_and_update().progress {
                sink.lock().push(progress.completed);
            }
        }
    });

    runner(pacer)
        .run(&client, &request, &mut aggregator)
        .await
        .unwrap();
    aggregator.finish(None);
    drop(tx);
    watcher.await.unwrap();

    let mut observed = observed.lock().clone();
    observed.dedup();
    assert!(!observed.is_empty());
    // updates may coalesce, but whatever is seen follows the batch boundaries in order
    let mut boundaries = [0u32, 4, 8, 9].iter();
    assert!(
        observed.iter().all(|seen| boundaries.any(|b| b == seen)),
        "unexpected progress sequence {:?}",
        observed
    );
    assert_eq!(client.sizes(), vec![4, 4, 1]);
}

#[tokio::test]
async fn test_edit_mode_uses_edit_endpoint() {
    let client = RecordingClient::default();
    let pacer = Arc::new(RecordingPacer::default());
    let mut request = GenerationRequest::new("make it snowy", 2);
    request.mode = GenerationMode::ImageToImage;
    request.source_images = vec![UploadedImage::from_bytes(b"png", "image/png")];
    let (mut aggregator, _rx, _epoch) = aggregator(2);

    runner(pacer)
        .run(&client, &request, &mut aggregator)
        .await
        .unwrap();

    assert_eq!(*client.calls.lock(), vec![("image-edit", 2)]);
}

#[tokio::test]
async fn test_stale_operation_stops_after_pause() {
    let client = RecordingClient::default();
    let pacer = Arc::new(RecordingPacer::default());
    let request = GenerationRequest::new("rivers", 8);
    let (mut aggregator, rx, epoch) = aggregator(8);

    // a newer operation took over before the run started
    epoch.advance();

    let outcome = runner(pacer)
        .run(&client, &request, &mut aggregator)
        .await
        .unwrap();

    assert_eq!(outcome, RunOutcome::Superseded);
    assert_eq!(client.sizes(), vec![4]);
    assert!(rx.borrow().images.is_empty());
}
