//! Generation client against a mocked image API

use image_studio::config::GenerationConfig;
use image_studio::generation::{
    classify, ClientFailure, ErrorKind, GenerationClient, GenerationRequest, HttpGenerationClient,
    HttpUsageReporter, ImageQuality, ImageSize, ImageStyle, Pathway, UploadedImage, UsageReporter,
};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_test::{assert_err, assert_ok};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Default)]
struct CountingReporter {
    images: AtomicUsize,
}

impl UsageReporter for CountingReporter {
    fn page_viewed(&self) {}

    fn image_generated(&self) {
        self.images.fetch_add(1, Ordering::SeqCst);
    }
}

fn config(base_url: String) -> GenerationConfig {
    GenerationConfig {
        base_url,
        api_key: "sk-test".to_string(),
        ..GenerationConfig::default()
    }
}

fn images_body(count: usize) -> Value {
    let data: Vec<Value> = (0..count)
        .map(|i| json!({ "b64_json": format!("aW1n{}", i), "revised_prompt": "revised" }))
        .collect();
    json!({ "data": data })
}

async fn last_body(server: &MockServer) -> Value {
    let requests = server.received_requests().await.unwrap();
    serde_json::from_slice(&requests.last().unwrap().body).unwrap()
}

#[tokio::test]
async fn test_text_generation_request_shape() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/images/generations"))
        .and(header("authorization", "Bearer sk-test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(images_body(2)))
        .expect(1)
        .mount(&server)
        .await;

    let usage = Arc::new(CountingReporter::default());
    let client = HttpGenerationClient::new(&config(format!("{}/v1", server.uri())), usage.clone()).unwrap();

    let mut request = GenerationRequest::new("a red fox", 2);
    request.style = ImageStyle::Anime;
    request.size = ImageSize::Landscape;
    request.quality = ImageQuality::Ultra;
    request.negative_prompt = Some("blurry".to_string());

    let images = assert_ok!(client.generate_text(&request.batch(2)).await);
    assert_eq!(images.len(), 2);
    assert_eq!(images[0].image_data, "aW1n0");
    assert_eq!(images[0].revised_prompt, "revised");
    assert_eq!(usage.images.load(Ordering::SeqCst), 1);

    let body = last_body(&server).await;
    assert_eq!(body["model"], "nano-banana");
    assert_eq!(body["prompt"], "a red fox, anime style");
    assert_eq!(body["n"], 2);
    assert_eq!(body["size"], "1792x1024");
    assert_eq!(body["response_format"], "b64_json");
    assert_eq!(body["negative_prompt"], "blurry");
    assert!(body.get("quality").is_none());
    assert!(body.get("images").is_none());
}

#[tokio::test]
async fn test_empty_negative_prompt_is_omitted() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/images/generations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(images_body(1)))
        .mount(&server)
        .await;

    let client = HttpGenerationClient::new(
        &config(format!("{}/v1", server.uri())),
        Arc::new(CountingReporter::default()),
    )
    .unwrap();

    let mut request = GenerationRequest::new("plain prompt", 1);
    request.negative_prompt = Some(String::new());
    assert_ok!(client.generate_text(&request.batch(1)).await);

    let body = last_body(&server).await;
    assert_eq!(body["prompt"], "plain prompt");
    assert!(body.get("negative_prompt").is_none());
}

#[tokio::test]
async fn test_edit_request_carries_images() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/images/image-edit"))
        .and(body_partial_json(json!({ "model": "nano-banana-r2i", "n": 1 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(images_body(1)))
        .expect(1)
        .mount(&server)
        .await;

    let client = HttpGenerationClient::new(
        &config(format!("{}/v1", server.uri())),
        Arc::new(CountingReporter::default()),
    )
    .unwrap();

    let sources = vec![
        UploadedImage::from_bytes(b"one", "image/png"),
        UploadedImage::from_bytes(b"two", "image/png"),
    ];
    let request = GenerationRequest::new("add a hat", 1);
    assert_ok!(client.edit_images(&request.batch(1), &sources).await);

    let body = last_body(&server).await;
    assert_eq!(body["images"], json!(["b25l", "dHdv"]));
}

#[tokio::test]
async fn test_error_body_message_is_used() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/images/generations"))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(json!({ "message": "Prompt rejected" })),
        )
        .mount(&server)
        .await;

    let usage = Arc::new(CountingReporter::default());
    let client = HttpGenerationClient::new(&config(format!("{}/v1", server.uri())), usage.clone()).unwrap();

    let failure = assert_err!(client.generate_text(&GenerationRequest::new("x", 1).batch(1)).await);

    assert_eq!(
        failure,
        ClientFailure::Status {
            status: 400,
            message: "Prompt rejected".to_string()
        }
    );
    assert_eq!(classify(&failure, Pathway::Generation).message(), "Prompt rejected");
    assert_eq!(usage.images.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_server_error_is_overloaded() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/images/generations"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream exploded"))
        .mount(&server)
        .await;

    let client = HttpGenerationClient::new(
        &config(format!("{}/v1", server.uri())),
        Arc::new(CountingReporter::default()),
    )
    .unwrap();

    let failure = assert_err!(client.generate_text(&GenerationRequest::new("x", 1).batch(1)).await);

    assert_eq!(failure.message(), "API request failed with status 500");
    assert_eq!(
        classify(&failure, Pathway::Generation).kind(),
        ErrorKind::ServerOverloaded
    );
}

#[tokio::test]
async fn test_unreachable_host_is_network_error() {
    let client = HttpGenerationClient::new(
        &config("http://127.0.0.1:1/v1".to_string()),
        Arc::new(CountingReporter::default()),
    )
    .unwrap();

    let failure = assert_err!(client.generate_text(&GenerationRequest::new("x", 1).batch(1)).await);

    assert!(matches!(failure, ClientFailure::Transport { .. }));
    assert_eq!(
        classify(&failure, Pathway::Generation).kind(),
        ErrorKind::NetworkUnreachable
    );
}

#[tokio::test]
async fn test_malformed_success_body_is_decode_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/images/generations"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
        .mount(&server)
        .await;

    let client = HttpGenerationClient::new(
        &config(format!("{}/v1", server.uri())),
        Arc::new(CountingReporter::default()),
    )
    .unwrap();

    let failure = assert_err!(client.generate_text(&GenerationRequest::new("x", 1).batch(1)).await);

    assert!(matches!(failure, ClientFailure::Decode(_)));
}

#[tokio::test]
async fn test_usage_reporter_hits_counter_endpoints() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/stats/view"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "success": true })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/stats/image"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "success": true })))
        .expect(1)
        .mount(&server)
        .await;

    let reporter = HttpUsageReporter::new(server.uri()).unwrap();
    reporter.page_viewed();
    reporter.image_generated();

    assert!(reporter.flush(Duration::from_secs(5)).await);
    assert_eq!(reporter.pending(), 0);
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_usage_failures_are_swallowed() {
    let reporter = HttpUsageReporter::new("http://127.0.0.1:1").unwrap();
    reporter.page_viewed();
    reporter.image_generated();

    assert!(reporter.flush(Duration::from_secs(5)).await);
}

#[tokio::test]
async fn test_usage_event_survives_short_lived_runtime() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/stats/image"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "success": true })))
        .expect(1)
        .mount(&server)
        .await;

    let reporter = HttpUsageReporter::new(server.uri()).unwrap();

    // a command-line run: report, flush, then the runtime is dropped
    let flushed = tokio::task::spawn_blocking(move || {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        runtime.block_on(async {
            reporter.image_generated();
            reporter.flush(Duration::from_secs(5)).await
        })
    })
    .await
    .unwrap();

    assert!(flushed);

    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}
