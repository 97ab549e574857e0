//! HTTP client for the remote image generation API

use async_trait::async_trait;
use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE},
    Client,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::config::GenerationConfig;
use crate::error::{AppError, Result};
use crate::generation::models::{BatchRequest, GeneratedImage, UploadedImage};
use crate::generation::usage::UsageReporter;

/// Low-level failure of a remote call, before classification
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientFailure {
    /// The request never produced a response (connection refused, DNS, timeout)
    #[error("{message}")]
    Transport { message: String },

    /// The server answered with a non-success status
    #[error("{message}")]
    Status { status: u16, message: String },

    /// A success response could not be decoded
    #[error("{0}")]
    Decode(String),

    /// A credential needed for the call is missing
    #[error("{0}")]
    NotConfigured(String),

    #[error("{0}")]
    Other(String),
}

impl ClientFailure {
    pub fn message(&self) -> &str {
        match self {
            ClientFailure::Transport { message } | ClientFailure::Status { message, .. } => {
                message
            }
            ClientFailure::Decode(message)
            | ClientFailure::NotConfigured(message)
            | ClientFailure::Other(message) => message,
        }
    }
}

impl From<reqwest::Error> for ClientFailure {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            ClientFailure::Decode(format!("Failed to parse response: {}", e))
        } else if let Some(status) = e.status() {
            ClientFailure::Status {
                status: status.as_u16(),
                message: api_error_message(status.as_u16(), ""),
            }
        } else {
            ClientFailure::Transport {
                message: e.to_string(),
            }
        }
    }
}

/// Error body the generation API may send with a non-success status
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: Option<String>,
}

/// Message for a non-success response: the body's `message` if present,
/// otherwise a generic one naming the status
pub(crate) fn api_error_message(status: u16, body: &str) -> String {
    serde_json::from_str::<ApiErrorBody>(body)
        .ok()
        .and_then(|parsed| parsed.message)
        .filter(|message| !message.is_empty())
        .unwrap_or_else(|| format!("API request failed with status {}", status))
}

/// JSON body of both generation endpoints. Quality is never part of it.
#[derive(Debug, Serialize)]
struct ImageGenerationBody<'a> {
    model: &'a str,
    prompt: String,
    n: u32,
    size: &'static str,
    response_format: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    negative_prompt: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    images: Option<Vec<&'a str>>,
}

/// Success body of both generation endpoints
#[derive(Debug, Deserialize)]
struct ImagesResponse {
    #[serde(default)]
    data: Vec<GeneratedImage>,
}

/// A backend able to produce one batch of images
#[async_trait]
pub trait GenerationClient: Send + Sync {
    /// Generate `batch.n` images from the prompt alone
    async fn generate_text(
        &self,
        batch: &BatchRequest,
    ) -> std::result::Result<Vec<GeneratedImage>, ClientFailure>;

    /// Generate `batch.n` images from the prompt and the source images
    async fn edit_images(
        &self,
        batch: &BatchRequest,
        sources: &[UploadedImage],
    ) -> std::result::Result<Vec<GeneratedImage>, ClientFailure>;
}

/// reqwest implementation talking to `{base}/images/generations` and `{base}/images/image-edit`
pub struct HttpGenerationClient {
    client: Client,
    base_url: String,
    api_key: String,
    text_model: String,
    edit_model: String,
    usage: Arc<dyn UsageReporter>,
}

impl HttpGenerationClient {
    pub fn new(config: &GenerationConfig, usage: Arc<dyn UsageReporter>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            text_model: config.text_model.clone(),
            edit_model: config.edit_model.clone(),
            usage,
        })
    }

    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Ok(value) = HeaderValue::from_str(&format!("Bearer {}", self.api_key)) {
            headers.insert(AUTHORIZATION, value);
        }
        headers
    }

    fn body<'a>(
        &'a self,
        model: &'a str,
        batch: &'a BatchRequest,
        sources: Option<&'a [UploadedImage]>,
    ) -> ImageGenerationBody<'a> {
        ImageGenerationBody {
            model,
            prompt: batch.final_prompt(),
            n: batch.n,
            size: batch.size.as_str(),
            response_format: "b64_json",
            negative_prompt: batch
                .negative_prompt
                .as_deref()
                .filter(|negative| !negative.is_empty()),
            images: sources.map(|images| images.iter().map(|i| i.data.as_str()).collect()),
        }
    }

    async fn post_images(
        &self,
        path: &str,
        body: &ImageGenerationBody<'_>,
    ) -> std::result::Result<Vec<GeneratedImage>, ClientFailure> {
        let url = format!("{}/{}", self.base_url, path);

        debug!(url = %url, model = %body.model, n = body.n, "Sending image generation request");

        let response = self
            .client
            .post(&url)
            .headers(self.headers())
            .json(body)
            .send()
            .await
            .map_err(|e| {
                warn!(url = %url, error = %e, "Image generation request failed");
                ClientFailure::from(e)
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = api_error_message(status.as_u16(), &text);
            warn!(url = %url, status = %status, message = %message, "Image generation API returned an error");
            return Err(ClientFailure::Status {
                status: status.as_u16(),
                message,
            });
        }

        let parsed = response.json::<ImagesResponse>().await.map_err(|e| {
            error!(url = %url, error = %e, "Failed to parse image generation response");
            ClientFailure::Decode(format!("Failed to parse response: {}", e))
        })?;

        self.usage.image_generated();

        debug!(url = %url, images = parsed.data.len(), "Image generation request completed");
        Ok(parsed.data)
    }
}

#[async_trait]
impl GenerationClient for HttpGenerationClient {
    async fn generate_text(
        &self,
        batch: &BatchRequest,
    ) -> std::result::Result<Vec<GeneratedImage>, ClientFailure> {
        let body = self.body(&self.text_model, batch, None);
        self.post_images("images/generations", &body).await
    }

    async fn edit_images(
        &self,
        batch: &BatchRequest,
        sources: &[UploadedImage],
    ) -> std::result::Result<Vec<GeneratedImage>, ClientFailure> {
        let body = self.body(&self.edit_model, batch, Some(sources));
        self.post_images("images/image-edit", &body).await
    }
}
