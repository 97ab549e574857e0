//! Prompt enhancement through an external text model

use async_trait::async_trait;
use reqwest::{
    header::{HeaderMap, HeaderValue, CONTENT_TYPE},
    Client,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::EnhancementConfig;
use crate::error::{AppError, Result};
use crate::generation::client::ClientFailure;

/// System instruction sent with every enhancement request
pub const SYSTEM_INSTRUCTION: &str = "You are a creative assistant for an AI image generator. \
Your task is to take a user's simple prompt and expand it into a rich, vivid, and detailed \
description focusing on visual details, lighting, composition, and artistic style. The output \
must be only the enhanced prompt, without any conversational text, introductions, or explanations.";

pub const DEFAULT_TEMPERATURE: f32 = 0.8;

/// Expands a short prompt into a detailed one
#[async_trait]
pub trait PromptEnhancer: Send + Sync {
    /// Returns an empty string for an empty prompt without calling out
    async fn enhance(&self, prompt: &str) -> std::result::Result<String, ClientFailure>;
}

/// Resolves the enhancement API key at call time
#[async_trait]
pub trait CredentialSource: Send + Sync {
    async fn api_key(&self) -> Option<String>;
}

/// Key read from an environment variable on every call
#[derive(Debug, Clone)]
pub struct EnvCredential {
    var: String,
}

impl EnvCredential {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

#[async_trait]
impl CredentialSource for EnvCredential {
    async fn api_key(&self) -> Option<String> {
        std::env::var(&self.var).ok().filter(|key| !key.trim().is_empty())
    }
}

/// Fixed key, mostly for tests and embedding
#[derive(Debug, Clone, Default)]
pub struct StaticCredential(pub Option<String>);

#[async_trait]
impl CredentialSource for StaticCredential {
    async fn api_key(&self) -> Option<String> {
        self.0.clone()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct KeyResponse {
    api_key: Option<String>,
}

/// Key fetched from the backend's `/api/gemini-key` endpoint
#[derive(Debug, Clone)]
pub struct BackendCredential {
    client: Client,
    url: String,
}

impl BackendCredential {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            url: url.into(),
        }
    }
}

#[async_trait]
impl CredentialSource for BackendCredential {
    async fn api_key(&self) -> Option<String> {
        let response = match self.client.get(&self.url).send().await {
            Ok(response) if response.status().is_success() => response,
            Ok(response) => {
                debug!(url = %self.url, status = %response.status(), "Enhancement key not available");
                return None;
            }
            Err(e) => {
                warn!(url = %self.url, error = %e, "Failed to fetch enhancement key");
                return None;
            }
        };

        response
            .json::<KeyResponse>()
            .await
            .ok()
            .and_then(|body| body.api_key)
            .filter(|key| !key.trim().is_empty())
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationSettings {
    temperature: f32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    system_instruction: Content,
    generation_config: GenerationSettings,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorBody {
    error: Option<GeminiErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorDetail {
    message: Option<String>,
}

fn user_content(prompt: &str) -> String {
    format!(
        "Expand this into a vivid, detailed prompt for an AI image generator: \"{}\"",
        prompt
    )
}

/// Gemini `generateContent` implementation
pub struct GeminiEnhancer {
    client: Client,
    base_url: String,
    model: String,
    temperature: f32,
    credentials: Arc<dyn CredentialSource>,
}

impl GeminiEnhancer {
    pub fn new(config: &EnhancementConfig, credentials: Arc<dyn CredentialSource>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            temperature: config.temperature,
            credentials,
        })
    }

    fn headers(&self, api_key: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Ok(value) = HeaderValue::from_str(api_key) {
            headers.insert("x-goog-api-key", value);
        }
        headers
    }
}

#[async_trait]
impl PromptEnhancer for GeminiEnhancer {
    async fn enhance(&self, prompt: &str) -> std::result::Result<String, ClientFailure> {
        if prompt.is_empty() {
            return Ok(String::new());
        }

        let api_key = self.credentials.api_key().await.ok_or_else(|| {
            ClientFailure::NotConfigured(
                "The prompt enhancement API key is not configured.".to_string(),
            )
        })?;

        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
        let body = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: user_content(prompt),
                }],
            }],
            system_instruction: Content {
                parts: vec![Part {
                    text: SYSTEM_INSTRUCTION.to_string(),
                }],
            },
            generation_config: GenerationSettings {
                temperature: self.temperature,
            },
        };

        debug!(model = %self.model, prompt_len = prompt.len(), "Sending prompt enhancement request");

        let response = self
            .client
            .post(&url)
            .headers(self.headers(&api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "Prompt enhancement request failed");
                ClientFailure::from(e)
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<GeminiErrorBody>(&text)
                .ok()
                .and_then(|body| body.error)
                .and_then(|detail| detail.message)
                .filter(|message| !message.is_empty())
                .unwrap_or_else(|| format!("API request failed with status {}", status.as_u16()));
            warn!(status = %status, message = %message, "Prompt enhancement API returned an error");
            return Err(ClientFailure::Status {
                status: status.as_u16(),
                message,
            });
        }

        let parsed = response
            .json::<GenerateContentResponse>()
            .await
            .map_err(|e| ClientFailure::Decode(format!("Failed to parse response: {}", e)))?;

        let text: String = parsed
            .candidates
            .into_iter()
            .filter_map(|candidate| candidate.content)
            .next()
            .map(|content| content.parts.into_iter().map(|p| p.text).collect())
            .unwrap_or_default();

        let enhanced = text.trim();
        if enhanced.is_empty() {
            return Err(ClientFailure::Other(
                "The enhancement API returned no text.".to_string(),
            ));
        }

        Ok(enhanced.to_string())
    }
}
