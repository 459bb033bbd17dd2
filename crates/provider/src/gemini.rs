//! Gemini REST client adapter.
//!
//! Wraps the `generateContent` endpoint for integration with our
//! `GenerativeClient` trait. Failures are mapped onto the structured error
//! taxonomy so the retry layer can classify them without inspecting
//! message strings.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use reqwest::StatusCode;
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};

use civiscan_core::{
    config::ProviderConfig,
    traits::{GenerateResponse, GenerateUsage, GenerativeClient, ImagePayload},
    Error, Result,
};

/// Configuration for the Gemini client.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    /// API base URL.
    pub base_url: String,
    /// Model used for text-only prompts.
    pub text_model: String,
    /// Model used for prompts carrying an inline image.
    pub vision_model: String,
    /// API key, supplied via configuration.
    pub api_key: Secret<String>,
    /// Deadline applied to each HTTP request.
    pub request_timeout: Duration,
}

impl GeminiConfig {
    /// Create a config with default models and endpoint.
    pub fn new(api_key: Secret<String>) -> Self {
        Self {
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            text_model: "gemini-pro".to_string(),
            vision_model: "gemini-pro-vision".to_string(),
            api_key,
            request_timeout: Duration::from_secs(30),
        }
    }

    /// Set the base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Set the text model.
    pub fn with_text_model(mut self, model: impl Into<String>) -> Self {
        self.text_model = model.into();
        self
    }

    /// Set the vision model.
    pub fn with_vision_model(mut self, model: impl Into<String>) -> Self {
        self.vision_model = model.into();
        self
    }

    /// Set the per-request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

/// Gemini-backed generative client.
pub struct GeminiClient {
    config: GeminiConfig,
    http: reqwest::Client,
}

impl GeminiClient {
    /// Create a new client with the given configuration.
    pub fn new(config: GeminiConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| Error::internal(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { config, http })
    }

    fn endpoint(&self, model: &str) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            model
        )
    }

    async fn generate_content(&self, model: &str, parts: Vec<Part>) -> Result<GenerateResponse> {
        let body = GenerateContentRequest {
            contents: vec![Content { parts }],
        };

        tracing::debug!(model = %model, "Calling Gemini");

        let response = self
            .http
            .post(self.endpoint(model))
            .query(&[("key", self.config.api_key.expose_secret().as_str())])
            .json(&body)
            .send()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(error_for_status(status, detail));
        }

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| Error::malformed_response(format!("invalid response body: {e}")))?;

        let content = parsed
            .candidates
            .into_iter()
            .next()
            .map(|candidate| {
                candidate
                    .content
                    .parts
                    .into_iter()
                    .filter_map(|part| part.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .filter(|text| !text.is_empty())
            .ok_or_else(|| Error::malformed_response("response contained no candidates"))?;

        let usage = parsed
            .usage_metadata
            .map(|u| GenerateUsage {
                prompt_tokens: u.prompt_token_count,
                completion_tokens: u.candidates_token_count,
                total_tokens: u.total_token_count,
            })
            .unwrap_or_default();

        Ok(GenerateResponse { content, usage })
    }

    fn map_transport_error(&self, error: reqwest::Error) -> Error {
        if error.is_timeout() {
            Error::Timeout(self.config.request_timeout)
        } else {
            Error::network(error.to_string())
        }
    }
}

#[async_trait]
impl GenerativeClient for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<GenerateResponse> {
        self.generate_content(&self.config.text_model, vec![Part::text(prompt)])
            .await
    }

    async fn generate_with_image(
        &self,
        prompt: &str,
        image: &ImagePayload,
    ) -> Result<GenerateResponse> {
        let data = base64::engine::general_purpose::STANDARD.encode(&image.bytes);
        let parts = vec![
            Part::text(prompt),
            Part::inline_data(image.mime_type.clone(), data),
        ];
        self.generate_content(&self.config.vision_model, parts)
            .await
    }
}

/// Map a non-2xx status onto the error taxonomy.
fn error_for_status(status: StatusCode, detail: String) -> Error {
    let detail = if detail.is_empty() {
        status.to_string()
    } else {
        truncate(detail, 300)
    };

    match status {
        StatusCode::SERVICE_UNAVAILABLE => Error::overloaded(detail),
        StatusCode::TOO_MANY_REQUESTS => Error::rate_limited(detail),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Error::auth(detail),
        StatusCode::BAD_REQUEST => Error::invalid_request(detail),
        _ => Error::provider(format!("{status}: {detail}")),
    }
}

fn truncate(mut s: String, max: usize) -> String {
    if s.len() > max {
        let mut end = max;
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        s.truncate(end);
        s.push_str("...");
    }
    s
}

/// Create a Gemini client from application configuration.
///
/// The API key must be present; its absence is a fatal condition surfaced
/// at startup by the caller.
pub fn create_client_from_config(config: &ProviderConfig) -> Result<GeminiClient> {
    let api_key = config
        .api_key
        .clone()
        .ok_or_else(|| Error::config("provider API key is not set"))?;

    GeminiClient::new(
        GeminiConfig::new(api_key)
            .with_base_url(&config.base_url)
            .with_text_model(&config.text_model)
            .with_vision_model(&config.vision_model)
            .with_request_timeout(Duration::from_millis(config.request_timeout_ms)),
    )
}

// =============================================================================
// Wire DTOs
// =============================================================================

#[derive(Debug, Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
}

impl Part {
    fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            inline_data: None,
        }
    }

    fn inline_data(mime_type: String, data: String) -> Self {
        Self {
            text: None,
            inline_data: Some(InlineData { mime_type, data }),
        }
    }
}

#[derive(Debug, Serialize)]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(rename = "usageMetadata")]
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u64,
    #[serde(default)]
    candidates_token_count: u64,
    #[serde(default)]
    total_token_count: u64,
}
