//! Generative provider interface.

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Client interface to the external generative-AI provider.
#[async_trait]
pub trait GenerativeClient: Send + Sync {
    /// Generate content from a text prompt.
    async fn generate(&self, prompt: &str) -> Result<GenerateResponse>;

    /// Generate content from a prompt plus an inline image.
    async fn generate_with_image(
        &self,
        prompt: &str,
        image: &ImagePayload,
    ) -> Result<GenerateResponse>;
}

/// Inline image payload sent alongside a prompt.
#[derive(Debug, Clone)]
pub struct ImagePayload {
    /// Raw image bytes.
    pub bytes: Bytes,
    /// MIME type, e.g. `image/jpeg`.
    pub mime_type: String,
}

impl ImagePayload {
    /// Create a payload from raw bytes and a MIME type.
    pub fn new(bytes: impl Into<Bytes>, mime_type: impl Into<String>) -> Self {
        Self {
            bytes: bytes.into(),
            mime_type: mime_type.into(),
        }
    }
}

/// Raw response from the provider.
///
/// `content` is free-form text that is expected, but not guaranteed, to
/// contain one JSON object; extraction and validation happen downstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateResponse {
    /// Generated content.
    pub content: String,
    /// Token usage.
    pub usage: GenerateUsage,
}

/// Token usage for a provider call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerateUsage {
    /// Prompt tokens.
    pub prompt_tokens: u64,
    /// Completion tokens.
    pub completion_tokens: u64,
    /// Total tokens.
    pub total_tokens: u64,
}
