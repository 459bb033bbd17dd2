//! Issue classification gateway.
//!
//! The sole entry point for classification. Hides the provider wire
//! format, enforces the resilience policy, and guarantees a usable result
//! under any failure mode: no operation here ever returns an error.

use std::sync::Arc;

use bytes::Bytes;
use serde::Deserialize;

use civiscan_core::{
    traits::{GenerativeClient, ImagePayload},
    types::{normalize_category, ClassificationRequest, ClassificationResult, Urgency, CATEGORIES, CATEGORY_OTHER},
    Error, Result,
};

use crate::rate_limiter::RateLimiter;
use crate::retry::{RetryCallback, RetryPolicy};

/// Default description when an image cannot be analyzed.
const FALLBACK_IMAGE_DESCRIPTION: &str = "Unable to analyze image";

/// Composes the rate limiter and retry policy around the provider client,
/// normalizes provider responses into the fixed result shape, and supplies
/// safe defaults on exhaustion.
pub struct ClassificationGateway {
    client: Arc<dyn GenerativeClient>,
    limiter: Arc<RateLimiter>,
    retry: RetryPolicy,
}

impl ClassificationGateway {
    /// Create a gateway with default rate limiting and retry policy.
    pub fn new(client: Arc<dyn GenerativeClient>) -> Self {
        Self {
            client,
            limiter: Arc::new(RateLimiter::default()),
            retry: RetryPolicy::default(),
        }
    }

    /// Share a rate limiter with other components.
    pub fn with_rate_limiter(mut self, limiter: Arc<RateLimiter>) -> Self {
        self.limiter = limiter;
        self
    }

    /// Replace the retry policy.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Classify a request, dispatching on its variant.
    pub async fn classify(
        &self,
        request: ClassificationRequest,
        on_progress: Option<RetryCallback>,
    ) -> ClassificationResult {
        match request {
            ClassificationRequest::Image { bytes, mime_type } => {
                self.classify_image(bytes, &mime_type, on_progress).await
            }
            ClassificationRequest::Text { text } => self.classify_text(&text, on_progress).await,
        }
    }

    /// Classify a photo of a suspected civic issue.
    ///
    /// Never fails: on any error the result degrades to the documented
    /// defaults, with a description chosen by error kind.
    pub async fn classify_image(
        &self,
        bytes: Bytes,
        mime_type: &str,
        on_progress: Option<RetryCallback>,
    ) -> ClassificationResult {
        metrics::counter!("civiscan_classifications_total", "kind" => "image").increment(1);

        if let Err(error) = validate_image(&bytes) {
            tracing::warn!(%error, "Rejecting undecodable image payload");
            return self.degraded_image(&error);
        }

        let payload = ImagePayload::new(bytes, mime_type);
        let prompt = image_prompt();

        let outcome = self
            .retry
            .execute(
                &self.limiter,
                || {
                    let client = Arc::clone(&self.client);
                    let prompt = prompt.clone();
                    let payload = payload.clone();
                    async move { client.generate_with_image(&prompt, &payload).await }
                },
                on_progress,
            )
            .await;

        match outcome.and_then(|response| parse_image_response(&response.content)) {
            Ok(result) => {
                tracing::info!(
                    category = %result.category,
                    urgency = result.urgency.as_str(),
                    confidence = result.confidence.unwrap_or(0),
                    "Image classified"
                );
                result
            }
            Err(error) => {
                tracing::warn!(%error, "Image classification degraded to fallback");
                self.degraded_image(&error)
            }
        }
    }

    /// Classify a free-text issue description.
    ///
    /// Never fails: on any error the result degrades to the documented
    /// defaults with the caller's text preserved verbatim as the
    /// description, so no input is lost.
    pub async fn classify_text(
        &self,
        text: &str,
        on_progress: Option<RetryCallback>,
    ) -> ClassificationResult {
        metrics::counter!("civiscan_classifications_total", "kind" => "text").increment(1);

        if text.trim().is_empty() {
            tracing::warn!("Empty description text, skipping provider call");
            return self.degraded_text(text);
        }

        let prompt = text_prompt(text);

        let outcome = self
            .retry
            .execute(
                &self.limiter,
                || {
                    let client = Arc::clone(&self.client);
                    let prompt = prompt.clone();
                    async move { client.generate(&prompt).await }
                },
                on_progress,
            )
            .await;

        match outcome.and_then(|response| parse_text_response(&response.content, text)) {
            Ok(result) => {
                tracing::info!(
                    category = %result.category,
                    urgency = result.urgency.as_str(),
                    "Text classified"
                );
                result
            }
            Err(error) => {
                tracing::warn!(%error, "Text classification degraded to fallback");
                self.degraded_text(text)
            }
        }
    }

    fn degraded_image(&self, error: &Error) -> ClassificationResult {
        metrics::counter!("civiscan_classifications_degraded_total", "kind" => "image").increment(1);
        ClassificationResult {
            category: CATEGORY_OTHER.to_string(),
            description: image_failure_description(error).to_string(),
            urgency: Urgency::default(),
            confidence: Some(0),
        }
    }

    fn degraded_text(&self, text: &str) -> ClassificationResult {
        metrics::counter!("civiscan_classifications_degraded_total", "kind" => "text").increment(1);
        ClassificationResult {
            category: CATEGORY_OTHER.to_string(),
            description: text.to_string(),
            urgency: Urgency::default(),
            confidence: None,
        }
    }
}

// =============================================================================
// Prompts
// =============================================================================

fn image_prompt() -> String {
    format!(
        "Analyze this image and identify if it shows a civic issue. If it does, provide:\n\
         1. Category: Choose from [{categories}]\n\
         2. Description: A brief description of the issue\n\
         3. Urgency: low, medium, or high based on safety and impact\n\
         4. Confidence: 0-100 score of how confident you are this is a civic issue\n\
         \n\
         If this is not a civic issue, return category as \"Not Applicable\" and confidence as 0.\n\
         \n\
         Respond in JSON format only:\n\
         {{\n  \"category\": \"string\",\n  \"description\": \"string\",\n  \"urgency\": \"low|medium|high\",\n  \"confidence\": number\n}}",
        categories = CATEGORIES.join(", ")
    )
}

fn text_prompt(text: &str) -> String {
    format!(
        "Analyze this civic issue description and provide:\n\
         1. Category: Choose from [{categories}]\n\
         2. Description: A clear, detailed description of the issue\n\
         3. Urgency: low, medium, or high based on safety and impact\n\
         \n\
         User description: \"{text}\"\n\
         \n\
         Respond in JSON format only:\n\
         {{\n  \"category\": \"string\",\n  \"description\": \"string\",\n  \"urgency\": \"low|medium|high\"\n}}",
        categories = CATEGORIES.join(", ")
    )
}

// =============================================================================
// Response Extraction & Coercion
// =============================================================================

/// Loosely-typed classification as the provider returns it. Wrong-typed
/// fields deserialize as raw values and are coerced downstream.
#[derive(Debug, Default, Deserialize)]
struct RawClassification {
    #[serde(default)]
    category: Option<serde_json::Value>,
    #[serde(default)]
    description: Option<serde_json::Value>,
    #[serde(default)]
    urgency: Option<serde_json::Value>,
    #[serde(default)]
    confidence: Option<serde_json::Value>,
}

/// Locate the first JSON object span in provider output.
///
/// The provider may wrap the object in prose or Markdown code fences;
/// slicing from the first `{` to the last `}` ignores both.
fn extract_json(raw: &str) -> Result<&str> {
    let start = raw.find('{');
    let end = raw.rfind('}');
    match (start, end) {
        (Some(start), Some(end)) if start < end => Ok(&raw[start..=end]),
        _ => Err(Error::malformed_response("no JSON object found in response")),
    }
}

fn coerce_string(value: Option<&serde_json::Value>) -> Option<String> {
    value
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

fn coerce_confidence(value: Option<&serde_json::Value>) -> u8 {
    value
        .and_then(|v| v.as_f64())
        .map(|c| c.clamp(0.0, 100.0).round() as u8)
        .unwrap_or(0)
}

fn parse_image_response(content: &str) -> Result<ClassificationResult> {
    let raw: RawClassification = serde_json::from_str(extract_json(content)?)?;

    Ok(ClassificationResult {
        category: coerce_string(raw.category.as_ref())
            .map(|c| normalize_category(&c))
            .unwrap_or_else(|| CATEGORY_OTHER.to_string()),
        description: coerce_string(raw.description.as_ref())
            .unwrap_or_else(|| FALLBACK_IMAGE_DESCRIPTION.to_string()),
        urgency: coerce_string(raw.urgency.as_ref())
            .map(|u| Urgency::parse_lenient(&u))
            .unwrap_or_default(),
        confidence: Some(coerce_confidence(raw.confidence.as_ref())),
    })
}

fn parse_text_response(content: &str, original_text: &str) -> Result<ClassificationResult> {
    let raw: RawClassification = serde_json::from_str(extract_json(content)?)?;

    Ok(ClassificationResult {
        category: coerce_string(raw.category.as_ref())
            .map(|c| normalize_category(&c))
            .unwrap_or_else(|| CATEGORY_OTHER.to_string()),
        description: coerce_string(raw.description.as_ref())
            .unwrap_or_else(|| original_text.to_string()),
        urgency: coerce_string(raw.urgency.as_ref())
            .map(|u| Urgency::parse_lenient(&u))
            .unwrap_or_default(),
        confidence: None,
    })
}

/// Fallback description for a failed image classification, by error kind.
fn image_failure_description(error: &Error) -> &'static str {
    match error {
        Error::Overloaded(_) => "AI service is currently busy, try again later",
        Error::RateLimited(_) => "Too many requests, wait before retrying",
        Error::Network(_) | Error::Timeout(_) => "Network error, check connection",
        _ => "Unable to analyze image - please try again",
    }
}

/// Sanity-check an image payload before spending a provider call.
fn validate_image(bytes: &[u8]) -> Result<()> {
    use image::GenericImageView;

    let img = image::load_from_memory(bytes)
        .map_err(|e| Error::invalid_request(format!("invalid image: {e}")))?;

    let (width, height) = img.dimensions();
    tracing::debug!(width, height, size = bytes.len(), "Image payload accepted");
    Ok(())
}
