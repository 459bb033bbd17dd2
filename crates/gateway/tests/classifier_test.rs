//! End-to-end behavior of the classification gateway against scripted
//! provider mocks.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use civiscan_core::mocks::MockGenerativeClient;
use civiscan_core::types::{ClassificationRequest, Urgency};
use civiscan_core::Error;
use civiscan_gateway::{ClassificationGateway, RateLimiter, RetryCallback, RetryPolicy};

const GOOD_IMAGE_JSON: &str = "```json\n{\"category\": \"Pothole\", \"description\": \"Large pothole\", \"urgency\": \"high\", \"confidence\": 85}\n```";

fn tiny_png() -> Vec<u8> {
    let img = image::RgbImage::new(2, 2);
    let mut buf = std::io::Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut buf, image::ImageFormat::Png)
        .unwrap();
    buf.into_inner()
}

fn gateway(mock: Arc<MockGenerativeClient>) -> ClassificationGateway {
    ClassificationGateway::new(mock)
        .with_rate_limiter(Arc::new(RateLimiter::new(Duration::ZERO)))
        .with_retry_policy(RetryPolicy::new(3, Duration::from_millis(1)))
}

#[tokio::test(start_paused = true)]
async fn image_degrades_on_persistent_network_failure() {
    let mock = Arc::new(MockGenerativeClient::always_failing(|| {
        Error::network("connection refused")
    }));
    let gateway = gateway(mock.clone());

    let result = gateway
        .classify_image(tiny_png().into(), "image/png", None)
        .await;

    assert_eq!(result.category, "Other");
    assert_eq!(result.description, "Network error, check connection");
    assert_eq!(result.urgency, Urgency::Medium);
    assert_eq!(result.confidence, Some(0));
    // Network failures are not retryable.
    assert_eq!(mock.call_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn image_degrades_after_retry_exhaustion() {
    let mock = Arc::new(MockGenerativeClient::always_failing(|| {
        Error::overloaded("model is overloaded")
    }));
    let gateway = gateway(mock.clone());

    let result = gateway
        .classify_image(tiny_png().into(), "image/png", None)
        .await;

    assert_eq!(result.category, "Other");
    assert_eq!(
        result.description,
        "AI service is currently busy, try again later"
    );
    assert_eq!(result.confidence, Some(0));
    assert_eq!(mock.call_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn image_succeeds_after_transient_failures() {
    let mock = Arc::new(
        MockGenerativeClient::constant(GOOD_IMAGE_JSON)
            .with_leading_failures(2, || Error::rate_limited("quota exceeded")),
    );
    let gateway = gateway(mock.clone());

    let result = gateway
        .classify_image(tiny_png().into(), "image/png", None)
        .await;

    assert_eq!(result.category, "Pothole");
    assert_eq!(result.description, "Large pothole");
    assert_eq!(result.urgency, Urgency::High);
    assert_eq!(result.confidence, Some(85));
    assert_eq!(mock.call_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn end_to_end_image_classification() {
    let mock = Arc::new(MockGenerativeClient::constant(GOOD_IMAGE_JSON));
    let gateway = gateway(mock);

    let request = ClassificationRequest::image(tiny_png(), "image/jpeg");
    let result = gateway.classify(request, None).await;

    assert_eq!(result.category, "Pothole");
    assert_eq!(result.description, "Large pothole");
    assert_eq!(result.urgency, Urgency::High);
    assert_eq!(result.confidence, Some(85));
}

#[tokio::test(start_paused = true)]
async fn text_fallback_preserves_input_verbatim() {
    let input = "There's a huge hole on 5th St";
    let mock = Arc::new(MockGenerativeClient::always_failing(|| {
        Error::overloaded("503")
    }));
    let gateway = gateway(mock.clone());

    let result = gateway.classify_text(input, None).await;

    assert_eq!(result.description, input);
    assert_eq!(result.category, "Other");
    assert_eq!(result.urgency, Urgency::Medium);
    assert_eq!(result.confidence, None);
    assert_eq!(mock.call_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn text_classification_carries_no_confidence() {
    let mock = Arc::new(MockGenerativeClient::constant(
        "{\"category\": \"Garbage\", \"description\": \"Overflowing bin on Main St\", \"urgency\": \"low\"}",
    ));
    let gateway = gateway(mock);

    let result = gateway.classify_text("trash everywhere", None).await;

    assert_eq!(result.category, "Garbage");
    assert_eq!(result.description, "Overflowing bin on Main St");
    assert_eq!(result.urgency, Urgency::Low);
    assert_eq!(result.confidence, None);
}

#[tokio::test(start_paused = true)]
async fn empty_text_skips_the_provider() {
    let mock = Arc::new(MockGenerativeClient::constant("unused"));
    let gateway = gateway(mock.clone());

    let result = gateway.classify_text("   ", None).await;

    assert_eq!(result.description, "   ");
    assert_eq!(result.category, "Other");
    assert_eq!(mock.call_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn undecodable_image_skips_the_provider() {
    let mock = Arc::new(MockGenerativeClient::constant("unused"));
    let gateway = gateway(mock.clone());

    let result = gateway
        .classify_image(b"not an image".to_vec().into(), "image/png", None)
        .await;

    assert_eq!(result.category, "Other");
    assert_eq!(result.description, "Unable to analyze image - please try again");
    assert_eq!(result.confidence, Some(0));
    assert_eq!(mock.call_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn progress_callback_sees_each_retry() {
    let mock = Arc::new(
        MockGenerativeClient::constant(GOOD_IMAGE_JSON)
            .with_leading_failures(1, || Error::overloaded("503")),
    );
    let gateway = gateway(mock);

    let reported = Arc::new(Mutex::new(Vec::new()));
    let sink = reported.clone();
    let callback: RetryCallback = Arc::new(move |next, max| {
        sink.lock().unwrap().push((next, max));
    });

    let result = gateway
        .classify_image(tiny_png().into(), "image/png", Some(callback))
        .await;

    assert_eq!(result.category, "Pothole");
    assert_eq!(*reported.lock().unwrap(), vec![(2, 3)]);
}

#[tokio::test(start_paused = true)]
async fn garbage_response_degrades_to_generic_default() {
    let mock = Arc::new(MockGenerativeClient::constant(
        "I'm sorry, I cannot classify this image.",
    ));
    let gateway = gateway(mock.clone());

    let result = gateway
        .classify_image(tiny_png().into(), "image/png", None)
        .await;

    assert_eq!(result.category, "Other");
    assert_eq!(result.description, "Unable to analyze image - please try again");
    assert_eq!(result.confidence, Some(0));
    // Malformed responses are not retried.
    assert_eq!(mock.call_count(), 1);
}
