#![deny(unused)]
//! CiviScan - Resilient Civic-Issue Classification Gateway
//!
//! Accepts issue photos and free-text descriptions, classifies them through
//! a generative-AI provider behind process-wide rate limiting and bounded
//! retry, and always answers with a well-formed result.

use std::sync::Arc;
use std::time::Duration;

use secrecy::Secret;

use civiscan_core::config::AppConfig;
use civiscan_gateway::{
    ClassificationGateway, GatewayServer, RateLimiter, RetryPolicy, ServerConfig,
};
use civiscan_provider::create_client_from_config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    configure_tracing();

    tracing::info!("Starting CiviScan v{}", env!("CARGO_PKG_VERSION"));

    // =========================================================================
    // Configuration
    // =========================================================================
    let mut config = match AppConfig::load() {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!("Failed to load config files ({e}), using defaults");
            AppConfig::default()
        }
    };

    if config.provider.api_key.is_none() {
        if let Ok(key) = std::env::var("GEMINI_API_KEY") {
            config.provider.api_key = Some(Secret::new(key));
        }
    }
    if config.provider.api_key.is_none() {
        // Startup is the only place a missing key is surfaced; the gateway
        // itself never degrades over configuration.
        anyhow::bail!(
            "GEMINI_API_KEY is not set. The classification gateway cannot start without a provider key."
        );
    }

    // =========================================================================
    // Provider client
    // =========================================================================
    let client = Arc::new(create_client_from_config(&config.provider)?);
    tracing::info!(
        text_model = %config.provider.text_model,
        vision_model = %config.provider.vision_model,
        "Provider client initialized"
    );

    // =========================================================================
    // Classification gateway
    // =========================================================================
    let limiter = Arc::new(RateLimiter::new(Duration::from_millis(
        config.classifier.min_interval_ms,
    )));
    let retry = RetryPolicy::new(
        config.classifier.max_retries,
        Duration::from_millis(config.classifier.base_delay_ms),
    )
    .with_attempt_timeout(Duration::from_millis(config.provider.request_timeout_ms));

    let gateway = ClassificationGateway::new(client)
        .with_rate_limiter(limiter)
        .with_retry_policy(retry);

    tracing::info!(
        min_interval_ms = config.classifier.min_interval_ms,
        max_retries = config.classifier.max_retries,
        base_delay_ms = config.classifier.base_delay_ms,
        "Classification gateway initialized"
    );

    // =========================================================================
    // Observability & server
    // =========================================================================
    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new().install_recorder()?;

    let server_config = ServerConfig {
        host: config.server.host.clone(),
        port: config.server.port,
        ..Default::default()
    };

    let server = GatewayServer::new(server_config, gateway).with_metrics(metrics_handle);

    println!();
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║                        CiviScan v{}                        ║", env!("CARGO_PKG_VERSION"));
    println!("╠══════════════════════════════════════════════════════════════╣");
    println!("║  Endpoints:                                                   ║");
    println!("║    GET  /health             - Health check                   ║");
    println!("║    POST /v1/classify/text   - Classify a text description    ║");
    println!("║    POST /v1/classify/image  - Classify an issue photo        ║");
    println!("║    GET  /metrics            - Prometheus metrics             ║");
    println!("╠══════════════════════════════════════════════════════════════╣");
    println!("║  Server: http://{}:{}                                ║", config.server.host, config.server.port);
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();

    server.run().await?;

    Ok(())
}

fn configure_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "info,civiscan=debug".into()),
    );

    tracing_subscriber::fmt().with_env_filter(env_filter).init();
}
