use config::{Config, ConfigError, Environment, File};
use secrecy::Secret;
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub provider: ProviderConfig,
    pub classifier: ClassifierConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ProviderConfig {
    pub base_url: String,
    pub text_model: String,
    pub vision_model: String,
    pub request_timeout_ms: u64,
    pub api_key: Option<Secret<String>>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ClassifierConfig {
    /// Minimum spacing between outbound provider calls, process-wide.
    pub min_interval_ms: u64,
    /// Total attempts per classification, including the first.
    pub max_retries: u32,
    /// Base backoff delay; retry n waits `base_delay_ms * 2^n`.
    pub base_delay_ms: u64,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("CIVISCAN_ENV").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            .add_source(File::with_name("config/default"))
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            .add_source(File::with_name("config/local").required(false))
            // Map APP__SERVER__PORT=8080 to app.server.port
            .add_source(Environment::with_prefix("APP").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".into(),
                port: 8080,
            },
            provider: ProviderConfig {
                base_url: "https://generativelanguage.googleapis.com".into(),
                text_model: "gemini-pro".into(),
                vision_model: "gemini-pro-vision".into(),
                request_timeout_ms: 30_000,
                api_key: None,
            },
            classifier: ClassifierConfig {
                min_interval_ms: 2_000,
                max_retries: 3,
                base_delay_ms: 1_000,
            },
        }
    }
}
