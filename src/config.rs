//! Configuration for the studio service

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::PathBuf;

use crate::normalizer::NormalizerPolicy;

/// Generation webhook used when nothing else is configured
pub const DEFAULT_WEBHOOK_URL: &str = "http://localhost:5678/webhook/fashion-style-transfer";

/// Main application settings
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub webhook: WebhookSettings,
    pub generation: GenerationSettings,
    pub normalizer: NormalizerPolicy,
    pub upload: UploadSettings,
    pub log: LogSettings,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// Largest accepted request body; a 10 MB photo grows by a third as a data URI
    pub body_limit_bytes: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        ServerSettings {
            host: "0.0.0.0".to_string(),
            port: 3000,
            body_limit_bytes: 16 * 1024 * 1024,
        }
    }
}

/// Outbound generation webhook
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WebhookSettings {
    pub url: String,
    /// Unset leaves the transport default in place
    pub timeout_secs: Option<u64>,
}

impl Default for WebhookSettings {
    fn default() -> Self {
        WebhookSettings {
            url: DEFAULT_WEBHOOK_URL.to_string(),
            timeout_secs: None,
        }
    }
}

/// Where generated images come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationMode {
    #[default]
    Webhook,
    /// No network: the input image is echoed back `quantity` times
    Echo,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GenerationSettings {
    pub mode: GenerationMode,
    pub echo_delay_ms: u64,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        GenerationSettings {
            mode: GenerationMode::Webhook,
            echo_delay_ms: 3000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UploadSettings {
    pub max_bytes: usize,
}

impl Default for UploadSettings {
    fn default() -> Self {
        UploadSettings { max_bytes: 10 * 1024 * 1024 }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    pub json: bool,
}

impl Settings {
    /// Load configuration from files and environment variables
    ///
    /// Configuration priority (highest to lowest):
    /// 1. Environment variables (prefixed with STUDIO__)
    /// 2. config/local.toml (gitignored)
    /// 3. config/default.toml
    pub fn load() -> Result<Self, ConfigError> {
        let config_dir = std::env::var("CONFIG_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config"));

        let builder = Config::builder()
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            .add_source(File::from(config_dir.join("local.toml")).required(false))
            // STUDIO__WEBHOOK__URL, STUDIO__GENERATION__MODE, etc.
            .add_source(
                Environment::with_prefix("STUDIO")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
