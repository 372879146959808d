//! Application configuration
//!
//! Settings are layered: built-in defaults, then an optional TOML file,
//! then environment variables.
//!
//! # Environment Variables
//! - `MATANEST_CONFIG`: path of the TOML file (default: "matanest.toml")
//! - `MATANEST__<SECTION>__<KEY>`: override any key, e.g. `MATANEST__SERVER__PORT=8080`
//!
//! The model credential is not part of this configuration; it is read by
//! the binary and handed to the generation client directly.

use config::builder::DefaultState;
use config::{ConfigBuilder, Environment, File};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;

use crate::error::SettingsError;
use crate::intake::IntakeLimits;
use crate::models::GenerationSettings;

/// HTTP server settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Upper bound for one upload request body
    pub max_request_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3001,
            max_request_bytes: 512 * 1024 * 1024,
        }
    }
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Multimodal model endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub base_url: String,
    pub model: String,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            model: "gemini-2.5-flash".to_string(),
        }
    }
}

/// Complete application configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    /// Settings used when a run does not supply its own
    pub generation: GenerationSettings,
    pub intake: IntakeLimits,
    pub model: ModelConfig,
}

impl AppConfig {
    /// Load from `MATANEST_CONFIG` (or `matanest.toml`) and the environment
    pub fn load() -> Result<Self, SettingsError> {
        let path = env::var("MATANEST_CONFIG").unwrap_or_else(|_| "matanest.toml".to_string());

        let builder = config::Config::builder()
            .add_source(File::from(Path::new(&path)).required(false))
            .add_source(
                Environment::with_prefix("MATANEST")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("intake.accepted_types"),
            );

        Self::build(builder)
    }

    fn build(builder: ConfigBuilder<DefaultState>) -> Result<Self, SettingsError> {
        let config: AppConfig = builder.build()?.try_deserialize()?;
        config.generation.validate()?;
        Ok(config)
    }
}
