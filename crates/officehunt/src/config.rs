//! Configuration management for officehunt.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default data directory name.
const DATA_DIR_NAME: &str = "officehunt";

/// Default database file name.
const DATABASE_FILE_NAME: &str = "hunt.db";

/// Default photo directory name.
const PHOTOS_DIR_NAME: &str = "photos";

/// Environment variable consulted when no API key is configured.
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `OFFICEHUNT_`)
/// 2. TOML config file at `~/.config/officehunt/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Classification endpoint configuration.
    pub server: ServerConfig,
    /// Vision model configuration.
    pub classifier: ClassifierConfig,
    /// Frame capture configuration.
    pub capture: CaptureConfig,
    /// Game configuration.
    pub game: GameConfig,
}

/// Local classification endpoint configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the endpoint listens on.
    pub bind_addr: String,
    /// Largest accepted request body in bytes.
    pub max_body_bytes: usize,
}

/// Vision model configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// API key for the hosted model. Falls back to `GEMINI_API_KEY`.
    pub api_key: Option<String>,
    /// Base URL of the model API.
    pub base_url: String,
    /// Model name.
    pub model: String,
    /// Request timeout in milliseconds.
    pub timeout_ms: u64,
    /// Sampling temperature.
    pub temperature: f32,
    /// Top-k sampling.
    pub top_k: u32,
    /// Top-p sampling.
    pub top_p: f32,
    /// Maximum tokens in the answer.
    pub max_output_tokens: u32,
    /// URL of the local classification endpoint used by `hunt play`.
    pub endpoint_url: String,
}

/// Frame capture configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Edge length of the square sent to the classifier, in pixels.
    pub size: u32,
    /// JPEG quality (1-100).
    pub jpeg_quality: u8,
    /// Ideal stream width requested from the camera.
    pub ideal_width: u32,
    /// Ideal stream height requested from the camera.
    pub ideal_height: u32,
}

/// Game configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// Number of items that must be found to complete the hunt.
    pub target_count: usize,
    /// Optional JSON item catalog. The built-in catalog is used when unset.
    pub items_path: Option<PathBuf>,
    /// Storage key holding the serialized game record.
    pub state_key: String,
    /// Path to the database file.
    /// Defaults to `~/.local/share/officehunt/hunt.db`
    pub database_path: Option<PathBuf>,
    /// Directory for captured photos.
    /// Defaults to `~/.local/share/officehunt/photos`
    pub photos_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:3000".to_string(),
            max_body_bytes: 1024 * 1024,
        }
    }
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            model: "gemini-1.5-flash".to_string(),
            timeout_ms: 10_000,
            temperature: 0.1,
            top_k: 1,
            top_p: 1.0,
            max_output_tokens: 10,
            endpoint_url: "http://127.0.0.1:3000/api/classify".to_string(),
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            size: 256,
            jpeg_quality: 80,
            ideal_width: 640,
            ideal_height: 480,
        }
    }
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            target_count: 5,
            items_path: None,
            state_key: "hunt_state_v1".to_string(),
            database_path: None, // Will be resolved to default at runtime
            photos_dir: None,
        }
    }
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_file))
            .merge(Env::prefixed("OFFICEHUNT_").split("__"));

        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(DATA_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Get the default data directory path.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from(".local/share"))
            .join(DATA_DIR_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        if self.server.bind_addr.parse::<SocketAddr>().is_err() {
            return Err(invalid(format!(
                "bind_addr is not a socket address: {}",
                self.server.bind_addr
            )));
        }

        if self.classifier.timeout_ms == 0 {
            return Err(invalid("timeout_ms must be greater than 0"));
        }

        if self.capture.size == 0 {
            return Err(invalid("capture size must be greater than 0"));
        }

        if !(1..=100).contains(&self.capture.jpeg_quality) {
            return Err(invalid(format!(
                "jpeg_quality must be between 1 and 100, got {}",
                self.capture.jpeg_quality
            )));
        }

        if self.game.target_count == 0 {
            return Err(invalid("target_count must be greater than 0"));
        }

        if self.game.state_key.trim().is_empty() {
            return Err(invalid("state_key must not be empty"));
        }

        Ok(())
    }

    /// Get the database path, resolving defaults if not set.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.game
            .database_path
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(DATABASE_FILE_NAME))
    }

    /// Get the photo directory, resolving defaults if not set.
    #[must_use]
    pub fn photos_dir(&self) -> PathBuf {
        self.game
            .photos_dir
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(PHOTOS_DIR_NAME))
    }

    /// Get the classifier timeout as a Duration.
    #[must_use]
    pub fn classifier_timeout(&self) -> Duration {
        Duration::from_millis(self.classifier.timeout_ms)
    }

    /// Resolve the model API key from configuration or the environment.
    ///
    /// A blank configured key counts as unset.
    #[must_use]
    pub fn api_key(&self) -> Option<String> {
        self.classifier
            .api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .or_else(|| std::env::var(API_KEY_ENV).ok())
            .filter(|key| !key.trim().is_empty())
    }
}

fn invalid(message: impl Into<String>) -> Error {
    Error::ConfigValidation {
        message: message.into(),
    }
}
