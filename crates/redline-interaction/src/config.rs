//! Endpoint configuration.
//!
//! Load order: `~/.config/redline/endpoints.toml` when present, then
//! environment variables (`REDLINE_CHAT_URL`, `REDLINE_IMAGE_URL`),
//! then built-in defaults.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_CHAT_URL: &str = "http://localhost:9000/editor-chatbot";
const DEFAULT_IMAGE_URL: &str = "http://localhost:9000/api/image";
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Base URLs and timeout for the chat and image endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EndpointConfig {
    #[serde(default = "default_chat_url")]
    pub chat_url: String,
    #[serde(default = "default_image_url")]
    pub image_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_chat_url() -> String {
    DEFAULT_CHAT_URL.to_string()
}

fn default_image_url() -> String {
    DEFAULT_IMAGE_URL.to_string()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            chat_url: default_chat_url(),
            image_url: default_image_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl EndpointConfig {
    /// Loads the configuration: file first, environment second,
    /// defaults last.
    pub fn load() -> Result<Self> {
        if let Some(path) = config_path() {
            if path.exists() {
                return Self::from_path(&path);
            }
        }
        Ok(Self::from_env())
    }

    /// Parses the configuration from a TOML file.
    pub fn from_path(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read endpoint config at {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("failed to parse endpoint config at {}", path.display()))
    }

    /// Builds the configuration from environment variables, falling back
    /// to the defaults for anything unset.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            chat_url: env::var("REDLINE_CHAT_URL").unwrap_or(defaults.chat_url),
            image_url: env::var("REDLINE_IMAGE_URL").unwrap_or(defaults.image_url),
            timeout_secs: env::var("REDLINE_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.timeout_secs),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// `~/.config/redline/endpoints.toml`, when a home directory exists.
fn config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".config").join("redline").join("endpoints.toml"))
}
