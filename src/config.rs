//! Configuration for the agreement kit.

use crate::http::HttpConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Service and transport configuration consumed by the controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgreementConfig {
    /// Base URL of the agreement endpoint
    #[serde(rename = "route")]
    pub service_route: String,

    /// Application identifier issued by the service
    pub app_id: String,

    /// Version of the host application
    #[serde(rename = "version")]
    pub app_version: String,

    /// Name of the agreement content to fetch
    #[serde(rename = "name")]
    pub content_name: String,

    /// Language used to localize the document
    #[serde(default = "default_language_tag")]
    pub language_tag: String,

    /// Device identifier; generated on first use when absent
    #[serde(default)]
    pub device_id: Option<String>,

    /// Per-request timeout
    #[serde(rename = "timeoutMs", with = "duration_millis", default = "default_timeout")]
    pub timeout: Duration,

    /// Sleep between retry attempts
    #[serde(
        rename = "retryBackoffMs",
        with = "duration_millis",
        default = "default_retry_backoff"
    )]
    pub retry_backoff: Duration,

    /// Retries after the first failed attempt
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_language_tag() -> String {
    "en".to_string()
}

const fn default_timeout() -> Duration {
    Duration::from_millis(5000)
}

const fn default_retry_backoff() -> Duration {
    Duration::from_millis(1000)
}

const fn default_max_retries() -> u32 {
    5
}

impl AgreementConfig {
    /// Create a configuration with default language and transport settings.
    pub fn new(
        service_route: impl Into<String>,
        app_id: impl Into<String>,
        app_version: impl Into<String>,
        content_name: impl Into<String>,
    ) -> Self {
        Self {
            service_route: service_route.into(),
            app_id: app_id.into(),
            app_version: app_version.into(),
            content_name: content_name.into(),
            language_tag: default_language_tag(),
            device_id: None,
            timeout: default_timeout(),
            retry_backoff: default_retry_backoff(),
            max_retries: default_max_retries(),
        }
    }

    pub fn with_language(mut self, language_tag: impl Into<String>) -> Self {
        self.language_tag = language_tag.into();
        self
    }

    pub fn with_device_id(mut self, device_id: impl Into<String>) -> Self {
        self.device_id = Some(device_id.into());
        self
    }

    /// Transport settings derived from this configuration.
    pub fn http_config(&self) -> HttpConfig {
        HttpConfig {
            timeout: self.timeout,
            max_retries: self.max_retries,
            retry_backoff: self.retry_backoff,
            retry_statuses: Vec::new(),
        }
    }

    /// Check that the required fields are usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let required = [
            ("route", &self.service_route),
            ("appId", &self.app_id),
            ("version", &self.app_version),
            ("name", &self.content_name),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(ConfigError::MissingField { field });
            }
        }
        if !self.service_route.starts_with("http://") && !self.service_route.starts_with("https://")
        {
            return Err(ConfigError::InvalidValue {
                field: "route",
                reason: format!("'{}' is not an http(s) URL", self.service_route),
            });
        }
        Ok(())
    }

    /// Load configuration from the default location, if present.
    pub fn load() -> Result<Option<Self>, ConfigError> {
        let config_path = Self::config_path();
        if config_path.exists() {
            Self::load_from(&config_path).map(Some)
        } else {
            Ok(None)
        }
    }

    /// Load configuration from a JSON file.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: AgreementConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::config_path())
    }

    /// Save configuration as pretty JSON.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("agreement-kit")
            .join("config.json")
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required field: {field}")]
    MissingField { field: &'static str },

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Serde support for Duration as whole milliseconds.
mod duration_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (duration.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
