//! Configuration for a mirror run, optionally loaded from a TOML file.
//!
//! The config file is optional: a missing file yields `Config::default()`,
//! which reproduces the mirror's built-in feed, paths and retention.
//! Unknown keys are ignored by serde, though we log a warning when the file
//! contains potential typos.
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// SEC-014: Config file exceeds maximum allowed size.
    #[error("Config file too large: {0}")]
    TooLarge(String),

    #[error("Invalid config value: {0}")]
    Invalid(String),
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Top-level configuration for one mirror run.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// URL of the single remote RSS feed being mirrored.
    pub feed_url: String,

    /// JSON file holding the item store between runs.
    pub store_path: PathBuf,

    /// RSS file written at the end of every successful run.
    pub output_path: PathBuf,

    /// Items first seen longer ago than this are purged.
    pub retention_days: u32,

    /// Fetch each item's page to look for an `og:image` preview.
    pub resolve_previews: bool,

    pub http: HttpSettings,

    pub channel: ChannelConfig,
}

/// HTTP client behaviour shared by the feed fetcher and preview resolver.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    pub user_agent: String,
    pub feed_timeout_secs: u64,
    pub preview_timeout_secs: u64,
    /// Upper bound for any response body, feed or article page.
    pub max_body_bytes: usize,
}

/// Fixed metadata of the rendered channel.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    pub title: String,
    pub link: String,
    pub description: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            feed_url: "https://www.newsweek.pl/.feed".to_string(),
            store_path: PathBuf::from("data/newsweek_store.json"),
            output_path: PathBuf::from("docs/newsweek.xml"),
            retention_days: 7,
            resolve_previews: true,
            http: HttpSettings::default(),
            channel: ChannelConfig::default(),
        }
    }
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            user_agent: "Mozilla/5.0 (RSS cache)".to_string(),
            feed_timeout_secs: 30,
            preview_timeout_secs: 20,
            max_body_bytes: 10 * 1024 * 1024, // 10MB
        }
    }
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            title: "Newsweek – cache (5h, 7 dni)".to_string(),
            link: "https://www.newsweek.pl/".to_string(),
            description: "Lustrzany cache jednego feedu, odświeżany co 5 godzin".to_string(),
        }
    }
}

impl HttpSettings {
    pub fn feed_timeout(&self) -> Duration {
        Duration::from_secs(self.feed_timeout_secs)
    }

    pub fn preview_timeout(&self) -> Duration {
        Duration::from_secs(self.preview_timeout_secs)
    }
}

impl Config {
    /// SEC-014: Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: [&'static str; 7] = [
        "feed_url",
        "store_path",
        "output_path",
        "retention_days",
        "resolve_previews",
        "http",
        "channel",
    ];

    /// Retention window as a chrono duration, for pruning.
    pub fn retention(&self) -> chrono::Duration {
        chrono::Duration::days(i64::from(self.retention_days))
    }

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Out-of-range values → `Err(ConfigError::Invalid)`
    /// - Unknown keys → silently accepted, logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        // SEC-014: Check file size before reading to prevent memory exhaustion
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = std::fs::read_to_string(path)?;
        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !Self::KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        tracing::info!(path = %path.display(), feed = %config.feed_url, "Loaded configuration");
        Ok(config)
    }

    /// Rejects values that would make a run meaningless.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.feed_url.trim().is_empty() {
            return Err(ConfigError::Invalid("feed_url must not be empty".into()));
        }
        if self.retention_days == 0 {
            return Err(ConfigError::Invalid(
                "retention_days must be at least 1".into(),
            ));
        }
        if self.http.feed_timeout_secs == 0 || self.http.preview_timeout_secs == 0 {
            return Err(ConfigError::Invalid("HTTP timeouts must be non-zero".into()));
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
