//! Worker and runtime configuration.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

/// Query parameter on the activation URL that switches the cache on.
pub const ENABLE_CACHE_PARAM: &str = "enableCache";

/// Errors loading worker configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse TOML config: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("failed to parse JSON config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid precache URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
}

/// Configuration resolved at activation time.
///
/// A new value is derived on every activation and handed to the components
/// built for that activation; it is never mutated afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Whether the cache-aside strategy reads and writes the cache.
    pub cache_enabled: bool,
}

impl RuntimeConfig {
    /// Create a runtime configuration.
    pub fn new(cache_enabled: bool) -> Self {
        Self { cache_enabled }
    }

    /// Resolve from the query string of the activation URL.
    ///
    /// Only the literal value `"true"` enables the cache.
    pub fn from_activation_url(url: &Url) -> Self {
        let cache_enabled = url
            .query_pairs()
            .find(|(key, _)| key == ENABLE_CACHE_PARAM)
            .is_some_and(|(_, value)| value == "true");
        Self { cache_enabled }
    }
}

/// Deploy-time worker configuration.
///
/// Forwarded requests wait at most [`reply_timeout_ms`](Self::reply_timeout_ms)
/// (30 seconds unless configured) for their correlated reply and then fail
/// with a timeout. Set `wait_forever = true` to wait without a bound, in
/// which case a forward whose reply never arrives stays pending until its
/// caller gives up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Name of the cache namespace.
    #[serde(default = "default_cache_name")]
    pub cache_name: String,

    /// Name of the broadcast channel shared with the page.
    #[serde(default = "default_channel_name")]
    pub channel_name: String,

    /// URLs seeded into the cache at install time.
    #[serde(default)]
    pub precache_urls: Vec<String>,

    /// Bounded wait for a correlated reply, in milliseconds. Ignored when
    /// `wait_forever` is set.
    #[serde(default = "default_reply_timeout_ms")]
    pub reply_timeout_ms: u64,

    /// Wait for correlated replies without a bound. Off by default.
    #[serde(default)]
    pub wait_forever: bool,

    /// URL suffix that receives cross-origin isolation headers.
    #[serde(default = "default_isolation_suffix")]
    pub isolation_suffix: String,
}

fn default_cache_name() -> String {
    "edge-offline-v1".to_string()
}

fn default_channel_name() -> String {
    "edge-intercept-v1".to_string()
}

fn default_reply_timeout_ms() -> u64 {
    30_000
}

fn default_isolation_suffix() -> String {
    "widget.mjs".to_string()
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            cache_name: default_cache_name(),
            channel_name: default_channel_name(),
            precache_urls: Vec::new(),
            reply_timeout_ms: default_reply_timeout_ms(),
            wait_forever: false,
            isolation_suffix: default_isolation_suffix(),
        }
    }
}

impl WorkerConfig {
    /// Load config from a file. `.json` files are parsed as JSON, anything
    /// else as TOML.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;

        if path.extension().is_some_and(|ext| ext == "json") {
            Self::from_json_str(&content)
        } else {
            Self::from_toml_str(&content)
        }
    }

    /// Parse from a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Parse from a JSON document.
    pub fn from_json_str(content: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(content)?)
    }

    /// Set the precache URL list.
    pub fn with_precache_urls(mut self, urls: Vec<String>) -> Self {
        self.precache_urls = urls;
        self
    }

    /// Set the bounded reply wait.
    pub fn with_reply_timeout(mut self, timeout: Duration) -> Self {
        self.reply_timeout_ms = timeout.as_millis() as u64;
        self.wait_forever = false;
        self
    }

    /// Wait for correlated replies without a bound.
    pub fn waiting_forever(mut self) -> Self {
        self.wait_forever = true;
        self
    }

    /// The reply wait bound, or `None` to wait forever.
    pub fn reply_timeout(&self) -> Option<Duration> {
        if self.wait_forever {
            None
        } else {
            Some(Duration::from_millis(self.reply_timeout_ms))
        }
    }

    /// Parse the precache list into absolute URLs.
    pub fn parsed_precache_urls(&self) -> Result<Vec<Url>, ConfigError> {
        self.precache_urls
            .iter()
            .map(|url| {
                Url::parse(url).map_err(|source| ConfigError::InvalidUrl {
                    url: url.clone(),
                    source,
                })
            })
            .collect()
    }
}
