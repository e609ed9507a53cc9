//! Configuration management
//!
//! Loads configuration from config.toml at startup.
//! Feed endpoints, poll cadence and requested fields are all tunable.

use crate::core::{DisplayMode, FieldError, FieldLayout, FieldSpec};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub feed: FeedConfig,

    #[serde(default)]
    pub poll: PollConfig,

    #[serde(default)]
    pub store: StoreConfig,

    /// Autocomplete relay server settings
    #[serde(default)]
    pub api: ApiConfig,
}

/// Remote feed endpoints
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FeedConfig {
    /// Quote CSV endpoint (`?s=...&f=...` is appended)
    #[serde(default = "default_quote_url")]
    pub quote_url: String,

    /// Ticker autocomplete endpoint
    #[serde(default = "default_autocomplete_url")]
    pub autocomplete_url: String,

    /// JSONP callback name the autocomplete feed wraps answers in
    #[serde(default = "default_callback")]
    pub callback: String,

    /// Chart image service
    #[serde(default = "default_chart_url")]
    pub chart_url: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PollConfig {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Requested quote fields, in column order
    #[serde(default = "default_fields")]
    pub fields: Vec<String>,

    #[serde(default)]
    pub display_mode: DisplayMode,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StoreConfig {
    /// JSON file holding the tracked instruments
    #[serde(default = "default_store_path")]
    pub path: PathBuf,

    /// Import link applied once at startup
    #[serde(default)]
    pub import_url: Option<String>,

    /// Portfolio title and chart range selection
    #[serde(default = "default_preferences_path")]
    pub preferences_path: PathBuf,

    /// Title shown when none was stored
    #[serde(default = "default_title")]
    pub default_title: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
    #[serde(default = "default_api_enabled")]
    pub enabled: bool,

    #[serde(default = "default_api_port")]
    pub port: u16,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            quote_url: default_quote_url(),
            autocomplete_url: default_autocomplete_url(),
            callback: default_callback(),
            chart_url: default_chart_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            fields: default_fields(),
            display_mode: DisplayMode::default(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
            import_url: None,
            preferences_path: default_preferences_path(),
            default_title: default_title(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            enabled: default_api_enabled(),
            port: default_api_port(),
        }
    }
}

fn default_quote_url() -> String {
    "http://download.finance.yahoo.com/d/quotes.csv".to_string()
}

fn default_autocomplete_url() -> String {
    "http://d.yimg.com/autoc.finance.yahoo.com/autoc".to_string()
}

fn default_callback() -> String {
    crate::feed::autocomplete::DEFAULT_CALLBACK.to_string()
}

fn default_chart_url() -> String {
    crate::feed::chart::DEFAULT_CHART_URL.to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_interval_secs() -> u64 {
    45 // feed refreshes about once a minute
}

fn default_fields() -> Vec<String> {
    FieldLayout::quotes()
        .fields()
        .iter()
        .map(|f| f.as_str().to_string())
        .collect()
}

fn default_store_path() -> PathBuf {
    PathBuf::from("stocks.json")
}

fn default_preferences_path() -> PathBuf {
    PathBuf::from("preferences.json")
}

fn default_title() -> String {
    "My Portfolio".to_string()
}

fn default_api_enabled() -> bool {
    true
}

fn default_api_port() -> u16 {
    3023
}

impl Config {
    /// Load configuration from config.toml file
    ///
    /// If the file doesn't exist, returns default configuration.
    /// # Errors
    /// Returns error if file exists but cannot be parsed.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path =
            std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());

        match std::fs::read_to_string(&config_path) {
            Ok(contents) => Self::from_toml(&contents),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Config::default()),
            Err(e) => Err(ConfigError::Io(e)),
        }
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Requested poll fields as a layout
    pub fn poll_layout(&self) -> Result<FieldLayout, FieldError> {
        FieldLayout::from_names(&self.poll.fields)
    }

    /// Poll interval, never below one second
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll.interval_secs.max(1))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.feed.timeout_secs.max(1))
    }

    /// Whether the layout carries a quote time column
    pub fn has_quote_time(&self) -> bool {
        self.poll_layout()
            .map(|layout| layout.position(FieldSpec::LastTime).is_some())
            .unwrap_or(false)
    }
}

/// Configuration loading errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(String),
}
