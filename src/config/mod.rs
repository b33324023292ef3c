use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::tui::theme::ThemeConfig;

/// Public deployment of the tasky backend.
pub const DEFAULT_API_URL: &str = "https://tasky-961y.onrender.com";

/// Environment variable that overrides `api_url` from `config.toml`.
pub const API_URL_ENV: &str = "TASKY_API_URL";

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Base URL of the task API. Default: the public deployment
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Per-request timeout in seconds. Default: none, requests run to completion
    #[serde(default)]
    pub timeout_secs: Option<u64>,

    /// Level for `~/.tasky/tasky.log` (`error`, `warn`, `info`, `debug`, `trace`)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub notifications: NotificationConfig,

    #[serde(default)]
    pub theme: ThemeConfig,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            api_url: default_api_url(),
            timeout_secs: None,
            log_level: default_log_level(),
            notifications: NotificationConfig::default(),
            theme: ThemeConfig::default(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct NotificationConfig {
    /// How long a notification stays on screen. Default: 5
    #[serde(default = "default_notification_seconds")]
    pub seconds: u64,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        NotificationConfig {
            seconds: default_notification_seconds(),
        }
    }
}

impl NotificationConfig {
    pub fn duration(&self) -> Duration {
        Duration::from_secs(self.seconds)
    }
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_notification_seconds() -> u64 {
    5
}

impl Config {
    /// Parse a `config.toml` body. Missing keys take their defaults.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).context("invalid config.toml")?;
        Ok(config)
    }

    /// Apply an explicit API URL override (env var or `--api-url`).
    pub fn with_api_url(mut self, url: Option<String>) -> Self {
        if let Some(url) = url.filter(|u| !u.trim().is_empty()) {
            self.api_url = url;
        }
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

/// Returns the base tasky directory: ~/.tasky/
pub fn base_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().context("could not determine home directory")?;
    Ok(home.join(".tasky"))
}

pub fn config_path() -> Result<PathBuf> {
    Ok(base_dir()?.join("config.toml"))
}

/// Durable credential storage (the three session entries)
pub fn session_path() -> Result<PathBuf> {
    Ok(base_dir()?.join("session.json"))
}

pub fn log_path() -> Result<PathBuf> {
    Ok(base_dir()?.join("tasky.log"))
}

pub fn ensure_dirs() -> Result<()> {
    let base = base_dir()?;
    fs::create_dir_all(&base).context("failed to create ~/.tasky/")?;
    Ok(())
}

/// Load config from ~/.tasky/config.toml (or defaults), then apply `TASKY_API_URL`.
pub fn load() -> Result<Config> {
    let path = config_path()?;
    let config = if path.exists() {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Config::from_toml(&content).with_context(|| format!("failed to parse {}", path.display()))?
    } else {
        Config::default()
    };
    Ok(config.with_api_url(std::env::var(API_URL_ENV).ok()))
}

/// Route `tracing` output to ~/.tasky/tasky.log so it never lands on the TUI screen.
pub fn init_logging(config: &Config) -> Result<()> {
    let path = log_path()?;
    let file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("failed to open {}", path.display()))?;

    let level = config
        .log_level
        .parse::<tracing::Level>()
        .unwrap_or(tracing::Level::INFO);

    tracing_subscriber::fmt()
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_max_level(level)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to install log subscriber: {e}"))?;
    Ok(())
}
