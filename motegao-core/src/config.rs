// Client configuration: JSON file plus environment overrides

use crate::error::{CoreError, Result};
use motegao_client::client::DEFAULT_BASE_URL;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_CONFIG_DIR: &str = "~/.config/motegao/";
pub const CONFIG_FILE: &str = "config.json";
pub const SESSION_DB_FILE: &str = "session.db";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiSettings {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: 30,
        }
    }
}

/// Identity-provider settings. Carried for the front end; the exchange
/// itself happens elsewhere.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthSettings {
    pub google_client_id: Option<String>,
    pub google_client_secret: Option<String>,
    pub session_secret: Option<String>,
    pub callback_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api: ApiSettings,
    pub auth: AuthSettings,
    /// Delay between status checks of a running task
    pub poll_interval_ms: u64,
    /// Save the project after every structural change
    pub autosave: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api: ApiSettings::default(),
            auth: AuthSettings::default(),
            poll_interval_ms: 2000,
            autosave: true,
        }
    }
}

impl Config {
    /// Read the config file if it exists, otherwise start from defaults.
    /// Environment overrides are applied either way.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            debug!("Loading config from {}", path.display());
            let content = fs::read_to_string(path)?;
            serde_json::from_str(&content)?
        } else {
            debug!("No config at {}, using defaults", path.display());
            Config::default()
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("MOTEGAO_API_URL") {
            self.api.base_url = url;
        }
        if let Some(ms) = lookup("MOTEGAO_POLL_INTERVAL_MS") {
            self.poll_interval_ms = parse_number("MOTEGAO_POLL_INTERVAL_MS", &ms)?;
        }
        if let Some(secs) = lookup("MOTEGAO_TIMEOUT_SECS") {
            self.api.timeout_secs = parse_number("MOTEGAO_TIMEOUT_SECS", &secs)?;
        }
        if let Some(v) = lookup("GOOGLE_CLIENT_ID") {
            self.auth.google_client_id = Some(v);
        }
        if let Some(v) = lookup("GOOGLE_CLIENT_SECRET") {
            self.auth.google_client_secret = Some(v);
        }
        if let Some(v) = lookup("MOTEGAO_SESSION_SECRET") {
            self.auth.session_secret = Some(v);
        }
        if let Some(v) = lookup("MOTEGAO_CALLBACK_URL") {
            self.auth.callback_url = Some(v);
        }
        if self.poll_interval_ms == 0 {
            return Err(CoreError::Config("poll_interval_ms must be positive".to_string()));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

fn parse_number(key: &str, value: &str) -> Result<u64> {
    value
        .trim()
        .parse()
        .map_err(|_| CoreError::Config(format!("{} must be a number, got '{}'", key, value)))
}

/// Expand `~` in a user-supplied config directory
pub fn config_dir(raw: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(raw).as_ref())
}
