//! Client configuration management.
//!
//! This module handles loading the client configuration: the API base URL,
//! request timeout, login route and keychain service name.
//!
//! Configuration is stored at `~/.config/liftskit/config.json`. A `.env`
//! file is honored, and `LIFTSKIT_API_URL` overrides the stored base URL.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::auth::credentials::DEFAULT_SERVICE_NAME;

/// Application name used for the config directory path
const APP_NAME: &str = "liftskit";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Environment variable overriding the API base URL
pub const API_URL_ENV: &str = "LIFTSKIT_API_URL";

const DEFAULT_API_URL: &str = "http://localhost:4000";

/// HTTP request timeout in seconds.
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

const DEFAULT_LOGIN_ROUTE: &str = "/login";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_url: String,
    pub request_timeout_secs: u64,
    /// Route the app navigates to when a session is lost
    pub login_route: String,
    pub keyring_service: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            login_route: DEFAULT_LOGIN_ROUTE.to_string(),
            keyring_service: DEFAULT_SERVICE_NAME.to_string(),
        }
    }
}

impl Config {
    /// Load from the user config directory, then apply `.env` / environment overrides.
    pub fn load() -> Result<Self> {
        // Missing .env is fine
        let _ = dotenvy::dotenv();

        let mut config = Self::load_from(&Self::config_path()?)?;
        config.apply_env();
        Ok(config)
    }

    /// Load from an explicit file; a missing file yields defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    fn apply_env(&mut self) {
        self.override_api_url(std::env::var(API_URL_ENV).ok());
    }

    /// An empty override counts as unset.
    fn override_api_url(&mut self, url: Option<String>) {
        if let Some(url) = url.filter(|u| !u.is_empty()) {
            self.api_url = url;
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }
}
