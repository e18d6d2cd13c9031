//! Client configuration for `neuroscout`.
//!
//! Read from the TOML file given with `--config`, else `./neuroscout.toml`
//! when present, else built-in defaults. Environment variables override the
//! file.
//!
//! # Example
//!
//! ```toml
//! [api]
//! base_url = "https://neuroscout.org"
//! active_only = true
//!
//! [session]
//! store = "~/.neuroscout/store.json"
//! poll_interval_secs = 5
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use neuroscout_client::DEFAULT_BASE_URL;
use serde::{Deserialize, Serialize};

pub const DEFAULT_CONFIG_FILE: &str = "neuroscout.toml";
pub const API_URL_ENV: &str = "NEUROSCOUT_API_URL";
pub const TOKEN_ENV: &str = "NEUROSCOUT_TOKEN";
pub const STORE_ENV: &str = "NEUROSCOUT_STORE";

// ── Types ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiSettings,
    #[serde(default)]
    pub session: SessionSettings,
}

/// `[api]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiSettings {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Hide inactive datasets from listings.
    #[serde(default = "default_true")]
    pub active_only: bool,
    /// Bearer token from the environment; never read from or written to
    /// the config file.
    #[serde(skip)]
    pub token: Option<String>,
}

/// `[session]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSettings {
    /// Key/value store file (token, bookmarks). `~/` expands to `$HOME`.
    #[serde(default)]
    pub store: Option<String>,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_true() -> bool {
    true
}

fn default_poll_interval() -> u64 {
    5
}

impl Default for ApiSettings {
    fn default() -> Self {
        ApiSettings {
            base_url: default_base_url(),
            active_only: true,
            token: None,
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        SessionSettings {
            store: None,
            poll_interval_secs: default_poll_interval(),
        }
    }
}

// ── Functions ─────────────────────────────────────────────────────────────────

/// Read and parse a config TOML file from `path`.
///
/// Returns a human-readable error string on failure.
pub fn read_config(path: &Path) -> Result<Config, String> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("could not read '{}': {}", path.display(), e))?;

    toml::from_str(&content).map_err(|e| format!("could not parse '{}': {}", path.display(), e))
}

/// Resolve the effective configuration: file, then environment.
pub fn load(explicit: Option<&Path>) -> Result<Config, String> {
    let mut config = match explicit {
        Some(path) => read_config(path)?,
        None => {
            let default = Path::new(DEFAULT_CONFIG_FILE);
            if default.is_file() {
                read_config(default)?
            } else {
                Config::default()
            }
        }
    };
    config.apply_env(|key| std::env::var(key).ok());
    Ok(config)
}

impl Config {
    /// Apply environment overrides through `lookup`. Empty values count as
    /// unset.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(url) = get(API_URL_ENV) {
            self.api.base_url = url;
        }
        if let Some(token) = get(TOKEN_ENV) {
            self.api.token = Some(token);
        }
        if let Some(store) = get(STORE_ENV) {
            self.session.store = Some(store);
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.session.poll_interval_secs.max(1))
    }

    /// Store file path with `~/` expanded.
    pub fn store_path(&self) -> PathBuf {
        let home = std::env::var_os("HOME").map(PathBuf::from);
        let raw = self
            .session
            .store
            .clone()
            .unwrap_or_else(|| "~/.neuroscout/store.json".to_string());
        expand_home(&raw, home.as_deref())
    }
}

fn expand_home(raw: &str, home: Option<&Path>) -> PathBuf {
    match (raw.strip_prefix("~/"), home) {
        (Some(rest), Some(home)) => home.join(rest),
        (Some(rest), None) => PathBuf::from(rest),
        (None, _) => PathBuf::from(raw),
    }
}
