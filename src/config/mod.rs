//! # Config Module
//!
//! Remote API configuration: base URL, team slug, and API key.
//!
//! ## Resolution Order
//! 1. Environment variables (`ANNO_FETCH_BASE_URL`, `ANNO_FETCH_TEAM`,
//!    `ANNO_FETCH_API_KEY`)
//! 2. TOML config file (`--config` flag, or
//!    `<config dir>/anno-fetch/config.toml`)
//! 3. Built-in defaults (base URL only; team and key have no default)

use crate::error::ConfigError;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Default API root of the annotation platform.
pub const DEFAULT_BASE_URL: &str = "https://darwin.v7labs.com/api";

const ENV_BASE_URL: &str = "ANNO_FETCH_BASE_URL";
const ENV_TEAM: &str = "ANNO_FETCH_TEAM";
const ENV_API_KEY: &str = "ANNO_FETCH_API_KEY";

/// Resolved configuration for talking to the remote dataset service.
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    /// API root, without a trailing slash.
    pub base_url: String,
    /// Team slug that scopes every dataset endpoint.
    pub team_slug: String,
    /// API key sent as `Authorization: ApiKey <key>`.
    pub api_key: String,
}

/// On-disk shape of the config file. All fields optional so a file can
/// hold just the team slug while the key comes from the environment.
#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    base_url: Option<String>,
    team_slug: Option<String>,
    api_key: Option<String>,
}

impl RemoteConfig {
    /// Load configuration from the given file (or the default location when
    /// `None`), then apply environment overrides.
    pub fn load(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let file = match config_path {
            Some(path) => read_config_file(path)?,
            None => match default_config_path() {
                Some(path) if path.exists() => read_config_file(&path)?,
                _ => ConfigFile::default(),
            },
        };

        let base_url = std::env::var(ENV_BASE_URL)
            .ok()
            .or(file.base_url)
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let team_slug = std::env::var(ENV_TEAM)
            .ok()
            .or(file.team_slug)
            .ok_or(ConfigError::MissingTeam)?;
        let api_key = std::env::var(ENV_API_KEY)
            .ok()
            .or(file.api_key)
            .ok_or(ConfigError::MissingApiKey)?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            team_slug,
            api_key,
        })
    }
}

/// Default config file location under the platform config directory.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("anno-fetch").join("config.toml"))
}

fn read_config_file(path: &Path) -> Result<ConfigFile, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&contents).map_err(|err| ConfigError::Parse {
        path: path.to_path_buf(),
        reason: err.to_string(),
    })
}
