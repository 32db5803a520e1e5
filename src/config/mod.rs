//! Configuration and session storage locations

pub mod storage;

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::auth::session::DEFAULT_SESSION_KEY;
use crate::auth::AuthConfig;

const DEFAULT_REGION: &str = "us-east-2";
const DEFAULT_CLIENT_ID: &str = "47edciociemavkgvunh74u1pp8";
const DEFAULT_API_BASE: &str = "https://t19fbnere7.execute-api.us-east-2.amazonaws.com/prod";

/// Application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// AWS region of the Cognito user pool
    pub region: String,
    /// Cognito app client ID
    pub client_id: String,
    /// Cognito endpoint override; the regional endpoint when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cognito_endpoint: Option<String>,
    /// Base URL of the storefront API gateway stage
    pub api_base: String,
    /// Storage key of the session record
    pub session_key: String,
    /// Timeout for every HTTP request, in seconds
    pub http_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            region: DEFAULT_REGION.to_string(),
            client_id: DEFAULT_CLIENT_ID.to_string(),
            cognito_endpoint: None,
            api_base: DEFAULT_API_BASE.to_string(),
            session_key: DEFAULT_SESSION_KEY.to_string(),
            http_timeout_secs: 30,
        }
    }
}

impl Config {
    /// Get config directory path
    fn config_dir() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("com", "pixorus", "pixorus-cli")
            .context("Could not determine config directory")?;
        Ok(proj_dirs.config_dir().to_path_buf())
    }

    /// Get config file path
    fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Directory holding durable session records
    pub fn session_dir() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("session"))
    }

    /// Load configuration from disk, then apply environment overrides
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::config_path()?)?;
        config.apply_overrides(|name| std::env::var(name).ok());
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).context("Failed to read config file")?;
        toml::from_str(&content).context("Failed to parse config file")
    }

    /// Save configuration to disk
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).context("Failed to create config directory")?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, content).context("Failed to write config file")?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = fs::Permissions::from_mode(0o600);
            fs::set_permissions(path, perms).context("Failed to set config permissions")?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        if let Some(v) = non_empty("PIXORUS_API_BASE") {
            self.api_base = v;
        }
        if let Some(v) = non_empty("PIXORUS_CLIENT_ID") {
            self.client_id = v;
        }
        if let Some(v) = non_empty("PIXORUS_REGION") {
            self.region = v;
        }
        if let Some(v) = non_empty("PIXORUS_COGNITO_ENDPOINT") {
            self.cognito_endpoint = Some(v);
        }
    }

    pub fn auth_config(&self) -> AuthConfig {
        AuthConfig {
            client_id: self.client_id.clone(),
            region: self.region.clone(),
            endpoint: self.cognito_endpoint.clone(),
        }
    }

    /// Shared HTTP client for the identity provider and the API
    pub fn http_client(&self) -> Result<reqwest::Client> {
        reqwest::Client::builder()
            .timeout(Duration::from_secs(self.http_timeout_secs))
            .build()
            .context("Failed to build HTTP client")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("config.toml")).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.session_key, "pixorus_auth");
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "api_base = \"http://localhost:3000\"\n").unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.api_base, "http://localhost:3000");
        assert_eq!(config.region, DEFAULT_REGION);
        assert_eq!(config.http_timeout_secs, 30);
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let config = Config {
            region: "eu-west-1".into(),
            http_timeout_secs: 5,
            ..Config::default()
        };
        tokio_test::assert_ok!(config.save_to(&path));
        let loaded = tokio_test::assert_ok!(Config::load_from(&path));
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "http_timeout_secs = \"soon\"").unwrap();
        assert!(Config::load_from(&path).is_err());
    }

    #[test]
    fn test_env_overrides_skip_blank_values() {
        let mut config = Config::default();
        config.apply_overrides(|name| match name {
            "PIXORUS_API_BASE" => Some("http://api.test".into()),
            "PIXORUS_REGION" => Some("  ".into()),
            "PIXORUS_COGNITO_ENDPOINT" => Some("http://localhost:9229/".into()),
            _ => None,
        });
        assert_eq!(config.api_base, "http://api.test");
        assert_eq!(config.region, DEFAULT_REGION);
        assert_eq!(config.auth_config().region, DEFAULT_REGION);
        assert_eq!(config.auth_config().endpoint(), "http://localhost:9229/");
    }
}
