use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};

pub const DEFAULT_CONFIG_PATH: &str = "~/.tollgate/config.toml";
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8080/api";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_REFRESH_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_MAX_PAYLOAD_BYTES: usize = 50 * 1024 * 1024;

pub const BASE_URL_ENV: &str = "TOLLGATE_BASE_URL";
pub const TIMEOUT_ENV: &str = "TOLLGATE_TIMEOUT_SECS";

/// Settings for one API client instance
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Prefix for every request path, without a trailing slash
    pub base_url: String,
    /// Upper bound for any single call, including reading the body
    pub request_timeout: Duration,
    /// Upper bound for the token refresh call
    pub refresh_timeout: Duration,
    /// Largest request or response body accepted, in bytes
    pub max_payload_bytes: usize,
    pub user_agent: String,
}

/// Values from command-line flags; they win over file and environment
#[derive(Debug, Clone, Default)]
pub struct ClientConfigOverrides {
    pub base_url: Option<String>,
    pub timeout_secs: Option<u64>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            refresh_timeout: Duration::from_secs(DEFAULT_REFRESH_TIMEOUT_SECS),
            max_payload_bytes: DEFAULT_MAX_PAYLOAD_BYTES,
            user_agent: default_user_agent(),
        }
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_refresh_timeout(mut self, timeout: Duration) -> Self {
        self.refresh_timeout = timeout;
        self
    }

    pub fn with_max_payload_bytes(mut self, limit: usize) -> Self {
        self.max_payload_bytes = limit;
        self
    }

    /// Load from `config_path` (default `~/.tollgate/config.toml`), then apply
    /// environment and flag overrides. A missing file yields the defaults.
    pub fn load(config_path: Option<&Path>, overrides: &ClientConfigOverrides) -> Result<Self> {
        let path = config_path
            .map(Path::to_path_buf)
            .unwrap_or_else(default_config_path);

        let mut config = if path.exists() {
            let text = std::fs::read_to_string(&path)
                .map_err(|error| anyhow!("failed to read config {}: {error}", path.display()))?;
            let persisted: PersistedConfigFile = toml::from_str(&text)
                .map_err(|error| anyhow!("failed to parse config {}: {error}", path.display()))?;
            persisted.client.into_runtime()
        } else {
            ClientConfig::default()
        };

        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        config.apply_overrides(overrides);
        config.validate()?;

        Ok(config)
    }

    pub fn save(&self, config_path: Option<&Path>) -> Result<()> {
        let path = config_path
            .map(Path::to_path_buf)
            .unwrap_or_else(default_config_path);

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|error| {
                anyhow!("failed to create config dir {}: {error}", parent.display())
            })?;
        }

        let persisted = PersistedConfigFile {
            client: PersistedClientConfig::from_runtime(self),
        };
        let text = toml::to_string_pretty(&persisted)
            .map_err(|error| anyhow!("failed to serialize config: {error}"))?;

        std::fs::write(&path, text)
            .map_err(|error| anyhow!("failed to write config {}: {error}", path.display()))?;

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.base_url.trim().is_empty() {
            return Err(anyhow!("base_url cannot be empty"));
        }

        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(anyhow!(
                "base_url must start with http:// or https://, got {}",
                self.base_url
            ));
        }

        if self.request_timeout.is_zero() {
            return Err(anyhow!("request_timeout_secs must be greater than zero"));
        }

        if self.refresh_timeout.is_zero() {
            return Err(anyhow!("refresh_timeout_secs must be greater than zero"));
        }

        if self.max_payload_bytes == 0 {
            return Err(anyhow!("max_payload_bytes must be greater than zero"));
        }

        Ok(())
    }

    /// Render the effective settings as TOML
    pub fn to_toml(&self) -> Result<String> {
        let persisted = PersistedConfigFile {
            client: PersistedClientConfig::from_runtime(self),
        };
        toml::to_string_pretty(&persisted)
            .map_err(|error| anyhow!("failed to serialize config: {error}"))
    }

    fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(value) = lookup(BASE_URL_ENV)
            && !value.trim().is_empty()
        {
            self.base_url = value.trim().trim_end_matches('/').to_string();
        }

        if let Some(value) = lookup(TIMEOUT_ENV) {
            let secs: u64 = value
                .trim()
                .parse()
                .map_err(|error| anyhow!("invalid {TIMEOUT_ENV} value {value:?}: {error}"))?;
            self.request_timeout = Duration::from_secs(secs);
        }

        Ok(())
    }

    /// Apply flag overrides on top of these settings
    pub fn with_overrides(mut self, overrides: &ClientConfigOverrides) -> Self {
        self.apply_overrides(overrides);
        self
    }

    fn apply_overrides(&mut self, overrides: &ClientConfigOverrides) {
        if let Some(url) = &overrides.base_url {
            self.base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(secs) = overrides.timeout_secs {
            self.request_timeout = Duration::from_secs(secs);
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
struct PersistedConfigFile {
    #[serde(default)]
    client: PersistedClientConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
struct PersistedClientConfig {
    #[serde(default)]
    base_url: String,
    #[serde(default)]
    request_timeout_secs: Option<u64>,
    #[serde(default)]
    refresh_timeout_secs: Option<u64>,
    #[serde(default)]
    max_payload_bytes: Option<usize>,
    #[serde(default)]
    user_agent: Option<String>,
}

impl PersistedClientConfig {
    fn into_runtime(self) -> ClientConfig {
        ClientConfig {
            base_url: if self.base_url.trim().is_empty() {
                DEFAULT_BASE_URL.to_string()
            } else {
                self.base_url.trim_end_matches('/').to_string()
            },
            request_timeout: Duration::from_secs(
                self.request_timeout_secs
                    .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
            ),
            refresh_timeout: Duration::from_secs(
                self.refresh_timeout_secs
                    .unwrap_or(DEFAULT_REFRESH_TIMEOUT_SECS),
            ),
            max_payload_bytes: self.max_payload_bytes.unwrap_or(DEFAULT_MAX_PAYLOAD_BYTES),
            user_agent: self.user_agent.unwrap_or_else(default_user_agent),
        }
    }

    fn from_runtime(config: &ClientConfig) -> Self {
        Self {
            base_url: config.base_url.clone(),
            request_timeout_secs: Some(config.request_timeout.as_secs()),
            refresh_timeout_secs: Some(config.refresh_timeout.as_secs()),
            max_payload_bytes: Some(config.max_payload_bytes),
            user_agent: Some(config.user_agent.clone()),
        }
    }
}

fn default_user_agent() -> String {
    format!("Tollgate/{}", env!("CARGO_PKG_VERSION"))
}

pub fn default_config_path() -> PathBuf {
    expand_tilde_path(&PathBuf::from(DEFAULT_CONFIG_PATH))
}

fn expand_tilde_path(path: &Path) -> PathBuf {
    let path_str = path.to_string_lossy();
    if let Some(stripped) = path_str.strip_prefix("~/")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(stripped);
    }

    if path_str == "~"
        && let Some(home) = dirs::home_dir()
    {
        return home;
    }

    path.to_path_buf()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    const SAMPLE_CONFIG: &str = r#"
[client]
base_url = "https://admin.example.com/api/"
request_timeout_secs = 12
max_payload_bytes = 1024
"#;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = ClientConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert!(config.user_agent.starts_with("Tollgate/"));
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("absent.toml");
        let config = ClientConfig::load(Some(&path), &ClientConfigOverrides::default());
        assert!(config.is_ok());
    }

    #[test]
    fn test_file_values_are_applied() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, SAMPLE_CONFIG).unwrap();

        let persisted: PersistedConfigFile = toml::from_str(SAMPLE_CONFIG).unwrap();
        let config = persisted.client.into_runtime();

        assert_eq!(config.base_url, "https://admin.example.com/api");
        assert_eq!(config.request_timeout, Duration::from_secs(12));
        assert_eq!(config.refresh_timeout, Duration::from_secs(10));
        assert_eq!(config.max_payload_bytes, 1024);
    }

    #[test]
    fn test_flags_override_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, SAMPLE_CONFIG).unwrap();

        let overrides = ClientConfigOverrides {
            base_url: Some("http://localhost:3000/".to_string()),
            timeout_secs: Some(3),
        };
        let config = ClientConfig::load(Some(&path), &overrides).unwrap();

        assert_eq!(config.base_url, "http://localhost:3000");
        assert_eq!(config.request_timeout, Duration::from_secs(3));
        assert_eq!(config.max_payload_bytes, 1024);
    }

    #[test]
    fn test_env_overrides_apply() {
        let mut config = ClientConfig::default();
        config
            .apply_env_overrides(env(&[
                (BASE_URL_ENV, "https://env.example.com/"),
                (TIMEOUT_ENV, "7"),
            ]))
            .unwrap();

        assert_eq!(config.base_url, "https://env.example.com");
        assert_eq!(config.request_timeout, Duration::from_secs(7));
    }

    #[test]
    fn test_invalid_env_timeout_is_an_error() {
        let mut config = ClientConfig::default();
        let result = config.apply_env_overrides(env(&[(TIMEOUT_ENV, "soon")]));
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(ClientConfig::new("").validate().is_err());
        assert!(ClientConfig::new("ftp://example.com").validate().is_err());
        assert!(
            ClientConfig::default()
                .with_request_timeout(Duration::ZERO)
                .validate()
                .is_err()
        );
        assert!(
            ClientConfig::default()
                .with_refresh_timeout(Duration::ZERO)
                .validate()
                .is_err()
        );
        assert!(
            ClientConfig::default()
                .with_max_payload_bytes(0)
                .validate()
                .is_err()
        );
    }

    #[test]
    fn test_save_then_load_keeps_values() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let config = ClientConfig::new("https://saved.example.com")
            .with_refresh_timeout(Duration::from_secs(4))
            .with_max_payload_bytes(2048);
        config.save(Some(&path)).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let persisted: PersistedConfigFile = toml::from_str(&text).unwrap();
        let loaded = persisted.client.into_runtime();

        assert_eq!(loaded.base_url, "https://saved.example.com");
        assert_eq!(loaded.refresh_timeout, Duration::from_secs(4));
        assert_eq!(loaded.max_payload_bytes, 2048);
    }

    #[test]
    fn test_default_config_path_expands() {
        let path = default_config_path();
        assert!(!path.to_string_lossy().contains('~'));
    }
}
