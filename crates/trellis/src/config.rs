//! Configuration file loading and parsing.
//!
//! Trellis supports repository-level configuration through
//! `.trellis/config.toml`. If no config file exists, the system falls back to
//! sensible defaults. A few settings can be overridden from the environment.

use crate::storage::Session;
use crate::type_hierarchy::{ConfigError, HierarchySettings};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Data directory used when neither `--data-dir` nor `TRELLIS_DATA_DIR` is set.
pub const DEFAULT_DATA_DIR: &str = ".trellis";

pub const CONFIG_FILE: &str = "config.toml";

/// Default HTTP request timeout for the remote issue store.
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

pub const ENV_API_URL: &str = "TRELLIS_API_URL";
pub const ENV_API_TOKEN: &str = "TRELLIS_API_TOKEN";
pub const ENV_API_USER: &str = "TRELLIS_API_USER";

/// Written by `trellis init`.
pub const DEFAULT_CONFIG_TOML: &str = r#"# Trellis configuration

[hierarchy]
# Generations rendered from the focus issue downwards (1-3).
max_depth = 2

# [remote]
# base_url = "http://localhost:3000/api"
# timeout_secs = 10

# [logging]
# filter = "warn"
"#;

/// Root configuration structure loaded from `.trellis/config.toml`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TrellisConfig {
    /// Hierarchy resolution settings (optional).
    pub hierarchy: Option<HierarchyConfig>,
    /// Remote issue store (optional).
    pub remote: Option<RemoteConfig>,
    /// Log filter (optional).
    pub logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HierarchyConfig {
    /// Generations rendered from the focus (default: 2).
    pub max_depth: Option<u8>,
}

/// Remote issue store configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RemoteConfig {
    /// API base URL, e.g. `http://localhost:3000/api`.
    pub base_url: Option<String>,
    /// Request timeout in seconds (default: 10).
    pub timeout_secs: Option<u64>,
    /// Bearer token sent with every request.
    pub token: Option<String>,
    /// Acting user sent in the `x-trellis-user` header.
    pub user: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directive, e.g. `"trellis=debug"`.
    pub filter: Option<String>,
}

impl TrellisConfig {
    /// Load configuration from `<root>/config.toml` if it exists.
    ///
    /// Returns an empty config (all sections None) if the file doesn't exist.
    /// Returns an error if the file exists but is malformed.
    pub fn load(root: &Path) -> Result<Self> {
        let config_path = root.join(CONFIG_FILE);

        if !config_path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read {}", config_path.display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", config_path.display()))
    }

    /// Load and apply overrides from the process environment.
    pub fn load_with_env(root: &Path) -> Result<Self> {
        Ok(Self::load(root)?.with_overrides(|name| std::env::var(name).ok()))
    }

    /// Apply `TRELLIS_API_URL`, `TRELLIS_API_TOKEN` and `TRELLIS_API_USER`
    /// through `lookup`. Empty values are ignored.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |name: &str| lookup(name).filter(|value: &String| !value.trim().is_empty());

        let remote = self.remote.get_or_insert_with(RemoteConfig::default);
        if let Some(url) = get(ENV_API_URL) {
            remote.base_url = Some(url);
        }
        if let Some(token) = get(ENV_API_TOKEN) {
            remote.token = Some(token);
        }
        if let Some(user) = get(ENV_API_USER) {
            remote.user = Some(user);
        }
        self
    }

    /// Resolver settings, validating the configured depth.
    pub fn hierarchy_settings(&self) -> Result<HierarchySettings, ConfigError> {
        match self.hierarchy.as_ref().and_then(|h| h.max_depth) {
            Some(depth) => HierarchySettings::new(depth),
            None => Ok(HierarchySettings::default()),
        }
    }

    pub fn remote_url(&self) -> Option<&str> {
        self.remote.as_ref().and_then(|r| r.base_url.as_deref())
    }

    pub fn timeout(&self) -> Duration {
        let secs = self
            .remote
            .as_ref()
            .and_then(|r| r.timeout_secs)
            .unwrap_or(DEFAULT_TIMEOUT_SECS);
        Duration::from_secs(secs)
    }

    /// Caller identity for the HTTP store.
    pub fn session(&self) -> Session {
        let mut session = Session::anonymous();
        if let Some(remote) = &self.remote {
            session.token = remote.token.clone();
            session.user = remote.user.clone();
        }
        session
    }

    pub fn log_filter(&self) -> Option<&str> {
        self.logging.as_ref().and_then(|l| l.filter.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_parse_full_config() {
        let config_toml = r#"
[hierarchy]
max_depth = 3

[remote]
base_url = "http://tracker.local/api"
timeout_secs = 3
token = "secret"
user = "alice"

[logging]
filter = "trellis=debug"
"#;
        let config: TrellisConfig = toml::from_str(config_toml).unwrap();

        assert_eq!(config.hierarchy_settings().unwrap().max_depth(), 3);
        assert_eq!(config.remote_url(), Some("http://tracker.local/api"));
        assert_eq!(config.timeout(), Duration::from_secs(3));
        assert_eq!(
            config.session(),
            Session::anonymous().with_token("secret").with_user("alice")
        );
        assert_eq!(config.log_filter(), Some("trellis=debug"));
    }

    #[test]
    fn test_load_missing_config_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config = TrellisConfig::load(temp_dir.path()).unwrap();

        assert!(config.hierarchy.is_none());
        assert_eq!(config.hierarchy_settings().unwrap(), HierarchySettings::default());
        assert_eq!(config.timeout(), Duration::from_secs(DEFAULT_TIMEOUT_SECS));
        assert_eq!(config.session(), Session::anonymous());
        assert_eq!(config.remote_url(), None);
    }

    #[test]
    fn test_default_config_file_parses() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join(CONFIG_FILE), DEFAULT_CONFIG_TOML).unwrap();

        let config = TrellisConfig::load(temp_dir.path()).unwrap();
        assert_eq!(config.hierarchy_settings().unwrap().max_depth(), 2);
    }

    #[test]
    fn test_malformed_toml_returns_error() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join(CONFIG_FILE), "[broken syntax").unwrap();

        assert!(TrellisConfig::load(temp_dir.path()).is_err());
    }

    #[test]
    fn test_invalid_depth_is_config_error() {
        let config: TrellisConfig = toml::from_str("[hierarchy]\nmax_depth = 7\n").unwrap();
        assert_eq!(config.hierarchy_settings(), Err(ConfigError::InvalidDepth(7)));
    }

    #[test]
    fn test_env_overrides_file_values() {
        let config: TrellisConfig =
            toml::from_str("[remote]\nbase_url = \"http://file/api\"\ntoken = \"file\"\n").unwrap();
        let env: HashMap<&str, &str> = [
            (ENV_API_URL, "http://env/api"),
            (ENV_API_TOKEN, ""),
            (ENV_API_USER, "bob"),
        ]
        .into_iter()
        .collect();

        let config = config.with_overrides(|name| env.get(name).map(|v| v.to_string()));

        assert_eq!(config.remote_url(), Some("http://env/api"));
        // Empty values do not clear the file setting.
        assert_eq!(config.session().token.as_deref(), Some("file"));
        assert_eq!(config.session().user.as_deref(), Some("bob"));
    }
}
