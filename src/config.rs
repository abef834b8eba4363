//! Configuration management: YAML file defaults, environment overrides

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::ConfigError;

pub const ENV_DATABASE: &str = "DB_CONNECTION_STRING";
pub const ENV_API_URL: &str = "ABS_API_URL";
pub const ENV_API_TOKEN: &str = "ABS_API_TOKEN";
pub const ENV_USER_ID: &str = "ABS_USER_ID";
pub const ENV_REFRESH: &str = "REFRESH";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub sync: SyncConfig,
}

/// Database configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Path of the SQLite file; `~` is expanded
    #[serde(default)]
    pub path: Option<String>,
}

/// Remote media server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default)]
    pub base_url: Option<String>,

    #[serde(default)]
    pub token: Option<String>,

    /// Whose listening history to mirror
    #[serde(default)]
    pub user_id: Option<String>,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Sync engine knobs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    #[serde(default = "default_max_pages")]
    pub max_pages: u32,

    /// Truncate session history before crawling
    #[serde(default)]
    pub refresh: bool,

    /// Stop the crawl at the first already-synced session
    #[serde(default = "default_stop_on_existing")]
    pub stop_on_existing: bool,
}

/// Validated settings for the HTTP source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiSettings {
    pub base_url: String,
    pub token: String,
    pub user_id: String,
    pub timeout_secs: u64,
}

// Default value functions
fn default_timeout_secs() -> u64 {
    30
}

fn default_page_size() -> u32 {
    20
}

fn default_max_pages() -> u32 {
    1000
}

fn default_stop_on_existing() -> bool {
    true
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            token: None,
            user_id: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            max_pages: default_max_pages(),
            refresh: false,
            stop_on_existing: default_stop_on_existing(),
        }
    }
}

impl Config {
    /// Load configuration from a YAML file
    /// Searches in order:
    /// 1. Provided path
    /// 2. ./listenlog.yaml (current directory)
    /// 3. ~/.config/listenlog/listenlog.yaml
    ///
    /// No file at all is not an error; defaults are used.
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let search_paths = vec![
            shellexpand::tilde(path).to_string(),
            "listenlog.yaml".to_string(),
            shellexpand::tilde("~/.config/listenlog/listenlog.yaml").to_string(),
        ];

        for search_path in &search_paths {
            if std::path::Path::new(search_path).exists() {
                let content =
                    std::fs::read_to_string(search_path).map_err(|source| ConfigError::Read {
                        path: search_path.clone(),
                        source,
                    })?;
                return Self::from_yaml(&content).map_err(|source| ConfigError::Parse {
                    path: search_path.clone(),
                    source,
                });
            }
        }

        Ok(Config::default())
    }

    pub fn from_yaml(content: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(content)
    }

    /// Overlay process environment variables on top of file values
    pub fn apply_process_env(&mut self) {
        self.apply_env(|name| std::env::var(name).ok());
    }

    /// Overlay values from `lookup`. Blank values count as unset.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(v) = get(ENV_DATABASE) {
            self.database.path = Some(v);
        }
        if let Some(v) = get(ENV_API_URL) {
            self.api.base_url = Some(v);
        }
        if let Some(v) = get(ENV_API_TOKEN) {
            self.api.token = Some(v);
        }
        if let Some(v) = get(ENV_USER_ID) {
            self.api.user_id = Some(v);
        }
        if let Some(v) = get(ENV_REFRESH) {
            self.sync.refresh = v.trim().eq_ignore_ascii_case("true");
        }
    }

    /// Get the database path, expanding ~ to home directory
    pub fn database_path(&self) -> Result<PathBuf, ConfigError> {
        let raw = self
            .database
            .path
            .as_deref()
            .ok_or(ConfigError::Missing(ENV_DATABASE))?;
        Ok(PathBuf::from(shellexpand::tilde(raw).to_string()))
    }

    pub fn api_settings(&self) -> Result<ApiSettings, ConfigError> {
        let base_url = self
            .api
            .base_url
            .clone()
            .ok_or(ConfigError::Missing(ENV_API_URL))?;
        let token = self
            .api
            .token
            .clone()
            .ok_or(ConfigError::Missing(ENV_API_TOKEN))?;
        let user_id = self
            .api
            .user_id
            .clone()
            .ok_or(ConfigError::Missing(ENV_USER_ID))?;

        Ok(ApiSettings {
            base_url,
            token,
            user_id,
            timeout_secs: self.api.timeout_secs,
        })
    }

    /// Check the sync knobs before a run starts
    pub fn validate_sync(&self) -> Result<(), ConfigError> {
        if self.sync.page_size == 0 {
            return Err(ConfigError::Invalid {
                name: "sync.page_size",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.sync.page_size, 20);
        assert_eq!(config.sync.max_pages, 1000);
        assert!(config.sync.stop_on_existing);
        assert!(!config.sync.refresh);
        assert_eq!(config.api.timeout_secs, 30);
    }

    #[test]
    fn test_yaml_parsing() {
        let yaml = r#"
database:
  path: ~/.local/share/listenlog/test.db

api:
  base_url: http://abs.local:13378
  user_id: root-user
  timeout_secs: 5

sync:
  page_size: 50
  stop_on_existing: false
"#;
        let config = Config::from_yaml(yaml).unwrap();
        assert_eq!(
            config.database.path.as_deref(),
            Some("~/.local/share/listenlog/test.db")
        );
        assert_eq!(config.api.base_url.as_deref(), Some("http://abs.local:13378"));
        assert_eq!(config.api.timeout_secs, 5);
        assert_eq!(config.sync.page_size, 50);
        assert_eq!(config.sync.max_pages, 1000);
        assert!(!config.sync.stop_on_existing);
    }

    #[test]
    fn test_env_overrides_file_values() {
        let mut config = Config::from_yaml("api:\n  base_url: http://from-file\n").unwrap();
        let vars = env(&[
            (ENV_API_URL, "http://from-env"),
            (ENV_API_TOKEN, "secret"),
            (ENV_USER_ID, "u1"),
            (ENV_DATABASE, "/tmp/listen.db"),
        ]);
        config.apply_env(|k| vars.get(k).cloned());

        let api = config.api_settings().unwrap();
        assert_eq!(api.base_url, "http://from-env");
        assert_eq!(api.token, "secret");
        assert_eq!(api.user_id, "u1");
        assert_eq!(config.database_path().unwrap(), PathBuf::from("/tmp/listen.db"));
    }

    #[test]
    fn test_missing_user_id_is_reported() {
        let mut config = Config::default();
        let vars = env(&[(ENV_API_URL, "http://abs"), (ENV_API_TOKEN, "t"), (ENV_USER_ID, "  ")]);
        config.apply_env(|k| vars.get(k).cloned());

        match config.api_settings() {
            Err(ConfigError::Missing(name)) => assert_eq!(name, ENV_USER_ID),
            other => panic!("expected missing user id, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_database_is_reported() {
        let config = Config::default();
        assert!(matches!(
            config.database_path(),
            Err(ConfigError::Missing(ENV_DATABASE))
        ));
    }

    #[test]
    fn test_refresh_flag_is_case_insensitive() {
        for (value, expected) in [("TRUE", true), ("True", true), ("true", true), ("1", false), ("no", false)] {
            let mut config = Config::default();
            let vars = env(&[(ENV_REFRESH, value)]);
            config.apply_env(|k| vars.get(k).cloned());
            assert_eq!(config.sync.refresh, expected, "REFRESH={}", value);
        }
    }

    #[test]
    fn test_zero_page_size_is_invalid() {
        let mut config = Config::default();
        config.sync.page_size = 0;
        assert!(matches!(
            config.validate_sync(),
            Err(ConfigError::Invalid { name: "sync.page_size", .. })
        ));
    }
}
