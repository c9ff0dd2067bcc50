//! Dashboard client configuration (~/.focusdash/config.json).
//!
//! Every field has a serde default, so an absent file or a partial file both
//! yield a usable config. `FOCUSDASH_API_URL` overrides the backend URL.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const API_URL_ENV: &str = "FOCUSDASH_API_URL";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default = "default_api_url")]
    pub api_url: String,
    /// Panel refetch interval while mounted.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// Google link status refresh interval.
    #[serde(default = "default_poll_interval_secs")]
    pub status_poll_interval_secs: u64,
    /// Pause between a successful connect and the automatic first sync.
    #[serde(default = "default_connect_sync_delay_ms")]
    pub connect_sync_delay_ms: u64,
    /// Extra refresh publishes after a sync completes, measured from completion.
    #[serde(default = "default_trailing_refresh_delays_ms")]
    pub trailing_refresh_delays_ms: Vec<u64>,
}

fn default_api_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_poll_interval_secs() -> u64 {
    30
}

fn default_connect_sync_delay_ms() -> u64 {
    1500
}

fn default_trailing_refresh_delays_ms() -> Vec<u64> {
    vec![500, 1500]
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            poll_interval_secs: default_poll_interval_secs(),
            status_poll_interval_secs: default_poll_interval_secs(),
            connect_sync_delay_ms: default_connect_sync_delay_ms(),
            trailing_refresh_delays_ms: default_trailing_refresh_delays_ms(),
        }
    }
}

impl Config {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn status_poll_interval(&self) -> Duration {
        Duration::from_secs(self.status_poll_interval_secs)
    }

    pub fn connect_sync_delay(&self) -> Duration {
        Duration::from_millis(self.connect_sync_delay_ms)
    }

    pub fn trailing_refresh_delays(&self) -> Vec<Duration> {
        self.trailing_refresh_delays_ms
            .iter()
            .copied()
            .map(Duration::from_millis)
            .collect()
    }

    pub fn validate(&self) -> Result<(), String> {
        url::Url::parse(&self.api_url)
            .map_err(|e| format!("Invalid apiUrl '{}': {}", self.api_url, e))?;
        if self.poll_interval_secs == 0 {
            return Err("pollIntervalSecs must be greater than zero".to_string());
        }
        if self.status_poll_interval_secs == 0 {
            return Err("statusPollIntervalSecs must be greater than zero".to_string());
        }
        Ok(())
    }

    /// Apply environment overrides. `lookup` is `std::env::var` outside tests.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(API_URL_ENV).filter(|u| !u.trim().is_empty()) {
            log::debug!("Using {} from environment: {}", API_URL_ENV, url);
            self.api_url = url.trim().to_string();
        }
    }
}

/// Get the canonical config file path (~/.focusdash/config.json)
pub fn config_path() -> Result<PathBuf, String> {
    let home = dirs::home_dir().ok_or("Could not find home directory")?;
    Ok(home.join(".focusdash").join("config.json"))
}

/// Load config from disk (defaults when the file is absent), then apply env overrides.
pub fn load_config() -> Result<Config, String> {
    let mut config = load_config_from(&config_path()?)?;
    config.apply_env(|key| std::env::var(key).ok());
    config.validate()?;
    Ok(config)
}

pub fn load_config_from(path: &Path) -> Result<Config, String> {
    if !path.exists() {
        log::info!("No config at {}, using defaults", path.display());
        return Ok(Config::default());
    }

    let content = fs::read_to_string(path).map_err(|e| format!("Failed to read config: {}", e))?;

    serde_json::from_str(&content).map_err(|e| format!("Failed to parse config: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config_from(&dir.path().join("config.json")).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.poll_interval(), Duration::from_secs(30));
        assert_eq!(config.connect_sync_delay(), Duration::from_millis(1500));
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{ "apiUrl": "https://dash.example.com", "pollIntervalSecs": 10 }"#,
        )
        .unwrap();

        let config = load_config_from(&path).unwrap();
        assert_eq!(config.api_url, "https://dash.example.com");
        assert_eq!(config.poll_interval_secs, 10);
        assert_eq!(config.status_poll_interval_secs, 30);
        assert_eq!(
            config.trailing_refresh_delays(),
            vec![Duration::from_millis(500), Duration::from_millis(1500)]
        );
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();
        let err = load_config_from(&path).unwrap_err();
        assert!(err.starts_with("Failed to parse config"));
    }

    #[test]
    fn env_overrides_api_url() {
        let mut config = Config::default();
        config.apply_env(|key| {
            (key == API_URL_ENV).then(|| " http://10.0.0.5:8000 ".to_string())
        });
        assert_eq!(config.api_url, "http://10.0.0.5:8000");

        config.apply_env(|_| Some("   ".to_string()));
        assert_eq!(config.api_url, "http://10.0.0.5:8000");
    }

    #[test]
    fn validate_rejects_bad_values() {
        let mut config = Config {
            api_url: "not a url".to_string(),
            ..Config::default()
        };
        assert!(config.validate().is_err());

        config.api_url = default_api_url();
        config.poll_interval_secs = 0;
        assert!(config.validate().is_err());

        config.poll_interval_secs = 5;
        assert!(config.validate().is_ok());
    }
}
