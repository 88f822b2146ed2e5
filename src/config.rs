use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Producer base URL. May be left out of the file when `--endpoint` is given.
    #[serde(default)]
    pub endpoint: String,
    #[serde(default = "default_telemetry_path")]
    pub telemetry_path: String,
    #[serde(default = "default_speedtest_start_path")]
    pub speedtest_start_path: String,
    #[serde(default = "default_listen")]
    pub listen: String,
    #[serde(default = "default_fetch_timeout_ms")]
    pub fetch_timeout_ms: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse YAML in {path}: {source}")]
    Parse {
        path: String,
        source: serde_yaml::Error,
    },
    #[error("invalid configuration: {0}")]
    Validation(String),
}

impl Config {
    /// Loads and validates the file. `endpoint_override` replaces the file's
    /// endpoint before validation.
    pub fn load_from_file(
        path: impl AsRef<Path>,
        endpoint_override: Option<&str>,
    ) -> Result<Self, ConfigError> {
        let path_ref = path.as_ref();
        let path_display = path_ref.display().to_string();
        let text = fs::read_to_string(path_ref).map_err(|source| ConfigError::Read {
            path: path_display.clone(),
            source,
        })?;

        Self::from_yaml(&text, &path_display, endpoint_override)
    }

    /// Defaults for everything but the producer URL.
    pub fn with_endpoint(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            telemetry_path: default_telemetry_path(),
            speedtest_start_path: default_speedtest_start_path(),
            listen: default_listen(),
            fetch_timeout_ms: default_fetch_timeout_ms(),
            user_agent: default_user_agent(),
        }
    }

    fn from_yaml(
        text: &str,
        origin: &str,
        endpoint_override: Option<&str>,
    ) -> Result<Self, ConfigError> {
        let mut cfg: Config = serde_yaml::from_str(text).map_err(|source| ConfigError::Parse {
            path: origin.to_string(),
            source,
        })?;
        if let Some(endpoint) = endpoint_override {
            cfg.endpoint = endpoint.to_string();
        }

        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let endpoint = self.endpoint.trim();
        if endpoint.is_empty() {
            return Err(ConfigError::Validation(
                "endpoint is required".to_string(),
            ));
        }
        if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
            return Err(ConfigError::Validation(format!(
                "endpoint '{}' must start with http:// or https://",
                endpoint
            )));
        }
        validate_path("telemetry_path", &self.telemetry_path)?;
        validate_path("speedtest_start_path", &self.speedtest_start_path)?;
        if SocketAddr::from_str(&self.listen).is_err() {
            return Err(ConfigError::Validation(
                "listen must be a valid host:port address".to_string(),
            ));
        }
        if !(1..=60_000).contains(&self.fetch_timeout_ms) {
            return Err(ConfigError::Validation(
                "fetch_timeout_ms must be in range 1..=60000".to_string(),
            ));
        }
        if self.user_agent.trim().is_empty() {
            return Err(ConfigError::Validation(
                "user_agent must not be empty".to_string(),
            ));
        }

        Ok(())
    }

    pub fn telemetry_url(&self) -> String {
        join_url(&self.endpoint, &self.telemetry_path)
    }

    pub fn speedtest_start_url(&self) -> String {
        join_url(&self.endpoint, &self.speedtest_start_path)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    pub fn example_yaml() -> &'static str {
        include_str!("../hostboard.yaml.example")
    }
}

fn validate_path(field: &str, value: &str) -> Result<(), ConfigError> {
    if !value.starts_with('/') {
        return Err(ConfigError::Validation(format!(
            "{field} must start with '/'"
        )));
    }
    Ok(())
}

fn join_url(base: &str, path: &str) -> String {
    format!("{}{}", base.trim().trim_end_matches('/'), path)
}

fn default_telemetry_path() -> String {
    "/api/system".to_string()
}

fn default_speedtest_start_path() -> String {
    "/api/speedtest/start".to_string()
}

fn default_listen() -> String {
    "127.0.0.1:9110".to_string()
}

const fn default_fetch_timeout_ms() -> u64 {
    3000
}

fn default_user_agent() -> String {
    concat!("hostboard/", env!("CARGO_PKG_VERSION")).to_string()
}
