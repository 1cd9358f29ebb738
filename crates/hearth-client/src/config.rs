//! Client configuration.
//!
//! # Example (TOML)
//!
//! ```toml
//! [api]
//! base_url = "https://community.example.com"
//! graphql_path = "/graphql"
//! timeout = "30s"
//!
//! [session.refresh]
//! interval = "30s"
//! network_domain = "community.example.com"
//!
//! [logging]
//! level = "debug"
//! ```

use std::time::Duration;

use hearth_auth::SessionConfig;
use serde::{Deserialize, Serialize};
use url::Url;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), String> {
        let base = Url::parse(&self.api.base_url)
            .map_err(|e| format!("api.base_url is not a valid URL: {e}"))?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err("api.base_url must use http or https".into());
        }
        if !self.api.graphql_path.starts_with('/') {
            return Err("api.graphql_path must start with '/'".into());
        }
        if self.api.timeout.is_zero() {
            return Err("api.timeout must be > 0".into());
        }

        self.session.validate().map_err(|e| format!("session: {e}"))?;

        let lvl = self.logging.level.to_ascii_lowercase();
        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&lvl.as_str()) {
            return Err(format!("logging.level must be one of {valid_levels:?}"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Origin of the community API.
    pub base_url: String,
    /// Path of the GraphQL endpoint, relative to `base_url`.
    pub graphql_path: String,
    /// Per-request timeout.
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl ApiConfig {
    /// Full URL of the GraphQL endpoint.
    pub fn endpoint(&self) -> String {
        format!(
            "{}{}",
            self.base_url.trim_end_matches('/'),
            self.graphql_path
        )
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:4000".into(),
            graphql_path: "/graphql".into(),
            timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}
fn default_log_level() -> String {
    "info".into()
}
impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

pub mod loader {
    use super::AppConfig;
    use config::{Config, Environment, File};
    use std::path::PathBuf;

    /// Default config file, looked up in the working directory.
    pub const DEFAULT_CONFIG_FILE: &str = "hearth.toml";

    /// Loads the config file (when it exists) and applies `HEARTH__*`
    /// environment overrides on top.
    pub fn load_config(path: Option<&str>) -> Result<AppConfig, String> {
        let mut builder = Config::builder();
        let file = PathBuf::from(path.unwrap_or(DEFAULT_CONFIG_FILE));
        if file.exists() {
            builder = builder.add_source(File::from(file));
        } else if path.is_some() {
            tracing::warn!(path = %file.display(), "Config file not found, using defaults");
        }
        // e.g. HEARTH__API__BASE_URL=https://community.example.com
        builder = builder.add_source(
            Environment::with_prefix("HEARTH")
                .try_parsing(true)
                .separator("__"),
        );
        let cfg = builder
            .build()
            .map_err(|e| format!("config build error: {e}"))?;
        let merged: AppConfig = cfg
            .try_deserialize()
            .map_err(|e| format!("config deserialize error: {e}"))?;
        merged.validate()?;
        Ok(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.api.endpoint(), "http://localhost:4000/graphql");
    }

    #[test]
    fn test_endpoint_trims_trailing_slash() {
        let api = ApiConfig {
            base_url: "https://community.example.com/".into(),
            ..ApiConfig::default()
        };
        assert_eq!(api.endpoint(), "https://community.example.com/graphql");
    }

    #[test]
    fn test_rejects_bad_values() {
        let mut config = AppConfig::default();
        config.api.base_url = "ftp://example.com".into();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.api.graphql_path = "graphql".into();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.logging.level = "loud".into();
        assert!(config.validate().unwrap_err().contains("logging.level"));

        let mut config = AppConfig::default();
        config.session.refresh.interval = Duration::ZERO;
        assert!(config.validate().unwrap_err().starts_with("session:"));
    }
}
