//! Service configuration from the environment (and `.env`, when present).

use dotenvy::dotenv;
use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::certificate::engine::{EngineKind, EngineOptions, DEFAULT_READY_SELECTOR};
use crate::certificate::generator::{GeneratorOptions, DEFAULT_RENDER_TIMEOUT, DEFAULT_TEMPLATE_NAME};

pub const DEFAULT_PORT: u16 = 5001;
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_OUTPUT_DIR: &str = "./output";
pub const DEFAULT_ALLOWED_ORIGINS: &str = "http://localhost:3010,http://localhost:3011";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} has an invalid value '{value}': {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub output_dir: PathBuf,
    pub template_dir: PathBuf,
    pub template_name: String,
    pub expected_template_sha256: Option<String>,
    pub engine: EngineKind,
    pub engine_options: EngineOptions,
    pub render_timeout: Duration,
    pub allowed_origins: Vec<String>,
}

/// Templates shipped with the crate.
pub fn default_template_dir() -> &'static Path {
    Path::new(concat!(env!("CARGO_MANIFEST_DIR"), "/static"))
}

fn parse_var<T: FromStr>(name: &'static str, value: Option<String>, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match value {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            name,
            value: raw.clone(),
            reason: e.to_string(),
        }),
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv().ok(); // Load .env file
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build from an arbitrary variable source; empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let port = parse_var("CERTIFICATE_PORT", var("CERTIFICATE_PORT"), DEFAULT_PORT)?;
        let engine = parse_var("CERTIFICATE_ENGINE", var("CERTIFICATE_ENGINE"), EngineKind::default())?;
        let timeout_secs = parse_var(
            "CERTIFICATE_RENDER_TIMEOUT_SECS",
            var("CERTIFICATE_RENDER_TIMEOUT_SECS"),
            DEFAULT_RENDER_TIMEOUT.as_secs(),
        )?;
        if timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                name: "CERTIFICATE_RENDER_TIMEOUT_SECS",
                value: "0".to_string(),
                reason: "must be at least 1 second".to_string(),
            });
        }

        let allowed_origins = var("CERTIFICATE_ALLOWED_ORIGINS")
            .unwrap_or_else(|| DEFAULT_ALLOWED_ORIGINS.to_string())
            .split(',')
            .map(|origin| origin.trim().to_string())
            .filter(|origin| !origin.is_empty())
            .collect();

        Ok(Self {
            host: var("CERTIFICATE_HOST").unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port,
            output_dir: var("CERTIFICATE_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR)),
            template_dir: var("CERTIFICATE_TEMPLATE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| default_template_dir().to_path_buf()),
            template_name: var("CERTIFICATE_TEMPLATE_NAME")
                .unwrap_or_else(|| DEFAULT_TEMPLATE_NAME.to_string()),
            expected_template_sha256: var("CERTIFICATE_TEMPLATE_SHA256"),
            engine,
            engine_options: EngineOptions {
                chrome_path: var("CHROME_PATH").map(PathBuf::from),
                wkhtmltopdf_path: var("WKHTMLTOPDF_PATH").map(PathBuf::from),
                ready_selector: var("CERTIFICATE_READY_SELECTOR")
                    .unwrap_or_else(|| DEFAULT_READY_SELECTOR.to_string()),
            },
            render_timeout: Duration::from_secs(timeout_secs),
            allowed_origins,
        })
    }

    pub fn generator_options(&self) -> GeneratorOptions {
        GeneratorOptions {
            template_dir: self.template_dir.clone(),
            template_name: self.template_name.clone(),
            expected_template_sha256: self.expected_template_sha256.clone(),
            render_timeout: self.render_timeout,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config(&[]).unwrap();
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.host, DEFAULT_HOST);
        assert_eq!(config.engine, EngineKind::Chrome);
        assert_eq!(config.template_name, DEFAULT_TEMPLATE_NAME);
        assert!(config.expected_template_sha256.is_none());
        assert_eq!(config.render_timeout, DEFAULT_RENDER_TIMEOUT);
        assert_eq!(
            config.allowed_origins,
            vec!["http://localhost:3010", "http://localhost:3011"]
        );
        assert!(config.template_dir.ends_with("static"));
    }

    #[test]
    fn test_overrides() {
        let config = config(&[
            ("CERTIFICATE_PORT", "8081"),
            ("CERTIFICATE_ENGINE", "wkhtmltopdf"),
            ("CERTIFICATE_TEMPLATE_SHA256", "abc123"),
            ("CERTIFICATE_RENDER_TIMEOUT_SECS", "15"),
            ("CERTIFICATE_ALLOWED_ORIGINS", "https://a.example, ,https://b.example"),
            ("CERTIFICATE_OUTPUT_DIR", "/tmp/certs"),
        ])
        .unwrap();

        assert_eq!(config.port, 8081);
        assert_eq!(config.engine, EngineKind::Wkhtmltopdf);
        assert_eq!(config.expected_template_sha256.as_deref(), Some("abc123"));
        assert_eq!(config.render_timeout, Duration::from_secs(15));
        assert_eq!(config.allowed_origins, vec!["https://a.example", "https://b.example"]);
        assert_eq!(config.output_dir, PathBuf::from("/tmp/certs"));
        assert_eq!(
            config.generator_options().expected_template_sha256.as_deref(),
            Some("abc123")
        );
    }

    #[test]
    fn test_invalid_values() {
        let err = config(&[("CERTIFICATE_PORT", "eighty")]).unwrap_err();
        assert!(err.to_string().starts_with("CERTIFICATE_PORT has an invalid value"));

        assert!(config(&[("CERTIFICATE_ENGINE", "weasyprint")]).is_err());
        assert!(config(&[("CERTIFICATE_RENDER_TIMEOUT_SECS", "0")]).is_err());
    }

    #[test]
    fn test_blank_values_are_unset() {
        let config = config(&[("CERTIFICATE_TEMPLATE_SHA256", "  ")]).unwrap();
        assert!(config.expected_template_sha256.is_none());
    }
}
